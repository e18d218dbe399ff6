// Copyright 2025 the Strata project authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Logging setup for Strata processes.
//!
//! A supervised cluster runs one process per node, all sharing the
//! terminal's stderr, so every appender is driven by the same config shape
//! and the `RUST_LOG` environment variable overrides the configured filter
//! in each child uniformly.

use logforth::append;
use logforth::filter::env_filter::EnvFilterBuilder;
use logforth::filter::EnvFilter;
use logforth::layout;
use strata_protos::config::TelemetryConfig;

/// Installs the global logger. Safe to call more than once; only the first
/// call takes effect.
pub fn init(config: &TelemetryConfig) {
    let mut builder = logforth::builder();

    if let Some(stderr) = &config.logs.stderr {
        let filter = env_filter(&stderr.filter);
        builder = builder.dispatch(|d| {
            d.filter(filter)
                .append(append::Stderr::default().with_layout(layout::TextLayout::default()))
        });
    }

    let _ = builder.try_apply();
}

/// `RUST_LOG` wins over the filter from the config file. A directive that
/// does not parse is a deployment mistake worth failing loudly on.
fn env_filter(configured: &str) -> EnvFilter {
    let directives = std::env::var("RUST_LOG").unwrap_or_else(|_| configured.to_string());
    let builder = EnvFilterBuilder::new()
        .try_parse(&directives)
        .unwrap_or_else(|_| panic!("failed to parse log filter: {directives}"));
    EnvFilter::new(builder)
}
