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

use std::future::Future;
use std::process::ExitCode;

use strata_client::Coordinator;
use strata_protos::config::LogsConfig;
use strata_protos::config::StderrAppenderConfig;
use strata_protos::config::TelemetryConfig;
use tests_toolkit::make_test_name;
use tests_toolkit::TestCluster;

pub struct Testkit {
    pub cluster: TestCluster,
    pub coordinator: Coordinator,
}

/// Runs a test body against a fresh three-node, four-partition cluster.
/// Tests that tear nodes down call `cluster.shutdown_all()` themselves at
/// the end; leaked accept loops die with the test process.
pub fn harness<T, Fut>(test: impl Send + FnOnce(Testkit) -> Fut) -> ExitCode
where
    T: std::process::Termination,
    Fut: Send + Future<Output = T>,
{
    strata_telemetry::init(&TelemetryConfig {
        logs: LogsConfig {
            stderr: Some(StderrAppenderConfig {
                filter: "INFO".to_string(),
            }),
        },
    });

    let test_name = make_test_name::<Fut>();
    strata_runtime::test_runtime().block_on(async move {
        let cluster = tests_toolkit::start_test_cluster(&test_name, 3, 4).await;
        let coordinator = cluster.coordinator();
        test(Testkit {
            cluster,
            coordinator,
        })
        .await
        .report()
    })
}
