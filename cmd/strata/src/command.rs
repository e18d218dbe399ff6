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

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap::Subcommand;
use error_stack::ResultExt;
use strata_server::Supervisor;

use crate::config::Config;
use crate::Error;

#[derive(Debug, Parser)]
#[command(name = "strata", version)]
pub struct Command {
    #[command(subcommand)]
    pub cmd: SubCommand,
}

impl Command {
    pub fn run(self) -> error_stack::Result<(), Error> {
        match self.cmd {
            SubCommand::Start(cmd) => cmd.run(),
            SubCommand::StartCluster(cmd) => cmd.run(),
            SubCommand::Generate(cmd) => cmd.run(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum SubCommand {
    /// Start one Strata node of the topology.
    #[command()]
    Start(CommandStart),
    /// Start every topology node as a supervised child process.
    #[command(name = "start-cluster")]
    StartCluster(CommandStartCluster),
    /// Generate command-line interface utilities.
    #[command(name = "gen")]
    Generate(CommandGenerate),
}

#[derive(Debug, Parser)]
pub struct CommandStart {
    /// Configure the node with the given file; if not specified, the
    /// [default configuration][crate::config::Config::default] is used.
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Which node of the topology this process serves.
    #[arg(short, long)]
    node_id: u64,
}

impl CommandStart {
    pub fn run(self) -> error_stack::Result<(), Error> {
        let config = load_config(self.config_file.as_deref())?;
        let node_id = self.node_id;

        strata_runtime::init(&config.runtime);
        ctrlc::set_handler(move || {
            strata_runtime::shutdown();
        })
        .change_context_lazy(|| Error("failed to setup ctrl-c signal handle".to_string()))?;

        let rt = strata_runtime::make_runtime("strata-main", "strata-main", 1);
        rt.block_on(async move {
            strata_telemetry::init(&config.telemetry);
            let state = strata_server::start(node_id, config.cluster)
                .await
                .change_context_lazy(|| {
                    Error("A fatal error has occurred in Strata node process.".to_string())
                })?;
            let shutdown = state.shutdown_handle();
            let _forget = strata_runtime::server_runtime().spawn(async move {
                strata_runtime::wait_shutdown().await;
                shutdown();
            });
            state.await_shutdown().await;
            Ok(())
        })
    }
}

#[derive(Debug, Parser)]
pub struct CommandStartCluster {
    /// Configure the cluster with the given file; the file is handed down to
    /// every node process. If not specified, the default configuration is
    /// used throughout.
    #[arg(short, long)]
    config_file: Option<PathBuf>,
}

impl CommandStartCluster {
    pub fn run(self) -> error_stack::Result<(), Error> {
        let config = load_config(self.config_file.as_deref())?;

        strata_runtime::init(&config.runtime);
        strata_telemetry::init(&config.telemetry);
        ctrlc::set_handler(move || {
            strata_runtime::shutdown();
        })
        .change_context_lazy(|| Error("failed to setup ctrl-c signal handle".to_string()))?;

        let supervisor =
            Supervisor::spawn(&config.cluster.topology, self.config_file.as_deref())
                .change_context_lazy(|| Error("failed to start cluster processes".to_string()))?;
        supervisor
            .wait_ready(Duration::from_secs(10))
            .change_context_lazy(|| Error("cluster did not become ready".to_string()))?;
        log::info!("cluster is up; press ctrl-c to stop");

        let rt = strata_runtime::make_runtime("strata-main", "strata-main", 1);
        rt.block_on(strata_runtime::wait_shutdown());
        supervisor.shutdown();
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct CommandGenerate {
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    cmd: GenerateTarget,
}

#[derive(Debug, Subcommand)]
pub enum GenerateTarget {
    /// Generate the default server config.
    #[command()]
    SampleConfig,
}

impl CommandGenerate {
    pub fn run(self) -> error_stack::Result<(), Error> {
        match self.cmd {
            GenerateTarget::SampleConfig => {
                let config = Config::default();
                let content = toml::to_string(&config).change_context_lazy(|| {
                    Error("default config must be always valid".to_string())
                })?;
                if let Some(output) = self.output {
                    std::fs::write(&output, content).change_context_lazy(|| {
                        Error(format!("failed to write config to {}", output.display()))
                    })?;
                } else {
                    println!("{content}");
                }
            }
        }

        Ok(())
    }
}

fn load_config(file: Option<&Path>) -> error_stack::Result<Config, Error> {
    match file {
        Some(file) => {
            let content = std::fs::read_to_string(file).change_context_lazy(|| {
                Error(format!("failed to read config file: {}", file.display()))
            })?;
            toml::from_str(&content)
                .change_context_lazy(|| Error("failed to parse config content".to_string()))
        }
        None => Ok(Config::default()),
    }
}
