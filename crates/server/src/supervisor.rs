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
use std::process::Child;
use std::time::Duration;
use std::time::Instant;

use error_stack::Result;
use strata_client::net;
use strata_protos::config::ClusterTopology;

use crate::ServerError;

/// Runs one OS process per topology node, re-invoking the current
/// executable's `start` subcommand. Readiness is observed from the outside
/// (the node's port accepting connections) and teardown goes through the
/// wire protocol's SHUTDOWN, falling back to killing the child.
pub struct Supervisor {
    children: Vec<NodeProcess>,
}

struct NodeProcess {
    node_id: u64,
    host: String,
    port: u16,
    child: Child,
}

impl Supervisor {
    /// Spawns `<current_exe> start --node-id <id> [--config-file <file>]`
    /// for every node in the topology.
    pub fn spawn(
        topology: &ClusterTopology,
        config_file: Option<&Path>,
    ) -> Result<Self, ServerError> {
        let exe = std::env::current_exe().map_err(|err| {
            ServerError(format!("failed to resolve the current executable: {err}"))
        })?;

        let mut children = Vec::new();
        for node in &topology.nodes {
            let mut command = std::process::Command::new(&exe);
            command.arg("start").arg("--node-id").arg(node.id.to_string());
            if let Some(config_file) = config_file {
                command.arg("--config-file").arg(config_file);
            }
            let child = command
                .spawn()
                .map_err(|err| ServerError(format!("failed to spawn node {}: {err}", node.id)))?;
            log::info!("started node {} process (pid {})", node.id, child.id());
            children.push(NodeProcess {
                node_id: node.id,
                host: node.host.clone(),
                port: node.port,
                child,
            });
        }

        Ok(Supervisor { children })
    }

    /// Polls every node's endpoint until it accepts connections or the
    /// deadline passes.
    pub fn wait_ready(&self, timeout: Duration) -> Result<(), ServerError> {
        let deadline = Instant::now() + timeout;
        for node in &self.children {
            loop {
                match std::net::TcpStream::connect((node.host.as_str(), node.port)) {
                    Ok(_) => break,
                    Err(_) if Instant::now() < deadline => {
                        std::thread::sleep(Duration::from_millis(100))
                    }
                    Err(err) => {
                        return Err(ServerError(format!(
                            "node {} not ready at {}:{}: {err}",
                            node.node_id, node.host, node.port
                        ))
                        .into())
                    }
                }
            }
            log::info!("node {} is ready at {}:{}", node.node_id, node.host, node.port);
        }
        Ok(())
    }

    /// Asks every node to SHUTDOWN over the wire and reaps the children.
    /// A node that does not acknowledge is killed instead.
    pub fn shutdown(mut self) {
        for node in &mut self.children {
            let reply = strata_runtime::server_runtime().block_on(net::send_request(
                &node.host,
                node.port,
                "SHUTDOWN",
            ));
            if reply.starts_with("SUCCESS") {
                match node.child.wait() {
                    Ok(status) => log::info!("node {} exited: {status}", node.node_id),
                    Err(err) => log::warn!("failed to reap node {}: {err}", node.node_id),
                }
            } else {
                log::warn!(
                    "node {} did not acknowledge shutdown ({reply}); killing the process",
                    node.node_id
                );
                let _ = node.child.kill();
                let _ = node.child.wait();
            }
        }
    }
}
