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

use std::path::PathBuf;
use std::sync::Arc;

use strata_client::Coordinator;
use strata_protos::config::ClusterConfig;
use strata_protos::config::ClusterTopology;
use strata_protos::config::NodeEntry;
use strata_protos::config::PartitionEntry;
use strata_server::ServerState;
use tempfile::TempDir;

/// Derives a readable test name from the test body's future type.
pub fn make_test_name<Fut>() -> String {
    let type_name = std::any::type_name::<Fut>();
    type_name
        .trim_end_matches("::{{closure}}")
        .rsplit("::")
        .next()
        .unwrap_or(type_name)
        .to_string()
}

/// Builds a ring topology on ephemeral localhost ports: partition `i` is led
/// by node `i % nodes` and followed by the next node in the ring.
pub fn make_test_topology(nodes: u64, partitions: u64) -> ClusterTopology {
    let entries = (0..nodes)
        .map(|id| NodeEntry {
            id,
            host: "127.0.0.1".to_string(),
            port: pick_free_port(),
        })
        .collect();
    let assignments = (0..partitions)
        .map(|id| {
            let leader = id % nodes;
            let followers = if nodes > 1 {
                vec![(leader + 1) % nodes]
            } else {
                Vec::new()
            };
            PartitionEntry {
                id,
                leader,
                followers,
            }
        })
        .collect();
    ClusterTopology {
        nodes: entries,
        partitions: assignments,
    }
}

fn pick_free_port() -> u16 {
    // Bind-then-drop; the port stays free long enough for the node to claim
    // it right after.
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))
        .expect("failed to bind an ephemeral port");
    listener
        .local_addr()
        .expect("listener has a local address")
        .port()
}

/// A fully started in-process cluster rooted in its own scratch directory.
/// Every topology node runs its accept loop on the shared test runtimes but
/// owns its partitions and data directory exactly as a real process would.
// Field order matters: the server states wind down before the scratch
// directory is removed.
pub struct TestCluster {
    config: ClusterConfig,
    states: Vec<Option<ServerState>>,
    _data_dir: TempDir,
}

pub async fn start_test_cluster(test_name: &str, nodes: u64, partitions: u64) -> TestCluster {
    let data_dir = tempfile::Builder::new()
        .prefix(&format!("strata-{test_name}-"))
        .tempdir()
        .expect("failed to create a scratch directory");

    let config = ClusterConfig {
        topology: make_test_topology(nodes, partitions),
        data_dir: data_dir.path().to_path_buf(),
        hot_capacity: 5,
    };

    let mut states = Vec::new();
    for node in &config.topology.nodes {
        let state = strata_server::start(node.id, config.clone())
            .await
            .expect("failed to start a test node");
        log::info!("test node {} serving at {}", node.id, state.advertise_addr());
        states.push(Some(state));
    }

    TestCluster {
        config,
        states,
        _data_dir: data_dir,
    }
}

impl TestCluster {
    pub fn topology(&self) -> &ClusterTopology {
        &self.config.topology
    }

    pub fn coordinator(&self) -> Coordinator {
        Coordinator::new(Arc::new(self.config.topology.clone())).expect("test topology is valid")
    }

    /// Path of one partition's segment log under a given node.
    pub fn segment_log_path(&self, node_id: u64, partition_id: u64) -> PathBuf {
        self.config
            .data_dir
            .join(format!("node_{node_id}"))
            .join(format!("partition_{partition_id}"))
            .join("segment.log")
    }

    /// Stops one node's accept loop, as if the process died: its port
    /// refuses connections afterwards. Nothing is flushed.
    pub async fn stop_node(&mut self, node_id: u64) {
        let index = self
            .config
            .topology
            .nodes
            .iter()
            .position(|node| node.id == node_id)
            .expect("node id exists in the topology");
        if let Some(state) = self.states[index].take() {
            state.shutdown();
            state.await_shutdown().await;
        }
    }

    pub async fn shutdown_all(&mut self) {
        for state in &mut self.states {
            if let Some(state) = state.take() {
                state.shutdown();
                state.await_shutdown().await;
            }
        }
    }

    /// Deterministic keys that the coordinator routes to the given
    /// partition.
    pub fn keys_for_partition(&self, partition_id: u64, count: usize) -> Vec<String> {
        let coordinator = self.coordinator();
        let mut keys = Vec::new();
        let mut i = 0u64;
        while keys.len() < count {
            let candidate = format!("testkey:{i}");
            if coordinator.partition_for_key(&candidate) == partition_id {
                keys.push(candidate);
            }
            i += 1;
        }
        keys
    }
}
