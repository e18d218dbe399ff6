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

mod runtime;
pub use runtime::*;

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// One node of the cluster and where to reach it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeEntry {
    pub id: u64,
    pub host: String,
    pub port: u16,
}

/// Role assignment for one partition: exactly one leader, any number of
/// followers (possibly none).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartitionEntry {
    pub id: u64,
    pub leader: u64,
    #[serde(default)]
    pub followers: Vec<u64>,
}

/// The static cluster topology. Loaded once at startup and shared read-only
/// by coordinators and nodes; routing is deterministic because it never
/// changes at runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterTopology {
    pub nodes: Vec<NodeEntry>,
    pub partitions: Vec<PartitionEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("topology defines no partitions")]
    NoPartitions,
    #[error("duplicate node id {0}")]
    DuplicateNode(u64),
    #[error("partition ids must be exactly 0..{expected}")]
    NonContiguousPartitions { expected: u64 },
    #[error("partition {partition} references unknown node {node}")]
    UnknownNode { partition: u64, node: u64 },
    #[error("node {node} is both leader and follower of partition {partition}")]
    LeaderAlsoFollower { node: u64, partition: u64 },
}

impl ClusterTopology {
    pub fn num_partitions(&self) -> u64 {
        self.partitions.len() as u64
    }

    pub fn node(&self, node_id: u64) -> Option<&NodeEntry> {
        self.nodes.iter().find(|node| node.id == node_id)
    }

    pub fn assignment(&self, partition_id: u64) -> Option<&PartitionEntry> {
        self.partitions
            .iter()
            .find(|partition| partition.id == partition_id)
    }

    /// Checks the invariants routing relies on. Key hashing reduces modulo
    /// the partition count, so partition ids must cover `0..N` exactly; every
    /// referenced node must exist; and a node may not be both leader and
    /// follower of the same partition.
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.partitions.is_empty() {
            return Err(TopologyError::NoPartitions);
        }

        let mut seen = std::collections::HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id) {
                return Err(TopologyError::DuplicateNode(node.id));
            }
        }

        let expected = self.num_partitions();
        for partition_id in 0..expected {
            if self.assignment(partition_id).is_none() {
                return Err(TopologyError::NonContiguousPartitions { expected });
            }
        }

        for partition in &self.partitions {
            for node in std::iter::once(partition.leader).chain(partition.followers.iter().copied())
            {
                if self.node(node).is_none() {
                    return Err(TopologyError::UnknownNode {
                        partition: partition.id,
                        node,
                    });
                }
            }
            if partition.followers.contains(&partition.leader) {
                return Err(TopologyError::LeaderAlsoFollower {
                    node: partition.leader,
                    partition: partition.id,
                });
            }
        }

        Ok(())
    }
}

impl Default for ClusterTopology {
    /// The local development deployment: three nodes on localhost, four
    /// partitions, each leader shadowed by one follower.
    fn default() -> Self {
        let node = |id, port| NodeEntry {
            id,
            host: "localhost".to_string(),
            port,
        };
        let partition = |id, leader, follower| PartitionEntry {
            id,
            leader,
            followers: vec![follower],
        };
        ClusterTopology {
            nodes: vec![node(0, 8000), node(1, 8001), node(2, 8002)],
            partitions: vec![
                partition(0, 0, 1),
                partition(1, 1, 2),
                partition(2, 2, 0),
                partition(3, 0, 2),
            ],
        }
    }
}

/// Cluster-wide storage settings shared by every node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    /// Root of the on-disk layout; each node stores its partitions under
    /// `<data_dir>/node_<id>/partition_<id>/segment.log`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Hot buffer entries per partition before a flush is forced.
    #[serde(default = "default_hot_capacity")]
    pub hot_capacity: usize,
    pub topology: ClusterTopology,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_hot_capacity() -> usize {
    5
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            topology: ClusterTopology::default(),
            data_dir: default_data_dir(),
            hot_capacity: default_hot_capacity(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    pub logs: LogsConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<StderrAppenderConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StderrAppenderConfig {
    pub filter: String,
}
