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

pub mod net;

use std::sync::Arc;

use error_stack::Result;
use sha1::Digest;
use sha1::Sha1;
use strata_protos::config::ClusterTopology;
use strata_protos::config::NodeEntry;
use strata_protos::Command;
use strata_protos::Value;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ClientError(String);

/// Outcome of a routed GET.
#[derive(Debug, Clone, PartialEq)]
pub enum GetReply {
    Found(Value),
    NotFound,
    /// The transport layer failed; the message is passed through verbatim.
    Failed(String),
}

/// Stateless client-side router.
///
/// Keys are hashed onto partitions with SHA-1 reduced modulo the partition
/// count, and every command goes to the partition leader's endpoint. The
/// topology is immutable, so routing is deterministic.
#[derive(Debug, Clone)]
pub struct Coordinator {
    topology: Arc<ClusterTopology>,
}

impl Coordinator {
    pub fn new(topology: Arc<ClusterTopology>) -> Result<Self, ClientError> {
        topology
            .validate()
            .map_err(|err| ClientError(format!("invalid topology: {err}")))?;
        Ok(Coordinator { topology })
    }

    /// The partition a key routes to: the SHA-1 digest of the key bytes,
    /// taken as an unsigned big-endian integer, modulo the partition count.
    pub fn partition_for_key(&self, key: &str) -> u64 {
        let digest = Sha1::digest(key.as_bytes());
        let partitions = self.topology.num_partitions();
        // Horner reduction of the 160-bit digest; the modulus is small
        // enough that the accumulator never overflows.
        digest
            .iter()
            .fold(0u64, |rem, byte| (rem * 256 + u64::from(*byte)) % partitions)
    }

    pub async fn put(&self, key: &str, value: &Value) -> Result<String, ClientError> {
        let (partition_id, leader) = self.leader_for_key(key)?;
        log::debug!(
            "routing PUT for key '{key}' to leader of partition {partition_id} at {}:{}",
            leader.host,
            leader.port
        );
        let command = Command::Put {
            partition_id,
            key: key.to_string(),
            value: value.clone(),
        };
        Ok(net::send_request(&leader.host, leader.port, &command.to_string()).await)
    }

    pub async fn get(&self, key: &str) -> Result<GetReply, ClientError> {
        let (partition_id, leader) = self.leader_for_key(key)?;
        log::debug!(
            "routing GET for key '{key}' to leader of partition {partition_id} at {}:{}",
            leader.host,
            leader.port
        );
        let command = Command::Get {
            partition_id,
            key: key.to_string(),
        };
        let reply = net::send_request(&leader.host, leader.port, &command.to_string()).await;

        if reply == "NOT_FOUND" {
            return Ok(GetReply::NotFound);
        }
        if reply.starts_with("Error:") {
            return Ok(GetReply::Failed(reply));
        }
        let json = serde_json::from_str(&reply)
            .map_err(|err| ClientError(format!("failed to parse reply {reply:?}: {err}")))?;
        let value = Value::from_json(json).map_err(|err| ClientError(err.to_string()))?;
        Ok(GetReply::Found(value))
    }

    /// Which tier currently answers for the key on its leader.
    pub async fn status(&self, key: &str) -> Result<String, ClientError> {
        let (partition_id, leader) = self.leader_for_key(key)?;
        let command = Command::Status {
            partition_id,
            key: key.to_string(),
        };
        Ok(net::send_request(&leader.host, leader.port, &command.to_string()).await)
    }

    /// Hex dump of the key's raw cold-storage bytes on its leader.
    pub async fn hex_dump(&self, key: &str) -> Result<String, ClientError> {
        let (partition_id, leader) = self.leader_for_key(key)?;
        let command = Command::Hex {
            partition_id,
            key: key.to_string(),
        };
        Ok(net::send_request(&leader.host, leader.port, &command.to_string()).await)
    }

    fn leader_for_key(&self, key: &str) -> Result<(u64, &NodeEntry), ClientError> {
        let partition_id = self.partition_for_key(key);
        let assignment = self
            .topology
            .assignment(partition_id)
            .ok_or_else(|| ClientError(format!("no assignment for partition {partition_id}")))?;
        let leader = self.topology.node(assignment.leader).ok_or_else(|| {
            ClientError(format!(
                "leader node {} of partition {partition_id} is not in the topology",
                assignment.leader
            ))
        })?;
        Ok((partition_id, leader))
    }
}
