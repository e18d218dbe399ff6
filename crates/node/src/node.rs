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

use std::collections::HashMap;
use std::sync::Arc;

use error_stack::Result;
use error_stack::ResultExt;
use strata_protos::config::ClusterConfig;
use strata_protos::Command;
use strata_protos::Value;
use strata_storage::Partition;
use strata_storage::ReplicationSink;
use strata_storage::Role;
use strata_storage::StorageError;

use crate::replicate::Replicator;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct NodeError(pub(crate) String);

/// One node process: the partitions the topology assigns to it, in their
/// assigned roles, plus the dispatch surface of the wire protocol.
pub struct Node {
    node_id: u64,
    replicas: HashMap<u64, Arc<Partition>>,
}

impl Node {
    /// Builds the node's replicas under `<data_dir>/node_<id>`, recovering
    /// each partition from its segment log. Partitions that assign this node
    /// neither leader nor follower are skipped; only leader replicas get the
    /// replication sink.
    pub fn new(node_id: u64, config: &ClusterConfig) -> Result<Self, NodeError> {
        let topology = Arc::new(config.topology.clone());
        let data_dir = config.data_dir.join(format!("node_{node_id}"));
        let sink: Arc<dyn ReplicationSink> =
            Arc::new(Replicator::new(node_id, topology.clone()));

        let mut replicas = HashMap::new();
        for partition in &topology.partitions {
            let role = if partition.leader == node_id {
                Role::Leader
            } else if partition.followers.contains(&node_id) {
                Role::Follower
            } else {
                continue;
            };
            let replica = Partition::open(
                partition.id,
                role,
                &data_dir,
                config.hot_capacity,
                (role == Role::Leader).then(|| sink.clone()),
            )
            .change_context_lazy(|| {
                NodeError(format!("failed to open partition {}", partition.id))
            })?;
            log::info!("node {node_id} hosting partition {} as {role}", partition.id);
            replicas.insert(partition.id, Arc::new(replica));
        }

        Ok(Node { node_id, replicas })
    }

    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    /// Runs one command and renders the protocol reply. Routing and role
    /// mismatches come back as `ERROR: ...` strings; unexpected failures
    /// (storage, codec) as `SERVER_ERROR: ...` so the one-shot reply
    /// invariant holds no matter what.
    pub async fn dispatch(&self, command: Command) -> String {
        match self.try_dispatch(command).await {
            Ok(reply) => reply,
            Err(err) => format!("SERVER_ERROR: {err}"),
        }
    }

    async fn try_dispatch(&self, command: Command) -> Result<String, NodeError> {
        match command {
            Command::Put {
                partition_id,
                key,
                value,
            } => self.handle_put(partition_id, key, value).await,
            Command::Get { partition_id, key } => self.handle_get(partition_id, key).await,
            Command::Replicate {
                partition_id,
                key,
                value,
            } => self.handle_replicate(partition_id, key, value).await,
            Command::Status { partition_id, key } => Ok(self.handle_status(partition_id, &key)),
            Command::Hex { partition_id, key } => self.handle_hex(partition_id, key).await,
            Command::Inspect => Ok(self.handle_inspect()),
            Command::Shutdown => Ok("SUCCESS: Shutting down.".to_string()),
        }
    }

    async fn handle_put(
        &self,
        partition_id: u64,
        key: String,
        value: Value,
    ) -> Result<String, NodeError> {
        let Some(partition) = self.leader_replica(partition_id) else {
            return Ok("ERROR: Not a leader for this partition.".to_string());
        };
        run_storage(move || partition.put(&key, value)).await?;
        Ok("SUCCESS: Put data to leader.".to_string())
    }

    async fn handle_get(&self, partition_id: u64, key: String) -> Result<String, NodeError> {
        let Some(partition) = self.replicas.get(&partition_id).cloned() else {
            return Ok("ERROR: Partition not found.".to_string());
        };
        let value = run_storage(move || partition.get(&key)).await?;
        Ok(match value {
            Some(value) => value.to_json().to_string(),
            None => "NOT_FOUND".to_string(),
        })
    }

    async fn handle_replicate(
        &self,
        partition_id: u64,
        key: String,
        value: Value,
    ) -> Result<String, NodeError> {
        let replica = self
            .replicas
            .get(&partition_id)
            .filter(|partition| partition.role() == Role::Follower)
            .cloned();
        let Some(partition) = replica else {
            return Ok("ERROR: Not a follower.".to_string());
        };
        run_storage(move || partition.put(&key, value)).await?;
        Ok("SUCCESS: Replicated data.".to_string())
    }

    fn handle_status(&self, partition_id: u64, key: &str) -> String {
        match self.replicas.get(&partition_id) {
            Some(partition) => partition.location(key).to_string(),
            None => "ERROR: Partition not found on this node.".to_string(),
        }
    }

    async fn handle_hex(&self, partition_id: u64, key: String) -> Result<String, NodeError> {
        let Some(partition) = self.replicas.get(&partition_id).cloned() else {
            return Ok("ERROR: Partition not found on this node.".to_string());
        };
        let bytes = run_storage(move || partition.raw_bytes(&key)).await?;
        Ok(match bytes {
            Some(bytes) => hex_string(&bytes),
            None => "NOT_FOUND".to_string(),
        })
    }

    /// Hot buffer contents of every partition on this node.
    fn handle_inspect(&self) -> String {
        let mut summary = serde_json::Map::new();
        for (partition_id, partition) in &self.replicas {
            summary.insert(
                format!("partition_{partition_id}"),
                partition.hot_keys().into(),
            );
        }
        serde_json::to_string_pretty(&serde_json::Value::Object(summary))
            .expect("json value always serializes")
    }

    /// Flushes every replica. Called on the blocking pool from the SHUTDOWN
    /// path and by the bootstrap teardown.
    pub fn close(&self) -> Result<(), NodeError> {
        for partition in self.replicas.values() {
            partition.close().change_context_lazy(|| {
                NodeError(format!(
                    "failed to close partition {}",
                    partition.partition_id()
                ))
            })?;
        }
        Ok(())
    }

    fn leader_replica(&self, partition_id: u64) -> Option<Arc<Partition>> {
        self.replicas
            .get(&partition_id)
            .filter(|partition| partition.role() == Role::Leader)
            .cloned()
    }
}

/// Runs a disk-touching partition operation on the io runtime.
async fn run_storage<T: Send + 'static>(
    func: impl FnOnce() -> Result<T, StorageError> + Send + 'static,
) -> Result<T, NodeError> {
    strata_runtime::io_runtime()
        .spawn_blocking(func)
        .await
        .map_err(|err| NodeError(format!("storage task failed: {err}")))?
        .change_context_lazy(|| NodeError("storage operation failed".to_string()))
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
