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

use std::sync::Arc;

use strata_client::net;
use strata_protos::config::ClusterTopology;
use strata_protos::Command;
use strata_protos::Value;
use strata_storage::ReplicationSink;

/// Fire-and-forget REPLICATE fan-out to the followers of a partition.
///
/// Each follower gets its own detached task on the server runtime, so a slow
/// or dead follower never stalls the leader. Delivery failures are logged
/// and dropped: not retried, not reported to the writer, never rolled back.
pub(crate) struct Replicator {
    node_id: u64,
    topology: Arc<ClusterTopology>,
}

impl Replicator {
    pub(crate) fn new(node_id: u64, topology: Arc<ClusterTopology>) -> Self {
        Replicator { node_id, topology }
    }
}

impl ReplicationSink for Replicator {
    fn replicate(&self, partition_id: u64, key: &str, value: &Value) {
        let Some(assignment) = self.topology.assignment(partition_id) else {
            return;
        };
        let line = Command::Replicate {
            partition_id,
            key: key.to_string(),
            value: value.clone(),
        }
        .to_string();

        for follower_id in assignment.followers.iter().copied() {
            let Some(follower) = self.topology.node(follower_id) else {
                log::warn!(
                    "partition {partition_id} follower {follower_id} is not in the topology"
                );
                continue;
            };
            let node_id = self.node_id;
            let host = follower.host.clone();
            let port = follower.port;
            let line = line.clone();
            let _forget = strata_runtime::server_runtime().spawn(async move {
                let reply = net::send_request(&host, port, &line).await;
                if !reply.starts_with("SUCCESS") {
                    log::warn!(
                        "node {node_id} failed to replicate partition {partition_id} to node {follower_id}: {reply}"
                    );
                }
            });
        }
    }
}
