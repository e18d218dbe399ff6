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
use std::path::Path;
use std::time::Duration;

use cluster_tests::harness;
use cluster_tests::Testkit;
use strata_protos::Value;
use strata_storage::decode_value;
use strata_storage::segment::scan_log;
use test_harness::test;

/// Decodes a segment log into its effective key → value mapping: later
/// frames supersede earlier ones, exactly like the recovery scan.
fn read_log_contents(path: &Path) -> HashMap<String, Value> {
    let mut contents = HashMap::new();
    for (_, frame) in scan_log(path).unwrap() {
        let value = decode_value(&frame.value_bytes).unwrap().into_value();
        contents.insert(frame.key, value);
    }
    contents
}

#[test(harness)]
async fn test_leader_writes_reach_followers(mut testkit: Testkit) {
    let partition_id = 1;
    // Five keys fill the hot buffer, so both replicas flush to disk.
    let keys = testkit.cluster.keys_for_partition(partition_id, 5);

    for key in &keys {
        let value = Value::Timestamped {
            data: format!("nilai untuk {key}"),
            timestamp: 1700000000,
        };
        let reply = testkit.coordinator.put(key, &value).await.unwrap();
        assert_eq!(reply, "SUCCESS: Put data to leader.");
    }

    // Replication is fire-and-forget; give the fan-out a moment to land.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let assignment = testkit
        .cluster
        .topology()
        .assignment(partition_id)
        .unwrap()
        .clone();

    let leader_log = testkit
        .cluster
        .segment_log_path(assignment.leader, partition_id);
    assert!(leader_log.exists(), "leader segment log missing");
    let leader_contents = read_log_contents(&leader_log);
    assert_eq!(
        leader_contents.keys().cloned().collect::<std::collections::HashSet<_>>(),
        keys.iter().cloned().collect()
    );

    assert!(!assignment.followers.is_empty());
    for follower_id in &assignment.followers {
        let follower_log = testkit.cluster.segment_log_path(*follower_id, partition_id);
        assert!(
            follower_log.exists(),
            "follower {follower_id} segment log missing"
        );
        assert_eq!(
            read_log_contents(&follower_log),
            leader_contents,
            "follower {follower_id} diverged from the leader"
        );
    }

    testkit.cluster.shutdown_all().await;
}
