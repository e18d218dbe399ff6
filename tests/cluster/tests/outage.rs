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

use cluster_tests::harness;
use cluster_tests::Testkit;
use strata_client::GetReply;
use strata_protos::Value;
use test_harness::test;

// There is no automatic failover: reads go only to the leader, so a dead
// leader surfaces as a transport error even while followers hold the data.
#[test(harness)]
async fn test_reads_fail_when_leader_is_down(mut testkit: Testkit) {
    let partition_id = 2;
    let key = testkit
        .cluster
        .keys_for_partition(partition_id, 1)
        .remove(0);

    let reply = testkit
        .coordinator
        .put(&key, &Value::Text("x".to_string()))
        .await
        .unwrap();
    assert_eq!(reply, "SUCCESS: Put data to leader.");

    let leader_id = testkit
        .cluster
        .topology()
        .assignment(partition_id)
        .unwrap()
        .leader;
    testkit.cluster.stop_node(leader_id).await;

    match testkit.coordinator.get(&key).await.unwrap() {
        GetReply::Failed(message) => assert!(
            message.starts_with("Error: Connection refused from"),
            "unexpected transport error: {message}"
        ),
        other => panic!("expected a transport failure, got {other:?}"),
    }

    testkit.cluster.shutdown_all().await;
}
