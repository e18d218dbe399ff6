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

use std::collections::HashSet;

use cluster_tests::harness;
use cluster_tests::Testkit;
use strata_client::GetReply;
use strata_protos::Value;
use test_harness::test;

const KEYS: [&str; 8] = [
    "user:101",
    "user:102",
    "product:A1",
    "product:B2",
    "session:xyz",
    "session:abc",
    "user:103",
    "product:C3",
];

#[test(harness)]
async fn test_sharded_put_and_readback(mut testkit: Testkit) {
    for key in KEYS {
        let reply = testkit
            .coordinator
            .put(key, &Value::Text(format!("value of {key}")))
            .await
            .unwrap();
        assert_eq!(reply, "SUCCESS: Put data to leader.");
    }

    for key in KEYS {
        let reply = testkit.coordinator.get(key).await.unwrap();
        assert_eq!(
            reply,
            GetReply::Found(Value::Text(format!("value of {key}"))),
            "readback of {key}"
        );
    }

    // The keyspace must actually distribute, not pile onto one partition.
    let partitions: HashSet<u64> = KEYS
        .iter()
        .map(|key| testkit.coordinator.partition_for_key(key))
        .collect();
    assert!(
        partitions.len() >= 2,
        "expected at least two partitions, got {partitions:?}"
    );

    testkit.cluster.shutdown_all().await;
}

#[test(harness)]
async fn test_overwrite_reads_latest_value(mut testkit: Testkit) {
    let key = "user:101";
    testkit
        .coordinator
        .put(key, &Value::Text("old".to_string()))
        .await
        .unwrap();
    testkit
        .coordinator
        .put(key, &Value::Text("new".to_string()))
        .await
        .unwrap();

    let reply = testkit.coordinator.get(key).await.unwrap();
    assert_eq!(reply, GetReply::Found(Value::Text("new".to_string())));

    let missing = testkit.coordinator.get("user:999").await.unwrap();
    assert_eq!(missing, GetReply::NotFound);

    testkit.cluster.shutdown_all().await;
}
