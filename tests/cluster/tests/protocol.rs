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

use std::time::Duration;

use cluster_tests::harness;
use cluster_tests::Testkit;
use insta::assert_compact_debug_snapshot;
use strata_client::net;
use strata_storage::decode_value;
use strata_storage::segment::scan_log;
use strata_storage::DecodedValue;
use test_harness::test;

#[test(harness)]
async fn test_one_shot_protocol_surface(mut testkit: Testkit) {
    let topology = testkit.cluster.topology().clone();
    let assignment = topology.assignment(0).unwrap().clone();
    let leader = topology.node(assignment.leader).unwrap().clone();
    let follower_id = assignment.followers[0];
    let follower = topology.node(follower_id).unwrap().clone();

    let reply = net::send_request(&leader.host, leader.port, r#"PUT 0 nama "Andi""#).await;
    assert_compact_debug_snapshot!(reply, @r###""SUCCESS: Put data to leader.""###);

    let reply = net::send_request(&leader.host, leader.port, "GET 0 nama").await;
    assert_compact_debug_snapshot!(reply, @r###""\"Andi\"""###);

    let reply = net::send_request(&leader.host, leader.port, "STATUS 0 nama").await;
    assert_compact_debug_snapshot!(reply, @r###""HOT_STORAGE""###);

    let reply = net::send_request(&leader.host, leader.port, "GET 0 hilang").await;
    assert_compact_debug_snapshot!(reply, @r###""NOT_FOUND""###);

    // A key that never left the hot buffer has no cold bytes to dump.
    let reply = net::send_request(&leader.host, leader.port, "HEX 0 nama").await;
    assert_compact_debug_snapshot!(reply, @r###""NOT_FOUND""###);

    // Writes only go through the leader; REPLICATE only lands on followers.
    let reply = net::send_request(&follower.host, follower.port, r#"PUT 0 k "v""#).await;
    assert_compact_debug_snapshot!(reply, @r###""ERROR: Not a leader for this partition.""###);

    let reply = net::send_request(&leader.host, leader.port, r#"REPLICATE 0 k "v""#).await;
    assert_compact_debug_snapshot!(reply, @r###""ERROR: Not a follower.""###);

    let reply = net::send_request(&leader.host, leader.port, "GET 9 k").await;
    assert_compact_debug_snapshot!(reply, @r###""ERROR: Partition not found.""###);

    let reply = net::send_request(&leader.host, leader.port, "FROB 0 k").await;
    assert_compact_debug_snapshot!(reply, @r###""ERROR: Invalid command""###);

    let summary: serde_json::Value = serde_json::from_str(
        &net::send_request(&leader.host, leader.port, "INSPECT").await,
    )
    .unwrap();
    assert_eq!(summary["partition_0"], serde_json::json!(["nama"]));

    // Let the fire-and-forget fan-out of the PUT land on the follower, then
    // take the follower down over the wire. SHUTDOWN flushes its hot
    // buffers, so the replicated key must be in its segment log.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let reply = net::send_request(&follower.host, follower.port, "SHUTDOWN").await;
    assert_compact_debug_snapshot!(reply, @r###""SUCCESS: Shutting down.""###);

    let follower_log = testkit.cluster.segment_log_path(follower_id, 0);
    let frames = scan_log(&follower_log).unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].1.key, "nama");
    assert_eq!(
        decode_value(&frames[0].1.value_bytes).unwrap(),
        DecodedValue::V1("Andi".to_string())
    );

    testkit.cluster.shutdown_all().await;
}
