use crate::fixtures::test_app::TestApp;
use crate::fixtures::ws::{expect_closed, recv_json, recv_until_type, send_json};
use serde_json::{Value, json};
use std::time::Duration;

#[tokio::test]
async fn producer_receives_joined() {
    let app = TestApp::spawn().await;
    app.create_robotics_room("w1", "r1").await;

    let mut ws = app
        .connect_ws("/robotics/workspaces/w1/rooms/r1/ws")
        .await;
    send_json(&mut ws, &json!({ "participant_id": "p1", "role": "producer" })).await;

    let joined = recv_json(&mut ws).await;
    assert_eq!(joined["type"], "joined");
    assert_eq!(joined["workspace_id"], "w1");
    assert_eq!(joined["room_id"], "r1");
    assert_eq!(joined["role"], "producer");
    assert!(joined["timestamp"].is_string());
}

#[tokio::test]
async fn consumer_receives_empty_state_sync_then_joined() {
    let app = TestApp::spawn().await;
    app.create_robotics_room("w1", "r1").await;

    let mut ws = app
        .connect_ws("/robotics/workspaces/w1/rooms/r1/ws")
        .await;
    send_json(&mut ws, &json!({ "participant_id": "c1", "role": "consumer" })).await;

    let sync = recv_json(&mut ws).await;
    assert_eq!(sync["type"], "state_sync");
    assert_eq!(sync["data"], json!({}));

    let joined = recv_json(&mut ws).await;
    assert_eq!(joined["type"], "joined");
    assert_eq!(joined["role"], "consumer");
}

#[tokio::test]
async fn joint_update_delta_and_duplicate_elision() {
    let app = TestApp::spawn().await;
    app.create_robotics_room("w1", "r1").await;
    let mut producer = app.join_robotics("w1", "r1", "p", "producer").await;
    let mut consumer = app.join_robotics("w1", "r1", "c", "consumer").await;

    send_json(
        &mut producer,
        &json!({ "type": "joint_update", "data": [{ "name": "a", "value": 1.0 }] }),
    )
    .await;

    let update = recv_until_type(&mut consumer, "joint_update").await;
    assert_eq!(update["data"], json!([{ "name": "a", "value": 1.0 }]));
    assert_eq!(update["source"], "p");
    assert!(update["timestamp"].is_string());

    // The identical payload again: elided entirely. A third, different
    // update proves nothing was queued in between.
    send_json(
        &mut producer,
        &json!({ "type": "joint_update", "data": [{ "name": "a", "value": 1.0 }] }),
    )
    .await;
    send_json(
        &mut producer,
        &json!({ "type": "joint_update", "data": [{ "name": "a", "value": 2.0 }] }),
    )
    .await;

    let update = recv_until_type(&mut consumer, "joint_update").await;
    assert_eq!(update["data"], json!([{ "name": "a", "value": 2.0 }]));
}

#[tokio::test]
async fn mixed_update_broadcasts_changed_joints_only() {
    let app = TestApp::spawn().await;
    app.create_robotics_room("w1", "r1").await;
    let mut producer = app.join_robotics("w1", "r1", "p", "producer").await;
    let mut consumer = app.join_robotics("w1", "r1", "c", "consumer").await;

    send_json(
        &mut producer,
        &json!({ "type": "joint_update", "data": [
            { "name": "shoulder", "value": 45.0 },
            { "name": "elbow", "value": -20.0 },
        ]}),
    )
    .await;
    recv_until_type(&mut consumer, "joint_update").await;

    send_json(
        &mut producer,
        &json!({ "type": "joint_update", "data": [
            { "name": "shoulder", "value": 45.0 },
            { "name": "elbow", "value": -25.0 },
        ]}),
    )
    .await;

    let update = recv_until_type(&mut consumer, "joint_update").await;
    assert_eq!(update["data"], json!([{ "name": "elbow", "value": -25.0 }]));
}

#[tokio::test]
async fn late_consumer_receives_cumulative_snapshot() {
    let app = TestApp::spawn().await;
    app.create_robotics_room("w1", "r1").await;
    let mut producer = app.join_robotics("w1", "r1", "p", "producer").await;
    let mut witness = app.join_robotics("w1", "r1", "c0", "consumer").await;

    send_json(
        &mut producer,
        &json!({ "type": "joint_update", "data": [{ "name": "shoulder", "value": 45.0 }] }),
    )
    .await;
    recv_until_type(&mut witness, "joint_update").await;

    send_json(
        &mut producer,
        &json!({ "type": "joint_update", "data": [{ "name": "elbow", "value": -20.0 }] }),
    )
    .await;
    recv_until_type(&mut witness, "joint_update").await;

    // Both updates are in the authoritative map; the late joiner gets them
    // in its snapshot before anything else.
    let mut late = app
        .connect_ws("/robotics/workspaces/w1/rooms/r1/ws")
        .await;
    send_json(&mut late, &json!({ "participant_id": "c1", "role": "consumer" })).await;

    let sync = recv_json(&mut late).await;
    assert_eq!(sync["type"], "state_sync");
    assert_eq!(sync["data"]["shoulder"], 45.0);
    assert_eq!(sync["data"]["elbow"], -20.0);
}

#[tokio::test]
async fn second_producer_is_rejected_and_first_survives() {
    let app = TestApp::spawn().await;
    app.create_robotics_room("w2", "r2").await;
    let mut first = app.join_robotics("w2", "r2", "p1", "producer").await;
    let mut consumer = app.join_robotics("w2", "r2", "c", "consumer").await;

    let mut second = app
        .connect_ws("/robotics/workspaces/w2/rooms/r2/ws")
        .await;
    send_json(&mut second, &json!({ "participant_id": "p2", "role": "producer" })).await;

    let err = recv_json(&mut second).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["message"], "Cannot join room");
    assert!(expect_closed(&mut second).await);

    // The original producer still holds the slot.
    send_json(
        &mut first,
        &json!({ "type": "joint_update", "data": [{ "name": "a", "value": 1.0 }] }),
    )
    .await;
    let update = recv_until_type(&mut consumer, "joint_update").await;
    assert_eq!(update["source"], "p1");
}

#[tokio::test]
async fn duplicate_participant_id_is_rejected() {
    let app = TestApp::spawn().await;
    app.create_robotics_room("w1", "r1").await;
    let _producer = app.join_robotics("w1", "r1", "x", "producer").await;

    // Same identifier, different role: rejected while the first is live.
    let mut dup = app
        .connect_ws("/robotics/workspaces/w1/rooms/r1/ws")
        .await;
    send_json(&mut dup, &json!({ "participant_id": "x", "role": "consumer" })).await;

    let err = recv_json(&mut dup).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["message"], "Cannot join room");
    assert!(expect_closed(&mut dup).await);
}

#[tokio::test]
async fn rejoin_after_disconnect_succeeds() {
    let app = TestApp::spawn().await;
    app.create_robotics_room("w1", "r1").await;

    let producer = app.join_robotics("w1", "r1", "p", "producer").await;
    drop(producer);

    // The slot frees once the disconnect is processed; retry briefly.
    let mut attempts = 0;
    loop {
        let mut ws = app
            .connect_ws("/robotics/workspaces/w1/rooms/r1/ws")
            .await;
        send_json(&mut ws, &json!({ "participant_id": "p", "role": "producer" })).await;
        let msg = recv_json(&mut ws).await;
        if msg["type"] == "joined" {
            break;
        }
        attempts += 1;
        assert!(attempts < 50, "producer slot never freed");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn heartbeat_is_acknowledged() {
    let app = TestApp::spawn().await;
    app.create_robotics_room("w1", "r1").await;
    let mut producer = app.join_robotics("w1", "r1", "p", "producer").await;

    send_json(&mut producer, &json!({ "type": "heartbeat" })).await;
    let ack = recv_until_type(&mut producer, "heartbeat_ack").await;
    assert!(ack["timestamp"].is_string());
}

#[tokio::test]
async fn emergency_stop_reaches_everyone_including_sender() {
    let app = TestApp::spawn().await;
    app.create_robotics_room("w1", "r1").await;
    let mut producer = app.join_robotics("w1", "r1", "p", "producer").await;
    let mut c1 = app.join_robotics("w1", "r1", "c1", "consumer").await;
    let mut c2 = app.join_robotics("w1", "r1", "c2", "consumer").await;

    send_json(&mut c1, &json!({ "type": "emergency_stop", "reason": "x" })).await;

    for ws in [&mut producer, &mut c1, &mut c2] {
        let stop = recv_until_type(ws, "emergency_stop").await;
        assert_eq!(stop["reason"], "x");
        assert_eq!(stop["source"], "c1");
    }
}

#[tokio::test]
async fn unknown_message_type_gets_error_without_close() {
    let app = TestApp::spawn().await;
    app.create_robotics_room("w1", "r1").await;
    let mut producer = app.join_robotics("w1", "r1", "p", "producer").await;

    send_json(&mut producer, &json!({ "type": "state_sync", "data": {} })).await;
    let err = recv_json(&mut producer).await;
    assert_eq!(err["type"], "error");

    // The channel is still usable.
    send_json(&mut producer, &json!({ "type": "heartbeat" })).await;
    let ack = recv_until_type(&mut producer, "heartbeat_ack").await;
    assert_eq!(ack["type"], "heartbeat_ack");
}

#[tokio::test]
async fn consumer_cannot_send_joint_updates() {
    let app = TestApp::spawn().await;
    app.create_robotics_room("w1", "r1").await;
    let _producer = app.join_robotics("w1", "r1", "p", "producer").await;
    let mut consumer = app.join_robotics("w1", "r1", "c", "consumer").await;

    send_json(
        &mut consumer,
        &json!({ "type": "joint_update", "data": [{ "name": "a", "value": 9.0 }] }),
    )
    .await;
    let err = recv_until_type(&mut consumer, "error").await;
    assert_eq!(err["code"], "FORBIDDEN");

    // The authoritative map is untouched.
    let resp = app
        .client
        .get(app.url("/robotics/workspaces/w1/rooms/r1/state"))
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["state"]["joints"], json!({}));
}

#[tokio::test]
async fn malformed_join_closes_channel() {
    let app = TestApp::spawn().await;
    app.create_robotics_room("w1", "r1").await;

    let mut ws = app
        .connect_ws("/robotics/workspaces/w1/rooms/r1/ws")
        .await;
    send_json(&mut ws, &json!({ "type": "heartbeat" })).await;

    let err = recv_json(&mut ws).await;
    assert_eq!(err["type"], "error");
    assert!(expect_closed(&mut ws).await);
}

#[tokio::test]
async fn join_nonexistent_room_closes_channel() {
    let app = TestApp::spawn().await;

    let mut ws = app
        .connect_ws("/robotics/workspaces/w1/rooms/ghost/ws")
        .await;
    send_json(&mut ws, &json!({ "participant_id": "p", "role": "producer" })).await;

    let err = recv_json(&mut ws).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], "NOT_FOUND");
    assert!(expect_closed(&mut ws).await);
}

#[tokio::test]
async fn peers_see_join_and_leave_events() {
    let app = TestApp::spawn().await;
    app.create_robotics_room("w1", "r1").await;
    let mut producer = app.join_robotics("w1", "r1", "p", "producer").await;

    let consumer = app.join_robotics("w1", "r1", "c", "consumer").await;
    let joined = recv_until_type(&mut producer, "participant_joined").await;
    assert_eq!(joined["participant_id"], "c");
    assert_eq!(joined["role"], "consumer");

    drop(consumer);
    let left = recv_until_type(&mut producer, "participant_left").await;
    assert_eq!(left["participant_id"], "c");
    assert_eq!(left["role"], "consumer");
}

#[tokio::test]
async fn api_command_runs_the_state_delta_path() {
    let app = TestApp::spawn().await;
    app.create_robotics_room("w1", "r1").await;
    let mut consumer = app.join_robotics("w1", "r1", "c", "consumer").await;

    let resp = app
        .client
        .post(app.url("/robotics/workspaces/w1/rooms/r1/command"))
        .json(&json!({ "joints": [
            { "name": "shoulder", "value": 45.0 },
            { "name": "elbow", "value": -20.0 },
        ]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["joints_changed"], 2);

    let update = recv_until_type(&mut consumer, "joint_update").await;
    assert_eq!(update["source"], "api");
    assert_eq!(update["data"].as_array().unwrap().len(), 2);

    // The same payload again changes nothing.
    let resp = app
        .client
        .post(app.url("/robotics/workspaces/w1/rooms/r1/command"))
        .json(&json!({ "joints": [
            { "name": "shoulder", "value": 45.0 },
            { "name": "elbow", "value": -20.0 },
        ]}))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["joints_changed"], 0);
}

#[tokio::test]
async fn empty_command_broadcasts_nothing_and_returns_zero() {
    let app = TestApp::spawn().await;
    app.create_robotics_room("w1", "r1").await;
    let mut consumer = app.join_robotics("w1", "r1", "c", "consumer").await;

    let resp = app
        .client
        .post(app.url("/robotics/workspaces/w1/rooms/r1/command"))
        .json(&json!({ "joints": [] }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["joints_changed"], 0);

    crate::fixtures::ws::expect_silence(&mut consumer, Duration::from_millis(300)).await;
}

#[tokio::test]
async fn command_on_missing_room_is_404() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/robotics/workspaces/w1/rooms/ghost/command"))
        .json(&json!({ "joints": [{ "name": "a", "value": 1.0 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}
