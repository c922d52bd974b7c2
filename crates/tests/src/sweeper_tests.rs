use crate::fixtures::test_app::TestApp;
use crate::fixtures::ws::{expect_closed, recv_json, send_json};
use serde_json::{Value, json};
use std::time::Duration;

#[tokio::test]
async fn inactive_room_is_evicted() {
    let app = TestApp::spawn_with_settings(|settings| {
        settings.rooms.inactivity_timeout_secs = 1;
        settings.rooms.sweep_interval_secs = 1;
    })
    .await;
    app.create_robotics_room("w1", "r1").await;

    tokio::time::sleep(Duration::from_secs(3)).await;

    let resp = app
        .client
        .get(app.url("/robotics/workspaces/w1/rooms"))
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["total"], 0);

    // Request surface: NotFound-equivalent.
    let resp = app
        .client
        .get(app.url("/robotics/workspaces/w1/rooms/r1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    // Channel surface: join attempt is closed.
    let mut ws = app
        .connect_ws("/robotics/workspaces/w1/rooms/r1/ws")
        .await;
    send_json(&mut ws, &json!({ "participant_id": "p", "role": "producer" })).await;
    let err = recv_json(&mut ws).await;
    assert_eq!(err["type"], "error");
    assert!(expect_closed(&mut ws).await);
}

#[tokio::test]
async fn connection_activity_keeps_room_alive() {
    let app = TestApp::spawn_with_settings(|settings| {
        settings.rooms.inactivity_timeout_secs = 2;
        settings.rooms.sweep_interval_secs = 1;
    })
    .await;
    app.create_robotics_room("w1", "r1").await;
    let mut producer = app.join_robotics("w1", "r1", "p", "producer").await;

    // Heartbeats refresh the connection's last activity, which feeds the
    // room's effective last activity.
    for _ in 0..8 {
        send_json(&mut producer, &json!({ "type": "heartbeat" })).await;
        let ack = recv_json(&mut producer).await;
        assert_eq!(ack["type"], "heartbeat_ack");
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    let resp = app
        .client
        .get(app.url("/robotics/workspaces/w1/rooms/r1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn eviction_closes_live_participants() {
    let app = TestApp::spawn_with_settings(|settings| {
        settings.rooms.inactivity_timeout_secs = 1;
        settings.rooms.sweep_interval_secs = 1;
    })
    .await;
    app.create_robotics_room("w1", "r1").await;
    let mut producer = app.join_robotics("w1", "r1", "p", "producer").await;

    // Stay silent past the threshold; the sweeper deletes the room and the
    // deletion path closes the channel without waiting.
    assert!(expect_closed(&mut producer).await);

    let resp = app
        .client
        .get(app.url("/robotics/workspaces/w1/rooms/r1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn video_rooms_are_swept_too() {
    let app = TestApp::spawn_with_settings(|settings| {
        settings.rooms.inactivity_timeout_secs = 1;
        settings.rooms.sweep_interval_secs = 1;
    })
    .await;
    app.create_video_room("wv", "rv").await;

    tokio::time::sleep(Duration::from_secs(3)).await;

    let resp = app
        .client
        .get(app.url("/video/workspaces/wv/rooms/rv"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}
