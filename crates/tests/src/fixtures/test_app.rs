use robolink_api::{build_router, state::AppState, sweeper};
use robolink_config::{Settings, settings::{RoomSettings, ServerSettings}};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use super::ws::WsStream;

/// A running transport server bound to an ephemeral port. Each test gets its
/// own process state; nothing is shared between spawns.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub settings: Settings,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_settings(|_| {}).await
    }

    /// Spawn a test server with customized settings.
    ///
    /// The `mutator` closure receives a `&mut Settings` after defaults are
    /// applied, allowing tests to tweak specific fields (e.g., the sweeper
    /// cadence).
    pub async fn spawn_with_settings(mutator: impl FnOnce(&mut Settings)) -> Self {
        let mut settings = test_settings();
        mutator(&mut settings);

        let app_state = AppState::new(settings.clone());
        sweeper::spawn(app_state.clone());
        let app = build_router(app_state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::new();

        Self {
            addr,
            base_url,
            settings,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Creates a robotics room and asserts success.
    pub async fn create_robotics_room(&self, workspace_id: &str, room_id: &str) {
        let resp = self
            .client
            .post(self.url(&format!("/robotics/workspaces/{workspace_id}/rooms")))
            .json(&serde_json::json!({ "room_id": room_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    /// Creates a video room and asserts success.
    pub async fn create_video_room(&self, workspace_id: &str, room_id: &str) {
        let resp = self
            .client
            .post(self.url(&format!("/video/workspaces/{workspace_id}/rooms")))
            .json(&serde_json::json!({ "room_id": room_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    /// Opens a raw WebSocket to the given path.
    pub async fn connect_ws(&self, path: &str) -> WsStream {
        let (stream, _) = tokio_tungstenite::connect_async(self.ws_url(path))
            .await
            .expect("Failed to open WebSocket");
        stream
    }

    /// Opens a robotics channel and completes the join handshake, draining
    /// the welcome frames (state_sync for consumers, then joined).
    pub async fn join_robotics(
        &self,
        workspace_id: &str,
        room_id: &str,
        participant_id: &str,
        role: &str,
    ) -> WsStream {
        let mut stream = self
            .connect_ws(&format!(
                "/robotics/workspaces/{workspace_id}/rooms/{room_id}/ws"
            ))
            .await;
        super::ws::send_json(
            &mut stream,
            &serde_json::json!({ "participant_id": participant_id, "role": role }),
        )
        .await;
        if role == "consumer" {
            let sync = super::ws::recv_json(&mut stream).await;
            assert_eq!(sync["type"], "state_sync");
        }
        let joined = super::ws::recv_json(&mut stream).await;
        assert_eq!(joined["type"], "joined");
        stream
    }

    /// Opens a video channel and completes the join handshake.
    pub async fn join_video(
        &self,
        workspace_id: &str,
        room_id: &str,
        participant_id: &str,
        role: &str,
    ) -> WsStream {
        let mut stream = self
            .connect_ws(&format!(
                "/video/workspaces/{workspace_id}/rooms/{room_id}/ws"
            ))
            .await;
        super::ws::send_json(
            &mut stream,
            &serde_json::json!({ "participant_id": participant_id, "role": role }),
        )
        .await;
        let joined = super::ws::recv_json(&mut stream).await;
        assert_eq!(joined["type"], "joined");
        stream
    }
}

fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            static_dir: None,
            cors_origins: Vec::new(),
        },
        rooms: RoomSettings {
            inactivity_timeout_secs: 3600,
            sweep_interval_secs: 900,
        },
    }
}
