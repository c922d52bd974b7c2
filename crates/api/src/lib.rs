pub mod error;
pub mod routes;
pub mod state;
pub mod sweeper;
pub mod ws;

use axum::{
    Router,
    routing::{delete, get, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let robotics = Router::new()
        .route("/workspaces/{workspace_id}/rooms", get(routes::robotics::list))
        .route("/workspaces/{workspace_id}/rooms", post(routes::robotics::create))
        .route(
            "/workspaces/{workspace_id}/rooms/{room_id}",
            get(routes::robotics::info),
        )
        .route(
            "/workspaces/{workspace_id}/rooms/{room_id}",
            delete(routes::robotics::remove),
        )
        .route(
            "/workspaces/{workspace_id}/rooms/{room_id}/state",
            get(routes::robotics::room_state),
        )
        .route(
            "/workspaces/{workspace_id}/rooms/{room_id}/command",
            post(routes::robotics::command),
        )
        .route(
            "/workspaces/{workspace_id}/rooms/{room_id}/ws",
            get(ws::robotics::ws_upgrade),
        );

    let video = Router::new()
        .route("/workspaces/{workspace_id}/rooms", get(routes::video::list))
        .route("/workspaces/{workspace_id}/rooms", post(routes::video::create))
        .route(
            "/workspaces/{workspace_id}/rooms/{room_id}",
            get(routes::video::info),
        )
        .route(
            "/workspaces/{workspace_id}/rooms/{room_id}",
            delete(routes::video::remove),
        )
        .route(
            "/workspaces/{workspace_id}/rooms/{room_id}/state",
            get(routes::video::room_state),
        )
        .route(
            "/workspaces/{workspace_id}/rooms/{room_id}/webrtc/signal",
            post(routes::video::signal),
        )
        .route(
            "/workspaces/{workspace_id}/rooms/{room_id}/ws",
            get(ws::video::ws_upgrade),
        );

    let static_dir = state.settings.server.static_dir.clone();

    let mut app = Router::new()
        .nest("/robotics", robotics)
        .nest("/video", video)
        .route("/health", get(health_check));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "server_running": true,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
