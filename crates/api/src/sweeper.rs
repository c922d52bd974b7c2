use chrono::{DateTime, TimeDelta, Utc};
use robolink_services::registry::{Registry, RegistryRoom};
use std::time::Duration;
use tracing::{debug, info};

use crate::state::AppState;
use crate::ws::storage::ConnectionTable;

/// Spawns one background eviction loop per service. Rooms whose effective
/// last activity (room timestamp or any live connection's, whichever is
/// newer) predates the inactivity window are deleted through the standard
/// deletion path, closing their participants without a graceful wait.
pub fn spawn(state: AppState) {
    let interval = Duration::from_secs(state.settings.rooms.sweep_interval_secs.max(1));
    let timeout = TimeDelta::seconds(state.settings.rooms.inactivity_timeout_secs as i64);

    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                sweep(&state, Service::Robotics, timeout).await;
            }
        });
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep(&state, Service::Video, timeout).await;
        }
    });
}

#[derive(Clone, Copy)]
enum Service {
    Robotics,
    Video,
}

async fn sweep(state: &AppState, service: Service, timeout: TimeDelta) {
    let cutoff = Utc::now() - timeout;

    let stale = match service {
        Service::Robotics => collect_stale(&state.robotics, &state.robotics_conns, cutoff),
        Service::Video => collect_stale(&state.video, &state.video_conns, cutoff),
    };

    for (workspace_id, room_id) in stale {
        info!(%workspace_id, %room_id, "evicting inactive room");
        match service {
            Service::Robotics => state.delete_robotics_room(&workspace_id, &room_id).await,
            Service::Video => state.delete_video_room(&workspace_id, &room_id).await,
        };
    }
}

fn collect_stale<R: RegistryRoom>(
    registry: &Registry<R>,
    table: &ConnectionTable,
    cutoff: DateTime<Utc>,
) -> Vec<(String, String)> {
    let mut stale = Vec::new();
    for room in registry.all_rooms() {
        let effective = effective_last_activity(table, room.as_ref());
        if effective < cutoff {
            stale.push((room.workspace_id().to_string(), room.room_id().to_string()));
        } else {
            debug!(room_id = room.room_id(), "room still active");
        }
    }
    stale
}

fn effective_last_activity<R: RegistryRoom>(table: &ConnectionTable, room: &R) -> DateTime<Utc> {
    let mut latest = room.last_activity();
    for participant_id in room.participant_ids() {
        if let Some(meta) = table.get_metadata(&participant_id) {
            latest = latest.max(meta.last_activity);
        }
    }
    latest
}
