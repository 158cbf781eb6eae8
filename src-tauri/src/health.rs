use std::time::Duration;

use log::{info, warn};
use tauri::async_runtime::JoinHandle;
use tauri::{AppHandle, Manager, Runtime};
use tokio::time::MissedTickBehavior;

use crate::controller::ServerStatus;
use crate::state::AppState;

/// Probes `/health` once and records the result in the view model.
pub async fn probe<R: Runtime>(app: &AppHandle<R>) -> bool {
    let state = app.state::<AppState>();
    let online = state.client.health().await;
    let previous = state.update(app, |c| {
        let previous = c.view().server;
        c.apply_health(online);
        previous
    });
    match (previous, online) {
        (ServerStatus::Online, true) | (ServerStatus::Offline, false) => {}
        (_, true) => info!("converter is online at {}", state.client.base_url()),
        (_, false) => warn!("converter is not responding at {}", state.client.base_url()),
    }
    online
}

/// Probes immediately, then every `interval`, for the life of the app.
pub fn spawn_poller(app: AppHandle, interval: Duration) -> JoinHandle<()> {
    tauri::async_runtime::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            probe(&app).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::tests::mock_app;
    use crate::client::tests::{dead_url, serve_once};
    use crate::controller::{Controller, SERVER_OFFLINE_MESSAGE};

    #[test]
    fn failed_health_check_raises_offline_banner() {
        let url = tauri::async_runtime::block_on(dead_url());
        let app = mock_app(&url);

        assert!(!tauri::async_runtime::block_on(probe(app.handle())));
        let view = app.state::<AppState>().read(Controller::snapshot);
        assert_eq!(view.server, ServerStatus::Offline);
        assert_eq!(
            view.status.map(|s| s.message).as_deref(),
            Some(SERVER_OFFLINE_MESSAGE)
        );
    }

    #[test]
    fn healthy_server_marks_online() {
        let (url, server) =
            tauri::async_runtime::block_on(serve_once("200 OK", r#"{"status":"healthy"}"#));
        let app = mock_app(&url);

        assert!(tauri::async_runtime::block_on(probe(app.handle())));
        let view = app.state::<AppState>().read(Controller::snapshot);
        assert_eq!(view.server, ServerStatus::Online);
        assert!(view.status.is_none());
        tauri::async_runtime::block_on(server).expect("stub task");
    }
}
