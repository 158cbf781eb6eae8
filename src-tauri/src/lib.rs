use log::{error, info, warn};
use tauri::{AppHandle, Manager, RunEvent, Runtime};
use tauri_plugin_log::{Target, TargetKind};

mod bridge;
mod client;
mod config;
mod controller;
mod error;
mod health;
mod menu;
mod server;
mod state;
mod window;

use config::AppConfig;
use error::AppError;
use server::{ConverterServer, LaunchPlan, Readiness};
use state::AppState;

/// Spawns the converter, waits until it answers (or gives up), then opens
/// the main window and starts health polling.
fn spawn_startup_task(app: AppHandle, dev_mode: bool) {
    tauri::async_runtime::spawn(async move {
        let state = app.state::<AppState>();
        let resource_dir = app.path().resource_dir().ok();
        let plan = LaunchPlan::resolve(&state.config, dev_mode, resource_dir.as_deref());

        match ConverterServer::spawn(&plan) {
            Ok(server) => {
                let exit = server.exit_watch();
                state.install_server(server);
                let readiness = server::wait_ready(
                    &state.client,
                    exit,
                    state.config.ready_timeout(),
                    state.config.ready_poll_interval(),
                )
                .await;
                match readiness {
                    Readiness::Ready => info!("converter ready at {}", state.client.base_url()),
                    Readiness::TimedOut => warn!(
                        "converter not ready after {:?}, opening window anyway",
                        state.config.ready_timeout()
                    ),
                    Readiness::Exited(code) => error!("converter exited during startup (code {code:?})"),
                }
            }
            Err(e) => error!("{e}"),
        }

        if let Err(e) = window::create_main_window(&app, dev_mode) {
            error!("failed to create main window: {e}");
            return;
        }
        health::spawn_poller(app.clone(), state.config.health_interval());
    });
}

/// Builds the shared state and hands it to Tauri. Runs after the log plugin
/// so a failure is recorded before setup aborts.
fn manage_state<R: Runtime, M: Manager<R>>(manager: &M, config: AppConfig) -> Result<(), AppError> {
    let state = AppState::new(config).map_err(|e| {
        error!("failed to build HTTP client: {e}");
        e
    })?;
    manager.manage(state);
    Ok(())
}

fn stop_converter(app: &AppHandle) {
    if let Some(server) = app.state::<AppState>().take_server() {
        match server.exit_status() {
            Some(status) => info!("converter already exited ({status})"),
            None => info!("stopping converter (pid {:?})", server.id()),
        }
        tauri::async_runtime::block_on(server.shutdown());
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let (config, config_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    let dev_mode = cfg!(debug_assertions) || std::env::args().any(|arg| arg == "--dev");
    let log_level = config.log_level();

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_opener::init())
        .menu(menu::build)
        .on_menu_event(menu::handle_event)
        .on_window_event(window::handle_event)
        .invoke_handler(tauri::generate_handler![
            bridge::get_view_state,
            bridge::select_and_convert,
            bridge::convert_file,
            bridge::save_markdown,
            bridge::copy_markdown,
            bridge::clear_markdown,
            bridge::check_server_health,
            bridge::hide_status,
            bridge::supported_formats,
        ])
        .setup(move |app| {
            app.handle().plugin(
                tauri_plugin_log::Builder::default()
                    .clear_targets()
                    .target(Target::new(TargetKind::Stdout))
                    .target(Target::new(TargetKind::LogDir { file_name: None }))
                    .level(log_level)
                    .build(),
            )?;
            if let Some(e) = config_error {
                warn!("using default settings: {e}");
            }
            manage_state(app.handle(), config)?;
            spawn_startup_task(app.handle().clone(), dev_mode);
            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| match event {
            // Closing the last window keeps the app alive on macOS; the dock
            // icon reopens it.
            #[cfg(target_os = "macos")]
            RunEvent::ExitRequested { code: None, api, .. } => api.prevent_exit(),
            #[cfg(target_os = "macos")]
            RunEvent::Reopen {
                has_visible_windows: false,
                ..
            } => {
                if let Err(e) = window::create_main_window(app, false) {
                    error!("failed to reopen main window: {e}");
                }
            }
            RunEvent::Exit => stop_converter(app),
            _ => {}
        });
}
