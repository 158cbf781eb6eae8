use std::sync::{Mutex, MutexGuard};

use log::warn;
use tauri::{AppHandle, Emitter, Manager, Runtime};

use crate::client::ConverterClient;
use crate::config::AppConfig;
use crate::controller::{Controller, StatusToken, TRANSIENT_STATUS};
use crate::error::AppError;
use crate::server::ConverterServer;

/// Pushed to the webview with a full `ViewState` after every change.
pub const VIEW_STATE_EVENT: &str = "view://state";

/// Everything the privileged side shares between commands, menu handlers
/// and background tasks.
pub struct AppState {
    pub config: AppConfig,
    pub client: ConverterClient,
    controller: Mutex<Controller>,
    server: Mutex<Option<ConverterServer>>,
    zoom: Mutex<f64>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("{what} lock poisoned, continuing with inner value");
        poisoned.into_inner()
    })
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let client = ConverterClient::new(config.base_url())?;
        Ok(Self {
            config,
            client,
            controller: Mutex::new(Controller::default()),
            server: Mutex::new(None),
            zoom: Mutex::new(1.0),
        })
    }

    pub fn read<T>(&self, f: impl FnOnce(&Controller) -> T) -> T {
        f(&lock(&self.controller, "controller"))
    }

    /// Mutates the view model and pushes the new snapshot to the webview.
    /// The lock is released before emitting.
    pub fn update<R: Runtime, T>(
        &self,
        app: &AppHandle<R>,
        f: impl FnOnce(&mut Controller) -> T,
    ) -> T {
        let (result, snapshot) = {
            let mut controller = lock(&self.controller, "controller");
            let result = f(&mut controller);
            (result, controller.snapshot())
        };
        if let Err(e) = app.emit(VIEW_STATE_EVENT, snapshot) {
            warn!("failed to emit view state: {e}");
        }
        result
    }

    pub fn install_server(&self, server: ConverterServer) {
        if let Some(previous) = lock(&self.server, "server").replace(server) {
            warn!("replacing converter handle (pid {:?})", previous.id());
        }
    }

    pub fn take_server(&self) -> Option<ConverterServer> {
        lock(&self.server, "server").take()
    }

    pub fn set_zoom(&self, f: impl FnOnce(f64) -> f64) -> f64 {
        let mut zoom = lock(&self.zoom, "zoom");
        *zoom = f(*zoom);
        *zoom
    }
}

/// Hides a transient banner after [`TRANSIENT_STATUS`] unless something
/// newer has replaced it.
pub fn expire_later<R: Runtime>(app: AppHandle<R>, token: StatusToken) {
    tauri::async_runtime::spawn(async move {
        tokio::time::sleep(TRANSIENT_STATUS).await;
        app.state::<AppState>()
            .update(&app, |c| c.expire_status(token));
    });
}
