//! Commands the webview may invoke. This list, together with
//! `capabilities/default.json`, is the whole surface the page can reach.

use std::path::PathBuf;

use log::{info, warn};
use tauri::{AppHandle, Manager, Runtime, State};
use tauri_plugin_dialog::DialogExt;
use tokio::sync::oneshot;

use crate::client::SupportedFormats;
use crate::controller::{Controller, ConversionOutcome, SaveOutcome, ViewState};
use crate::error::AppError;
use crate::health;
use crate::state::{expire_later, AppState};
use crate::window::MAIN_WINDOW_LABEL;

pub const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "docx", "doc", "pptx", "ppt", "xlsx", "xls", "html", "htm", "xml", "md", "txt",
];
pub const DEFAULT_SAVE_NAME: &str = "converted.md";

#[tauri::command]
pub fn get_view_state(state: State<'_, AppState>) -> ViewState {
    state.read(Controller::snapshot)
}

/// Shows the open dialog and converts the chosen file. Returns `false` when
/// the dialog was cancelled.
#[tauri::command]
pub async fn select_and_convert(app: AppHandle) -> Result<bool, AppError> {
    let Some(path) = pick_document(&app).await? else {
        return Ok(false);
    };
    convert_path(&app, path).await?;
    Ok(true)
}

#[tauri::command]
pub async fn convert_file(app: AppHandle, path: String) -> Result<(), AppError> {
    convert_path(&app, PathBuf::from(path)).await
}

/// Saves the current Markdown through the save dialog. Returns the written
/// path, or `None` when there was nothing to save or the user cancelled.
#[tauri::command]
pub async fn save_markdown(app: AppHandle) -> Result<Option<String>, AppError> {
    let state = app.state::<AppState>();
    let Some(markdown) = state.read(|c| c.markdown().map(str::to_owned)) else {
        return Ok(None);
    };

    let (outcome, result) = match pick_save_path(&app).await? {
        None => (SaveOutcome::Cancelled, Ok(None)),
        Some(path) => match tokio::fs::write(&path, markdown.as_bytes()).await {
            Ok(()) => {
                info!("saved markdown to {}", path.display());
                let shown = path.display().to_string();
                (SaveOutcome::Saved(path), Ok(Some(shown)))
            }
            Err(source) => {
                let reason = source.to_string();
                let err = AppError::Save { path, source };
                warn!("{err}");
                (SaveOutcome::Failed(reason), Err(err))
            }
        },
    };

    if let Some(token) = state.update(&app, |c| c.finish_save(outcome)) {
        expire_later(app.clone(), token);
    }
    result
}

/// Copies the current Markdown. Returns `false` when there was nothing to copy.
#[tauri::command]
pub fn copy_markdown(app: AppHandle, state: State<'_, AppState>) -> Result<bool, AppError> {
    let Some(markdown) = state.read(|c| c.markdown().map(str::to_owned)) else {
        return Ok(false);
    };
    match write_clipboard(markdown) {
        Ok(()) => {
            let token = state.update(&app, Controller::copied);
            expire_later(app.clone(), token);
            Ok(true)
        }
        Err(e) => {
            warn!("failed to copy: {e}");
            state.update(&app, Controller::copy_failed);
            Err(e)
        }
    }
}

#[tauri::command]
pub fn clear_markdown(app: AppHandle, state: State<'_, AppState>) {
    state.update(&app, Controller::clear);
}

#[tauri::command]
pub fn hide_status(app: AppHandle, state: State<'_, AppState>) {
    state.update(&app, Controller::hide_status);
}

#[tauri::command]
pub async fn check_server_health(app: AppHandle) -> bool {
    health::probe(&app).await
}

#[tauri::command]
pub async fn supported_formats<R: Runtime>(
    app: AppHandle<R>,
) -> Result<SupportedFormats, AppError> {
    app.state::<AppState>().client.supported_formats().await
}

/// Runs one conversion end to end. Shared by the open dialog, the webview
/// and native file drops.
pub async fn convert_path<R: Runtime>(
    app: &AppHandle<R>,
    path: PathBuf,
) -> Result<(), AppError> {
    let state = app.state::<AppState>();
    state.update(app, |c| c.begin_conversion())?;

    info!("converting {}", path.display());
    let result = state.client.convert(&path).await;
    if let Err(e) = &result {
        warn!("conversion of {} failed: {e}", path.display());
    }

    let outcome = ConversionOutcome::from_result(result);
    if let Some(token) = state.update(app, |c| c.finish_conversion(&path, outcome)) {
        expire_later(app.clone(), token);
    }
    Ok(())
}

fn write_clipboard(text: String) -> Result<(), AppError> {
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set_text(text)?;
    Ok(())
}

async fn pick_document(app: &AppHandle) -> Result<Option<PathBuf>, AppError> {
    let (tx, rx) = oneshot::channel();
    let mut dialog = app
        .dialog()
        .file()
        .add_filter("Documents", DOCUMENT_EXTENSIONS)
        .add_filter("All Files", &["*"]);
    if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
        dialog = dialog.set_parent(&window);
    }
    dialog.pick_file(move |picked| {
        let _ = tx.send(picked);
    });

    let picked = rx
        .await
        .map_err(|_| AppError::Dialog("open dialog closed without a result".into()))?;
    picked
        .map(|p| p.into_path().map_err(|e| AppError::Dialog(e.to_string())))
        .transpose()
}

async fn pick_save_path(app: &AppHandle) -> Result<Option<PathBuf>, AppError> {
    let (tx, rx) = oneshot::channel();
    let mut dialog = app
        .dialog()
        .file()
        .set_file_name(DEFAULT_SAVE_NAME)
        .add_filter("Markdown", &["md"])
        .add_filter("All Files", &["*"]);
    if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
        dialog = dialog.set_parent(&window);
    }
    dialog.save_file(move |picked| {
        let _ = tx.send(picked);
    });

    let picked = rx
        .await
        .map_err(|_| AppError::Dialog("save dialog closed without a result".into()))?;
    picked
        .map(|p| p.into_path().map_err(|e| AppError::Dialog(e.to_string())))
        .transpose()
}
