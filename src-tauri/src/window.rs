use log::{debug, warn};
use tauri::{
    AppHandle, DragDropEvent, Manager, WebviewUrl, WebviewWindow, WebviewWindowBuilder, Window,
    WindowEvent,
};

use crate::bridge;
use crate::error::AppError;
use crate::state::AppState;

pub const MAIN_WINDOW_LABEL: &str = "main";
const WINDOW_TITLE: &str = "Markitdown Desktop";

const ZOOM_MIN: f64 = 0.5;
const ZOOM_MAX: f64 = 3.0;
const ZOOM_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zoom {
    Reset,
    In,
    Out,
}

impl Zoom {
    pub fn apply(self, current: f64) -> f64 {
        let next = match self {
            Zoom::Reset => 1.0,
            Zoom::In => current + ZOOM_STEP,
            Zoom::Out => current - ZOOM_STEP,
        };
        // Keep factors on a 0.1 grid so repeated steps don't drift.
        ((next * 10.0).round() / 10.0).clamp(ZOOM_MIN, ZOOM_MAX)
    }
}

/// Creates the main window, or focuses it if it already exists.
pub fn create_main_window(app: &AppHandle, open_devtools: bool) -> tauri::Result<WebviewWindow> {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
        window.set_focus()?;
        return Ok(window);
    }

    let builder =
        WebviewWindowBuilder::new(app, MAIN_WINDOW_LABEL, WebviewUrl::App("index.html".into()))
            .title(WINDOW_TITLE)
            .inner_size(1200.0, 800.0)
            .min_inner_size(640.0, 480.0);
    #[cfg(target_os = "macos")]
    let builder = builder
        .title_bar_style(tauri::TitleBarStyle::Overlay)
        .hidden_title(true);

    let window = builder.build()?;

    #[cfg(debug_assertions)]
    if open_devtools {
        window.open_devtools();
    }
    #[cfg(not(debug_assertions))]
    let _ = open_devtools;

    Ok(window)
}

/// Native drag-and-drop: the first dropped path is converted.
pub fn handle_event(window: &Window, event: &WindowEvent) {
    let WindowEvent::DragDrop(drag) = event else {
        return;
    };
    let app = window.app_handle().clone();
    let state = app.state::<AppState>();
    match drag {
        DragDropEvent::Enter { .. } => {
            state.update(&app, |c| c.set_drag_hover(true));
        }
        DragDropEvent::Leave => {
            state.update(&app, |c| c.set_drag_hover(false));
        }
        DragDropEvent::Drop { paths, .. } => {
            state.update(&app, |c| c.set_drag_hover(false));
            let Some(path) = paths.first().cloned() else {
                return;
            };
            if paths.len() > 1 {
                debug!("{} files dropped, converting only the first", paths.len());
            }
            let app = app.clone();
            tauri::async_runtime::spawn(async move {
                if let Err(e) = bridge::convert_path(&app, path).await {
                    warn!("dropped file not converted: {e}");
                }
            });
        }
        _ => {}
    }
}

fn main_window(app: &AppHandle) -> Option<WebviewWindow> {
    let window = app.get_webview_window(MAIN_WINDOW_LABEL);
    if window.is_none() {
        debug!("main window is not open");
    }
    window
}

pub fn reload(app: &AppHandle) -> Result<(), AppError> {
    if let Some(window) = main_window(app) {
        window.eval("window.location.reload()")?;
    }
    Ok(())
}

pub fn toggle_devtools(app: &AppHandle) {
    #[cfg(debug_assertions)]
    if let Some(window) = main_window(app) {
        if window.is_devtools_open() {
            window.close_devtools();
        } else {
            window.open_devtools();
        }
    }
    #[cfg(not(debug_assertions))]
    let _ = app;
}

pub fn zoom(app: &AppHandle, step: Zoom) -> Result<(), AppError> {
    let factor = app.state::<AppState>().set_zoom(|current| step.apply(current));
    if let Some(window) = main_window(app) {
        window.set_zoom(factor)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_steps_stay_on_grid() {
        let mut factor = 1.0;
        for _ in 0..3 {
            factor = Zoom::In.apply(factor);
        }
        assert_eq!(factor, 1.3);
        factor = Zoom::Out.apply(factor);
        assert_eq!(factor, 1.2);
        assert_eq!(Zoom::Reset.apply(factor), 1.0);
    }

    #[test]
    fn zoom_is_clamped() {
        assert_eq!(Zoom::In.apply(3.0), 3.0);
        assert_eq!(Zoom::Out.apply(0.5), 0.5);
        assert_eq!(Zoom::Out.apply(0.0), 0.5);
    }
}
