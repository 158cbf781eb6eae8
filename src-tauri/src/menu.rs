use log::{debug, warn};
use tauri::menu::{Menu, MenuBuilder, MenuEvent, MenuItemBuilder, SubmenuBuilder};
use tauri::{AppHandle, Emitter, Manager, Wry};
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tauri_plugin_opener::OpenerExt;

use crate::client::VersionInfo;
use crate::error::AppError;
use crate::state::AppState;
use crate::window::{self, Zoom};

pub const OPEN_FILE_EVENT: &str = "menu://open-file";
pub const SAVE_MARKDOWN_EVENT: &str = "menu://save-markdown";

const OPEN_FILE: &str = "open-file";
const SAVE_MARKDOWN: &str = "save-markdown";
const QUIT: &str = "quit";
const RELOAD: &str = "reload";
const TOGGLE_DEVTOOLS: &str = "toggle-devtools";
const ZOOM_RESET: &str = "zoom-reset";
const ZOOM_IN: &str = "zoom-in";
const ZOOM_OUT: &str = "zoom-out";
const ABOUT: &str = "about";
const GITHUB: &str = "github";

const ABOUT_TITLE: &str = "About Markitdown Desktop";
const GITHUB_URL: &str = "https://github.com/microsoft/markitdown";

pub fn build(app: &AppHandle) -> tauri::Result<Menu<Wry>> {
    let file = SubmenuBuilder::new(app, "File")
        .item(
            &MenuItemBuilder::with_id(OPEN_FILE, "Open File")
                .accelerator("CmdOrCtrl+O")
                .build(app)?,
        )
        .item(
            &MenuItemBuilder::with_id(SAVE_MARKDOWN, "Save Markdown")
                .accelerator("CmdOrCtrl+S")
                .build(app)?,
        )
        .separator()
        .item(
            &MenuItemBuilder::with_id(QUIT, "Quit")
                .accelerator("CmdOrCtrl+Q")
                .build(app)?,
        )
        .build()?;

    let edit = SubmenuBuilder::new(app, "Edit")
        .copy()
        .paste()
        .select_all()
        .build()?;

    let mut view = SubmenuBuilder::new(app, "View").item(
        &MenuItemBuilder::with_id(RELOAD, "Reload")
            .accelerator("CmdOrCtrl+R")
            .build(app)?,
    );
    if cfg!(debug_assertions) {
        view = view.item(
            &MenuItemBuilder::with_id(TOGGLE_DEVTOOLS, "Toggle DevTools")
                .accelerator("F12")
                .build(app)?,
        );
    }
    let view = view
        .separator()
        .item(
            &MenuItemBuilder::with_id(ZOOM_RESET, "Actual Size")
                .accelerator("CmdOrCtrl+0")
                .build(app)?,
        )
        .item(
            &MenuItemBuilder::with_id(ZOOM_IN, "Zoom In")
                .accelerator("CmdOrCtrl+=")
                .build(app)?,
        )
        .item(
            &MenuItemBuilder::with_id(ZOOM_OUT, "Zoom Out")
                .accelerator("CmdOrCtrl+-")
                .build(app)?,
        )
        .build()?;

    let help = SubmenuBuilder::new(app, "Help")
        .item(&MenuItemBuilder::with_id(ABOUT, ABOUT_TITLE).build(app)?)
        .item(&MenuItemBuilder::with_id(GITHUB, "View on GitHub").build(app)?)
        .build()?;

    let menu = MenuBuilder::new(app);
    #[cfg(target_os = "macos")]
    let menu = {
        let name = app.package_info().name.clone();
        let app_menu = SubmenuBuilder::new(app, &name)
            .about(None)
            .separator()
            .services()
            .separator()
            .hide()
            .hide_others()
            .show_all()
            .separator()
            .quit()
            .build()?;
        menu.item(&app_menu)
    };

    menu.item(&file).item(&edit).item(&view).item(&help).build()
}

pub fn handle_event(app: &AppHandle, event: MenuEvent) {
    let result: Result<(), AppError> = match event.id().as_ref() {
        OPEN_FILE => app.emit(OPEN_FILE_EVENT, ()).map_err(Into::into),
        SAVE_MARKDOWN => app.emit(SAVE_MARKDOWN_EVENT, ()).map_err(Into::into),
        QUIT => {
            app.exit(0);
            Ok(())
        }
        RELOAD => window::reload(app),
        TOGGLE_DEVTOOLS => {
            window::toggle_devtools(app);
            Ok(())
        }
        ZOOM_RESET => window::zoom(app, Zoom::Reset),
        ZOOM_IN => window::zoom(app, Zoom::In),
        ZOOM_OUT => window::zoom(app, Zoom::Out),
        ABOUT => {
            show_about(app);
            Ok(())
        }
        GITHUB => {
            open_github(app);
            Ok(())
        }
        other => {
            debug!("unhandled menu item {other}");
            Ok(())
        }
    };
    if let Err(e) = result {
        warn!("menu action {:?} failed: {e}", event.id());
    }
}

fn show_about(app: &AppHandle) {
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        let converter = app.state::<AppState>().client.version().await.ok();
        let detail = about_detail(&app.package_info().version.to_string(), converter.as_ref());
        app.dialog()
            .message(detail)
            .title(ABOUT_TITLE)
            .kind(MessageDialogKind::Info)
            .show(|_| {});
    });
}

pub fn about_detail(version: &str, converter: Option<&VersionInfo>) -> String {
    let mut detail = format!(
        "Markitdown Desktop\n\nA desktop wrapper for Microsoft's Markitdown converter.\n\nVersion: {version}\nLicense: MIT"
    );
    if let Some(info) = converter {
        detail.push_str(&format!(
            "\nConverter: server {}, markitdown {}",
            info.server_version, info.markitdown_version
        ));
        if let Some(python) = info.python_version.as_deref() {
            let short = python.split_whitespace().next().unwrap_or(python);
            detail.push_str(&format!(", Python {short}"));
        }
    }
    detail.push_str("\n\nMarkitdown is created by Microsoft Corporation.");
    detail
}

fn open_github(app: &AppHandle) {
    if let Err(e) = app.opener().open_url(GITHUB_URL, None::<&str>) {
        warn!("failed to open {GITHUB_URL}: {e}");
    }
}
