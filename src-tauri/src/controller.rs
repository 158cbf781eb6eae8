//! View model behind the webview.
//!
//! The webview only renders [`ViewState`] snapshots and forwards gestures;
//! every decision about what the user sees is made here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::client::ConvertResponse;
use crate::error::AppError;

pub const SERVER_OFFLINE_MESSAGE: &str =
    "Python server is not responding. Please restart the application.";
pub const CONVERTING_MESSAGE: &str = "Converting file to Markdown...";
pub const CONVERSION_SUCCESS_MESSAGE: &str = "Conversion successful!";
pub const NO_CONTENT_MESSAGE: &str = "No content could be extracted from the file.";
pub const BUSY_MESSAGE: &str = "A conversion is already in progress. Please wait.";
pub const COPIED_MESSAGE: &str = "Copied to clipboard";
pub const COPY_FAILED_MESSAGE: &str = "Failed to copy to clipboard";

/// How long success banners stay up.
pub const TRANSIENT_STATUS: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    #[default]
    Unknown,
    Online,
    Offline,
}

/// Snapshot sent to the webview after every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub markdown: String,
    pub source_name: Option<String>,
    pub status: Option<StatusMessage>,
    pub server: ServerStatus,
    pub converting: bool,
    pub drag_hover: bool,
}

/// How a finished `/convert` call is presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Converted(String),
    /// The converter answered but reported an error in the body.
    Rejected(String),
    /// Nothing could be extracted.
    Empty,
    /// Transport failure or non-success status.
    Failed(String),
}

impl ConversionOutcome {
    pub fn from_result(result: Result<ConvertResponse, AppError>) -> Self {
        match result {
            Err(e) => Self::Failed(e.to_string()),
            Ok(ConvertResponse {
                error: Some(error), ..
            }) if !error.is_empty() => Self::Rejected(error),
            Ok(response) => match response.content() {
                Some(text) => Self::Converted(text.to_string()),
                None => Self::Empty,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Cancelled,
    Saved(PathBuf),
    Failed(String),
}

/// Token returned for transient banners. Hiding with a stale token is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusToken(u64);

#[derive(Debug, Default)]
pub struct Controller {
    view: ViewState,
    generation: u64,
}

impl Controller {
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn snapshot(&self) -> ViewState {
        self.view.clone()
    }

    /// The current Markdown, or `None` when the preview is empty.
    pub fn markdown(&self) -> Option<&str> {
        Some(self.view.markdown.as_str()).filter(|m| !m.is_empty())
    }

    pub fn show_status(&mut self, kind: StatusKind, message: impl Into<String>) -> StatusToken {
        self.generation += 1;
        self.view.status = Some(StatusMessage {
            kind,
            message: message.into(),
        });
        StatusToken(self.generation)
    }

    pub fn hide_status(&mut self) {
        self.generation += 1;
        self.view.status = None;
    }

    /// Hides the banner only if it is still the one `token` was issued for.
    pub fn expire_status(&mut self, token: StatusToken) -> bool {
        if token.0 != self.generation || self.view.status.is_none() {
            return false;
        }
        self.view.status = None;
        true
    }

    /// Marks a conversion as running. While one is already running the
    /// request is refused with an info banner and the preview is untouched.
    pub fn begin_conversion(&mut self) -> Result<(), AppError> {
        if self.view.converting {
            self.show_status(StatusKind::Info, BUSY_MESSAGE);
            return Err(AppError::Busy);
        }
        self.view.converting = true;
        self.show_status(StatusKind::Info, CONVERTING_MESSAGE);
        Ok(())
    }

    /// Applies a finished conversion. Returns a token when a transient
    /// success banner should be expired later.
    pub fn finish_conversion(
        &mut self,
        source: &Path,
        outcome: ConversionOutcome,
    ) -> Option<StatusToken> {
        self.view.converting = false;
        match outcome {
            ConversionOutcome::Converted(markdown) => {
                self.view.markdown = markdown;
                self.view.source_name = source
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned());
                Some(self.show_status(StatusKind::Success, CONVERSION_SUCCESS_MESSAGE))
            }
            ConversionOutcome::Rejected(error) => {
                self.show_status(StatusKind::Error, format!("Error: {error}"));
                None
            }
            ConversionOutcome::Empty => {
                self.show_status(StatusKind::Error, NO_CONTENT_MESSAGE);
                None
            }
            ConversionOutcome::Failed(error) => {
                self.show_status(StatusKind::Error, format!("Conversion failed: {error}"));
                None
            }
        }
    }

    /// Records a health probe. Going offline always raises the banner;
    /// coming back online only flips the indicator.
    pub fn apply_health(&mut self, online: bool) {
        if online {
            self.view.server = ServerStatus::Online;
        } else {
            self.view.server = ServerStatus::Offline;
            self.show_status(StatusKind::Error, SERVER_OFFLINE_MESSAGE);
        }
    }

    pub fn clear(&mut self) {
        self.view.markdown.clear();
        self.view.source_name = None;
        self.hide_status();
    }

    pub fn set_drag_hover(&mut self, hover: bool) {
        self.view.drag_hover = hover;
    }

    /// Cancelling the dialog leaves the view untouched.
    pub fn finish_save(&mut self, outcome: SaveOutcome) -> Option<StatusToken> {
        match outcome {
            SaveOutcome::Cancelled => None,
            SaveOutcome::Saved(path) => Some(self.show_status(
                StatusKind::Success,
                format!("File saved to: {}", path.display()),
            )),
            SaveOutcome::Failed(reason) => {
                self.show_status(StatusKind::Error, format!("Failed to save: {reason}"));
                None
            }
        }
    }

    pub fn copied(&mut self) -> StatusToken {
        self.show_status(StatusKind::Success, COPIED_MESSAGE)
    }

    pub fn copy_failed(&mut self) {
        self.show_status(StatusKind::Error, COPY_FAILED_MESSAGE);
    }
}
