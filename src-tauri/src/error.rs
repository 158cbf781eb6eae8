use std::path::PathBuf;

/// Every failure the desktop shell can surface, either to the log or to the
/// webview through a command result.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// The converter answered with a non-success status.
    #[error("HTTP error! status: {code}{}", status_detail(.message))]
    Status { code: u16, message: Option<String> },

    #[error("config error: {0}")]
    Config(String),

    #[error("failed to start converter `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The converter executable is not where the launch plan expects it.
    #[error(
        "converter not found at {path}; install it as the `python/markitdown-server` resource or set MARKITDOWN_SERVER_COMMAND"
    )]
    MissingConverter { path: PathBuf },

    #[error("dialog error: {0}")]
    Dialog(String),

    #[error("clipboard error: {0}")]
    Clipboard(#[from] arboard::Error),

    #[error("failed to write {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a conversion is already in progress")]
    Busy,

    #[error(transparent)]
    Tauri(#[from] tauri::Error),
}

fn status_detail(message: &Option<String>) -> String {
    match message.as_deref() {
        Some(m) if !m.is_empty() => format!(": {m}"),
        _ => String::new(),
    }
}

// Commands hand errors to the webview as plain text.
impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
