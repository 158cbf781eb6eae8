//! HTTP client for the local Markitdown converter.
//!
//! The converter is an opaque service on a localhost port. Only `/health`
//! and `/convert` matter for the main flow; `/supported_formats` and
//! `/version` feed the UI and the About dialog.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Body of a `/convert` reply. The converter sends `markdown`; older builds
/// send `text_content` instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConvertResponse {
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ConvertResponse {
    /// The extracted text, preferring `markdown` and skipping empty fields.
    pub fn content(&self) -> Option<&str> {
        self.markdown
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.text_content.as_deref().filter(|s| !s.is_empty()))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedFormats {
    pub formats: BTreeMap<String, Vec<String>>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionInfo {
    pub server_version: String,
    pub markitdown_version: String,
    #[serde(default)]
    pub python_version: Option<String>,
}

#[derive(Debug, Serialize)]
struct ConvertRequest<'a> {
    file_path: &'a str,
}

#[derive(Debug, Clone)]
pub struct ConverterClient {
    http: reqwest::Client,
    base_url: String,
}

impl ConverterClient {
    /// The converter only listens on loopback, so system proxy settings are
    /// ignored.
    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        Ok(Self {
            http: reqwest::Client::builder().no_proxy().build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Any success status counts as ready. Transport errors count as down.
    pub async fn health(&self) -> bool {
        match self
            .http
            .get(self.url("/health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("health probe failed: {e}");
                false
            }
        }
    }

    /// Asks the converter to turn the file at `path` into Markdown.
    ///
    /// A non-success status becomes [`AppError::Status`], carrying the
    /// server's `error` text when the body has one. A success body is
    /// returned as-is; its `error` and content fields are for the caller
    /// to judge.
    pub async fn convert(&self, path: &Path) -> Result<ConvertResponse, AppError> {
        let file_path = path.to_string_lossy();
        debug!("POST /convert {file_path}");
        let response = self
            .http
            .post(self.url("/convert"))
            .json(&ConvertRequest {
                file_path: &file_path,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error);
            return Err(AppError::Status {
                code: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    pub async fn supported_formats(&self) -> Result<SupportedFormats, AppError> {
        self.get_json("/supported_formats").await
    }

    pub async fn version(&self) -> Result<VersionInfo, AppError> {
        self.get_json("/version").await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        let response = self.http.get(self.url(path)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Status {
                code: status.as_u16(),
                message: None,
            });
        }
        Ok(response.json().await?)
    }
}
