//! # zhipu-batch
//!
//! A small async client for the two [ZhipuAI](https://open.bigmodel.cn/)
//! (BigModel) batch endpoints needed to launch offline chat-completion jobs:
//!
//! 1. `POST {base}/files` — upload a `.jsonl` request file with purpose `batch`.
//! 2. `POST {base}/batches` — register a batch job against the uploaded file.
//!
//! Polling, cancellation and result download are not covered.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use zhipu_batch::{BatchApi, CreateBatchRequest, ZhipuClient};
//!
//! # async fn run() -> Result<(), zhipu_batch::BatchApiError> {
//! let client = ZhipuClient::from_env()?;
//! let file = client.upload_file("out/requests_part_1.jsonl".as_ref()).await?;
//! let batch = client
//!     .create_batch(&CreateBatchRequest::chat_completions(&file.id).with_description("part 1/1"))
//!     .await?;
//! println!("{} → {}", file.id, batch.id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment variables
//!
//! - `ZHIPUAI_API_KEY` — API key read by [`ZhipuClient::from_env`].
//! - `ZHIPUAI_BASE_URL` — optional override of [`DEFAULT_BASE_URL`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

// ── Public constants ─────────────────────────────────────────────────────────

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

/// Endpoint every request line in a chat-completion batch targets.
pub const CHAT_COMPLETIONS_ENDPOINT: &str = "/v4/chat/completions";

/// The only completion window the provider currently accepts.
pub const DEFAULT_COMPLETION_WINDOW: &str = "24h";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "ZHIPUAI_API_KEY";

/// Environment variable overriding the API root.
pub const BASE_URL_ENV: &str = "ZHIPUAI_BASE_URL";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by batch API operations.
#[derive(Error, Debug)]
pub enum BatchApiError {
    /// No API key was supplied and `ZHIPUAI_API_KEY` is unset or empty.
    #[error("No API key configured. Set ZHIPUAI_API_KEY or pass one explicitly.")]
    MissingApiKey,

    /// The request file could not be read from disk.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The provider rejected the credentials (401/403).
    #[error("Authentication rejected (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// Any other non-2xx response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// A 2xx response whose body did not match the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for BatchApiError {
    fn from(e: reqwest::Error) -> Self {
        BatchApiError::Http(e.to_string())
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

/// A file object returned by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// Body of `POST /batches`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBatchRequest {
    pub input_file_id: String,
    pub endpoint: String,
    pub completion_window: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl CreateBatchRequest {
    /// A chat-completions batch over `input_file_id` with the default window.
    pub fn chat_completions(input_file_id: impl Into<String>) -> Self {
        Self {
            input_file_id: input_file_id.into(),
            endpoint: CHAT_COMPLETIONS_ENDPOINT.to_string(),
            completion_window: DEFAULT_COMPLETION_WINDOW.to_string(),
            metadata: None,
        }
    }

    pub fn with_completion_window(mut self, window: impl Into<String>) -> Self {
        self.completion_window = window.into();
        self
    }

    /// Attach a human-readable `description` metadata entry.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert("description".to_string(), description.into());
        self
    }
}

/// A batch object as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub input_file_id: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub completion_window: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    message: String,
}

// ── Client seam ──────────────────────────────────────────────────────────────

/// The operations the submitter needs from a batch provider.
///
/// Object-safe so callers can hold an `Arc<dyn BatchApi>` and swap in a fake
/// in tests.
#[async_trait]
pub trait BatchApi: Send + Sync {
    /// Upload a local `.jsonl` file with purpose `batch`.
    async fn upload_file(&self, path: &Path) -> Result<UploadedFile, BatchApiError>;

    /// Register a batch job against a previously uploaded file.
    async fn create_batch(&self, request: &CreateBatchRequest) -> Result<Batch, BatchApiError>;
}

/// HTTP client for the ZhipuAI batch endpoints.
#[derive(Clone)]
pub struct ZhipuClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for ZhipuClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZhipuClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ZhipuClient {
    /// Create a client against [`DEFAULT_BASE_URL`].
    pub fn new(api_key: impl Into<String>) -> Result<Self, BatchApiError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(BatchApiError::MissingApiKey);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
        })
    }

    /// Build a client from `ZHIPUAI_API_KEY` (and `ZHIPUAI_BASE_URL` if set).
    pub fn from_env() -> Result<Self, BatchApiError> {
        let key = std::env::var(API_KEY_ENV).map_err(|_| BatchApiError::MissingApiKey)?;
        let client = Self::new(key)?;
        match std::env::var(BASE_URL_ENV) {
            Ok(url) if !url.is_empty() => Ok(client.with_base_url(url)),
            _ => Ok(client),
        }
    }

    /// Point the client at a different API root (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route)
    }
}

#[async_trait]
impl BatchApi for ZhipuClient {
    async fn upload_file(&self, path: &Path) -> Result<UploadedFile, BatchApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| BatchApiError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "batch.jsonl".to_string());

        debug!("Uploading {} ({} bytes)", path.display(), bytes.len());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str("application/jsonl")?;
        let form = reqwest::multipart::Form::new()
            .text("purpose", "batch")
            .part("file", part);

        let response = self
            .http
            .post(self.url("files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let file: UploadedFile = decode(response).await?;
        info!("Uploaded {} as file {}", path.display(), file.id);
        Ok(file)
    }

    async fn create_batch(&self, request: &CreateBatchRequest) -> Result<Batch, BatchApiError> {
        let response = self
            .http
            .post(self.url("batches"))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let batch: Batch = decode(response).await?;
        info!(
            "Created batch {} for file {} ({})",
            batch.id,
            request.input_file_id,
            batch.status.as_deref().unwrap_or("unknown")
        );
        Ok(batch)
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────────

/// Turn a response into `T`, mapping non-2xx statuses to typed errors.
async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BatchApiError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = error_message(&body);
        let code = status.as_u16();
        return Err(if code == 401 || code == 403 {
            BatchApiError::Auth {
                status: code,
                message,
            }
        } else {
            BatchApiError::Api {
                status: code,
                message,
            }
        });
    }

    serde_json::from_str(&body).map_err(|e| BatchApiError::Decode(format!("{e}: {body}")))
}

/// Extract the provider's `{"error": {"code", "message"}}` text, else the raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => match env.error.code {
            Some(serde_json::Value::String(code)) => format!("[{code}] {}", env.error.message),
            Some(code) if !code.is_null() => format!("[{code}] {}", env.error.message),
            _ => env.error.message,
        },
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_defaults() {
        let req = CreateBatchRequest::chat_completions("file-1");
        assert_eq!(req.endpoint, "/v4/chat/completions");
        assert_eq!(req.completion_window, "24h");
        assert!(req.metadata.is_none());

        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("metadata").is_none(), "None metadata is omitted");
    }

    #[test]
    fn create_request_description() {
        let req = CreateBatchRequest::chat_completions("file-1").with_description("part 2/3");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["metadata"]["description"], "part 2/3");
    }

    #[test]
    fn error_message_prefers_envelope() {
        let body = r#"{"error":{"code":"1113","message":"balance exhausted"}}"#;
        assert_eq!(error_message(body), "[1113] balance exhausted");
        assert_eq!(error_message("  gateway down \n"), "gateway down");
        assert_eq!(error_message(""), "empty response body");
    }

    #[test]
    fn empty_key_rejected() {
        assert!(matches!(
            ZhipuClient::new("   "),
            Err(BatchApiError::MissingApiKey)
        ));
    }

    #[test]
    fn debug_redacts_key() {
        let client = ZhipuClient::new("sk-secret").unwrap();
        let dbg = format!("{client:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = ZhipuClient::new("k")
            .unwrap()
            .with_base_url("http://localhost:9/api/");
        assert_eq!(client.url("files"), "http://localhost:9/api/files");
    }
}
