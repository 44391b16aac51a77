//! Configuration types for shaping and submission.
//!
//! All shaping behaviour is controlled through [`ShapeConfig`], built via its
//! [`ShapeConfigBuilder`]; submission uses [`SubmitConfig`].

use crate::error::BatchError;
use crate::progress::ProgressCallback;
use crate::prompts::{DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT};
use std::fmt;
use std::path::PathBuf;

/// Default maximum number of request lines per shard file.
pub const DEFAULT_CHUNK_SIZE: usize = 50_000;

/// Configuration for turning a metadata file into request shards.
///
/// # Example
/// ```rust
/// use alcademic_batch::ShapeConfig;
///
/// let config = ShapeConfig::builder()
///     .input_path("data/meta.json")
///     .output_prefix("out/requests")
///     .chunk_size(10_000)
///     .model("glm-4-flash")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ShapeConfig {
    /// JSON file holding an array of paper metadata objects.
    pub input_path: PathBuf,

    /// Shards are written as `<output_prefix>_part_<n>.jsonl`. The parent
    /// directory is created if missing.
    pub output_prefix: PathBuf,

    /// Maximum request lines per shard. Must be ≥ 1. Default: 50 000.
    ///
    /// The provider caps a single batch input file by line count and size;
    /// 50 000 short abstract prompts stay well inside both limits.
    pub chunk_size: usize,

    /// Model identifier written into every request body. Default: `glm-4-flash`.
    pub model: String,

    /// Content of the `system` message. Default: [`DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: String,

    /// Log a progress line every this many processed records. Default: 1000.
    pub progress_every: usize,

    /// Optional per-record / per-shard event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::new(),
            output_prefix: PathBuf::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            progress_every: 1000,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ShapeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeConfig")
            .field("input_path", &self.input_path)
            .field("output_prefix", &self.output_prefix)
            .field("chunk_size", &self.chunk_size)
            .field("model", &self.model)
            .field("system_prompt_len", &self.system_prompt.len())
            .field("progress_every", &self.progress_every)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ShapeProgressCallback>"),
            )
            .finish()
    }
}

impl ShapeConfig {
    /// Create a new builder for `ShapeConfig`.
    pub fn builder() -> ShapeConfigBuilder {
        ShapeConfigBuilder {
            config: Self::default(),
        }
    }

    /// Path of the `index`-th shard (1-based).
    pub fn shard_path(&self, index: usize) -> PathBuf {
        crate::pipeline::shard::shard_path(&self.output_prefix, index)
    }
}

/// Builder for [`ShapeConfig`].
#[derive(Debug)]
pub struct ShapeConfigBuilder {
    config: ShapeConfig,
}

impl ShapeConfigBuilder {
    pub fn input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.input_path = path.into();
        self
    }

    pub fn output_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.config.output_prefix = prefix.into();
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn progress_every(mut self, n: usize) -> Self {
        self.config.progress_every = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// An empty `input_path` is accepted here because [`crate::shape_str`]
    /// never reads it; [`crate::shape`] rejects it.
    pub fn build(self) -> Result<ShapeConfig, BatchError> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(BatchError::InvalidConfig(
                "Chunk size must be a positive integer".into(),
            ));
        }
        if c.output_prefix.as_os_str().is_empty() {
            return Err(BatchError::InvalidConfig(
                "Output prefix is required".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(BatchError::InvalidConfig("Model name must not be empty".into()));
        }
        Ok(self.config)
    }
}

/// Configuration for uploading shards and creating batch jobs.
#[derive(Clone)]
pub struct SubmitConfig {
    /// Provider API key. Falls back to `ZHIPUAI_API_KEY` in the CLI.
    pub api_key: Option<String>,

    /// API root. Default: [`zhipu_batch::DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Completion window requested for every batch. Default: `24h`.
    pub completion_window: String,

    /// Prefix of the `description` metadata; ` part i/N` is appended.
    pub description: String,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: zhipu_batch::DEFAULT_BASE_URL.to_string(),
            completion_window: zhipu_batch::DEFAULT_COMPLETION_WINDOW.to_string(),
            description: "Paper metadata extraction".to_string(),
        }
    }
}

impl fmt::Debug for SubmitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("completion_window", &self.completion_window)
            .field("description", &self.description)
            .finish()
    }
}

impl SubmitConfig {
    pub fn builder() -> SubmitConfigBuilder {
        SubmitConfigBuilder {
            config: Self::default(),
        }
    }

    /// `description` metadata for part `part` of `total`.
    pub fn describe(&self, part: usize, total: usize) -> String {
        format!("{} part {}/{}", self.description, part, total)
    }

    /// Construct the HTTP client described by this config.
    pub fn client(&self) -> Result<zhipu_batch::ZhipuClient, BatchError> {
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                BatchError::InvalidConfig(format!(
                    "No API key. Set {} or pass --api-key.",
                    zhipu_batch::API_KEY_ENV
                ))
            })?;
        let client = zhipu_batch::ZhipuClient::new(key)
            .map_err(|e| BatchError::InvalidConfig(e.to_string()))?;
        Ok(client.with_base_url(&self.base_url))
    }
}

/// Builder for [`SubmitConfig`].
#[derive(Debug)]
pub struct SubmitConfigBuilder {
    config: SubmitConfig,
}

impl SubmitConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn completion_window(mut self, window: impl Into<String>) -> Self {
        self.config.completion_window = window.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = description.into();
        self
    }

    pub fn build(self) -> Result<SubmitConfig, BatchError> {
        if self.config.base_url.trim().is_empty() {
            return Err(BatchError::InvalidConfig("Base URL must not be empty".into()));
        }
        if self.config.completion_window.trim().is_empty() {
            return Err(BatchError::InvalidConfig(
                "Completion window must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
