//! Batch submission: upload each shard and register a batch job for it.
//!
//! Shards are submitted one after another in index order. The first failure
//! aborts the remaining parts; batches already created stay registered with
//! the provider and are reported in the error's `part` number.

use crate::config::SubmitConfig;
use crate::error::BatchError;
use crate::output::SubmittedBatch;
use crate::pipeline::shard::shard_path;
use crate::progress::ProgressCallback;
use std::path::{Path, PathBuf};
use tracing::info;
use zhipu_batch::{BatchApi, CreateBatchRequest};

/// List `<prefix>_part_1.jsonl`, `<prefix>_part_2.jsonl`, … that exist,
/// stopping at the first gap.
pub fn discover_shards(prefix: &Path) -> Vec<PathBuf> {
    (1..)
        .map(|i| shard_path(prefix, i))
        .take_while(|p| p.is_file())
        .collect()
}

/// Upload every file in `shards` and create one batch per file.
///
/// All paths are checked before the first upload so a typo does not leave a
/// half-submitted set behind.
pub async fn submit_shards(
    api: &dyn BatchApi,
    shards: &[PathBuf],
    config: &SubmitConfig,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<SubmittedBatch>, BatchError> {
    if shards.is_empty() {
        return Err(BatchError::InvalidConfig("No shard files to submit".into()));
    }
    if let Some(missing) = shards.iter().find(|p| !p.is_file()) {
        return Err(BatchError::ShardNotFound {
            path: missing.clone(),
        });
    }

    let total = shards.len();
    let mut submitted = Vec::with_capacity(total);

    for (i, path) in shards.iter().enumerate() {
        let part = i + 1;
        let fail = |source: zhipu_batch::BatchApiError| BatchError::Submission {
            path: path.clone(),
            part,
            total,
            source,
        };

        info!("({}/{}) Uploading file: {}", part, total, path.display());
        if let Some(cb) = progress {
            cb.on_upload_start(part, total, path);
        }
        let file = api.upload_file(path).await.map_err(&fail)?;
        info!("({}/{}) Uploaded file. ID: {}", part, total, file.id);

        let request = CreateBatchRequest::chat_completions(&file.id)
            .with_completion_window(&config.completion_window)
            .with_description(config.describe(part, total));
        let batch = api.create_batch(&request).await.map_err(&fail)?;
        info!("({}/{}) Created batch: {}", part, total, batch.id);

        if let Some(cb) = progress {
            cb.on_batch_created(part, total, &file.id, &batch.id);
        }
        submitted.push(SubmittedBatch {
            part,
            path: path.clone(),
            file_id: file.id,
            batch_id: batch.id,
            status: batch.status,
        });
    }

    Ok(submitted)
}

/// [`discover_shards`] + [`submit_shards`].
pub async fn submit_prefix(
    api: &dyn BatchApi,
    prefix: &Path,
    config: &SubmitConfig,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<SubmittedBatch>, BatchError> {
    let shards = discover_shards(prefix);
    if shards.is_empty() {
        return Err(BatchError::NoShards {
            prefix: prefix.to_path_buf(),
        });
    }
    submit_shards(api, &shards, config, progress).await
}

/// Synchronous wrapper around [`submit_shards`].
///
/// Creates a temporary tokio runtime internally.
pub fn submit_shards_sync(
    api: &dyn BatchApi,
    shards: &[PathBuf],
    config: &SubmitConfig,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<SubmittedBatch>, BatchError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BatchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(submit_shards(api, shards, config, progress))
}
