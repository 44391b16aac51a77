//! Progress-callback trait for shaping and submission events.
//!
//! Inject an [`Arc<dyn ShapeProgressCallback>`] via
//! [`crate::config::ShapeConfigBuilder::progress_callback`] (or pass one to
//! [`crate::submit_shards`]) to receive events as records are processed,
//! shards are sealed, and batches are created.
//!
//! # Example
//!
//! ```rust
//! use alcademic_batch::{ShapeConfig, ShapeProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct ShardCounter {
//!     sealed: AtomicUsize,
//! }
//!
//! impl ShapeProgressCallback for ShardCounter {
//!     fn on_shard_sealed(&self, index: usize, _path: &std::path::Path, lines: usize) {
//!         self.sealed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("shard {index} sealed with {lines} lines");
//!     }
//! }
//!
//! let config = ShapeConfig::builder()
//!     .output_prefix("out/requests")
//!     .progress_callback(Arc::new(ShardCounter { sealed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::RecordError;
use std::path::Path;
use std::sync::Arc;

/// Called by the pipeline as it processes records and shards.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Shaping is sequential, but the trait is
/// `Send + Sync` so a callback can be shared with the async submitter.
pub trait ShapeProgressCallback: Send + Sync {
    /// Called once after parsing, before the first record.
    fn on_shape_start(&self, total_records: usize) {
        let _ = total_records;
    }

    /// Called after a request line has been written.
    ///
    /// * `processed` — requests written so far (1-based)
    fn on_record_written(&self, processed: usize) {
        let _ = processed;
    }

    /// Called when a record is skipped.
    fn on_record_skipped(&self, error: &RecordError) {
        let _ = error;
    }

    /// Called when a new shard file has been created.
    fn on_shard_opened(&self, index: usize, path: &Path) {
        let _ = (index, path);
    }

    /// Called when a shard has been flushed and closed.
    fn on_shard_sealed(&self, index: usize, path: &Path, lines: usize) {
        let _ = (index, path, lines);
    }

    /// Called once after the last record.
    fn on_shape_complete(&self, processed: usize, skipped: usize, shards: usize) {
        let _ = (processed, skipped, shards);
    }

    /// Called before uploading shard `part` of `total`.
    fn on_upload_start(&self, part: usize, total: usize, path: &Path) {
        let _ = (part, total, path);
    }

    /// Called once the batch for shard `part` has been created.
    fn on_batch_created(&self, part: usize, total: usize, file_id: &str, batch_id: &str) {
        let _ = (part, total, file_id, batch_id);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ShapeProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ShapeConfig`].
pub type ProgressCallback = Arc<dyn ShapeProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_shape_start(3);
        cb.on_record_written(1);
        cb.on_record_skipped(&RecordError::NotAnObject { index: 1 });
        cb.on_shard_opened(1, Path::new("a_part_1.jsonl"));
        cb.on_shard_sealed(1, Path::new("a_part_1.jsonl"), 1);
        cb.on_shape_complete(1, 1, 1);
        cb.on_upload_start(1, 1, Path::new("a_part_1.jsonl"));
        cb.on_batch_created(1, 1, "file", "batch");
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_shape_start(10);
        cb.on_record_written(1);
    }
}
