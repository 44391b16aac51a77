//! Result types returned by shaping and submission.

use crate::error::RecordError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A sealed shard file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSummary {
    /// 1-based shard number, as in `<prefix>_part_<index>.jsonl`.
    pub index: usize,
    pub path: PathBuf,
    /// Request lines in the file.
    pub lines: usize,
}

/// Statistics for one shaping run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShapeStats {
    /// Elements in the input array.
    pub input_records: usize,
    /// Requests written across all shards.
    pub processed: usize,
    /// Records rejected by validation.
    pub skipped: usize,
    /// Why each skipped record was rejected, in input order.
    pub skipped_records: Vec<RecordError>,
    /// Shards in creation order.
    pub shards: Vec<ShardSummary>,
    pub duration_ms: u64,
}

impl ShapeStats {
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// `true` when the run wrote no shard at all.
    pub fn is_empty_output(&self) -> bool {
        self.shards.is_empty()
    }
}

/// One shard registered as a batch job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedBatch {
    /// 1-based position in the submission order.
    pub part: usize,
    pub path: PathBuf,
    pub file_id: String,
    pub batch_id: String,
    /// Status reported at creation time (usually `validating`).
    pub status: Option<String>,
}
