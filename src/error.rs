//! Error types for the alcademic-batch library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BatchError`] — **Fatal**: the run cannot proceed at all (input file
//!   missing, JSON still broken after repair, shard file not writable).
//!   Returned as `Err(BatchError)` from [`crate::shape()`] and
//!   [`crate::submit_shards()`].
//!
//! * [`RecordError`] — **Non-fatal**: a single metadata record is unusable
//!   (missing id, empty abstract). The record is skipped, counted, and kept
//!   in [`crate::output::ShapeStats::skipped_records`] so callers can report
//!   on it after the run.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the alcademic-batch library.
///
/// Record-level defects use [`RecordError`] and never abort a run.
#[derive(Debug, Error)]
pub enum BatchError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Metadata file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Input file exists but could not be read (permissions, invalid UTF-8, …).
    #[error("Failed to read metadata file '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Parse errors ──────────────────────────────────────────────────────
    /// The text is still not valid JSON after the repair pass.
    #[error("Invalid JSON in '{path}' after repair: {detail}")]
    MalformedInput { path: PathBuf, detail: String },

    /// Valid JSON, but the top level is not an array of records.
    #[error("Input JSON in '{path}' is not a list of objects (found {found})")]
    NotAnArray { path: PathBuf, found: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create the directory that holds the shard files.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create a shard file.
    #[error("Failed to open shard file '{path}': {source}")]
    ShardOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write to (or flush) an open shard file.
    #[error("Failed to write shard file '{path}': {source}")]
    ShardWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Submission errors ─────────────────────────────────────────────────
    /// A shard listed for submission does not exist on disk.
    #[error("Shard file not found: '{path}'\nRun `alcademic-batch shape` first.")]
    ShardNotFound { path: PathBuf },

    /// No shards matched the given prefix.
    #[error("No shard files found for prefix '{prefix}' (expected '{prefix}_part_1.jsonl')")]
    NoShards { prefix: PathBuf },

    /// The batch API rejected an upload or batch creation.
    #[error("Batch submission failed for '{path}' at part {part}/{total}: {source}")]
    Submission {
        path: PathBuf,
        part: usize,
        total: usize,
        #[source]
        source: zhipu_batch::BatchApiError,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BatchError {
    /// The pipeline stage that failed, for stage-tagged diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            BatchError::InvalidConfig(_) => "config",
            BatchError::InputNotFound { .. } | BatchError::InputReadFailed { .. } => "read",
            BatchError::MalformedInput { .. } | BatchError::NotAnArray { .. } => "parse",
            BatchError::OutputDirFailed { .. }
            | BatchError::ShardOpenFailed { .. }
            | BatchError::ShardWriteFailed { .. } => "write",
            BatchError::ShardNotFound { .. }
            | BatchError::NoShards { .. }
            | BatchError::Submission { .. } => "submit",
            BatchError::Internal(_) => "internal",
        }
    }
}

/// A non-fatal defect in a single metadata record.
///
/// `index` is the 0-based position of the record in the input array.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum RecordError {
    /// The array element is not a JSON object.
    #[error("record #{index}: not an object")]
    NotAnObject { index: usize },

    /// `_id`, `title` or `abstract` is absent, null, or empty.
    #[error("record #{index}: missing essential field '{field}'")]
    MissingField { index: usize, field: String },

    /// The abstract is only whitespace.
    #[error("record #{index} (id '{id}'): abstract is empty after trimming")]
    EmptyAbstract { index: usize, id: String },
}

impl RecordError {
    pub fn index(&self) -> usize {
        match self {
            RecordError::NotAnObject { index }
            | RecordError::MissingField { index, .. }
            | RecordError::EmptyAbstract { index, .. } => *index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_tags() {
        assert_eq!(BatchError::InvalidConfig("x".into()).stage(), "config");
        assert_eq!(
            BatchError::InputNotFound {
                path: "in.json".into()
            }
            .stage(),
            "read"
        );
        assert_eq!(
            BatchError::MalformedInput {
                path: "in.json".into(),
                detail: "eof".into()
            }
            .stage(),
            "parse"
        );
        assert_eq!(
            BatchError::ShardOpenFailed {
                path: "out_part_1.jsonl".into(),
                source: std::io::Error::other("denied"),
            }
            .stage(),
            "write"
        );
        assert_eq!(
            BatchError::NoShards {
                prefix: "out/req".into()
            }
            .stage(),
            "submit"
        );
    }

    #[test]
    fn not_an_array_display() {
        let e = BatchError::NotAnArray {
            path: "meta.json".into(),
            found: "object".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("not a list"), "got: {msg}");
        assert!(msg.contains("object"), "got: {msg}");
    }

    #[test]
    fn submission_display_names_part() {
        let e = BatchError::Submission {
            path: "out_part_2.jsonl".into(),
            part: 2,
            total: 3,
            source: zhipu_batch::BatchApiError::MissingApiKey,
        };
        assert!(e.to_string().contains("part 2/3"));
    }

    #[test]
    fn record_error_display_and_index() {
        let e = RecordError::MissingField {
            index: 4,
            field: "abstract".into(),
        };
        assert_eq!(e.index(), 4);
        assert!(e.to_string().contains("'abstract'"));

        let e = RecordError::EmptyAbstract {
            index: 7,
            id: "p7".into(),
        };
        assert_eq!(e.index(), 7);
        assert!(e.to_string().contains("p7"));
    }
}
