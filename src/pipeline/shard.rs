//! Shard writer: append request lines to fixed-capacity `.jsonl` files.
//!
//! All writer state (open file, shard index, line count) lives in one
//! [`ShardWriter`] value owned by the caller. Exactly one shard is open at a
//! time. A shard is created lazily on the first write after the previous one
//! filled up, and sealed (flushed and closed) as soon as it holds
//! `max_lines` requests or the writer is finished.

use crate::error::BatchError;
use crate::output::ShardSummary;
use crate::pipeline::record::ChatRequest;
use crate::progress::ProgressCallback;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// `<prefix>_part_<index>.jsonl`.
pub fn shard_path(prefix: &Path, index: usize) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!("_part_{index}.jsonl"));
    PathBuf::from(name)
}

struct OpenShard {
    index: usize,
    path: PathBuf,
    writer: BufWriter<File>,
    lines: usize,
}

/// Writes [`ChatRequest`]s as JSON lines, rotating every `max_lines`.
pub struct ShardWriter {
    prefix: PathBuf,
    max_lines: usize,
    /// Index the next opened shard receives. Bumped only on rotation.
    next_index: usize,
    current: Option<OpenShard>,
    sealed: Vec<ShardSummary>,
    progress: Option<ProgressCallback>,
}

impl ShardWriter {
    /// Prepare a writer, creating the prefix's parent directory if needed.
    ///
    /// No shard file is created until the first [`write`](Self::write).
    pub fn create(prefix: impl Into<PathBuf>, max_lines: usize) -> Result<Self, BatchError> {
        if max_lines == 0 {
            return Err(BatchError::InvalidConfig(
                "Chunk size must be a positive integer".into(),
            ));
        }
        let prefix = prefix.into();

        if let Some(dir) = prefix.parent().filter(|d| !d.as_os_str().is_empty()) {
            if !dir.is_dir() {
                std::fs::create_dir_all(dir).map_err(|e| BatchError::OutputDirFailed {
                    path: dir.to_path_buf(),
                    source: e,
                })?;
                info!("Created output directory: {}", dir.display());
            }
        }

        Ok(Self {
            prefix,
            max_lines,
            next_index: 1,
            current: None,
            sealed: Vec::new(),
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Append one request, opening or sealing shards as needed.
    ///
    /// On failure the open shard is sealed best-effort and the error returned;
    /// the writer should not be used afterwards.
    pub fn write(&mut self, request: &ChatRequest) -> Result<(), BatchError> {
        if self.current.is_none() {
            self.open_next()?;
        }

        let Some(shard) = self.current.as_mut() else {
            return Err(BatchError::Internal("no shard open after rotation".into()));
        };
        if let Err(e) = write_line(&mut shard.writer, request) {
            let path = shard.path.clone();
            self.abort();
            return Err(BatchError::ShardWriteFailed { path, source: e });
        }
        shard.lines += 1;

        if shard.lines >= self.max_lines {
            self.seal_current()?;
            self.next_index += 1;
        }
        Ok(())
    }

    /// Seal the open shard (if any) and return every shard written.
    pub fn finish(mut self) -> Result<Vec<ShardSummary>, BatchError> {
        self.seal_current()?;
        Ok(std::mem::take(&mut self.sealed))
    }

    /// Best-effort flush and close of the open shard after a failure.
    pub fn abort(&mut self) {
        if let Some(mut shard) = self.current.take() {
            if let Err(e) = shard.writer.flush() {
                warn!("Failed to flush '{}' while aborting: {}", shard.path.display(), e);
            }
            debug!("Closed '{}' after {} lines (aborted)", shard.path.display(), shard.lines);
        }
    }

    /// Lines in the currently open shard (0 when none is open).
    pub fn current_lines(&self) -> usize {
        self.current.as_ref().map_or(0, |s| s.lines)
    }

    /// Shards sealed so far, not counting the open one.
    pub fn sealed(&self) -> &[ShardSummary] {
        &self.sealed
    }

    fn open_next(&mut self) -> Result<(), BatchError> {
        let path = shard_path(&self.prefix, self.next_index);
        info!("Creating output file: {}", path.display());

        let file = File::create(&path).map_err(|e| BatchError::ShardOpenFailed {
            path: path.clone(),
            source: e,
        })?;

        if let Some(cb) = &self.progress {
            cb.on_shard_opened(self.next_index, &path);
        }

        self.current = Some(OpenShard {
            index: self.next_index,
            path,
            writer: BufWriter::new(file),
            lines: 0,
        });
        Ok(())
    }

    fn seal_current(&mut self) -> Result<(), BatchError> {
        let Some(mut shard) = self.current.take() else {
            return Ok(());
        };

        shard
            .writer
            .flush()
            .map_err(|e| BatchError::ShardWriteFailed {
                path: shard.path.clone(),
                source: e,
            })?;

        info!("Finished writing {} lines to '{}'", shard.lines, shard.path.display());
        if let Some(cb) = &self.progress {
            cb.on_shard_sealed(shard.index, &shard.path, shard.lines);
        }

        self.sealed.push(ShardSummary {
            index: shard.index,
            path: shard.path,
            lines: shard.lines,
        });
        Ok(())
    }
}

impl Drop for ShardWriter {
    fn drop(&mut self) {
        self.abort();
    }
}

/// One compact JSON object plus `\n`. Non-ASCII is written as UTF-8.
fn write_line<W: Write>(w: &mut W, request: &ChatRequest) -> std::io::Result<()> {
    serde_json::to_writer(&mut *w, request)?;
    w.write_all(b"\n")
}
