//! Shaping entry points: metadata file in, request shards out.
//!
//! The run is strictly sequential: read the whole file, repair, parse, then
//! validate and write one record at a time. Record-level defects are counted
//! and skipped; anything structural (unreadable input, JSON still broken
//! after repair, a shard that cannot be written) aborts the run.

use crate::config::ShapeConfig;
use crate::error::BatchError;
use crate::output::ShapeStats;
use crate::pipeline::record::{self, ChatRequest, MetadataRecord};
use crate::pipeline::repair;
use crate::pipeline::shard::ShardWriter;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert the metadata file at `config.input_path` into request shards.
///
/// # Returns
/// `Ok(ShapeStats)` when the whole input was processed, even if records were
/// skipped (check `stats.skipped`). An empty input array yields stats with
/// no shards.
///
/// # Errors
/// - [`BatchError::InvalidConfig`] — no input path
/// - [`BatchError::InputNotFound`] / [`BatchError::InputReadFailed`]
/// - [`BatchError::MalformedInput`] / [`BatchError::NotAnArray`]
/// - [`BatchError::OutputDirFailed`] / [`BatchError::ShardOpenFailed`] /
///   [`BatchError::ShardWriteFailed`] — shards sealed before the failure
///   stay on disk
pub fn shape(config: &ShapeConfig) -> Result<ShapeStats, BatchError> {
    if config.input_path.as_os_str().is_empty() {
        return Err(BatchError::InvalidConfig("Input path is required".into()));
    }
    info!("Starting processing of '{}'", config.input_path.display());
    let text = read_input(&config.input_path)?;
    shape_text(&text, &config.input_path, config)
}

/// Same pipeline as [`shape`], reading metadata from `json_text`.
///
/// `config.input_path` is ignored.
pub fn shape_str(json_text: &str, config: &ShapeConfig) -> Result<ShapeStats, BatchError> {
    shape_text(json_text, Path::new("<memory>"), config)
}

fn read_input(path: &Path) -> Result<String, BatchError> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => BatchError::InputNotFound {
            path: path.to_path_buf(),
        },
        _ => BatchError::InputReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    debug!("Read {} bytes from {}", text.len(), path.display());

    // A UTF-8 BOM is not a control character and would fail parsing.
    Ok(match text.strip_prefix('\u{FEFF}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

fn shape_text(text: &str, source: &Path, config: &ShapeConfig) -> Result<ShapeStats, BatchError> {
    let start = Instant::now();
    let progress = config.progress_callback.as_ref();

    // ── Step 1: Repair ───────────────────────────────────────────────────
    info!("Repairing stray backslashes, control characters and trailing commas");
    let repaired = repair::repair_json_text(text);

    // ── Step 2: Parse ────────────────────────────────────────────────────
    info!("Parsing corrected JSON text");
    let records = record::parse_records(&repaired, source)?;
    drop(repaired);

    if let Some(cb) = progress {
        cb.on_shape_start(records.len());
    }

    if records.is_empty() {
        info!("Input metadata file is empty. No output generated.");
        if let Some(cb) = progress {
            cb.on_shape_complete(0, 0, 0);
        }
        return Ok(ShapeStats {
            duration_ms: start.elapsed().as_millis() as u64,
            ..ShapeStats::default()
        });
    }
    info!(
        "Loaded {} records; output prefix '{}', chunk size {}",
        records.len(),
        config.output_prefix.display(),
        config.chunk_size
    );

    // ── Step 3: Validate, build, write ───────────────────────────────────
    let mut writer = ShardWriter::create(&config.output_prefix, config.chunk_size)?
        .with_progress(config.progress_callback.clone());
    let mut stats = ShapeStats {
        input_records: records.len(),
        ..ShapeStats::default()
    };

    for (index, value) in records.iter().enumerate() {
        let record = match MetadataRecord::from_value(index, value) {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping {}", e);
                if let Some(cb) = progress {
                    cb.on_record_skipped(&e);
                }
                stats.skipped_records.push(e);
                continue;
            }
        };

        let request = ChatRequest::for_record(&record, &config.model, &config.system_prompt);
        writer.write(&request)?;
        stats.processed += 1;

        if let Some(cb) = progress {
            cb.on_record_written(stats.processed);
        }
        if stats.processed % config.progress_every.max(1) == 0 {
            info!(
                "Processed {} records... ({} in current shard)",
                stats.processed,
                writer.current_lines()
            );
        }
    }

    // ── Step 4: Seal and report ──────────────────────────────────────────
    stats.shards = writer.finish()?;
    stats.skipped = stats.skipped_records.len();
    stats.duration_ms = start.elapsed().as_millis() as u64;

    info!(
        "Processing finished: {} records written into {} file(s), {} skipped, {}ms",
        stats.processed,
        stats.shard_count(),
        stats.skipped,
        stats.duration_ms
    );
    if let Some(cb) = progress {
        cb.on_shape_complete(stats.processed, stats.skipped, stats.shard_count());
    }

    Ok(stats)
}
