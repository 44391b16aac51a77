//! # alcademic-batch
//!
//! Turn a dump of academic paper metadata into sharded request files for an
//! LLM batch API, then submit those shards.
//!
//! ## Pipeline Overview
//!
//! ```text
//! metadata.json
//!  │
//!  ├─ 1. Read     whole file into memory
//!  ├─ 2. Repair   stray backslashes, control chars, trailing commas
//!  ├─ 3. Parse    top-level JSON array
//!  ├─ 4. Shape    validate each record → ChatRequest (skip + count defects)
//!  ├─ 5. Shard    <prefix>_part_N.jsonl, chunk_size lines each
//!  └─ 6. Submit   upload each shard, create one batch per shard (optional)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use alcademic_batch::{shape, ShapeConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ShapeConfig::builder()
//!         .input_path("data/meta.json")
//!         .output_prefix("out/requests")
//!         .build()?;
//!     let stats = shape(&config)?;
//!     eprintln!(
//!         "{} written, {} skipped, {} shard(s)",
//!         stats.processed,
//!         stats.skipped,
//!         stats.shard_count()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `alcademic-batch` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod shape;
pub mod submit;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ShapeConfig, ShapeConfigBuilder, SubmitConfig, SubmitConfigBuilder, DEFAULT_CHUNK_SIZE};
pub use error::{BatchError, RecordError};
pub use output::{ShapeStats, ShardSummary, SubmittedBatch};
pub use pipeline::record::{ChatMessage, ChatRequest, MetadataRecord, RequestBody};
pub use pipeline::repair::repair_json_text;
pub use pipeline::shard::{shard_path, ShardWriter};
pub use progress::{NoopProgressCallback, ProgressCallback, ShapeProgressCallback};
pub use shape::{shape, shape_str};
pub use submit::{discover_shards, submit_prefix, submit_shards, submit_shards_sync};
pub use zhipu_batch::{BatchApi, BatchApiError, ZhipuClient};
