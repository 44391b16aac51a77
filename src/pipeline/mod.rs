//! Pipeline stages for metadata-to-batch shaping.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! raw text ──▶ repair ──▶ record ──▶ shard
//!             (regex)    (validate,  (rotate every
//!                         prompt)     chunk_size lines)
//! ```
//!
//! 1. [`repair`] — text-level fixes for known defects in metadata dumps
//!    (stray backslashes, control characters, trailing commas)
//! 2. [`record`] — parse the array, validate each record, build its
//!    [`record::ChatRequest`]
//! 3. [`shard`]  — append request lines to `<prefix>_part_<n>.jsonl`,
//!    sealing each file once it holds `chunk_size` lines

pub mod record;
pub mod repair;
pub mod shard;
