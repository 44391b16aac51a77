//! CLI binary for alcademic-batch.
//!
//! A thin shim over the library crate that maps CLI flags to `ShapeConfig` /
//! `SubmitConfig` and prints results.

use alcademic_batch::{
    discover_shards, shape, submit_shards_sync, BatchError, ProgressCallback, RecordError,
    ShapeConfig, ShapeProgressCallback, ShapeStats, SubmitConfig, SubmittedBatch,
    DEFAULT_CHUNK_SIZE,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over all records, plus a log line per
/// sealed shard or created batch.
struct CliProgressCallback {
    bar: ProgressBar,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading metadata…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            skipped: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize, unit: &str) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] {{pos:>7}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  ETA {{eta_precise}}"
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.reset_eta();
    }
}

impl ShapeProgressCallback for CliProgressCallback {
    fn on_shape_start(&self, total_records: usize) {
        self.activate_bar(total_records, "records");
        self.bar.set_prefix("Shaping");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Loaded {total_records} records"))
        ));
    }

    fn on_record_written(&self, _processed: usize) {
        self.bar.inc(1);
    }

    fn on_record_skipped(&self, _error: &RecordError) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        self.bar.inc(1);
    }

    fn on_shard_opened(&self, index: usize, _path: &Path) {
        self.bar.set_message(format!("shard {index}"));
    }

    fn on_shard_sealed(&self, index: usize, path: &Path, lines: usize) {
        self.bar.println(format!(
            "  {} Shard {:>3}  {}  {}",
            green("✓"),
            index,
            dim(&format!("{lines:>7} lines")),
            path.display()
        ));
    }

    fn on_shape_complete(&self, _processed: usize, _skipped: usize, _shards: usize) {
        self.bar.finish_and_clear();
    }

    fn on_upload_start(&self, part: usize, total: usize, path: &Path) {
        if part == 1 {
            self.activate_bar(total, "batches");
            self.bar.set_prefix("Submitting");
        }
        self.bar.set_message(format!("uploading {}", path.display()));
    }

    fn on_batch_created(&self, part: usize, total: usize, file_id: &str, batch_id: &str) {
        self.bar.println(format!(
            "  {} Part {:>3}/{:<3}  file {}  →  batch {}",
            green("✓"),
            part,
            total,
            dim(file_id),
            bold(batch_id)
        ));
        self.bar.inc(1);
        if part == total {
            self.bar.finish_and_clear();
        }
    }
}

// An aborted run never reaches `on_shape_complete`; clear the spinner before
// the error is printed.
impl Drop for CliProgressCallback {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Shape a metadata dump into 50 000-line shards
  alcademic-batch shape --input-json data/meta.json --output-prefix out/requests

  # Smaller shards, another model
  alcademic-batch shape --input-json data/meta.json --output-prefix out/requests \
      --chunk-size 10000 --model glm-4-air

  # Submit every out/requests_part_N.jsonl
  alcademic-batch submit --prefix out/requests

  # Submit specific shards
  alcademic-batch submit out/requests_part_3.jsonl out/requests_part_4.jsonl

OUTPUT LINE FORMAT:
  {"custom_id":"extract-<_id>","method":"POST","url":"/v4/chat/completions",
   "body":{"model":"<model>","messages":[{"role":"system",...},{"role":"user",...}],
           "temperature":"0.1"}}

ENVIRONMENT VARIABLES:
  ZHIPUAI_API_KEY         API key used by `submit` (also read from .env)
  ZHIPUAI_BASE_URL        Override the API root
  RUST_LOG                Override log filtering (e.g. alcademic_batch=debug)
"#;

/// Shape paper metadata into LLM batch-request shards and submit them.
#[derive(Parser, Debug)]
#[command(
    name = "alcademic-batch",
    version,
    about = "Convert paper metadata JSON into batch-API JSONL shards and submit them",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "ALCADEMIC_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "ALCADEMIC_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "ALCADEMIC_NO_PROGRESS")]
    no_progress: bool,

    /// Print a JSON summary on stdout.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a metadata JSON array into `<prefix>_part_N.jsonl` shards.
    Shape(ShapeArgs),
    /// Upload shards and create one batch job per shard.
    Submit(SubmitArgs),
}

#[derive(clap::Args, Debug)]
struct ShapeArgs {
    /// JSON file containing a list of paper metadata objects.
    #[arg(long, env = "ALCADEMIC_INPUT_JSON")]
    input_json: PathBuf,

    /// Prefix for shard names (e.g. 'out/requests' → 'out/requests_part_1.jsonl').
    #[arg(long, env = "ALCADEMIC_OUTPUT_PREFIX")]
    output_prefix: PathBuf,

    /// Maximum number of requests per shard.
    #[arg(long, env = "ALCADEMIC_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE as u64,
          value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: u64,

    /// Model name written into each request body (e.g. glm-4-flash, glm-4).
    #[arg(long, env = "ALCADEMIC_MODEL", default_value = alcademic_batch::prompts::DEFAULT_MODEL)]
    model: String,

    /// Content of the 'system' message.
    #[arg(long, env = "ALCADEMIC_SYSTEM_PROMPT", conflicts_with = "system_prompt_file")]
    system_prompt: Option<String>,

    /// Read the 'system' message from a text file.
    #[arg(long)]
    system_prompt_file: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct SubmitArgs {
    /// Submit every '<prefix>_part_N.jsonl' from N = 1 up to the first gap.
    #[arg(long, conflicts_with = "shards", required_unless_present = "shards")]
    prefix: Option<PathBuf>,

    /// Explicit shard files, submitted in the given order.
    shards: Vec<PathBuf>,

    /// Provider API key.
    #[arg(long, env = "ZHIPUAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API root URL.
    #[arg(long, env = "ZHIPUAI_BASE_URL", default_value = zhipu_batch::DEFAULT_BASE_URL)]
    base_url: String,

    /// Completion window for each batch.
    #[arg(long, default_value = zhipu_batch::DEFAULT_COMPLETION_WINDOW)]
    completion_window: String,

    /// Description metadata; ' part i/N' is appended.
    #[arg(long, default_value = "Paper metadata extraction")]
    description: String,
}

fn main() -> Result<()> {
    // .env must be loaded before clap reads `env = ...` fallbacks.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides all the feedback that matters; keep library
    // INFO logs out of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as ProgressCallback)
    } else {
        None
    };

    match &cli.command {
        Command::Shape(args) => run_shape(&cli, args, progress),
        Command::Submit(args) => run_submit(&cli, args, progress),
    }
}

fn run_shape(cli: &Cli, args: &ShapeArgs, progress: Option<ProgressCallback>) -> Result<()> {
    let config = build_shape_config(args, progress)?;
    let stats = shape(&config).map_err(|e| staged(e, "Shaping"))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialise summary")?
        );
    }
    if !cli.quiet {
        print_shape_summary(&stats);
    }
    Ok(())
}

fn run_submit(cli: &Cli, args: &SubmitArgs, progress: Option<ProgressCallback>) -> Result<()> {
    let mut builder = SubmitConfig::builder()
        .base_url(&args.base_url)
        .completion_window(&args.completion_window)
        .description(&args.description);
    if let Some(ref key) = args.api_key {
        builder = builder.api_key(key);
    }
    let config = builder.build().context("Invalid configuration")?;
    let client = config.client().map_err(|e| staged(e, "Submission"))?;

    let shards = match &args.prefix {
        Some(prefix) => {
            let found = discover_shards(prefix);
            if found.is_empty() {
                return Err(staged(
                    BatchError::NoShards {
                        prefix: prefix.clone(),
                    },
                    "Submission",
                ));
            }
            found
        }
        None => args.shards.clone(),
    };

    let submitted = submit_shards_sync(&client, &shards, &config, progress.as_ref())
        .map_err(|e| staged(e, "Submission"))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&submitted).context("Failed to serialise summary")?
        );
    }
    if !cli.quiet {
        print_submit_summary(&submitted);
    }
    Ok(())
}

/// Map CLI args to `ShapeConfig`.
fn build_shape_config(args: &ShapeArgs, progress: Option<ProgressCallback>) -> Result<ShapeConfig> {
    let system_prompt = match (&args.system_prompt, &args.system_prompt_file) {
        (Some(s), _) => Some(s.clone()),
        (None, Some(path)) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        ),
        (None, None) => None,
    };

    let chunk_size = usize::try_from(args.chunk_size).context("Chunk size too large")?;
    let mut builder = ShapeConfig::builder()
        .input_path(&args.input_json)
        .output_prefix(&args.output_prefix)
        .chunk_size(chunk_size)
        .model(&args.model);

    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().map_err(|e| staged(e, "Configuration"))
}

/// Wrap a library error with the stage it failed in.
fn staged(e: BatchError, what: &str) -> anyhow::Error {
    let stage = e.stage();
    anyhow::Error::new(e).context(format!("{what} aborted at the {stage} stage"))
}

fn print_shape_summary(stats: &ShapeStats) {
    eprintln!("{}", dim(&"-".repeat(30)));
    if stats.is_empty_output() {
        eprintln!(
            "{} Input file was empty or contained no valid processable records. No output generated.",
            cyan("⚠")
        );
        if stats.skipped > 0 {
            eprintln!("  Skipped {} records due to missing data or empty abstracts.", red(&stats.skipped.to_string()));
        }
    } else {
        eprintln!(
            "{} Wrote {} records into {} file(s) in {}ms",
            green("✔"),
            bold(&stats.processed.to_string()),
            bold(&stats.shard_count().to_string()),
            stats.duration_ms
        );
        for shard in &stats.shards {
            eprintln!("   {}  {}", dim(&format!("{:>7} lines", shard.lines)), shard.path.display());
        }
        eprintln!(
            "  Skipped {} records due to missing data or empty abstracts.",
            if stats.skipped == 0 {
                stats.skipped.to_string()
            } else {
                red(&stats.skipped.to_string())
            }
        );
    }
    eprintln!("{}", dim(&"-".repeat(30)));
}

fn print_submit_summary(submitted: &[SubmittedBatch]) {
    eprintln!(
        "{} Created {} batch job(s)",
        green("✔"),
        bold(&submitted.len().to_string())
    );
    for b in submitted {
        eprintln!(
            "   ({}/{}) {}  →  {}  {}",
            b.part,
            submitted.len(),
            b.path.display(),
            bold(&b.batch_id),
            dim(b.status.as_deref().unwrap_or(""))
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar_cleared_when_run_aborts() {
        let cb = CliProgressCallback::new();
        cb.on_shape_start(10);
        cb.on_record_written(1);
        let bar = cb.bar.clone();
        assert!(!bar.is_finished());

        drop(cb);
        assert!(bar.is_finished());
    }

    #[test]
    fn test_last_batch_finishes_bar() {
        let cb = CliProgressCallback::new();
        cb.on_upload_start(1, 1, Path::new("req_part_1.jsonl"));
        cb.on_batch_created(1, 1, "file-1", "batch-1");
        assert!(cb.bar.is_finished());
    }
}
