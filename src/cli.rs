use crate::{
    config::Config,
    pipeline::Pipeline,
    report::RunReport,
    scheduler::run_batch,
    serialize::serialize,
    util::{ensure_dir, now_rfc3339},
};
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// At least one document failed; the payload is still complete.
pub const EXIT_DOCUMENT_FAILED: u8 = 1;
/// Bad configuration or an I/O failure outside the batch.
pub const EXIT_FATAL: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "batch-ocr", version)]
#[command(about = "OCR a batch of scanned PDFs in parallel; prints a JSON array of texts in input order")]
pub struct Args {
    /// Documents to recognize. Output order follows argument order.
    pub paths: Vec<PathBuf>,

    /// Path to config TOML. If omitted, uses ./batch-ocr.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Recognition language, e.g. `pol` or `pol+eng`.
    #[arg(long)]
    pub lang: Option<String>,

    /// Maximum concurrent documents (0 = one per CPU).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Kill an external tool after this many seconds (0 = never).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Write a JSON run report to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

pub fn dispatch(args: Args) -> Result<ExitCode> {
    let mut cfg = Config::resolve(args.config.as_deref())?;
    cfg.apply_env();
    apply_overrides(&args, &mut cfg);
    cfg.validate()?;

    let _guard = init_logging(&args, &cfg)?;
    run(&args, &cfg)
}

fn apply_overrides(args: &Args, cfg: &mut Config) {
    if let Some(lang) = &args.lang {
        cfg.ocr.language = lang.clone();
    }
    if let Some(workers) = args.workers {
        cfg.batch.max_workers = workers;
    }
    if let Some(secs) = args.timeout {
        cfg.tools.process_timeout_seconds = secs;
    }
}

fn run(args: &Args, cfg: &Config) -> Result<ExitCode> {
    let started = now_rfc3339();
    let pipeline = Pipeline::from_config(cfg);
    let outcome = run_batch(&pipeline, &args.paths, cfg.batch.max_workers);

    {
        let mut stderr = std::io::stderr().lock();
        for err in &outcome.errors {
            writeln!(stderr, "{}", err.diagnostic_line())?;
        }
    }

    let payload = serialize(&outcome.texts())?;
    {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{payload}").context("writing results")?;
        stdout.flush().context("writing results")?;
    }

    if let Some(path) = &args.report {
        let report = RunReport::build(
            &args.paths,
            &outcome,
            pipeline.language(),
            started,
            now_rfc3339(),
        );
        write_report(path, &report)?;
        info!("report written to {}", path.display());
    }

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_DOCUMENT_FAILED)
    })
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(report)?)
        .with_context(|| format!("writing report: {}", path.display()))
}

/// Logs go to stderr (and optionally a file); stdout carries only the
/// payload.
fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if !cfg.logging.file_path.is_empty() {
        let path = Path::new(&cfg.logging.file_path);
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}
