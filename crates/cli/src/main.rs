mod output;
mod settings;

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;

use expression_reader_core::detection::infrastructure::onnx_expression_detector::OnnxExpressionDetector;
use expression_reader_core::media::infrastructure::snapshot_file_source::SnapshotFileSource;
use expression_reader_core::pipeline::cycle_logger::LogCycleLogger;
use expression_reader_core::pipeline::readiness::ReadinessState;
use expression_reader_core::pipeline::result_publisher::ResultPublisher;
use expression_reader_core::pipeline::sampling_loop::{
    SamplingConfig, SamplingHandle, SamplingLoop,
};
use expression_reader_core::pipeline::sampling_stats::StatsSnapshot;
use expression_reader_core::shared::model_resolver::ModelResolver;

use output::{format_json, format_text};
use settings::{OutputFormat, Settings};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Live facial expression reading from a camera snapshot or frame directory.
#[derive(Parser)]
#[command(name = "expression-reader")]
struct Cli {
    /// Snapshot image kept up to date by a capture process, or a directory of
    /// frames replayed in name order.
    source: PathBuf,

    /// Settings file (defaults to the user config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sampling interval in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Number of expressions reported per cycle.
    #[arg(long)]
    top_n: Option<usize>,

    /// Face localization confidence threshold (0.0-1.0).
    #[arg(long)]
    face_confidence: Option<f64>,

    /// Directory searched for model files before downloading.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Automatic retries after a failed model load.
    #[arg(long)]
    load_retries: Option<u32>,

    /// Output format for each cycle.
    #[arg(long, value_enum)]
    output: Option<OutputFormat>,

    /// Stop after this many seconds (runs until interrupted otherwise).
    #[arg(long)]
    duration_secs: Option<u64>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;
    validate(&cli, &settings)?;

    let resolver = ModelResolver::with_default_cache(settings.model_dir.clone())?;
    log::info!("Model cache: {}", resolver.cache_dir().display());
    let detector = OnnxExpressionDetector::new(resolver, settings.face_confidence);
    let source = SnapshotFileSource::new(&cli.source);

    let config = SamplingConfig::new(OnnxExpressionDetector::model_steps())
        .with_interval(Duration::from_millis(settings.interval_ms))
        .with_top_n(settings.top_n);

    let handle = SamplingLoop::start(
        config,
        Box::new(detector),
        Box::new(source),
        build_publisher(settings.output),
        Box::new(LogCycleLogger::new()),
    )?;

    let deadline = cli
        .duration_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let stats = supervise_and_join(handle, settings.load_retries, deadline)?;
    log::info!(
        "Published {} cycles, dropped {} ticks",
        stats.cycles_published,
        stats.ticks_dropped()
    );
    Ok(())
}

/// Runs [`supervise`], then always joins the loop so the worker finishes and
/// its summary is logged before any error is reported.
fn supervise_and_join(
    handle: SamplingHandle,
    load_retries: u32,
    deadline: Option<Instant>,
) -> Result<StatsSnapshot, Box<dyn std::error::Error>> {
    let outcome = supervise(&handle, load_retries, deadline);
    let stats = handle.join();
    outcome.map(|()| stats)
}

/// Watches readiness and media state until the deadline, retrying failed
/// model loads up to `load_retries` times.
fn supervise(
    handle: &SamplingHandle,
    load_retries: u32,
    deadline: Option<Instant>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut retries_left = load_retries;
    loop {
        if let ReadinessState::LoadFailed(reason) = handle.readiness() {
            if retries_left == 0 {
                return Err(format!("Model loading failed: {reason}").into());
            }
            retries_left -= 1;
            log::warn!("Model loading failed, retrying ({retries_left} retries left)");
            handle.retry();
        }
        if let Some(e) = handle.acquisition_error() {
            return Err(e.into());
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(());
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Prints one line per published cycle. Both callbacks run on the worker
/// thread, face first, so the expressions callback sees the matching flag.
fn build_publisher(format: OutputFormat) -> ResultPublisher {
    let face_detected = Arc::new(AtomicBool::new(false));
    let face_writer = face_detected.clone();

    ResultPublisher::new()
        .on_face_detected(move |detected| face_writer.store(detected, Ordering::Relaxed))
        .on_expressions_detected(move |expressions| {
            let detected = face_detected.load(Ordering::Relaxed);
            match format {
                OutputFormat::Text => println!("{}", format_text(detected, expressions)),
                OutputFormat::Json => match format_json(detected, expressions) {
                    Ok(line) => println!("{line}"),
                    Err(e) => log::error!("Cannot encode cycle: {e}"),
                },
            }
        })
}

fn resolve_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(interval_ms) = cli.interval_ms {
        settings.interval_ms = interval_ms;
    }
    if let Some(top_n) = cli.top_n {
        settings.top_n = top_n;
    }
    if let Some(face_confidence) = cli.face_confidence {
        settings.face_confidence = face_confidence;
    }
    if let Some(ref model_dir) = cli.model_dir {
        settings.model_dir = Some(model_dir.clone());
    }
    if let Some(load_retries) = cli.load_retries {
        settings.load_retries = load_retries;
    }
    if let Some(output) = cli.output {
        settings.output = output;
    }
    Ok(settings)
}

fn validate(cli: &Cli, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let parent_exists = cli
        .source
        .parent()
        .map(|p| p.as_os_str().is_empty() || p.exists())
        .unwrap_or(false);
    if !cli.source.exists() && !parent_exists {
        return Err(format!("Source not found: {}", cli.source.display()).into());
    }
    if cli.duration_secs == Some(0) {
        return Err("Duration must be at least 1 second".into());
    }
    settings.validate()
}
