// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// upright — page orientation and readability triage.
//
// Entry point. Initialises logging, loads configuration, opens the input
// (one PDF or a list of page images), runs the requested pipelines, and
// prints a JSON run report on stdout. Logs go to stderr.

mod source;

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use upright_core::human_errors::humanize_error;
use upright_core::{PageIndex, PageSlots, PipelineConfig, UprightError};
use upright_document::{OrientationPipeline, PageClassifier, PdfWriter, classify_document};

use source::Source;

/// Exit code for a run stopped by Ctrl-C (128 + SIGINT).
const EXIT_CANCELLED: u8 = 130;

/// How long shutdown waits for blocking work still running after the
/// report is out, such as an OCR call abandoned at its timeout.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "upright")]
#[command(version, about = "Estimate page orientation and triage page readability", long_about = None)]
struct Cli {
    /// JSON configuration file; flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Estimate the upright rotation of every page
    Orient {
        #[command(flatten)]
        input: InputArgs,

        /// Include every candidate angle's score in the output
        #[arg(long)]
        scores: bool,
    },

    /// Classify every page as MACHINE_READABLE, OCR_RECOVERABLE or UNREADABLE
    Classify {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        ocr: OcrArgs,
    },

    /// Orient and classify every page, optionally writing an upright PDF
    Run {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        ocr: OcrArgs,

        /// Write the upright pages to this PDF
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// One PDF file, or page images in page order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Rasterisation DPI for PDF input
    #[arg(long)]
    dpi: Option<u32>,

    /// Orientation worker threads (0 = one per core)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Args, Debug)]
struct OcrArgs {
    /// Per-page OCR timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Pages classified concurrently
    #[arg(long)]
    classifier_workers: Option<usize>,

    /// Directory holding the OCR models
    #[arg(long)]
    models: Option<PathBuf>,

    /// Treat an empty OCR result as a failure
    #[arg(long)]
    require_ocr_text: bool,
}

impl InputArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(dpi) = self.dpi {
            config.render_dpi = dpi;
        }
        if let Some(workers) = self.workers {
            config.estimator_workers = workers;
        }
    }
}

impl OcrArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(timeout) = self.timeout {
            config.ocr_timeout_secs = timeout;
        }
        if let Some(workers) = self.classifier_workers {
            config.classifier_workers = workers;
        }
        if let Some(models) = &self.models {
            config.ocr_model_dir = Some(models.clone());
        }
        if self.require_ocr_text {
            config.require_ocr_text = true;
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: cannot start the async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    run_then_shutdown(runtime, async move {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; finishing pages in flight");
                on_signal.cancel();
            }
        });

        match execute(cli, cancel).await {
            Ok(output) => {
                println!("{}", output.json);
                if output.cancelled {
                    ExitCode::from(EXIT_CANCELLED)
                } else {
                    ExitCode::SUCCESS
                }
            }
            Err(err) => {
                report_failure(&err);
                ExitCode::FAILURE
            }
        }
    })
}

fn build_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("upright-worker")
        .build()
}

/// Drive `future` to completion, then shut the runtime down without
/// waiting longer than [`SHUTDOWN_GRACE`] for blocking threads.
///
/// OCR calls that outlived their timeout keep running on the blocking pool;
/// dropping the runtime normally would wait for them.
fn run_then_shutdown<F: Future>(runtime: tokio::runtime::Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    output
}

/// What a successful command prints.
struct Output {
    json: String,
    cancelled: bool,
}

fn report_failure(err: &anyhow::Error) {
    match err.downcast_ref::<UprightError>() {
        Some(upright) => {
            let human = humanize_error(upright);
            tracing::error!(stage = %human.stage, detail = %human.detail, "Run failed");
            eprintln!("{human}");
        }
        None => eprintln!("error: {err:#}"),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("cannot load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

async fn execute(cli: Cli, cancel: CancellationToken) -> Result<Output> {
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Orient { input, scores } => {
            input.apply(&mut config);
            config.validate()?;
            orient(&input, &config, scores, cancel).await
        }
        Commands::Classify { input, ocr } => {
            input.apply(&mut config);
            ocr.apply(&mut config);
            config.validate()?;
            classify(&input, &config, cancel).await
        }
        Commands::Run { input, ocr, output } => {
            input.apply(&mut config);
            ocr.apply(&mut config);
            config.validate()?;
            run(&input, &config, output, cancel).await
        }
    }
}

async fn orient(
    input: &InputArgs,
    config: &PipelineConfig,
    with_scores: bool,
    cancel: CancellationToken,
) -> Result<Output> {
    let source = Source::open(&input.inputs, config)?;
    let mut report = source.begin_report();

    let outcome = {
        let pipeline = OrientationPipeline::new(config).with_scores(with_scores);
        let rasterizer = Arc::clone(&source.rasterizer);
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || pipeline.run(rasterizer.as_ref(), false, &cancel))
            .await
            .context("orientation task failed")??
    };
    report.record_orientation(&outcome.angles);
    report.cancelled = outcome.cancelled;
    report.finish();

    let json = match outcome.scores {
        Some(scores) if !outcome.cancelled => {
            let pages: Vec<_> = scores
                .into_complete()?
                .into_iter()
                .enumerate()
                .map(|(index, candidates)| {
                    json!({ "page": PageIndex(index), "candidates": candidates })
                })
                .collect();
            serde_json::to_string_pretty(&json!({ "report": report, "scores": pages }))?
        }
        _ => serde_json::to_string_pretty(&report)?,
    };
    Ok(Output {
        json,
        cancelled: outcome.cancelled,
    })
}

async fn classify(input: &InputArgs, config: &PipelineConfig, cancel: CancellationToken) -> Result<Output> {
    let source = Source::open(&input.inputs, config)?;
    let mut report = source.begin_report();

    let classifier = PageClassifier::new(
        Arc::clone(&source.text_layer),
        source::build_probe(config),
        config,
    );
    let outcome = classify_document(
        classifier,
        Arc::clone(&source.rasterizer),
        config.classifier_workers,
        cancel,
    )
    .await?;
    report.record_classification(&outcome.classes);
    report.cancelled = outcome.cancelled;
    report.finish();

    Ok(Output {
        json: serde_json::to_string_pretty(&report)?,
        cancelled: outcome.cancelled,
    })
}

async fn run(
    input: &InputArgs,
    config: &PipelineConfig,
    output: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<Output> {
    let source = Source::open(&input.inputs, config)?;
    let mut report = source.begin_report();

    let orientation = {
        let pipeline = OrientationPipeline::new(config);
        let rasterizer = Arc::clone(&source.rasterizer);
        let normalize = output.is_some();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || pipeline.run(rasterizer.as_ref(), normalize, &cancel))
            .await
            .context("orientation task failed")??
    };
    report.record_orientation(&orientation.angles);

    let classes = if orientation.cancelled {
        None
    } else {
        let classifier = PageClassifier::new(
            Arc::clone(&source.text_layer),
            source::build_probe(config),
            config,
        );
        let outcome = classify_document(
            classifier,
            Arc::clone(&source.rasterizer),
            config.classifier_workers,
            cancel.clone(),
        )
        .await?;
        report.record_classification(&outcome.classes);
        Some(outcome)
    };

    let cancelled = orientation.cancelled || classes.as_ref().is_some_and(|c| c.cancelled);
    if classes.is_none() {
        // Classification never started: every page is missing from it.
        report.record_classification(&PageSlots::new(source.page_count()));
    }

    // The upright document is only written from a complete set of pages.
    if let (Some(path), Some(upright)) = (output, orientation.upright) {
        if cancelled {
            warn!("Run cancelled; not writing {}", path.display());
        } else {
            let mut writer = PdfWriter::new("upright", config.render_dpi);
            let bytes = upright.write_to(&mut writer)?;
            std::fs::write(&path, &bytes)
                .with_context(|| format!("cannot write {}", path.display()))?;
            info!(path = %path.display(), bytes = bytes.len(), "Upright PDF written");
            report.output = Some(path.display().to_string());
        }
    }

    report.cancelled = cancelled;
    report.finish();
    Ok(Output {
        json: serde_json::to_string_pretty(&report)?,
        cancelled,
    })
}
