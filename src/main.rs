// CLI entry point for the watermark-removal workflow

use clearmark::{
    core::config::Config,
    core::types::{BatchItem, ProcessingState, ProgressFn, StopToken},
    orchestration::{BatchOrchestrator, RunOptions},
    services::archive::{build_archive, entry_name},
    services::strategy::{
        LocalInpaintParams, LocalInpaintStrategy, RemoteInferenceStrategy, RemovalStrategy,
    },
};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyKind {
    /// Threshold + inpaint, fully offline.
    Local,
    /// Generative restoration API. Requires GEMINI_API_KEY.
    Remote,
}

#[derive(Parser, Debug)]
#[command(name = "clearmark", version, about = "Batch watermark removal")]
struct Cli {
    /// Image files or directories to process.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output zip path.
    #[arg(short, long, default_value = "images_clean.zip")]
    output: PathBuf,

    /// Removal strategy.
    #[arg(long, value_enum, default_value_t = StrategyKind::Local)]
    strategy: StrategyKind,

    /// Luminance threshold for overlay detection (150-250).
    #[arg(long)]
    threshold: Option<u8>,

    /// Inpaint sampling radius.
    #[arg(long)]
    radius: Option<u32>,

    /// Maximum in-flight items. 1 = sequential.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Also write each cleaned image next to the zip.
    #[arg(long)]
    emit_files: bool,
}

fn mime_for(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Expand files and directories into batch items. Directories are scanned
/// one level deep; non-image files are skipped with a warning.
fn collect_items(inputs: &[PathBuf]) -> Result<Vec<BatchItem>> {
    let mut items = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("Failed to read directory {}", input.display()))?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && mime_for(p).is_some())
                .collect();
            entries.sort();
            for path in entries {
                items.push(load_item(&path)?);
            }
        } else if mime_for(input).is_some() {
            items.push(load_item(input)?);
        } else {
            warn!(path = %input.display(), "skipping unsupported file");
        }
    }

    Ok(items)
}

fn load_item(path: &Path) -> Result<BatchItem> {
    let mime = mime_for(path).unwrap_or("image/png");
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(BatchItem::new(name, bytes, mime))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::new().context("Failed to load configuration")?;
    if let Some(threshold) = cli.threshold {
        config.local.brightness_threshold = threshold;
    }
    if let Some(radius) = cli.radius {
        config.local.inpaint_radius = radius;
    }
    if let Some(concurrency) = cli.concurrency {
        config.batch.concurrency = concurrency;
    }
    config.validate()?;

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "clearmark={}",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut items = collect_items(&cli.inputs)?;
    if items.is_empty() {
        bail!("No images found in the given inputs");
    }
    info!(count = items.len(), strategy = ?cli.strategy, "batch loaded");

    let stop = StopToken::new();
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing in-flight items");
                stop.stop();
            }
        });
    }

    // Credential problems surface here, before any item is attempted.
    let strategy: Arc<dyn RemovalStrategy> = match cli.strategy {
        StrategyKind::Local => Arc::new(LocalInpaintStrategy::new(LocalInpaintParams::from(
            &config.local,
        ))),
        StrategyKind::Remote => Arc::new(RemoteInferenceStrategy::new(&config, stop.clone())?),
    };

    let progress: ProgressFn = Arc::new(|completed, total| {
        info!("progress: {}/{}", completed, total);
    });

    let orchestrator = BatchOrchestrator::new(stop).with_progress(progress);
    let options = RunOptions {
        skip_already_succeeded: false,
        concurrency: config.concurrency(),
    };

    let report = orchestrator.run(&mut items, strategy, options).await;

    for result in &report.results {
        if result.success {
            info!(item = %result.name, "ok");
        } else if let Some(error) = &result.error {
            warn!(item = %result.name, error = %error, "failed");
        }
    }

    let archive = build_archive(&items)?;
    std::fs::write(&cli.output, &archive)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;
    info!(
        path = %cli.output.display(),
        entries = report.successful,
        "archive written"
    );

    if cli.emit_files {
        let dir = cli.output.parent().unwrap_or_else(|| Path::new("."));
        for item in &items {
            if let ProcessingState::Success { processed_bytes } = &item.state {
                let path = dir.join(entry_name(&item.name));
                std::fs::write(&path, processed_bytes.as_slice())
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
        }
    }

    if report.failed > 0 {
        warn!(
            failed = report.failed,
            successful = report.successful,
            "batch finished with failures"
        );
        std::process::exit(1);
    }

    Ok(())
}
