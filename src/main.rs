//! ueflow: classify a stream of signaling messages into procedures.
//!
//! Reads one JSON message per line (file or stdin), classifies through the
//! UE-partitioned pool, and writes one JSON result per line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ueflow::background::ProcedureReaper;
use ueflow::pipeline::{ClassifiedMessage, ClassifierPool, JsonLinesSource, ProcessingLoop};
use ueflow::telemetry::{init_tracing, TelemetryFormat};
use ueflow::{storage, ClassificationEngine, EngineConfig};

#[derive(Parser, Debug)]
#[command(name = "ueflow")]
#[command(about = "Signaling procedure classification engine")]
#[command(version)]
struct CliArgs {
    /// Configuration file (default: $UEFLOW_CONFIG, then ./ueflow.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// JSON-lines message file; "-" or omitted reads stdin
    #[arg(short, long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Write results here instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, env = "UEFLOW_JSON_LOGS")]
    json_logs: bool,

    /// Validate the configuration, print it, and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(if args.json_logs {
        TelemetryFormat::Json
    } else {
        TelemetryFormat::Text
    })?;

    let config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::load(),
    };
    if args.check_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let store = storage::open_store(&config.store).context("Failed to open procedure store")?;
    let engine = Arc::new(ClassificationEngine::from_config(&config, store));
    info!(
        clock = ?engine.clock(),
        flows = engine.registry().len(),
        "Classification engine ready"
    );
    let pool = ClassifierPool::spawn(
        engine.clone(),
        config.pipeline.workers,
        config.pipeline.queue_capacity,
    );

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    let reaper_token = cancel_token.child_token();
    let reaper = tokio::spawn(
        ProcedureReaper::new(
            pool.handle(),
            Duration::from_secs(config.pipeline.reaper_interval_secs),
            reaper_token.clone(),
        )
        .run(),
    );

    let (tx, rx) = mpsc::channel::<ClassifiedMessage>(config.pipeline.queue_capacity.max(1));
    let writer = match &args.output {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            tokio::spawn(write_results(rx, BufWriter::new(file)))
        }
        None => tokio::spawn(write_results(rx, BufWriter::new(tokio::io::stdout()))),
    };

    let processing = ProcessingLoop::new(pool.handle(), cancel_token.clone()).with_output(tx);
    let stats = match args.input.as_deref() {
        Some(path) if path.as_os_str() != "-" => {
            let mut source = JsonLinesSource::open(path).await?;
            processing.run(&mut source).await
        }
        _ => processing.run(&mut JsonLinesSource::stdin()).await,
    };

    reaper_token.cancel();
    if let Ok(reaper_stats) = reaper.await {
        info!(closed = reaper_stats.closed, ticks = reaper_stats.ticks, "Reaper finished");
    }

    // Close whatever is already due at the final clock reading.
    match pool.handle().sweep_all(engine.sweep_now_ms()).await {
        Ok(closed) => info!(closed = closed.len(), "Final sweep complete"),
        Err(e) => warn!(error = %e, "Final sweep failed"),
    }
    pool.shutdown().await;

    writer.await.context("Result writer panicked")??;
    info!(%stats, "Done");
    Ok(())
}

async fn write_results<W: AsyncWrite + Unpin>(
    mut rx: mpsc::Receiver<ClassifiedMessage>,
    mut out: BufWriter<W>,
) -> Result<()> {
    while let Some(msg) = rx.recv().await {
        let mut line = serde_json::to_vec(&msg)?;
        line.push(b'\n');
        out.write_all(&line).await.context("Failed to write result")?;
    }
    out.flush().await.context("Failed to flush results")?;
    Ok(())
}
