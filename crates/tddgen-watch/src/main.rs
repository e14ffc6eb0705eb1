//! tddgen-watch: turn documents dropped into the intake folder into `.tdd` files
//!
//! Watches `monitor_folder` for new PDFs, extracts one field per page, runs
//! `tddgen` with the values and deletes the PDF once the output is written.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tddgen_core::{default_config_path, load_config, Config};
use tddgen_watch::{run, FileWatcher, PdfOpener, Pipeline, ProcessInjector, RetryPolicy};

#[derive(Parser)]
#[command(name = "tddgen-watch")]
#[command(about = "Watch the intake folder and fill .tdd templates from new documents")]
#[command(version)]
struct Args {
    /// Config file (key=value lines)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the tddgen binary, overrides `injector` from the config
    #[arg(long)]
    injector: Option<PathBuf>,

    /// Process this document once and exit instead of watching
    #[arg(long, value_name = "FILE")]
    process: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = load_config(&config_path)?;

    // Both folders are required up front; nothing falls back to a literal path.
    let monitor_folder = config.monitor_folder()?.to_path_buf();
    config.output_folder()?;

    let injector = ProcessInjector::new(
        args.injector.unwrap_or_else(|| config.injector_path()),
        config_path,
    );
    tracing::debug!("Using injector {}", injector.binary().display());
    let mut pipeline = Pipeline::new(PdfOpener, injector, RetryPolicy::from_config(&config));

    if let Some(document) = args.process {
        let outcome = pipeline.handle(&document);
        if !outcome.is_success() {
            anyhow::bail!("{} was not processed: {:?}", document.display(), outcome);
        }
        return Ok(());
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    rt.block_on(async_main(monitor_folder, &config, pipeline))
}

/// Run the watch loop on a blocking thread until a shutdown signal arrives.
async fn async_main(
    monitor_folder: PathBuf,
    config: &Config,
    mut pipeline: Pipeline<PdfOpener, ProcessInjector>,
) -> Result<()> {
    let mut watcher = FileWatcher::with_settle(&config.extension(), config.settle_delay())?;
    watcher
        .watch(&monitor_folder)
        .with_context(|| format!("Failed to watch {}", monitor_folder.display()))?;
    tracing::info!("Monitoring folder: {}", monitor_folder.display());

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let mut worker =
        tokio::task::spawn_blocking(move || run(&mut watcher, &mut pipeline, &flag));

    tokio::select! {
        result = &mut worker => {
            return result.context("Watch loop panicked")?;
        }
        signal = shutdown_signal() => {
            signal?;
        }
    }

    shutdown.store(true, Ordering::SeqCst);
    worker.await.context("Watch loop panicked")??;

    tracing::info!("tddgen-watch stopped");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
        _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl-C, shutting down");
    Ok(())
}
