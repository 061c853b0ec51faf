use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use badcapt_common::config::{Config, ExportTarget, ScreenFormat};
use badcapt_core::export::{JsonLinesSink, Sink};
use badcapt_core::markers::MarkerRegistry;
use badcapt_core::source::InterfaceSource;
use badcapt_core::{Pipeline, PipelineStats};
use tracing::{info, warn};

use crate::terminal::print::PrettySink;

/// Opens the sink named by the export target.
pub fn build_sink(target: &ExportTarget) -> anyhow::Result<Box<dyn Sink + Send>> {
    let sink: Box<dyn Sink + Send> = match target {
        ExportTarget::Screen {
            format: ScreenFormat::Json,
        } => Box::new(JsonLinesSink::stdout()),
        ExportTarget::Screen {
            format: ScreenFormat::Pretty,
        } => Box::new(PrettySink::stdout()),
        ExportTarget::File { path } => Box::new(JsonLinesSink::append_to(path)?),
    };
    Ok(sink)
}

pub async fn listen(cfg: Config) -> anyhow::Result<()> {
    if !is_root::is_root() {
        warn!("Not running as root, opening the capture will likely fail");
    }

    let sink: Box<dyn Sink + Send> = build_sink(&cfg.export)?;
    let mut pipeline = Pipeline::from_config(&cfg, MarkerRegistry::default(), sink)?;
    info!("Loaded markers: {:?}", pipeline.registry());

    let stop: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
    let mut source = InterfaceSource::open(&cfg.interface, cfg.inbound_only, Arc::clone(&stop))?;

    let signal_stop: Arc<AtomicBool> = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, finishing current packet");
            signal_stop.store(true, Ordering::Relaxed);
        }
    });

    let stats: PipelineStats = tokio::task::spawn_blocking(move || pipeline.run(&mut source))
        .await
        .context("capture worker stopped unexpectedly")??;

    info!(
        "{} received, {} tagged, {} exported, {} failed exports, {} rejected",
        stats.received, stats.tagged, stats.exported, stats.export_failures, stats.rejected
    );
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
