//! Manifest processing through the worker pool.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use finscan::budget::AtomicBudget;
use finscan::config::EngineConfig;
use finscan::storage::FsObjectStore;
use finscan::work_queue::{MemoryQueue, WorkItem};
use finscan_extract::{CancellationFlag, ExtractionEngine, ExtractionService, ServiceEvent};

/// Drain a manifest of work items, writing outputs under `store`.
pub async fn cmd_run(
    mut config: EngineConfig,
    manifest: &Path,
    store: &Path,
    workers: Option<usize>,
    max_deliveries: u32,
) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(manifest)
        .await
        .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
    let items = WorkItem::parse_manifest(&content)?;
    if items.is_empty() {
        println!("{} Manifest is empty", style("!").yellow());
        return Ok(());
    }
    if let Some(workers) = workers {
        config.service.workers = workers;
    }

    let total = items.len();
    let queue = Arc::new(MemoryQueue::from_items(items, max_deliveries));
    let object_store = Arc::new(FsObjectStore::new(store));
    let budget = Arc::new(AtomicBudget::new(config.budget.cloud_pages));
    let engine = Arc::new(ExtractionEngine::with_default_backends(config, budget));

    let cancel = CancellationFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let service = ExtractionService::new(engine, queue.clone(), object_store)
        .with_cancellation(cancel);

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let (event_tx, mut event_rx) = mpsc::channel::<ServiceEvent>(100);
    let progress = pb.clone();
    let reporter = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                ServiceEvent::Started { workers, .. } => {
                    progress.set_message(format!("{} workers", workers));
                }
                ServiceEvent::DocumentStarted { document_id, .. } => {
                    progress.set_message(document_id);
                }
                ServiceEvent::DocumentFinished { .. } => progress.inc(1),
                ServiceEvent::DocumentFailed {
                    document_id,
                    error,
                    requeued,
                    ..
                } => {
                    if !requeued {
                        progress.inc(1);
                    }
                    progress.println(format!(
                        "{} {}: {}",
                        style("✗").red(),
                        document_id,
                        error
                    ));
                }
            }
        }
    });

    let summary = service.run(event_tx).await?;
    // The service held the last sender; the reporter ends once it drains.
    reporter.await?;
    pb.finish_and_clear();

    println!("\n{}", style("Extraction Summary").bold());
    println!("{}", "-".repeat(40));
    println!("  {:<20} {}", "Complete", style(summary.complete).green());
    println!(
        "  {:<20} {}",
        "Manual review",
        style(summary.manual_review).yellow()
    );
    println!(
        "  {:<20} {}",
        "Validation failed",
        style(summary.validation_failed).red()
    );
    println!("  {:<20} {}", "Requeued", summary.requeued);

    let dead_letters = queue.dead_letters();
    println!("  {:<20} {}", "Dead-lettered", dead_letters.len());
    for (item, error) in &dead_letters {
        println!(
            "    {} {} ({})",
            style("→").dim(),
            item.document_id,
            style(error).dim()
        );
    }
    println!("\nRecords written to {}", store.join("records").display());
    Ok(())
}
