use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;

use yt_indexer::config::Config;
use yt_indexer::ingest::{CycleOutcome, IngestCycle, IngestionPipeline};
use yt_indexer::service;

/// Run one ingestion cycle against the configured data API and index
pub async fn fetch_once(config: Config) -> Result<()> {
    let keys = service::build_keystore(&config)?;
    let index = service::connect_index(&config.search)
        .await
        .context("Failed to connect to the search index")?;

    // Held until the cycle finishes so the pipeline never sees a shutdown
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let pipeline = IngestionPipeline::new(
        config.fetch.clone(),
        keys,
        Arc::clone(&index),
        service::bulk_config(&config.search),
        shutdown_rx,
    )?;

    println!("Fetching from {}", config.fetch.base_url);
    println!("  published after: {}", pipeline.watermark().to_rfc3339());

    let outcome = pipeline
        .run_cycle()
        .await
        .context("Ingestion cycle failed")?;

    match outcome {
        CycleOutcome::Indexed {
            fetched,
            indexed,
            failed,
        } => {
            println!("  fetched: {fetched}");
            println!("  indexed: {indexed}");
            println!("  failed:  {failed}");
            println!("  index:   {}", index.index_name());
        }
        CycleOutcome::QuotaExhausted => {
            println!("  quota exhausted for the current key; rotated to the next one");
        }
        CycleOutcome::Cancelled => println!("  cancelled"),
    }

    Ok(())
}
