//! Leader-gated polling loop
//!
//! Every replica runs the ticker, but only the leader runs ingestion
//! cycles. A non-leader uses each tick to ask the elector to campaign, so a
//! replica keeps trying to take over at tick cadence without a retry loop
//! of its own.
//!
//! The loop ends in one of two ways:
//! - the shutdown signal fires (clean exit, nothing reported)
//! - a cycle fails (the error is reported once on the error channel)
//!
//! Either way the scheduler resigns before returning so a replacement
//! replica can take over.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::election::Elector;
use crate::error::Error;
use crate::ingest::{CycleOutcome, IngestCycle, IngestResult};
use crate::metrics;
use crate::utils::wait_for_shutdown;

/// Periodic timer that only runs ingestion while this replica leads
pub struct LeaderGatedScheduler {
    elector: Arc<dyn Elector>,
    cycle: Arc<dyn IngestCycle>,
    interval: Duration,
    errors: mpsc::Sender<Error>,
}

impl LeaderGatedScheduler {
    pub fn new(
        elector: Arc<dyn Elector>,
        cycle: Arc<dyn IngestCycle>,
        interval: Duration,
        errors: mpsc::Sender<Error>,
    ) -> Self {
        Self {
            elector,
            cycle,
            interval,
            errors,
        }
    }

    /// Run until shutdown or the first failed cycle
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(interval_secs = self.interval.as_secs_f64(), "Scheduler started");
        self.elector.campaign();

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => {
                    tracing::info!("Scheduler received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    if !self.elector.is_leader() {
                        self.elector.campaign();
                        continue;
                    }

                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, kind = e.kind(), "Ingestion cycle failed");
                        if self.errors.try_send(Error::from(e)).is_err() {
                            tracing::warn!("Error channel full or closed, dropping scheduler error");
                        }
                        break;
                    }
                }
            }
        }

        self.elector.resign().await;
        tracing::info!("Scheduler stopped");
    }

    async fn run_once(&self) -> IngestResult<CycleOutcome> {
        let started = Instant::now();
        let result = self.cycle.run_cycle().await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(outcome) => {
                metrics::record_cycle(outcome.label(), elapsed);
                tracing::debug!(outcome = outcome.label(), elapsed_secs = elapsed, "Cycle completed");
            }
            Err(_) => metrics::record_cycle("error", elapsed),
        }

        result
    }
}
