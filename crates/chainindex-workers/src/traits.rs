//! The shared `Worker` trait and driving loop (spec §5: "each worker has
//! its own loop with its own back-off timers ... no hidden control flow").
//!
//! Grounded in the teacher's `Pruner` (`crates/prune/src/pruner.rs`):
//! `Pruner::check_tip` separates "decide whether there's work" from the
//! outer loop that drives it. Here that split is generalized to a trait
//! with seven implementations instead of one, and the outer loop
//! ([`run_loop`]) is shared rather than duplicated per worker.

use chainindex_errors::IndexerError;
use chainindex_status::StatusRegistry;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

const METRIC_ITERATIONS_TOTAL: &str = "chainindex_worker_iterations_total";
const METRIC_ITEMS_PROCESSED_TOTAL: &str = "chainindex_worker_items_processed_total";
const METRIC_ERRORS_TOTAL: &str = "chainindex_worker_errors_total";

/// What a single iteration accomplished, used both to update the status
/// registry and to pick the next sleep duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Did useful work; carries the number of items processed (blocks,
    /// milestones, gaps, ...) for [`chainindex_status::StatusRegistry::add_items_processed`].
    Progressed(u64),
    /// Found nothing to do this iteration (e.g. backfiller reached its
    /// target, or no pending gaps).
    Idle,
}

/// One of the seven cooperating workers (spec §4.3-§4.8). Implementors
/// hold their own handles to the RPC pool / store gateway / config they
/// need; `run_once` performs exactly one iteration's worth of work and
/// returns without sleeping -- sleeping is [`run_loop`]'s job, so that
/// every worker gets a uniform, testable "one step" unit.
#[async_trait::async_trait]
pub trait Worker: Send {
    fn name(&self) -> &'static str;

    async fn run_once(&mut self) -> Result<WorkerOutcome, IndexerError>;

    /// The delay before the next iteration, given the outcome of this
    /// one. Centralizing this in the trait (rather than in `run_loop`)
    /// lets each worker express its own back-off schedule (spec §4.4's
    /// per-kind-of-error delays) while sharing the same driving loop.
    fn delay_for(&self, outcome: &Result<WorkerOutcome, IndexerError>) -> Duration;
}

/// Drives a [`Worker`] until `cancel` fires. Registers the worker in
/// `status` on entry and marks it `stopped` on the way out; every other
/// status transition happens around `run_once`'s result. The
/// `tokio::select!` against `cancel.cancelled()` during the sleep is the
/// "at least one suspension point per iteration" cancellation contract
/// from spec §5.
pub async fn run_loop(mut worker: Box<dyn Worker>, status: Arc<StatusRegistry>, cancel: CancellationToken) {
    status.register(worker.name());
    tracing::info!(target: "chainindex::workers", worker = worker.name(), "starting");

    while !cancel.is_cancelled() {
        status.mark_running(worker.name());
        let outcome = worker.run_once().await;

        metrics::counter!(METRIC_ITERATIONS_TOTAL, "worker" => worker.name()).increment(1);
        match &outcome {
            Ok(WorkerOutcome::Progressed(items)) => {
                status.add_items_processed(worker.name(), *items);
                status.mark_running(worker.name());
                metrics::counter!(METRIC_ITEMS_PROCESSED_TOTAL, "worker" => worker.name()).increment(*items);
                tracing::debug!(target: "chainindex::workers", worker = worker.name(), items, "progressed");
            }
            Ok(WorkerOutcome::Idle) => {
                status.mark_idle(worker.name());
                tracing::trace!(target: "chainindex::workers", worker = worker.name(), "idle");
            }
            Err(err) => {
                status.mark_error(worker.name(), err.to_string());
                metrics::counter!(METRIC_ERRORS_TOTAL, "worker" => worker.name()).increment(1);
                tracing::warn!(target: "chainindex::workers", worker = worker.name(), error = %err, "iteration failed");
            }
        }

        let delay = worker.delay_for(&outcome);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => break,
        }
    }

    status.mark_stopped(worker.name());
    tracing::info!(target: "chainindex::workers", worker = worker.name(), "stopped");
}
