//! MilestoneBackfiller (spec §4.4, §9): the milestone-table counterpart to
//! `BlockBackfiller`. The one real difference is the floor computation --
//! see [`MilestoneBackfiller::floor`].

use crate::{
    ingest,
    traits::{Worker, WorkerOutcome},
};
use chainindex_config::BackfillConfig;
use chainindex_errors::IndexerError;
use chainindex_rpc::RpcPool;
use chainindex_storage::StoreGateway;
use chainindex_types::{GapKind, StatsTable};
use std::{sync::Arc, time::Duration};

pub struct MilestoneBackfiller {
    rpc: Arc<RpcPool>,
    store: Arc<StoreGateway>,
    target: u64,
    batch_size: u64,
    transient_backoff: Duration,
    exhausted_retry: Duration,
    idle_sleep: Duration,
    compression_threshold: chrono::Duration,
    next_delay: Duration,
}

impl MilestoneBackfiller {
    pub fn new(
        rpc: Arc<RpcPool>,
        store: Arc<StoreGateway>,
        config: BackfillConfig,
        compression_threshold: chrono::Duration,
    ) -> Self {
        Self {
            rpc,
            store,
            target: config.target,
            batch_size: config.batch_size,
            transient_backoff: config.transient_backoff,
            exhausted_retry: config.exhausted_retry,
            idle_sleep: config.idle_sleep,
            compression_threshold,
            next_delay: config.idle_sleep,
        }
    }

    /// The milestone table has no fixed genesis sequence id the way blocks
    /// have block 0, so an empty table's floor is "whatever the CL
    /// currently reports" rather than a constant. Once the table is
    /// non-empty, `min_value` is clamped against a freshly queried CL
    /// count as a defensive floor in case `min_value` is stale relative to
    /// a CL that has pruned old milestones out from under us.
    async fn floor(&self) -> Result<u64, IndexerError> {
        let stats = chainindex_storage::get_table_stats(self.store.pool(), StatsTable::Milestones).await?;
        match stats.and_then(|s| s.min_value) {
            Some(min_value) => {
                let count = self.rpc.latest_milestone_count().await?;
                Ok(min_value.min(count))
            }
            None => self.rpc.latest_milestone_count().await,
        }
    }
}

#[async_trait::async_trait]
impl Worker for MilestoneBackfiller {
    fn name(&self) -> &'static str {
        "milestone_backfiller"
    }

    async fn run_once(&mut self) -> Result<WorkerOutcome, IndexerError> {
        let floor = match self.floor().await {
            Ok(floor) => floor,
            Err(err) => {
                self.next_delay = if err.is_exhausted() { self.exhausted_retry } else { self.transient_backoff };
                return Err(err);
            }
        };
        if floor <= self.target {
            self.next_delay = self.idle_sleep;
            return Ok(WorkerOutcome::Idle);
        }

        let batch_start = self.target.max(floor.saturating_sub(self.batch_size));
        let batch_end = floor - 1;
        let sequence_ids: Vec<u64> = (batch_start..=batch_end).collect();

        match ingest::ingest_milestone_range(&self.rpc, &self.store, &sequence_ids, self.compression_threshold).await
        {
            Ok(outcome) => {
                if !outcome.missing.is_empty() {
                    let mut missing = outcome.missing.clone();
                    missing.sort_unstable();
                    let ranges = chainindex_types::group_consecutive(&missing);
                    chainindex_storage::insert_gaps(
                        self.store.pool(),
                        GapKind::Milestone,
                        &ranges,
                        "milestone_backfiller",
                    )
                    .await?;
                    tracing::warn!(
                        target: "chainindex::workers",
                        count = missing.len(),
                        "milestone backfiller recorded gap rows for permanently unfetchable milestones",
                    );
                }
                self.next_delay = Duration::ZERO;
                Ok(WorkerOutcome::Progressed(outcome.fetched))
            }
            Err(err) => {
                if err.is_exhausted() {
                    self.next_delay = self.exhausted_retry;
                } else {
                    self.next_delay = self.transient_backoff;
                }
                Err(err)
            }
        }
    }

    fn delay_for(&self, _outcome: &Result<WorkerOutcome, IndexerError>) -> Duration {
        self.next_delay
    }
}
