//! BlockBackfiller (spec §4.4): walks backward from the stored minimum
//! block toward `target` in batches, the mirror image of `TipFollower`.

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

pub struct BlockBackfiller {
    rpc: Arc<RpcPool>,
    store: Arc<StoreGateway>,
    target: u64,
    batch_size: u64,
    transient_backoff: Duration,
    exhausted_retry: Duration,
    idle_sleep: Duration,
    next_delay: Duration,
}

impl BlockBackfiller {
    pub fn new(rpc: Arc<RpcPool>, store: Arc<StoreGateway>, config: BackfillConfig) -> Self {
        Self {
            rpc,
            store,
            target: config.target,
            batch_size: config.batch_size,
            transient_backoff: config.transient_backoff,
            exhausted_retry: config.exhausted_retry,
            idle_sleep: config.idle_sleep,
            next_delay: config.idle_sleep,
        }
    }

    async fn floor(&self) -> Result<Option<u64>, IndexerError> {
        let stats = chainindex_storage::get_table_stats(self.store.pool(), StatsTable::Blocks).await?;
        Ok(stats.and_then(|s| s.min_value))
    }
}

#[async_trait::async_trait]
impl Worker for BlockBackfiller {
    fn name(&self) -> &'static str {
        "block_backfiller"
    }

    async fn run_once(&mut self) -> Result<WorkerOutcome, IndexerError> {
        let Some(floor) = self.floor().await? else {
            self.next_delay = self.idle_sleep;
            return Ok(WorkerOutcome::Idle);
        };
        if floor <= self.target {
            self.next_delay = self.idle_sleep;
            return Ok(WorkerOutcome::Idle);
        }

        let batch_start = self.target.max(floor.saturating_sub(self.batch_size));
        let batch_end = floor - 1;
        let numbers: Vec<u64> = (batch_start..=batch_end).collect();

        match ingest::ingest_block_range(&self.rpc, &self.store, &numbers).await {
            Ok(outcome) => {
                if !outcome.missing.is_empty() {
                    let mut missing = outcome.missing.clone();
                    missing.sort_unstable();
                    let ranges = chainindex_types::group_consecutive(&missing);
                    chainindex_storage::insert_gaps(self.store.pool(), GapKind::Block, &ranges, "block_backfiller")
                        .await?;
                    tracing::warn!(
                        target: "chainindex::workers",
                        count = missing.len(),
                        "block backfiller recorded gap rows for permanently unfetchable blocks",
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
