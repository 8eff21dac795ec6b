//! PriorityFeeRecomputer (spec §4.8): walks backward from the block where
//! a priority-fee formula fix was deployed, rewriting every block's
//! aggregates computed under the old formula. Shares its batch-walking
//! shape with `BlockBackfiller`/`MilestoneBackfiller`, but its cursor is
//! the singleton `priority_fee_fix_status` row rather than `TableStats`.

use crate::{
    aggregate,
    traits::{Worker, WorkerOutcome},
};
use chainindex_config::PriorityFeeConfig;
use chainindex_errors::IndexerError;
use chainindex_rpc::RpcPool;
use chainindex_storage::StoreGateway;
use chainindex_types::StatsTable;
use std::{sync::Arc, time::Duration};

pub struct PriorityFeeRecomputer {
    rpc: Arc<RpcPool>,
    store: Arc<StoreGateway>,
    batch_size: u64,
    exhausted_backoff: Duration,
    error_backoff: Duration,
    idle_sleep: Duration,
    next_delay: Duration,
}

impl PriorityFeeRecomputer {
    pub fn new(rpc: Arc<RpcPool>, store: Arc<StoreGateway>, config: PriorityFeeConfig) -> Self {
        Self {
            rpc,
            store,
            batch_size: config.batch_size,
            exhausted_backoff: config.exhausted_backoff,
            error_backoff: config.error_backoff,
            idle_sleep: config.idle_sleep,
            next_delay: config.idle_sleep,
        }
    }

    /// The cursor to walk down from: the persisted `last_fixed_block` if
    /// we've made progress before, else `fix_deployed_at_block` (set once
    /// at deploy time, outside this worker), else the current chain tip
    /// on a cold start with no deploy marker at all.
    async fn cursor(&self) -> Result<Option<u64>, IndexerError> {
        let status = chainindex_storage::get_priority_fee_fix_status(self.store.pool()).await?;
        if let Some(last_fixed_block) = status.last_fixed_block {
            return Ok(Some(last_fixed_block));
        }
        if let Some(deployed_at) = status.fix_deployed_at_block {
            return Ok(Some(deployed_at));
        }
        let stats = chainindex_storage::get_table_stats(self.store.pool(), StatsTable::Blocks).await?;
        Ok(stats.and_then(|s| s.max_value))
    }
}

#[async_trait::async_trait]
impl Worker for PriorityFeeRecomputer {
    fn name(&self) -> &'static str {
        "priority_fee_recomputer"
    }

    async fn run_once(&mut self) -> Result<WorkerOutcome, IndexerError> {
        let Some(cursor) = self.cursor().await? else {
            self.next_delay = self.idle_sleep;
            return Ok(WorkerOutcome::Idle);
        };

        let stats = chainindex_storage::get_table_stats(self.store.pool(), StatsTable::Blocks).await?;
        let earliest = stats.and_then(|s| s.min_value).unwrap_or(0);

        if cursor <= earliest {
            self.next_delay = self.idle_sleep;
            return Ok(WorkerOutcome::Idle);
        }

        let batch_start = earliest.max(cursor.saturating_sub(self.batch_size));
        let batch_end = cursor - 1;
        let numbers: Vec<u64> = (batch_start..=batch_end).collect();

        match self.recompute_batch(&numbers).await {
            Ok(processed) => {
                chainindex_storage::set_last_fixed_block(self.store.pool(), batch_start).await?;
                self.next_delay = Duration::ZERO;
                Ok(WorkerOutcome::Progressed(processed))
            }
            Err(err) => {
                self.next_delay = if err.is_exhausted() { self.exhausted_backoff } else { self.error_backoff };
                Err(err)
            }
        }
    }

    fn delay_for(&self, _outcome: &Result<WorkerOutcome, IndexerError>) -> Duration {
        self.next_delay
    }
}

impl PriorityFeeRecomputer {
    async fn recompute_batch(&self, numbers: &[u64]) -> Result<u64, IndexerError> {
        if numbers.is_empty() {
            return Ok(0);
        }
        let blocks_map = self.rpc.get_blocks_with_transactions(numbers).await?;
        let receipts_map = self.rpc.get_block_receipts_batch(numbers).await?;

        let mut processed = 0u64;
        for &number in numbers {
            let Some(el_block) = blocks_map.get(&number) else { continue };
            let receipts = receipts_map
                .get(&number)
                .map(|rs| rs.iter().map(|r| (r.transaction_hash.clone(), r.clone())).collect())
                .unwrap_or_default();
            let (min, max, avg, median, total) = aggregate::recompute_priority_fee(el_block, &receipts);
            chainindex_storage::rewrite_priority_fee(self.store.pool(), number, min, max, avg, median, total).await?;
            processed += 1;
        }
        Ok(processed)
    }
}
