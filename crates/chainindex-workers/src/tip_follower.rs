//! TipFollower (spec §4.3): the forward-moving half of ingest. Every
//! `poll_interval`, checks the EL tip against the stored block max and the
//! CL milestone count against the stored milestone max, fetching and
//! upserting whatever is missing in between.

use crate::{
    ingest,
    traits::{Worker, WorkerOutcome},
};
use chainindex_config::RpcConfig;
use chainindex_errors::IndexerError;
use chainindex_rpc::RpcPool;
use chainindex_storage::StoreGateway;
use chainindex_types::StatsTable;
use std::{sync::Arc, time::Duration};

pub struct TipFollower {
    rpc: Arc<RpcPool>,
    store: Arc<StoreGateway>,
    poll_interval: Duration,
    el_exhausted_backoff: Duration,
    cl_exhausted_backoff: Duration,
    compression_threshold: chrono::Duration,
    next_delay: Duration,
}

impl TipFollower {
    pub fn new(
        rpc: Arc<RpcPool>,
        store: Arc<StoreGateway>,
        poll_interval: Duration,
        rpc_config: &RpcConfig,
        compression_threshold: chrono::Duration,
    ) -> Self {
        Self {
            rpc,
            store,
            poll_interval,
            el_exhausted_backoff: rpc_config.el_exhausted_backoff,
            cl_exhausted_backoff: rpc_config.cl_exhausted_backoff,
            compression_threshold,
            next_delay: poll_interval,
        }
    }

    async fn follow_blocks(&self) -> Result<u64, IndexerError> {
        let tip = self.rpc.tip_block_number().await?;
        let stats = chainindex_storage::get_table_stats(self.store.pool(), StatsTable::Blocks).await?;
        // An empty store seeds with just the tip, rather than walking
        // forward from block 0 -- that would duplicate `BlockBackfiller`'s
        // job and make cold start proportional to chain history instead
        // of O(1).
        let next = stats.and_then(|s| s.max_value).map(|m| m + 1).unwrap_or(tip);
        if next > tip {
            return Ok(0);
        }
        let numbers: Vec<u64> = (next..=tip).collect();
        let outcome = ingest::ingest_block_range(&self.rpc, &self.store, &numbers).await?;
        if !outcome.missing.is_empty() {
            tracing::debug!(target: "chainindex::workers", count = outcome.missing.len(), "tip follower left blocks for gap analyzer");
        }
        Ok(outcome.fetched)
    }

    async fn follow_milestones(&self) -> Result<u64, IndexerError> {
        let count = self.rpc.latest_milestone_count().await?;
        let stats = chainindex_storage::get_table_stats(self.store.pool(), StatsTable::Milestones).await?;
        // Same cold-start reasoning as `follow_blocks`: seed with the
        // newest milestone and let `MilestoneBackfiller` own history below it.
        let next = stats.and_then(|s| s.max_value).map(|m| m + 1).unwrap_or(count);
        if next > count {
            return Ok(0);
        }
        let sequence_ids: Vec<u64> = (next..=count).collect();
        let outcome =
            ingest::ingest_milestone_range(&self.rpc, &self.store, &sequence_ids, self.compression_threshold).await?;
        Ok(outcome.fetched)
    }
}

#[async_trait::async_trait]
impl Worker for TipFollower {
    fn name(&self) -> &'static str {
        "tip_follower"
    }

    async fn run_once(&mut self) -> Result<WorkerOutcome, IndexerError> {
        self.next_delay = self.poll_interval;

        let blocks_progressed = match self.follow_blocks().await {
            Ok(n) => n,
            Err(err) => {
                if err.is_exhausted() {
                    self.next_delay = self.el_exhausted_backoff;
                }
                return Err(err);
            }
        };

        let milestones_progressed = match self.follow_milestones().await {
            Ok(n) => n,
            Err(err) => {
                if err.is_exhausted() {
                    self.next_delay = self.cl_exhausted_backoff;
                }
                return Err(err);
            }
        };

        let total = blocks_progressed + milestones_progressed;
        if total > 0 {
            Ok(WorkerOutcome::Progressed(total))
        } else {
            Ok(WorkerOutcome::Idle)
        }
    }

    fn delay_for(&self, _outcome: &Result<WorkerOutcome, IndexerError>) -> Duration {
        self.next_delay
    }
}
