//! GapFiller (spec §4.6): claims pending gap rows and dispatches by kind.
//! A gap that keeps failing is abandoned rather than retried forever
//! (spec §4.6's exhaustion path); since [`chainindex_types::Gap`] has no
//! failure-count column of its own, the count is tracked in memory here,
//! keyed by gap id -- a pragmatic choice since losing the count on
//! restart just costs a few extra retries, not correctness.

use crate::{aggregate, finality_reconciler, ingest};
use chainindex_config::GapFillerConfig;
use chainindex_errors::IndexerError;
use chainindex_rpc::RpcPool;
use chainindex_storage::StoreGateway;
use chainindex_types::{Gap, GapKind};
use std::{collections::HashMap, sync::Arc, time::Duration};

const CLAIM_LIMIT: i64 = 10;

pub struct GapFiller {
    rpc: Arc<RpcPool>,
    store: Arc<StoreGateway>,
    poll_interval: Duration,
    max_consecutive_failures: u32,
    compression_threshold: chrono::Duration,
    failure_counts: HashMap<i64, u32>,
    next_delay: Duration,
}

impl GapFiller {
    pub fn new(
        rpc: Arc<RpcPool>,
        store: Arc<StoreGateway>,
        config: GapFillerConfig,
        compression_threshold: chrono::Duration,
    ) -> Self {
        Self {
            rpc,
            store,
            poll_interval: config.poll_interval,
            max_consecutive_failures: config.max_consecutive_failures,
            compression_threshold,
            failure_counts: HashMap::new(),
            next_delay: config.poll_interval,
        }
    }

    async fn claim_and_fill(&mut self, kind: GapKind) -> Result<u64, IndexerError> {
        let gaps = chainindex_storage::claim_gaps(self.store.pool(), kind, CLAIM_LIMIT).await?;
        let mut filled = 0u64;
        for gap in gaps {
            if self.fill_one(&gap).await? {
                filled += 1;
            }
        }
        Ok(filled)
    }

    /// Fills a single claimed gap, returning whether it was fully filled.
    /// A partial or outright failure re-queues the gap (or abandons it
    /// once `max_consecutive_failures` is exceeded) rather than bubbling
    /// the error up and stalling every other claimed gap behind it.
    async fn fill_one(&mut self, gap: &Gap) -> Result<bool, IndexerError> {
        let outcome = match gap.kind {
            GapKind::Block => self.fill_block(gap).await,
            GapKind::Milestone => self.fill_milestone(gap).await,
            GapKind::Finality => self.fill_finality(gap).await,
            GapKind::PriorityFee => self.fill_priority_fee(gap).await,
        };

        match outcome {
            Ok(true) => {
                self.failure_counts.remove(&gap.id);
                chainindex_storage::mark_filled(self.store.pool(), gap.id).await?;
                Ok(true)
            }
            Ok(false) => {
                // The enclosing milestone doesn't exist yet (finality
                // gap raced ahead of milestone ingest): not a failure,
                // just re-queue without counting against the gap.
                chainindex_storage::release_to_pending(self.store.pool(), gap.id).await?;
                Ok(false)
            }
            Err(err) => {
                let failures = self.failure_counts.entry(gap.id).or_insert(0);
                *failures += 1;
                if *failures >= self.max_consecutive_failures {
                    tracing::warn!(
                        target: "chainindex::workers",
                        gap_id = gap.id,
                        failures = *failures,
                        error = %err,
                        "abandoning gap after repeated failures",
                    );
                    self.failure_counts.remove(&gap.id);
                    chainindex_storage::mark_abandoned(self.store.pool(), gap.id).await?;
                } else {
                    chainindex_storage::release_to_pending(self.store.pool(), gap.id).await?;
                }
                Ok(false)
            }
        }
    }

    async fn fill_block(&self, gap: &Gap) -> Result<bool, IndexerError> {
        let numbers: Vec<u64> = (gap.range_start..=gap.range_end).collect();
        let outcome = ingest::ingest_block_range(&self.rpc, &self.store, &numbers).await?;
        Ok(outcome.missing.is_empty())
    }

    async fn fill_milestone(&self, gap: &Gap) -> Result<bool, IndexerError> {
        let sequence_ids: Vec<u64> = (gap.range_start..=gap.range_end).collect();
        let outcome =
            ingest::ingest_milestone_range(&self.rpc, &self.store, &sequence_ids, self.compression_threshold)
                .await?;
        Ok(outcome.missing.is_empty())
    }

    async fn fill_finality(&self, gap: &Gap) -> Result<bool, IndexerError> {
        let result = finality_reconciler::reconcile_range(
            &self.store,
            gap.range_start,
            gap.range_end,
            self.compression_threshold,
        )
        .await?;
        Ok(result.is_some())
    }

    async fn fill_priority_fee(&self, gap: &Gap) -> Result<bool, IndexerError> {
        let numbers: Vec<u64> = (gap.range_start..=gap.range_end).collect();
        let blocks_map = self.rpc.get_blocks_with_transactions(&numbers).await?;
        let receipts_map = self.rpc.get_block_receipts_batch(&numbers).await?;

        let mut all_present = true;
        for &number in &numbers {
            let Some(el_block) = blocks_map.get(&number) else {
                all_present = false;
                continue;
            };
            let receipts = receipts_map
                .get(&number)
                .map(|rs| rs.iter().map(|r| (r.transaction_hash.clone(), r.clone())).collect())
                .unwrap_or_default();
            let (min, max, avg, median, total) = aggregate::recompute_priority_fee(el_block, &receipts);
            chainindex_storage::rewrite_priority_fee(self.store.pool(), number, min, max, avg, median, total).await?;
        }
        Ok(all_present)
    }
}

#[async_trait::async_trait]
impl crate::traits::Worker for GapFiller {
    fn name(&self) -> &'static str {
        "gap_filler"
    }

    async fn run_once(&mut self) -> Result<crate::traits::WorkerOutcome, IndexerError> {
        let mut total = 0u64;
        for kind in [GapKind::Block, GapKind::Milestone, GapKind::Finality, GapKind::PriorityFee] {
            total += self.claim_and_fill(kind).await?;
        }
        self.next_delay = self.poll_interval;
        if total > 0 {
            Ok(crate::traits::WorkerOutcome::Progressed(total))
        } else {
            Ok(crate::traits::WorkerOutcome::Idle)
        }
    }

    fn delay_for(&self, _outcome: &Result<crate::traits::WorkerOutcome, IndexerError>) -> Duration {
        self.next_delay
    }
}
