//! GapAnalyzer (spec §4.5): the only worker that writes gap rows on a
//! schedule rather than as a side effect of ingest. Every `interval`, it
//! walks the coverage window outward from both ends looking for missing
//! ids, and separately scans for blocks that still need finality or
//! priority-fee reconciliation.

use crate::traits::{Worker, WorkerOutcome};
use chainindex_config::GapAnalyzerConfig;
use chainindex_errors::IndexerError;
use chainindex_storage::StoreGateway;
use chainindex_types::{GapKind, Stream};
use chrono::Utc;
use std::{sync::Arc, time::Duration};

pub struct GapAnalyzer {
    store: Arc<StoreGateway>,
    interval: Duration,
    error_retry: Duration,
    batch: u64,
    buffer: u64,
    compression_threshold: chrono::Duration,
    next_delay: Duration,
}

impl GapAnalyzer {
    pub fn new(store: Arc<StoreGateway>, config: GapAnalyzerConfig, compression_threshold: chrono::Duration) -> Self {
        Self {
            store,
            interval: config.interval,
            error_retry: config.error_retry,
            batch: config.batch,
            buffer: config.buffer,
            compression_threshold,
            next_delay: config.interval,
        }
    }

    /// Scans one stream's coverage window outward in both directions,
    /// recording gap rows for whatever's missing (spec §4.5's "scan up"
    /// and "scan down" passes). Returns the number of gap rows written.
    async fn analyze_stream(&self, stream: Stream, kind: GapKind) -> Result<u64, IndexerError> {
        let stats_table = match stream {
            Stream::Blocks => chainindex_types::StatsTable::Blocks,
            Stream::Milestones => chainindex_types::StatsTable::Milestones,
        };
        let Some(stats) = chainindex_storage::get_table_stats(self.store.pool(), stats_table).await? else {
            return Ok(0);
        };
        let (Some(min_value), Some(max_value)) = (stats.min_value, stats.max_value) else {
            return Ok(0);
        };

        let Some(coverage) = chainindex_storage::get_coverage(self.store.pool(), stream).await? else {
            // First time this stream has been seen: adopt the current
            // bounds as coverage and defer actual gap scanning to the
            // next cycle, once there's a settled window to scan around.
            chainindex_storage::upsert_coverage(self.store.pool(), stream, min_value, max_value, Utc::now()).await?;
            return Ok(0);
        };

        let mut gaps_found = 0u64;
        let mut low_water_mark = coverage.low_water_mark;
        let mut high_water_mark = coverage.high_water_mark;

        // Scan up: stay `buffer` ids behind the observed max so we don't
        // flag ids `TipFollower`/the backfillers haven't finished landing.
        let scan_up_ceiling = max_value.saturating_sub(self.buffer);
        if high_water_mark < scan_up_ceiling {
            let scan_up_end = scan_up_ceiling.min(high_water_mark.saturating_add(self.batch));
            let missing = self.find_missing(stream, high_water_mark + 1, scan_up_end).await?;
            gaps_found += self.record_gaps(kind, &missing).await?;
            high_water_mark = scan_up_end;
        }

        // Scan down: walk toward `min_value`, the oldest id the table has
        // ever held.
        if low_water_mark > min_value {
            let scan_down_start = min_value.max(low_water_mark.saturating_sub(self.batch));
            let missing = self.find_missing(stream, scan_down_start, low_water_mark - 1).await?;
            gaps_found += self.record_gaps(kind, &missing).await?;
            low_water_mark = scan_down_start;
        }

        chainindex_storage::upsert_coverage(self.store.pool(), stream, low_water_mark, high_water_mark, Utc::now())
            .await?;
        Ok(gaps_found)
    }

    async fn find_missing(&self, stream: Stream, start: u64, end: u64) -> Result<Vec<u64>, IndexerError> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(match stream {
            Stream::Blocks => chainindex_storage::find_missing_blocks(self.store.pool(), start, end).await?,
            Stream::Milestones => {
                chainindex_storage::find_missing_sequence_ids(self.store.pool(), start, end).await?
            }
        })
    }

    async fn record_gaps(&self, kind: GapKind, missing: &[u64]) -> Result<u64, IndexerError> {
        if missing.is_empty() {
            return Ok(0);
        }
        let ranges = chainindex_types::group_consecutive(missing);
        let count = ranges.len() as u64;
        chainindex_storage::insert_gaps(self.store.pool(), kind, &ranges, "gap_analyzer").await?;
        Ok(count)
    }

    /// Finality gaps: unfinalized blocks inside a milestone's range that
    /// are still young enough to live in an updatable partition (spec
    /// §4.5, §9).
    async fn analyze_finality(&self) -> Result<u64, IndexerError> {
        let aggregates = chainindex_storage::refresh_milestone_aggregates(self.store.pool()).await?;
        let (Some(start), Some(end)) = (aggregates.min_start_block, aggregates.max_end_block) else {
            return Ok(0);
        };
        let since = Utc::now() - self.compression_threshold;
        let missing = chainindex_storage::find_unfinalized_blocks_since(self.store.pool(), start, end, since).await?;
        self.record_gaps(GapKind::Finality, &missing).await
    }

    /// Priority-fee gaps: blocks with transactions but no priority-fee
    /// aggregates yet (spec §4.5, §4.8).
    async fn analyze_priority_fee(&self) -> Result<u64, IndexerError> {
        let Some(stats) = chainindex_storage::get_table_stats(self.store.pool(), chainindex_types::StatsTable::Blocks)
            .await?
        else {
            return Ok(0);
        };
        let (Some(min_value), Some(max_value)) = (stats.min_value, stats.max_value) else {
            return Ok(0);
        };
        let missing = chainindex_storage::find_priority_fee_gaps_in(self.store.pool(), min_value, max_value).await?;
        self.record_gaps(GapKind::PriorityFee, &missing).await
    }
}

#[async_trait::async_trait]
impl Worker for GapAnalyzer {
    fn name(&self) -> &'static str {
        "gap_analyzer"
    }

    async fn run_once(&mut self) -> Result<WorkerOutcome, IndexerError> {
        let result: Result<u64, IndexerError> = async {
            let mut total = 0u64;
            total += self.analyze_stream(Stream::Blocks, GapKind::Block).await?;
            total += self.analyze_stream(Stream::Milestones, GapKind::Milestone).await?;
            total += self.analyze_finality().await?;
            total += self.analyze_priority_fee().await?;
            Ok(total)
        }
        .await;

        match result {
            Ok(total) => {
                self.next_delay = self.interval;
                if total > 0 {
                    Ok(WorkerOutcome::Progressed(total))
                } else {
                    Ok(WorkerOutcome::Idle)
                }
            }
            Err(err) => {
                self.next_delay = self.error_retry;
                Err(err)
            }
        }
    }

    fn delay_for(&self, _outcome: &Result<WorkerOutcome, IndexerError>) -> Duration {
        self.next_delay
    }
}
