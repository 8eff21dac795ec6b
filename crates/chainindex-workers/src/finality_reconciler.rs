//! FinalityReconciler (spec §4.7). Unlike the other six components, this
//! one has no independent poll loop of its own -- it runs inline as part
//! of milestone ingest ([`crate::ingest::ingest_milestone_range`]) and
//! again from `GapFiller`'s `kind=finality` branch, so it is exposed as a
//! pair of plain functions rather than a [`crate::traits::Worker`].

use chainindex_errors::IndexerError;
use chainindex_storage::StoreGateway;
use chainindex_types::Milestone;
use chrono::{Duration, Utc};

/// Finalizes every block covered by `milestone` that is still
/// unfinalized and young enough to be in an updatable partition. The
/// `timestamp >= now() - compression_threshold` predicate is a deliberate
/// design constraint (spec §9): older partitions are compressed and not
/// efficiently updatable, so finality there is intentionally left alone.
pub async fn reconcile_milestone(
    store: &StoreGateway,
    milestone: &Milestone,
    compression_threshold: Duration,
) -> Result<u64, IndexerError> {
    let since = Utc::now() - compression_threshold;
    let numbers = chainindex_storage::find_unfinalized_blocks_since(
        store.pool(),
        milestone.start_block,
        milestone.end_block,
        since,
    )
    .await?;
    if numbers.is_empty() {
        return Ok(0);
    }
    let count =
        chainindex_storage::finalize_blocks(store.pool(), &numbers, milestone.milestone_id, milestone.timestamp)
            .await?;
    Ok(count)
}

/// Re-runs finalization for a specific block range against whichever
/// milestone encloses it (`GapFiller`'s `kind=finality` path). Returns
/// `Ok(None)` when no enclosing milestone exists yet, so the caller can
/// re-queue the gap with a back-off instead of treating it as failed.
pub async fn reconcile_range(
    store: &StoreGateway,
    range_start: u64,
    range_end: u64,
    compression_threshold: Duration,
) -> Result<Option<u64>, IndexerError> {
    // The enclosing milestone is looked up from either edge; a gap row
    // never spans more than one milestone's range in practice, since
    // `GapAnalyzer` derives it from a single milestone-covered window.
    let Some(milestone) = chainindex_storage::find_covering_milestone(store.pool(), range_start).await? else {
        return Ok(None);
    };
    let since = Utc::now() - compression_threshold;
    let numbers = chainindex_storage::find_unfinalized_blocks_since(store.pool(), range_start, range_end, since)
        .await?;
    if numbers.is_empty() {
        return Ok(Some(0));
    }
    let count =
        chainindex_storage::finalize_blocks(store.pool(), &numbers, milestone.milestone_id, milestone.timestamp)
            .await?;
    Ok(Some(count))
}
