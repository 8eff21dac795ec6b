//! Shared block/milestone fetch-and-persist helpers (spec §4.2, §4.3,
//! §4.4): `TipFollower` and `BlockBackfiller` both walk a range of block
//! numbers and upsert the result the same way; `TipFollower` and
//! `MilestoneBackfiller` do the same for sequence ids. Keeping the logic
//! here means the only difference between the tip-following and
//! backfilling workers is which range they compute, not how they fetch it.

use crate::{aggregate, finality_reconciler};
use chainindex_errors::IndexerError;
use chainindex_rpc::{ElReceipt, RpcError, RpcPool};
use chainindex_storage::StoreGateway;
use chainindex_types::Block;
use std::collections::BTreeMap;

/// Result of an ingest pass: how many ids were fetched and persisted, and
/// which requested ids the upstream never returned. `BlockBackfiller`
/// turns `missing` into gap rows (spec §4.4: "record a gap row for it");
/// `TipFollower` just lets `GapAnalyzer` catch them passively (spec §4.3).
pub struct IngestOutcome {
    pub fetched: u64,
    pub missing: Vec<u64>,
}

/// Fetches, aggregates, and upserts every block in `numbers` (assumed
/// sorted ascending).
pub async fn ingest_block_range(
    rpc: &RpcPool,
    store: &StoreGateway,
    numbers: &[u64],
) -> Result<IngestOutcome, IndexerError> {
    if numbers.is_empty() {
        return Ok(IngestOutcome { fetched: 0, missing: Vec::new() });
    }

    let blocks_map = rpc.get_blocks_with_transactions(numbers).await?;
    let receipts_map = rpc.get_block_receipts_batch(numbers).await?;

    let mut previous = previous_block(store, numbers[0]).await?;
    let mut built = Vec::with_capacity(numbers.len());
    let mut missing = Vec::new();
    for &number in numbers {
        let Some(el_block) = blocks_map.get(&number) else {
            missing.push(number);
            continue;
        };
        let receipts: BTreeMap<String, ElReceipt> = receipts_map
            .get(&number)
            .map(|rs| rs.iter().map(|r| (r.transaction_hash.clone(), r.clone())).collect())
            .unwrap_or_default();

        // Not re-org handling (explicitly out of scope) -- just making a
        // parent-hash mismatch observable instead of silently ingesting a
        // block that doesn't chain to what's already stored.
        if let Some(prev) = previous.as_ref() {
            if prev.block_hash != el_block.parent_hash {
                tracing::warn!(
                    target: "chainindex::workers",
                    number,
                    expected_parent = %prev.block_hash,
                    actual_parent = %el_block.parent_hash,
                    "block parent hash does not match previously stored block",
                );
            }
        }

        let block = aggregate::build_block(el_block, &receipts, previous.as_ref());
        previous = Some(block.clone());
        built.push(block);
    }

    chainindex_storage::upsert_blocks_batch(store.pool(), &built).await?;
    for block in &built {
        chainindex_storage::bump_block_stats(store.pool(), block.number, block.finalized).await?;
    }
    Ok(IngestOutcome { fetched: built.len() as u64, missing })
}

async fn previous_block(store: &StoreGateway, first: u64) -> Result<Option<Block>, IndexerError> {
    if first == 0 {
        return Ok(None);
    }
    Ok(chainindex_storage::get_block(store.pool(), first - 1).await?)
}

/// Fetches, upserts, and reconciles finality for every milestone in
/// `sequence_ids` (assumed sorted ascending). Mirrors
/// [`ingest_block_range`]'s "fetch missing, skip, move on" discipline.
pub async fn ingest_milestone_range(
    rpc: &RpcPool,
    store: &StoreGateway,
    sequence_ids: &[u64],
    compression_threshold: chrono::Duration,
) -> Result<IngestOutcome, IndexerError> {
    if sequence_ids.is_empty() {
        return Ok(IngestOutcome { fetched: 0, missing: Vec::new() });
    }

    let mut fetched = 0u64;
    let mut missing = Vec::new();
    for &sequence_id in sequence_ids {
        let milestone = match rpc.get_milestone(sequence_id).await {
            Ok(m) => m,
            Err(err @ RpcError::PermanentData(_)) => {
                tracing::warn!(target: "chainindex::workers", sequence_id, error = %err, "skipping malformed milestone");
                missing.push(sequence_id);
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        chainindex_storage::upsert_milestone(store.pool(), &milestone).await?;
        finality_reconciler::reconcile_milestone(store, &milestone, compression_threshold).await?;
        fetched += 1;
    }

    if fetched > 0 {
        chainindex_storage::refresh_table_stats(store.pool(), chainindex_types::StatsTable::Milestones).await?;
    }
    Ok(IngestOutcome { fetched, missing })
}
