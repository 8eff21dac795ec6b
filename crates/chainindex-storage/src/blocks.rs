//! Block persistence (spec §3, §4.2): idempotent single/batched upserts,
//! range readers used by `GapAnalyzer`/`FinalityReconciler`, and the
//! finalization + priority-fee rewrite mutations.

use crate::error::Result;
use bigdecimal::BigDecimal;
use chainindex_types::Block;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

const UPSERT_SQL: &str = r#"
    INSERT INTO blocks (
        number, timestamp, block_hash, parent_hash, gas_used, gas_limit,
        base_fee_gwei, min_priority_fee_gwei, max_priority_fee_gwei,
        avg_priority_fee_gwei, median_priority_fee_gwei,
        total_base_fee_gwei, total_priority_fee_gwei, tx_count,
        block_time_sec, mgas_per_sec, tps
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
    ON CONFLICT (number) DO NOTHING
"#;

/// Idempotent insert of a single block (I1: a block is inserted exactly
/// once; subsequent attempts are no-ops).
pub async fn upsert_block(pool: &PgPool, block: &Block) -> Result<()> {
    sqlx::query(UPSERT_SQL)
        .bind(block.number as i64)
        .bind(block.timestamp)
        .bind(&block.block_hash)
        .bind(&block.parent_hash)
        .bind(block.gas_used as i64)
        .bind(block.gas_limit as i64)
        .bind(&block.base_fee_gwei)
        .bind(&block.min_priority_fee_gwei)
        .bind(&block.max_priority_fee_gwei)
        .bind(&block.avg_priority_fee_gwei)
        .bind(&block.median_priority_fee_gwei)
        .bind(&block.total_base_fee_gwei)
        .bind(&block.total_priority_fee_gwei)
        .bind(block.tx_count as i32)
        .bind(block.block_time_sec)
        .bind(block.mgas_per_sec)
        .bind(block.tps)
        .execute(pool)
        .await?;
    Ok(())
}

/// Batched variant for the backfillers (spec §4.4): one round trip per
/// batch rather than one per block. Runs inside a transaction so a
/// partial batch failure doesn't leave some of the batch committed and
/// some not, which would otherwise confuse the caller's "advance the
/// floor by batch_size" bookkeeping.
pub async fn upsert_blocks_batch(pool: &PgPool, blocks: &[Block]) -> Result<()> {
    if blocks.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for block in blocks {
        sqlx::query(UPSERT_SQL)
            .bind(block.number as i64)
            .bind(block.timestamp)
            .bind(&block.block_hash)
            .bind(&block.parent_hash)
            .bind(block.gas_used as i64)
            .bind(block.gas_limit as i64)
            .bind(&block.base_fee_gwei)
            .bind(&block.min_priority_fee_gwei)
            .bind(&block.max_priority_fee_gwei)
            .bind(&block.avg_priority_fee_gwei)
            .bind(&block.median_priority_fee_gwei)
            .bind(&block.total_base_fee_gwei)
            .bind(&block.total_priority_fee_gwei)
            .bind(block.tx_count as i32)
            .bind(block.block_time_sec)
            .bind(block.mgas_per_sec)
            .bind(block.tps)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn get_block(pool: &PgPool, number: u64) -> Result<Option<Block>> {
    let row = sqlx::query(
        "SELECT number, timestamp, block_hash, parent_hash, gas_used, gas_limit,
                base_fee_gwei, min_priority_fee_gwei, max_priority_fee_gwei,
                avg_priority_fee_gwei, median_priority_fee_gwei,
                total_base_fee_gwei, total_priority_fee_gwei, tx_count,
                block_time_sec, mgas_per_sec, tps, finalized, finalized_at,
                milestone_id, time_to_finality_sec
         FROM blocks WHERE number = $1",
    )
    .bind(number as i64)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| row_to_block(&r)))
}

fn row_to_block(row: &sqlx::postgres::PgRow) -> Block {
    Block {
        number: row.get::<i64, _>("number") as u64,
        timestamp: row.get::<DateTime<Utc>, _>("timestamp"),
        block_hash: row.get("block_hash"),
        parent_hash: row.get("parent_hash"),
        gas_used: row.get::<i64, _>("gas_used") as u64,
        gas_limit: row.get::<i64, _>("gas_limit") as u64,
        base_fee_gwei: row.get("base_fee_gwei"),
        min_priority_fee_gwei: row.get("min_priority_fee_gwei"),
        max_priority_fee_gwei: row.get("max_priority_fee_gwei"),
        avg_priority_fee_gwei: row.get("avg_priority_fee_gwei"),
        median_priority_fee_gwei: row.get("median_priority_fee_gwei"),
        total_base_fee_gwei: row.get::<BigDecimal, _>("total_base_fee_gwei"),
        total_priority_fee_gwei: row.get::<BigDecimal, _>("total_priority_fee_gwei"),
        tx_count: row.get::<i32, _>("tx_count") as u32,
        block_time_sec: row.get("block_time_sec"),
        mgas_per_sec: row.get("mgas_per_sec"),
        tps: row.get("tps"),
        finalized: row.get("finalized"),
        finalized_at: row.get("finalized_at"),
        milestone_id: row.get::<Option<i64>, _>("milestone_id").map(|v| v as u64),
        time_to_finality_sec: row.get("time_to_finality_sec"),
    }
}

/// Returns the highest block number present (the tip the store has
/// observed), or `None` if the table is empty.
pub async fn max_block_number(pool: &PgPool) -> Result<Option<u64>> {
    let row = sqlx::query("SELECT MAX(number) AS max_number FROM blocks").fetch_one(pool).await?;
    Ok(row.get::<Option<i64>, _>("max_number").map(|v| v as u64))
}

/// Finds missing block numbers in `[start, end]` (spec §4.5's gap scan).
pub async fn find_missing_blocks(pool: &PgPool, start: u64, end: u64) -> Result<Vec<u64>> {
    let rows = sqlx::query(
        "SELECT generate_series($1::BIGINT, $2::BIGINT) AS number
         EXCEPT
         SELECT number FROM blocks WHERE number BETWEEN $1 AND $2
         ORDER BY number",
    )
    .bind(start as i64)
    .bind(end as i64)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(|r| r.get::<i64, _>("number") as u64).collect())
}

/// Blocks in `[start, end]` that are not yet finalized and recent enough
/// to still live in an updatable partition, for `FinalityReconciler` and
/// `GapAnalyzer`'s finality scan (spec §4.7, §4.5: "timestamp ≥ now() −
/// compression_threshold" exists purely so the query can prune compressed
/// partitions).
pub async fn find_unfinalized_blocks_since(
    pool: &PgPool,
    start: u64,
    end: u64,
    since: DateTime<Utc>,
) -> Result<Vec<u64>> {
    let rows = sqlx::query(
        "SELECT number FROM blocks
         WHERE number BETWEEN $1 AND $2 AND NOT finalized AND timestamp >= $3
         ORDER BY number",
    )
    .bind(start as i64)
    .bind(end as i64)
    .bind(since)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(|r| r.get::<i64, _>("number") as u64).collect())
}

/// Blocks with `tx_count > 0` still missing a priority-fee aggregate in
/// `[start, end]`, for `GapAnalyzer`'s priority-fee scan (spec §4.5).
pub async fn find_priority_fee_gaps_in(pool: &PgPool, start: u64, end: u64) -> Result<Vec<u64>> {
    let rows = sqlx::query(
        "SELECT number FROM blocks
         WHERE number BETWEEN $1 AND $2 AND tx_count > 0
           AND (avg_priority_fee_gwei IS NULL OR total_priority_fee_gwei IS NULL)
         ORDER BY number",
    )
    .bind(start as i64)
    .bind(end as i64)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(|r| r.get::<i64, _>("number") as u64).collect())
}

/// Marks `numbers` finalized under `milestone_id`, computing
/// `time_to_finality_sec` from each block's own timestamp (spec §4.7).
/// A no-op for blocks that don't exist yet (the finality worker only
/// reconciles blocks `BlockBackfiller`/`TipFollower` already inserted).
pub async fn finalize_blocks(
    pool: &PgPool,
    numbers: &[u64],
    milestone_id: u64,
    finalized_at: DateTime<Utc>,
) -> Result<u64> {
    if numbers.is_empty() {
        return Ok(0);
    }
    let numbers_i64: Vec<i64> = numbers.iter().map(|&n| n as i64).collect();
    let result = sqlx::query(
        "UPDATE blocks
         SET finalized = TRUE,
             finalized_at = $2,
             milestone_id = $3,
             time_to_finality_sec = GREATEST(0, EXTRACT(EPOCH FROM ($2 - timestamp))::BIGINT)
         WHERE number = ANY($1) AND NOT finalized",
    )
    .bind(&numbers_i64)
    .bind(finalized_at)
    .bind(milestone_id as i64)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Overwrites a block's priority-fee aggregates in place (spec §4.8:
/// `PriorityFeeRecomputer` rewrites `total_priority_fee_gwei` and friends
/// for blocks computed under the pre-fix formula).
pub async fn rewrite_priority_fee(
    pool: &PgPool,
    number: u64,
    min_priority_fee_gwei: Option<BigDecimal>,
    max_priority_fee_gwei: Option<BigDecimal>,
    avg_priority_fee_gwei: Option<BigDecimal>,
    median_priority_fee_gwei: Option<BigDecimal>,
    total_priority_fee_gwei: BigDecimal,
) -> Result<()> {
    sqlx::query(
        "UPDATE blocks
         SET min_priority_fee_gwei = $2,
             max_priority_fee_gwei = $3,
             avg_priority_fee_gwei = $4,
             median_priority_fee_gwei = $5,
             total_priority_fee_gwei = $6
         WHERE number = $1",
    )
    .bind(number as i64)
    .bind(min_priority_fee_gwei)
    .bind(max_priority_fee_gwei)
    .bind(avg_priority_fee_gwei)
    .bind(median_priority_fee_gwei)
    .bind(total_priority_fee_gwei)
    .execute(pool)
    .await?;
    Ok(())
}
