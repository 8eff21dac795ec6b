//! `TableStats`/`MilestoneAggregates`/`PriorityFeeFixStatus` maintenance
//! (spec §3: "incrementally maintained, periodically refreshed in full to
//! correct drift", I5: staleness must be tolerated by every reader).

use crate::error::Result;
use chainindex_types::{MilestoneAggregates, PriorityFeeFixStatus, StatsTable, TableStats};
use chrono::Utc;
use sqlx::{PgPool, Row};

/// Applies a single newly-inserted block to the running stats row,
/// cheaper than a full table scan (the incremental half of spec §3's
/// maintenance discipline).
pub async fn bump_block_stats(pool: &PgPool, number: u64, finalized: bool) -> Result<()> {
    sqlx::query(
        "INSERT INTO table_stats (table_name, min_value, max_value, total_count, finalized_count, min_finalized, max_finalized, updated_at)
         VALUES ('blocks', $1, $1, 1, $2, CASE WHEN $2::BIGINT = 1 THEN $1 ELSE NULL END, CASE WHEN $2::BIGINT = 1 THEN $1 ELSE NULL END, now())
         ON CONFLICT (table_name) DO UPDATE
         SET min_value = LEAST(table_stats.min_value, EXCLUDED.min_value),
             max_value = GREATEST(table_stats.max_value, EXCLUDED.max_value),
             total_count = table_stats.total_count + 1,
             finalized_count = table_stats.finalized_count + EXCLUDED.finalized_count,
             min_finalized = LEAST(table_stats.min_finalized, EXCLUDED.min_finalized),
             max_finalized = GREATEST(table_stats.max_finalized, EXCLUDED.max_finalized),
             updated_at = now()",
    )
    .bind(number as i64)
    .bind(if finalized { 1i64 } else { 0i64 })
    .execute(pool)
    .await?;
    Ok(())
}

/// Recomputes `table_stats` for `table` from scratch by scanning the
/// source table. Run periodically (not on every write) to correct any
/// drift the incremental path accumulates.
pub async fn refresh_table_stats(pool: &PgPool, table: StatsTable) -> Result<TableStats> {
    let row = match table {
        StatsTable::Blocks => {
            sqlx::query(
                "SELECT MIN(number) AS min_value, MAX(number) AS max_value, COUNT(*) AS total_count,
                        COUNT(*) FILTER (WHERE finalized) AS finalized_count,
                        MIN(number) FILTER (WHERE finalized) AS min_finalized,
                        MAX(number) FILTER (WHERE finalized) AS max_finalized
                 FROM blocks",
            )
            .fetch_one(pool)
            .await?
        }
        StatsTable::Milestones => {
            sqlx::query(
                "SELECT MIN(sequence_id) AS min_value, MAX(sequence_id) AS max_value, COUNT(*) AS total_count,
                        0::BIGINT AS finalized_count, NULL::BIGINT AS min_finalized, NULL::BIGINT AS max_finalized
                 FROM milestones",
            )
            .fetch_one(pool)
            .await?
        }
    };

    let stats = TableStats {
        table,
        min_value: row.get::<Option<i64>, _>("min_value").map(|v| v as u64),
        max_value: row.get::<Option<i64>, _>("max_value").map(|v| v as u64),
        total_count: row.get("total_count"),
        finalized_count: row.get("finalized_count"),
        min_finalized: row.get::<Option<i64>, _>("min_finalized").map(|v| v as u64),
        max_finalized: row.get::<Option<i64>, _>("max_finalized").map(|v| v as u64),
        updated_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO table_stats (table_name, min_value, max_value, total_count, finalized_count, min_finalized, max_finalized, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, now())
         ON CONFLICT (table_name) DO UPDATE
         SET min_value = EXCLUDED.min_value, max_value = EXCLUDED.max_value,
             total_count = EXCLUDED.total_count, finalized_count = EXCLUDED.finalized_count,
             min_finalized = EXCLUDED.min_finalized, max_finalized = EXCLUDED.max_finalized,
             updated_at = now()",
    )
    .bind(table.as_str())
    .bind(stats.min_value.map(|v| v as i64))
    .bind(stats.max_value.map(|v| v as i64))
    .bind(stats.total_count)
    .bind(stats.finalized_count)
    .bind(stats.min_finalized.map(|v| v as i64))
    .bind(stats.max_finalized.map(|v| v as i64))
    .execute(pool)
    .await?;

    Ok(stats)
}

pub async fn get_table_stats(pool: &PgPool, table: StatsTable) -> Result<Option<TableStats>> {
    let row = sqlx::query(
        "SELECT min_value, max_value, total_count, finalized_count, min_finalized, max_finalized, updated_at
         FROM table_stats WHERE table_name = $1",
    )
    .bind(table.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| TableStats {
        table,
        min_value: row.get::<Option<i64>, _>("min_value").map(|v| v as u64),
        max_value: row.get::<Option<i64>, _>("max_value").map(|v| v as u64),
        total_count: row.get("total_count"),
        finalized_count: row.get("finalized_count"),
        min_finalized: row.get::<Option<i64>, _>("min_finalized").map(|v| v as u64),
        max_finalized: row.get::<Option<i64>, _>("max_finalized").map(|v| v as u64),
        updated_at: row.get("updated_at"),
    }))
}

pub async fn refresh_milestone_aggregates(pool: &PgPool) -> Result<MilestoneAggregates> {
    let row = sqlx::query(
        "SELECT MIN(sequence_id) AS min_sequence_id, MAX(sequence_id) AS max_sequence_id,
                MIN(start_block) AS min_start_block, MAX(end_block) AS max_end_block, COUNT(*) AS count
         FROM milestones",
    )
    .fetch_one(pool)
    .await?;

    let aggregates = MilestoneAggregates {
        min_sequence_id: row.get::<Option<i64>, _>("min_sequence_id").map(|v| v as u64),
        max_sequence_id: row.get::<Option<i64>, _>("max_sequence_id").map(|v| v as u64),
        min_start_block: row.get::<Option<i64>, _>("min_start_block").map(|v| v as u64),
        max_end_block: row.get::<Option<i64>, _>("max_end_block").map(|v| v as u64),
        count: row.get("count"),
    };

    sqlx::query(
        "INSERT INTO milestone_aggregates (id, min_sequence_id, max_sequence_id, min_start_block, max_end_block, count)
         VALUES (1, $1, $2, $3, $4, $5)
         ON CONFLICT (id) DO UPDATE
         SET min_sequence_id = EXCLUDED.min_sequence_id, max_sequence_id = EXCLUDED.max_sequence_id,
             min_start_block = EXCLUDED.min_start_block, max_end_block = EXCLUDED.max_end_block,
             count = EXCLUDED.count",
    )
    .bind(aggregates.min_sequence_id.map(|v| v as i64))
    .bind(aggregates.max_sequence_id.map(|v| v as i64))
    .bind(aggregates.min_start_block.map(|v| v as i64))
    .bind(aggregates.max_end_block.map(|v| v as i64))
    .bind(aggregates.count)
    .execute(pool)
    .await?;

    Ok(aggregates)
}

pub async fn get_priority_fee_fix_status(pool: &PgPool) -> Result<PriorityFeeFixStatus> {
    let row = sqlx::query("SELECT fix_deployed_at_block, last_fixed_block FROM priority_fee_fix_status WHERE id = 1")
        .fetch_optional(pool)
        .await?;

    Ok(row
        .map(|row| PriorityFeeFixStatus {
            fix_deployed_at_block: row.get::<Option<i64>, _>("fix_deployed_at_block").map(|v| v as u64),
            last_fixed_block: row.get::<Option<i64>, _>("last_fixed_block").map(|v| v as u64),
        })
        .unwrap_or(PriorityFeeFixStatus { fix_deployed_at_block: None, last_fixed_block: None }))
}

pub async fn set_last_fixed_block(pool: &PgPool, block_number: u64) -> Result<()> {
    sqlx::query(
        "INSERT INTO priority_fee_fix_status (id, last_fixed_block)
         VALUES (1, $1)
         ON CONFLICT (id) DO UPDATE SET last_fixed_block = EXCLUDED.last_fixed_block",
    )
    .bind(block_number as i64)
    .execute(pool)
    .await?;
    Ok(())
}
