//! Milestone persistence (spec §3, §4.2, §4.4's `MilestoneBackfiller`).

use crate::error::Result;
use chainindex_types::Milestone;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

const UPSERT_SQL: &str = r#"
    INSERT INTO milestones (milestone_id, sequence_id, start_block, end_block, hash, proposer, timestamp)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (milestone_id) DO NOTHING
"#;

pub async fn upsert_milestone(pool: &PgPool, milestone: &Milestone) -> Result<()> {
    sqlx::query(UPSERT_SQL)
        .bind(milestone.milestone_id as i64)
        .bind(milestone.sequence_id as i64)
        .bind(milestone.start_block as i64)
        .bind(milestone.end_block as i64)
        .bind(&milestone.hash)
        .bind(&milestone.proposer)
        .bind(milestone.timestamp)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn upsert_milestones_batch(pool: &PgPool, milestones: &[Milestone]) -> Result<()> {
    if milestones.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for milestone in milestones {
        sqlx::query(UPSERT_SQL)
            .bind(milestone.milestone_id as i64)
            .bind(milestone.sequence_id as i64)
            .bind(milestone.start_block as i64)
            .bind(milestone.end_block as i64)
            .bind(&milestone.hash)
            .bind(&milestone.proposer)
            .bind(milestone.timestamp)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// The milestone covering `block_number`, if any (spec §4.7's lookup of
/// "the milestone whose range contains this block").
pub async fn find_covering_milestone(pool: &PgPool, block_number: u64) -> Result<Option<Milestone>> {
    let row = sqlx::query(
        "SELECT milestone_id, sequence_id, start_block, end_block, hash, proposer, timestamp
         FROM milestones
         WHERE start_block <= $1 AND end_block >= $1
         ORDER BY sequence_id DESC
         LIMIT 1",
    )
    .bind(block_number as i64)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(row_to_milestone))
}

pub async fn find_missing_sequence_ids(pool: &PgPool, start: u64, end: u64) -> Result<Vec<u64>> {
    let rows = sqlx::query(
        "SELECT generate_series($1::BIGINT, $2::BIGINT) AS sequence_id
         EXCEPT
         SELECT sequence_id FROM milestones WHERE sequence_id BETWEEN $1 AND $2
         ORDER BY sequence_id",
    )
    .bind(start as i64)
    .bind(end as i64)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(|r| r.get::<i64, _>("sequence_id") as u64).collect())
}

pub async fn max_sequence_id(pool: &PgPool) -> Result<Option<u64>> {
    let row = sqlx::query("SELECT MAX(sequence_id) AS max_seq FROM milestones").fetch_one(pool).await?;
    Ok(row.get::<Option<i64>, _>("max_seq").map(|v| v as u64))
}

fn row_to_milestone(row: &sqlx::postgres::PgRow) -> Milestone {
    Milestone {
        milestone_id: row.get::<i64, _>("milestone_id") as u64,
        sequence_id: row.get::<i64, _>("sequence_id") as u64,
        start_block: row.get::<i64, _>("start_block") as u64,
        end_block: row.get::<i64, _>("end_block") as u64,
        hash: row.get("hash"),
        proposer: row.get("proposer"),
        timestamp: row.get::<DateTime<Utc>, _>("timestamp"),
    }
}
