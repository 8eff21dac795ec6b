//! Gap row persistence and the `FOR UPDATE SKIP LOCKED` claim query that
//! lets several `GapFiller` iterations run concurrently without
//! double-claiming a range (spec §3, §4.6).

use crate::error::Result;
use chainindex_types::{Gap, GapKind, GapState, IdRange};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::str::FromStr;

/// Inserts one gap row per range, in `pending` state. Used by
/// `GapAnalyzer` after grouping missing ids into maximal runs
/// ([`chainindex_types::group_consecutive`]).
pub async fn insert_gaps(pool: &PgPool, kind: GapKind, ranges: &[IdRange], source: &str) -> Result<()> {
    if ranges.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for range in ranges {
        sqlx::query(
            "INSERT INTO gaps (kind, range_start, range_end, state, source)
             VALUES ($1, $2, $3, 'pending', $4)",
        )
        .bind(kind.as_str())
        .bind(range.start as i64)
        .bind(range.end as i64)
        .bind(source)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Atomically claims up to `limit` pending gaps of `kind`, transitioning
/// them to `filling` and stamping `claimed_at`. `SKIP LOCKED` lets
/// multiple `GapFiller` workers (or overlapping iterations under
/// `tokio::select!` cancellation) run this concurrently without
/// blocking on each other's open transaction.
pub async fn claim_gaps(pool: &PgPool, kind: GapKind, limit: i64) -> Result<Vec<Gap>> {
    let mut tx = pool.begin().await?;
    let rows = sqlx::query(
        "SELECT id FROM gaps
         WHERE kind = $1 AND state = 'pending'
         ORDER BY range_start
         LIMIT $2
         FOR UPDATE SKIP LOCKED",
    )
    .bind(kind.as_str())
    .bind(limit)
    .fetch_all(&mut *tx)
    .await?;

    let ids: Vec<i64> = rows.iter().map(|r| r.get::<i64, _>("id")).collect();
    if ids.is_empty() {
        tx.commit().await?;
        return Ok(Vec::new());
    }

    let claimed = sqlx::query(
        "UPDATE gaps SET state = 'filling', claimed_at = now()
         WHERE id = ANY($1)
         RETURNING id, kind, range_start, range_end, state, source, created_at, claimed_at, filled_at",
    )
    .bind(&ids)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(claimed.iter().map(row_to_gap).collect())
}

pub async fn mark_filled(pool: &PgPool, id: i64) -> Result<()> {
    sqlx::query("UPDATE gaps SET state = 'filled', filled_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Returns a claimed gap to `pending` so another iteration can retry it
/// (a transient failure during fill, spec §4.6).
pub async fn release_to_pending(pool: &PgPool, id: i64) -> Result<()> {
    sqlx::query("UPDATE gaps SET state = 'pending', claimed_at = NULL WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Gives up on a gap after `max_consecutive_failures` (spec §4.6's
/// exhaustion path): it stays visible for operator inspection but is no
/// longer retried automatically.
pub async fn mark_abandoned(pool: &PgPool, id: i64) -> Result<()> {
    sqlx::query("UPDATE gaps SET state = 'abandoned' WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

fn row_to_gap(row: &sqlx::postgres::PgRow) -> Gap {
    Gap {
        id: row.get("id"),
        kind: GapKind::from_str(row.get("kind")).expect("kind column only ever holds a valid GapKind"),
        range_start: row.get::<i64, _>("range_start") as u64,
        range_end: row.get::<i64, _>("range_end") as u64,
        state: GapState::from_str(row.get("state")).expect("state column only ever holds a valid GapState"),
        source: row.get("source"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        claimed_at: row.get("claimed_at"),
        filled_at: row.get("filled_at"),
    }
}
