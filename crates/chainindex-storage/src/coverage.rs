//! Coverage row persistence (spec §3, I3/I4): the validated
//! `[low_water_mark, high_water_mark]` window `GapAnalyzer` maintains per
//! stream.

use crate::error::Result;
use chainindex_types::{Coverage, Stream};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::str::FromStr;

pub async fn get_coverage(pool: &PgPool, stream: Stream) -> Result<Option<Coverage>> {
    let row = sqlx::query(
        "SELECT stream, low_water_mark, high_water_mark, last_analyzed_at FROM coverage WHERE stream = $1",
    )
    .bind(stream.as_str())
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(row_to_coverage))
}

pub async fn upsert_coverage(
    pool: &PgPool,
    stream: Stream,
    low_water_mark: u64,
    high_water_mark: u64,
    analyzed_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO coverage (stream, low_water_mark, high_water_mark, last_analyzed_at)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (stream) DO UPDATE
         SET low_water_mark = EXCLUDED.low_water_mark,
             high_water_mark = EXCLUDED.high_water_mark,
             last_analyzed_at = EXCLUDED.last_analyzed_at",
    )
    .bind(stream.as_str())
    .bind(low_water_mark as i64)
    .bind(high_water_mark as i64)
    .bind(analyzed_at)
    .execute(pool)
    .await?;
    Ok(())
}

fn row_to_coverage(row: &sqlx::postgres::PgRow) -> Coverage {
    Coverage {
        stream: Stream::from_str(row.get("stream")).expect("stream column only ever holds a valid Stream"),
        low_water_mark: row.get::<i64, _>("low_water_mark") as u64,
        high_water_mark: row.get::<i64, _>("high_water_mark") as u64,
        last_analyzed_at: row.get::<DateTime<Utc>, _>("last_analyzed_at"),
    }
}
