//! Store Gateway + Gap & Coverage Store (spec §3, §4.2): the only
//! component that touches Postgres directly. Every other crate goes
//! through [`StoreGateway`].

mod blocks;
mod coverage;
mod error;
mod gaps;
mod milestones;
mod stats;

pub use blocks::{
    find_missing_blocks, find_priority_fee_gaps_in, find_unfinalized_blocks_since, finalize_blocks,
    get_block, max_block_number, rewrite_priority_fee, upsert_block, upsert_blocks_batch,
};
pub use coverage::{get_coverage, upsert_coverage};
pub use error::{Result, StoreError};
pub use gaps::{claim_gaps, insert_gaps, mark_abandoned, mark_filled, release_to_pending};
pub use milestones::{
    find_covering_milestone, find_missing_sequence_ids, max_sequence_id, upsert_milestone,
    upsert_milestones_batch,
};
pub use stats::{
    bump_block_stats, get_priority_fee_fix_status, get_table_stats, refresh_milestone_aggregates,
    refresh_table_stats, set_last_fixed_block,
};

use sqlx::postgres::{PgPool, PgPoolOptions};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("migrations");

/// A connected, migrated Postgres pool. Wraps the free functions in this
/// crate's modules behind a single handle `bin/chainindex` wires into the
/// workers, mirroring the teacher's convention of one gateway struct per
/// external resource rather than passing a bare connection around.
#[derive(Debug, Clone)]
pub struct StoreGateway {
    pool: PgPool,
}

impl StoreGateway {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
