use chrono::{DateTime, Utc};

/// Which cached-stats row a query concerns (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatsTable {
    Blocks,
    Milestones,
}

impl StatsTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsTable::Blocks => "blocks",
            StatsTable::Milestones => "milestones",
        }
    }
}

impl std::str::FromStr for StatsTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocks" => Ok(StatsTable::Blocks),
            "milestones" => Ok(StatsTable::Milestones),
            other => Err(format!("unknown stats table {other:?}")),
        }
    }
}

/// Incrementally-maintained min/max/count cache for a stream table
/// (spec §3). A hint (I5): any behavioral decision built on it must
/// tolerate staleness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    pub table: StatsTable,
    pub min_value: Option<u64>,
    pub max_value: Option<u64>,
    pub total_count: i64,
    pub finalized_count: i64,
    pub min_finalized: Option<u64>,
    pub max_finalized: Option<u64>,
    pub updated_at: DateTime<Utc>,
}

/// Same maintenance discipline as [`TableStats`], but for the milestones
/// stream's sequence-id / block-range aggregates (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MilestoneAggregates {
    pub min_sequence_id: Option<u64>,
    pub max_sequence_id: Option<u64>,
    pub min_start_block: Option<u64>,
    pub max_end_block: Option<u64>,
    pub count: i64,
}

/// Singleton progress cursor for `PriorityFeeRecomputer` (spec §3, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityFeeFixStatus {
    pub fix_deployed_at_block: Option<u64>,
    pub last_fixed_block: Option<u64>,
}
