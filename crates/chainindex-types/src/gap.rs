use chrono::{DateTime, Utc};

/// What a gap row is missing (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GapKind {
    Block,
    Milestone,
    Finality,
    PriorityFee,
}

impl GapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapKind::Block => "block",
            GapKind::Milestone => "milestone",
            GapKind::Finality => "finality",
            GapKind::PriorityFee => "priority_fee",
        }
    }
}

impl std::str::FromStr for GapKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(GapKind::Block),
            "milestone" => Ok(GapKind::Milestone),
            "finality" => Ok(GapKind::Finality),
            "priority_fee" => Ok(GapKind::PriorityFee),
            other => Err(format!("unknown gap kind {other:?}")),
        }
    }
}

/// Lifecycle state of a gap row (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GapState {
    Pending,
    Filling,
    Filled,
    Abandoned,
}

impl GapState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapState::Pending => "pending",
            GapState::Filling => "filling",
            GapState::Filled => "filled",
            GapState::Abandoned => "abandoned",
        }
    }
}

impl std::str::FromStr for GapState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(GapState::Pending),
            "filling" => Ok(GapState::Filling),
            "filled" => Ok(GapState::Filled),
            "abandoned" => Ok(GapState::Abandoned),
            other => Err(format!("unknown gap state {other:?}")),
        }
    }
}

/// A contiguous range of missing (or reconciliation-needing) ids (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gap {
    pub id: i64,
    pub kind: GapKind,
    pub range_start: u64,
    pub range_end: u64,
    pub state: GapState,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub filled_at: Option<DateTime<Utc>>,
}

impl Gap {
    pub fn len(&self) -> u64 {
        self.range_end - self.range_start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_state_round_trip_through_str() {
        for kind in [GapKind::Block, GapKind::Milestone, GapKind::Finality, GapKind::PriorityFee] {
            assert_eq!(kind.as_str().parse::<GapKind>().unwrap(), kind);
        }
        for state in [GapState::Pending, GapState::Filling, GapState::Filled, GapState::Abandoned]
        {
            assert_eq!(state.as_str().parse::<GapState>().unwrap(), state);
        }
    }

    #[test]
    fn single_block_gap_has_length_one() {
        let gap = Gap {
            id: 1,
            kind: GapKind::Block,
            range_start: 42,
            range_end: 42,
            state: GapState::Pending,
            source: "gap_analyzer".into(),
            created_at: DateTime::from_timestamp(0, 0).unwrap(),
            claimed_at: None,
            filled_at: None,
        };
        assert_eq!(gap.len(), 1);
    }
}
