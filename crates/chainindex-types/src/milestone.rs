use chrono::{DateTime, Utc};

/// A checkpoint-layer milestone covering `[start_block, end_block]`
/// (spec §3). Inserted once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    /// Equal to `end_block`.
    pub milestone_id: u64,
    pub sequence_id: u64,
    pub start_block: u64,
    pub end_block: u64,
    pub hash: String,
    pub proposer: String,
    pub timestamp: DateTime<Utc>,
}

impl Milestone {
    pub fn covers(&self, block_number: u64) -> bool {
        (self.start_block..=self.end_block).contains(&block_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn milestone(seq: u64, start: u64, end: u64) -> Milestone {
        Milestone {
            milestone_id: end,
            sequence_id: seq,
            start_block: start,
            end_block: end,
            hash: "0xabc".into(),
            proposer: "0xvalidator".into(),
            timestamp: DateTime::from_timestamp(0, 0).unwrap(),
        }
    }

    #[test]
    fn covers_inclusive_range() {
        let m = milestone(7, 1001, 1100);
        assert!(m.covers(1001));
        assert!(m.covers(1100));
        assert!(!m.covers(1000));
        assert!(!m.covers(1101));
    }

    #[test]
    fn single_block_milestone_covers_only_itself() {
        let m = milestone(1, 42, 42);
        assert!(m.covers(42));
        assert!(!m.covers(41));
        assert!(!m.covers(43));
    }
}
