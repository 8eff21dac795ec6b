use chrono::{DateTime, Utc};

/// The two streams that coverage / gap analysis is tracked for (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Blocks,
    Milestones,
}

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Blocks => "blocks",
            Stream::Milestones => "milestones",
        }
    }
}

impl std::str::FromStr for Stream {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocks" => Ok(Stream::Blocks),
            "milestones" => Ok(Stream::Milestones),
            other => Err(format!("unknown stream {other:?}")),
        }
    }
}

/// The validated `[low_water_mark, high_water_mark]` interval for a stream
/// (spec §3, I3/I4). Owned and exclusively mutated by `GapAnalyzer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    pub stream: Stream,
    pub low_water_mark: u64,
    pub high_water_mark: u64,
    pub last_analyzed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_round_trips_through_str() {
        assert_eq!("blocks".parse::<Stream>().unwrap(), Stream::Blocks);
        assert_eq!("milestones".parse::<Stream>().unwrap(), Stream::Milestones);
        assert!("transfers".parse::<Stream>().is_err());
    }
}
