//! Core data model (spec §3): blocks, milestones, coverage, gaps, and the
//! small caches the workers coordinate through.

mod block;
mod coverage;
mod gap;
mod milestone;
mod range;
mod stats;
mod status;

pub use block::Block;
pub use coverage::{Coverage, Stream};
pub use gap::{Gap, GapKind, GapState};
pub use milestone::Milestone;
pub use range::{group_consecutive, IdRange};
pub use stats::{MilestoneAggregates, PriorityFeeFixStatus, StatsTable, TableStats};
pub use status::{WorkerState, WorkerStatus};
