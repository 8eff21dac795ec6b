//! The seven cooperating workers (spec §4.3-§4.8). Six of them
//! ([`TipFollower`], [`BlockBackfiller`], [`MilestoneBackfiller`],
//! [`GapAnalyzer`], [`GapFiller`], [`PriorityFeeRecomputer`]) implement
//! [`Worker`] and are driven by [`run_loop`]. `FinalityReconciler` has no
//! independent loop of its own (spec §4.7: it "runs both as part of
//! milestone ingest ... and as the worker behind `kind=finality` gap
//! rows"), so it's exposed as the [`finality_reconciler`] module instead.

mod aggregate;
mod block_backfiller;
mod finality_reconciler;
mod gap_analyzer;
mod gap_filler;
mod ingest;
mod milestone_backfiller;
mod priority_fee_recomputer;
mod tip_follower;
mod traits;

pub use block_backfiller::BlockBackfiller;
pub use finality_reconciler::{reconcile_milestone, reconcile_range};
pub use gap_analyzer::GapAnalyzer;
pub use gap_filler::GapFiller;
pub use milestone_backfiller::MilestoneBackfiller;
pub use priority_fee_recomputer::PriorityFeeRecomputer;
pub use tip_follower::TipFollower;
pub use traits::{run_loop, Worker, WorkerOutcome};
