use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle state of a worker, as reported by the Worker Status Registry
/// (spec §3, §2.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Running,
    Idle,
    Error,
    Stopped,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Running => "running",
            WorkerState::Idle => "idle",
            WorkerState::Error => "error",
            WorkerState::Stopped => "stopped",
        }
    }
}

/// A process-local snapshot of one worker's health, read by the status
/// endpoint (spec §3, §6).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerStatus {
    pub name: String,
    pub state: WorkerState,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub items_processed: u64,
}

impl WorkerStatus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: WorkerState::Idle,
            last_run_at: None,
            last_error_at: None,
            last_error: None,
            items_processed: 0,
        }
    }
}
