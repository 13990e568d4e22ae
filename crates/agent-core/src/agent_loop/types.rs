//! Run outcome types.

use chrono::{DateTime, Utc};
use pagepilot_core_types::RunId;
use serde::{Deserialize, Serialize};

use crate::history::HistoryEntry;
use crate::plan::Plan;

/// Why the run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    /// The planner issued `done`.
    Done,
    /// Explicit stop request or autostop.
    Stopped,
    /// Step budget exhausted.
    StepLimit,
    /// The tab being driven disappeared.
    TabLost,
}

/// Final report for one run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub instruction: String,
    pub status: TerminalStatus,
    pub steps: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub history: Vec<HistoryEntry>,
    pub plan: Plan,
}
