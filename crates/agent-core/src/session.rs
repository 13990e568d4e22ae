//! Per-run bounding context: ids, counters, history, guardrail state.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use pagepilot_core_types::RunId;

use crate::guardrails::{DedupConfig, Deduper, LoopDetector};
use crate::history::History;

/// The bounding context for one instruction.
pub struct RunSession {
    pub run_id: RunId,
    pub instruction: String,
    pub started_at: DateTime<Utc>,
    pub steps: u32,
    /// Cooperative stop flag, honored at step boundaries.
    pub autostop: bool,
    pub history: History,
    pub dedup: Deduper,
    pub loops: LoopDetector,
    /// Hrefs already opened this run; keeps the agent from re-opening the
    /// same external link over and over.
    pub opened_hrefs: HashSet<String>,
}

impl RunSession {
    pub fn new(instruction: impl Into<String>, history_cap: usize, dedup: DedupConfig) -> Self {
        Self {
            run_id: RunId::new(),
            instruction: instruction.into(),
            started_at: Utc::now(),
            steps: 0,
            autostop: false,
            history: History::new(history_cap),
            dedup: Deduper::new(dedup),
            loops: LoopDetector::new(),
            opened_hrefs: HashSet::new(),
        }
    }

    /// Remember an opened href; false when it was already opened this run.
    pub fn note_opened(&mut self, href: impl Into<String>) -> bool {
        self.opened_hrefs.insert(href.into())
    }
}
