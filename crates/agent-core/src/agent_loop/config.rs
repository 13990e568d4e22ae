//! Loop tunables.

use std::time::Duration;

use crate::guardrails::DedupConfig;

#[derive(Clone, Debug)]
pub struct LoopConfig {
    /// Planner turns before the run stops.
    pub max_steps: u32,
    /// Settle delay between steps, letting the page react.
    pub settle: Duration,
    /// History ring capacity.
    pub history_cap: usize,
    pub dedup: DedupConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 15,
            settle: Duration::from_secs(1),
            history_cap: 50,
            dedup: DedupConfig::default(),
        }
    }
}
