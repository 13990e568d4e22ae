//! Dedup and loop-detection guardrails.
//!
//! Both are pure state machines over (call, time, mutation counter) so the
//! policies are testable without a page.

use std::collections::VecDeque;
use std::time::Duration;

use action_flow::ToolCall;
use tokio::time::Instant;
use tracing::debug;

/// Dedup policy knobs.
#[derive(Clone, Debug)]
pub struct DedupConfig {
    /// Window during which an identical consecutive call is suppressed.
    pub window: Duration,
    /// Shorter window for wait/scroll, which legitimately repeat.
    pub quick_window: Duration,
    /// Mutation-count delta above which the page is considered to have
    /// moved, letting the repeat through.
    pub mutation_delta: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(1200),
            quick_window: Duration::from_millis(600),
            mutation_delta: 8,
        }
    }
}

struct LastCall {
    call: ToolCall,
    at: Instant,
    mutations: u64,
}

/// Suppresses identical consecutive calls inside a short window unless the
/// page mutated enough in between to suggest state actually changed.
pub struct Deduper {
    config: DedupConfig,
    last: Option<LastCall>,
}

impl Deduper {
    pub fn new(config: DedupConfig) -> Self {
        Self { config, last: None }
    }

    fn window_for(&self, call: &ToolCall) -> Duration {
        match call {
            ToolCall::Wait(_) | ToolCall::Scroll(_) => self.config.quick_window,
            _ => self.config.window,
        }
    }

    /// Whether this call should be suppressed. The memo is not refreshed on
    /// suppression, so the window is measured from the last *executed* call.
    pub fn should_suppress(&self, call: &ToolCall, now: Instant, mutations: u64) -> bool {
        let Some(last) = &self.last else {
            return false;
        };
        if last.call != *call {
            return false;
        }
        if now.duration_since(last.at) >= self.window_for(call) {
            return false;
        }
        if mutations.saturating_sub(last.mutations) >= self.config.mutation_delta {
            debug!("identical call repeated but the page moved; allowing");
            return false;
        }
        true
    }

    /// Record an executed call.
    pub fn record(&mut self, call: &ToolCall, now: Instant, mutations: u64) {
        self.last = Some(LastCall {
            call: call.clone(),
            at: now,
            mutations,
        });
    }
}

/// Calls examined for a repeat run.
pub const LOOP_WINDOW: usize = 5;
/// Identical calls inside the window that count as a loop.
pub const LOOP_THRESHOLD: usize = 3;

/// Sliding-window detector for short runs of identical calls.
#[derive(Default)]
pub struct LoopDetector {
    recent: VecDeque<ToolCall>,
}

impl LoopDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next call; true when it completes a loop. Detection clears
    /// the window so one corrective action is injected per run, not one per
    /// further repeat.
    pub fn observe(&mut self, call: &ToolCall) -> bool {
        self.recent.push_back(call.clone());
        if self.recent.len() > LOOP_WINDOW {
            self.recent.pop_front();
        }
        let repeats = self.recent.iter().filter(|c| *c == call).count();
        if repeats >= LOOP_THRESHOLD {
            debug!(repeats, "loop detected");
            self.recent.clear();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_flow::{ScrollArgs, TapArgs, TargetArgs, WaitArgs};

    fn tap(text: &str) -> ToolCall {
        ToolCall::Tap(TapArgs {
            target: TargetArgs::from_text(text),
            ..Default::default()
        })
    }

    #[test]
    fn identical_call_inside_window_is_suppressed() {
        let mut dedup = Deduper::new(DedupConfig::default());
        let t0 = Instant::now();
        let call = tap("Go");
        assert!(!dedup.should_suppress(&call, t0, 10));
        dedup.record(&call, t0, 10);
        assert!(dedup.should_suppress(&call, t0 + Duration::from_millis(500), 10));
        // Third identical call after the window executes again.
        assert!(!dedup.should_suppress(&call, t0 + Duration::from_millis(1500), 10));
    }

    #[test]
    fn enough_mutation_lets_the_repeat_through() {
        let mut dedup = Deduper::new(DedupConfig::default());
        let t0 = Instant::now();
        let call = tap("Go");
        dedup.record(&call, t0, 10);
        assert!(dedup.should_suppress(&call, t0 + Duration::from_millis(300), 12));
        assert!(!dedup.should_suppress(&call, t0 + Duration::from_millis(300), 40));
    }

    #[test]
    fn different_call_is_never_suppressed() {
        let mut dedup = Deduper::new(DedupConfig::default());
        let t0 = Instant::now();
        dedup.record(&tap("Go"), t0, 0);
        assert!(!dedup.should_suppress(&tap("Stop"), t0, 0));
    }

    #[test]
    fn wait_and_scroll_use_the_quick_window() {
        let dedup = {
            let mut d = Deduper::new(DedupConfig::default());
            let wait = ToolCall::Wait(WaitArgs {
                ms: Some(200),
                ..Default::default()
            });
            d.record(&wait, Instant::now(), 0);
            d
        };
        let wait = ToolCall::Wait(WaitArgs {
            ms: Some(200),
            ..Default::default()
        });
        let scroll = ToolCall::Scroll(ScrollArgs::default());
        let base = Instant::now();
        assert!(dedup.should_suppress(&wait, base + Duration::from_millis(100), 0));
        assert!(!dedup.should_suppress(&wait, base + Duration::from_millis(700), 0));
        assert!(!dedup.should_suppress(&scroll, base, 0));
    }

    #[test]
    fn three_identical_in_five_trigger_once() {
        let mut loops = LoopDetector::new();
        let call = tap("Next");
        assert!(!loops.observe(&call));
        assert!(!loops.observe(&tap("Other")));
        assert!(!loops.observe(&call));
        assert!(loops.observe(&call));
        // Window cleared: the next identical call is accepted again.
        assert!(!loops.observe(&call));
        assert!(!loops.observe(&call));
        assert!(loops.observe(&call));
    }

    #[test]
    fn spread_out_repeats_do_not_trigger() {
        let mut loops = LoopDetector::new();
        let call = tap("Next");
        for filler in ["a", "b", "c", "d"] {
            assert!(!loops.observe(&call));
            assert!(!loops.observe(&tap(filler)));
            assert!(!loops.observe(&tap(filler)));
        }
    }
}
