//! Debounced mutation invalidation.
//!
//! Mutations arrive in bursts. Instead of per-mutation callbacks, the
//! registry subscribes to a single `Invalidated` signal: the first qualifying
//! mutation after the debounce window fires once, and further mutations
//! inside the window are folded into the same burst. The decision logic is a
//! pure state machine so the policy is testable without a live document.

use std::sync::Arc;
use std::time::{Duration, Instant};

use page_port::PageDriver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::Registry;

/// Default debounce window between invalidation signals.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(250);

/// Pure debounce state machine over a monotonically increasing mutation
/// counter.
#[derive(Debug)]
pub struct DebouncedInvalidator {
    window: Duration,
    last_count: Option<u64>,
    last_fired: Option<Instant>,
}

impl DebouncedInvalidator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_count: None,
            last_fired: None,
        }
    }

    /// Feed the current counter; returns true when an `Invalidated` signal
    /// should fire. The first observation only establishes the baseline.
    pub fn observe(&mut self, mutation_count: u64, now: Instant) -> bool {
        let Some(last) = self.last_count else {
            self.last_count = Some(mutation_count);
            return false;
        };
        if mutation_count <= last {
            return false;
        }
        self.last_count = Some(mutation_count);
        let quiet = self
            .last_fired
            .map(|t| now.duration_since(t) >= self.window)
            .unwrap_or(true);
        if quiet {
            self.last_fired = Some(now);
            true
        } else {
            false
        }
    }
}

impl Default for DebouncedInvalidator {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

/// Poll the page's mutation counter and bump the registry epoch on each
/// debounced burst, until cancelled.
pub async fn watch(
    driver: Arc<dyn PageDriver>,
    registry: Arc<Registry>,
    window: Duration,
    cancel: CancellationToken,
) {
    let mut debounce = DebouncedInvalidator::new(window);
    let poll = Duration::from_millis(50);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(poll) => {}
        }
        match driver.page_state().await {
            Ok(state) => {
                if debounce.observe(state.mutation_count, Instant::now()) {
                    let epoch = registry.invalidate();
                    debug!(epoch = epoch.0, "mutation burst invalidated registry");
                }
            }
            Err(e) => {
                warn!(error = %e, "mutation watch lost the page");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_is_baseline_only() {
        let mut d = DebouncedInvalidator::new(Duration::from_millis(250));
        let t0 = Instant::now();
        assert!(!d.observe(40, t0));
        assert!(d.observe(41, t0));
    }

    #[test]
    fn burst_fires_once_within_window() {
        let mut d = DebouncedInvalidator::new(Duration::from_millis(250));
        let t0 = Instant::now();
        d.observe(0, t0);
        assert!(d.observe(1, t0));
        assert!(!d.observe(2, t0 + Duration::from_millis(50)));
        assert!(!d.observe(3, t0 + Duration::from_millis(200)));
        // Next burst after the window fires again.
        assert!(d.observe(4, t0 + Duration::from_millis(300)));
    }

    #[test]
    fn unchanged_counter_never_fires() {
        let mut d = DebouncedInvalidator::new(Duration::from_millis(250));
        let t0 = Instant::now();
        d.observe(7, t0);
        assert!(!d.observe(7, t0 + Duration::from_secs(1)));
        assert!(!d.observe(6, t0 + Duration::from_secs(2)));
    }
}
