//! The generic probe/act retry combinator shared by every tool.
//!
//! One loop, parameterized by backoff policy and an ordered mitigation list,
//! replaces per-tool bespoke retry code. Attempt 1 runs clean; later attempts
//! carry the next mitigation in the list.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use action_primitives::ActionError;
use rand::Rng;
use tracing::debug;

/// Bounded exponential backoff with jitter.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(350),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay after a failed attempt (1-based), jittered ±25%.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.clamp(1, 5).saturating_sub(1);
        let raw = self
            .base_delay
            .saturating_mul(factor)
            .min(self.max_delay);
        raw.mul_f64(rand::thread_rng().gen_range(0.75..1.25))
    }
}

/// Escalating mitigations between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mitigation {
    /// Bring the target into the viewport before resolving again.
    ScrollIntoView,
    /// Offset the click point by a few random pixels.
    NudgePointer,
    /// Skip event synthesis and go straight to the native activation.
    ForceNative,
}

/// The mitigation ladder for element-addressed tools.
pub const ELEMENT_MITIGATIONS: &[Mitigation] = &[
    Mitigation::ScrollIntoView,
    Mitigation::NudgePointer,
    Mitigation::ForceNative,
];

/// One pass through the retry loop.
#[derive(Clone, Copy, Debug)]
pub struct Attempt {
    /// 1-based attempt counter.
    pub number: u32,
    /// `None` on the first attempt.
    pub mitigation: Option<Mitigation>,
}

pub type AttemptFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ActionError>> + Send + 'a>>;

/// Run `attempt` until it succeeds or the policy is exhausted.
///
/// Only retryable failures re-enter the loop; anything else (bad arguments,
/// missing options) aborts immediately. The last error is returned when every
/// attempt fails.
pub async fn with_retry<'a, T, F>(
    policy: &RetryPolicy,
    mitigations: &[Mitigation],
    mut attempt: F,
) -> Result<T, ActionError>
where
    F: FnMut(Attempt) -> AttemptFuture<'a, T>,
{
    let max = policy.max_attempts.max(1);
    let mut last = None;
    for number in 1..=max {
        let mitigation = if number == 1 {
            None
        } else {
            mitigations.get(number as usize - 2).copied()
        };
        match attempt(Attempt { number, mitigation }).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && number < max => {
                let delay = policy.backoff(number);
                debug!(
                    attempt = number,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                last = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last.unwrap_or_else(|| ActionError::Timeout("retry attempts exhausted".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_escalating_mitigations() {
        let tries = AtomicU32::new(0);
        let out = with_retry(&RetryPolicy::default(), ELEMENT_MITIGATIONS, |attempt| {
            let tries = &tries;
            Box::pin(async move {
                tries.fetch_add(1, Ordering::SeqCst);
                if attempt.number < 3 {
                    Err(ActionError::NotFound("x".into()))
                } else {
                    Ok(attempt.mitigation)
                }
            })
        })
        .await
        .unwrap();
        assert_eq!(tries.load(Ordering::SeqCst), 3);
        // Attempt 2 gets the first mitigation, attempt 3 the second.
        assert_eq!(out, Some(Mitigation::NudgePointer));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_aborts_immediately() {
        let tries = AtomicU32::new(0);
        let err = with_retry::<(), _>(&RetryPolicy::default(), ELEMENT_MITIGATIONS, |_| {
            let tries = &tries;
            Box::pin(async move {
                tries.fetch_add(1, Ordering::SeqCst);
                Err(ActionError::InvalidArgs("bad".into()))
            })
        })
        .await
        .unwrap_err();
        assert_eq!(tries.load(Ordering::SeqCst), 1);
        assert!(matches!(err, ActionError::InvalidArgs(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_the_last_error() {
        let tries = AtomicU32::new(0);
        let err = with_retry::<(), _>(&RetryPolicy::default(), ELEMENT_MITIGATIONS, |_| {
            let tries = &tries;
            Box::pin(async move {
                tries.fetch_add(1, Ordering::SeqCst);
                Err(ActionError::NotFound("still missing".into()))
            })
        })
        .await
        .unwrap_err();
        assert_eq!(tries.load(Ordering::SeqCst), 4);
        assert!(matches!(err, ActionError::NotFound(_)));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(350),
            max_delay: Duration::from_secs(2),
        };
        // Jitter is ±25%, so compare against the widest bounds.
        let first = policy.backoff(1);
        assert!(first >= Duration::from_millis(262) && first <= Duration::from_millis(438));
        let deep = policy.backoff(10);
        assert!(deep <= Duration::from_millis(2500));
    }
}
