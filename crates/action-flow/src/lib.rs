//! Retry & verification controller for PagePilot: the public action API.
//!
//! Every attempted action is wrapped in probe-before-act, retry-with-backoff,
//! and assert-after-act semantics, with detection of navigation and new-tab
//! side effects. Failures never cross this boundary as errors; callers get an
//! [`ActionResult`] with a specific reason and decide whether to re-plan.

pub mod controller;
pub mod retry;
pub mod types;
pub mod verify;

pub use controller::{Controller, ControllerConfig};
pub use retry::{with_retry, Attempt, Mitigation, RetryPolicy, ELEMENT_MITIGATIONS};
pub use types::{
    ActionResult, CheckArgs, CopyArgs, NavigateArgs, NewTabArgs, Outcome, PasteArgs, PressArgs,
    ScrollArgs, ScrollDestination, SearchArgs, SelectArgs, SwitchTabArgs, TapArgs, TargetArgs,
    ToolCall, TypeArgs, VerifySpec, WaitArgs, WaitCondition,
};
pub use verify::{verify_after, wait_ready};

pub(crate) fn locator_err(err: action_locator::LocatorError) -> action_primitives::ActionError {
    match err {
        action_locator::LocatorError::Page(e) => e.into(),
        action_locator::LocatorError::Perceiver(e) => e.into(),
    }
}
