//! Action error taxonomy.
//!
//! This is the vocabulary every layer above the executor speaks. Nothing in
//! this workspace throws an error past the retry controller; these become
//! `{ok: false, error}` results at that boundary.

use page_port::PageError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ActionError {
    /// Every resolution strategy was exhausted.
    #[error("Element not found: {0}")]
    NotFound(String),

    /// Found, but another element owns its click points.
    #[error("Element obscured: {0}")]
    Obscured(String),

    /// Action applied but its post-condition never held.
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// A handle or node reference died mid-flight.
    #[error("Stale element: {0}")]
    Stale(String),

    /// Malformed tool arguments.
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// A wait or probe exceeded its bound.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Requested `<option>` does not exist.
    #[error("Option not found: {0}")]
    OptionNotFound(String),

    /// The target tab disappeared.
    #[error("Tab lost: {0}")]
    TabLost(String),

    /// Page backend failure.
    #[error("Page error: {0}")]
    Page(String),
}

impl From<PageError> for ActionError {
    fn from(err: PageError) -> Self {
        match err {
            PageError::NodeGone(node) => ActionError::Stale(format!("node {node:?} is gone")),
            PageError::UnknownTab(tab) => ActionError::TabLost(tab.to_string()),
            other => ActionError::Page(other.to_string()),
        }
    }
}

impl From<perceiver_dom::PerceiverError> for ActionError {
    fn from(err: perceiver_dom::PerceiverError) -> Self {
        ActionError::Page(err.to_string())
    }
}

impl ActionError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActionError::NotFound(_)
                | ActionError::Obscured(_)
                | ActionError::Stale(_)
                | ActionError::Timeout(_)
                | ActionError::VerificationFailed(_)
                | ActionError::Page(_)
        )
    }
}
