//! Error type for the agent loop.
//!
//! Tool failures are not errors here; they arrive as `ActionResult`s and go
//! into history. This enum covers the loop's own failure modes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The external planner could not produce a decision.
    #[error("planner failed: {0}")]
    Planner(String),

    /// Planner output did not normalize into any known tool call shape.
    #[error("unrecognized planner output: {0}")]
    Normalize(String),

    /// The tab the run was driving no longer exists.
    #[error("tab lost: {0}")]
    TabLost(String),

    /// Page state could not be read.
    #[error("page error: {0}")]
    Page(String),
}
