//! Error type for the page/tab collaborator boundary.

use pagepilot_core_types::TabId;
use thiserror::Error;

use crate::types::NodeId;

/// Errors surfaced by a page driver or tab host.
#[derive(Debug, Error, Clone)]
pub enum PageError {
    /// The node no longer exists in the live document.
    #[error("node {0:?} is gone")]
    NodeGone(NodeId),

    /// The referenced tab does not exist (closed or never created).
    #[error("unknown tab {0}")]
    UnknownTab(TabId),

    /// A CSS selector could not be parsed by the backend.
    #[error("bad selector: {0}")]
    BadSelector(String),

    /// A path expression could not be parsed by the backend.
    #[error("bad path expression: {0}")]
    BadPath(String),

    /// The operation does not apply to this node kind.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Backend transport or internal failure.
    #[error("page backend error: {0}")]
    Backend(String),
}
