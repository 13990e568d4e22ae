//! Error types for structural perception.

use page_port::PageError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum PerceiverError {
    /// The page backend failed while reading the document.
    #[error("page read failed: {0}")]
    Page(#[from] PageError),

    /// The scan exceeded its node budget (runaway document).
    #[error("scan aborted: {0}")]
    ScanAborted(String),
}
