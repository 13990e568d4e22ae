//! Error types for element resolution.

use page_port::PageError;
use perceiver_dom::PerceiverError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    #[error("page read failed: {0}")]
    Page(#[from] PageError),

    #[error("perception failed: {0}")]
    Perceiver(#[from] PerceiverError),
}
