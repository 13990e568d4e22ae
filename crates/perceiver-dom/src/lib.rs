//! Structural perception for PagePilot.
//!
//! This crate owns everything that turns a live document into addressable
//! elements: the visibility oracle, the epoch-tagged element registry with
//! its signature index, the full-document scan, and the debounced mutation
//! invalidation that ends an epoch.

pub mod errors;
pub mod mutation;
pub mod registry;
pub mod scan;
pub mod signature;
pub mod visibility;

pub use errors::PerceiverError;
pub use mutation::{DebouncedInvalidator, DEBOUNCE_WINDOW};
pub use registry::{Epoch, Handle, Registry};
pub use scan::{collect_interactive, is_interactive, scan, ElementDescriptor};
pub use signature::ElementSignature;
