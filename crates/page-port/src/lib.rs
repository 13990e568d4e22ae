//! Page and tab collaborator boundary for PagePilot.
//!
//! The upper layers (perception, location, interaction, orchestration) are
//! written against the [`PageDriver`] and [`TabHost`] traits defined here. A
//! real deployment backs them with a page-resident script and the browser's
//! tab API; the [`sim`] module provides a full in-memory backend.

pub mod driver;
pub mod errors;
pub mod sim;
pub mod types;

pub use driver::{PageDriver, TabHost};
pub use errors::PageError;
pub use types::*;
