//! Multi-strategy element resolution.
//!
//! Turns a fuzzy locate request (handle, signature, selector, path, text)
//! into a concrete node via an ordered, short-circuiting strategy chain with
//! a scored free-text fallback. Resolution is a point-in-time answer; retry
//! policy lives in the action-flow crate.

pub mod errors;
pub mod resolver;
pub mod score;
pub mod strategies;
pub mod types;

pub use errors::LocatorError;
pub use resolver::Resolver;
pub use types::{LocateRequest, LocateStrategy, Resolution, StrategyKind, TextQuery};
