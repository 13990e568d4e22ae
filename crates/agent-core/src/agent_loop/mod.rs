//! The bounded agent control loop.

pub mod config;
pub mod controller;
pub mod types;

pub use config::LoopConfig;
pub use controller::AgentLoop;
pub use types::{RunReport, TerminalStatus};
