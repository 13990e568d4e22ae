//! Layered configuration: built-in defaults, an optional file, then
//! `PAGEPILOT_*` environment overrides.

use std::path::Path;
use std::time::Duration;

use action_flow::{ControllerConfig, RetryPolicy};
use agent_core::{DedupConfig, LoopConfig};
use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Planner turns before a run stops.
    pub max_steps: u32,
    /// Settle delay between steps, milliseconds.
    pub settle_ms: u64,
    pub history_cap: usize,

    pub dedup_window_ms: u64,
    pub dedup_quick_window_ms: u64,
    pub dedup_mutation_delta: u64,

    pub retry_attempts: u32,
    pub retry_base_ms: u64,
    pub retry_cap_ms: u64,

    pub verify_timeout_ms: u64,
    pub navigate_timeout_ms: u64,
    pub new_tab_budget: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_steps: 15,
            settle_ms: 1_000,
            history_cap: 50,
            dedup_window_ms: 1_200,
            dedup_quick_window_ms: 600,
            dedup_mutation_delta: 8,
            retry_attempts: 4,
            retry_base_ms: 350,
            retry_cap_ms: 2_000,
            verify_timeout_ms: 4_000,
            navigate_timeout_ms: 10_000,
            new_tab_budget: 3,
        }
    }
}

impl AppConfig {
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }
        let settings = builder
            .add_source(Environment::with_prefix("PAGEPILOT").try_parsing(true))
            .build()
            .context("building configuration")?;
        settings
            .try_deserialize()
            .context("deserializing configuration")
    }

    pub fn dedup(&self) -> DedupConfig {
        DedupConfig {
            window: Duration::from_millis(self.dedup_window_ms),
            quick_window: Duration::from_millis(self.dedup_quick_window_ms),
            mutation_delta: self.dedup_mutation_delta,
        }
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            max_steps: self.max_steps,
            settle: Duration::from_millis(self.settle_ms),
            history_cap: self.history_cap,
            dedup: self.dedup(),
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            retry: RetryPolicy {
                max_attempts: self.retry_attempts,
                base_delay: Duration::from_millis(self.retry_base_ms),
                max_delay: Duration::from_millis(self.retry_cap_ms),
            },
            verify_timeout: Duration::from_millis(self.verify_timeout_ms),
            navigate_timeout: Duration::from_millis(self.navigate_timeout_ms),
            new_tab_budget: self.new_tab_budget,
            ..ControllerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_flow_into_component_configs() {
        let cfg = AppConfig::default();
        let loop_cfg = cfg.loop_config();
        assert_eq!(loop_cfg.max_steps, 15);
        assert_eq!(loop_cfg.dedup.mutation_delta, 8);
        let flow = cfg.controller_config();
        assert_eq!(flow.retry.max_attempts, 4);
        assert_eq!(flow.new_tab_budget, 3);
    }

    #[test]
    fn load_without_a_file_uses_defaults() {
        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg.max_steps, AppConfig::default().max_steps);
    }
}
