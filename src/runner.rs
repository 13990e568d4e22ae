//! Assembles a full agent stack over the simulated browser backend and runs
//! one instruction to a terminal state.

use std::sync::Arc;

use action_flow::Controller;
use agent_core::{AgentLoop, RuleBasedPlanner, RunReport};
use page_port::sim::{PageDescription, SimBrowser};
use page_port::TabHost;
use perceiver_dom::{Registry, DEBOUNCE_WINDOW};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AppConfig;

/// Run one instruction against a simulated page and return the report.
pub async fn run_instruction(
    config: &AppConfig,
    page: PageDescription,
    instruction: &str,
) -> anyhow::Result<RunReport> {
    let browser = SimBrowser::new();
    let tab = browser.open_page(page, true);
    info!(tab = %tab, "opened start page");

    let registry = Arc::new(Registry::new());
    let controller = Arc::new(Controller::new(
        browser.clone() as Arc<dyn TabHost>,
        registry.clone(),
        tab,
        config.controller_config(),
    ));

    // Live invalidation: mutation bursts end the registry epoch while the
    // run is in flight.
    let watch_cancel = CancellationToken::new();
    let watcher = tokio::spawn(perceiver_dom::mutation::watch(
        browser.driver(tab).expect("start tab driver"),
        registry,
        DEBOUNCE_WINDOW,
        watch_cancel.clone(),
    ));

    let planner = Arc::new(RuleBasedPlanner::for_instruction(instruction));
    let agent = AgentLoop::new(controller, planner, config.loop_config());
    let report = agent.run(instruction).await;

    watch_cancel.cancel();
    let _ = watcher.await;
    Ok(report)
}
