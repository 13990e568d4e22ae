//! Smoke test for the full demo wiring.

use agent_core::TerminalStatus;
use pagepilot_cli::config::AppConfig;
use pagepilot_cli::{demo, runner};

#[tokio::test(start_paused = true)]
async fn demo_run_reaches_a_terminal_state() {
    let config = AppConfig::default();
    let report = runner::run_instruction(&config, demo::demo_page(), "read the checkout page")
        .await
        .unwrap();
    assert_eq!(report.status, TerminalStatus::Done);
    assert!(!report.history.is_empty());
    // The derived script reads the page before finishing.
    let read = report
        .history
        .iter()
        .find(|h| h.tool == "read_page")
        .expect("read_page ran");
    assert!(read.ok);
    assert!(read.summary.contains("chars"));
    assert_eq!(report.plan.subtasks.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn instruction_with_a_url_navigates_there() {
    let config = AppConfig::default();
    let report = runner::run_instruction(
        &config,
        demo::demo_page(),
        "open docs.pagepilot.test/help and read it",
    )
    .await
    .unwrap();
    assert_eq!(report.status, TerminalStatus::Done);
    let nav = report
        .history
        .iter()
        .find(|h| h.tool == "navigate")
        .expect("navigate ran");
    assert!(nav.ok, "{}", nav.summary);
    assert!(nav.url.contains("docs.pagepilot.test"));
}
