//! Full control-loop runs against the simulated browser.

use std::sync::Arc;

use action_flow::{Controller, ControllerConfig};
use agent_core::{
    AgentLoop, LoopConfig, Plan, PlannerDecision, RuleBasedPlanner, SubtaskStatus, SubtaskUpdate,
    TerminalStatus,
};
use page_port::sim::{NodeDescription, PageDescription, SimBrowser, SimPage};
use page_port::TabHost;
use pagepilot_core_types::TabId;
use perceiver_dom::Registry;
use serde_json::json;

fn form_page() -> PageDescription {
    PageDescription::new("https://shop.test/checkout")
        .title("Checkout")
        .node(
            NodeDescription::new("form").id("f").child(
                NodeDescription::new("input")
                    .id("email")
                    .attr("name", "email")
                    .attr("placeholder", "Email"),
            )
            .child(
                NodeDescription::new("button")
                    .id("send")
                    .attr("type", "submit")
                    .text("Send"),
            ),
        )
}

struct Harness {
    browser: Arc<SimBrowser>,
    tab: TabId,
    controller: Arc<Controller>,
}

impl Harness {
    fn new(description: PageDescription) -> Self {
        let browser = SimBrowser::new();
        let tab = browser.open_page(description, true);
        let registry = Arc::new(Registry::new());
        let controller = Arc::new(Controller::new(
            browser.clone() as Arc<dyn TabHost>,
            registry,
            tab,
            ControllerConfig::default(),
        ));
        Self {
            browser,
            tab,
            controller,
        }
    }

    fn agent(&self, planner: RuleBasedPlanner, config: LoopConfig) -> AgentLoop {
        self.controller.begin_run();
        AgentLoop::new(self.controller.clone(), Arc::new(planner), config)
    }

    fn page(&self) -> Arc<SimPage> {
        self.browser.page(self.tab).unwrap()
    }
}

#[tokio::test(start_paused = true)]
async fn scripted_run_fills_the_form_and_completes_the_plan() {
    let harness = Harness::new(form_page());
    let planner = RuleBasedPlanner::scripted([
        PlannerDecision {
            thought: Some("fill in the email first".into()),
            call: json!({"tool": "type", "args": {"text": "Email", "value": "user@example.com"}}),
            subtask_updates: vec![SubtaskUpdate {
                index: 0,
                status: SubtaskStatus::Completed,
            }],
        },
        PlannerDecision {
            thought: None,
            call: json!({"tap": "Send"}),
            subtask_updates: vec![SubtaskUpdate {
                index: 1,
                status: SubtaskStatus::Completed,
            }],
        },
        PlannerDecision {
            thought: None,
            call: json!({"tool": "done"}),
            subtask_updates: vec![SubtaskUpdate {
                index: 2,
                status: SubtaskStatus::Completed,
            }],
        },
    ]);
    let agent = harness.agent(planner, LoopConfig::default());
    let report = agent.run("check out with user@example.com").await;

    assert_eq!(report.status, TerminalStatus::Done);
    assert_eq!(report.steps, 3);

    let sim = harness.page();
    let email = sim.node_by_dom_id("email").unwrap();
    assert_eq!(sim.value_of(email).as_deref(), Some("user@example.com"));
    let send = sim.node_by_dom_id("send").unwrap();
    assert!(sim.click_count(send) >= 1);

    let statuses: Vec<SubtaskStatus> = report.plan.subtasks.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            SubtaskStatus::Completed,
            SubtaskStatus::Completed,
            SubtaskStatus::Completed
        ]
    );
    assert!(report.plan.is_complete());
    assert!(report.history.iter().all(|h| h.ok));
}

#[tokio::test(start_paused = true)]
async fn identical_call_in_the_window_is_suppressed_then_allowed() {
    let harness = Harness::new(
        PageDescription::new("https://d.test/")
            .node(NodeDescription::new("button").id("go").text("Go")),
    );
    let planner = RuleBasedPlanner::from_calls([
        json!({"tap": "Go"}),
        json!({"tap": "Go"}),
        json!({"tap": "Go"}),
        json!({"tool": "done"}),
    ]);
    let agent = harness.agent(planner, LoopConfig::default());
    let report = agent.run("press go repeatedly").await;
    assert_eq!(report.status, TerminalStatus::Done);

    // Tap #2 lands inside the dedup window with no page movement and is
    // suppressed; tap #3 runs after the window has elapsed. Each executed
    // full-mode tap clicks twice (synthetic + native fallback).
    let sim = harness.page();
    let button = sim.node_by_dom_id("go").unwrap();
    assert_eq!(sim.click_count(button), 4);
    assert!(report
        .history
        .iter()
        .any(|h| h.summary.contains("suppressed")));
}

#[tokio::test(start_paused = true)]
async fn three_identical_calls_trigger_one_corrective_action() {
    let harness = Harness::new(
        PageDescription::new("https://l.test/").node(
            NodeDescription::new("p")
                .text("long page")
                .bbox(0.0, 0.0, 200.0, 4000.0),
        ),
    );
    // Distinct-enough cadence that dedup lets them through (quick window),
    // but identical calls that the loop detector counts.
    let planner = RuleBasedPlanner::from_calls([
        json!({"tool": "scroll", "args": {"to": "up", "amount": 50.0}}),
        json!({"tool": "scroll", "args": {"to": "up", "amount": 50.0}}),
        json!({"tool": "scroll", "args": {"to": "up", "amount": 50.0}}),
        json!({"tool": "done"}),
    ]);
    let agent = harness.agent(planner, LoopConfig::default());
    let report = agent.run("scroll around").await;

    assert_eq!(report.status, TerminalStatus::Done);
    let markers: Vec<_> = report
        .history
        .iter()
        .filter(|h| h.summary.contains("loop detected"))
        .collect();
    assert_eq!(markers.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn step_budget_bounds_the_run() {
    let harness = Harness::new(
        PageDescription::new("https://s.test/").node(
            NodeDescription::new("p")
                .text("tall")
                .bbox(0.0, 0.0, 100.0, 5000.0),
        ),
    );
    let calls: Vec<_> = (1..=10)
        .map(|n| json!({"tool": "scroll", "args": {"to": "down", "amount": (n * 10) as f64}}))
        .collect();
    let planner = RuleBasedPlanner::from_calls(calls);
    let config = LoopConfig {
        max_steps: 4,
        ..Default::default()
    };
    let agent = harness.agent(planner, config);
    let report = agent.run("keep scrolling").await;
    assert_eq!(report.status, TerminalStatus::StepLimit);
    assert_eq!(report.steps, 4);
}

#[tokio::test(start_paused = true)]
async fn a_new_tab_side_effect_moves_the_run_target() {
    let harness = Harness::new(
        PageDescription::new("https://a.test/").node(
            NodeDescription::new("a")
                .text("External docs")
                .attr("href", "https://ext.test/")
                .attr("target", "_blank"),
        ),
    );
    let planner = RuleBasedPlanner::from_calls([
        json!({"tap": "External docs"}),
        json!({"tool": "read_page"}),
        json!({"tool": "done"}),
    ]);
    let agent = harness.agent(planner, LoopConfig::default());
    let report = agent.run("open the external docs").await;

    assert_eq!(report.status, TerminalStatus::Done);
    assert_ne!(harness.controller.current_tab(), harness.tab);
    // The tap entry records the new tab, and the following entries ran
    // against the new tab's URL.
    let tap_entry = report.history.iter().find(|h| h.tool == "tap").unwrap();
    assert!(tap_entry.summary.contains("opened"));
    let read_entry = report
        .history
        .iter()
        .find(|h| h.tool == "read_page")
        .unwrap();
    assert_eq!(read_entry.url, "https://ext.test/");
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_before_the_next_action() {
    let harness = Harness::new(PageDescription::new("https://c.test/"));
    let planner = RuleBasedPlanner::from_calls([json!({"tool": "read_page"})]);
    let agent = harness.agent(planner, LoopConfig::default());
    agent.stop_token().cancel();
    let report = agent.run("anything").await;
    assert_eq!(report.status, TerminalStatus::Stopped);
    assert_eq!(report.steps, 0);
    assert!(report.history.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_step_is_recorded_and_the_run_continues() {
    let harness = Harness::new(
        PageDescription::new("https://f.test/")
            .node(NodeDescription::new("button").id("go").text("Go")),
    );
    let planner = RuleBasedPlanner::from_calls([
        json!({"tap": "Imaginary button"}),
        json!({"tap": "Go"}),
        json!({"tool": "done"}),
    ]);
    let agent = harness.agent(planner, LoopConfig::default());
    let report = agent.run("tap through").await;

    assert_eq!(report.status, TerminalStatus::Done);
    let failed = &report.history[0];
    assert!(!failed.ok);
    assert!(failed.summary.contains("Element not found"));
    let sim = harness.page();
    let button = sim.node_by_dom_id("go").unwrap();
    assert!(sim.click_count(button) >= 1);
}

#[tokio::test(start_paused = true)]
async fn fallback_plan_is_used_and_first_success_activates_it() {
    let harness = Harness::new(
        PageDescription::new("https://p.test/")
            .node(NodeDescription::new("button").id("go").text("Go")),
    );
    let planner = RuleBasedPlanner::from_calls([json!({"tap": "Go"}), json!({"tool": "done"})]);
    let agent = harness.agent(planner, LoopConfig::default());
    let report = agent.run("press go").await;

    assert_eq!(report.plan.subtasks.len(), 3);
    assert_eq!(report.plan.subtasks[0].status, SubtaskStatus::Active);
    assert_eq!(
        Plan::fallback_for_instruction("press go").subtasks[0].title,
        report.plan.subtasks[0].title
    );
}
