//! Step pipeline: snapshot → plan → normalize → dedup → loop-check →
//! execute → record → advance.

use std::sync::Arc;

use action_flow::{
    ActionResult, Controller, Outcome, ScrollArgs, ScrollDestination, ToolCall,
};
use action_primitives::ActionError;
use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent_loop::config::LoopConfig;
use crate::agent_loop::types::{RunReport, TerminalStatus};
use crate::convert::normalize;
use crate::history::HistoryEntry;
use crate::plan::Plan;
use crate::planner::{Planner, PlannerContext};
use crate::session::RunSession;

/// The bounded control loop: one instruction in, one verified run out.
///
/// Single-threaded cooperative: every unit of work is an awaited step, and
/// no two actions ever run concurrently against the same page. Cancellation
/// is honored before starting the next action, never mid-way through one.
pub struct AgentLoop {
    controller: Arc<Controller>,
    planner: Arc<dyn Planner>,
    config: LoopConfig,
    cancel: CancellationToken,
}

impl AgentLoop {
    pub fn new(controller: Arc<Controller>, planner: Arc<dyn Planner>, config: LoopConfig) -> Self {
        Self {
            controller,
            planner,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Handle callers use to request a cooperative stop.
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self, instruction: &str) -> RunReport {
        info!(instruction, "starting run");
        self.controller.begin_run();
        let mut session = RunSession::new(
            instruction,
            self.config.history_cap,
            self.config.dedup.clone(),
        );
        let mut plan = Plan::fallback_for_instruction(instruction);
        let status = self.drive(&mut session, &mut plan).await;
        info!(status = ?status, steps = session.steps, run = %session.run_id, "run finished");
        RunReport {
            run_id: session.run_id.clone(),
            instruction: session.instruction.clone(),
            status,
            steps: session.steps,
            started_at: session.started_at,
            finished_at: Utc::now(),
            history: session.history.entries(),
            plan,
        }
    }

    async fn drive(&self, session: &mut RunSession, plan: &mut Plan) -> TerminalStatus {
        loop {
            if self.cancel.is_cancelled() || session.autostop {
                return TerminalStatus::Stopped;
            }
            if session.steps >= self.config.max_steps {
                return TerminalStatus::StepLimit;
            }
            session.steps += 1;

            // Snapshot the page for planner context.
            let elements = match self.controller.snapshot_elements().await {
                Ok(elements) => elements,
                Err(ActionError::TabLost(tab)) => {
                    warn!(tab = %tab, "snapshot lost the tab");
                    return TerminalStatus::TabLost;
                }
                Err(err) => {
                    warn!(error = %err, "snapshot failed");
                    session
                        .history
                        .push(HistoryEntry::marker("snapshot", err.to_string(), ""));
                    tokio::time::sleep(self.config.settle).await;
                    continue;
                }
            };
            let page = match self.controller.page_state().await {
                Ok(state) => state,
                Err(ActionError::TabLost(tab)) => {
                    warn!(tab = %tab, "page state lost the tab");
                    return TerminalStatus::TabLost;
                }
                Err(err) => {
                    warn!(error = %err, "page state read failed");
                    session
                        .history
                        .push(HistoryEntry::marker("snapshot", err.to_string(), ""));
                    tokio::time::sleep(self.config.settle).await;
                    continue;
                }
            };

            // One planner turn.
            let recent = session.history.for_planner();
            let decision = match self
                .planner
                .decide(&PlannerContext {
                    instruction: &session.instruction,
                    elements: &elements,
                    history: &recent,
                    plan,
                    page: &page,
                })
                .await
            {
                Ok(decision) => decision,
                Err(err) => {
                    warn!(error = %err, "planner failed; stopping run");
                    session
                        .history
                        .push(HistoryEntry::marker("plan", err.to_string(), &page.url));
                    return TerminalStatus::Stopped;
                }
            };
            if let Some(thought) = &decision.thought {
                debug!(thought = %thought, "planner thought");
            }

            let calls = match normalize(&decision.call) {
                Ok(calls) => calls,
                Err(err) => {
                    warn!(error = %err, "planner output did not normalize");
                    session
                        .history
                        .push(HistoryEntry::marker("plan", err.to_string(), &page.url));
                    tokio::time::sleep(self.config.settle).await;
                    continue;
                }
            };

            for call in calls {
                if self.cancel.is_cancelled() || session.autostop {
                    return TerminalStatus::Stopped;
                }

                if let ToolCall::Done = call {
                    for update in &decision.subtask_updates {
                        plan.apply(update);
                    }
                    session.history.push(HistoryEntry::for_call(
                        &call,
                        &ActionResult::ok(Outcome::Finished),
                        &page.url,
                    ));
                    return TerminalStatus::Done;
                }

                let state = self.controller.page_state().await.ok();
                let url = state
                    .as_ref()
                    .map(|s| s.url.clone())
                    .unwrap_or_else(|| page.url.clone());
                let mutations = state.as_ref().map(|s| s.mutation_count).unwrap_or(0);

                if session.dedup.should_suppress(&call, Instant::now(), mutations) {
                    debug!(tool = call.tool_name(), "duplicate call suppressed");
                    session.history.push(HistoryEntry::marker(
                        call.tool_name(),
                        "duplicate call suppressed inside the dedup window",
                        &url,
                    ));
                    continue;
                }

                if session.loops.observe(&call) {
                    warn!(tool = call.tool_name(), "loop detected; injecting corrective scroll");
                    session.history.push(HistoryEntry::marker(
                        "loop",
                        "loop detected; injected a corrective scroll",
                        &url,
                    ));
                    let corrective = ToolCall::Scroll(ScrollArgs {
                        to: Some(ScrollDestination::Down),
                        ..Default::default()
                    });
                    let result = self.controller.execute(&corrective).await;
                    session
                        .history
                        .push(HistoryEntry::for_call(&corrective, &result, &url));
                    continue;
                }

                if let Some(href) = new_tab_href(&call) {
                    if session.opened_hrefs.contains(&href) {
                        debug!(href = %href, "already opened this run; skipping");
                        session.history.push(HistoryEntry::marker(
                            call.tool_name(),
                            format!("already opened {href} this run; skipped"),
                            &url,
                        ));
                        continue;
                    }
                }

                let result = self.controller.execute(&call).await;
                session.dedup.record(&call, Instant::now(), mutations);

                let after_url = self
                    .controller
                    .page_state()
                    .await
                    .map(|s| s.url)
                    .unwrap_or(url);
                session
                    .history
                    .push(HistoryEntry::for_call(&call, &result, &after_url));

                if result.ok {
                    if is_substantive(&call) {
                        plan.activate_first_pending();
                    }
                    // Planner updates ride on the confirmed call, never
                    // ahead of it.
                    for update in &decision.subtask_updates {
                        plan.apply(update);
                    }
                    if result.new_tab_id.is_some() {
                        if let Some(href) = opened_href(&call) {
                            session.note_opened(href);
                        }
                    }
                }
            }

            tokio::time::sleep(self.config.settle).await;
        }
    }
}

/// Tools that represent progress rather than observation.
fn is_substantive(call: &ToolCall) -> bool {
    !matches!(
        call,
        ToolCall::Wait(_) | ToolCall::Scroll(_) | ToolCall::ReadPage
    )
}

/// URL a call would open in a fresh tab, for the reopen guard.
fn new_tab_href(call: &ToolCall) -> Option<String> {
    match call {
        ToolCall::NewTab(args) => args.url.clone(),
        ToolCall::Navigate(args) if args.blank => args.url.clone(),
        _ => None,
    }
}

/// URL to remember once a call actually produced a new tab.
fn opened_href(call: &ToolCall) -> Option<String> {
    match call {
        ToolCall::NewTab(args) => args.url.clone(),
        ToolCall::Navigate(args) => args.url.clone(),
        ToolCall::Tap(args) => args.target.known_href(),
        _ => None,
    }
}
