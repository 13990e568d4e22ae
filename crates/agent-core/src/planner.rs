//! The planner boundary.
//!
//! The real planner is a remote text-completion call owned by a collaborator;
//! the core only defines the contract and ships a deterministic rule-based
//! implementation for the demo harness and integration tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use page_port::PageState;
use parking_lot::Mutex;
use perceiver_dom::ElementDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::AgentError;
use crate::history::HistoryEntry;
use crate::plan::{Plan, SubtaskUpdate};

/// Everything the loop hands the planner for one step.
pub struct PlannerContext<'a> {
    pub instruction: &'a str,
    pub elements: &'a [ElementDescriptor],
    pub history: &'a [HistoryEntry],
    pub plan: &'a Plan,
    pub page: &'a PageState,
}

/// One planner turn: an optional thought, the raw call (normalized by the
/// loop), and subtask updates applied only after the call succeeds.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlannerDecision {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    pub call: Value,
    #[serde(default)]
    pub subtask_updates: Vec<SubtaskUpdate>,
}

impl PlannerDecision {
    pub fn call(call: Value) -> Self {
        Self {
            thought: None,
            call,
            subtask_updates: Vec::new(),
        }
    }
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn decide(&self, ctx: &PlannerContext<'_>) -> Result<PlannerDecision, AgentError>;
}

/// Deterministic planner: plays a scripted decision sequence, then `done`.
pub struct RuleBasedPlanner {
    script: Mutex<VecDeque<PlannerDecision>>,
}

impl RuleBasedPlanner {
    pub fn scripted(decisions: impl IntoIterator<Item = PlannerDecision>) -> Self {
        Self {
            script: Mutex::new(decisions.into_iter().collect()),
        }
    }

    pub fn from_calls(calls: impl IntoIterator<Item = Value>) -> Self {
        Self::scripted(calls.into_iter().map(PlannerDecision::call))
    }

    /// Derive a small script from the instruction text: navigate to the
    /// first URL-looking token, search for a quoted/`search for` phrase,
    /// then read the page.
    pub fn for_instruction(instruction: &str) -> Self {
        let mut calls = Vec::new();
        if let Some(url) = instruction
            .split_whitespace()
            .find(|token| token.contains('.') && !token.ends_with('.') && !token.contains("..."))
        {
            let trimmed = url.trim_matches(|c: char| c == ',' || c == ';' || c == ')');
            calls.push(json!({ "navigate": trimmed }));
        }
        let lower = instruction.to_lowercase();
        if let Some(rest) = lower.strip_prefix("search for ") {
            calls.push(json!({ "search": { "query": rest.trim(), "new_tab": false } }));
        }
        calls.push(json!({ "tool": "read_page" }));
        Self::from_calls(calls)
    }
}

#[async_trait]
impl Planner for RuleBasedPlanner {
    async fn decide(&self, _ctx: &PlannerContext<'_>) -> Result<PlannerDecision, AgentError> {
        Ok(self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| PlannerDecision::call(json!({ "tool": "done" }))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_port::{PageState, ReadyState};
    use pagepilot_core_types::{Point, Rect};

    fn ctx_parts() -> (Plan, PageState) {
        (
            Plan::fallback_for_instruction("x"),
            PageState {
                url: "https://p.test/".into(),
                title: String::new(),
                ready: ReadyState::Complete,
                scroll: Point::default(),
                viewport: Rect::new(0.0, 0.0, 1280.0, 720.0),
                mutation_count: 0,
                selected_text: String::new(),
                active_element: None,
            },
        )
    }

    #[tokio::test]
    async fn scripted_planner_plays_then_finishes() {
        let planner = RuleBasedPlanner::from_calls([json!({"tap": "Go"})]);
        let (plan, page) = ctx_parts();
        let ctx = PlannerContext {
            instruction: "x",
            elements: &[],
            history: &[],
            plan: &plan,
            page: &page,
        };
        let first = planner.decide(&ctx).await.unwrap();
        assert_eq!(first.call, json!({"tap": "Go"}));
        let second = planner.decide(&ctx).await.unwrap();
        assert_eq!(second.call, json!({"tool": "done"}));
    }

    #[tokio::test]
    async fn instruction_with_a_url_navigates_first() {
        let planner = RuleBasedPlanner::for_instruction("open news.ycombinator.com and read it");
        let (plan, page) = ctx_parts();
        let ctx = PlannerContext {
            instruction: "x",
            elements: &[],
            history: &[],
            plan: &plan,
            page: &page,
        };
        let first = planner.decide(&ctx).await.unwrap();
        assert_eq!(first.call, json!({"navigate": "news.ycombinator.com"}));
    }
}
