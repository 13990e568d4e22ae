//! Plan and subtask state machine.
//!
//! A plan is an ordered subtask list that is never reordered; statuses only
//! move forward. Planner-supplied updates are applied by the loop after the
//! associated tool call is confirmed ok, never speculatively.

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    Active,
    Completed,
    Skipped,
    Failed,
}

impl SubtaskStatus {
    fn rank(self) -> u8 {
        match self {
            SubtaskStatus::Pending => 0,
            SubtaskStatus::Active => 1,
            SubtaskStatus::Completed | SubtaskStatus::Skipped | SubtaskStatus::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }

    /// Transitions move strictly forward; there is no way back from a
    /// terminal status, and active never returns to pending.
    pub fn can_become(self, next: SubtaskStatus) -> bool {
        next.rank() > self.rank()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub title: String,
    pub status: SubtaskStatus,
}

impl Subtask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: SubtaskStatus::Pending,
        }
    }
}

/// A status change the planner (or the loop heuristic) wants applied.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubtaskUpdate {
    pub index: usize,
    pub status: SubtaskStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub subtasks: Vec<Subtask>,
}

impl Plan {
    pub fn new<T: Into<String>>(titles: impl IntoIterator<Item = T>) -> Self {
        Self {
            subtasks: titles.into_iter().map(Subtask::new).collect(),
        }
    }

    /// Generic three-step plan used when the planner supplies none.
    pub fn fallback_for_instruction(instruction: &str) -> Self {
        let goal: String = instruction.split_whitespace().collect::<Vec<_>>().join(" ");
        let goal = goal.chars().take(60).collect::<String>();
        Self::new([
            "Open the relevant page".to_string(),
            "Locate the target content".to_string(),
            format!("Complete: {goal}"),
        ])
    }

    /// Apply one update, enforcing forward-only transitions. Returns whether
    /// anything changed.
    pub fn apply(&mut self, update: &SubtaskUpdate) -> bool {
        let Some(subtask) = self.subtasks.get_mut(update.index) else {
            debug!(index = update.index, "subtask update out of range");
            return false;
        };
        if !subtask.status.can_become(update.status) {
            debug!(
                index = update.index,
                from = ?subtask.status,
                to = ?update.status,
                "rejected backwards subtask transition"
            );
            return false;
        }
        subtask.status = update.status;
        true
    }

    /// Loop heuristic: the first successful non-trivial action marks the
    /// earliest pending subtask active.
    pub fn activate_first_pending(&mut self) -> Option<usize> {
        if self
            .subtasks
            .iter()
            .any(|s| s.status == SubtaskStatus::Active)
        {
            return None;
        }
        let index = self
            .subtasks
            .iter()
            .position(|s| s.status == SubtaskStatus::Pending)?;
        self.subtasks[index].status = SubtaskStatus::Active;
        Some(index)
    }

    pub fn is_complete(&self) -> bool {
        !self.subtasks.is_empty() && self.subtasks.iter().all(|s| s.status.is_terminal())
    }
}
