//! Capped action history: planner context and the raw material for dedup and
//! loop detection.

use std::collections::VecDeque;

use action_flow::{ActionResult, Outcome, ToolCall};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Characters kept per string when trimming args for history.
const ARG_MAX: usize = 120;

/// Entries serialized into planner context.
pub const PLANNER_WINDOW: usize = 20;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub tool: String,
    pub args: Value,
    pub ok: bool,
    pub summary: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn for_call(call: &ToolCall, result: &ActionResult, url: impl Into<String>) -> Self {
        Self {
            tool: call.tool_name().to_string(),
            args: trimmed_args(call),
            ok: result.ok,
            summary: summarize(result),
            url: url.into(),
            timestamp: Utc::now(),
        }
    }

    /// A loop-internal note (dedup suppression, loop detection, planner
    /// failure) the planner should see.
    pub fn marker(tool: &str, summary: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            tool: tool.to_string(),
            args: Value::Null,
            ok: false,
            summary: summary.into(),
            url: url.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only ring buffer; oldest entries drop first.
#[derive(Clone, Debug)]
pub struct History {
    cap: usize,
    entries: VecDeque<HistoryEntry>,
}

impl History {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// The slice the planner sees.
    pub fn for_planner(&self) -> Vec<HistoryEntry> {
        self.entries
            .iter()
            .rev()
            .take(PLANNER_WINDOW)
            .rev()
            .cloned()
            .collect()
    }
}

/// Serialize the call's args with long strings truncated.
fn trimmed_args(call: &ToolCall) -> Value {
    let serialized = serde_json::to_value(call).unwrap_or(Value::Null);
    let args = serialized.get("args").cloned().unwrap_or(Value::Null);
    trim_value(args)
}

fn trim_value(value: Value) -> Value {
    match value {
        Value::String(s) => {
            if s.chars().count() > ARG_MAX {
                let mut trimmed: String = s.chars().take(ARG_MAX).collect();
                trimmed.push('…');
                Value::String(trimmed)
            } else {
                Value::String(s)
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(trim_value).collect()),
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, trim_value(v))).collect())
        }
        other => other,
    }
}

/// One-line result description for planner context.
pub fn summarize(result: &ActionResult) -> String {
    if !result.ok {
        let reason = result.error.clone().unwrap_or_else(|| "failed".to_string());
        return if result.verify_failed {
            format!("verification failed: {reason}")
        } else {
            reason
        };
    }
    let suffix = result
        .new_tab_id
        .map(|tab| format!(" (opened {tab})"))
        .unwrap_or_default();
    let base = match &result.outcome {
        Some(Outcome::Clicked { overlay: true }) => "clicked via overlay".to_string(),
        Some(Outcome::Clicked { overlay: false }) => "clicked".to_string(),
        Some(Outcome::Typed { length }) => format!("typed {length} chars"),
        Some(Outcome::Focused) => "focused".to_string(),
        Some(Outcome::Submitted { submitted }) => {
            if *submitted {
                "submitted".to_string()
            } else {
                "no form to submit".to_string()
            }
        }
        Some(Outcome::Selected { index, text, .. }) => {
            format!("selected option {index} '{text}'")
        }
        Some(Outcome::Checked { checked }) => format!("checked={checked}"),
        Some(Outcome::Pressed { key, submitted }) => {
            if *submitted {
                format!("pressed {key}, form submitted")
            } else {
                format!("pressed {key}")
            }
        }
        Some(Outcome::Scrolled) => "scrolled".to_string(),
        Some(Outcome::Navigated { url }) => format!("navigated to {url}"),
        Some(Outcome::Opened { tab, url }) => format!("opened {tab} at {url}"),
        Some(Outcome::Switched { tab }) => format!("switched to {tab}"),
        Some(Outcome::SearchOpened { url, engine }) => format!("searched via {engine}: {url}"),
        Some(Outcome::Waited { ms }) => format!("waited {ms}ms"),
        Some(Outcome::PageText { text }) => {
            format!("read {} chars of page text", text.chars().count())
        }
        Some(Outcome::Copied { length }) => format!("copied {length} chars"),
        Some(Outcome::Pasted { length }) => format!("pasted {length} chars"),
        Some(Outcome::Finished) => "done".to_string(),
        None => "ok".to_string(),
    };
    format!("{base}{suffix}")
}
