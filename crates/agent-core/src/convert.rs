//! Planner output normalization.
//!
//! The planner's intent arrives in one of several shapes: a canonical
//! `{tool, args}` object, an `{action: ...}` wrapper, an array of calls, or a
//! single-key shorthand like `{"tap": "Login"}`. Everything maps onto the
//! typed [`ToolCall`], including promotion of a compact element descriptor
//! into a durable signature.

use action_flow::ToolCall;
use serde_json::{json, Map, Value};

use crate::errors::AgentError;

/// Normalize one planner decision into an ordered list of tool calls.
pub fn normalize(value: &Value) -> Result<Vec<ToolCall>, AgentError> {
    match value {
        Value::Array(items) => items.iter().map(normalize_one).collect(),
        other => Ok(vec![normalize_one(other)?]),
    }
}

fn normalize_one(value: &Value) -> Result<ToolCall, AgentError> {
    let Value::Object(map) = value else {
        return Err(AgentError::Normalize(preview(value)));
    };

    // Wrapper shapes: {"action": {...}} / {"call": {...}}.
    if map.len() == 1 {
        if let Some(inner) = map.get("action").or_else(|| map.get("call")) {
            if inner.is_object() {
                return normalize_one(inner);
            }
        }
    }

    // Canonical {tool, args}.
    if let Some(tool) = map.get("tool") {
        let tool = tool
            .as_str()
            .ok_or_else(|| AgentError::Normalize(preview(value)))?;
        let args = map.get("args").cloned().unwrap_or_else(|| json!({}));
        return build(tool, args);
    }

    // Single-key shorthand: {"tap": "Login"}, {"wait": 500}, {"type": {...}}.
    if let Some((tool, payload)) = map.iter().next() {
        if map.len() == 1 {
            let args = shorthand_args(tool, payload)?;
            return build(tool, args);
        }
    }

    Err(AgentError::Normalize(preview(value)))
}

/// Loose tool-name aliases planners commonly emit.
fn canonical_tool(tool: &str) -> &str {
    match tool {
        "click" => "tap",
        "fill" | "input" => "type",
        "goto" | "open" => "navigate",
        "key" => "press",
        other => other,
    }
}

fn build(tool: &str, mut args: Value) -> Result<ToolCall, AgentError> {
    let tool = canonical_tool(tool);
    promote_element(&mut args);
    // Unit tools carry no content.
    let wrapped = match tool {
        "done" | "read_page" => json!({ "tool": tool }),
        _ => json!({ "tool": tool, "args": args }),
    };
    serde_json::from_value(wrapped)
        .map_err(|e| AgentError::Normalize(format!("{tool}: {e}")))
}

fn shorthand_args(tool: &str, payload: &Value) -> Result<Value, AgentError> {
    let tool = canonical_tool(tool);
    Ok(match payload {
        Value::Object(_) => payload.clone(),
        Value::String(s) => match tool {
            "type" | "paste" => json!({ "value": s }),
            "navigate" | "new_tab" => json!({ "url": s }),
            "search" => json!({ "query": s }),
            "press" => json!({ "key": s }),
            "select" => json!({ "value": s }),
            "scroll" => json!({ "to": s }),
            "wait" => match s.parse::<u64>() {
                Ok(ms) => json!({ "ms": ms }),
                Err(_) => return Err(AgentError::Normalize(format!("wait: '{s}'"))),
            },
            // Element tools take the string as the visible-text hint.
            _ => json!({ "text": s }),
        },
        Value::Number(n) => match tool {
            "wait" => json!({ "ms": n }),
            "switch_tab" => json!({ "id": n }),
            // A bare number is a registry handle.
            _ => json!({ "handle": n }),
        },
        Value::Null => json!({}),
        other => return Err(AgentError::Normalize(preview(other))),
    })
}

/// Promote a compact element descriptor (`{"element": {...}}`) into the
/// handle + signature fields of the target args, so the reference stays
/// durable across registry rebuilds.
fn promote_element(args: &mut Value) {
    let Some(obj) = args.as_object_mut() else {
        return;
    };
    let Some(element) = obj.remove("element") else {
        return;
    };
    let Some(el) = element.as_object() else {
        return;
    };
    if let Some(handle) = el.get("handle").and_then(Value::as_u64) {
        obj.entry("handle").or_insert(json!(handle));
    }
    let mut signature = Map::new();
    for key in [
        "tag",
        "role",
        "id",
        "text",
        "label",
        "href",
        "placeholder",
        "testid",
    ] {
        if let Some(v) = el.get(key).and_then(Value::as_str) {
            if !v.is_empty() {
                signature.insert(key.to_string(), json!(v));
            }
        }
    }
    if !signature.is_empty() {
        obj.entry("signature").or_insert(Value::Object(signature));
    }
}

fn preview(value: &Value) -> String {
    let rendered = value.to_string();
    rendered.chars().take(160).collect()
}
