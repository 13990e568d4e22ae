//! Scoring policy for the free-text fallback search.
//!
//! The weights and the acceptance threshold are tunable policy, not
//! load-bearing semantics; they are validated by the resolver tests rather
//! than derived from anything.

use page_port::NodeInfo;
use perceiver_dom::signature::normalize;

use crate::types::TextQuery;

pub const EXACT_ID: i32 = 100;
pub const EXACT_TEXT: i32 = 50;
pub const PARTIAL_TEXT: i32 = 20;
pub const EXACT_LABEL: i32 = 40;
pub const PARTIAL_LABEL: i32 = 15;
pub const EXACT_PLACEHOLDER: i32 = 30;
pub const HREF_MATCH: i32 = 30;
pub const ROLE_MATCH: i32 = 10;
pub const TAG_MATCH: i32 = 5;
pub const BUTTONISH_CLASS: i32 = 5;
pub const VIEWPORT_BONUS: i32 = 5;

/// Minimum score a candidate must exceed to be accepted.
pub const MIN_SCORE: i32 = 5;

/// Score one candidate against the query. Returns a negative score for
/// candidates that can never match (kept out of ranking).
pub fn score(info: &NodeInfo, query: &TextQuery, in_viewport: bool) -> i32 {
    let mut total = 0;

    let text = normalize(&info.text);
    let value = normalize(info.value.as_deref().unwrap_or(""));
    let label = normalize(info.label().unwrap_or(""));
    let placeholder = normalize(info.placeholder().unwrap_or(""));
    let id = normalize(info.dom_id().unwrap_or(""));
    let test_id = normalize(info.test_id().unwrap_or(""));
    let href = normalize(info.href().unwrap_or(""));
    let role = normalize(info.role().unwrap_or(""));
    let class = normalize(info.attr("class").unwrap_or(""));

    if let Some(want) = &query.id {
        let want = normalize(want);
        if !want.is_empty() && (id == want || test_id == want) {
            total += EXACT_ID;
        }
    }

    if let Some(want) = &query.text {
        let want = normalize(want);
        if !want.is_empty() {
            if text == want || value == want {
                total += EXACT_TEXT;
            } else if !query.exact && (text.contains(&want) || value.contains(&want)) {
                total += PARTIAL_TEXT;
            }
            if label == want {
                total += EXACT_LABEL;
            } else if !query.exact && !label.is_empty() && label.contains(&want) {
                total += PARTIAL_LABEL;
            }
            if !placeholder.is_empty() && placeholder == want {
                total += EXACT_PLACEHOLDER;
            }
        }
    }

    if let Some(want) = &query.href {
        let want = normalize(want);
        if !want.is_empty() && href.contains(&want) {
            total += HREF_MATCH;
        }
    }
    if let Some(want) = &query.role {
        if role == normalize(want) {
            total += ROLE_MATCH;
        }
    }
    if let Some(want) = &query.tag {
        if info.tag == normalize(want) {
            total += TAG_MATCH;
        }
    }

    if class.contains("btn") || class.contains("button") {
        total += BUTTONISH_CLASS;
    }
    if in_viewport {
        total += VIEWPORT_BONUS;
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_port::{NodeId, NodeInfo, StyleFlags};
    use pagepilot_core_types::Rect;
    use std::collections::HashMap;

    fn info(tag: &str, text: &str, attrs: &[(&str, &str)]) -> NodeInfo {
        NodeInfo {
            node: NodeId(1),
            tag: tag.into(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            text: text.into(),
            value: None,
            bbox: Rect::new(0.0, 0.0, 10.0, 10.0),
            style: StyleFlags::default(),
            child_count: 0,
            content_editable: false,
            disabled: false,
            checked: None,
            selected_index: None,
        }
    }

    fn q(text: &str) -> TextQuery {
        TextQuery {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    #[test]
    fn exact_beats_partial() {
        let exact = info("button", "Submit", &[]);
        let partial = info("button", "Submit order now", &[]);
        assert!(score(&exact, &q("Submit"), false) > score(&partial, &q("Submit"), false));
    }

    #[test]
    fn exact_flag_disables_partial_credit() {
        let partial = info("button", "Submit order now", &[]);
        let mut query = q("Submit");
        query.exact = true;
        assert_eq!(score(&partial, &query, false), 0);
    }

    #[test]
    fn label_and_placeholder_contribute() {
        let labeled = info("input", "", &[("aria-label", "Search")]);
        let hinted = info("input", "", &[("placeholder", "Search")]);
        assert_eq!(score(&labeled, &q("Search"), false), EXACT_LABEL);
        assert_eq!(score(&hinted, &q("Search"), false), EXACT_PLACEHOLDER);
    }

    #[test]
    fn id_match_dominates() {
        let by_id = info("div", "", &[("id", "login")]);
        let by_text = info("button", "login", &[]);
        let query = TextQuery {
            id: Some("login".into()),
            text: Some("login".into()),
            ..Default::default()
        };
        assert!(score(&by_id, &query, false) > score(&by_text, &query, false));
    }
}
