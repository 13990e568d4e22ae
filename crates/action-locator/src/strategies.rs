//! Individual resolution strategies.
//!
//! Each strategy answers "which node, right now" from one kind of hint.
//! Visibility gating and handle minting happen in the resolver.

use page_port::{NodeId, NodeInfo, PageDriver};
use pagepilot_core_types::Rect;
use perceiver_dom::signature::normalize;

use crate::errors::LocatorError;
use crate::score::{score, MIN_SCORE};
use crate::types::TextQuery;

pub async fn by_selector(
    driver: &dyn PageDriver,
    selector: &str,
) -> Result<Vec<NodeId>, LocatorError> {
    match driver.query_selector(selector).await {
        Ok(nodes) => Ok(nodes),
        // A malformed caller-supplied selector is a miss, not a failure.
        Err(page_port::PageError::BadSelector(_)) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

pub async fn by_path(driver: &dyn PageDriver, path: &str) -> Result<Vec<NodeId>, LocatorError> {
    match driver.query_path(path).await {
        Ok(nodes) => Ok(nodes),
        Err(page_port::PageError::BadPath(_)) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

pub async fn by_dom_id(
    driver: &dyn PageDriver,
    id: &str,
) -> Result<Option<NodeId>, LocatorError> {
    Ok(driver.element_by_dom_id(id).await?)
}

/// Match against the known test-id attribute variants.
pub fn by_test_id(candidates: &[NodeInfo], value: &str) -> Option<NodeId> {
    let want = normalize(value);
    candidates
        .iter()
        .find(|info| {
            info.test_id()
                .map(|v| normalize(v) == want)
                .unwrap_or(false)
        })
        .map(|info| info.node)
}

/// Literal href match: exact first, then substring.
pub fn by_href(candidates: &[NodeInfo], href: &str) -> Option<NodeId> {
    let want = normalize(href);
    if want.is_empty() {
        return None;
    }
    if let Some(hit) = candidates
        .iter()
        .find(|info| info.href().map(|h| normalize(h) == want).unwrap_or(false))
    {
        return Some(hit.node);
    }
    candidates
        .iter()
        .find(|info| {
            info.href()
                .map(|h| normalize(h).contains(&want))
                .unwrap_or(false)
        })
        .map(|info| info.node)
}

/// Scored search over the interactive candidates. Returns acceptable hits
/// ordered best-first (score, then in-viewport, then document order).
pub fn by_text(candidates: &[NodeInfo], query: &TextQuery, viewport: &Rect) -> Vec<(NodeId, i32)> {
    let mut scored: Vec<(usize, NodeId, i32, bool)> = candidates
        .iter()
        .enumerate()
        .filter_map(|(order, info)| {
            let in_viewport = info.bbox.intersects(viewport);
            let s = score(info, query, in_viewport);
            if s > MIN_SCORE {
                Some((order, info.node, s, in_viewport))
            } else {
                None
            }
        })
        .collect();
    scored.sort_by(|a, b| {
        b.2.cmp(&a.2)
            .then(b.3.cmp(&a.3))
            .then(a.0.cmp(&b.0))
    });
    scored.into_iter().map(|(_, node, s, _)| (node, s)).collect()
}
