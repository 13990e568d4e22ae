//! Full-document scan: walk, interactivity predicate, near-duplicate merge,
//! handle assignment.

use page_port::{NodeId, NodeInfo, PageDriver};
use pagepilot_core_types::Rect;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::PerceiverError;
use crate::registry::{Handle, Registry};
use crate::signature::ElementSignature;
use crate::visibility::{info_in_viewport, info_visible};

/// Bounding boxes within this many pixels on each edge are merged.
const DEDUP_TOLERANCE: f64 = 5.0;

/// Hard cap on visited nodes per scan.
const NODE_BUDGET: usize = 20_000;

const INTERACTIVE_TAGS: &[&str] = &[
    "a", "button", "input", "textarea", "select", "details", "summary",
];

const INTERACTIVE_ROLES: &[&str] = &[
    "button", "link", "menuitem", "tab", "checkbox", "radio", "switch", "combobox", "textbox",
];

const GENERIC_TAGS: &[&str] = &["div", "span", "section", "body", "html"];

/// Planner-facing description of one registered element.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub handle: Handle,
    pub tag: String,
    pub text: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    pub bbox: Rect,
    pub in_viewport: bool,
}

/// Fixed interactivity predicate.
pub fn is_interactive(info: &NodeInfo) -> bool {
    let tag_hit = INTERACTIVE_TAGS.contains(&info.tag.as_str());
    let role_hit = info
        .role()
        .map(|r| INTERACTIVE_ROLES.contains(&r))
        .unwrap_or(false);
    let click_hit = info.has_click_handler() || info.tab_index().map(|t| t >= 0).unwrap_or(false);
    let href_hit = info.href().is_some();

    // cursor:pointer counts only for leaf nodes with text, or for
    // non-generic containers; bare pointer divs are decoys.
    let leaf_with_text = info.child_count == 0 && !info.text.trim().is_empty();
    let generic = GENERIC_TAGS.contains(&info.tag.as_str());
    let pointer_hit = info.style.cursor_pointer && (leaf_with_text || !generic);

    tag_hit || role_hit || click_hit || href_hit || pointer_hit
}

/// Walk the document (shadow roots and same-origin frames included,
/// depth-first pre-order) and return snapshots of every visible interactive
/// node, in document order.
pub async fn collect_interactive(
    driver: &dyn PageDriver,
) -> Result<Vec<NodeInfo>, PerceiverError> {
    let root = driver.root().await?;
    let mut stack = vec![root];
    let mut out = Vec::new();
    let mut visited = 0usize;

    while let Some(node) = stack.pop() {
        visited += 1;
        if visited > NODE_BUDGET {
            return Err(PerceiverError::ScanAborted(format!(
                "node budget {NODE_BUDGET} exceeded"
            )));
        }
        let info = match driver.node_info(node).await {
            Ok(info) => info,
            // Mutated out from under the walk; skip the branch.
            Err(page_port::PageError::NodeGone(_)) => continue,
            Err(e) => return Err(e.into()),
        };
        if info_visible(&info) && is_interactive(&info) {
            out.push(info);
        }
        let mut below: Vec<NodeId> = driver.children(node).await?;
        if let Some(frame) = driver.frame_document(node).await? {
            below.push(frame);
        }
        if let Some(shadow) = driver.shadow_root(node).await? {
            below.push(shadow);
        }
        // Reverse so the stack pops in document order.
        for child in below.into_iter().rev() {
            stack.push(child);
        }
    }
    Ok(out)
}

/// Priority used when merging overlapping candidates; higher survives.
fn merge_rank(info: &NodeInfo) -> i32 {
    let mut rank = match info.tag.as_str() {
        "button" => 10,
        "a" => 9,
        "input" | "textarea" | "select" => 8,
        _ => match info.role() {
            Some("button") => 7,
            Some("link") => 6,
            _ => 0,
        },
    };
    if info.child_count == 0 {
        rank += 2;
    }
    if !info.text.trim().is_empty() {
        rank += 1;
    }
    rank
}

/// Merge near-duplicate boxes (icon inside its wrapping button and the like)
/// keeping the highest-priority candidate per group.
fn dedup(candidates: Vec<NodeInfo>) -> Vec<NodeInfo> {
    struct Group {
        rect: Rect,
        members: Vec<NodeInfo>,
    }
    let mut groups: Vec<Group> = Vec::new();
    for info in candidates {
        match groups
            .iter_mut()
            .find(|g| g.rect.near(&info.bbox, DEDUP_TOLERANCE))
        {
            Some(group) => group.members.push(info),
            None => groups.push(Group {
                rect: info.bbox,
                members: vec![info],
            }),
        }
    }
    groups
        .into_iter()
        .filter_map(|mut g| {
            g.members
                .sort_by_key(|info| std::cmp::Reverse(merge_rank(info)));
            g.members.into_iter().next()
        })
        .collect()
}

fn truncate(value: &str, max: usize) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(max)
        .collect()
}

/// Rebuild the registry for a fresh epoch and return the planner-facing
/// element list.
pub async fn scan(
    driver: &dyn PageDriver,
    registry: &Registry,
) -> Result<Vec<ElementDescriptor>, PerceiverError> {
    let epoch = registry.invalidate();
    let viewport = driver.page_state().await?.viewport;
    let survivors = dedup(collect_interactive(driver).await?);

    let mut out = Vec::with_capacity(survivors.len());
    for info in survivors {
        let signature = ElementSignature::from_info(&info);
        let handle = registry.ensure(info.node, &signature);
        let text = if info.text.is_empty() {
            info.value.clone().unwrap_or_default()
        } else {
            info.text.clone()
        };
        out.push(ElementDescriptor {
            handle,
            tag: info.tag.clone(),
            text: truncate(&text, 100),
            label: truncate(info.label().unwrap_or(""), 50),
            role: info.role().map(|s| s.to_string()),
            href: info.href().map(|s| s.to_string()),
            placeholder: info.placeholder().map(|s| s.to_string()),
            bbox: info.bbox,
            in_viewport: info_in_viewport(&info, &viewport),
        });
    }
    debug!(epoch = epoch.0, elements = out.len(), "scan complete");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_port::sim::{NodeDescription, PageDescription, SimPage};

    #[tokio::test]
    async fn predicate_covers_the_interactive_kinds() {
        let page = SimPage::new(
            PageDescription::new("https://s.test/")
                .node(NodeDescription::new("button").text("B"))
                .node(NodeDescription::new("a").attr("href", "/x").text("L"))
                .node(NodeDescription::new("div").attr("role", "button").text("R"))
                .node(NodeDescription::new("div").attr("onclick", "x()").text("C"))
                .node(NodeDescription::new("div").attr("tabindex", "0").text("T"))
                .node(NodeDescription::new("span").cursor_pointer().text("P"))
                .node(NodeDescription::new("p").text("plain paragraph"))
                .node(NodeDescription::new("div").cursor_pointer().child(
                    NodeDescription::new("p").text("generic pointer container"),
                )),
        );
        let found = collect_interactive(&page).await.unwrap();
        let tags: Vec<&str> = found.iter().map(|i| i.tag.as_str()).collect();
        assert_eq!(tags, vec!["button", "a", "div", "div", "div", "span"]);
    }

    #[tokio::test]
    async fn hidden_nodes_are_skipped() {
        let page = SimPage::new(
            PageDescription::new("https://s.test/")
                .node(NodeDescription::new("button").text("shown"))
                .node(NodeDescription::new("button").text("gone").hidden()),
        );
        let found = collect_interactive(&page).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "shown");
    }

    #[tokio::test]
    async fn shadow_and_frame_content_is_reached() {
        let page = SimPage::new(
            PageDescription::new("https://s.test/")
                .node(
                    NodeDescription::new("div")
                        .shadow_child(NodeDescription::new("button").text("in shadow")),
                )
                .node(
                    NodeDescription::new("iframe")
                        .frame_child(NodeDescription::new("a").attr("href", "/f").text("in frame")),
                ),
        );
        let found = collect_interactive(&page).await.unwrap();
        let texts: Vec<&str> = found.iter().map(|i| i.text.as_str()).collect();
        assert!(texts.contains(&"in shadow"));
        assert!(texts.contains(&"in frame"));
    }

    #[tokio::test]
    async fn overlapping_icon_merges_into_its_button() {
        let page = SimPage::new(
            PageDescription::new("https://s.test/").node(
                NodeDescription::new("button")
                    .id("wrap")
                    .text("Send")
                    .bbox(10.0, 10.0, 60.0, 24.0)
                    .child(
                        NodeDescription::new("span")
                            .cursor_pointer()
                            .text("Send")
                            .bbox(12.0, 11.0, 58.0, 23.0),
                    ),
            ),
        );
        let registry = Registry::new();
        let elements = scan(&page, &registry).await.unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].tag, "button");
        assert_eq!(elements[0].handle, Handle(1));
    }

    #[tokio::test]
    async fn rescan_restarts_handles_and_reindexes_signatures() {
        let page = SimPage::new(
            PageDescription::new("https://s.test/")
                .node(NodeDescription::new("button").id("go").text("Go")),
        );
        let registry = Registry::new();
        let first = scan(&page, &registry).await.unwrap();
        assert_eq!(first[0].handle, Handle(1));

        let second = scan(&page, &registry).await.unwrap();
        assert_eq!(second[0].handle, Handle(1));
        assert!(registry.epoch() > crate::registry::Epoch(1));

        let key = ElementSignature {
            tag: Some("button".into()),
            id: Some("go".into()),
            text: Some("Go".into()),
            ..Default::default()
        }
        .canonical_key();
        assert!(registry.handle_by_signature(&key).is_some());
    }
}
