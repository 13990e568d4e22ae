//! Visibility oracle: visible / in-viewport / obscured.
//!
//! Pure reads of layout state at call time. Nothing here caches; callers must
//! re-query after any scroll or DOM change.

use page_port::{NodeId, NodeInfo, PageDriver, PageError};
use pagepilot_core_types::{Point, Rect};

use crate::errors::PerceiverError;

/// Corner sample inset for the obscured check, in pixels.
const CORNER_INSET: f64 = 2.0;

/// Visible: not styled away and has a non-empty bounding box.
pub fn info_visible(info: &NodeInfo) -> bool {
    !info.style.display_none
        && !info.style.visibility_hidden
        && !info.style.opacity_zero
        && !info.bbox.is_empty()
}

/// Visible and intersecting the viewport rectangle.
pub fn info_in_viewport(info: &NodeInfo, viewport: &Rect) -> bool {
    info_visible(info) && info.bbox.intersects(viewport)
}

pub async fn is_visible(driver: &dyn PageDriver, node: NodeId) -> Result<bool, PerceiverError> {
    match driver.node_info(node).await {
        Ok(info) => Ok(info_visible(&info)),
        Err(PageError::NodeGone(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub async fn is_in_viewport(
    driver: &dyn PageDriver,
    node: NodeId,
) -> Result<bool, PerceiverError> {
    let info = match driver.node_info(node).await {
        Ok(info) => info,
        Err(PageError::NodeGone(_)) => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let viewport = driver.page_state().await?.viewport;
    Ok(info_in_viewport(&info, &viewport))
}

/// Obscured: every sampled point (center plus two opposite corners) hit-tests
/// to a different pointer-accepting element that neither contains nor is
/// contained by the target. A single unobscured sample point clears the node.
pub async fn is_obscured(driver: &dyn PageDriver, node: NodeId) -> Result<bool, PerceiverError> {
    let info = match driver.node_info(node).await {
        Ok(info) => info,
        Err(PageError::NodeGone(_)) => return Ok(true),
        Err(e) => return Err(e.into()),
    };
    if !info_visible(&info) {
        return Ok(true);
    }
    let viewport = driver.page_state().await?.viewport;
    let b = info.bbox;
    let samples = [
        b.center(),
        Point::new(b.x + CORNER_INSET, b.y + CORNER_INSET),
        Point::new(b.right() - CORNER_INSET, b.bottom() - CORNER_INSET),
    ];
    for point in samples {
        if !point_obscured(driver, node, point, &viewport).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

async fn point_obscured(
    driver: &dyn PageDriver,
    node: NodeId,
    point: Point,
    viewport: &Rect,
) -> Result<bool, PerceiverError> {
    if !viewport.contains(point) {
        return Ok(false);
    }
    let Some(top) = driver.element_at(point).await? else {
        return Ok(false);
    };
    if top == node {
        return Ok(false);
    }
    if driver.contains(node, top).await? || driver.contains(top, node).await? {
        return Ok(false);
    }
    let top_info = driver.node_info(top).await?;
    if top_info.style.pointer_events_none {
        return Ok(false);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_port::sim::{NodeDescription, PageDescription, SimPage};

    #[tokio::test]
    async fn hidden_styles_are_invisible() {
        let page = SimPage::new(
            PageDescription::new("https://v.test/")
                .node(NodeDescription::new("button").id("shown").text("A"))
                .node(NodeDescription::new("button").id("none").text("B").hidden())
                .node(
                    NodeDescription::new("button")
                        .id("clear")
                        .text("C")
                        .transparent(),
                )
                .node(NodeDescription::new("button").id("flat").text("D").bbox(
                    10.0, 200.0, 0.0, 0.0,
                )),
        );
        for (id, expect) in [("shown", true), ("none", false), ("clear", false), ("flat", false)] {
            let node = page.node_by_dom_id(id).unwrap();
            assert_eq!(is_visible(&page, node).await.unwrap(), expect, "{id}");
        }
    }

    #[tokio::test]
    async fn below_fold_is_visible_but_out_of_viewport() {
        let page = SimPage::new(
            PageDescription::new("https://v.test/").node(
                NodeDescription::new("button")
                    .id("deep")
                    .text("Down")
                    .bbox(10.0, 5000.0, 100.0, 30.0),
            ),
        );
        let node = page.node_by_dom_id("deep").unwrap();
        assert!(is_visible(&page, node).await.unwrap());
        assert!(!is_in_viewport(&page, node).await.unwrap());
        page.scroll_into_view(node).await.unwrap();
        assert!(is_in_viewport(&page, node).await.unwrap());
    }

    #[tokio::test]
    async fn own_center_hit_means_not_obscured() {
        let page = SimPage::new(
            PageDescription::new("https://v.test/")
                .node(NodeDescription::new("button").id("go").text("Go").bbox(
                    10.0, 10.0, 100.0, 30.0,
                )),
        );
        let node = page.node_by_dom_id("go").unwrap();
        assert!(!is_obscured(&page, node).await.unwrap());
    }

    #[tokio::test]
    async fn full_cover_obscures_partial_cover_does_not() {
        let covered = SimPage::new(
            PageDescription::new("https://v.test/")
                .node(NodeDescription::new("button").id("go").text("Go").bbox(
                    10.0, 10.0, 100.0, 30.0,
                ))
                .node(NodeDescription::new("div").bbox(0.0, 0.0, 400.0, 400.0)),
        );
        let node = covered.node_by_dom_id("go").unwrap();
        assert!(is_obscured(&covered, node).await.unwrap());

        // Overlay misses the bottom-right corner sample.
        let partial = SimPage::new(
            PageDescription::new("https://v.test/")
                .node(NodeDescription::new("button").id("go").text("Go").bbox(
                    10.0, 10.0, 100.0, 30.0,
                ))
                .node(NodeDescription::new("div").bbox(0.0, 0.0, 60.0, 25.0)),
        );
        let node = partial.node_by_dom_id("go").unwrap();
        assert!(!is_obscured(&partial, node).await.unwrap());
    }

    #[tokio::test]
    async fn pointer_transparent_cover_does_not_obscure() {
        let page = SimPage::new(
            PageDescription::new("https://v.test/")
                .node(NodeDescription::new("button").id("go").text("Go").bbox(
                    10.0, 10.0, 100.0, 30.0,
                ))
                .node(
                    NodeDescription::new("div")
                        .bbox(0.0, 0.0, 400.0, 400.0)
                        .pointer_events_none(),
                ),
        );
        let node = page.node_by_dom_id("go").unwrap();
        assert!(!is_obscured(&page, node).await.unwrap());
    }
}
