//! Click mechanics: full pointer/mouse lifecycle with overlay adaptation.

use std::time::Duration;

use page_port::{
    MousePhase, NodeId, NodeInfo, PageDriver, Point, PointerPhase, SyntheticEvent,
};
use tracing::debug;

use crate::errors::ActionError;
use crate::types::{ClickMode, ClickOptions, ClickReport, NATIVE_FALLBACK_DELAY_MS, SCROLL_SETTLE_MS};

/// Click a resolved node.
///
/// Scrolls it into the viewport center if needed, computes a clamped click
/// point, redirects the synthetic sequence to the topmost element when an
/// overlay owns the point, and finishes with a delayed native `.click()`
/// fallback unless the caller bypassed it. Pre-arms a new-tab expectation
/// when the node (or an ancestor anchor) carries `target="_blank"`.
pub async fn click(
    driver: &dyn PageDriver,
    node: NodeId,
    opts: &ClickOptions,
) -> Result<ClickReport, ActionError> {
    let mut info = driver.node_info(node).await?;
    let viewport = driver.page_state().await?.viewport;
    if !info.bbox.intersects(&viewport) {
        driver.scroll_into_view(node).await?;
        tokio::time::sleep(Duration::from_millis(SCROLL_SETTLE_MS)).await;
        info = driver.node_info(node).await?;
    }

    let expecting_new_tab = new_tab_expectation(driver, &info).await?;
    if expecting_new_tab.is_some() {
        debug!(node = ?node, "click target expected to open a new tab");
    }

    let point = click_point(&info, opts.offset);

    if opts.mode == ClickMode::NativeOnly {
        driver.native_click(node).await?;
        return Ok(ClickReport {
            overlay: false,
            expecting_new_tab,
        });
    }

    // Overlay adaptation: when the true topmost element at the click point
    // is foreign and outside the target's subtree, the synthetic sequence
    // goes to it instead, since that is what a real pointer would hit.
    let mut target = node;
    let mut overlay = false;
    if let Some(top) = driver.element_at(point).await? {
        if top != node && !driver.contains(node, top).await? {
            target = top;
            overlay = true;
            debug!(node = ?node, top = ?top, "click point owned by overlay");
        }
    }

    dispatch_lifecycle(driver, target, node, point).await?;

    if opts.mode == ClickMode::Full {
        tokio::time::sleep(Duration::from_millis(NATIVE_FALLBACK_DELAY_MS)).await;
        driver.native_click(node).await?;
    }

    Ok(ClickReport {
        overlay,
        expecting_new_tab,
    })
}

/// The full event lifecycle frameworks listen for, in order.
async fn dispatch_lifecycle(
    driver: &dyn PageDriver,
    target: NodeId,
    focus_node: NodeId,
    at: Point,
) -> Result<(), ActionError> {
    let pointer = |phase| SyntheticEvent::Pointer { phase, at };
    let mouse = |phase| SyntheticEvent::Mouse { phase, at };

    driver.dispatch(target, pointer(PointerPhase::Over)).await?;
    driver.dispatch(target, mouse(MousePhase::Over)).await?;
    driver.dispatch(target, pointer(PointerPhase::Enter)).await?;
    driver.dispatch(target, mouse(MousePhase::Enter)).await?;
    driver.dispatch(target, pointer(PointerPhase::Down)).await?;
    driver.dispatch(target, mouse(MousePhase::Down)).await?;
    driver.focus(focus_node).await?;
    driver.dispatch(target, pointer(PointerPhase::Up)).await?;
    driver.dispatch(target, mouse(MousePhase::Up)).await?;
    driver.dispatch(target, mouse(MousePhase::Click)).await?;
    Ok(())
}

fn click_point(info: &NodeInfo, offset: Option<(f64, f64)>) -> Point {
    let mut p = info.bbox.center();
    if let Some((dx, dy)) = offset {
        p.x += dx;
        p.y += dy;
    }
    info.bbox.clamp(p)
}

/// Walk self and ancestors for an anchor that opens a new tab.
async fn new_tab_expectation(
    driver: &dyn PageDriver,
    info: &NodeInfo,
) -> Result<Option<String>, ActionError> {
    let mut current = Some(info.clone());
    while let Some(node_info) = current {
        if node_info.tag == "a" {
            let target = node_info.link_target().unwrap_or("");
            if target == "_blank" || target == "_new" {
                return Ok(node_info.href().map(|h| h.to_string()));
            }
        }
        current = match driver.parent(node_info.node).await? {
            Some(parent) => Some(driver.node_info(parent).await?),
            None => None,
        };
    }
    Ok(None)
}
