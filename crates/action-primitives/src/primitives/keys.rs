//! Focus, key press, and form submission mechanics.

use page_port::{KeyModifiers, KeyPhase, NodeId, PageDriver, SyntheticEvent};
use tracing::debug;

use crate::errors::ActionError;
use crate::types::{PressReport, SubmitReport};

pub async fn focus(driver: &dyn PageDriver, node: NodeId) -> Result<(), ActionError> {
    let info = driver.node_info(node).await?;
    let viewport = driver.page_state().await?.viewport;
    if !info.bbox.intersects(&viewport) {
        driver.scroll_into_view(node).await?;
    }
    driver.focus(node).await?;
    Ok(())
}

/// Press a key on a node. `Enter` additionally attempts form submission via
/// the requestSubmit -> submit-button click -> form.submit() chain.
pub async fn press(
    driver: &dyn PageDriver,
    node: NodeId,
    key: &str,
    modifiers: &KeyModifiers,
) -> Result<PressReport, ActionError> {
    if key.trim().is_empty() {
        return Err(ActionError::InvalidArgs("Invalid key".to_string()));
    }
    for phase in [KeyPhase::Down, KeyPhase::Press, KeyPhase::Up] {
        driver
            .dispatch(
                node,
                SyntheticEvent::Key {
                    phase,
                    key: key.to_string(),
                    modifiers: *modifiers,
                },
            )
            .await?;
    }

    let mut submitted = false;
    if key.eq_ignore_ascii_case("enter") {
        submitted = submit_from(driver, node).await?;
    }
    Ok(PressReport {
        key: key.to_string(),
        submitted,
    })
}

/// Submit the form owning `node` (or the node itself when it is a form).
pub async fn submit(driver: &dyn PageDriver, node: NodeId) -> Result<SubmitReport, ActionError> {
    let submitted = submit_from(driver, node).await?;
    Ok(SubmitReport { submitted })
}

/// The submission fallback chain. Returns whether anything was submitted.
async fn submit_from(driver: &dyn PageDriver, node: NodeId) -> Result<bool, ActionError> {
    if let Some(form) = driver.form_of(node).await? {
        if driver.request_submit(form).await? {
            debug!(form = ?form, "submitted via requestSubmit");
            return Ok(true);
        }
        if let Some(button) = find_submit_button(driver, form).await? {
            driver.native_click(button).await?;
            debug!(form = ?form, button = ?button, "submitted via submit button");
            return Ok(true);
        }
        driver.submit_form(form).await?;
        debug!(form = ?form, "submitted via form.submit()");
        return Ok(true);
    }
    // No owning form: fall back to any submit button on the page.
    let root = driver.root().await?;
    if let Some(button) = find_submit_button(driver, root).await? {
        driver.native_click(button).await?;
        return Ok(true);
    }
    Ok(false)
}

/// First `button[type=submit]` / `input[type=submit]` in a subtree.
async fn find_submit_button(
    driver: &dyn PageDriver,
    scope: NodeId,
) -> Result<Option<NodeId>, ActionError> {
    let mut stack = vec![scope];
    while let Some(node) = stack.pop() {
        let info = match driver.node_info(node).await {
            Ok(info) => info,
            Err(page_port::PageError::NodeGone(_)) => continue,
            Err(e) => return Err(e.into()),
        };
        if node != scope
            && matches!(info.tag.as_str(), "button" | "input")
            && info.attr("type") == Some("submit")
        {
            return Ok(Some(node));
        }
        let mut below = driver.children(node).await?;
        below.reverse();
        stack.extend(below);
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_port::sim::{NodeDescription, PageDescription, SimPage, SubmitVia, Recorded};

    fn form_page(no_request_submit: bool, with_button: bool) -> SimPage {
        let mut form = NodeDescription::new("form").id("f");
        if no_request_submit {
            form = form.attr("data-no-request-submit", "1");
        }
        form = form.child(NodeDescription::new("input").id("q").attr("name", "q"));
        if with_button {
            form = form.child(
                NodeDescription::new("button")
                    .id("send")
                    .attr("type", "submit")
                    .text("Send"),
            );
        }
        SimPage::new(PageDescription::new("https://k.test/").node(form))
    }

    #[tokio::test]
    async fn empty_key_is_invalid() {
        let page = form_page(false, false);
        let node = page.node_by_dom_id("q").unwrap();
        let err = press(&page, node, "  ", &KeyModifiers::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidArgs(_)));
    }

    #[tokio::test]
    async fn enter_prefers_request_submit() {
        let page = form_page(false, true);
        let node = page.node_by_dom_id("q").unwrap();
        let report = press(&page, node, "Enter", &KeyModifiers::default())
            .await
            .unwrap();
        assert!(report.submitted);
        assert!(page.recorded().iter().any(|r| matches!(
            r,
            Recorded::Submitted {
                via: SubmitVia::RequestSubmit,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn enter_falls_back_to_submit_button() {
        let page = form_page(true, true);
        let node = page.node_by_dom_id("q").unwrap();
        press(&page, node, "Enter", &KeyModifiers::default())
            .await
            .unwrap();
        let button = page.node_by_dom_id("send").unwrap();
        assert_eq!(page.click_count(button), 1);
        assert!(page.submit_count() >= 1);
    }

    #[tokio::test]
    async fn enter_falls_back_to_form_submit() {
        let page = form_page(true, false);
        let node = page.node_by_dom_id("q").unwrap();
        let report = press(&page, node, "Enter", &KeyModifiers::default())
            .await
            .unwrap();
        assert!(report.submitted);
        assert!(page.recorded().iter().any(|r| matches!(
            r,
            Recorded::Submitted {
                via: SubmitVia::Submit,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn non_enter_key_does_not_submit() {
        let page = form_page(false, true);
        let node = page.node_by_dom_id("q").unwrap();
        let report = press(&page, node, "Escape", &KeyModifiers::default())
            .await
            .unwrap();
        assert!(!report.submitted);
        assert_eq!(page.submit_count(), 0);
        assert_eq!(
            page.dispatched_names(node),
            vec!["keydown", "keypress", "keyup"]
        );
    }

    #[tokio::test]
    async fn submit_tool_uses_the_same_chain() {
        let page = form_page(false, false);
        let form = page.node_by_dom_id("f").unwrap();
        let report = submit(&page, form).await.unwrap();
        assert!(report.submitted);
    }
}
