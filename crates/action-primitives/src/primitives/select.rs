//! Select and check mechanics: minimal native state mutation plus the event
//! pair a framework expects.

use page_port::{NodeId, PageDriver, SyntheticEvent};
use perceiver_dom::signature::normalize;

use crate::errors::ActionError;
use crate::types::{CheckReport, SelectBy, SelectReport};

/// Choose an option of a `<select>` element.
pub async fn select(
    driver: &dyn PageDriver,
    node: NodeId,
    by: &SelectBy,
) -> Result<SelectReport, ActionError> {
    let info = driver.node_info(node).await?;
    if info.tag != "select" {
        return Err(ActionError::InvalidArgs(format!(
            "select on <{}>",
            info.tag
        )));
    }
    let options = driver.select_options(node).await?;
    let index = match by {
        SelectBy::Index(i) => {
            if *i >= options.len() {
                return Err(ActionError::OptionNotFound(format!(
                    "index {} of {} options",
                    i,
                    options.len()
                )));
            }
            *i
        }
        SelectBy::Value(v) => options
            .iter()
            .position(|o| o.value == *v)
            .ok_or_else(|| ActionError::OptionNotFound(format!("value '{v}'")))?,
        SelectBy::Text(t) => {
            let want = normalize(t);
            options
                .iter()
                .position(|o| normalize(&o.text) == want)
                .ok_or_else(|| ActionError::OptionNotFound(format!("text '{t}'")))?
        }
    };

    driver.set_selected_index(node, index).await?;
    driver.dispatch(node, SyntheticEvent::Input).await?;
    driver.dispatch(node, SyntheticEvent::Change).await?;

    let chosen = &options[index];
    Ok(SelectReport {
        selected: true,
        index,
        text: chosen.text.clone(),
        value: chosen.value.clone(),
    })
}

/// Set a checkbox/radio to the requested state.
pub async fn check(
    driver: &dyn PageDriver,
    node: NodeId,
    desired: bool,
) -> Result<CheckReport, ActionError> {
    let info = driver.node_info(node).await?;
    let checkable_input = info.tag == "input"
        && info
            .attr("type")
            .map(|t| t == "checkbox" || t == "radio")
            .unwrap_or(false);
    let checkable_role = matches!(info.role(), Some("checkbox") | Some("radio") | Some("switch"));
    if !checkable_input && !checkable_role {
        return Err(ActionError::InvalidArgs(format!(
            "check on <{}>",
            info.tag
        )));
    }
    let changed = info.checked != Some(desired);
    driver.set_checked(node, desired).await?;
    if changed {
        driver.dispatch(node, SyntheticEvent::Input).await?;
        driver.dispatch(node, SyntheticEvent::Change).await?;
    }
    Ok(CheckReport {
        checked: desired,
        changed,
    })
}
