//! Typing mechanics for native inputs and contenteditable regions.

use std::time::Duration;

use page_port::{KeyModifiers, KeyPhase, NodeId, PageDriver, SyntheticEvent};
use tracing::debug;

use crate::errors::ActionError;
use crate::types::{TypeMode, TypeOptions, TypeReport, SCROLL_SETTLE_MS};

/// Type `value` into a resolved node.
///
/// Native inputs are written through the platform value setter (the
/// prototype's setter, not the instance property), which is what makes
/// framework-controlled inputs accept the write. Contenteditable regions get
/// range-style insertion instead. A trailing `input` + `change` pair always
/// fires.
pub async fn type_text(
    driver: &dyn PageDriver,
    node: NodeId,
    value: &str,
    opts: &TypeOptions,
) -> Result<TypeReport, ActionError> {
    let info = driver.node_info(node).await?;
    let viewport = driver.page_state().await?.viewport;
    if !info.bbox.intersects(&viewport) {
        driver.scroll_into_view(node).await?;
        tokio::time::sleep(Duration::from_millis(SCROLL_SETTLE_MS)).await;
    }
    driver.focus(node).await?;

    let length = if info.content_editable {
        type_editable(driver, node, value, opts).await?
    } else if matches!(info.tag.as_str(), "input" | "textarea") {
        type_native(driver, node, value, opts, info.value.unwrap_or_default()).await?
    } else {
        return Err(ActionError::InvalidArgs(format!(
            "<{}> does not accept text",
            info.tag
        )));
    };

    driver.dispatch(node, SyntheticEvent::Input).await?;
    driver.dispatch(node, SyntheticEvent::Change).await?;
    Ok(TypeReport { length })
}

async fn type_editable(
    driver: &dyn PageDriver,
    node: NodeId,
    value: &str,
    opts: &TypeOptions,
) -> Result<usize, ActionError> {
    driver
        .insert_editable_text(node, value, opts.mode == TypeMode::Set)
        .await?;
    let after = driver.node_info(node).await?;
    Ok(after.text.chars().count())
}

async fn type_native(
    driver: &dyn PageDriver,
    node: NodeId,
    value: &str,
    opts: &TypeOptions,
    current: String,
) -> Result<usize, ActionError> {
    let base = match opts.mode {
        TypeMode::Set => String::new(),
        TypeMode::Append => current,
    };
    if opts.simulate {
        // Character-by-character: each keystroke grows the value and fires
        // the key/input events a framework expects to observe.
        debug!(node = ?node, chars = value.chars().count(), "simulated typing");
        let mut buffer = base;
        for ch in value.chars() {
            let key = ch.to_string();
            driver
                .dispatch(
                    node,
                    SyntheticEvent::Key {
                        phase: KeyPhase::Down,
                        key: key.clone(),
                        modifiers: KeyModifiers::default(),
                    },
                )
                .await?;
            buffer.push(ch);
            driver.set_value_native(node, &buffer).await?;
            driver.dispatch(node, SyntheticEvent::Input).await?;
            driver
                .dispatch(
                    node,
                    SyntheticEvent::Key {
                        phase: KeyPhase::Up,
                        key,
                        modifiers: KeyModifiers::default(),
                    },
                )
                .await?;
            if opts.per_key_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(opts.per_key_delay_ms)).await;
            }
        }
        Ok(buffer.chars().count())
    } else {
        let target = format!("{base}{value}");
        driver.set_value_native(node, &target).await?;
        Ok(target.chars().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_port::sim::{NodeDescription, PageDescription, SimPage};

    fn input_page() -> SimPage {
        SimPage::new(
            PageDescription::new("https://t.test/")
                .node(NodeDescription::new("input").id("q").attr("name", "q"))
                .node(NodeDescription::new("div").id("compose").editable())
                .node(NodeDescription::new("button").id("nope").text("x")),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn set_mode_round_trips() {
        let page = input_page();
        let node = page.node_by_dom_id("q").unwrap();
        let report = type_text(&page, node, "hello world", &TypeOptions::default())
            .await
            .unwrap();
        assert_eq!(report.length, 11);
        assert_eq!(page.value_of(node).as_deref(), Some("hello world"));
    }

    #[tokio::test(start_paused = true)]
    async fn append_mode_concatenates() {
        let page = input_page();
        let node = page.node_by_dom_id("q").unwrap();
        type_text(&page, node, "foo", &TypeOptions::default())
            .await
            .unwrap();
        let opts = TypeOptions {
            mode: TypeMode::Append,
            ..Default::default()
        };
        type_text(&page, node, "bar", &opts).await.unwrap();
        assert_eq!(page.value_of(node).as_deref(), Some("foobar"));
    }

    #[tokio::test(start_paused = true)]
    async fn set_mode_replaces_existing_value() {
        let page = input_page();
        let node = page.node_by_dom_id("q").unwrap();
        type_text(&page, node, "first", &TypeOptions::default())
            .await
            .unwrap();
        type_text(&page, node, "second", &TypeOptions::default())
            .await
            .unwrap();
        assert_eq!(page.value_of(node).as_deref(), Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_typing_fires_per_key_events() {
        let page = input_page();
        let node = page.node_by_dom_id("q").unwrap();
        type_text(&page, node, "ab", &TypeOptions::default())
            .await
            .unwrap();
        let names = page.dispatched_names(node);
        // Per character: keydown, input, keyup; then the trailing pair.
        let expected = vec![
            "keydown", "input", "keyup", "keydown", "input", "keyup", "input", "change",
        ];
        assert_eq!(names, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn direct_mode_sets_once() {
        let page = input_page();
        let node = page.node_by_dom_id("q").unwrap();
        let opts = TypeOptions {
            simulate: false,
            ..Default::default()
        };
        type_text(&page, node, "abc", &opts).await.unwrap();
        let names = page.dispatched_names(node);
        assert_eq!(names, vec!["input", "change"]);
        assert_eq!(page.value_of(node).as_deref(), Some("abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn contenteditable_inserts_text() {
        let page = input_page();
        let node = page.node_by_dom_id("compose").unwrap();
        type_text(&page, node, "Dear team,", &TypeOptions::default())
            .await
            .unwrap();
        assert_eq!(page.text_of(node), "Dear team,");
        let opts = TypeOptions {
            mode: TypeMode::Append,
            ..Default::default()
        };
        type_text(&page, node, " hello", &opts).await.unwrap();
        assert_eq!(page.text_of(node), "Dear team, hello");
    }

    #[tokio::test(start_paused = true)]
    async fn non_text_target_is_invalid() {
        let page = input_page();
        let node = page.node_by_dom_id("nope").unwrap();
        let err = type_text(&page, node, "x", &TypeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidArgs(_)));
    }
}
