//! Post-condition verification and readiness polling.
//!
//! An unmet post-condition converts an otherwise-ok action into a failure
//! rather than silently declaring success.

use std::time::Duration;

use action_locator::Resolver;
use action_primitives::ActionError;
use page_port::PageDriver;
use tokio::time::Instant;
use tracing::debug;

use crate::locator_err;
use crate::types::VerifySpec;

/// Poll the page until it reports an interactive or complete ready state.
pub async fn wait_ready(
    driver: &dyn PageDriver,
    timeout: Duration,
    interval: Duration,
) -> Result<(), ActionError> {
    let deadline = Instant::now() + timeout;
    loop {
        if driver.page_state().await?.ready.is_usable() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(ActionError::Timeout(format!(
                "page not ready after {}ms",
                timeout.as_millis()
            )));
        }
        tokio::time::sleep(interval).await;
    }
}

/// Poll until every condition in `spec` holds, or fail with
/// `VerificationFailed` at the deadline.
pub async fn verify_after(
    driver: &dyn PageDriver,
    resolver: &Resolver,
    spec: &VerifySpec,
    timeout: Duration,
    interval: Duration,
) -> Result<(), ActionError> {
    if spec.is_empty() {
        return Ok(());
    }
    let deadline = Instant::now() + timeout;
    // (counter value, observed since) for the dom-stability gate.
    let mut stable: Option<(u64, Instant)> = None;
    loop {
        if satisfied(driver, resolver, spec, &mut stable).await? {
            debug!("post-condition satisfied");
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(ActionError::VerificationFailed(describe(spec)));
        }
        tokio::time::sleep(interval).await;
    }
}

async fn satisfied(
    driver: &dyn PageDriver,
    resolver: &Resolver,
    spec: &VerifySpec,
    stable: &mut Option<(u64, Instant)>,
) -> Result<bool, ActionError> {
    let state = driver.page_state().await?;
    if let Some(want) = &spec.url_includes {
        if !state.url.contains(want.as_str()) {
            return Ok(false);
        }
    }
    if spec.ready && !state.ready.is_usable() {
        return Ok(false);
    }
    if let Some(target) = &spec.element {
        if let Some(need) = spec.dom_stable_ms {
            // The element check only counts once the mutation counter has
            // held still for the requested span.
            let now = Instant::now();
            match stable {
                Some((count, since)) if *count == state.mutation_count => {
                    if now.duration_since(*since) < Duration::from_millis(need) {
                        return Ok(false);
                    }
                }
                _ => {
                    *stable = Some((state.mutation_count, now));
                    return Ok(false);
                }
            }
        }
        let request = target.to_request(false);
        let found = resolver
            .resolve(driver, &request)
            .await
            .map_err(locator_err)?;
        if found.is_none() {
            return Ok(false);
        }
    }
    Ok(true)
}

fn describe(spec: &VerifySpec) -> String {
    let mut unmet = Vec::new();
    if let Some(url) = &spec.url_includes {
        unmet.push(format!("url includes '{url}'"));
    }
    if spec.ready {
        unmet.push("page ready".to_string());
    }
    if spec.element.is_some() {
        unmet.push("element present".to_string());
    }
    format!("post-condition unmet: {}", unmet.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TargetArgs;
    use action_locator::Resolver;
    use page_port::sim::{NodeDescription, PageDescription, SimPage};
    use perceiver_dom::Registry;
    use std::sync::Arc;

    fn resolver() -> Resolver {
        Resolver::new(Arc::new(Registry::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn url_condition_passes_when_present() {
        let page = SimPage::blank("https://example.org/home");
        let spec = VerifySpec {
            url_includes: Some("example.org".into()),
            ..Default::default()
        };
        verify_after(
            &page,
            &resolver(),
            &spec,
            Duration::from_secs(3),
            Duration::from_millis(300),
        )
        .await
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unmet_condition_times_out_as_verification_failure() {
        let page = SimPage::blank("https://example.org/");
        let spec = VerifySpec {
            url_includes: Some("elsewhere.test".into()),
            ..Default::default()
        };
        let err = verify_after(
            &page,
            &resolver(),
            &spec,
            Duration::from_secs(3),
            Duration::from_millis(300),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ActionError::VerificationFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn element_presence_with_stability_gate() {
        let page = SimPage::new(
            PageDescription::new("https://v.test/")
                .node(NodeDescription::new("button").id("go").text("Go")),
        );
        let spec = VerifySpec {
            element: Some(TargetArgs::from_text("Go")),
            dom_stable_ms: Some(400),
            ..Default::default()
        };
        // No mutations while polling, so the gate opens after 400ms quiet.
        verify_after(
            &page,
            &resolver(),
            &spec,
            Duration::from_secs(5),
            Duration::from_millis(100),
        )
        .await
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn missing_element_fails_verification() {
        let page = SimPage::blank("https://v.test/");
        let spec = VerifySpec {
            element: Some(TargetArgs::from_text("Not here")),
            ..Default::default()
        };
        let err = verify_after(
            &page,
            &resolver(),
            &spec,
            Duration::from_secs(2),
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ActionError::VerificationFailed(_)));
    }
}
