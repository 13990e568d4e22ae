//! Resolver: walks the strategy chain until one strategy produces a visible
//! node.
//!
//! The resolver performs no retries and no waiting. "Can I find it right
//! now" lives here; "should I try again" belongs to the retry controller.

use std::sync::Arc;

use page_port::{NodeId, NodeInfo, PageDriver};
use pagepilot_core_types::Rect;
use perceiver_dom::{collect_interactive, ElementSignature, Registry};
use tracing::{debug, trace};

use crate::errors::LocatorError;
use crate::strategies;
use crate::types::{LocateRequest, LocateStrategy, Resolution, StrategyKind};

pub struct Resolver {
    registry: Arc<Registry>,
}

impl Resolver {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Resolve a request into a single best node, or `None` when every
    /// strategy misses.
    pub async fn resolve(
        &self,
        driver: &dyn PageDriver,
        request: &LocateRequest,
    ) -> Result<Option<Resolution>, LocatorError> {
        let chain = request.strategies();
        if chain.is_empty() {
            return Ok(None);
        }
        let viewport = driver.page_state().await?.viewport;
        // Interactive candidates are collected once, lazily, and shared by
        // the attribute and text strategies.
        let mut candidates: Option<Vec<NodeInfo>> = None;

        for strategy in chain {
            let kind = strategy.kind();
            let found = self
                .run_strategy(driver, &strategy, &viewport, &mut candidates, request)
                .await?;
            let Some((node, score)) = found else {
                trace!(strategy = kind.name(), "strategy missed");
                continue;
            };
            let Some(info) = self.gate(driver, node, request, &viewport).await? else {
                trace!(strategy = kind.name(), "hit failed visibility gate");
                continue;
            };
            let handle = self
                .registry
                .ensure(info.node, &ElementSignature::from_info(&info));
            debug!(
                strategy = kind.name(),
                handle = %handle,
                "resolved element"
            );
            return Ok(Some(Resolution {
                handle,
                node: info.node,
                strategy: kind,
                score,
            }));
        }
        Ok(None)
    }

    async fn run_strategy(
        &self,
        driver: &dyn PageDriver,
        strategy: &LocateStrategy,
        viewport: &Rect,
        candidates: &mut Option<Vec<NodeInfo>>,
        request: &LocateRequest,
    ) -> Result<Option<(NodeId, Option<i32>)>, LocatorError> {
        let index = request.index.unwrap_or(0);
        match strategy {
            LocateStrategy::ByHandle(h) => {
                // Stale handles fail silently and fall through.
                Ok(self.registry.node_of(*h).map(|n| (n, None)))
            }
            LocateStrategy::BySignature(sig) => {
                let key = sig.canonical_key();
                Ok(self
                    .registry
                    .handle_by_signature(&key)
                    .and_then(|h| self.registry.node_of(h))
                    .map(|n| (n, None)))
            }
            LocateStrategy::ByDomId(id) => {
                Ok(strategies::by_dom_id(driver, id).await?.map(|n| (n, None)))
            }
            LocateStrategy::ByTestId(id) => {
                let pool = self.candidates(driver, candidates).await?;
                Ok(strategies::by_test_id(pool, id).map(|n| (n, None)))
            }
            LocateStrategy::ByHref(href) => {
                let pool = self.candidates(driver, candidates).await?;
                Ok(strategies::by_href(pool, href).map(|n| (n, None)))
            }
            LocateStrategy::BySelector(sel) => {
                let nodes = strategies::by_selector(driver, sel).await?;
                Ok(self
                    .nth_gated(driver, nodes, request, viewport, index)
                    .await?
                    .map(|n| (n, None)))
            }
            LocateStrategy::ByPath(path) => {
                let nodes = strategies::by_path(driver, path).await?;
                Ok(self
                    .nth_gated(driver, nodes, request, viewport, index)
                    .await?
                    .map(|n| (n, None)))
            }
            LocateStrategy::ByText(query) => {
                let pool = self.candidates(driver, candidates).await?;
                let ranked = strategies::by_text(pool, query, viewport);
                Ok(ranked.get(index).map(|(n, s)| (*n, Some(*s))))
            }
        }
    }

    async fn candidates<'a>(
        &self,
        driver: &dyn PageDriver,
        cache: &'a mut Option<Vec<NodeInfo>>,
    ) -> Result<&'a Vec<NodeInfo>, LocatorError> {
        if cache.is_none() {
            *cache = Some(collect_interactive(driver).await?);
        }
        Ok(cache.as_ref().unwrap()) // just filled
    }

    /// Visibility gate for a strategy hit; refetches the node snapshot so
    /// layout facts are current.
    async fn gate(
        &self,
        driver: &dyn PageDriver,
        node: NodeId,
        request: &LocateRequest,
        viewport: &Rect,
    ) -> Result<Option<NodeInfo>, LocatorError> {
        let info = match driver.node_info(node).await {
            Ok(info) => info,
            Err(page_port::PageError::NodeGone(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let pass = if request.viewport_only {
            perceiver_dom::visibility::info_in_viewport(&info, viewport)
        } else {
            perceiver_dom::visibility::info_visible(&info)
        };
        Ok(pass.then_some(info))
    }

    async fn nth_gated(
        &self,
        driver: &dyn PageDriver,
        nodes: Vec<NodeId>,
        request: &LocateRequest,
        viewport: &Rect,
        index: usize,
    ) -> Result<Option<NodeId>, LocatorError> {
        let mut seen = 0usize;
        for node in nodes {
            if self.gate(driver, node, request, viewport).await?.is_some() {
                if seen == index {
                    return Ok(Some(node));
                }
                seen += 1;
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_port::sim::{NodeDescription, PageDescription, SimPage};
    use perceiver_dom::{scan, Handle};

    fn page() -> SimPage {
        SimPage::new(
            PageDescription::new("https://r.test/")
                .node(NodeDescription::new("button").id("go").text("Go"))
                .node(
                    NodeDescription::new("a")
                        .attr("href", "https://docs.example.com/start")
                        .text("Read the docs"),
                )
                .node(
                    NodeDescription::new("input")
                        .attr("data-testid", "search-box")
                        .attr("placeholder", "Search"),
                )
                .node(NodeDescription::new("button").text("Search everywhere")),
        )
    }

    async fn setup(page: &SimPage) -> (Arc<Registry>, Resolver) {
        let registry = Arc::new(Registry::new());
        scan(page, &registry).await.unwrap();
        let resolver = Resolver::new(registry.clone());
        (registry, resolver)
    }

    #[tokio::test]
    async fn handle_is_the_fast_path() {
        let page = page();
        let (_registry, resolver) = setup(&page).await;
        let hit = resolver
            .resolve(&page, &LocateRequest::from_handle(Handle(1)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.strategy, StrategyKind::Handle);
        assert_eq!(hit.handle, Handle(1));
    }

    #[tokio::test]
    async fn stale_handle_falls_through_to_signature() {
        let page = page();
        let (registry, resolver) = setup(&page).await;
        let sig = ElementSignature {
            tag: Some("button".into()),
            id: Some("go".into()),
            text: Some("Go".into()),
            ..Default::default()
        };
        // New epoch: the old handle number still exists but we arrive with a
        // dangling one plus a durable signature.
        scan(&page, &registry).await.unwrap();
        let req = LocateRequest {
            handle: Some(999),
            signature: Some(sig),
            ..Default::default()
        };
        let hit = resolver.resolve(&page, &req).await.unwrap().unwrap();
        assert_eq!(hit.strategy, StrategyKind::Signature);
        let info = page.node_info(hit.node).await.unwrap();
        assert_eq!(info.dom_id(), Some("go"));
    }

    #[tokio::test]
    async fn dom_id_and_test_id_lookups() {
        let page = page();
        let (_r, resolver) = setup(&page).await;
        let by_id = resolver
            .resolve(
                &page,
                &LocateRequest {
                    dom_id: Some("go".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id.strategy, StrategyKind::DomId);

        let by_test = resolver
            .resolve(
                &page,
                &LocateRequest {
                    dom_id: Some("search-box".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_test.strategy, StrategyKind::TestId);
    }

    #[tokio::test]
    async fn href_substring_matches() {
        let page = page();
        let (_r, resolver) = setup(&page).await;
        let hit = resolver
            .resolve(
                &page,
                &LocateRequest {
                    href: Some("docs.example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.strategy, StrategyKind::Href);
        let info = page.node_info(hit.node).await.unwrap();
        assert_eq!(info.tag, "a");
    }

    #[tokio::test]
    async fn selector_and_text_fallback() {
        let page = page();
        let (_r, resolver) = setup(&page).await;
        let by_sel = resolver
            .resolve(
                &page,
                &LocateRequest {
                    selector: Some("button#go".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_sel.strategy, StrategyKind::Selector);

        let by_text = resolver
            .resolve(&page, &LocateRequest::from_text("Read the docs"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_text.strategy, StrategyKind::Text);
        let info = page.node_info(by_text.node).await.unwrap();
        assert_eq!(info.tag, "a");
    }

    #[tokio::test]
    async fn exact_text_prefers_the_exact_candidate() {
        let page = page();
        let (_r, resolver) = setup(&page).await;
        // "Search" partially matches both the input placeholder and the
        // "Search everywhere" button; the placeholder match is exact.
        let hit = resolver
            .resolve(&page, &LocateRequest::from_text("Search"))
            .await
            .unwrap()
            .unwrap();
        let info = page.node_info(hit.node).await.unwrap();
        assert_eq!(info.tag, "input");
        assert!(hit.score.unwrap() > 0);
    }

    #[tokio::test]
    async fn no_match_is_none_not_error() {
        let page = page();
        let (_r, resolver) = setup(&page).await;
        let miss = resolver
            .resolve(&page, &LocateRequest::from_text("Totally absent phrase"))
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn hidden_element_fails_the_gate() {
        let page = SimPage::new(
            PageDescription::new("https://r.test/")
                .node(NodeDescription::new("button").id("ghost").text("Ghost").hidden()),
        );
        let (_r, resolver) = setup(&page).await;
        let miss = resolver
            .resolve(
                &page,
                &LocateRequest {
                    dom_id: Some("ghost".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(miss.is_none());
    }
}
