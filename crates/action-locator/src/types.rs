//! Locate requests and the visible strategy chain they compile into.

use page_port::NodeId;
use perceiver_dom::{ElementSignature, Handle};
use serde::{Deserialize, Serialize};

/// Fuzzy hint bag describing the element a caller wants.
///
/// No field is mandatory; resolution degrades gracefully as fields are
/// absent. The bag compiles into an ordered [`LocateStrategy`] chain via
/// [`LocateRequest::strategies`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocateRequest {
    /// Registry handle from the current snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<u32>,
    /// Literal DOM id (also tried against test-id attributes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Path expression (XPath-style).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Durable fingerprint remembered from an earlier snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<ElementSignature>,
    /// Only exact text matches count in the scored search.
    #[serde(default)]
    pub exact: bool,
    /// Require candidates to intersect the viewport.
    #[serde(default)]
    pub viewport_only: bool,
    /// Pick the nth acceptable candidate (0-based) in the scored search and
    /// structural queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl LocateRequest {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle.0),
            ..Default::default()
        }
    }

    pub fn from_signature(signature: ElementSignature) -> Self {
        Self {
            signature: Some(signature),
            ..Default::default()
        }
    }

    /// Drop the epoch-scoped handle, keeping only durable hints. Used by the
    /// self-heal path after a registry rebuild.
    pub fn without_handle(&self) -> Self {
        Self {
            handle: None,
            ..self.clone()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.strategies().is_empty()
    }

    /// Compile into the ordered, short-circuiting strategy chain.
    pub fn strategies(&self) -> Vec<LocateStrategy> {
        let mut chain = Vec::new();
        if let Some(h) = self.handle {
            chain.push(LocateStrategy::ByHandle(Handle(h)));
        }
        if let Some(sig) = &self.signature {
            if !sig.is_empty() {
                chain.push(LocateStrategy::BySignature(sig.clone()));
            }
        }
        if let Some(id) = &self.dom_id {
            chain.push(LocateStrategy::ByDomId(id.clone()));
            chain.push(LocateStrategy::ByTestId(id.clone()));
        }
        if let Some(href) = &self.href {
            chain.push(LocateStrategy::ByHref(href.clone()));
        }
        if let Some(sel) = &self.selector {
            chain.push(LocateStrategy::BySelector(sel.clone()));
        }
        if let Some(path) = &self.path {
            chain.push(LocateStrategy::ByPath(path.clone()));
        }
        let query = self.text_query();
        if !query.is_empty() {
            chain.push(LocateStrategy::ByText(query));
        }
        chain
    }

    /// Criteria for the scored text search, merging in signature fields the
    /// way a remembered element re-resolves after a reload.
    pub fn text_query(&self) -> TextQuery {
        let sig = self.signature.as_ref();
        TextQuery {
            text: self
                .text
                .clone()
                .or_else(|| sig.and_then(|s| s.text.clone())),
            id: self.dom_id.clone(),
            href: self
                .href
                .clone()
                .or_else(|| sig.and_then(|s| s.href.clone())),
            role: self
                .role
                .clone()
                .or_else(|| sig.and_then(|s| s.role.clone())),
            tag: self.tag.clone().or_else(|| sig.and_then(|s| s.tag.clone())),
            exact: self.exact,
        }
    }
}

/// One resolution strategy, in the order it will be attempted.
#[derive(Clone, Debug, PartialEq)]
pub enum LocateStrategy {
    ByHandle(Handle),
    BySignature(ElementSignature),
    ByDomId(String),
    ByTestId(String),
    ByHref(String),
    BySelector(String),
    ByPath(String),
    ByText(TextQuery),
}

impl LocateStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            LocateStrategy::ByHandle(_) => StrategyKind::Handle,
            LocateStrategy::BySignature(_) => StrategyKind::Signature,
            LocateStrategy::ByDomId(_) => StrategyKind::DomId,
            LocateStrategy::ByTestId(_) => StrategyKind::TestId,
            LocateStrategy::ByHref(_) => StrategyKind::Href,
            LocateStrategy::BySelector(_) => StrategyKind::Selector,
            LocateStrategy::ByPath(_) => StrategyKind::Path,
            LocateStrategy::ByText(_) => StrategyKind::Text,
        }
    }
}

/// Strategy tag, for logs and reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Handle,
    Signature,
    DomId,
    TestId,
    Href,
    Selector,
    Path,
    Text,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Handle => "handle",
            StrategyKind::Signature => "signature",
            StrategyKind::DomId => "dom-id",
            StrategyKind::TestId => "test-id",
            StrategyKind::Href => "href",
            StrategyKind::Selector => "selector",
            StrategyKind::Path => "path",
            StrategyKind::Text => "text",
        }
    }
}

/// Criteria for the scored free-text search.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextQuery {
    pub text: Option<String>,
    pub id: Option<String>,
    pub href: Option<String>,
    pub role: Option<String>,
    pub tag: Option<String>,
    pub exact: bool,
}

impl TextQuery {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.id.is_none()
            && self.href.is_none()
            && self.role.is_none()
            && self.tag.is_none()
    }
}

/// A successful resolution: the element plus how it was found.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Resolution {
    pub handle: Handle,
    pub node: NodeId,
    pub strategy: StrategyKind,
    /// Score, when the scored text search decided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
}
