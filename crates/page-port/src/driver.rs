//! The collaborator traits: one live document, and the tab host around it.
//!
//! These are the seams the rest of the workspace is written against. A real
//! deployment backs them with a page-resident script and the browser's tab
//! API; the `sim` module backs them with an in-memory document.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pagepilot_core_types::{Point, TabId};

use crate::errors::PageError;
use crate::types::{
    BrowserSnapshot, NodeId, NodeInfo, PageState, ScrollPosition, SelectOption, SyntheticEvent,
};

/// Access to one live document.
///
/// All reads are point-in-time: layout and style answers reflect the document
/// at call time and must be re-queried after any scroll or mutation.
#[async_trait]
pub trait PageDriver: Send + Sync {
    // --- page-level state ---

    async fn page_state(&self) -> Result<PageState, PageError>;

    /// Whitespace-collapsed text content with non-content subtrees
    /// (script/style and friends) stripped.
    async fn page_text(&self) -> Result<String, PageError>;

    /// Name/value pairs per form, in document order.
    async fn form_values(&self) -> Result<Vec<HashMap<String, String>>, PageError>;

    // --- structure ---

    async fn root(&self) -> Result<NodeId, PageError>;
    async fn children(&self, node: NodeId) -> Result<Vec<NodeId>, PageError>;
    async fn parent(&self, node: NodeId) -> Result<Option<NodeId>, PageError>;
    async fn shadow_root(&self, node: NodeId) -> Result<Option<NodeId>, PageError>;
    /// Content document of a same-origin frame element, if reachable.
    async fn frame_document(&self, node: NodeId) -> Result<Option<NodeId>, PageError>;
    async fn node_info(&self, node: NodeId) -> Result<NodeInfo, PageError>;
    async fn contains(&self, ancestor: NodeId, node: NodeId) -> Result<bool, PageError>;

    // --- queries ---

    async fn query_selector(&self, selector: &str) -> Result<Vec<NodeId>, PageError>;
    async fn query_path(&self, path: &str) -> Result<Vec<NodeId>, PageError>;
    async fn element_by_dom_id(&self, id: &str) -> Result<Option<NodeId>, PageError>;
    /// Topmost element at a viewport point (hit test).
    async fn element_at(&self, at: Point) -> Result<Option<NodeId>, PageError>;

    // --- scrolling ---

    async fn scroll_into_view(&self, node: NodeId) -> Result<(), PageError>;
    async fn scroll_to(&self, position: ScrollPosition) -> Result<(), PageError>;
    async fn scroll_by(&self, dx: f64, dy: f64) -> Result<(), PageError>;

    // --- input synthesis ---

    async fn dispatch(&self, node: NodeId, event: SyntheticEvent) -> Result<(), PageError>;
    /// The element's own `click()`, bypassing event synthesis.
    async fn native_click(&self, node: NodeId) -> Result<(), PageError>;
    async fn focus(&self, node: NodeId) -> Result<(), PageError>;
    /// Write an input/textarea value through the prototype's native setter,
    /// so framework-installed instance interceptors are bypassed.
    async fn set_value_native(&self, node: NodeId, value: &str) -> Result<(), PageError>;
    /// Insert text into a contenteditable region at the end of its content.
    async fn insert_editable_text(
        &self,
        node: NodeId,
        text: &str,
        clear_first: bool,
    ) -> Result<(), PageError>;
    async fn set_checked(&self, node: NodeId, checked: bool) -> Result<(), PageError>;
    /// Options of a `<select>` element, in document order.
    async fn select_options(&self, node: NodeId) -> Result<Vec<SelectOption>, PageError>;
    async fn set_selected_index(&self, node: NodeId, index: usize) -> Result<(), PageError>;

    // --- forms ---

    /// Owning form of a node (its `form` association or closest ancestor).
    async fn form_of(&self, node: NodeId) -> Result<Option<NodeId>, PageError>;
    /// `requestSubmit()`; returns false when the backend does not support it.
    async fn request_submit(&self, form: NodeId) -> Result<bool, PageError>;
    /// `form.submit()`, bypassing validation.
    async fn submit_form(&self, form: NodeId) -> Result<(), PageError>;

    // --- navigation ---

    async fn navigate(&self, url: &str) -> Result<(), PageError>;
    async fn reload(&self) -> Result<(), PageError>;
    async fn history_back(&self) -> Result<(), PageError>;
    async fn history_forward(&self) -> Result<(), PageError>;
}

/// The tab collaborator: enumerate, focus, and open tabs.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// Ordered tab list plus the active tab. Pending popups (e.g. from
    /// `target="_blank"` activations) surface as new tabs here.
    async fn snapshot(&self) -> Result<BrowserSnapshot, PageError>;

    async fn activate(&self, tab: TabId) -> Result<(), PageError>;

    /// Open a new tab; returns its id.
    async fn open(&self, url: &str, active: bool) -> Result<TabId, PageError>;

    /// Driver for a tab's page, if the tab still exists.
    fn driver(&self, tab: TabId) -> Option<Arc<dyn PageDriver>>;
}
