//! In-memory document backing the `PageDriver` trait.
//!
//! The simulated page keeps bounding boxes in page coordinates and derives
//! viewport-relative boxes from the scroll offset at read time, so scrolling
//! behaves like a real layout. Hit-testing resolves the last matching node in
//! document order, which approximates paint order for the overlay cases the
//! upper layers care about.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pagepilot_core_types::{Point, Rect};
use parking_lot::Mutex;

use crate::errors::PageError;
use crate::sim::dom::{NodeDescription, PageDescription, SimNode};
use crate::types::{
    ActiveElement, MousePhase, NodeId, NodeInfo, PageState, ReadyState, ScrollPosition,
    StyleFlags, SyntheticEvent,
};
use crate::PageDriver;

/// How a form submission was triggered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitVia {
    RequestSubmit,
    SubmitButton,
    Submit,
}

/// Everything the simulated page records for later inspection.
#[derive(Clone, Debug, PartialEq)]
pub enum Recorded {
    Dispatched { node: NodeId, event: SyntheticEvent },
    NativeClick { node: NodeId },
    ValueSet { node: NodeId, value: String },
    EditableInsert { node: NodeId },
    Focused { node: NodeId },
    Submitted { form: NodeId, via: SubmitVia },
    Navigated { url: String },
}

pub(crate) type SharedRoutes = Arc<Mutex<HashMap<String, PageDescription>>>;

struct SimDoc {
    url: String,
    title: String,
    ready: ReadyState,
    viewport: Rect,
    scroll: Point,
    nodes: HashMap<NodeId, SimNode>,
    root: NodeId,
    next_node: u64,
    mutation_count: u64,
    focused: Option<NodeId>,
    selection: String,
    redirects: HashMap<String, String>,
    events: Vec<Recorded>,
    clicks: HashMap<NodeId, u32>,
    submits: u32,
    pending_popups: Vec<String>,
    history: Vec<String>,
    history_pos: usize,
}

/// Simulated page. Cheap to share; all state sits behind one lock.
pub struct SimPage {
    doc: Mutex<SimDoc>,
    routes: SharedRoutes,
}

const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript", "svg", "template", "iframe"];

impl SimPage {
    pub fn new(description: PageDescription) -> Self {
        Self::with_routes(description, Arc::new(Mutex::new(HashMap::new())))
    }

    pub fn blank(url: impl Into<String>) -> Self {
        Self::new(PageDescription::new(url))
    }

    pub(crate) fn with_routes(description: PageDescription, routes: SharedRoutes) -> Self {
        let url = description.url.clone();
        let mut doc = SimDoc {
            url: url.clone(),
            title: String::new(),
            ready: ReadyState::Complete,
            viewport: Rect::default(),
            scroll: Point::default(),
            nodes: HashMap::new(),
            root: NodeId(0),
            next_node: 1,
            mutation_count: 0,
            focused: None,
            selection: String::new(),
            redirects: HashMap::new(),
            events: Vec::new(),
            clicks: HashMap::new(),
            submits: 0,
            pending_popups: Vec::new(),
            history: vec![url],
            history_pos: 0,
        };
        doc.load(&description);
        Self {
            doc: Mutex::new(doc),
            routes,
        }
    }

    /// Register a page description swapped in when navigation reaches `url`.
    pub fn add_route(&self, url: impl Into<String>, description: PageDescription) {
        self.routes.lock().insert(url.into(), description);
    }

    // --- test/introspection surface ---

    pub fn url(&self) -> String {
        self.doc.lock().url.clone()
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.doc.lock().events.clone()
    }

    /// Names of events dispatched to one node, in order.
    pub fn dispatched_names(&self, node: NodeId) -> Vec<String> {
        self.doc
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                Recorded::Dispatched { node: n, event } if *n == node => {
                    Some(event.name().to_string())
                }
                _ => None,
            })
            .collect()
    }

    pub fn click_count(&self, node: NodeId) -> u32 {
        self.doc.lock().clicks.get(&node).copied().unwrap_or(0)
    }

    pub fn submit_count(&self) -> u32 {
        self.doc.lock().submits
    }

    pub fn node_by_dom_id(&self, id: &str) -> Option<NodeId> {
        let doc = self.doc.lock();
        doc.order()
            .into_iter()
            .find(|n| doc.nodes[n].attrs.get("id").map(|v| v == id).unwrap_or(false))
    }

    /// First node whose tag matches and whose subtree text contains `text`.
    pub fn find_node(&self, tag: &str, text: &str) -> Option<NodeId> {
        let doc = self.doc.lock();
        doc.order().into_iter().find(|n| {
            let node = &doc.nodes[n];
            node.tag == tag && doc.inner_text(*n).contains(text)
        })
    }

    pub fn value_of(&self, node: NodeId) -> Option<String> {
        let doc = self.doc.lock();
        doc.nodes.get(&node).filter(|n| n.has_value).map(|n| n.value.clone())
    }

    pub fn text_of(&self, node: NodeId) -> String {
        self.doc.lock().inner_text(node)
    }

    pub fn checked_of(&self, node: NodeId) -> Option<bool> {
        self.doc.lock().nodes.get(&node).and_then(|n| n.checked)
    }

    pub fn selected_of(&self, node: NodeId) -> Option<usize> {
        self.doc.lock().nodes.get(&node).and_then(|n| n.selected)
    }

    pub fn focused_node(&self) -> Option<NodeId> {
        self.doc.lock().focused
    }

    pub fn set_selection(&self, text: impl Into<String>) {
        self.doc.lock().selection = text.into();
    }

    /// Append a subtree under `parent`; counts as a mutation burst.
    pub fn append_child(&self, parent: NodeId, description: NodeDescription) -> NodeId {
        let mut doc = self.doc.lock();
        let bottom = doc.content_bottom();
        let id = doc.build_node(&description, Some(parent), bottom + 6.0);
        if let Some(p) = doc.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        doc.mutation_count += 1;
        id
    }

    pub fn set_text(&self, node: NodeId, text: impl Into<String>) {
        let mut doc = self.doc.lock();
        if let Some(n) = doc.nodes.get_mut(&node) {
            n.text = text.into();
        }
        doc.mutation_count += 1;
    }

    pub fn set_attr(&self, node: NodeId, name: impl Into<String>, value: impl Into<String>) {
        let mut doc = self.doc.lock();
        if let Some(n) = doc.nodes.get_mut(&node) {
            n.attrs.insert(name.into(), value.into());
        }
        doc.mutation_count += 1;
    }

    /// Detach a subtree; its node ids become dangling.
    pub fn remove_node(&self, node: NodeId) {
        let mut doc = self.doc.lock();
        if let Some(parent) = doc.nodes.get(&node).and_then(|n| n.parent) {
            if let Some(p) = doc.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != node);
            }
        }
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(n) = doc.nodes.remove(&id) {
                stack.extend(n.children);
                stack.extend(n.shadow);
                stack.extend(n.frame_doc);
            }
        }
        doc.mutation_count += 1;
    }

    pub fn bump_mutations(&self, n: u64) {
        self.doc.lock().mutation_count += n;
    }

    pub(crate) fn take_popups(&self) -> Vec<String> {
        std::mem::take(&mut self.doc.lock().pending_popups)
    }

    fn navigate_inner(&self, url: &str, push_history: bool) {
        let route = {
            let doc = self.doc.lock();
            let final_url = doc
                .redirects
                .get(url)
                .cloned()
                .unwrap_or_else(|| url.to_string());
            (final_url.clone(), self.routes.lock().get(&final_url).cloned())
        };
        let (final_url, description) = route;
        let mut doc = self.doc.lock();
        match description {
            Some(desc) => doc.load(&desc),
            None => {
                doc.url = final_url.clone();
                doc.ready = ReadyState::Complete;
            }
        }
        doc.url = final_url.clone();
        doc.mutation_count += 25;
        doc.events.push(Recorded::Navigated { url: final_url.clone() });
        if push_history {
            let truncate_to = doc.history_pos + 1;
            doc.history.truncate(truncate_to);
            doc.history.push(final_url);
            doc.history_pos = doc.history.len() - 1;
        }
    }
}

impl SimDoc {
    fn load(&mut self, description: &PageDescription) {
        self.nodes.clear();
        self.title = description.title.clone();
        self.url = description.url.clone();
        self.viewport = Rect::new(0.0, 0.0, description.viewport.0, description.viewport.1);
        self.scroll = Point::default();
        self.focused = None;
        self.selection.clear();
        self.redirects = description.redirects.clone();
        self.ready = ReadyState::Complete;

        let root_id = self.alloc();
        self.root = root_id;
        let mut root = SimNode {
            id: root_id,
            tag: "body".to_string(),
            attrs: HashMap::new(),
            text: String::new(),
            value: String::new(),
            has_value: false,
            children: Vec::new(),
            parent: None,
            shadow: None,
            frame_doc: None,
            style: StyleFlags::default(),
            bbox: self.viewport,
            content_editable: false,
            disabled: false,
            checked: None,
            options: Vec::new(),
            selected: None,
        };
        self.nodes.insert(root_id, root.clone());
        let mut cursor = 10.0;
        for child in &description.body {
            let id = self.build_node(child, Some(root_id), cursor);
            cursor = self.nodes[&id].bbox.bottom().max(cursor) + 6.0;
            root.children.push(id);
        }
        let content = self.content_bottom();
        root.bbox = Rect::new(0.0, 0.0, self.viewport.width, content.max(self.viewport.height));
        self.nodes.insert(root_id, root);
    }

    fn alloc(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    /// Build a subtree, stacking auto-layout nodes from `cursor_y` downward.
    fn build_node(
        &mut self,
        desc: &NodeDescription,
        parent: Option<NodeId>,
        cursor_y: f64,
    ) -> NodeId {
        let id = self.alloc();
        let has_value = matches!(desc.tag.as_str(), "input" | "textarea" | "select");
        let mut node = SimNode {
            id,
            tag: desc.tag.to_ascii_lowercase(),
            attrs: desc.attrs.clone(),
            text: desc.text.clone(),
            value: desc.value.clone().unwrap_or_default(),
            has_value,
            children: Vec::new(),
            parent,
            shadow: None,
            frame_doc: None,
            style: StyleFlags {
                display_none: desc.hidden,
                visibility_hidden: desc.invisible,
                opacity_zero: desc.transparent,
                pointer_events_none: desc.pointer_events_none,
                cursor_pointer: desc.cursor_pointer,
            },
            bbox: Rect::default(),
            content_editable: desc.editable,
            disabled: desc.disabled,
            checked: desc.checked,
            options: desc.options.clone(),
            selected: desc.selected.or(if desc.options.is_empty() {
                None
            } else {
                Some(0)
            }),
        };
        if node.tag == "select" {
            if let Some(i) = node.selected {
                if let Some(opt) = node.options.get(i) {
                    node.value = opt.value.clone();
                }
            }
        }
        self.nodes.insert(id, node);

        let mut child_cursor = cursor_y + 4.0;
        let mut children = Vec::new();
        for child in &desc.children {
            let cid = self.build_node(child, Some(id), child_cursor);
            child_cursor = self.nodes[&cid].bbox.bottom().max(child_cursor) + 6.0;
            children.push(cid);
        }
        let shadow = if desc.shadow.is_empty() {
            None
        } else {
            let sid = self.build_container(&desc.shadow, id, child_cursor, "shadow-root");
            child_cursor = self.nodes[&sid].bbox.bottom() + 6.0;
            Some(sid)
        };
        let frame_doc = if desc.frame.is_empty() {
            None
        } else {
            Some(self.build_container(&desc.frame, id, child_cursor, "body"))
        };

        let bbox = match desc.bbox {
            Some((x, y, w, h)) => Rect::new(x, y, w, h),
            None => {
                if children.is_empty() {
                    Rect::new(10.0, cursor_y, 200.0, 24.0)
                } else {
                    let mut env = self.nodes[&children[0]].bbox;
                    for cid in &children[1..] {
                        env = union(env, self.nodes[cid].bbox);
                    }
                    env
                }
            }
        };

        let node = self.nodes.get_mut(&id).unwrap(); // inserted above
        node.children = children;
        node.shadow = shadow;
        node.frame_doc = frame_doc;
        node.bbox = bbox;
        id
    }

    fn build_container(
        &mut self,
        descs: &[NodeDescription],
        parent: NodeId,
        cursor_y: f64,
        tag: &str,
    ) -> NodeId {
        let id = self.alloc();
        let mut cursor = cursor_y;
        let mut children = Vec::new();
        for d in descs {
            let cid = self.build_node(d, Some(id), cursor);
            cursor = self.nodes[&cid].bbox.bottom().max(cursor) + 6.0;
            children.push(cid);
        }
        let bbox = children
            .iter()
            .map(|c| self.nodes[c].bbox)
            .reduce(union)
            .unwrap_or_default();
        self.nodes.insert(
            id,
            SimNode {
                id,
                tag: tag.to_string(),
                attrs: HashMap::new(),
                text: String::new(),
                value: String::new(),
                has_value: false,
                children,
                parent: Some(parent),
                shadow: None,
                frame_doc: None,
                style: StyleFlags::default(),
                bbox,
                content_editable: false,
                disabled: false,
                checked: None,
                options: Vec::new(),
                selected: None,
            },
        );
        id
    }

    /// Pre-order document walk: node, shadow subtree, frame document, children.
    fn order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.walk(self.root, &mut out);
        out
    }

    fn walk(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        out.push(id);
        if let Some(s) = node.shadow {
            self.walk(s, out);
        }
        if let Some(f) = node.frame_doc {
            self.walk(f, out);
        }
        for c in &node.children {
            self.walk(*c, out);
        }
    }

    fn inner_text(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        self.collect_text(id, &mut parts);
        collapse(&parts.join(" "))
    }

    fn collect_text(&self, id: NodeId, out: &mut Vec<String>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if node.style.display_none || NON_CONTENT_TAGS.contains(&node.tag.as_str()) {
            return;
        }
        if !node.text.is_empty() {
            out.push(node.text.clone());
        }
        if let Some(s) = node.shadow {
            self.collect_text(s, out);
        }
        for c in &node.children {
            self.collect_text(*c, out);
        }
    }

    fn content_bottom(&self) -> f64 {
        self.nodes
            .values()
            .map(|n| n.bbox.bottom())
            .fold(0.0, f64::max)
    }

    fn max_scroll(&self) -> Point {
        Point::new(
            0.0,
            (self.content_bottom() - self.viewport.height).max(0.0),
        )
    }

    fn view_rect(&self, id: NodeId) -> Option<Rect> {
        self.nodes.get(&id).map(|n| {
            Rect::new(
                n.bbox.x - self.scroll.x,
                n.bbox.y - self.scroll.y,
                n.bbox.width,
                n.bbox.height,
            )
        })
    }

    /// Topmost node at a viewport point: last match in document order,
    /// skipping `display:none` subtrees and pointer-transparent nodes.
    fn hit_test(&self, at: Point) -> Option<NodeId> {
        let page_pt = Point::new(at.x + self.scroll.x, at.y + self.scroll.y);
        let mut best = None;
        self.hit_walk(self.root, page_pt, &mut best);
        best
    }

    fn hit_walk(&self, id: NodeId, at: Point, best: &mut Option<NodeId>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if node.style.display_none {
            return;
        }
        if node.visible() && !node.style.pointer_events_none && node.bbox.contains(at) {
            *best = Some(id);
        }
        if let Some(s) = node.shadow {
            self.hit_walk(s, at, best);
        }
        if let Some(f) = node.frame_doc {
            self.hit_walk(f, at, best);
        }
        for c in &node.children {
            self.hit_walk(*c, at, best);
        }
    }

    fn get(&self, id: NodeId) -> Result<&SimNode, PageError> {
        self.nodes.get(&id).ok_or(PageError::NodeGone(id))
    }

    fn apply_click(&mut self, node: NodeId) {
        *self.clicks.entry(node).or_insert(0) += 1;

        // Submit buttons submit their form.
        if let Ok(n) = self.get(node) {
            let is_submit = matches!(n.tag.as_str(), "button" | "input")
                && n.attrs.get("type").map(|t| t == "submit").unwrap_or(false);
            if is_submit {
                if let Some(form) = self.ancestor_form(node) {
                    self.submits += 1;
                    self.events.push(Recorded::Submitted {
                        form,
                        via: SubmitVia::SubmitButton,
                    });
                }
            }
        }

        // Anchor activation: popup for _blank, navigation otherwise.
        let mut cur = Some(node);
        while let Some(id) = cur {
            let Some(n) = self.nodes.get(&id) else { break };
            if n.tag == "a" {
                if let Some(href) = n.attrs.get("href").filter(|h| !h.is_empty()).cloned() {
                    let target = n.attrs.get("target").cloned().unwrap_or_default();
                    if target == "_blank" || target == "_new" {
                        if self.pending_popups.last() != Some(&href) {
                            self.pending_popups.push(href);
                        }
                    } else {
                        // Same-tab navigation is handled by the caller.
                        self.events.push(Recorded::Navigated { url: href.clone() });
                        self.url = href;
                        self.mutation_count += 25;
                    }
                    break;
                }
            }
            cur = n.parent;
        }
    }

    fn ancestor_form(&self, node: NodeId) -> Option<NodeId> {
        let mut cur = self.nodes.get(&node).and_then(|n| n.parent);
        while let Some(id) = cur {
            let n = self.nodes.get(&id)?;
            if n.tag == "form" {
                return Some(id);
            }
            cur = n.parent;
        }
        None
    }
}

fn union(a: Rect, b: Rect) -> Rect {
    let x = a.x.min(b.x);
    let y = a.y.min(b.y);
    let right = a.right().max(b.right());
    let bottom = a.bottom().max(b.bottom());
    Rect::new(x, y, right - x, bottom - y)
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl PageDriver for SimPage {
    async fn page_state(&self) -> Result<PageState, PageError> {
        let doc = self.doc.lock();
        let active_element = doc.focused.and_then(|id| {
            doc.nodes.get(&id).map(|n| ActiveElement {
                tag: n.tag.clone(),
                text: if n.has_value {
                    n.value.clone()
                } else {
                    doc.inner_text(id)
                },
            })
        });
        Ok(PageState {
            url: doc.url.clone(),
            title: doc.title.clone(),
            ready: doc.ready,
            scroll: doc.scroll,
            viewport: doc.viewport,
            mutation_count: doc.mutation_count,
            selected_text: doc.selection.clone(),
            active_element,
        })
    }

    async fn page_text(&self) -> Result<String, PageError> {
        let doc = self.doc.lock();
        Ok(doc.inner_text(doc.root))
    }

    async fn form_values(&self) -> Result<Vec<HashMap<String, String>>, PageError> {
        let doc = self.doc.lock();
        let mut forms = Vec::new();
        for id in doc.order() {
            if doc.nodes[&id].tag != "form" {
                continue;
            }
            let mut values = HashMap::new();
            let mut stack = doc.nodes[&id].children.clone();
            while let Some(cid) = stack.pop() {
                if let Some(n) = doc.nodes.get(&cid) {
                    if n.has_value {
                        if let Some(name) = n.attrs.get("name") {
                            let checkable = n
                                .attrs
                                .get("type")
                                .map(|t| t == "checkbox" || t == "radio")
                                .unwrap_or(false);
                            if !checkable || n.checked == Some(true) {
                                values.insert(name.clone(), n.value.clone());
                            }
                        }
                    }
                    stack.extend(n.children.iter().copied());
                }
            }
            forms.push(values);
        }
        Ok(forms)
    }

    async fn root(&self) -> Result<NodeId, PageError> {
        Ok(self.doc.lock().root)
    }

    async fn children(&self, node: NodeId) -> Result<Vec<NodeId>, PageError> {
        Ok(self.doc.lock().get(node)?.children.clone())
    }

    async fn parent(&self, node: NodeId) -> Result<Option<NodeId>, PageError> {
        Ok(self.doc.lock().get(node)?.parent)
    }

    async fn shadow_root(&self, node: NodeId) -> Result<Option<NodeId>, PageError> {
        Ok(self.doc.lock().get(node)?.shadow)
    }

    async fn frame_document(&self, node: NodeId) -> Result<Option<NodeId>, PageError> {
        Ok(self.doc.lock().get(node)?.frame_doc)
    }

    async fn node_info(&self, node: NodeId) -> Result<NodeInfo, PageError> {
        let doc = self.doc.lock();
        let n = doc.get(node)?;
        Ok(NodeInfo {
            node,
            tag: n.tag.clone(),
            attrs: n.attrs.clone(),
            text: doc.inner_text(node),
            value: if n.has_value || n.content_editable {
                Some(if n.content_editable {
                    doc.inner_text(node)
                } else {
                    n.value.clone()
                })
            } else {
                None
            },
            bbox: doc.view_rect(node).unwrap_or_default(),
            style: n.style,
            child_count: n.children.len(),
            content_editable: n.content_editable,
            disabled: n.disabled,
            checked: n.checked,
            selected_index: if n.tag == "select" { n.selected } else { None },
        })
    }

    async fn contains(&self, ancestor: NodeId, node: NodeId) -> Result<bool, PageError> {
        let doc = self.doc.lock();
        if ancestor == node {
            return Ok(true);
        }
        let mut cur = doc.get(node)?.parent;
        while let Some(id) = cur {
            if id == ancestor {
                return Ok(true);
            }
            cur = doc.nodes.get(&id).and_then(|n| n.parent);
        }
        Ok(false)
    }

    async fn query_selector(&self, selector: &str) -> Result<Vec<NodeId>, PageError> {
        let parts = parse_selector_list(selector)?;
        let doc = self.doc.lock();
        let mut out = Vec::new();
        for id in doc.order() {
            let n = &doc.nodes[&id];
            if parts.iter().any(|p| p.matches(n)) {
                out.push(id);
            }
        }
        Ok(out)
    }

    async fn query_path(&self, path: &str) -> Result<Vec<NodeId>, PageError> {
        let q = parse_path(path)?;
        let doc = self.doc.lock();
        let mut out = Vec::new();
        for id in doc.order() {
            let n = &doc.nodes[&id];
            if q.tag.as_deref().map(|t| t == n.tag).unwrap_or(true) {
                if let Some((ref name, ref value)) = q.attr {
                    if n.attrs.get(name) != Some(value) {
                        continue;
                    }
                }
                out.push(id);
            }
        }
        if let Some(i) = q.index {
            out = out.into_iter().skip(i.saturating_sub(1)).take(1).collect();
        }
        Ok(out)
    }

    async fn element_by_dom_id(&self, id: &str) -> Result<Option<NodeId>, PageError> {
        let doc = self.doc.lock();
        Ok(doc
            .order()
            .into_iter()
            .find(|n| doc.nodes[n].attrs.get("id").map(|v| v == id).unwrap_or(false)))
    }

    async fn element_at(&self, at: Point) -> Result<Option<NodeId>, PageError> {
        Ok(self.doc.lock().hit_test(at))
    }

    async fn scroll_into_view(&self, node: NodeId) -> Result<(), PageError> {
        let mut doc = self.doc.lock();
        let center = doc.get(node)?.bbox.center();
        let max = doc.max_scroll();
        doc.scroll.y = (center.y - doc.viewport.height / 2.0).clamp(0.0, max.y);
        Ok(())
    }

    async fn scroll_to(&self, position: ScrollPosition) -> Result<(), PageError> {
        let mut doc = self.doc.lock();
        let max = doc.max_scroll();
        doc.scroll.y = match position {
            ScrollPosition::Top => 0.0,
            ScrollPosition::Bottom => max.y,
        };
        Ok(())
    }

    async fn scroll_by(&self, dx: f64, dy: f64) -> Result<(), PageError> {
        let mut doc = self.doc.lock();
        let max = doc.max_scroll();
        doc.scroll.x = (doc.scroll.x + dx).max(0.0);
        doc.scroll.y = (doc.scroll.y + dy).clamp(0.0, max.y);
        Ok(())
    }

    async fn dispatch(&self, node: NodeId, event: SyntheticEvent) -> Result<(), PageError> {
        let mut doc = self.doc.lock();
        doc.get(node)?;
        doc.events.push(Recorded::Dispatched {
            node,
            event: event.clone(),
        });
        if let SyntheticEvent::Mouse {
            phase: MousePhase::Click,
            ..
        } = event
        {
            doc.apply_click(node);
        }
        Ok(())
    }

    async fn native_click(&self, node: NodeId) -> Result<(), PageError> {
        let mut doc = self.doc.lock();
        doc.get(node)?;
        doc.events.push(Recorded::NativeClick { node });
        doc.apply_click(node);
        Ok(())
    }

    async fn focus(&self, node: NodeId) -> Result<(), PageError> {
        let mut doc = self.doc.lock();
        doc.get(node)?;
        doc.focused = Some(node);
        doc.events.push(Recorded::Focused { node });
        Ok(())
    }

    async fn set_value_native(&self, node: NodeId, value: &str) -> Result<(), PageError> {
        let mut doc = self.doc.lock();
        let n = doc
            .nodes
            .get_mut(&node)
            .ok_or(PageError::NodeGone(node))?;
        if !n.has_value {
            return Err(PageError::Unsupported(format!(
                "set_value_native on <{}>",
                n.tag
            )));
        }
        n.value = value.to_string();
        doc.events.push(Recorded::ValueSet {
            node,
            value: value.to_string(),
        });
        doc.mutation_count += 1;
        Ok(())
    }

    async fn insert_editable_text(
        &self,
        node: NodeId,
        text: &str,
        clear_first: bool,
    ) -> Result<(), PageError> {
        let mut doc = self.doc.lock();
        let n = doc
            .nodes
            .get_mut(&node)
            .ok_or(PageError::NodeGone(node))?;
        if !n.content_editable {
            return Err(PageError::Unsupported(format!(
                "insert_editable_text on <{}>",
                n.tag
            )));
        }
        if clear_first {
            n.text = text.to_string();
        } else {
            n.text.push_str(text);
        }
        doc.events.push(Recorded::EditableInsert { node });
        doc.mutation_count += 1;
        Ok(())
    }

    async fn set_checked(&self, node: NodeId, checked: bool) -> Result<(), PageError> {
        let mut doc = self.doc.lock();
        let n = doc
            .nodes
            .get_mut(&node)
            .ok_or(PageError::NodeGone(node))?;
        n.checked = Some(checked);
        doc.mutation_count += 1;
        Ok(())
    }

    async fn select_options(
        &self,
        node: NodeId,
    ) -> Result<Vec<crate::types::SelectOption>, PageError> {
        let doc = self.doc.lock();
        let n = doc.get(node)?;
        Ok(n.options
            .iter()
            .map(|o| crate::types::SelectOption {
                value: o.value.clone(),
                text: o.text.clone(),
            })
            .collect())
    }

    async fn set_selected_index(&self, node: NodeId, index: usize) -> Result<(), PageError> {
        let mut doc = self.doc.lock();
        let n = doc
            .nodes
            .get_mut(&node)
            .ok_or(PageError::NodeGone(node))?;
        if index >= n.options.len() {
            return Err(PageError::Unsupported(format!(
                "option index {index} out of range"
            )));
        }
        n.selected = Some(index);
        n.value = n.options[index].value.clone();
        doc.mutation_count += 1;
        Ok(())
    }

    async fn form_of(&self, node: NodeId) -> Result<Option<NodeId>, PageError> {
        let doc = self.doc.lock();
        doc.get(node)?;
        if doc.nodes[&node].tag == "form" {
            return Ok(Some(node));
        }
        Ok(doc.ancestor_form(node))
    }

    async fn request_submit(&self, form: NodeId) -> Result<bool, PageError> {
        let mut doc = self.doc.lock();
        let n = doc.get(form)?;
        if n.attrs.contains_key("data-no-request-submit") {
            return Ok(false);
        }
        doc.submits += 1;
        doc.events.push(Recorded::Submitted {
            form,
            via: SubmitVia::RequestSubmit,
        });
        doc.mutation_count += 1;
        Ok(true)
    }

    async fn submit_form(&self, form: NodeId) -> Result<(), PageError> {
        let mut doc = self.doc.lock();
        doc.get(form)?;
        doc.submits += 1;
        doc.events.push(Recorded::Submitted {
            form,
            via: SubmitVia::Submit,
        });
        doc.mutation_count += 1;
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<(), PageError> {
        self.navigate_inner(url, true);
        Ok(())
    }

    async fn reload(&self) -> Result<(), PageError> {
        let url = self.doc.lock().url.clone();
        self.navigate_inner(&url, false);
        Ok(())
    }

    async fn history_back(&self) -> Result<(), PageError> {
        let target = {
            let mut doc = self.doc.lock();
            if doc.history_pos == 0 {
                return Ok(());
            }
            doc.history_pos -= 1;
            doc.history[doc.history_pos].clone()
        };
        self.navigate_inner(&target, false);
        Ok(())
    }

    async fn history_forward(&self) -> Result<(), PageError> {
        let target = {
            let mut doc = self.doc.lock();
            if doc.history_pos + 1 >= doc.history.len() {
                return Ok(());
            }
            doc.history_pos += 1;
            doc.history[doc.history_pos].clone()
        };
        self.navigate_inner(&target, false);
        Ok(())
    }
}

// --- minimal selector support ---

#[derive(Debug, Default)]
struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl SimpleSelector {
    fn matches(&self, node: &SimNode) -> bool {
        if let Some(tag) = &self.tag {
            if *tag != node.tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.attrs.get("id") != Some(id) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let have: Vec<&str> = node
                .attrs
                .get("class")
                .map(|c| c.split_whitespace().collect())
                .unwrap_or_default();
            if !self.classes.iter().all(|c| have.contains(&c.as_str())) {
                return false;
            }
        }
        for (name, value) in &self.attrs {
            match (node.attrs.get(name), value) {
                (Some(v), Some(want)) if v == want => {}
                (Some(_), None) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Parse a comma-separated list of simple selectors. Combinators are not
/// supported by the simulated backend.
fn parse_selector_list(selector: &str) -> Result<Vec<SimpleSelector>, PageError> {
    let mut out = Vec::new();
    for part in selector.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        out.push(parse_simple(part)?);
    }
    if out.is_empty() {
        return Err(PageError::BadSelector(selector.to_string()));
    }
    Ok(out)
}

fn parse_simple(part: &str) -> Result<SimpleSelector, PageError> {
    let bad = || PageError::BadSelector(part.to_string());
    let mut sel = SimpleSelector::default();
    let chars: Vec<char> = part.chars().collect();
    let mut i = 0;

    let read_ident = |i: &mut usize| {
        let start = *i;
        while *i < chars.len()
            && (chars[*i].is_alphanumeric() || chars[*i] == '-' || chars[*i] == '_')
        {
            *i += 1;
        }
        chars[start..*i].iter().collect::<String>()
    };

    if i < chars.len() && chars[i] == '*' {
        i += 1;
    } else if i < chars.len() && chars[i].is_alphabetic() {
        sel.tag = Some(read_ident(&mut i).to_ascii_lowercase());
    }

    while i < chars.len() {
        match chars[i] {
            '#' => {
                i += 1;
                let id = read_ident(&mut i);
                if id.is_empty() {
                    return Err(bad());
                }
                sel.id = Some(id);
            }
            '.' => {
                i += 1;
                let class = read_ident(&mut i);
                if class.is_empty() {
                    return Err(bad());
                }
                sel.classes.push(class);
            }
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|p| i + p)
                    .ok_or_else(bad)?;
                let inner: String = chars[i + 1..end].iter().collect();
                let (name, value) = match inner.split_once('=') {
                    Some((n, v)) => (
                        n.trim().to_string(),
                        Some(v.trim().trim_matches(|c| c == '\'' || c == '"').to_string()),
                    ),
                    None => (inner.trim().to_string(), None),
                };
                if name.is_empty() {
                    return Err(bad());
                }
                sel.attrs.push((name, value));
                i = end + 1;
            }
            _ => return Err(bad()),
        }
    }
    Ok(sel)
}

#[derive(Debug)]
struct PathQuery {
    tag: Option<String>,
    attr: Option<(String, String)>,
    index: Option<usize>,
}

/// Parse a `//tag[@attr='value']` or `//tag[n]` path expression.
fn parse_path(path: &str) -> Result<PathQuery, PageError> {
    let bad = || PageError::BadPath(path.to_string());
    let rest = path.strip_prefix("//").ok_or_else(bad)?;
    let (head, pred) = match rest.find('[') {
        Some(p) => {
            let close = rest.rfind(']').ok_or_else(bad)?;
            (&rest[..p], Some(&rest[p + 1..close]))
        }
        None => (rest, None),
    };
    let tag = match head.trim() {
        "" => return Err(bad()),
        "*" => None,
        t => Some(t.to_ascii_lowercase()),
    };
    let mut q = PathQuery {
        tag,
        attr: None,
        index: None,
    };
    if let Some(pred) = pred {
        let pred = pred.trim();
        if let Some(rest) = pred.strip_prefix('@') {
            let (name, value) = rest.split_once('=').ok_or_else(bad)?;
            q.attr = Some((
                name.trim().to_string(),
                value.trim().trim_matches(|c| c == '\'' || c == '"').to_string(),
            ));
        } else if let Ok(i) = pred.parse::<usize>() {
            q.index = Some(i);
        } else {
            return Err(bad());
        }
    }
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::dom::{NodeDescription, PageDescription};

    fn sample() -> SimPage {
        SimPage::new(
            PageDescription::new("https://example.test/")
                .title("Sample")
                .node(
                    NodeDescription::new("div").attr("class", "panel").child(
                        NodeDescription::new("button")
                            .id("go")
                            .text("Go")
                            .attr("type", "submit"),
                    ),
                )
                .node(
                    NodeDescription::new("input")
                        .attr("name", "q")
                        .attr("placeholder", "Search"),
                ),
        )
    }

    #[tokio::test]
    async fn selector_subset_matches() {
        let page = sample();
        let buttons = page.query_selector("button#go").await.unwrap();
        assert_eq!(buttons.len(), 1);
        let by_attr = page
            .query_selector("input[placeholder='Search']")
            .await
            .unwrap();
        assert_eq!(by_attr.len(), 1);
        let list = page.query_selector("button, input").await.unwrap();
        assert_eq!(list.len(), 2);
        assert!(page.query_selector("div > button").await.is_err());
    }

    #[tokio::test]
    async fn path_subset_matches() {
        let page = sample();
        let hits = page.query_path("//button[@id='go']").await.unwrap();
        assert_eq!(hits.len(), 1);
        let all = page.query_path("//input").await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn hit_test_prefers_later_nodes() {
        let page = SimPage::new(
            PageDescription::new("https://overlay.test/")
                .node(NodeDescription::new("button").id("b").bbox(10.0, 10.0, 100.0, 30.0))
                .node(
                    NodeDescription::new("div")
                        .id("overlay")
                        .bbox(0.0, 0.0, 500.0, 500.0),
                ),
        );
        let overlay = page.node_by_dom_id("overlay").unwrap();
        let hit = page
            .element_at(Point::new(60.0, 25.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit, overlay);
    }

    #[tokio::test]
    async fn removed_node_is_gone() {
        let page = sample();
        let go = page.node_by_dom_id("go").unwrap();
        page.remove_node(go);
        assert!(matches!(
            page.node_info(go).await,
            Err(PageError::NodeGone(_))
        ));
    }

    #[tokio::test]
    async fn navigation_applies_redirects_and_routes() {
        let page = SimPage::new(
            PageDescription::new("https://start.test/")
                .redirect("https://example.org", "https://example.org/home"),
        );
        page.add_route(
            "https://example.org/home".to_string(),
            PageDescription::new("https://example.org/home")
                .node(NodeDescription::new("h1").text("Home")),
        );
        page.navigate("https://example.org").await.unwrap();
        assert_eq!(page.url(), "https://example.org/home");
        assert!(page.page_text().await.unwrap().contains("Home"));
    }
}
