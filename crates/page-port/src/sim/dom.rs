//! Serde-loadable page descriptions and the internal node store for the
//! simulated backend.

use std::collections::HashMap;

use pagepilot_core_types::Rect;
use serde::{Deserialize, Serialize};

use crate::types::{NodeId, StyleFlags};

/// One `<option>` of a `<select>` element.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OptionDescription {
    pub value: String,
    pub text: String,
}

/// Declarative description of one element and its subtree.
///
/// Nodes without an explicit bounding box are laid out top-to-bottom;
/// containers envelope their children.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeDescription {
    pub tag: String,
    #[serde(default)]
    pub attrs: HashMap<String, String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub value: Option<String>,
    /// (x, y, width, height) in page coordinates.
    #[serde(default)]
    pub bbox: Option<(f64, f64, f64, f64)>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub invisible: bool,
    #[serde(default)]
    pub transparent: bool,
    #[serde(default)]
    pub pointer_events_none: bool,
    #[serde(default)]
    pub cursor_pointer: bool,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub checked: Option<bool>,
    #[serde(default)]
    pub options: Vec<OptionDescription>,
    #[serde(default)]
    pub selected: Option<usize>,
    #[serde(default)]
    pub children: Vec<NodeDescription>,
    #[serde(default)]
    pub shadow: Vec<NodeDescription>,
    /// Content document body of a same-origin frame element.
    #[serde(default)]
    pub frame: Vec<NodeDescription>,
}

impl NodeDescription {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn bbox(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bbox = Some((x, y, width, height));
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn transparent(mut self) -> Self {
        self.transparent = true;
        self
    }

    pub fn pointer_events_none(mut self) -> Self {
        self.pointer_events_none = true;
        self
    }

    pub fn cursor_pointer(mut self) -> Self {
        self.cursor_pointer = true;
        self
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = Some(checked);
        self
    }

    pub fn option(mut self, value: impl Into<String>, text: impl Into<String>) -> Self {
        self.options.push(OptionDescription {
            value: value.into(),
            text: text.into(),
        });
        self
    }

    pub fn selected(mut self, index: usize) -> Self {
        self.selected = Some(index);
        self
    }

    pub fn child(mut self, child: NodeDescription) -> Self {
        self.children.push(child);
        self
    }

    pub fn shadow_child(mut self, child: NodeDescription) -> Self {
        self.shadow.push(child);
        self
    }

    pub fn frame_child(mut self, child: NodeDescription) -> Self {
        self.frame.push(child);
        self
    }
}

/// Full description of a page: url, viewport, body, and redirect table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageDescription {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_viewport")]
    pub viewport: (f64, f64),
    #[serde(default)]
    pub body: Vec<NodeDescription>,
    /// Requested url -> final url, applied on navigation.
    #[serde(default)]
    pub redirects: HashMap<String, String>,
}

fn default_viewport() -> (f64, f64) {
    (1280.0, 720.0)
}

impl PageDescription {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            viewport: default_viewport(),
            body: Vec::new(),
            redirects: HashMap::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn node(mut self, node: NodeDescription) -> Self {
        self.body.push(node);
        self
    }

    pub fn redirect(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.redirects.insert(from.into(), to.into());
        self
    }
}

/// Stored node inside the simulated document. Bounding boxes are kept in
/// page coordinates; viewport-relative boxes are derived from the scroll
/// offset at read time.
#[derive(Clone, Debug)]
pub(crate) struct SimNode {
    pub id: NodeId,
    pub tag: String,
    pub attrs: HashMap<String, String>,
    pub text: String,
    pub value: String,
    pub has_value: bool,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub shadow: Option<NodeId>,
    pub frame_doc: Option<NodeId>,
    pub style: StyleFlags,
    pub bbox: Rect,
    pub content_editable: bool,
    pub disabled: bool,
    pub checked: Option<bool>,
    pub options: Vec<OptionDescription>,
    pub selected: Option<usize>,
}

impl SimNode {
    pub fn visible(&self) -> bool {
        !self.style.display_none
            && !self.style.visibility_hidden
            && !self.style.opacity_zero
            && !self.bbox.is_empty()
    }
}
