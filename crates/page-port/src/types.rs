//! Data types crossing the page/tab collaborator boundary.

use std::collections::HashMap;

pub use pagepilot_core_types::{Point, Rect, TabId};
use serde::{Deserialize, Serialize};

/// Opaque reference to a live DOM node, minted by the page backend.
///
/// A `NodeId` stays valid only as long as the node exists in the live
/// document; any consumer that needs durability across reloads must carry a
/// structural signature instead.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Computed style facts relevant to visibility and pointer behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleFlags {
    pub display_none: bool,
    pub visibility_hidden: bool,
    pub opacity_zero: bool,
    pub pointer_events_none: bool,
    pub cursor_pointer: bool,
}

/// Point-in-time snapshot of one node.
///
/// Everything the upper layers read about a node comes through this struct,
/// re-fetched on every use; layout facts are never cached across awaits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node: NodeId,
    /// Lower-cased tag name.
    pub tag: String,
    pub attrs: HashMap<String, String>,
    /// Visible text of the subtree, whitespace-collapsed.
    pub text: String,
    /// Current value for inputs/textareas/selects.
    pub value: Option<String>,
    /// Bounding box, viewport-relative.
    pub bbox: Rect,
    pub style: StyleFlags,
    pub child_count: usize,
    pub content_editable: bool,
    pub disabled: bool,
    /// Checked state for checkboxes/radios.
    pub checked: Option<bool>,
    /// Selected option index for `<select>` elements.
    pub selected_index: Option<usize>,
}

impl NodeInfo {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|s| s.as_str())
    }

    pub fn dom_id(&self) -> Option<&str> {
        self.attr("id").filter(|s| !s.is_empty())
    }

    pub fn role(&self) -> Option<&str> {
        self.attr("role").filter(|s| !s.is_empty())
    }

    /// Accessible label: `aria-label`, falling back to `name`.
    pub fn label(&self) -> Option<&str> {
        self.attr("aria-label")
            .or_else(|| self.attr("name"))
            .filter(|s| !s.is_empty())
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.attr("placeholder").filter(|s| !s.is_empty())
    }

    pub fn href(&self) -> Option<&str> {
        self.attr("href").filter(|s| !s.is_empty())
    }

    /// First populated test-id attribute variant.
    pub fn test_id(&self) -> Option<&str> {
        for name in ["data-testid", "data-test", "data-qa", "data-automation"] {
            if let Some(v) = self.attr(name) {
                if !v.is_empty() {
                    return Some(v);
                }
            }
        }
        None
    }

    pub fn tab_index(&self) -> Option<i32> {
        self.attr("tabindex").and_then(|v| v.parse().ok())
    }

    pub fn has_click_handler(&self) -> bool {
        self.attrs.contains_key("onclick")
    }

    /// Link target attribute (`_blank` etc).
    pub fn link_target(&self) -> Option<&str> {
        self.attr("target").filter(|s| !s.is_empty())
    }

    pub fn is_form(&self) -> bool {
        self.tag == "form"
    }
}

/// Document readiness, mirroring `document.readyState`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    pub fn is_usable(&self) -> bool {
        matches!(self, ReadyState::Interactive | ReadyState::Complete)
    }
}

/// Currently focused element, reported with the page state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActiveElement {
    pub tag: String,
    pub text: String,
}

/// Page-level state report.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageState {
    pub url: String,
    pub title: String,
    pub ready: ReadyState,
    pub scroll: Point,
    /// Viewport rectangle, origin at (0, 0).
    pub viewport: Rect,
    /// Monotonically increasing DOM mutation counter.
    pub mutation_count: u64,
    pub selected_text: String,
    pub active_element: Option<ActiveElement>,
}

/// One tab as reported by the tab host.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
    pub title: String,
    pub active: bool,
    pub opener: Option<TabId>,
}

/// Ordered tab list plus the active tab.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BrowserSnapshot {
    pub tabs: Vec<TabInfo>,
    pub active: Option<TabId>,
}

impl BrowserSnapshot {
    pub fn tab_ids(&self) -> Vec<TabId> {
        self.tabs.iter().map(|t| t.id).collect()
    }
}

/// Pointer event phases in dispatch order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    Over,
    Enter,
    Down,
    Up,
}

/// Mouse event phases in dispatch order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MousePhase {
    Over,
    Enter,
    Down,
    Up,
    Click,
}

/// Keyboard event phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPhase {
    Down,
    Press,
    Up,
}

/// Modifier keys attached to a synthesized keyboard event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyModifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyModifiers {
    /// Parse loose modifier names ("Ctrl", "control", "shift", ...).
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut m = Self::default();
        for n in names {
            let n = n.as_ref().to_ascii_lowercase();
            if n.contains("ctrl") || n.contains("control") {
                m.ctrl = true;
            }
            if n.contains("shift") {
                m.shift = true;
            }
            if n.contains("alt") {
                m.alt = true;
            }
            if n.contains("meta") || n.contains("cmd") {
                m.meta = true;
            }
        }
        m
    }
}

/// A synthesized input event handed to the backend for dispatch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyntheticEvent {
    Pointer { phase: PointerPhase, at: Point },
    Mouse { phase: MousePhase, at: Point },
    Key {
        phase: KeyPhase,
        key: String,
        modifiers: KeyModifiers,
    },
    Input,
    Change,
}

impl SyntheticEvent {
    /// DOM event name, as a framework listener would see it.
    pub fn name(&self) -> &'static str {
        match self {
            SyntheticEvent::Pointer { phase, .. } => match phase {
                PointerPhase::Over => "pointerover",
                PointerPhase::Enter => "pointerenter",
                PointerPhase::Down => "pointerdown",
                PointerPhase::Up => "pointerup",
            },
            SyntheticEvent::Mouse { phase, .. } => match phase {
                MousePhase::Over => "mouseover",
                MousePhase::Enter => "mouseenter",
                MousePhase::Down => "mousedown",
                MousePhase::Up => "mouseup",
                MousePhase::Click => "click",
            },
            SyntheticEvent::Key { phase, .. } => match phase {
                KeyPhase::Down => "keydown",
                KeyPhase::Press => "keypress",
                KeyPhase::Up => "keyup",
            },
            SyntheticEvent::Input => "input",
            SyntheticEvent::Change => "change",
        }
    }
}

/// One option of a `<select>` element as reported by the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
}

/// Absolute scroll destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollPosition {
    Top,
    Bottom,
}
