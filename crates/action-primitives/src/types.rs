//! Option and report types for the interaction primitives.

use serde::{Deserialize, Serialize};

/// Settle delay after a programmatic scroll, letting layout catch up.
pub const SCROLL_SETTLE_MS: u64 = 150;

/// Delay before the native-click fallback fires after the synthetic
/// sequence.
pub const NATIVE_FALLBACK_DELAY_MS: u64 = 120;

/// How long a pre-armed "expecting new tab" hint stays meaningful.
pub const NEW_TAB_EXPECT_TTL_MS: u64 = 3_000;

/// How much of the click lifecycle to synthesize.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickMode {
    /// Synthetic pointer/mouse lifecycle plus a delayed native fallback.
    #[default]
    Full,
    /// Synthetic lifecycle only; the caller bypasses the native fallback.
    SyntheticOnly,
    /// Native `.click()` only, aimed straight at the target node.
    NativeOnly,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClickOptions {
    /// Pixel offset from the bounding-box center, clamped inside the box.
    pub offset: Option<(f64, f64)>,
    pub mode: ClickMode,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClickReport {
    /// The synthetic sequence went to an overlaying element instead of the
    /// target.
    pub overlay: bool,
    /// Href of a link expected to open in a new tab (`target="_blank"` on
    /// the node or an ancestor anchor).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expecting_new_tab: Option<String>,
}

/// Replace or extend the current value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeMode {
    #[default]
    Set,
    Append,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeOptions {
    pub mode: TypeMode,
    /// Fire key-down/up and input per character for framework compatibility.
    pub simulate: bool,
    /// Extra delay between simulated keystrokes.
    pub per_key_delay_ms: u64,
}

impl Default for TypeOptions {
    fn default() -> Self {
        Self {
            mode: TypeMode::Set,
            simulate: true,
            per_key_delay_ms: 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TypeReport {
    /// Character length of the resulting value.
    pub length: usize,
}

/// How to pick an `<option>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectBy {
    Value(String),
    Text(String),
    Index(usize),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectReport {
    pub selected: bool,
    pub index: usize,
    pub text: String,
    pub value: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckReport {
    pub checked: bool,
    /// False when the control was already in the requested state.
    pub changed: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PressReport {
    pub key: String,
    /// A form submission was triggered (Enter handling).
    pub submitted: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitReport {
    pub submitted: bool,
}

/// Scroll request handled by the scroll primitive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollKind {
    Top,
    Bottom,
    /// Positive scrolls down.
    By(f64),
    ToNode(page_port::NodeId),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScrollReport {
    /// For scroll-to-element: whether the target ended up in the viewport.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}
