//! Tool calls and results: the normalized unit the controller executes.

use action_locator::LocateRequest;
use action_primitives::ActionError;
use pagepilot_core_types::TabId;
use perceiver_dom::ElementSignature;
use serde::{Deserialize, Serialize};

/// Element-addressing arguments shared by every element tool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetArgs {
    /// Registry handle from the current snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<ElementSignature>,
    #[serde(default)]
    pub exact: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl TargetArgs {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_request(false).is_empty()
    }

    pub fn to_request(&self, viewport_only: bool) -> LocateRequest {
        LocateRequest {
            handle: self.handle,
            dom_id: self.dom_id.clone(),
            selector: self.selector.clone(),
            path: self.path.clone(),
            text: self.text.clone(),
            href: self.href.clone(),
            role: self.role.clone(),
            tag: self.tag.clone(),
            signature: self.signature.clone(),
            exact: self.exact,
            viewport_only,
            index: self.index,
        }
    }

    /// Best-known href for bookkeeping (explicit hint or signature).
    pub fn known_href(&self) -> Option<String> {
        self.href
            .clone()
            .or_else(|| self.signature.as_ref().and_then(|s| s.href.clone()))
    }
}

/// Post-condition attached to an action call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VerifySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_includes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<TargetArgs>,
    /// Page reaches an interactive/complete ready state.
    #[serde(default)]
    pub ready: bool,
    /// Require the mutation counter to hold still this long before the
    /// element check counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_stable_ms: Option<u64>,
}

impl VerifySpec {
    pub fn is_empty(&self) -> bool {
        self.url_includes.is_none() && self.element.is_none() && !self.ready
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TapArgs {
    #[serde(flatten)]
    pub target: TargetArgs,
    /// Skip the delayed native-click fallback after the synthetic sequence.
    #[serde(default)]
    pub bypass_native: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_after: Option<VerifySpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeArgs {
    #[serde(flatten)]
    pub target: TargetArgs,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub append: bool,
    /// Character-by-character key simulation.
    #[serde(default = "default_true")]
    pub simulate: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectArgs {
    #[serde(flatten)]
    pub target: TargetArgs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_index: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckArgs {
    #[serde(flatten)]
    pub target: TargetArgs,
    #[serde(default = "default_true")]
    pub checked: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PressArgs {
    #[serde(flatten)]
    pub target: TargetArgs,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

/// Absolute scroll destinations accepted by the scroll tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDestination {
    Top,
    Bottom,
    Down,
    Up,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollArgs {
    #[serde(flatten)]
    pub target: TargetArgs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ScrollDestination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigateArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Navigate by activating a link element instead of a URL.
    #[serde(flatten)]
    pub target: TargetArgs,
    #[serde(default)]
    pub back: bool,
    #[serde(default)]
    pub forward: bool,
    #[serde(default)]
    pub reload: bool,
    /// Open in a new tab instead of the current one.
    #[serde(default)]
    pub blank: bool,
    #[serde(default = "default_true")]
    pub wait_for_load: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_after: Option<VerifySpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTabArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchTabArgs {
    pub id: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchArgs {
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default = "default_true")]
    pub new_tab: bool,
}

/// Page-level wait conditions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WaitCondition {
    #[serde(default)]
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_includes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_includes: Option<String>,
}

impl WaitCondition {
    pub fn is_empty(&self) -> bool {
        !self.ready && self.url_includes.is_none() && self.title_includes.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WaitArgs {
    /// Fixed delay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<WaitCondition>,
    /// Element to wait for.
    #[serde(flatten)]
    pub target: TargetArgs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_stable_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CopyArgs {
    /// Element to copy from; the current selection when absent.
    #[serde(flatten)]
    pub target: TargetArgs,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PasteArgs {
    #[serde(flatten)]
    pub target: TargetArgs,
    #[serde(default)]
    pub append: bool,
}

/// The normalized unit of work the controller executes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "args", rename_all = "snake_case")]
pub enum ToolCall {
    Tap(TapArgs),
    Type(TypeArgs),
    Focus(TargetArgs),
    Submit(TargetArgs),
    Select(SelectArgs),
    Check(CheckArgs),
    Press(PressArgs),
    Scroll(ScrollArgs),
    Navigate(NavigateArgs),
    NewTab(NewTabArgs),
    SwitchTab(SwitchTabArgs),
    Search(SearchArgs),
    Wait(WaitArgs),
    ReadPage,
    Copy(CopyArgs),
    Paste(PasteArgs),
    Done,
}

impl ToolCall {
    pub fn tool_name(&self) -> &'static str {
        match self {
            ToolCall::Tap(_) => "tap",
            ToolCall::Type(_) => "type",
            ToolCall::Focus(_) => "focus",
            ToolCall::Submit(_) => "submit",
            ToolCall::Select(_) => "select",
            ToolCall::Check(_) => "check",
            ToolCall::Press(_) => "press",
            ToolCall::Scroll(_) => "scroll",
            ToolCall::Navigate(_) => "navigate",
            ToolCall::NewTab(_) => "new_tab",
            ToolCall::SwitchTab(_) => "switch_tab",
            ToolCall::Search(_) => "search",
            ToolCall::Wait(_) => "wait",
            ToolCall::ReadPage => "read_page",
            ToolCall::Copy(_) => "copy",
            ToolCall::Paste(_) => "paste",
            ToolCall::Done => "done",
        }
    }

    /// Tools that address a page element (and therefore self-heal).
    pub fn is_element_tool(&self) -> bool {
        matches!(
            self,
            ToolCall::Tap(_) | ToolCall::Type(_) | ToolCall::Focus(_)
        )
    }
}

/// Tool-specific success payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Clicked {
        overlay: bool,
    },
    Typed {
        length: usize,
    },
    Focused,
    Submitted {
        submitted: bool,
    },
    Selected {
        index: usize,
        text: String,
        value: String,
    },
    Checked {
        checked: bool,
    },
    Pressed {
        key: String,
        submitted: bool,
    },
    Scrolled,
    Navigated {
        url: String,
    },
    Opened {
        tab: TabId,
        url: String,
    },
    Switched {
        tab: TabId,
    },
    SearchOpened {
        url: String,
        engine: String,
    },
    Waited {
        ms: u64,
    },
    PageText {
        text: String,
    },
    Copied {
        length: usize,
    },
    Pasted {
        length: usize,
    },
    Finished,
}

/// What the controller returns for every call. Failures carry a reason;
/// nothing ever panics across this boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub verify_failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_tab_id: Option<TabId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl ActionResult {
    pub fn ok(outcome: Outcome) -> Self {
        Self {
            ok: true,
            error: None,
            verify_failed: false,
            new_tab_id: None,
            outcome: Some(outcome),
        }
    }

    pub fn fail(err: ActionError) -> Self {
        Self {
            ok: false,
            verify_failed: matches!(err, ActionError::VerificationFailed(_)),
            error: Some(err.to_string()),
            new_tab_id: None,
            outcome: None,
        }
    }

    pub fn fail_msg(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
            verify_failed: false,
            new_tab_id: None,
            outcome: None,
        }
    }

    pub fn with_new_tab(mut self, tab: TabId) -> Self {
        self.new_tab_id = Some(tab);
        self
    }
}
