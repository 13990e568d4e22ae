//! Per-tool orchestration: probe, retry, act, verify, follow side effects.
//!
//! This is the seam between abstract intent and mechanical action. Every
//! failure is folded into an `ActionResult`; nothing panics or throws past
//! this boundary.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use action_locator::{Resolution, Resolver};
use action_primitives::{
    check, click, focus, press, scroll, select, submit, type_text, ActionError, ClickMode,
    ClickOptions, ScrollKind, SelectBy, TypeMode, TypeOptions,
};
use once_cell::sync::Lazy;
use page_port::{BrowserSnapshot, KeyModifiers, PageDriver, PageState, TabHost};
use pagepilot_core_types::TabId;
use parking_lot::Mutex;
use perceiver_dom::{scan, ElementDescriptor, Registry};
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::locator_err;
use crate::retry::{with_retry, Attempt, Mitigation, RetryPolicy, ELEMENT_MITIGATIONS};
use crate::types::{
    ActionResult, NavigateArgs, Outcome, PressArgs, ScrollArgs, ScrollDestination, SearchArgs,
    SelectArgs, TapArgs, TargetArgs, ToolCall, TypeArgs, VerifySpec, WaitArgs,
};
use crate::verify::{verify_after, wait_ready};

static ENGINES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("google", "https://www.google.com/search?q="),
        ("bing", "https://www.bing.com/search?q="),
        ("duckduckgo", "https://duckduckgo.com/?q="),
    ])
});

/// Tunables for the controller. Policy, not semantics.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub retry: RetryPolicy,
    /// Bound on post-condition polling.
    pub verify_timeout: Duration,
    pub verify_interval: Duration,
    /// Bound on the readiness wait before element tools run.
    pub ready_timeout: Duration,
    pub ready_interval: Duration,
    /// Bound on waiting for a navigation to settle.
    pub navigate_timeout: Duration,
    /// Default bound for the wait tool's conditional forms.
    pub wait_timeout: Duration,
    /// Tabs one run may open.
    pub new_tab_budget: u32,
    /// Pixels a positional scroll moves by default.
    pub scroll_step: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            verify_timeout: Duration::from_secs(4),
            verify_interval: Duration::from_millis(300),
            ready_timeout: Duration::from_secs(4),
            ready_interval: Duration::from_millis(200),
            navigate_timeout: Duration::from_secs(10),
            wait_timeout: Duration::from_secs(5),
            new_tab_budget: 3,
            scroll_step: 600.0,
        }
    }
}

/// The public action API: executes normalized tool calls against the current
/// tab, owning retries, verification, and tab side effects.
pub struct Controller {
    host: Arc<dyn TabHost>,
    registry: Arc<Registry>,
    resolver: Resolver,
    config: ControllerConfig,
    current: Mutex<TabId>,
    /// Run-scoped clipboard register for copy/paste.
    clipboard: Mutex<Option<String>>,
    tabs_opened: AtomicU32,
}

impl Controller {
    pub fn new(
        host: Arc<dyn TabHost>,
        registry: Arc<Registry>,
        initial_tab: TabId,
        config: ControllerConfig,
    ) -> Self {
        Self {
            host,
            resolver: Resolver::new(registry.clone()),
            registry,
            config,
            current: Mutex::new(initial_tab),
            clipboard: Mutex::new(None),
            tabs_opened: AtomicU32::new(0),
        }
    }

    /// Reset run-scoped state (tab budget, clipboard register).
    pub fn begin_run(&self) {
        self.tabs_opened.store(0, Ordering::SeqCst);
        *self.clipboard.lock() = None;
    }

    pub fn current_tab(&self) -> TabId {
        *self.current.lock()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Rebuild the registry from the current tab and return the
    /// planner-facing element list.
    pub async fn snapshot_elements(&self) -> Result<Vec<ElementDescriptor>, ActionError> {
        let driver = self.prepare().await?;
        Ok(scan(driver.as_ref(), &self.registry).await?)
    }

    pub async fn page_state(&self) -> Result<PageState, ActionError> {
        let driver = self.driver()?;
        Ok(driver.page_state().await?)
    }

    /// Execute one tool call. Always returns a result; failures carry a
    /// specific reason and callers decide whether to re-plan.
    pub async fn execute(&self, call: &ToolCall) -> ActionResult {
        debug!(tool = call.tool_name(), "executing tool call");
        let before = match self.host.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => return ActionResult::fail(err.into()),
        };

        let mut result = match self.dispatch(call).await {
            Ok(outcome) => ActionResult::ok(outcome),
            Err(err) => {
                warn!(tool = call.tool_name(), error = %err, "tool call failed");
                ActionResult::fail(err)
            }
        };

        // Post-condition verification runs on the tab the call targeted.
        if result.ok {
            if let Some(spec) = verify_spec_of(call) {
                if let Err(err) = self.run_verify(spec).await {
                    result.ok = false;
                    result.verify_failed = true;
                    result.error = Some(err.to_string());
                }
            }
        }

        // A click may have opened a tab even when verification failed, and
        // the agent's notion of "current target" must follow it.
        match self.follow_side_effects(&before).await {
            Ok(Some(tab)) => result.new_tab_id = Some(tab),
            Ok(None) => {}
            Err(err) => {
                if result.ok {
                    result = ActionResult::fail(err);
                }
            }
        }

        result
    }

    async fn dispatch(&self, call: &ToolCall) -> Result<Outcome, ActionError> {
        match call {
            ToolCall::Tap(args) => match self.tap_once(args).await {
                Ok(outcome) => Ok(outcome),
                Err(err) => match self.healed_target(&args.target, &err).await? {
                    Some(target) => {
                        let healed = TapArgs {
                            target,
                            bypass_native: args.bypass_native,
                            verify_after: None,
                        };
                        self.tap_once(&healed).await
                    }
                    None => Err(err),
                },
            },
            ToolCall::Type(args) => match self.type_once(&args.target, args).await {
                Ok(outcome) => Ok(outcome),
                Err(err) => match self.healed_target(&args.target, &err).await? {
                    Some(target) => self.type_once(&target, args).await,
                    None => Err(err),
                },
            },
            ToolCall::Focus(target) => match self.focus_once(target).await {
                Ok(outcome) => Ok(outcome),
                Err(err) => match self.healed_target(target, &err).await? {
                    Some(healed) => self.focus_once(&healed).await,
                    None => Err(err),
                },
            },
            ToolCall::Submit(target) => self.submit_tool(target).await,
            ToolCall::Select(args) => self.select_tool(args).await,
            ToolCall::Check(args) => self.check_tool(&args.target, args.checked).await,
            ToolCall::Press(args) => self.press_tool(args).await,
            ToolCall::Scroll(args) => self.scroll_tool(args).await,
            ToolCall::Navigate(args) => self.navigate_tool(args).await,
            ToolCall::NewTab(args) => self.open_tab(args.url.clone(), args.active).await,
            ToolCall::SwitchTab(args) => self.switch_tab(TabId(args.id)).await,
            ToolCall::Search(args) => self.search_tool(args).await,
            ToolCall::Wait(args) => self.wait_tool(args).await,
            ToolCall::ReadPage => self.read_page().await,
            ToolCall::Copy(args) => self.copy_tool(&args.target).await,
            ToolCall::Paste(args) => self.paste_tool(&args.target, args.append).await,
            ToolCall::Done => Ok(Outcome::Finished),
        }
    }

    // --- element tools ---

    async fn tap_once(&self, args: &TapArgs) -> Result<Outcome, ActionError> {
        let driver = self.prepare().await?;
        let target = &args.target;
        let report = with_retry(&self.config.retry, ELEMENT_MITIGATIONS, |attempt| {
            let driver = driver.clone();
            Box::pin(async move {
                let hit = self.resolve_target(driver.as_ref(), target, attempt).await?;
                let mut opts = ClickOptions {
                    mode: if args.bypass_native {
                        ClickMode::SyntheticOnly
                    } else {
                        ClickMode::Full
                    },
                    ..Default::default()
                };
                match attempt.mitigation {
                    Some(Mitigation::NudgePointer) => opts.offset = Some(pointer_nudge()),
                    Some(Mitigation::ForceNative) => opts.mode = ClickMode::NativeOnly,
                    _ => {}
                }
                click(driver.as_ref(), hit.node, &opts).await
            })
        })
        .await?;
        if let Some(href) = &report.expecting_new_tab {
            debug!(href = %href, "click target was armed for a new tab");
        }
        Ok(Outcome::Clicked {
            overlay: report.overlay,
        })
    }

    async fn type_once(&self, target: &TargetArgs, args: &TypeArgs) -> Result<Outcome, ActionError> {
        let driver = self.prepare().await?;
        let opts = TypeOptions {
            mode: if args.append {
                TypeMode::Append
            } else {
                TypeMode::Set
            },
            simulate: args.simulate,
            per_key_delay_ms: 0,
        };
        let value = args.value.as_str();
        let report = with_retry(&self.config.retry, ELEMENT_MITIGATIONS, |attempt| {
            let driver = driver.clone();
            Box::pin(async move {
                let hit = self.resolve_target(driver.as_ref(), target, attempt).await?;
                type_text(driver.as_ref(), hit.node, value, &opts).await
            })
        })
        .await?;
        Ok(Outcome::Typed {
            length: report.length,
        })
    }

    async fn focus_once(&self, target: &TargetArgs) -> Result<Outcome, ActionError> {
        let driver = self.prepare().await?;
        with_retry(&self.config.retry, ELEMENT_MITIGATIONS, |attempt| {
            let driver = driver.clone();
            Box::pin(async move {
                let hit = self.resolve_target(driver.as_ref(), target, attempt).await?;
                focus(driver.as_ref(), hit.node).await
            })
        })
        .await?;
        Ok(Outcome::Focused)
    }

    async fn submit_tool(&self, target: &TargetArgs) -> Result<Outcome, ActionError> {
        let driver = self.prepare().await?;
        let report = with_retry(&self.config.retry, ELEMENT_MITIGATIONS, |attempt| {
            let driver = driver.clone();
            Box::pin(async move {
                let hit = self.resolve_target(driver.as_ref(), target, attempt).await?;
                submit(driver.as_ref(), hit.node).await
            })
        })
        .await?;
        Ok(Outcome::Submitted {
            submitted: report.submitted,
        })
    }

    async fn select_tool(&self, args: &SelectArgs) -> Result<Outcome, ActionError> {
        let by = if let Some(value) = &args.value {
            SelectBy::Value(value.clone())
        } else if let Some(text) = &args.option_text {
            SelectBy::Text(text.clone())
        } else if let Some(index) = args.option_index {
            SelectBy::Index(index)
        } else {
            return Err(ActionError::InvalidArgs(
                "select needs value, option_text, or option_index".into(),
            ));
        };
        let driver = self.prepare().await?;
        let target = &args.target;
        let report = with_retry(&self.config.retry, ELEMENT_MITIGATIONS, |attempt| {
            let driver = driver.clone();
            let by = by.clone();
            Box::pin(async move {
                let hit = self.resolve_target(driver.as_ref(), target, attempt).await?;
                select(driver.as_ref(), hit.node, &by).await
            })
        })
        .await?;
        Ok(Outcome::Selected {
            index: report.index,
            text: report.text,
            value: report.value,
        })
    }

    async fn check_tool(&self, target: &TargetArgs, desired: bool) -> Result<Outcome, ActionError> {
        let driver = self.prepare().await?;
        let report = with_retry(&self.config.retry, ELEMENT_MITIGATIONS, |attempt| {
            let driver = driver.clone();
            Box::pin(async move {
                let hit = self.resolve_target(driver.as_ref(), target, attempt).await?;
                check(driver.as_ref(), hit.node, desired).await
            })
        })
        .await?;
        Ok(Outcome::Checked {
            checked: report.checked,
        })
    }

    async fn press_tool(&self, args: &PressArgs) -> Result<Outcome, ActionError> {
        if args.key.trim().is_empty() {
            return Err(ActionError::InvalidArgs("Invalid key".into()));
        }
        let driver = self.prepare().await?;
        let modifiers = KeyModifiers::from_names(&args.modifiers);
        let target = &args.target;
        let key = args.key.as_str();
        let report = with_retry(&self.config.retry, ELEMENT_MITIGATIONS, |attempt| {
            let driver = driver.clone();
            Box::pin(async move {
                let hit = self.resolve_target(driver.as_ref(), target, attempt).await?;
                press(driver.as_ref(), hit.node, key, &modifiers).await
            })
        })
        .await?;
        Ok(Outcome::Pressed {
            key: report.key,
            submitted: report.submitted,
        })
    }

    // --- page tools ---

    async fn scroll_tool(&self, args: &ScrollArgs) -> Result<Outcome, ActionError> {
        let driver = self.driver()?;
        if !args.target.is_empty() {
            let target = &args.target;
            with_retry(&self.config.retry, ELEMENT_MITIGATIONS, |attempt| {
                let driver = driver.clone();
                Box::pin(async move {
                    let hit = self.resolve_target(driver.as_ref(), target, attempt).await?;
                    scroll(driver.as_ref(), ScrollKind::ToNode(hit.node)).await
                })
            })
            .await?;
            return Ok(Outcome::Scrolled);
        }
        let step = args.amount.unwrap_or(self.config.scroll_step).abs();
        let kind = match args.to.unwrap_or(ScrollDestination::Down) {
            ScrollDestination::Top => ScrollKind::Top,
            ScrollDestination::Bottom => ScrollKind::Bottom,
            ScrollDestination::Down => ScrollKind::By(step),
            ScrollDestination::Up => ScrollKind::By(-step),
        };
        scroll(driver.as_ref(), kind).await?;
        Ok(Outcome::Scrolled)
    }

    async fn navigate_tool(&self, args: &NavigateArgs) -> Result<Outcome, ActionError> {
        let driver = self.driver()?;
        if let Some(raw) = &args.url {
            let url = sanitize_url(raw)?;
            if args.blank {
                return self.open_tab(Some(url), true).await;
            }
            info!(url = %url, "navigating");
            driver.navigate(&url).await?;
        } else if args.reload {
            driver.reload().await?;
        } else if args.back {
            driver.history_back().await?;
        } else if args.forward {
            driver.history_forward().await?;
        } else if !args.target.is_empty() {
            // Navigate by activating a link element.
            let target = &args.target;
            let hit = with_retry(&self.config.retry, ELEMENT_MITIGATIONS, |attempt| {
                let driver = driver.clone();
                Box::pin(async move { self.resolve_target(driver.as_ref(), target, attempt).await })
            })
            .await?;
            let info = driver.node_info(hit.node).await?;
            let href = info
                .href()
                .map(|h| h.to_string())
                .ok_or_else(|| ActionError::InvalidArgs("navigation target has no href".into()))?;
            if matches!(info.link_target(), Some("_blank") | Some("_new")) {
                return self.open_tab(Some(href), true).await;
            }
            driver.navigate(&href).await?;
        } else {
            return Err(ActionError::InvalidArgs(
                "navigate needs a url, a direction, or a link target".into(),
            ));
        }

        if args.wait_for_load {
            let bound = args
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(self.config.navigate_timeout);
            wait_ready(driver.as_ref(), bound, self.config.ready_interval).await?;
        }
        let state = driver.page_state().await?;
        Ok(Outcome::Navigated { url: state.url })
    }

    async fn open_tab(&self, url: Option<String>, active: bool) -> Result<Outcome, ActionError> {
        let opened = self.tabs_opened.load(Ordering::SeqCst);
        if opened >= self.config.new_tab_budget {
            return Err(ActionError::InvalidArgs(format!(
                "new tab budget ({}) exhausted for this run",
                self.config.new_tab_budget
            )));
        }
        let url = match url {
            Some(raw) => sanitize_url(&raw)?,
            None => "about:blank".to_string(),
        };
        let tab = self.host.open(&url, active).await?;
        self.tabs_opened.fetch_add(1, Ordering::SeqCst);
        info!(tab = %tab, url = %url, "opened tab");
        if active {
            *self.current.lock() = tab;
            let driver = self.driver()?;
            if let Err(err) = wait_ready(
                driver.as_ref(),
                self.config.ready_timeout,
                self.config.ready_interval,
            )
            .await
            {
                warn!(tab = %tab, error = %err, "new tab slow to become ready");
            }
        }
        Ok(Outcome::Opened { tab, url })
    }

    async fn switch_tab(&self, tab: TabId) -> Result<Outcome, ActionError> {
        self.host.activate(tab).await?;
        *self.current.lock() = tab;
        let driver = self.driver()?;
        if let Err(err) = wait_ready(
            driver.as_ref(),
            self.config.ready_timeout,
            self.config.ready_interval,
        )
        .await
        {
            warn!(tab = %tab, error = %err, "switched tab slow to become ready");
        }
        Ok(Outcome::Switched { tab })
    }

    async fn search_tool(&self, args: &SearchArgs) -> Result<Outcome, ActionError> {
        let query = args.query.trim();
        if query.is_empty() {
            return Err(ActionError::InvalidArgs("empty search query".into()));
        }
        let engine = args
            .engine
            .as_deref()
            .unwrap_or("google")
            .to_ascii_lowercase();
        let base = ENGINES.get(engine.as_str()).ok_or_else(|| {
            ActionError::InvalidArgs(format!("unknown search engine '{engine}'"))
        })?;
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let target = format!("{base}{encoded}");
        if args.new_tab {
            self.open_tab(Some(target.clone()), true).await?;
        } else {
            let driver = self.driver()?;
            driver.navigate(&target).await?;
            wait_ready(
                driver.as_ref(),
                self.config.navigate_timeout,
                self.config.ready_interval,
            )
            .await?;
        }
        Ok(Outcome::SearchOpened {
            url: target,
            engine,
        })
    }

    async fn wait_tool(&self, args: &WaitArgs) -> Result<Outcome, ActionError> {
        if let Some(ms) = args.ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            return Ok(Outcome::Waited { ms });
        }
        let driver = self.driver()?;
        let timeout = args
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.wait_timeout);
        let started = Instant::now();
        let deadline = started + timeout;
        let mut stable: Option<(u64, Instant)> = None;
        loop {
            let done = if !args.target.is_empty() {
                self.element_present(driver.as_ref(), &args.target, args.dom_stable_ms, &mut stable)
                    .await?
            } else if let Some(cond) = &args.condition {
                if cond.is_empty() {
                    return Err(ActionError::InvalidArgs("empty wait condition".into()));
                }
                let state = driver.page_state().await?;
                (!cond.ready || state.ready.is_usable())
                    && cond
                        .url_includes
                        .as_ref()
                        .map_or(true, |u| state.url.contains(u.as_str()))
                    && cond.title_includes.as_ref().map_or(true, |t| {
                        state.title.to_lowercase().contains(&t.to_lowercase())
                    })
            } else {
                return Err(ActionError::InvalidArgs(
                    "wait needs ms, a condition, or an element".into(),
                ));
            };
            if done {
                return Ok(Outcome::Waited {
                    ms: started.elapsed().as_millis() as u64,
                });
            }
            if Instant::now() >= deadline {
                return Err(ActionError::Timeout(format!(
                    "wait condition unmet after {}ms",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(self.config.verify_interval).await;
        }
    }

    async fn element_present(
        &self,
        driver: &dyn PageDriver,
        target: &TargetArgs,
        dom_stable_ms: Option<u64>,
        stable: &mut Option<(u64, Instant)>,
    ) -> Result<bool, ActionError> {
        if let Some(need) = dom_stable_ms {
            let state = driver.page_state().await?;
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
        Ok(self
            .resolver
            .resolve(driver, &request)
            .await
            .map_err(locator_err)?
            .is_some())
    }

    async fn read_page(&self) -> Result<Outcome, ActionError> {
        let driver = self.prepare().await?;
        let text = driver.page_text().await?;
        Ok(Outcome::PageText { text })
    }

    async fn copy_tool(&self, target: &TargetArgs) -> Result<Outcome, ActionError> {
        let driver = self.prepare().await?;
        let text = if !target.is_empty() {
            let hit = with_retry(&self.config.retry, ELEMENT_MITIGATIONS, |attempt| {
                let driver = driver.clone();
                Box::pin(async move { self.resolve_target(driver.as_ref(), target, attempt).await })
            })
            .await?;
            let info = driver.node_info(hit.node).await?;
            if info.text.is_empty() {
                info.value.unwrap_or_default()
            } else {
                info.text
            }
        } else {
            driver.page_state().await?.selected_text
        };
        if text.is_empty() {
            return Err(ActionError::NotFound(
                "nothing to copy: no selection and no element text".into(),
            ));
        }
        let length = text.chars().count();
        *self.clipboard.lock() = Some(text);
        Ok(Outcome::Copied { length })
    }

    async fn paste_tool(&self, target: &TargetArgs, append: bool) -> Result<Outcome, ActionError> {
        let value = self
            .clipboard
            .lock()
            .clone()
            .ok_or_else(|| ActionError::InvalidArgs("clipboard register is empty".into()))?;
        let args = TypeArgs {
            target: target.clone(),
            value,
            append,
            simulate: true,
        };
        match self.type_once(target, &args).await? {
            Outcome::Typed { length } => Ok(Outcome::Pasted { length }),
            other => Ok(other),
        }
    }

    // --- shared plumbing ---

    fn driver(&self) -> Result<Arc<dyn PageDriver>, ActionError> {
        let tab = self.current_tab();
        self.host
            .driver(tab)
            .ok_or_else(|| ActionError::TabLost(tab.to_string()))
    }

    /// Readiness + focus gate before any element tool runs.
    async fn prepare(&self) -> Result<Arc<dyn PageDriver>, ActionError> {
        let tab = self.current_tab();
        self.host.activate(tab).await?;
        let driver = self.driver()?;
        wait_ready(
            driver.as_ref(),
            self.config.ready_timeout,
            self.config.ready_interval,
        )
        .await?;
        Ok(driver)
    }

    async fn resolve_target(
        &self,
        driver: &dyn PageDriver,
        target: &TargetArgs,
        attempt: Attempt,
    ) -> Result<Resolution, ActionError> {
        let request = target.to_request(false);
        if request.is_empty() {
            return Err(ActionError::InvalidArgs("no element hints supplied".into()));
        }
        match self
            .resolver
            .resolve(driver, &request)
            .await
            .map_err(locator_err)?
        {
            Some(hit) => {
                if attempt.mitigation == Some(Mitigation::ScrollIntoView) {
                    driver.scroll_into_view(hit.node).await?;
                }
                Ok(hit)
            }
            None => Err(ActionError::NotFound(describe_target(target))),
        }
    }

    /// First-failure self-heal for element-addressed tools: force a re-scan
    /// (the planner's snapshot may be one step stale) and retry on the
    /// durable hints with the numeric handle dropped.
    async fn healed_target(
        &self,
        target: &TargetArgs,
        err: &ActionError,
    ) -> Result<Option<TargetArgs>, ActionError> {
        if !err.is_retryable() {
            return Ok(None);
        }
        let mut healed = target.clone();
        healed.handle = None;
        if healed.is_empty() {
            return Ok(None);
        }
        warn!(error = %err, "element tool failed; re-scanning and retrying without the handle");
        let driver = self.driver()?;
        scan(driver.as_ref(), &self.registry).await?;
        Ok(Some(healed))
    }

    async fn run_verify(&self, spec: &VerifySpec) -> Result<(), ActionError> {
        let driver = self.driver()?;
        verify_after(
            driver.as_ref(),
            &self.resolver,
            spec,
            self.config.verify_timeout,
            self.config.verify_interval,
        )
        .await
    }

    /// Diff the tab set around the act. A new tab (or an active-tab change
    /// without creation) moves the controller's current target.
    async fn follow_side_effects(
        &self,
        before: &BrowserSnapshot,
    ) -> Result<Option<TabId>, ActionError> {
        let after = self.host.snapshot().await?;
        let known: HashSet<TabId> = before.tab_ids().into_iter().collect();
        if let Some(fresh) = after.tabs.iter().find(|t| !known.contains(&t.id)) {
            info!(tab = %fresh.id, url = %fresh.url, "following new tab");
            self.host.activate(fresh.id).await?;
            *self.current.lock() = fresh.id;
            let driver = self.driver()?;
            if let Err(err) = wait_ready(
                driver.as_ref(),
                self.config.ready_timeout,
                self.config.ready_interval,
            )
            .await
            {
                warn!(tab = %fresh.id, error = %err, "new tab slow to become ready");
            }
            return Ok(Some(fresh.id));
        }
        if after.active != before.active {
            if let Some(active) = after.active {
                debug!(tab = %active, "active tab changed, following");
                *self.current.lock() = active;
            }
        }
        Ok(None)
    }
}

fn verify_spec_of(call: &ToolCall) -> Option<&VerifySpec> {
    match call {
        ToolCall::Tap(args) => args.verify_after.as_ref(),
        ToolCall::Navigate(args) => args.verify_after.as_ref(),
        _ => None,
    }
}

fn describe_target(target: &TargetArgs) -> String {
    target
        .text
        .clone()
        .or_else(|| target.selector.clone())
        .or_else(|| target.dom_id.clone())
        .or_else(|| {
            target
                .signature
                .as_ref()
                .and_then(|s| s.text.clone().or_else(|| s.id.clone()))
        })
        .map(|hint| format!("no element matching '{hint}'"))
        .unwrap_or_else(|| "no element matching the request".to_string())
}

fn pointer_nudge() -> (f64, f64) {
    let mut rng = rand::thread_rng();
    (rng.gen_range(-4.0..4.0), rng.gen_range(-4.0..4.0))
}

/// Default the scheme to https and reject what the backend cannot load.
fn sanitize_url(raw: &str) -> Result<String, ActionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ActionError::InvalidArgs("empty url".into()));
    }
    let candidate = if trimmed.contains("://") || trimmed.starts_with("about:") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    if candidate.starts_with("about:") {
        return Ok(candidate);
    }
    let parsed = url::Url::parse(&candidate)
        .map_err(|e| ActionError::InvalidArgs(format!("bad url '{trimmed}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(candidate),
        other => Err(ActionError::InvalidArgs(format!(
            "unsupported scheme '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_defaults_scheme_and_rejects_junk() {
        assert_eq!(sanitize_url("example.org").unwrap(), "https://example.org");
        assert_eq!(
            sanitize_url(" https://a.test/x ").unwrap(),
            "https://a.test/x"
        );
        assert_eq!(sanitize_url("about:blank").unwrap(), "about:blank");
        assert!(sanitize_url("javascript://alert(1)").is_err());
        assert!(sanitize_url("   ").is_err());
    }

    #[test]
    fn engine_table_covers_the_documented_engines() {
        for engine in ["google", "bing", "duckduckgo"] {
            assert!(ENGINES.contains_key(engine));
        }
    }
}
