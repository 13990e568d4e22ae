//! In-memory tab host over simulated pages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use pagepilot_core_types::TabId;
use parking_lot::Mutex;
use tracing::debug;

use crate::errors::PageError;
use crate::sim::dom::PageDescription;
use crate::sim::page::{SharedRoutes, SimPage};
use crate::types::{BrowserSnapshot, TabInfo};
use crate::{PageDriver, TabHost};

struct TabSlot {
    page: Arc<SimPage>,
    opener: Option<TabId>,
}

/// Simulated browser: a set of tabs, one active, sharing a route table.
///
/// Popups raised by pages (anchor activations with `target="_blank"`) become
/// real tabs on the next `snapshot()` call, which mirrors how an orchestrator
/// observes new tabs only when it re-reads the tab list.
pub struct SimBrowser {
    tabs: DashMap<u64, TabSlot>,
    order: Mutex<Vec<TabId>>,
    active: Mutex<Option<TabId>>,
    next: AtomicU64,
    routes: SharedRoutes,
}

impl SimBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tabs: DashMap::new(),
            order: Mutex::new(Vec::new()),
            active: Mutex::new(None),
            next: AtomicU64::new(1),
            routes: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Register a page description swapped in whenever any tab navigates to
    /// `url` (including popups and `open()`).
    pub fn add_route(&self, url: impl Into<String>, description: PageDescription) {
        self.routes.lock().insert(url.into(), description);
    }

    /// Open a tab directly from a description.
    pub fn open_page(&self, description: PageDescription, active: bool) -> TabId {
        let page = Arc::new(SimPage::with_routes(description, self.routes.clone()));
        self.insert_tab(page, active, None)
    }

    pub fn page(&self, tab: TabId) -> Option<Arc<SimPage>> {
        self.tabs.get(&tab.0).map(|slot| slot.page.clone())
    }

    pub fn active_tab(&self) -> Option<TabId> {
        *self.active.lock()
    }

    fn insert_tab(&self, page: Arc<SimPage>, active: bool, opener: Option<TabId>) -> TabId {
        let id = TabId(self.next.fetch_add(1, Ordering::SeqCst));
        self.tabs.insert(id.0, TabSlot { page, opener });
        self.order.lock().push(id);
        let mut current = self.active.lock();
        if active || current.is_none() {
            *current = Some(id);
        }
        id
    }

    fn page_for_url(&self, url: &str) -> SimPage {
        match self.routes.lock().get(url) {
            Some(desc) => SimPage::with_routes(desc.clone(), self.routes.clone()),
            None => SimPage::with_routes(PageDescription::new(url), self.routes.clone()),
        }
    }

    /// Turn pending popups into tabs. Popups take focus, like a browser's
    /// default foreground `window.open`.
    fn collect_popups(&self) {
        let existing: Vec<(TabId, Arc<SimPage>)> = self
            .order
            .lock()
            .iter()
            .filter_map(|id| self.page(*id).map(|p| (*id, p)))
            .collect();
        for (opener, page) in existing {
            for url in page.take_popups() {
                debug!(url = %url, opener = %opener, "popup opened as new tab");
                let popup = Arc::new(self.page_for_url(&url));
                self.insert_tab(popup, true, Some(opener));
            }
        }
    }
}

#[async_trait]
impl TabHost for SimBrowser {
    async fn snapshot(&self) -> Result<BrowserSnapshot, PageError> {
        self.collect_popups();
        let active = *self.active.lock();
        let mut tabs = Vec::new();
        let order: Vec<TabId> = self.order.lock().iter().copied().collect();
        for id in order.iter() {
            if let Some(slot) = self.tabs.get(&id.0) {
                let state = slot.page.page_state().await?;
                tabs.push(TabInfo {
                    id: *id,
                    url: state.url,
                    title: state.title,
                    active: Some(*id) == active,
                    opener: slot.opener,
                });
            }
        }
        Ok(BrowserSnapshot { tabs, active })
    }

    async fn activate(&self, tab: TabId) -> Result<(), PageError> {
        if !self.tabs.contains_key(&tab.0) {
            return Err(PageError::UnknownTab(tab));
        }
        *self.active.lock() = Some(tab);
        Ok(())
    }

    async fn open(&self, url: &str, active: bool) -> Result<TabId, PageError> {
        let page = Arc::new(self.page_for_url(url));
        Ok(self.insert_tab(page, active, None))
    }

    fn driver(&self, tab: TabId) -> Option<Arc<dyn PageDriver>> {
        self.page(tab).map(|p| p as Arc<dyn PageDriver>)
    }
}
