//! Registry of hosted pages
//!
//! The coordinator broadcasts through a [`PageHub`]: pages are registered by
//! URL when they open and get a runtime handle attached once their event loop
//! is running. A registered page without a live handle is still listed, and
//! deliveries to it fail as not ready.

use super::runtime::PageHandle;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};
use voicefocus_core::domain::message::{Command, PageAck};
use voicefocus_core::domain::relay::{DeliveryError, PageDirectory, PageId, PageInfo, UrlPattern};

#[derive(Debug)]
struct PageEntry {
    url: String,
    handle: Option<PageHandle>,
}

#[derive(Debug, Default)]
struct HubState {
    next_id: u64,
    pages: BTreeMap<PageId, PageEntry>,
}

/// Shared page registry; clones refer to the same registry
#[derive(Debug, Clone, Default)]
pub struct PageHub {
    state: Arc<RwLock<HubState>>,
}

impl PageHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page that has just opened `url`
    pub fn register(&self, url: impl Into<String>) -> PageId {
        let url = url.into();
        let mut state = self.write();
        state.next_id += 1;
        let id = PageId::new(state.next_id);

        info!(page = %id, %url, "Page registered");
        state.pages.insert(id, PageEntry { url, handle: None });
        id
    }

    /// Make a registered page reachable through its runtime handle
    ///
    /// Returns `false` when the page is unknown.
    pub fn attach(&self, handle: PageHandle) -> bool {
        let id = handle.id();
        match self.write().pages.get_mut(&id) {
            Some(entry) => {
                debug!(page = %id, "Runtime attached");
                entry.handle = Some(handle);
                true
            }
            None => false,
        }
    }

    /// Forget a page (tab closed)
    pub fn remove(&self, id: PageId) -> bool {
        let removed = self.write().pages.remove(&id).is_some();
        if removed {
            info!(page = %id, "Page removed");
        }
        removed
    }

    pub fn url(&self, id: PageId) -> Option<String> {
        self.read().pages.get(&id).map(|entry| entry.url.clone())
    }

    pub fn len(&self) -> usize {
        self.read().pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn handle(&self, id: PageId) -> Option<PageHandle> {
        self.read().pages.get(&id).and_then(|entry| entry.handle.clone())
    }

    fn read(&self) -> RwLockReadGuard<'_, HubState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HubState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PageDirectory for PageHub {
    async fn pages(&self, pattern: &UrlPattern) -> Vec<PageInfo> {
        self.read()
            .pages
            .iter()
            .filter(|(_, entry)| pattern.matches(&entry.url))
            .map(|(id, entry)| PageInfo {
                id: *id,
                url: entry.url.clone(),
            })
            .collect()
    }

    async fn deliver(&self, page: PageId, command: Command) -> Result<PageAck, DeliveryError> {
        // The registry lock is never held across the await
        let handle = self.handle(page).ok_or(DeliveryError::NotReady(page))?;
        handle.send(command).await
    }
}
