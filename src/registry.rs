//! A concurrent registry of live pages with a background sweeper that
//! evicts anything past its TTL.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;

use crate::session::Page;

pub(crate) struct Registry {
    pages: Arc<DashMap<String, Arc<Page>>>,
    sweeper: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Registry {
    pub(crate) fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        let pages: Arc<DashMap<String, Arc<Page>>> = Arc::new(DashMap::new());
        let sweep_pages = pages.clone();
        let sweeper = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                ticker.tick().await;
                let before = sweep_pages.len();
                sweep_pages.retain(|_, page| !page.is_expired(ttl));
                let evicted = before.saturating_sub(sweep_pages.len());
                if evicted > 0 {
                    tracing::debug!(evicted, "swept expired pages");
                }
            }
        });
        Registry {
            pages,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    /// Stops the background sweeper. Idempotent.
    pub(crate) fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().unwrap().take() {
            handle.abort();
        }
    }

    pub(crate) fn insert(&self, page: Arc<Page>) {
        self.pages.insert(page.token().to_string(), page);
    }

    pub(crate) fn get(&self, token: &str) -> Option<Arc<Page>> {
        self.pages.get(token).map(|entry| entry.clone())
    }

    pub(crate) fn remove(&self, token: &str) -> Option<Arc<Page>> {
        self.pages.remove(token).map(|(_, page)| page)
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
