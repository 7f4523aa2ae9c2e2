//! Per-slug artifact cache.
//!
//! Each slug owns an artifact slot and a build mutex. The mutex is the single
//! flight: whoever holds it is the only task generating that slug. Artifacts
//! are swapped as whole `Arc`s, so readers never observe a partial page.

use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::util::lock::{rw_read, rw_write};

use super::RenderedPage;

const SOURCE: &str = "application::pages::cache";

#[derive(Default)]
pub(crate) struct SlugEntry {
    artifact: RwLock<Option<Arc<RenderedPage>>>,
    pub(crate) build: Arc<Mutex<()>>,
}

impl SlugEntry {
    pub(crate) fn current(&self) -> Option<Arc<RenderedPage>> {
        rw_read(&self.artifact, SOURCE, "current").clone()
    }

    pub(crate) fn store(&self, page: Arc<RenderedPage>) {
        *rw_write(&self.artifact, SOURCE, "store") = Some(page);
    }

    pub(crate) fn clear(&self) {
        rw_write(&self.artifact, SOURCE, "clear").take();
    }

    pub(crate) fn is_building(&self) -> bool {
        self.build.try_lock().is_err()
    }
}

#[derive(Default)]
pub(crate) struct PageCache {
    entries: DashMap<String, Arc<SlugEntry>>,
}

impl PageCache {
    /// Entry for `slug`, created empty on first use.
    pub(crate) fn entry(&self, slug: &str) -> Arc<SlugEntry> {
        if let Some(existing) = self.entries.get(slug) {
            return Arc::clone(existing.value());
        }
        Arc::clone(self.entries.entry(slug.to_string()).or_default().value())
    }

    pub(crate) fn get(&self, slug: &str) -> Option<Arc<SlugEntry>> {
        self.entries.get(slug).map(|entry| Arc::clone(entry.value()))
    }

    /// Store `page` and make sure `entry` is reachable again if it was evicted
    /// while the build ran.
    pub(crate) fn publish(&self, slug: &str, entry: &Arc<SlugEntry>, page: Arc<RenderedPage>) {
        entry.store(page);
        self.entries
            .entry(slug.to_string())
            .or_insert_with(|| Arc::clone(entry));
    }

    /// Whether `entry` is still the slot the cache hands out for `slug`.
    pub(crate) fn is_live(&self, slug: &str, entry: &Arc<SlugEntry>) -> bool {
        self.entries
            .get(slug)
            .is_some_and(|live| Arc::ptr_eq(live.value(), entry))
    }

    /// Drop the slot for a slug that has no artifact, so absent posts leave
    /// nothing behind.
    pub(crate) fn evict_if_empty(&self, slug: &str) {
        self.entries
            .remove_if(slug, |_, entry| entry.current().is_none() && !entry.is_building());
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
