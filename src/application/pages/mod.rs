//! Incremental static generation of post pages.
//!
//! A slug moves through `Unbuilt → Building → Fresh → Stale`. The first
//! request for an unbuilt slug waits for the build. A stale page is served
//! immediately while one background task regenerates it. A slug the store
//! does not know is Not Found and leaves nothing cached.

mod cache;
mod compose;

use std::{
    collections::BTreeSet,
    sync::{Arc, RwLock},
    time::Duration,
};

use futures::{StreamExt, stream};
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::content::{ContentQueries, QueryError};
use crate::application::render::RenderService;
use crate::domain::slug::validate_slug;
use crate::presentation::views::TemplateRenderError;
use crate::util::lock::{rw_read, rw_write};

use cache::{PageCache, SlugEntry};
pub use compose::{PostComposer, RenderedPage};

const SOURCE: &str = "pressroom::pages";

pub(crate) const METRIC_PAGE_CACHE_HIT: &str = "pressroom_page_cache_hit_total";
pub(crate) const METRIC_PAGE_CACHE_STALE: &str = "pressroom_page_cache_stale_total";
pub(crate) const METRIC_PAGE_CACHE_MISS: &str = "pressroom_page_cache_miss_total";
pub(crate) const METRIC_PAGE_REGENERATIONS: &str = "pressroom_page_regenerations_total";

pub const DEFAULT_REVALIDATE: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum PageError {
    #[error("no post is published at `{slug}`")]
    NotFound { slug: String },
    #[error("failed to load page content")]
    Fetch(#[from] QueryError),
    #[error("failed to render page")]
    Render(#[from] TemplateRenderError),
}

impl PageError {
    fn not_found(slug: &str) -> Self {
        Self::NotFound {
            slug: slug.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Stale,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Stale => "STALE",
            CacheStatus::Miss => "MISS",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageResponse {
    pub page: Arc<RenderedPage>,
    pub cache: CacheStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Unbuilt,
    Building,
    Fresh,
    Stale,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PrebuildReport {
    pub built: Vec<String>,
    pub missing: Vec<String>,
    pub failed: Vec<(String, String)>,
}

#[derive(Clone)]
pub struct PageScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    queries: ContentQueries,
    renderer: Arc<dyn RenderService>,
    composer: PostComposer,
    window: Duration,
    cache: PageCache,
    precomputed: RwLock<BTreeSet<String>>,
}

impl PageScheduler {
    pub fn new(
        queries: ContentQueries,
        renderer: Arc<dyn RenderService>,
        composer: PostComposer,
        window: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                queries,
                renderer,
                composer,
                window,
                cache: PageCache::default(),
                precomputed: RwLock::new(BTreeSet::new()),
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Serve the page for `slug`, building or regenerating as its state demands.
    pub async fn request(&self, slug: &str) -> Result<PageResponse, PageError> {
        if let Err(err) = validate_slug(slug) {
            debug!(target = SOURCE, slug, error = %err, "rejecting malformed slug");
            return Err(PageError::not_found(slug));
        }

        let entry = self.inner.cache.entry(slug);
        if let Some(page) = entry.current() {
            if page.is_fresh(self.inner.window) {
                counter!(METRIC_PAGE_CACHE_HIT).increment(1);
                return Ok(PageResponse {
                    page,
                    cache: CacheStatus::Hit,
                });
            }

            counter!(METRIC_PAGE_CACHE_STALE).increment(1);
            self.spawn_regeneration(slug, &entry);
            return Ok(PageResponse {
                page,
                cache: CacheStatus::Stale,
            });
        }

        counter!(METRIC_PAGE_CACHE_MISS).increment(1);
        if !self.is_precomputed(slug) {
            debug!(target = SOURCE, slug, "slug outside precomputed paths; building on demand");
        }
        let page = self.build_blocking(slug, entry).await?;
        Ok(PageResponse {
            page,
            cache: CacheStatus::Miss,
        })
    }

    pub fn state(&self, slug: &str) -> PageState {
        let Some(entry) = self.inner.cache.get(slug) else {
            return PageState::Unbuilt;
        };
        if entry.is_building() {
            return PageState::Building;
        }
        match entry.current() {
            None => PageState::Unbuilt,
            Some(page) if page.is_fresh(self.inner.window) => PageState::Fresh,
            Some(_) => PageState::Stale,
        }
    }

    /// Wait until no build is running for `slug`.
    pub async fn settle(&self, slug: &str) {
        if let Some(entry) = self.inner.cache.get(slug) {
            let _ = entry.build.lock().await;
        }
    }

    /// Number of slugs holding a cache slot.
    pub fn cached_slugs(&self) -> usize {
        self.inner.cache.len()
    }

    pub fn is_precomputed(&self, slug: &str) -> bool {
        rw_read(&self.inner.precomputed, SOURCE, "is_precomputed").contains(slug)
    }

    /// Build every known slug ahead of traffic. Individual failures are logged
    /// and reported, not fatal; only failing to list the slugs is an error.
    pub async fn prebuild(&self, concurrency: usize) -> Result<PrebuildReport, PageError> {
        let paths = self.inner.queries.post_paths().await?;
        let slugs: Vec<String> = paths.into_iter().map(|path| path.slug.current).collect();

        rw_write(&self.inner.precomputed, SOURCE, "prebuild").extend(slugs.iter().cloned());
        info!(target = SOURCE, count = slugs.len(), "prebuilding post pages");

        let results: Vec<(String, Result<PageResponse, PageError>)> = stream::iter(slugs)
            .map(|slug| async move {
                let result = self.request(&slug).await;
                (slug, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut report = PrebuildReport::default();
        for (slug, result) in results {
            match result {
                Ok(_) => report.built.push(slug),
                Err(PageError::NotFound { .. }) => {
                    warn!(target = SOURCE, slug = %slug, "listed slug has no post");
                    report.missing.push(slug);
                }
                Err(err) => {
                    warn!(target = SOURCE, slug = %slug, error = %err, "prebuild failed");
                    report.failed.push((slug, err.to_string()));
                }
            }
        }
        report.built.sort();
        report.missing.sort();
        report.failed.sort();

        Ok(report)
    }

    async fn build_blocking(
        &self,
        slug: &str,
        mut entry: Arc<SlugEntry>,
    ) -> Result<Arc<RenderedPage>, PageError> {
        let guard = loop {
            let guard = Arc::clone(&entry.build).lock_owned().await;

            // A concurrent request may have finished the build while we waited.
            if let Some(page) = entry.current() {
                return Ok(page);
            }

            // A failed build may have evicted this slot while we waited; build
            // on the live one so two slots never generate the same slug.
            if self.inner.cache.is_live(slug, &entry) {
                break guard;
            }
            drop(guard);
            entry = self.inner.cache.entry(slug);
        };

        let result = self.generate(slug).await;
        match result {
            Ok(Some(page)) => {
                self.inner.cache.publish(slug, &entry, Arc::clone(&page));
                info!(target = SOURCE, slug, "page built");
                Ok(page)
            }
            Ok(None) => {
                drop(guard);
                self.inner.cache.evict_if_empty(slug);
                debug!(target = SOURCE, slug, "no post for slug");
                Err(PageError::not_found(slug))
            }
            Err(err) => {
                drop(guard);
                self.inner.cache.evict_if_empty(slug);
                Err(err)
            }
        }
    }

    fn spawn_regeneration(&self, slug: &str, entry: &Arc<SlugEntry>) {
        let Ok(guard) = Arc::clone(&entry.build).try_lock_owned() else {
            debug!(target = SOURCE, slug, "regeneration already in flight");
            return;
        };

        let scheduler = self.clone();
        let entry = Arc::clone(entry);
        let slug = slug.to_string();
        tokio::spawn(async move {
            if entry
                .current()
                .is_some_and(|page| page.is_fresh(scheduler.inner.window))
            {
                return;
            }

            counter!(METRIC_PAGE_REGENERATIONS).increment(1);
            match scheduler.generate(&slug).await {
                Ok(Some(page)) => {
                    scheduler.inner.cache.publish(&slug, &entry, page);
                    info!(target = SOURCE, slug = %slug, "page regenerated");
                }
                Ok(None) => {
                    entry.clear();
                    drop(guard);
                    scheduler.inner.cache.evict_if_empty(&slug);
                    info!(target = SOURCE, slug = %slug, "post removed; page dropped");
                }
                Err(err) => {
                    warn!(
                        target = SOURCE,
                        slug = %slug,
                        error = %err,
                        "regeneration failed; serving stale page"
                    );
                }
            }
        });
    }

    async fn generate(&self, slug: &str) -> Result<Option<Arc<RenderedPage>>, PageError> {
        let Some(post) = self.inner.queries.post_by_slug(slug).await? else {
            return Ok(None);
        };

        let body = self.inner.renderer.render(&post.body);
        if !body.unrecognized.is_empty() {
            debug!(
                target = SOURCE,
                slug,
                tags = ?body.unrecognized,
                "rendered with fallback transforms"
            );
        }

        let page = self.inner.composer.compose(&post, body.html)?;
        Ok(Some(Arc::new(page)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::application::render::{BlockRenderer, TransformRegistry};
    use crate::infra::{images::ImageUrlBuilder, store::MemoryStore};
    use crate::presentation::views::LayoutChrome;

    fn scheduler() -> PageScheduler {
        let store = Arc::new(MemoryStore::new(vec![json!({
            "_id": "post-1",
            "_type": "post",
            "_createdAt": "2022-03-14T10:12:33Z",
            "title": "Hello World",
            "slug": { "current": "hello-world" }
        })]));
        let images = ImageUrlBuilder::new("abc123", "production");
        PageScheduler::new(
            ContentQueries::new(store),
            Arc::new(BlockRenderer::new(TransformRegistry::with_defaults(
                images.clone(),
            ))),
            PostComposer::new(images, LayoutChrome::new("Pressroom", "")),
            DEFAULT_REVALIDATE,
        )
    }

    #[tokio::test]
    async fn build_on_an_evicted_slot_moves_to_the_live_one() {
        let pages = scheduler();
        let cache = &pages.inner.cache;
        let orphan = cache.entry("hello-world");
        cache.evict_if_empty("hello-world");
        let live = cache.entry("hello-world");
        assert!(!Arc::ptr_eq(&orphan, &live));

        pages
            .build_blocking("hello-world", orphan)
            .await
            .expect("page builds");

        assert!(cache.is_live("hello-world", &live));
        assert!(live.current().is_some());
        assert_eq!(pages.state("hello-world"), PageState::Fresh);
        assert_eq!(pages.cached_slugs(), 1);
    }
}
