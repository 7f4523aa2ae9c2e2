use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pressroom::application::{
    content::ContentQueries,
    pages::{CacheStatus, PageError, PageScheduler, PageState, PostComposer},
    render::{BlockRenderer, TransformRegistry},
    store::{ContentStore, DocumentId, GroqQuery, NewDocument, StoreError},
};
use pressroom::infra::{images::ImageUrlBuilder, store::MemoryStore};
use pressroom::presentation::views::LayoutChrome;
use serde_json::{Value, json};

const WINDOW: Duration = Duration::from_secs(60);

fn documents() -> Vec<Value> {
    vec![
        json!({ "_id": "author-1", "_type": "author", "name": "grace hopper" }),
        json!({
            "_id": "post-1",
            "_type": "post",
            "_createdAt": "2022-03-14T10:12:33Z",
            "title": "Hello World",
            "slug": { "current": "hello-world" },
            "author": { "_type": "reference", "_ref": "author-1" },
            "body": [{
                "_type": "block",
                "style": "normal",
                "children": [{ "_type": "span", "text": "First draft" }]
            }]
        }),
        json!({
            "_id": "comment-1",
            "_type": "comment",
            "post": { "_type": "reference", "_ref": "post-1" },
            "name": "Ada",
            "email": "ada@example.com",
            "comment": "Lovely",
            "approved": true
        }),
        json!({
            "_id": "comment-2",
            "_type": "comment",
            "post": { "_type": "reference", "_ref": "post-1" },
            "name": "Mallory",
            "email": "mallory@example.com",
            "comment": "Pending review",
            "approved": false
        }),
    ]
}

/// Store whose reads take a while, so overlapping requests really overlap.
struct SlowStore {
    inner: Arc<MemoryStore>,
    latency: Duration,
}

#[async_trait]
impl ContentStore for SlowStore {
    async fn fetch(&self, query: &GroqQuery) -> Result<Value, StoreError> {
        tokio::time::sleep(self.latency).await;
        self.inner.fetch(query).await
    }

    async fn create(&self, document: NewDocument) -> Result<DocumentId, StoreError> {
        self.inner.create(document).await
    }
}

fn scheduler(store: Arc<MemoryStore>) -> PageScheduler {
    scheduler_over(store)
}

fn slow_scheduler(store: Arc<MemoryStore>) -> PageScheduler {
    scheduler_over(Arc::new(SlowStore {
        inner: store,
        latency: Duration::from_millis(250),
    }))
}

fn scheduler_over(store: Arc<dyn ContentStore>) -> PageScheduler {
    let images = ImageUrlBuilder::new("abc123", "production");
    PageScheduler::new(
        ContentQueries::new(store),
        Arc::new(BlockRenderer::new(TransformRegistry::with_defaults(
            images.clone(),
        ))),
        PostComposer::new(images, LayoutChrome::new("Pressroom", "")),
        WINDOW,
    )
}

#[tokio::test(start_paused = true)]
async fn first_request_blocks_until_built() {
    let store = Arc::new(MemoryStore::new(documents()));
    let pages = scheduler(store.clone());
    assert_eq!(pages.state("hello-world"), PageState::Unbuilt);

    let served = pages.request("hello-world").await.expect("page builds");

    assert_eq!(served.cache, CacheStatus::Miss);
    assert!(served.page.html.contains("Hello World"));
    assert!(served.page.html.contains("Grace Hopper"));
    assert!(served.page.html.contains("First draft"));
    assert_eq!(pages.state("hello-world"), PageState::Fresh);
}

#[tokio::test(start_paused = true)]
async fn only_approved_comments_are_shown() {
    let store = Arc::new(MemoryStore::new(documents()));
    let pages = scheduler(store);

    let served = pages.request("hello-world").await.expect("page builds");

    assert!(served.page.html.contains("Lovely"));
    assert!(!served.page.html.contains("Pending review"));
    assert!(served.page.html.contains("Comments: (1)"));
}

#[tokio::test(start_paused = true)]
async fn unknown_slug_is_not_found_and_leaves_nothing_cached() {
    let store = Arc::new(MemoryStore::new(documents()));
    let pages = scheduler(store);

    let err = pages.request("missing").await.expect_err("no such post");

    assert!(matches!(err, PageError::NotFound { ref slug } if slug == "missing"));
    assert_eq!(pages.state("missing"), PageState::Unbuilt);
    assert_eq!(pages.cached_slugs(), 0);
}

#[tokio::test(start_paused = true)]
async fn malformed_slug_never_reaches_the_store() {
    let store = Arc::new(MemoryStore::new(documents()));
    let pages = scheduler(store.clone());

    let err = pages.request("../etc/passwd").await.expect_err("rejected");

    assert!(matches!(err, PageError::NotFound { .. }));
    assert_eq!(store.fetch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn requests_within_the_window_are_served_from_cache() {
    let store = Arc::new(MemoryStore::new(documents()));
    let pages = scheduler(store.clone());
    pages.request("hello-world").await.expect("page builds");
    let fetches = store.fetch_count();

    tokio::time::advance(Duration::from_secs(30)).await;
    let served = pages.request("hello-world").await.expect("cached page");

    assert_eq!(served.cache, CacheStatus::Hit);
    assert_eq!(store.fetch_count(), fetches);
}

#[tokio::test(start_paused = true)]
async fn stale_page_is_served_while_it_regenerates() {
    let store = Arc::new(MemoryStore::new(documents()));
    let pages = scheduler(store.clone());
    pages.request("hello-world").await.expect("page builds");

    assert!(store.patch("post-1", "title", json!("Hello Again")));
    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(pages.state("hello-world"), PageState::Stale);

    let stale = pages.request("hello-world").await.expect("stale page");
    assert_eq!(stale.cache, CacheStatus::Stale);
    assert!(stale.page.html.contains("Hello World"));

    pages.settle("hello-world").await;
    let fresh = pages.request("hello-world").await.expect("fresh page");
    assert_eq!(fresh.cache, CacheStatus::Hit);
    assert!(fresh.page.html.contains("Hello Again"));
}

#[tokio::test(start_paused = true)]
async fn approved_comment_appears_after_regeneration() {
    let store = Arc::new(MemoryStore::new(documents()));
    let pages = scheduler(store.clone());
    pages.request("hello-world").await.expect("page builds");

    assert!(store.patch("comment-2", "approved", json!(true)));
    let cached = pages.request("hello-world").await.expect("cached page");
    assert!(!cached.page.html.contains("Pending review"));

    tokio::time::advance(Duration::from_secs(61)).await;
    pages.request("hello-world").await.expect("stale page");
    pages.settle("hello-world").await;

    let fresh = pages.request("hello-world").await.expect("fresh page");
    assert!(fresh.page.html.contains("Pending review"));
}

#[tokio::test(start_paused = true)]
async fn concurrent_first_requests_share_one_build() {
    let store = Arc::new(MemoryStore::new(documents()));
    let pages = slow_scheduler(store.clone());

    let (first, second, during) = tokio::join!(
        pages.request("hello-world"),
        pages.request("hello-world"),
        async {
            tokio::task::yield_now().await;
            pages.state("hello-world")
        }
    );

    assert_eq!(during, PageState::Building);
    let first = first.expect("first request");
    let second = second.expect("second request");
    assert_eq!(first.cache, CacheStatus::Miss);
    assert_eq!(second.cache, CacheStatus::Miss);
    assert!(Arc::ptr_eq(&first.page, &second.page));
    assert_eq!(store.fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_requests_trigger_one_regeneration() {
    let store = Arc::new(MemoryStore::new(documents()));
    let pages = slow_scheduler(store.clone());
    pages.request("hello-world").await.expect("page builds");
    assert!(store.patch("post-1", "title", json!("Hello Again")));
    tokio::time::advance(Duration::from_secs(61)).await;
    let fetches = store.fetch_count();

    for _ in 0..5 {
        let stale = pages.request("hello-world").await.expect("stale page");
        assert_eq!(stale.cache, CacheStatus::Stale);
    }
    assert_eq!(pages.state("hello-world"), PageState::Building);
    pages.settle("hello-world").await;

    assert_eq!(store.fetch_count(), fetches + 1);
    let fresh = pages.request("hello-world").await.expect("fresh page");
    assert_eq!(fresh.cache, CacheStatus::Hit);
    assert!(fresh.page.html.contains("Hello Again"));
}

#[tokio::test(start_paused = true)]
async fn slugs_with_dots_and_accents_are_addressable() {
    let mut docs = documents();
    docs.push(json!({
        "_id": "post-release",
        "_type": "post",
        "_createdAt": "2022-04-01T00:00:00Z",
        "title": "Release 1.2",
        "slug": { "current": "release-v1.2" }
    }));
    docs.push(json!({
        "_id": "post-cafe",
        "_type": "post",
        "_createdAt": "2022-04-02T00:00:00Z",
        "title": "Café Notes",
        "slug": { "current": "café-notes" }
    }));
    let store = Arc::new(MemoryStore::new(docs));
    let pages = scheduler(store);

    let release = pages.request("release-v1.2").await.expect("dotted slug builds");
    assert!(release.page.html.contains("Release 1.2"));
    let cafe = pages.request("café-notes").await.expect("accented slug builds");
    assert!(cafe.page.html.contains("Café Notes"));

    let report = pages.prebuild(2).await.expect("prebuild succeeds");
    assert!(report.missing.is_empty());
    assert!(report.built.contains(&"release-v1.2".to_string()));
    assert!(report.built.contains(&"café-notes".to_string()));
}

#[tokio::test(start_paused = true)]
async fn draft_without_a_slug_does_not_block_prebuild() {
    let mut docs = documents();
    docs.push(json!({
        "_id": "drafts.post-3",
        "_type": "post",
        "_createdAt": "2022-04-01T00:00:00Z",
        "title": "Unfinished"
    }));
    let store = Arc::new(MemoryStore::new(docs));
    let pages = scheduler(store);

    let report = pages.prebuild(2).await.expect("prebuild succeeds");

    assert_eq!(report.built, vec!["hello-world".to_string()]);
    assert!(report.missing.is_empty());
    assert!(report.failed.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_regeneration_keeps_serving_the_stale_page() {
    let store = Arc::new(MemoryStore::new(documents()));
    let pages = scheduler(store.clone());
    pages.request("hello-world").await.expect("page builds");

    store.set_offline(true);
    tokio::time::advance(Duration::from_secs(61)).await;
    pages.request("hello-world").await.expect("stale page");
    pages.settle("hello-world").await;

    assert_eq!(pages.state("hello-world"), PageState::Stale);
    let again = pages.request("hello-world").await.expect("still served");
    assert_eq!(again.cache, CacheStatus::Stale);
    assert!(again.page.html.contains("Hello World"));
}

#[tokio::test(start_paused = true)]
async fn deleted_post_drops_its_page_on_regeneration() {
    let store = Arc::new(MemoryStore::new(documents()));
    let pages = scheduler(store.clone());
    pages.request("hello-world").await.expect("page builds");

    assert!(store.remove("post-1"));
    tokio::time::advance(Duration::from_secs(61)).await;
    pages.request("hello-world").await.expect("stale page");
    pages.settle("hello-world").await;

    assert_eq!(pages.state("hello-world"), PageState::Unbuilt);
    assert!(matches!(
        pages.request("hello-world").await,
        Err(PageError::NotFound { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn first_build_failure_is_a_fetch_error_and_caches_nothing() {
    let store = Arc::new(MemoryStore::new(documents()));
    store.set_offline(true);
    let pages = scheduler(store.clone());

    let err = pages.request("hello-world").await.expect_err("store down");

    assert!(matches!(err, PageError::Fetch(_)));
    assert_eq!(pages.cached_slugs(), 0);

    store.set_offline(false);
    let served = pages.request("hello-world").await.expect("recovers");
    assert_eq!(served.cache, CacheStatus::Miss);
}

#[tokio::test(start_paused = true)]
async fn prebuild_builds_every_listed_post() {
    let mut docs = documents();
    docs.push(json!({
        "_id": "post-2",
        "_type": "post",
        "_createdAt": "2022-04-01T00:00:00Z",
        "title": "Second",
        "slug": { "current": "second" }
    }));
    let store = Arc::new(MemoryStore::new(docs));
    let pages = scheduler(store);

    let report = pages.prebuild(2).await.expect("prebuild succeeds");

    assert_eq!(report.built, vec!["hello-world".to_string(), "second".to_string()]);
    assert!(report.missing.is_empty());
    assert!(report.failed.is_empty());
    assert!(pages.is_precomputed("second"));
    assert_eq!(pages.state("second"), PageState::Fresh);
}

#[tokio::test(start_paused = true)]
async fn post_published_after_prebuild_is_built_on_first_request() {
    let store = Arc::new(MemoryStore::new(documents()));
    let pages = scheduler(store.clone());
    pages.prebuild(2).await.expect("prebuild succeeds");

    store.insert(json!({
        "_id": "post-late",
        "_type": "post",
        "_createdAt": "2022-05-01T00:00:00Z",
        "title": "Late Edition",
        "slug": { "current": "late-edition" }
    }));

    assert!(!pages.is_precomputed("late-edition"));
    let served = pages.request("late-edition").await.expect("built on demand");
    assert_eq!(served.cache, CacheStatus::Miss);
    assert!(served.page.html.contains("Late Edition"));
}
