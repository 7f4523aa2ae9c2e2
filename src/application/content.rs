//! Content query layer: typed reads over the content store.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::store::{
    ContentStore, GroqQuery, POST_BY_SLUG, POST_LISTING, POST_SLUGS, StoreError,
};
use crate::domain::entities::{Post, PostPath, PostSummary};

const SOURCE: &str = "pressroom::content";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("`{template}` returned an unexpected document shape: {message}")]
    Decode {
        template: &'static str,
        message: String,
    },
}

#[derive(Clone)]
pub struct ContentQueries {
    store: Arc<dyn ContentStore>,
}

impl ContentQueries {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Slugs of every post, in store order.
    pub async fn post_paths(&self) -> Result<Vec<PostPath>, QueryError> {
        self.fetch_many(GroqQuery::new(POST_SLUGS)).await
    }

    pub async fn listing(&self) -> Result<Vec<PostSummary>, QueryError> {
        self.fetch_many(GroqQuery::new(POST_LISTING)).await
    }

    /// The post addressed by `slug` with author and approved comments joined,
    /// or `None` when no post carries that slug.
    pub async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>, QueryError> {
        self.fetch_one(GroqQuery::new(POST_BY_SLUG).bind("slug", slug))
            .await
    }

    async fn fetch_one<T: DeserializeOwned>(
        &self,
        query: GroqQuery,
    ) -> Result<Option<T>, QueryError> {
        let name = query.template().name;
        let value = self.store.fetch(&query).await?;
        if value.is_null() {
            debug!(target = SOURCE, template = name, "query matched no document");
            return Ok(None);
        }
        decode(name, value).map(Some)
    }

    async fn fetch_many<T: DeserializeOwned>(&self, query: GroqQuery) -> Result<Vec<T>, QueryError> {
        let name = query.template().name;
        let value = self.store.fetch(&query).await?;
        decode_each(name, value)
    }
}

/// Decode each element on its own. One malformed document is logged and
/// skipped so it cannot take the whole collection down with it.
fn decode_each<T: DeserializeOwned>(
    template: &'static str,
    value: Value,
) -> Result<Vec<T>, QueryError> {
    let elements = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(elements) => elements,
        other => {
            return Err(QueryError::Decode {
                template,
                message: format!("expected an array, got {other}"),
            });
        }
    };

    let mut decoded = Vec::with_capacity(elements.len());
    for element in elements {
        let id = element
            .get("_id")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>")
            .to_string();
        match decode(template, element) {
            Ok(item) => decoded.push(item),
            Err(err) => {
                warn!(
                    target = SOURCE,
                    template,
                    document = %id,
                    error = %err,
                    "skipping malformed document"
                );
            }
        }
    }
    Ok(decoded)
}

fn decode<T: DeserializeOwned>(template: &'static str, value: Value) -> Result<T, QueryError> {
    serde_json::from_value(value).map_err(|err| QueryError::Decode {
        template,
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::infra::store::MemoryStore;

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(vec![
            json!({
                "_id": "author-1",
                "_type": "author",
                "name": "grace hopper",
                "image": { "asset": { "_ref": "image-a1-64x64-png" } }
            }),
            json!({
                "_id": "post-1",
                "_type": "post",
                "_createdAt": "2022-03-14T10:12:33Z",
                "title": "Hello World",
                "description": "First post",
                "slug": { "current": "hello-world" },
                "author": { "_type": "reference", "_ref": "author-1" },
                "body": []
            }),
        ]))
    }

    #[tokio::test]
    async fn post_by_slug_resolves_author() {
        let queries = ContentQueries::new(store());
        let post = queries
            .post_by_slug("hello-world")
            .await
            .expect("query succeeds")
            .expect("post exists");

        assert_eq!(post.id, "post-1");
        assert_eq!(
            post.author.map(|author| author.name).as_deref(),
            Some("grace hopper")
        );
    }

    #[tokio::test]
    async fn missing_slug_is_absent_not_an_error() {
        let queries = ContentQueries::new(store());
        let post = queries.post_by_slug("missing").await.expect("query succeeds");
        assert!(post.is_none());
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let store = store();
        store.set_offline(true);
        let queries = ContentQueries::new(store);

        let err = queries
            .post_by_slug("hello-world")
            .await
            .expect_err("offline store fails");
        assert!(matches!(err, QueryError::Store(StoreError::Unavailable(_))));
    }

    fn store_with_draft() -> Arc<MemoryStore> {
        let store = store();
        store.insert(json!({
            "_id": "drafts.post-2",
            "_type": "post",
            "_createdAt": "2022-04-01T00:00:00Z",
            "title": "Work in progress"
        }));
        store
    }

    #[tokio::test]
    async fn listing_skips_posts_without_a_slug() {
        let queries = ContentQueries::new(store_with_draft());
        let listing = queries.listing().await.expect("query succeeds");
        let ids: Vec<_> = listing.iter().map(|post| post.id.as_str()).collect();
        assert_eq!(ids, vec!["post-1"]);
    }

    #[tokio::test]
    async fn paths_skip_posts_without_a_slug() {
        let queries = ContentQueries::new(store_with_draft());
        let paths = queries.post_paths().await.expect("query succeeds");
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].slug.current, "hello-world");
    }

    #[test]
    fn malformed_collection_entry_is_skipped() {
        let decoded: Vec<PostPath> = decode_each(
            "post_slugs",
            json!([
                { "_id": "p1", "slug": { "current": "one" } },
                { "_id": "p2", "slug": 7 }
            ]),
        )
        .expect("array decodes");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].slug.current, "one");
    }

    #[test]
    fn non_array_collection_is_a_decode_error() {
        let err = decode_each::<PostPath>("post_slugs", json!({ "_id": "p1" }))
            .expect_err("object is not a collection");
        assert!(matches!(err, QueryError::Decode { template: "post_slugs", .. }));
    }

    #[tokio::test]
    async fn paths_list_every_post() {
        let queries = ContentQueries::new(store());
        let paths = queries.post_paths().await.expect("query succeeds");
        let slugs: Vec<_> = paths.iter().map(|path| path.slug.current.as_str()).collect();
        assert_eq!(slugs, vec!["hello-world"]);
    }
}
