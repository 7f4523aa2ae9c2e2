use std::sync::Arc;
use std::time::Duration;

use httpmock::MockServer;
use pressroom::application::{
    comments::{CommentForm, CommentService, SubmissionOutcome},
    content::{ContentQueries, QueryError},
    store::StoreError,
};
use pressroom::infra::store::{SanityEndpoints, SanityStore};
use serde_json::json;
use url::Url;

fn store(server: &MockServer, token: Option<&str>) -> Arc<SanityStore> {
    let base = Url::parse(&server.base_url()).expect("mock server url");
    Arc::new(
        SanityStore::new(
            SanityEndpoints::single(base),
            "production",
            "2021-10-21",
            token.map(str::to_string),
            false,
            Duration::from_secs(5),
        )
        .expect("store builds"),
    )
}

#[tokio::test]
async fn post_by_slug_binds_the_slug_parameter() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/v2021-10-21/data/query/production")
                .query_param("$slug", "\"hello-world\"");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "ms": 3,
                    "result": {
                        "_id": "post-1",
                        "_createdAt": "2022-03-14T10:12:33Z",
                        "title": "Hello World",
                        "description": null,
                        "slug": { "current": "hello-world" },
                        "author": { "name": "grace hopper", "image": null },
                        "mainImage": null,
                        "body": null,
                        "comments": [{
                            "_id": "c1",
                            "name": "Ada",
                            "email": "ada@example.com",
                            "comment": "Lovely",
                            "approved": true
                        }]
                    }
                }));
        })
        .await;

    let queries = ContentQueries::new(store(&server, None));
    let post = queries
        .post_by_slug("hello-world")
        .await
        .expect("query succeeds")
        .expect("post exists");

    mock.assert_async().await;
    assert_eq!(post.id, "post-1");
    assert_eq!(post.slug(), "hello-world");
    assert!(post.body.is_empty());
    assert_eq!(post.comments.len(), 1);
}

#[tokio::test]
async fn null_result_means_no_post() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/v2021-10-21/data/query/production");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "ms": 1, "result": null }));
        })
        .await;

    let queries = ContentQueries::new(store(&server, None));
    let post = queries.post_by_slug("missing").await.expect("query succeeds");
    assert!(post.is_none());
}

#[tokio::test]
async fn error_status_surfaces_the_store_description() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/v2021-10-21/data/query/production");
            then.status(400)
                .header("content-type", "application/json")
                .json_body(json!({
                    "error": { "description": "param $slug referenced, but not provided" }
                }));
        })
        .await;

    let queries = ContentQueries::new(store(&server, None));
    let err = queries.listing().await.expect_err("store refuses");

    match err {
        QueryError::Store(StoreError::Status { status, message }) => {
            assert_eq!(status, 400);
            assert!(message.contains("not provided"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn comment_is_created_through_the_mutate_endpoint() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/v2021-10-21/data/mutate/production")
                .query_param("returnIds", "true")
                .header("authorization", "Bearer write-token")
                .json_body_includes(
                    r#"{"mutations":[{"create":{"_type":"comment","name":"Reader","approved":false}}]}"#,
                );
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "transactionId": "tx1",
                    "results": [{ "id": "comment-9", "operation": "create" }]
                }));
        })
        .await;

    let comments = CommentService::new(store(&server, Some("write-token")));
    let outcome = comments
        .submit(&CommentForm {
            post_id: "post-1".to_string(),
            name: "Reader".to_string(),
            email: "reader@example.com".to_string(),
            comment: "Nice".to_string(),
        })
        .await;

    mock.assert_async().await;
    assert_eq!(outcome, SubmissionOutcome::Accepted);
}

#[tokio::test]
async fn rejected_mutation_is_a_failed_submission() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("POST").path("/v2021-10-21/data/mutate/production");
            then.status(403)
                .header("content-type", "application/json")
                .json_body(json!({ "error": { "description": "insufficient permissions" } }));
        })
        .await;

    let comments = CommentService::new(store(&server, Some("read-only")));
    let outcome = comments
        .submit(&CommentForm {
            post_id: "post-1".to_string(),
            name: "Reader".to_string(),
            email: "reader@example.com".to_string(),
            comment: "Nice".to_string(),
        })
        .await;

    match outcome {
        SubmissionOutcome::Failed { reason } => assert!(reason.contains("insufficient permissions")),
        other => panic!("unexpected outcome: {other:?}"),
    }
}
