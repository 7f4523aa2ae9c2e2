//! JSON boundary for comment submission.
//!
//! The body is decoded as JSON whatever its `Content-Type`: browser callers
//! post `JSON.stringify(form)` without setting one.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;

use crate::application::{
    comments::{CommentForm, CommentService, FieldErrors, SubmissionOutcome},
    error::ErrorReport,
};

use super::RouterState;

const SOURCE: &str = "infra::http::api";

#[derive(Clone)]
pub struct ApiState {
    pub comments: CommentService,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<FieldErrors>,
}

impl ApiMessage {
    fn new(message: &'static str) -> Self {
        Self {
            message,
            fields: None,
        }
    }
}

pub(super) fn routes() -> Router<RouterState> {
    Router::new().route("/api/createComment", post(create_comment))
}

async fn create_comment(
    State(state): State<ApiState>,
    body: Bytes,
) -> Response {
    let form: CommentForm = match serde_json::from_slice(&body) {
        Ok(form) => form,
        Err(err) => {
            let status = StatusCode::BAD_REQUEST;
            let mut response =
                (status, Json(ApiMessage::new("Malformed comment payload"))).into_response();
            ErrorReport::from_message(SOURCE, status, format!("invalid comment json: {err}"))
                .attach(&mut response);
            return response;
        }
    };

    match state.comments.submit(&form).await {
        SubmissionOutcome::Accepted => {
            (StatusCode::OK, Json(ApiMessage::new("Comment submitted"))).into_response()
        }
        SubmissionOutcome::Invalid(errors) => {
            let mut response = (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiMessage {
                    message: "Required fields are missing",
                    fields: Some(errors),
                }),
            )
                .into_response();
            ErrorReport::from_message(
                SOURCE,
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("validation failed: {errors:?}"),
            )
            .attach(&mut response);
            response
        }
        SubmissionOutcome::MissingPost => {
            let status = StatusCode::UNPROCESSABLE_ENTITY;
            let mut response =
                (status, Json(ApiMessage::new("Comment is not attached to a post"))).into_response();
            ErrorReport::from_message(SOURCE, status, "comment payload has no post id")
                .attach(&mut response);
            response
        }
        SubmissionOutcome::Failed { reason } => {
            let mut response = (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiMessage::new("Couldn't submit comment")),
            )
                .into_response();
            ErrorReport::from_message(SOURCE, StatusCode::INTERNAL_SERVER_ERROR, reason)
                .attach(&mut response);
            response
        }
    }
}
