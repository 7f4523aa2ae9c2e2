//! Comment submission: validate, then persist as unapproved.
//!
//! Nothing here touches the page cache. A new comment only becomes visible
//! once a moderator approves it in the store and the post page regenerates.

use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::application::store::{ContentStore, NewDocument};

const SOURCE: &str = "pressroom::comments";

pub(crate) const METRIC_COMMENT_SUBMISSIONS: &str = "pressroom_comment_submissions_total";

/// Submitted form fields. JSON callers may name the post `postId` or `_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentForm {
    #[serde(rename = "postId", alias = "_id", default)]
    pub post_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub comment: String,
}

/// Which required fields were missing. `true` means the field failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors {
    pub name: bool,
    pub email: bool,
    pub comment: bool,
}

impl FieldErrors {
    pub fn any(&self) -> bool {
        self.name || self.email || self.comment
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted,
    Invalid(FieldErrors),
    /// The form names no post to attach the comment to.
    MissingPost,
    Failed { reason: String },
}

impl SubmissionOutcome {
    fn label(&self) -> &'static str {
        match self {
            SubmissionOutcome::Accepted => "accepted",
            SubmissionOutcome::Invalid(_) => "invalid",
            SubmissionOutcome::MissingPost => "missing_post",
            SubmissionOutcome::Failed { .. } => "failed",
        }
    }
}

pub fn validate(form: &CommentForm) -> FieldErrors {
    FieldErrors {
        name: form.name.trim().is_empty(),
        email: form.email.trim().is_empty(),
        comment: form.comment.trim().is_empty(),
    }
}

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn ContentStore>,
}

impl CommentService {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Validate and persist one comment. Safe to retry with the same form;
    /// every accepted call creates a new document.
    pub async fn submit(&self, form: &CommentForm) -> SubmissionOutcome {
        let outcome = self.submit_inner(form).await;
        counter!(METRIC_COMMENT_SUBMISSIONS, "outcome" => outcome.label()).increment(1);
        outcome
    }

    async fn submit_inner(&self, form: &CommentForm) -> SubmissionOutcome {
        let errors = validate(form);
        if errors.any() {
            return SubmissionOutcome::Invalid(errors);
        }

        let post_id = form.post_id.trim();
        if post_id.is_empty() {
            return SubmissionOutcome::MissingPost;
        }

        let document = NewDocument::new("comment")
            .with_field("post", json!({ "_type": "reference", "_ref": post_id }))
            .with_field("name", form.name.trim())
            .with_field("email", form.email.trim())
            .with_field("comment", form.comment.trim())
            .with_field("approved", false);

        match self.store.create(document).await {
            Ok(id) => {
                info!(
                    target = SOURCE,
                    post_id,
                    comment_id = id.as_str(),
                    "comment stored for moderation"
                );
                SubmissionOutcome::Accepted
            }
            Err(err) => {
                warn!(target = SOURCE, post_id, error = %err, "comment submission failed");
                SubmissionOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }
}
