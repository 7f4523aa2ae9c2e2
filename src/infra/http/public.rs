use axum::{
    Form, Router,
    extract::{Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, HeaderName},
    },
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    application::{
        comments::{CommentForm, CommentService, SubmissionOutcome},
        error::{ErrorReport, HttpError},
        listing::ListingService,
        pages::{PageError, PageScheduler},
    },
    presentation::views::{
        CommentFormView, LayoutChrome, render_error_response, render_not_found_response,
    },
};

use super::RouterState;

const SOURCE: &str = "infra::http::public";

const PAGE_CACHE_HEADER: HeaderName = HeaderName::from_static("x-page-cache");

#[derive(Clone)]
pub struct HttpState {
    pub pages: PageScheduler,
    pub listing: ListingService,
    pub comments: CommentService,
}

impl HttpState {
    fn chrome(&self) -> LayoutChrome {
        self.listing.chrome().clone()
    }
}

pub(super) fn routes() -> Router<RouterState> {
    Router::new()
        .route("/", get(index))
        .route("/post/{slug}", get(post_detail))
        .route("/post/{slug}/comment", post(submit_comment_form))
        .route("/_health", get(health))
        .fallback(fallback)
}

async fn index(State(state): State<HttpState>) -> Response {
    match state.listing.render_index().await {
        Ok(html) => (
            [(CACHE_CONTROL, HeaderValue::from_static("no-store"))],
            Html(html),
        )
            .into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_detail(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    match state.pages.request(&slug).await {
        Ok(served) => {
            let mut response = Html(served.page.html.clone()).into_response();
            let headers = response.headers_mut();
            headers.insert(
                PAGE_CACHE_HEADER,
                HeaderValue::from_static(served.cache.as_str()),
            );
            if let Ok(value) = HeaderValue::from_str(&format!(
                "s-maxage={}, stale-while-revalidate",
                state.pages.window().as_secs()
            )) {
                headers.insert(CACHE_CONTROL, value);
            }
            response
        }
        Err(err) => page_error_to_response(err, state.chrome()),
    }
}

/// HTML form fallback for the comment API. The path decides which post the
/// comment belongs to; the hidden `_id` field is ignored.
async fn submit_comment_form(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    Form(mut form): Form<CommentForm>,
) -> Response {
    let served = match state.pages.request(&slug).await {
        Ok(served) => served,
        Err(err) => return page_error_to_response(err, state.chrome()),
    };
    form.post_id = served.page.post_id.clone();

    let mut view = CommentFormView::empty(&served.page.post_id, &served.page.slug);
    let mut report = None;
    let status = match state.comments.submit(&form).await {
        SubmissionOutcome::Accepted => {
            view.submitted = true;
            StatusCode::OK
        }
        SubmissionOutcome::Invalid(errors) => {
            view.name_error = errors.name;
            view.email_error = errors.email;
            view.comment_error = errors.comment;
            retain_values(&mut view, form);
            StatusCode::UNPROCESSABLE_ENTITY
        }
        // The post id comes from the page itself, so this only happens if the
        // page's own id is blank.
        SubmissionOutcome::MissingPost => {
            view.failed = true;
            retain_values(&mut view, form);
            report = Some(ErrorReport::from_message(
                SOURCE,
                StatusCode::UNPROCESSABLE_ENTITY,
                "comment form has no post reference",
            ));
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SubmissionOutcome::Failed { reason } => {
            view.failed = true;
            retain_values(&mut view, form);
            report = Some(ErrorReport::from_message(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                reason,
            ));
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    match served.page.render_with_form(view) {
        Ok(html) => {
            let mut response = (
                status,
                [(CACHE_CONTROL, HeaderValue::from_static("no-store"))],
                Html(html),
            )
                .into_response();
            if let Some(report) = report {
                report.attach(&mut response);
            }
            response
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn retain_values(view: &mut CommentFormView, form: CommentForm) {
    view.name = form.name;
    view.email = form.email;
    view.comment = form.comment;
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn fallback(State(state): State<HttpState>) -> Response {
    render_not_found_response(state.chrome())
}

fn page_error_to_response(err: PageError, chrome: LayoutChrome) -> Response {
    match err {
        PageError::NotFound { .. } => {
            let mut response = render_not_found_response(chrome);
            ErrorReport::from_error(
                "infra::http::page_error_to_response",
                StatusCode::NOT_FOUND,
                &err,
            )
            .attach(&mut response);
            response
        }
        PageError::Fetch(_) => {
            let mut response = render_error_response(
                chrome,
                StatusCode::BAD_GATEWAY,
                "This page could not be loaded right now. Please try again shortly.",
            );
            ErrorReport::from_error(
                "infra::http::page_error_to_response",
                StatusCode::BAD_GATEWAY,
                &err,
            )
            .attach(&mut response);
            response
        }
        err => HttpError::from(err).into_response(),
    }
}
