use crate::application::error::{ErrorReport, HttpError};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

/// Render a template to a string, for pages that are cached or written to disk.
pub fn render_to_string<T: Template>(
    source: &'static str,
    template: &T,
) -> Result<String, TemplateRenderError> {
    template
        .render()
        .map_err(|err| TemplateRenderError::new(source, "Template rendering failed", err))
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    render_to_string("presentation::views::render_template", &template)
        .map(Html)
        .map_err(HttpError::from)
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome.for_page("Page Not Found", ""), content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

pub fn render_error_response(chrome: LayoutChrome, status: StatusCode, message: &str) -> Response {
    let content = ErrorPageView {
        title: status
            .canonical_reason()
            .unwrap_or("Something went wrong")
            .to_string(),
        message: message.to_string(),
        primary_action: ErrorAction::home(),
    };
    let view = LayoutContext::new(chrome.for_page(&content.title, ""), content);
    render_template_response(ErrorTemplate { view }, status)
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub tagline: String,
    pub href: String,
}

#[derive(Clone)]
pub struct FooterView {
    pub copy: String,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub description: String,
    pub image: String,
}

/// Site-wide frame shared by every page.
#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub footer: FooterView,
    pub meta: PageMetaView,
}

impl LayoutChrome {
    pub fn new(title: impl Into<String>, tagline: impl Into<String>) -> Self {
        let title = title.into();
        let tagline = tagline.into();
        Self {
            brand: BrandView {
                title: title.clone(),
                tagline: tagline.clone(),
                href: "/".to_string(),
            },
            footer: FooterView {
                copy: format!("© {title}"),
            },
            meta: PageMetaView {
                title,
                description: tagline,
                image: String::new(),
            },
        }
    }

    /// Chrome for one page: `<title>` becomes `page | site`.
    pub fn for_page(&self, title: &str, description: &str) -> Self {
        let mut chrome = self.clone();
        if !title.is_empty() {
            chrome.meta.title = format!("{title} | {}", self.brand.title);
        }
        if !description.is_empty() {
            chrome.meta.description = description.to_string();
        }
        chrome
    }

    pub fn with_image(mut self, image: String) -> Self {
        self.meta.image = image;
        self
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub footer: FooterView,
    pub meta: PageMetaView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            footer: chrome.footer,
            meta: chrome.meta,
            content,
        }
    }
}

#[derive(Clone)]
pub struct PostCard {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub author_name: String,
    pub author_image: String,
    pub main_image: String,
    pub published: String,
    pub iso_date: String,
}

pub struct IndexContext {
    pub posts: Vec<PostCard>,
    pub has_posts: bool,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexContext>,
}

#[derive(Clone)]
pub struct CommentView {
    pub name: String,
    pub comment: String,
}

#[derive(Clone)]
pub struct PostDetailContext {
    pub slug: String,
    pub post_id: String,
    pub title: String,
    pub description: String,
    pub author_name: String,
    pub author_image: String,
    pub main_image: String,
    pub published: String,
    pub iso_date: String,
    pub body_html: String,
    pub comments: Vec<CommentView>,
    pub comment_count: usize,
    /// Pre-rendered comment form or acknowledgment.
    pub form_html: String,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

/// Comment form state. `submitted` swaps the form for the acknowledgment.
#[derive(Clone, Default)]
pub struct CommentFormView {
    pub post_id: String,
    pub action: String,
    pub name: String,
    pub email: String,
    pub comment: String,
    pub name_error: bool,
    pub email_error: bool,
    pub comment_error: bool,
    pub failed: bool,
    pub submitted: bool,
}

impl CommentFormView {
    pub fn empty(post_id: &str, slug: &str) -> Self {
        Self {
            post_id: post_id.to_string(),
            action: format!("/post/{slug}/comment"),
            ..Self::default()
        }
    }
}

#[derive(Template)]
#[template(path = "partials/comment_form.html")]
pub struct CommentFormTemplate {
    pub form: CommentFormView,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: ErrorAction,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist. Try returning to the homepage to continue reading.".to_string(),
            primary_action: ErrorAction::home(),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

/// `Mar 14, 2022`.
pub fn format_published(at: OffsetDateTime) -> String {
    at.format(format_description!(
        "[month repr:short] [day padding:none], [year]"
    ))
    .unwrap_or_default()
}

pub fn format_iso(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_default()
}

/// Capitalise the first letter of every space-separated word, leaving the rest
/// as authored.
pub fn display_name(name: &str) -> String {
    name.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
