//! Turns a resolved post plus its rendered body into a full page.

use std::fmt;

use tokio::time::Instant;

use crate::domain::entities::Post;
use crate::infra::images::ImageUrlBuilder;
use crate::presentation::views::{
    CommentFormTemplate, CommentFormView, CommentView, LayoutChrome, LayoutContext,
    PostDetailContext, PostTemplate, TemplateRenderError, display_name, format_iso,
    format_published, render_to_string,
};

const SOURCE: &str = "application::pages::compose";

/// A generated post page. `layout` is kept so the page can be re-rendered with
/// a different comment form state without refetching.
#[derive(Clone)]
pub struct RenderedPage {
    pub slug: String,
    pub post_id: String,
    pub title: String,
    pub html: String,
    pub layout: LayoutContext<PostDetailContext>,
    pub generated_at: Instant,
}

impl RenderedPage {
    pub fn is_fresh(&self, window: std::time::Duration) -> bool {
        self.generated_at.elapsed() <= window
    }

    pub fn render_with_form(&self, form: CommentFormView) -> Result<String, TemplateRenderError> {
        let mut layout = self.layout.clone();
        layout.content.form_html = render_to_string(SOURCE, &CommentFormTemplate { form })?;
        render_to_string(SOURCE, &PostTemplate { view: layout })
    }
}

impl fmt::Debug for RenderedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedPage")
            .field("slug", &self.slug)
            .field("post_id", &self.post_id)
            .field("title", &self.title)
            .field("generated_at", &self.generated_at)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct PostComposer {
    images: ImageUrlBuilder,
    chrome: LayoutChrome,
}

impl PostComposer {
    pub fn new(images: ImageUrlBuilder, chrome: LayoutChrome) -> Self {
        Self { images, chrome }
    }

    pub fn compose(&self, post: &Post, body_html: String) -> Result<RenderedPage, TemplateRenderError> {
        let main_image = self.images.image_url_or_empty(post.main_image.as_ref());
        let description = post.description.clone().unwrap_or_default();
        let (author_name, author_image) = match &post.author {
            Some(author) => (
                display_name(&author.name),
                self.images.image_url_or_empty(author.image.as_ref()),
            ),
            None => (String::new(), String::new()),
        };

        let comments: Vec<CommentView> = post
            .comments
            .iter()
            .map(|comment| CommentView {
                name: comment.name.clone(),
                comment: comment.comment.clone(),
            })
            .collect();

        let form = CommentFormView::empty(&post.id, post.slug());
        let content = PostDetailContext {
            slug: post.slug().to_string(),
            post_id: post.id.clone(),
            title: post.title.clone(),
            description: description.clone(),
            author_name,
            author_image,
            main_image: main_image.clone(),
            published: format_published(post.created_at),
            iso_date: format_iso(post.created_at),
            body_html,
            comment_count: comments.len(),
            comments,
            form_html: render_to_string(SOURCE, &CommentFormTemplate { form })?,
        };

        let chrome = self
            .chrome
            .for_page(&post.title, &description)
            .with_image(main_image);
        let layout = LayoutContext::new(chrome, content);
        let html = render_to_string(
            SOURCE,
            &PostTemplate {
                view: layout.clone(),
            },
        )?;

        Ok(RenderedPage {
            slug: post.slug().to_string(),
            post_id: post.id.clone(),
            title: post.title.clone(),
            html,
            layout,
            generated_at: Instant::now(),
        })
    }
}
