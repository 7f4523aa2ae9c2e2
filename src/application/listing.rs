//! Home page listing. Rendered on every request, never cached.

use crate::application::content::{ContentQueries, QueryError};
use crate::domain::entities::PostSummary;
use crate::infra::images::ImageUrlBuilder;
use crate::presentation::views::{
    IndexContext, IndexTemplate, LayoutChrome, LayoutContext, PostCard, TemplateRenderError,
    display_name, format_iso, format_published, render_to_string,
};
use thiserror::Error;

const SOURCE: &str = "application::listing";

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("failed to load posts")]
    Fetch(#[from] QueryError),
    #[error("failed to render listing")]
    Render(#[from] TemplateRenderError),
}

#[derive(Clone)]
pub struct ListingService {
    queries: ContentQueries,
    images: ImageUrlBuilder,
    chrome: LayoutChrome,
}

impl ListingService {
    pub fn new(queries: ContentQueries, images: ImageUrlBuilder, chrome: LayoutChrome) -> Self {
        Self {
            queries,
            images,
            chrome,
        }
    }

    pub fn chrome(&self) -> &LayoutChrome {
        &self.chrome
    }

    pub async fn index_view(&self) -> Result<LayoutContext<IndexContext>, ListingError> {
        let posts: Vec<PostCard> = self
            .queries
            .listing()
            .await?
            .iter()
            .map(|summary| self.card(summary))
            .collect();

        Ok(LayoutContext::new(
            self.chrome.clone(),
            IndexContext {
                has_posts: !posts.is_empty(),
                posts,
            },
        ))
    }

    pub async fn render_index(&self) -> Result<String, ListingError> {
        let view = self.index_view().await?;
        Ok(render_to_string(SOURCE, &IndexTemplate { view })?)
    }

    fn card(&self, summary: &PostSummary) -> PostCard {
        let (author_name, author_image) = match &summary.author {
            Some(author) => (
                display_name(&author.name),
                self.images.image_url_or_empty(author.image.as_ref()),
            ),
            None => (String::new(), String::new()),
        };

        PostCard {
            slug: summary.slug.current.clone(),
            title: summary.title.clone(),
            description: summary.description.clone().unwrap_or_default(),
            author_name,
            author_image,
            main_image: self.images.image_url_or_empty(summary.main_image.as_ref()),
            published: format_published(summary.created_at),
            iso_date: format_iso(summary.created_at),
        }
    }
}
