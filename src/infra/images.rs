//! Image asset references to CDN URLs.
//!
//! Asset ids look like `image-<id>-<width>x<height>-<format>`; the CDN path is
//! `<base>/<project>/<dataset>/<id>-<width>x<height>.<format>`.

use crate::domain::entities::ImageRef;

pub const DEFAULT_IMAGE_CDN: &str = "https://cdn.sanity.io/images";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUrlBuilder {
    base: String,
    project_id: String,
    dataset: String,
}

impl ImageUrlBuilder {
    pub fn new(project_id: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self::with_base(DEFAULT_IMAGE_CDN, project_id, dataset)
    }

    pub fn with_base(
        base: impl Into<String>,
        project_id: impl Into<String>,
        dataset: impl Into<String>,
    ) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            dataset: dataset.into(),
        }
    }

    /// URL for an asset id, or `None` when the id is not an image asset.
    pub fn asset_url(&self, asset_ref: &str) -> Option<String> {
        let asset = ParsedAsset::parse(asset_ref)?;
        Some(format!(
            "{}/{}/{}/{}-{}.{}",
            self.base, self.project_id, self.dataset, asset.id, asset.dimensions, asset.format
        ))
    }

    pub fn image_url(&self, image: &ImageRef) -> Option<String> {
        image.asset_ref().and_then(|reference| self.asset_url(reference))
    }

    /// Like [`image_url`](Self::image_url) but never absent, for templates.
    pub fn image_url_or_empty(&self, image: Option<&ImageRef>) -> String {
        image
            .and_then(|image| self.image_url(image))
            .unwrap_or_default()
    }
}

struct ParsedAsset<'a> {
    id: &'a str,
    dimensions: &'a str,
    format: &'a str,
}

impl<'a> ParsedAsset<'a> {
    fn parse(reference: &'a str) -> Option<Self> {
        let rest = reference.strip_prefix("image-")?;
        let (rest, format) = rest.rsplit_once('-')?;
        let (id, dimensions) = rest.rsplit_once('-')?;

        let (width, height) = dimensions.split_once('x')?;
        let numeric = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if id.is_empty()
            || !numeric(width)
            || !numeric(height)
            || format.is_empty()
            || !format.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return None;
        }

        Some(Self {
            id,
            dimensions,
            format,
        })
    }
}
