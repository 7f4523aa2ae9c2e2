//! Domain entities mirrored from content store documents.
//!
//! Field names follow the store's JSON conventions (`_id`, `_createdAt`,
//! `slug.current`, `mainImage`). Projections return `null` for fields a
//! document lacks, so optional scalars are `Option` and collections decode
//! `null` as empty.

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::domain::blocks::Block;

/// Reference to an image asset, e.g. `{ "asset": { "_ref": "image-abc-800x600-jpg" } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(default)]
    pub asset: Option<AssetRef>,
}

impl ImageRef {
    pub fn from_asset(reference: impl Into<String>) -> Self {
        Self {
            asset: Some(AssetRef {
                reference: reference.into(),
            }),
        }
    }

    pub fn asset_ref(&self) -> Option<&str> {
        self.asset.as_ref().map(|asset| asset.reference.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    #[serde(rename = "_ref")]
    pub reference: String,
}

/// A `{ "_type": "reference", "_ref": "…" }` pointer to another document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    #[serde(rename = "_ref")]
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlugField {
    pub current: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub image: Option<ImageRef>,
}

/// A fully resolved post: author dereferenced and approved comments joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub slug: SlugField,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(rename = "mainImage", default)]
    pub main_image: Option<ImageRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: Vec<Block>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments: Vec<Comment>,
}

impl Post {
    pub fn slug(&self) -> &str {
        &self.slug.current
    }
}

/// Listing projection of a post: no body, no comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub slug: SlugField,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(rename = "mainImage", default)]
    pub main_image: Option<ImageRef>,
}

/// Entry of the precomputed path list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPath {
    #[serde(rename = "_id")]
    pub id: String,
    pub slug: SlugField,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub post: Option<DocumentRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comment: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub approved: bool,
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn post_decodes_null_projections() {
        let post: Post = serde_json::from_value(json!({
            "_id": "post-1",
            "_createdAt": "2022-03-14T10:12:33Z",
            "title": "Hello",
            "description": null,
            "slug": { "current": "hello" },
            "author": null,
            "mainImage": null,
            "body": null,
            "comments": null
        }))
        .expect("post decodes");

        assert_eq!(post.slug(), "hello");
        assert!(post.description.is_none());
        assert!(post.author.is_none());
        assert!(post.body.is_empty());
        assert!(post.comments.is_empty());
    }

    #[test]
    fn comment_approved_defaults_to_false() {
        let comment: Comment = serde_json::from_value(json!({
            "_id": "c1",
            "post": { "_type": "reference", "_ref": "post-1" },
            "name": "Ada",
            "email": "ada@example.com",
            "comment": "Nice"
        }))
        .expect("comment decodes");

        assert!(!comment.approved);
        assert_eq!(
            comment.post.map(|post| post.reference).as_deref(),
            Some("post-1")
        );
    }

    #[test]
    fn image_ref_exposes_asset() {
        let image = ImageRef::from_asset("image-abc-10x10-png");
        assert_eq!(image.asset_ref(), Some("image-abc-10x10-png"));
    }
}
