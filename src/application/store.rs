//! Content store port: parameterized queries and document creation.
//!
//! Queries are GROQ templates paired with named parameters. Parameter values
//! travel separately from the query text (`$slug` bound to a JSON literal), so
//! callers can never splice store syntax into a query.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("content store unreachable: {0}")]
    Unavailable(String),
    #[error("content store returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("content store rejected the mutation: {0}")]
    Rejected(String),
    #[error("content store response could not be decoded: {0}")]
    Decode(String),
    #[error("content store credentials are missing for `{operation}`")]
    Unauthorized { operation: &'static str },
    #[error("query template `{0}` is not supported by this store")]
    UnsupportedQuery(&'static str),
}

impl StoreError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// A named GROQ query. The name lets stores that do not speak GROQ evaluate
/// the same query natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTemplate {
    pub name: &'static str,
    pub groq: &'static str,
}

/// Every addressable post's id and slug, used for the precomputed path list.
/// Drafts without a slug are not addressable and are left out.
pub const POST_SLUGS: QueryTemplate = QueryTemplate {
    name: "post_slugs",
    groq: r#"*[_type == "post" && defined(slug.current)]{
  _id,
  slug {
    current
  }
}"#,
};

/// Listing projection with the author dereferenced.
pub const POST_LISTING: QueryTemplate = QueryTemplate {
    name: "post_listing",
    groq: r#"*[_type == "post" && defined(slug.current)]{
  _id,
  _createdAt,
  title,
  description,
  author -> {
    name,
    image
  },
  mainImage,
  slug
}"#,
};

/// One post by slug, with its author dereferenced and only approved comments
/// joined in. The approval filter is part of the query, not a post-pass.
pub const POST_BY_SLUG: QueryTemplate = QueryTemplate {
    name: "post_by_slug",
    groq: r#"*[_type == "post" && slug.current == $slug][0]{
  _id,
  _createdAt,
  title,
  description,
  author -> {
    name,
    image
  },
  'comments': *[
    _type == "comment" &&
    post._ref == ^._id &&
    approved == true
  ],
  mainImage,
  slug,
  body
}"#,
};

#[derive(Debug, Clone, PartialEq)]
pub struct GroqQuery {
    template: QueryTemplate,
    params: BTreeMap<String, Value>,
}

impl GroqQuery {
    pub fn new(template: QueryTemplate) -> Self {
        Self {
            template,
            params: BTreeMap::new(),
        }
    }

    /// Bind `$name` to a JSON literal.
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn template(&self) -> QueryTemplate {
        self.template
    }

    pub fn groq(&self) -> &'static str {
        self.template.groq
    }

    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.param(name).and_then(Value::as_str)
    }
}

/// Document to create; the store assigns `_id` and `_createdAt`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDocument {
    #[serde(rename = "_type")]
    pub doc_type: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl NewDocument {
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("_type".to_string(), Value::String(self.doc_type.clone()));
        Value::Object(object)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Execute a query. A JSON `null` result means no document matched.
    async fn fetch(&self, query: &GroqQuery) -> Result<Value, StoreError>;

    async fn create(&self, document: NewDocument) -> Result<DocumentId, StoreError>;
}
