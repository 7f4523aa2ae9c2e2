//! In-process content store backed by a list of JSON documents.
//!
//! Evaluates the named query templates natively, including the dereference
//! joins and the approved-only comment predicate, so it behaves like the
//! hosted store for every query this crate issues. Used for local fixtures
//! and tests.

use std::path::Path;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::application::store::{
    ContentStore, DocumentId, GroqQuery, NewDocument, POST_BY_SLUG, POST_LISTING, POST_SLUGS,
    StoreError,
};
use crate::infra::error::InfraError;
use crate::util::lock::{rw_read, rw_write};

const SOURCE: &str = "infra::store::memory";

#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<Vec<Value>>,
    offline: AtomicBool,
    fetches: AtomicUsize,
    creates: AtomicUsize,
}

impl MemoryStore {
    pub fn new(documents: Vec<Value>) -> Self {
        Self {
            documents: RwLock::new(documents),
            ..Self::default()
        }
    }

    /// Load a JSON array of documents from disk.
    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let raw = tokio::fs::read(path).await?;
        let documents: Vec<Value> = serde_json::from_slice(&raw).map_err(|err| {
            InfraError::configuration(format!(
                "fixture `{}` is not a JSON array of documents: {err}",
                path.display()
            ))
        })?;
        Ok(Self::new(documents))
    }

    pub fn insert(&self, document: Value) {
        rw_write(&self.documents, SOURCE, "insert").push(document);
    }

    /// Set a top-level field on the document with `_id == id`. Returns whether
    /// the document exists. Stands in for edits made outside this service,
    /// such as a moderator approving a comment.
    pub fn patch(&self, id: &str, field: &str, value: Value) -> bool {
        let mut documents = rw_write(&self.documents, SOURCE, "patch");
        match documents
            .iter_mut()
            .find(|doc| doc.get("_id").and_then(Value::as_str) == Some(id))
            .and_then(Value::as_object_mut)
        {
            Some(object) => {
                object.insert(field.to_string(), value);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut documents = rw_write(&self.documents, SOURCE, "remove");
        let before = documents.len();
        documents.retain(|doc| doc.get("_id").and_then(Value::as_str) != Some(id));
        documents.len() != before
    }

    pub fn documents_of_type(&self, doc_type: &str) -> Vec<Value> {
        rw_read(&self.documents, SOURCE, "documents_of_type")
            .iter()
            .filter(|doc| is_type(doc, doc_type))
            .cloned()
            .collect()
    }

    /// Make every subsequent call fail as if the store were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn evaluate(&self, query: &GroqQuery) -> Result<Value, StoreError> {
        let documents = rw_read(&self.documents, SOURCE, "evaluate");
        let template = query.template();
        if template == POST_SLUGS {
            Ok(Value::Array(
                addressable_posts(&documents)
                    .map(|post| {
                        json!({
                            "_id": field(post, "_id"),
                            "slug": { "current": post.pointer("/slug/current").cloned().unwrap_or(Value::Null) },
                        })
                    })
                    .collect(),
            ))
        } else if template == POST_LISTING {
            Ok(Value::Array(
                addressable_posts(&documents)
                    .map(|post| {
                        project(
                            post,
                            &["_id", "_createdAt", "title", "description", "mainImage", "slug"],
                            &documents,
                        )
                    })
                    .collect(),
            ))
        } else if template == POST_BY_SLUG {
            let slug = query.param_str("slug").ok_or_else(|| StoreError::Status {
                status: 400,
                message: "param $slug referenced, but not provided".to_string(),
            })?;

            let Some(post) = documents
                .iter()
                .filter(|doc| is_type(doc, "post"))
                .find(|post| post.pointer("/slug/current").and_then(Value::as_str) == Some(slug))
            else {
                return Ok(Value::Null);
            };

            let mut projected = project(
                post,
                &[
                    "_id",
                    "_createdAt",
                    "title",
                    "description",
                    "mainImage",
                    "slug",
                    "body",
                ],
                &documents,
            );
            if let Value::Object(object) = &mut projected {
                object.insert(
                    "comments".to_string(),
                    approved_comments(field(post, "_id").as_str(), &documents),
                );
            }
            Ok(projected)
        } else {
            Err(StoreError::UnsupportedQuery(template.name))
        }
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn fetch(&self, query: &GroqQuery) -> Result<Value, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        self.evaluate(query)
    }

    async fn create(&self, document: NewDocument) -> Result<DocumentId, StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let id = Uuid::new_v4().to_string();
        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(StoreError::decode)?;

        let mut value = document.to_value();
        if let Value::Object(object) = &mut value {
            object.insert("_id".to_string(), Value::String(id.clone()));
            object.insert("_createdAt".to_string(), Value::String(created_at));
        }
        self.insert(value);

        Ok(DocumentId(id))
    }
}

fn is_type(doc: &Value, doc_type: &str) -> bool {
    doc.get("_type").and_then(Value::as_str) == Some(doc_type)
}

/// Posts matching `defined(slug.current)`: the slug is present and not null.
fn addressable_posts(documents: &[Value]) -> impl Iterator<Item = &Value> {
    documents.iter().filter(|doc| {
        is_type(doc, "post") && doc.pointer("/slug/current").is_some_and(|slug| !slug.is_null())
    })
}

fn field(doc: &Value, name: &str) -> Value {
    doc.get(name).cloned().unwrap_or(Value::Null)
}

/// Project the named fields plus `author -> { name, image }`.
fn project(post: &Value, fields: &[&str], documents: &[Value]) -> Value {
    let mut object = Map::new();
    for name in fields {
        object.insert((*name).to_string(), field(post, name));
    }
    object.insert("author".to_string(), dereference_author(post, documents));
    Value::Object(object)
}

fn dereference_author(post: &Value, documents: &[Value]) -> Value {
    let Some(reference) = post.pointer("/author/_ref").and_then(Value::as_str) else {
        return Value::Null;
    };

    documents
        .iter()
        .find(|doc| doc.get("_id").and_then(Value::as_str) == Some(reference))
        .map(|author| {
            json!({
                "name": field(author, "name"),
                "image": field(author, "image"),
            })
        })
        .unwrap_or(Value::Null)
}

fn approved_comments(post_id: Option<&str>, documents: &[Value]) -> Value {
    let Some(post_id) = post_id else {
        return Value::Array(Vec::new());
    };

    Value::Array(
        documents
            .iter()
            .filter(|doc| {
                is_type(doc, "comment")
                    && doc.pointer("/post/_ref").and_then(Value::as_str) == Some(post_id)
                    && doc.get("approved").and_then(Value::as_bool) == Some(true)
            })
            .cloned()
            .collect(),
    )
}
