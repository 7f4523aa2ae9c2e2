//! Rich-text block tree carried in a post body.
//!
//! Blocks are tagged variants: text blocks (`_type == "block"`) are tagged by
//! their `style`, every other block by its `_type`. The tag is the dispatch key
//! for the rendering pipeline, so new block types need no change here.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::entities::null_as_default;

pub const TEXT_BLOCK_TYPE: &str = "block";
pub const DEFAULT_STYLE: &str = "normal";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "_type")]
    pub block_type: String,
    #[serde(rename = "_key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub children: Vec<Span>,
    #[serde(
        rename = "markDefs",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub mark_defs: Vec<MarkDef>,
    #[serde(rename = "listItem", default, skip_serializing_if = "Option::is_none")]
    pub list_item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    /// Type-specific fields of custom blocks (`asset`, `alt`, `code`, …).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Block {
    /// Text block with the given style and a single unmarked span.
    pub fn text(style: &str, text: impl Into<String>) -> Self {
        Self {
            block_type: TEXT_BLOCK_TYPE.to_string(),
            key: None,
            style: Some(style.to_string()),
            children: vec![Span::plain(text)],
            mark_defs: Vec::new(),
            list_item: None,
            level: None,
            fields: Map::new(),
        }
    }

    /// Custom block of the given type carrying arbitrary fields.
    pub fn custom(block_type: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            block_type: block_type.into(),
            key: None,
            style: None,
            children: Vec::new(),
            mark_defs: Vec::new(),
            list_item: None,
            level: None,
            fields,
        }
    }

    pub fn is_text(&self) -> bool {
        self.block_type == TEXT_BLOCK_TYPE
    }

    pub fn tag(&self) -> BlockTag {
        if self.is_text() {
            BlockTag::new(self.style.as_deref().unwrap_or(DEFAULT_STYLE))
        } else {
            BlockTag::new(self.block_type.as_str())
        }
    }

    pub fn list_kind(&self) -> Option<ListKind> {
        if !self.is_text() {
            return None;
        }
        self.list_item.as_deref().map(ListKind::from_tag)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// `asset._ref` of image-like blocks.
    pub fn asset_ref(&self) -> Option<&str> {
        self.field("asset")
            .and_then(|asset| asset.get("_ref"))
            .and_then(Value::as_str)
    }

    pub fn mark_def(&self, key: &str) -> Option<&MarkDef> {
        self.mark_defs.iter().find(|def| def.key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockTag(String);

impl BlockTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Number,
}

impl ListKind {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "number" => ListKind::Number,
            _ => ListKind::Bullet,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    #[serde(rename = "_type", default = "span_type")]
    pub span_type: String,
    #[serde(rename = "_key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub marks: Vec<String>,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            span_type: span_type(),
            key: None,
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn marked(text: impl Into<String>, marks: &[&str]) -> Self {
        Self {
            marks: marks.iter().map(|mark| mark.to_string()).collect(),
            ..Self::plain(text)
        }
    }
}

fn span_type() -> String {
    "span".to_string()
}

/// Annotation referenced from span marks by `_key` (links and similar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkDef {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_type")]
    pub mark_type: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl MarkDef {
    pub fn link(key: impl Into<String>, href: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("href".to_string(), Value::String(href.into()));
        Self {
            key: key.into(),
            mark_type: "link".to_string(),
            fields,
        }
    }

    pub fn href(&self) -> Option<&str> {
        self.fields.get("href").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn text_blocks_are_tagged_by_style() {
        let block: Block = serde_json::from_value(json!({
            "_type": "block",
            "_key": "a1",
            "style": "h2",
            "children": [{ "_type": "span", "text": "Intro", "marks": [] }],
            "markDefs": []
        }))
        .expect("block decodes");

        assert_eq!(block.tag().as_str(), "h2");
        assert!(block.is_text());
    }

    #[test]
    fn missing_style_defaults_to_normal() {
        let block: Block = serde_json::from_value(json!({
            "_type": "block",
            "children": [{ "text": "plain" }]
        }))
        .expect("block decodes");

        assert_eq!(block.tag().as_str(), DEFAULT_STYLE);
        assert_eq!(block.children[0].span_type, "span");
    }

    #[test]
    fn custom_blocks_keep_their_fields() {
        let block: Block = serde_json::from_value(json!({
            "_type": "image",
            "_key": "img",
            "asset": { "_type": "reference", "_ref": "image-abc-10x20-png" },
            "alt": "A diagram"
        }))
        .expect("image block decodes");

        assert_eq!(block.tag().as_str(), "image");
        assert_eq!(block.asset_ref(), Some("image-abc-10x20-png"));
        assert_eq!(block.field_str("alt"), Some("A diagram"));
        assert!(block.list_kind().is_none());
    }

    #[test]
    fn list_items_report_their_kind() {
        let mut block = Block::text("normal", "item");
        block.list_item = Some("number".to_string());
        assert_eq!(block.list_kind(), Some(ListKind::Number));

        block.list_item = Some("bullet".to_string());
        assert_eq!(block.list_kind(), Some(ListKind::Bullet));
    }

    #[test]
    fn link_mark_defs_expose_href() {
        let def: MarkDef = serde_json::from_value(json!({
            "_key": "l1",
            "_type": "link",
            "href": "https://example.com"
        }))
        .expect("mark def decodes");

        assert_eq!(def.href(), Some("https://example.com"));
    }
}
