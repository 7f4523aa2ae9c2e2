//! Tag → transform table.
//!
//! The table is the only place block kinds are known. Registering a transform
//! for a new tag is all it takes to teach the pipeline a new block type.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::domain::blocks::{Block, BlockTag, MarkDef};
use crate::infra::images::ImageUrlBuilder;

use super::transforms;

/// Renders one block. `inner` is the already rendered, escaped span content
/// of text blocks and empty for custom blocks.
pub type BlockTransform = Arc<dyn Fn(&Block, &str) -> String + Send + Sync>;

/// Wraps already rendered content in one mark.
pub type MarkTransform = Arc<dyn Fn(&MarkContext<'_>, &str) -> String + Send + Sync>;

/// The mark being applied: a decorator name (`strong`) or the key of an
/// annotation in the block's `markDefs`, resolved to its definition.
#[derive(Debug, Clone, Copy)]
pub struct MarkContext<'a> {
    pub mark: &'a str,
    pub definition: Option<&'a MarkDef>,
}

impl MarkContext<'_> {
    /// Dispatch name: the annotation type when defined, the decorator otherwise.
    pub fn kind(&self) -> &str {
        self.definition
            .map(|def| def.mark_type.as_str())
            .unwrap_or(self.mark)
    }
}

#[derive(Clone, Default)]
pub struct TransformRegistry {
    blocks: HashMap<BlockTag, BlockTransform>,
    marks: HashMap<String, MarkTransform>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry carrying the site's standard transforms.
    pub fn with_defaults(images: ImageUrlBuilder) -> Self {
        let mut registry = Self::new();
        transforms::install_defaults(&mut registry, images);
        registry
    }

    /// Add or replace the transform for `tag`.
    pub fn register_block<F>(&mut self, tag: impl Into<BlockTag>, transform: F) -> &mut Self
    where
        F: Fn(&Block, &str) -> String + Send + Sync + 'static,
    {
        self.blocks.insert(tag.into(), Arc::new(transform));
        self
    }

    pub fn register_mark<F>(&mut self, name: &str, transform: F) -> &mut Self
    where
        F: Fn(&MarkContext<'_>, &str) -> String + Send + Sync + 'static,
    {
        self.marks.insert(name.to_string(), Arc::new(transform));
        self
    }

    pub fn block(&self, tag: &BlockTag) -> Option<&BlockTransform> {
        self.blocks.get(tag)
    }

    pub fn mark(&self, name: &str) -> Option<&MarkTransform> {
        self.marks.get(name)
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut blocks: Vec<_> = self.blocks.keys().map(BlockTag::as_str).collect();
        blocks.sort_unstable();
        let mut marks: Vec<_> = self.marks.keys().map(String::as_str).collect();
        marks.sort_unstable();
        f.debug_struct("TransformRegistry")
            .field("blocks", &blocks)
            .field("marks", &marks)
            .finish()
    }
}
