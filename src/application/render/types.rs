use crate::domain::blocks::{Block, BlockTag};

/// Deterministic rendering result returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    /// Sanitised HTML ready for embedding in a page.
    pub html: String,
    /// Tags that fell back to the default transform, in document order.
    pub unrecognized: Vec<BlockTag>,
}

/// Trait exposed by the rendering pipeline. Implementations must be pure and
/// deterministic: given the same blocks, they return identical output. Unknown
/// block types degrade to a fallback instead of failing the render.
pub trait RenderService: Send + Sync {
    fn render(&self, blocks: &[Block]) -> RenderOutput;
}
