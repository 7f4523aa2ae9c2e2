//! Rendering pipeline: block tree in, sanitised HTML out.
//!
//! The pipeline is pure. Dispatch goes through a [`TransformRegistry`] keyed by
//! block tag, so supporting a new block type means registering a transform.

mod registry;
mod service;
mod transforms;
mod types;

pub use registry::{BlockTransform, MarkContext, MarkTransform, TransformRegistry};
pub use service::BlockRenderer;
pub use types::{RenderOutput, RenderService};
