//! Application services: content queries, rendering, page scheduling and comments.

pub mod comments;
pub mod content;
pub mod error;
pub mod listing;
pub mod pages;
pub mod render;
pub mod store;
