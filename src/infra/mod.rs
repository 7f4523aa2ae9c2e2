//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod export;
pub mod http;
pub mod images;
pub mod store;
pub mod telemetry;
