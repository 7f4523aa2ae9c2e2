//! Content store adapters.

mod memory;
mod sanity;

pub use memory::MemoryStore;
pub use sanity::{SanityEndpoints, SanityStore};
