//! Reviewer caching layer.
//!
//! This module provides the stale-while-revalidate cache that:
//! - Stores one entry per repository, accumulating PR results across fetches
//! - Serves fully covered requests from the store, refreshing stale entries in the background
//! - Fetches synchronously when any requested PR is missing
//! - Treats unreadable or malformed entries as a cache miss

mod entry;
mod layer;
mod storage;
mod traits;

pub use layer::{ReviewerCache, DEFAULT_STALE_MS};
pub use storage::{MemoryStore, NoopStore, SqliteStore};
pub use traits::{KeyValueStore, LookupResult, ReviewerSource};
