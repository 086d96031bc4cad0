//! Indexed Cache - an indexed object cache over a key-value store
//!
//! Stores serializable records under derived primary ids, maintains named
//! secondary indexes as ordered composite-key sets for equality and range
//! lookup, and resolves cache misses through a pluggable write-through
//! fallback. The backing store is an external collaborator reached through
//! the [`store::Store`] trait; an in-memory implementation ships for tests
//! and embedded use.
//!
//! ```
//! use indexed_cache::{IndexedCache, MemoryStore};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, PartialEq, Serialize, Deserialize)]
//! struct Color {
//!     id: u32,
//!     color: String,
//! }
//!
//! let store = MemoryStore::new();
//! let cache = IndexedCache::new(&store, "colorcache", |c: &Color| c.id.to_string())
//!     .with_index("color", |c: &Color| c.color.clone())
//!     .with_on_miss(|id| {
//!         id.parse().ok().map(|id| Color { id, color: "purple".into() })
//!     });
//!
//! cache.put(&Color { id: 1, color: "orange".into() })?;
//! assert!(cache.find("1")?.is_some());
//! assert_eq!(cache.find_by("color", "orange")?.len(), 1);
//! # Ok::<(), indexed_cache::CacheError>(())
//! ```

pub mod cache;
pub mod error;
pub mod store;

pub use cache::{Groups, IndexedCache, KeyScheme};
pub use error::{CacheError, Result};
pub use store::{LexBound, MemoryStore, Store, WriteCommand};
