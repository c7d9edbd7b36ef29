//! In-process cache store for the Cairn engine.
//!
//! Entries carry a TTL and a hit count; values are serialized to JSON and
//! optionally compressed. Capacity pressure evicts the least-read entries
//! first, regardless of age.

pub mod compression;
pub mod shared;
pub mod store;
pub mod types;

pub use compression::{compress, decompress};
pub use shared::SharedCache;
pub use store::CacheStore;
pub use types::{CacheEntry, CacheStats, SetOutcome};
