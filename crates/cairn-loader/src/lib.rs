//! Resource load queue for the Cairn engine.
//!
//! Descriptors wait in a priority backlog and are admitted into flight under
//! a concurrency cap. Each completion admits the next eligible descriptor.

pub mod fetcher;
pub mod loader;
pub mod network;
pub mod queue;

pub use fetcher::HttpFetcher;
pub use loader::ResourceLoader;
pub use network::NetworkStats;
pub use queue::{LoadQueue, QueuedResource};
