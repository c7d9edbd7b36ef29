//! Port traits.
//!
//! These traits define the seams between the engine and the host process.

use crate::Result;
use crate::events::EngineEvent;
use crate::resource::ResourceDescriptor;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = EngineEvent> + Send>>;

/// Event bus for publishing and subscribing to engine events.
///
/// Publishing never blocks and never fails; an event with no subscriber
/// is dropped.
pub trait EventBus: Send + Sync {
    /// Publish an event.
    fn publish(&self, event: EngineEvent);

    /// Subscribe to every event published from now on.
    fn subscribe(&self) -> EventStream;
}

/// Fetches raw resource bodies.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch the body behind a descriptor's locator.
    async fn fetch(&self, descriptor: &ResourceDescriptor) -> Result<Vec<u8>>;
}

/// Process-level counters read on each metrics tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemSample {
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub process_resident_bytes: u64,
    pub process_virtual_bytes: u64,
    pub cpu_percent: f64,
    pub cpu_cores: usize,
}

/// Source of process and machine counters.
pub trait SystemProbe: Send {
    /// Refresh and read the counters.
    fn sample(&mut self) -> SystemSample;
}

/// Optional host capability for requesting a garbage-collection pass.
pub trait GcHint: Send + Sync {
    /// Ask the host to reclaim memory. Best effort.
    fn collect(&self);
}
