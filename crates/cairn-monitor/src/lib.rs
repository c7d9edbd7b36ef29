//! Monitoring and control loop for the Cairn engine.

pub mod collector;
pub mod memory;
pub mod probe;
pub mod quality;

pub use collector::MetricsCollector;
pub use memory::{MemoryManager, ReclaimReport};
pub use probe::SysinfoProbe;
pub use quality::{Adjustment, QualityController};
