//! Cairn Core
//!
//! Shared vocabulary for the Cairn resource engine: error taxonomy, events,
//! configuration, and the port traits through which the engine reaches the
//! host process. Every other crate in the workspace builds on these types.

pub mod bus;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod ports;
pub mod quality;
pub mod resource;

pub use bus::InMemoryBus;
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use events::EngineEvent;
