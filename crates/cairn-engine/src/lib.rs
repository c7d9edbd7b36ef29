//! Cairn engine facade.
//!
//! [`Engine`] owns the configuration and wires the cache, the resource
//! loader and the monitoring loop together. Collaborators hold one engine
//! and observe it through [`Engine::subscribe`].

pub mod engine;
pub mod services;

pub use engine::{Engine, EngineBuilder};
