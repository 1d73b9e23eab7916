//! GRIDPLAY - synchronized grid viewer for N video streams
//!
//! Re-exports all modules for use by the binary target.

// Grid core (event loop, layout, view state, compositing)
pub mod core;

// Playback engines
pub mod engine;

// Frontend
pub mod cli;
pub mod help;
pub mod runner;
pub mod surface;
pub mod window;

// Re-export commonly used types from core
pub use core::event_bus::{EventBus, EventEmitter, LoopEvent};
pub use core::orchestrator::{MAX_STREAMS, Orchestrator, ViewerConfig};
pub use engine::{EngineFactory, StreamEngine};
