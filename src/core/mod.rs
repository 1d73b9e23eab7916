//! Grid core - event loop, layout, shared view state, compositing
//!
//! These modules are independent of the windowing toolkit and of the
//! concrete playback engine.

pub mod compositor;
pub mod dirty;
pub mod error;
pub mod event_bus;
pub mod layout;
pub mod orchestrator;
pub mod slot;
pub mod transform;

// Re-exports for convenience
pub use compositor::{Compositor, PassStats};
pub use dirty::{DirtyTracker, SyncPolicy};
pub use error::{InitError, LoopError, QueryError};
pub use event_bus::{EventBus, EventEmitter, LoopEvent, WakeKind};
pub use layout::{CellRect, GridGeometry, layout};
pub use orchestrator::{MAX_STREAMS, Orchestrator, ViewerConfig};
pub use slot::{LoopMode, SlotId, StreamSlot};
pub use transform::{TransformState, ViewParams};
