//! Single event queue feeding the orchestrator loop.
//!
//! Architecture:
//! - One bounded channel carries every loop event: quit, window input and
//!   engine wake-ups
//! - `EventEmitter` handles push window input from the UI thread
//! - `Waker`s are handed to engines as callbacks; they may fire from any
//!   thread and only enqueue a pulse
//! - `EventBus::wait()` blocks with no timeout
//!
//! Wake-ups are coalesced: each kind has a pending flag, and a pulse is only
//! enqueued on the false->true edge. The loop clears the flag with
//! `acknowledge()` before it re-queries engine state, so a notification
//! arriving mid-query always produces a fresh pulse.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::{trace, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::error::LoopError;
use crate::window::WindowEvent;

/// Maximum queued events before window input is dropped
pub const QUEUE_CAPACITY: usize = 1024;

/// Everything the loop can wake up for.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    Quit,
    Window(WindowEvent),
    /// At least one engine has events to drain (state changed)
    EngineEvents,
    /// At least one engine may have a new frame to render
    RenderUpdate,
}

/// The two engine notification channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeKind {
    EngineEvents,
    RenderUpdate,
}

impl WakeKind {
    fn event(self) -> LoopEvent {
        match self {
            WakeKind::EngineEvents => LoopEvent::EngineEvents,
            WakeKind::RenderUpdate => LoopEvent::RenderUpdate,
        }
    }
}

#[derive(Default)]
struct Pending {
    engine_events: AtomicBool,
    render_update: AtomicBool,
}

impl Pending {
    fn flag(&self, kind: WakeKind) -> &AtomicBool {
        match kind {
            WakeKind::EngineEvents => &self.engine_events,
            WakeKind::RenderUpdate => &self.render_update,
        }
    }
}

/// The loop's event queue. Owned by the orchestrator.
pub struct EventBus {
    tx: Sender<LoopEvent>,
    rx: Receiver<LoopEvent>,
    pending: Arc<Pending>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self {
            tx,
            rx,
            pending: Arc::new(Pending::default()),
        }
    }

    /// Handle for pushing window events and quit requests.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            tx: self.tx.clone(),
        }
    }

    /// Coalescing wake-up handle for one notification kind.
    pub fn waker(&self, kind: WakeKind) -> Waker {
        Waker {
            kind,
            pending: Arc::clone(&self.pending),
            tx: self.tx.clone(),
        }
    }

    /// Block until the next event. No timeout.
    pub fn wait(&self) -> Result<LoopEvent, LoopError> {
        self.rx
            .recv()
            .map_err(|e| LoopError::EventWait(e.to_string()))
    }

    /// Non-blocking variant, used by tests and shutdown.
    pub fn try_next(&self) -> Option<LoopEvent> {
        self.rx.try_recv().ok()
    }

    /// Clear the pending flag for `kind`. Call before re-querying engines.
    pub fn acknowledge(&self, kind: WakeKind) {
        self.pending.flag(kind).store(false, Ordering::Release);
    }

    pub fn queue_len(&self) -> usize {
        self.rx.len()
    }
}

/// Cloneable handle for the UI thread.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    tx: Sender<LoopEvent>,
}

impl EventEmitter {
    /// Enqueue without blocking. Returns false if the event was dropped.
    pub fn emit(&self, event: LoopEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(ev)) => {
                warn!("Event queue full ({} events), dropping {:?}", QUEUE_CAPACITY, ev);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn window(&self, event: WindowEvent) -> bool {
        self.emit(LoopEvent::Window(event))
    }

    pub fn quit(&self) -> bool {
        self.emit(LoopEvent::Quit)
    }
}

/// Engine notification callback. Enqueue-and-return only.
#[derive(Clone)]
pub struct Waker {
    kind: WakeKind,
    pending: Arc<Pending>,
    tx: Sender<LoopEvent>,
}

impl std::fmt::Debug for Waker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waker")
            .field("kind", &self.kind)
            .field("pending", &self.pending.flag(self.kind).load(Ordering::Relaxed))
            .finish()
    }
}

impl Waker {
    pub fn wake(&self) {
        let flag = self.pending.flag(self.kind);
        if flag.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.tx.try_send(self.kind.event()).is_err() {
            // Queue full: let the next wake-up retry rather than lose it
            flag.store(false, Ordering::Release);
            trace!("wake-up {:?} not queued", self.kind);
        }
    }

    /// Box into the callback shape engines accept.
    pub fn into_callback(self) -> crate::engine::WakeFn {
        Box::new(move || self.wake())
    }
}
