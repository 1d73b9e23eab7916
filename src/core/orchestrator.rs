//! The grid event loop.
//!
//! Single-threaded owner of every stream slot and of the shared view state.
//! Blocks on the event bus, dispatches one event, then composites if the
//! dirty set says a pass is due.
//!
//! ```text
//! WaitingForEvent -> Dispatching -> (Compositing) -> WaitingForEvent
//!                         |
//!                         +-> Terminated (quit)
//! ```

use glam::DVec2;
use log::{debug, info, log, trace, warn};

use super::compositor::Compositor;
use super::dirty::{DirtyTracker, SyncPolicy};
use super::error::{InitError, LoopError};
use super::event_bus::{EventBus, LoopEvent, WakeKind};
use super::layout::{GridGeometry, layout};
use super::slot::{LoopMode, StreamSlot};
use super::transform::{TransformState, cursor_offset};
use crate::engine::{
    Command, EndReason, EngineEvent, EngineFactory, Filter, SeekTarget, StreamEngine,
};
use crate::window::{Display, Key, PointerButton, WindowEvent};

/// Upper bound on simultaneous streams
pub const MAX_STREAMS: usize = 16;

/// Poll rounds per engine-events wake-up before yielding back to the queue
pub const MAX_DRAIN_ROUNDS: usize = 256;

/// Seek distance for J/L, seconds
pub const SEEK_STEP: f64 = 30.0;

/// Playback behavior chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewerConfig {
    pub autoplay: bool,
    pub loop_mode: LoopMode,
    pub sync: SyncPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    WaitingForEvent,
    Dispatching,
    Compositing,
    Terminated,
}

/// Result of dispatching one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Orchestrator<E: StreamEngine, D: Display> {
    slots: Vec<StreamSlot<E>>,
    transform: TransformState,
    dirty: DirtyTracker,
    compositor: Compositor,
    geometry: GridGeometry,
    display: D,
    bus: EventBus,
    state: LoopState,
    /// Aspect query failed on the last publish; repeats log at debug
    aspect_warned: bool,
}

impl<E: StreamEngine, D: Display> Orchestrator<E, D> {
    /// Create one engine per source and start playback.
    ///
    /// Any engine failing to come up aborts the whole startup.
    pub fn new<F>(
        factory: &F,
        sources: &[String],
        display: D,
        bus: EventBus,
        config: &ViewerConfig,
    ) -> Result<Self, InitError>
    where
        F: EngineFactory<Engine = E>,
    {
        if sources.is_empty() {
            return Err(InitError::NoSources);
        }
        if sources.len() > MAX_STREAMS {
            return Err(InitError::TooManySources {
                given: sources.len(),
                max: MAX_STREAMS,
            });
        }

        let mut slots = Vec::with_capacity(sources.len());
        for (index, source) in sources.iter().enumerate() {
            let engine = factory
                .create(index)
                .map_err(|source| InitError::EngineCreate { index, source })?;
            let mut slot = StreamSlot::new(index, source.as_str(), engine);
            slot.apply_defaults(config.loop_mode);
            slot.engine_mut()
                .initialize()
                .map_err(|source| InitError::EngineInit { index, source })?;
            slot.engine_mut()
                .set_wakeup_callback(bus.waker(WakeKind::EngineEvents).into_callback());
            slot.engine_mut()
                .set_update_callback(bus.waker(WakeKind::RenderUpdate).into_callback());
            debug!("stream {} ready: {}", slot.id(), slot.source());
            slots.push(slot);
        }

        for slot in &mut slots {
            slot.load();
        }
        if !config.autoplay {
            for slot in &mut slots {
                slot.command(&Command::TogglePause);
            }
        }

        let (w, h) = display.surface_size();
        let geometry = layout(slots.len(), w, h);
        info!(
            "{} streams, {}x{} grid of {}x{} cells, sync {:?}",
            slots.len(),
            geometry.cols,
            geometry.rows,
            geometry.cell_w,
            geometry.cell_h,
            config.sync
        );

        Ok(Self {
            dirty: DirtyTracker::new(slots.len(), config.sync),
            slots,
            transform: TransformState::new(),
            compositor: Compositor::new(),
            geometry,
            display,
            bus,
            state: LoopState::WaitingForEvent,
            aspect_warned: false,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn transform(&self) -> &TransformState {
        &self.transform
    }

    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn slots(&self) -> &[StreamSlot<E>] {
        &self.slots
    }

    /// Run until quit. Engines are destroyed before returning.
    pub fn run(&mut self) -> Result<(), LoopError> {
        info!("Event loop started");
        let result = loop {
            self.state = LoopState::WaitingForEvent;
            let event = match self.bus.wait() {
                Ok(event) => event,
                Err(e) => break Err(e),
            };
            match self.dispatch(event) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.shutdown();
        result
    }

    /// Handle one event and composite if a pass is due.
    pub fn dispatch(&mut self, event: LoopEvent) -> Result<Flow, LoopError> {
        self.state = LoopState::Dispatching;
        trace!("dispatch {:?}", event);
        if self.handle_event(event) == Flow::Quit {
            return Ok(Flow::Quit);
        }
        self.maybe_composite()?;
        Ok(Flow::Continue)
    }

    fn handle_event(&mut self, event: LoopEvent) -> Flow {
        match event {
            LoopEvent::Quit => return Flow::Quit,
            LoopEvent::Window(ev) => return self.handle_window(ev),
            LoopEvent::EngineEvents => {
                self.bus.acknowledge(WakeKind::EngineEvents);
                self.drain_engine_events();
            }
            LoopEvent::RenderUpdate => {
                self.bus.acknowledge(WakeKind::RenderUpdate);
                for slot in &mut self.slots {
                    if slot.engine_mut().update() {
                        self.dirty.mark(slot.index());
                    }
                }
            }
        }
        Flow::Continue
    }

    fn handle_window(&mut self, event: WindowEvent) -> Flow {
        match event {
            WindowEvent::Key(key) => return self.handle_key(key),
            WindowEvent::Expose => self.full_redraw(),
            WindowEvent::Resize { width, height } => {
                debug!("resize {}x{}", width, height);
                self.full_redraw();
            }
            WindowEvent::ButtonDown { button: PointerButton::Primary, x, y } => {
                self.transform.begin_drag(DVec2::new(x, y));
            }
            WindowEvent::ButtonUp { button: PointerButton::Primary, x, y } => {
                if self.transform.end_drag(DVec2::new(x, y)) {
                    self.publish_view();
                }
            }
            WindowEvent::Motion { x, y } => {
                if self.transform.drag_to(DVec2::new(x, y)) {
                    self.publish_view();
                }
            }
            WindowEvent::Wheel { y, pos_x, pos_y, .. } => {
                if y != 0 {
                    let cursor = cursor_offset(DVec2::new(pos_x, pos_y), &self.geometry);
                    self.transform.wheel(y, cursor);
                    self.publish_view();
                }
            }
            WindowEvent::ButtonDown { .. } | WindowEvent::ButtonUp { .. } => {}
        }
        Flow::Continue
    }

    fn handle_key(&mut self, key: Key) -> Flow {
        debug!("key {:?}", key);
        match key {
            Key::Space => self.broadcast(&Command::TogglePause),
            Key::ArrowLeft => self.broadcast(&Command::FrameBackStep),
            Key::ArrowRight => self.broadcast(&Command::FrameStep),
            Key::G => self.broadcast(&Command::ToggleFilter(Filter::LinearGamma)),
            Key::B => self.broadcast(&Command::ToggleFilter(Filter::DEFAULT_BLUR)),
            Key::R => {
                self.transform.reset();
                self.publish_view();
                self.broadcast(&Command::Seek(SeekTarget::Absolute(0.0)));
            }
            Key::J => self.broadcast(&Command::Seek(SeekTarget::Relative(-SEEK_STEP))),
            Key::L => self.broadcast(&Command::Seek(SeekTarget::Relative(SEEK_STEP))),
            Key::E => self.broadcast(&Command::Seek(SeekTarget::AbsolutePercent(100.0))),
            Key::F => {
                info!("Reloading {} streams", self.slots.len());
                for slot in &mut self.slots {
                    slot.load();
                }
            }
            Key::Q | Key::Escape => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Same command to every slot, ascending.
    fn broadcast(&mut self, cmd: &Command) {
        for slot in &mut self.slots {
            slot.command(cmd);
        }
    }

    fn full_redraw(&mut self) {
        let (w, h) = self.display.surface_size();
        let geometry = layout(self.slots.len(), w, h);
        if geometry != self.geometry {
            debug!(
                "geometry {}x{} -> cells {}x{}",
                w, h, geometry.cell_w, geometry.cell_h
            );
            self.geometry = geometry;
        }
        self.dirty.mark_all();
        self.publish_view();
    }

    /// Push the shared view to every slot.
    fn publish_view(&mut self) {
        let aspect = match self.slots.first().map(|slot| slot.video_aspect()) {
            Some(Ok(aspect)) => {
                self.aspect_warned = false;
                aspect
            }
            Some(Err(e)) => {
                if self.aspect_warned {
                    debug!("Video aspect still unknown ({}), assuming 1.0", e);
                } else {
                    warn!("Video aspect unknown ({}), assuming 1.0", e);
                    self.aspect_warned = true;
                }
                1.0
            }
            None => 1.0,
        };
        let view = self.transform.publish(&self.geometry, aspect);
        trace!("publish {:?}", view);
        for slot in &mut self.slots {
            slot.set_view(&view);
        }
    }

    /// Poll every engine until a full round comes back empty.
    fn drain_engine_events(&mut self) {
        let mut republish = false;
        let mut drained = false;
        for _ in 0..MAX_DRAIN_ROUNDS {
            let mut any = false;
            for slot in &mut self.slots {
                if let Some(event) = slot.engine_mut().poll_event() {
                    any = true;
                    republish |= log_engine_event(slot.index(), event);
                }
            }
            if !any {
                drained = true;
                break;
            }
        }

        if !drained {
            debug!("engine events not drained after {} rounds, requeueing", MAX_DRAIN_ROUNDS);
            self.bus.waker(WakeKind::EngineEvents).wake();
        }
        if republish {
            self.publish_view();
        }
    }

    fn maybe_composite(&mut self) -> Result<(), LoopError> {
        if !self.dirty.is_ready() {
            return Ok(());
        }
        if self.geometry.is_degenerate() {
            trace!("surface is empty, deferring composite");
            return Ok(());
        }

        self.state = LoopState::Compositing;
        let indices = self.dirty.indices();
        self.compositor
            .composite(&mut self.slots, &indices, &self.geometry, &mut self.display)?;
        self.dirty.clear(&indices);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.state = LoopState::Terminated;
        info!("Event loop terminated, closing {} streams", self.slots.len());
        for slot in self.slots.drain(..) {
            trace!("destroying stream {}", slot.id());
        }
        self.display.close();
    }
}

/// Log one engine event. Returns true if the view must be republished.
fn log_engine_event(index: usize, event: EngineEvent) -> bool {
    match event {
        EngineEvent::LogMessage { level, text } => {
            log!(level, "[stream {}] {}", index, text.trim_end());
        }
        EngineEvent::FileLoaded { path } => {
            info!("[stream {}] loaded {}", index, path);
            return true;
        }
        EngineEvent::EndFile { reason } => match reason {
            EndReason::Error(e) => warn!("[stream {}] playback ended: {}", index, e),
            reason => info!("[stream {}] end of file ({:?})", index, reason),
        },
        EngineEvent::PlaybackRestart => trace!("[stream {}] playback restart", index),
        EngineEvent::PauseChanged(paused) => debug!("[stream {}] pause={}", index, paused),
        EngineEvent::CommandFailed { command, error } => {
            warn!("[stream {}] '{}' failed: {}", index, command, error);
        }
    }
    false
}
