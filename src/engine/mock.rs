//! Scriptable engine for loop tests.
//!
//! Every call is appended to a shared journal so tests can assert on the
//! exact command/option traffic, across all slots, in issue order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{EngineError, EngineEvent, EngineFactory, Property, StreamEngine, WakeFn};
use crate::surface::Framebuffer;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Command { index: usize, args: Vec<String> },
    Option { index: usize, key: String, value: String },
    Render { index: usize, size: (u32, u32), flip_y: bool },
}

#[derive(Default)]
pub struct Journal {
    pub calls: Vec<Call>,
}

impl Journal {
    pub fn commands(&self) -> Vec<(usize, Vec<String>)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Command { index, args } => Some((*index, args.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn options(&self) -> Vec<(usize, String, String)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Option { index, key, value } => Some((*index, key.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn renders(&self) -> Vec<usize> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Render { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

/// Per-engine knobs a test can flip after creation.
#[derive(Default)]
pub struct MockState {
    pub events: VecDeque<EngineEvent>,
    pub frame_ready: bool,
    pub width: Option<i64>,
    pub height: Option<i64>,
    /// Keep yielding events forever
    pub endless_events: bool,
    wakeup: Option<WakeFn>,
    update: Option<WakeFn>,
}

impl MockState {
    /// Fire the engine-event callback, as a playback thread would.
    pub fn wake_events(&self) {
        if let Some(cb) = &self.wakeup {
            cb();
        }
    }

    /// Fire the render-update callback.
    pub fn wake_render(&self) {
        if let Some(cb) = &self.update {
            cb();
        }
    }
}

pub struct MockEngine {
    index: usize,
    journal: Arc<Mutex<Journal>>,
    pub state: Arc<Mutex<MockState>>,
}

impl StreamEngine for MockEngine {
    fn initialize(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn command_async(&mut self, args: &[String]) {
        self.journal.lock().unwrap().calls.push(Call::Command {
            index: self.index,
            args: args.to_vec(),
        });
    }

    fn set_option(&mut self, key: &str, value: &str) -> Result<(), EngineError> {
        self.journal.lock().unwrap().calls.push(Call::Option {
            index: self.index,
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn set_wakeup_callback(&mut self, cb: WakeFn) {
        self.state.lock().unwrap().wakeup = Some(cb);
    }

    fn set_update_callback(&mut self, cb: WakeFn) {
        self.state.lock().unwrap().update = Some(cb);
    }

    fn poll_event(&mut self) -> Option<EngineEvent> {
        let mut state = self.state.lock().unwrap();
        if state.endless_events {
            return Some(EngineEvent::PlaybackRestart);
        }
        state.events.pop_front()
    }

    fn update(&mut self) -> bool {
        std::mem::take(&mut self.state.lock().unwrap().frame_ready)
    }

    fn render(&mut self, target: &mut Framebuffer, flip_y: bool) {
        target.clear([self.index as u8 * 10, 0, 0, 255]);
        self.journal.lock().unwrap().calls.push(Call::Render {
            index: self.index,
            size: target.size(),
            flip_y,
        });
    }

    fn get_property(&self, name: &str) -> Option<Property> {
        let state = self.state.lock().unwrap();
        match name {
            "width" => state.width.map(Property::Int),
            "height" => state.height.map(Property::Int),
            _ => None,
        }
    }
}

/// Factory that hands out journaled engines and keeps their state handles.
#[derive(Default)]
pub struct MockFactory {
    pub journal: Arc<Mutex<Journal>>,
    pub states: Mutex<Vec<Arc<Mutex<MockState>>>>,
    /// Fail creation of this index
    pub fail_at: Option<usize>,
}

impl MockFactory {
    pub fn state(&self, index: usize) -> Arc<Mutex<MockState>> {
        Arc::clone(&self.states.lock().unwrap()[index])
    }
}

impl EngineFactory for MockFactory {
    type Engine = MockEngine;

    fn create(&self, index: usize) -> Result<MockEngine, EngineError> {
        if self.fail_at == Some(index) {
            return Err(EngineError::Create("mock refused".into()));
        }
        let state = Arc::new(Mutex::new(MockState {
            width: Some(1920),
            height: Some(1080),
            ..Default::default()
        }));
        self.states.lock().unwrap().push(Arc::clone(&state));
        Ok(MockEngine {
            index,
            journal: Arc::clone(&self.journal),
            state,
        })
    }
}
