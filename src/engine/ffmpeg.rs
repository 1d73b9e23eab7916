//! FFmpeg-backed `StreamEngine`.
//!
//! The handle lives on the loop thread; decoding runs on a per-stream
//! playback thread started by `initialize()`. View options (zoom/pan) never
//! reach that thread: they only affect `render()`, which scales the latest
//! published picture into the slot's target.

use crossbeam_channel::{Sender, unbounded};
use log::{debug, warn};
use playa_ffmpeg as ffmpeg;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::decoder::silence_ffmpeg_logging;
use super::playback::{Control, Notifier, Playback, Published};
use super::{
    EngineError, EngineEvent, EngineFactory, Property, StreamEngine, WakeFn, options, props,
};
use crate::surface::{BLACK, Framebuffer, VideoView, draw_video};

/// Factory for FFmpeg engines. Construct once per process.
pub struct FfmpegBackend {
    _private: (),
}

impl FfmpegBackend {
    pub fn new() -> Result<Self, EngineError> {
        ffmpeg::init().map_err(|e| EngineError::Create(format!("FFmpeg init failed: {}", e)))?;
        silence_ffmpeg_logging();
        Ok(Self { _private: () })
    }
}

impl EngineFactory for FfmpegBackend {
    type Engine = FfmpegEngine;

    fn create(&self, index: usize) -> Result<FfmpegEngine, EngineError> {
        Ok(FfmpegEngine::new(index))
    }
}

pub struct FfmpegEngine {
    index: usize,
    view: VideoView,
    /// View options changed since the last `update()`
    view_dirty: bool,
    last_seq: u64,
    looping: bool,
    paused: bool,
    control: Option<Sender<Control>>,
    thread: Option<JoinHandle<()>>,
    shared: Arc<Mutex<Published>>,
    notifier: Arc<Notifier>,
}

impl FfmpegEngine {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            view: VideoView::default(),
            view_dirty: false,
            last_seq: 0,
            looping: true,
            paused: false,
            control: None,
            thread: None,
            shared: Arc::new(Mutex::new(Published::default())),
            notifier: Arc::new(Notifier::default()),
        }
    }

    fn shared(&self) -> std::sync::MutexGuard<'_, Published> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn send(&self, msg: Control) -> bool {
        match &self.control {
            Some(tx) => tx.send(msg).is_ok(),
            None => false,
        }
    }

    /// Report a command failure the same way the playback thread does.
    fn fail(&self, command: String, error: &str) {
        self.shared().events.push_back(EngineEvent::CommandFailed {
            command,
            error: error.to_string(),
        });
        self.notifier.events();
    }

    fn set_view_value(&mut self, key: &str, value: &str) -> Result<(), EngineError> {
        let v: f64 = value
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| EngineError::BadOptionValue {
                key: key.to_string(),
                value: value.to_string(),
            })?;
        let slot = match key {
            options::VIDEO_ZOOM => &mut self.view.zoom,
            options::VIDEO_PAN_X => &mut self.view.pan_x,
            _ => &mut self.view.pan_y,
        };
        if *slot != v {
            *slot = v;
            self.view_dirty = true;
            self.notifier.frame();
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str, yes: &[&str], no: &[&str]) -> Result<bool, EngineError> {
    if yes.contains(&value) {
        Ok(true)
    } else if no.contains(&value) {
        Ok(false)
    } else {
        Err(EngineError::BadOptionValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

impl StreamEngine for FfmpegEngine {
    fn initialize(&mut self) -> Result<(), EngineError> {
        if self.thread.is_some() {
            return Ok(());
        }
        let (tx, rx) = unbounded();
        let shared = Arc::clone(&self.shared);
        let notifier = Arc::clone(&self.notifier);
        let (paused, looping) = (self.paused, self.looping);
        // Decoder state is built on the thread and never leaves it
        let handle = thread::Builder::new()
            .name(format!("stream-{}", self.index))
            .spawn(move || Playback::new(rx, shared, notifier, paused, looping).run())
            .map_err(|e| EngineError::Init(format!("failed to spawn playback thread: {}", e)))?;
        self.control = Some(tx);
        self.thread = Some(handle);
        debug!("stream {} playback thread started", self.index);
        Ok(())
    }

    fn command_async(&mut self, args: &[String]) {
        if !self.send(Control::Command(args.to_vec())) {
            self.fail(args.join(" "), "engine not running");
        }
    }

    fn set_option(&mut self, key: &str, value: &str) -> Result<(), EngineError> {
        match key {
            options::VIDEO_ZOOM | options::VIDEO_PAN_X | options::VIDEO_PAN_Y => {
                self.set_view_value(key, value)
            }
            options::LOOP_FILE => {
                self.looping = parse_flag(key, value, &["inf", "yes"], &["no"])?;
                self.send(Control::Loop(self.looping));
                Ok(())
            }
            options::PAUSE => {
                self.paused = parse_flag(key, value, &["yes"], &["no"])?;
                self.send(Control::Pause(self.paused));
                Ok(())
            }
            // Exact stepping and zero offset are how this engine always runs
            options::HR_SEEK_FRAMEDROP | options::VIDEO_TIMING_OFFSET => Ok(()),
            _ => Err(EngineError::UnknownOption(key.to_string())),
        }
    }

    fn set_wakeup_callback(&mut self, cb: WakeFn) {
        self.notifier.set_wakeup(cb);
    }

    fn set_update_callback(&mut self, cb: WakeFn) {
        self.notifier.set_update(cb);
    }

    fn poll_event(&mut self) -> Option<EngineEvent> {
        self.shared().events.pop_front()
    }

    fn update(&mut self) -> bool {
        let seq = self.shared().frame_seq;
        let changed = seq != self.last_seq || self.view_dirty;
        self.last_seq = seq;
        self.view_dirty = false;
        changed
    }

    fn render(&mut self, target: &mut Framebuffer, flip_y: bool) {
        let frame = self.shared().frame.clone();
        match frame {
            Some(frame) => draw_video(&frame, target, &self.view, flip_y),
            None => target.clear(BLACK),
        }
    }

    fn get_property(&self, name: &str) -> Option<Property> {
        let shared = self.shared();
        match name {
            props::WIDTH => shared.width.map(Property::Int),
            props::HEIGHT => shared.height.map(Property::Int),
            props::PAUSE => Some(Property::Flag(shared.paused)),
            props::EOF_REACHED => Some(Property::Flag(shared.eof)),
            props::TIME_POS => shared.time_pos.map(Property::Double),
            props::DURATION => shared.duration.map(Property::Double),
            props::PATH => shared.path.clone().map(Property::Text),
            _ => None,
        }
    }
}

impl Drop for FfmpegEngine {
    fn drop(&mut self) {
        self.send(Control::Shutdown);
        self.control = None;
        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            warn!("stream {} playback thread panicked", self.index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_view_options_mark_update() {
        let mut engine = FfmpegEngine::new(0);
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        engine.set_update_callback(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(!engine.update());
        engine.set_option("video-zoom", "-0.125").unwrap();
        engine.set_option("video-pan-x", "0.000").unwrap();
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
        assert!(engine.update());
        assert!(!engine.update());
        assert_eq!(engine.view.zoom, -0.125);
    }

    #[test]
    fn test_option_validation() {
        let mut engine = FfmpegEngine::new(0);
        assert_eq!(
            engine.set_option("sub-visibility", "no"),
            Err(EngineError::UnknownOption("sub-visibility".into()))
        );
        assert!(matches!(
            engine.set_option("video-pan-y", "left"),
            Err(EngineError::BadOptionValue { .. })
        ));
        assert!(engine.set_option("loop-file", "maybe").is_err());
        assert!(engine.set_option("loop-file", "no").is_ok());
        assert!(!engine.looping);
        assert!(engine.set_option("hr-seek-framedrop", "no").is_ok());
    }

    #[test]
    fn test_command_before_init_fails_async() {
        let mut engine = FfmpegEngine::new(3);
        engine.command_async(&["cycle".to_string(), "pause".to_string()]);
        assert!(matches!(
            engine.poll_event(),
            Some(EngineEvent::CommandFailed { command, .. }) if command == "cycle pause"
        ));
        assert_eq!(engine.poll_event(), None);
    }

    #[test]
    fn test_render_without_frame_is_black() {
        let mut engine = FfmpegEngine::new(0);
        let mut target = Framebuffer::new(4, 4);
        target.clear([9, 9, 9, 255]);
        engine.render(&mut target, true);
        assert_eq!(target.pixel(0, 0), BLACK);
        assert_eq!(engine.get_property("width"), None);
        assert_eq!(engine.get_property("pause"), Some(Property::Flag(false)));
    }

    #[test]
    fn test_thread_round_trip() {
        let mut engine = FfmpegEngine::new(1);
        engine.initialize().unwrap();
        engine.command_async(&["frame-step".to_string()]);

        // No file loaded: the thread reports the failure asynchronously
        let mut event = None;
        for _ in 0..200 {
            event = engine.poll_event();
            if event.is_some() {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(matches!(event, Some(EngineEvent::CommandFailed { .. })));
        drop(engine);
    }
}
