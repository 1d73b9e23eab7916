//! Per-stream playback thread.
//!
//! Owns the decoder and the playback clock. The engine handle talks to it
//! through a control channel; results come back through `Published`, which
//! the handle reads on the loop thread, plus the two wake callbacks.
//!
//! Timing: while playing, the thread sleeps in `recv_deadline` until the
//! next frame is due, so control messages are handled immediately and
//! frames are paced without a busy loop.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use image::RgbaImage;
use log::{debug, trace};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::decoder::{DecodedFrame, VideoDecoder};
use super::filters::FilterChain;
use super::{Command, EndReason, EngineEvent, SeekTarget, WakeFn};

/// Used when the container reports no frame rate
const FALLBACK_FPS: f64 = 25.0;

/// Messages from the engine handle.
#[derive(Debug)]
pub enum Control {
    Command(Vec<String>),
    Pause(bool),
    Loop(bool),
    Shutdown,
}

/// State the playback thread exposes to the handle.
#[derive(Default)]
pub struct Published {
    pub frame: Option<Arc<RgbaImage>>,
    /// Bumped on every new picture
    pub frame_seq: u64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub paused: bool,
    pub eof: bool,
    pub time_pos: Option<f64>,
    pub duration: Option<f64>,
    pub path: Option<String>,
    pub events: VecDeque<EngineEvent>,
}

/// Wake callbacks, installed after the thread is already running.
#[derive(Default)]
pub struct Notifier {
    wakeup: Mutex<Option<WakeFn>>,
    update: Mutex<Option<WakeFn>>,
}

impl Notifier {
    pub fn set_wakeup(&self, cb: WakeFn) {
        *self.wakeup.lock().unwrap_or_else(|e| e.into_inner()) = Some(cb);
    }

    pub fn set_update(&self, cb: WakeFn) {
        *self.update.lock().unwrap_or_else(|e| e.into_inner()) = Some(cb);
    }

    /// Events are waiting in `Published::events`.
    pub fn events(&self) {
        if let Some(cb) = self.wakeup.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            cb();
        }
    }

    /// A new picture or view change may need rendering.
    pub fn frame(&self) {
        if let Some(cb) = self.update.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            cb();
        }
    }
}

pub struct Playback {
    rx: Receiver<Control>,
    shared: Arc<Mutex<Published>>,
    notifier: Arc<Notifier>,
    decoder: Option<VideoDecoder>,
    filters: FilterChain,
    /// Last decoded picture before filtering
    current: Option<DecodedFrame>,
    paused: bool,
    looping: bool,
    eof: bool,
    next_due: Instant,
}

impl Playback {
    pub fn new(
        rx: Receiver<Control>,
        shared: Arc<Mutex<Published>>,
        notifier: Arc<Notifier>,
        paused: bool,
        looping: bool,
    ) -> Self {
        Self {
            rx,
            shared,
            notifier,
            decoder: None,
            filters: FilterChain::new(),
            current: None,
            paused,
            looping,
            eof: false,
            next_due: Instant::now(),
        }
    }

    /// Thread body. Returns on `Shutdown` or when the handle goes away.
    pub fn run(mut self) {
        loop {
            let msg = if self.is_running() {
                match self.rx.recv_deadline(self.next_due) {
                    Ok(msg) => Some(msg),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            } else {
                match self.rx.recv() {
                    Ok(msg) => Some(msg),
                    Err(_) => break,
                }
            };

            match msg {
                None => self.tick(),
                Some(Control::Shutdown) => break,
                Some(msg) => self.handle(msg),
            }
        }
        trace!("playback thread exiting");
    }

    fn is_running(&self) -> bool {
        self.decoder.is_some() && !self.paused && !self.eof
    }

    fn frame_interval(&self) -> Duration {
        let fps = self
            .decoder
            .as_ref()
            .map(|d| d.fps())
            .filter(|fps| *fps > 0.0)
            .unwrap_or(FALLBACK_FPS);
        Duration::from_secs_f64(1.0 / fps)
    }

    pub fn handle(&mut self, msg: Control) {
        match msg {
            Control::Command(args) => {
                let command = args.join(" ");
                match Command::parse(&args) {
                    Ok(cmd) => {
                        if let Err(error) = self.execute(cmd) {
                            self.emit(EngineEvent::CommandFailed { command, error });
                        }
                    }
                    Err(e) => self.emit(EngineEvent::CommandFailed {
                        command,
                        error: e.to_string(),
                    }),
                }
            }
            Control::Pause(paused) => self.set_paused(paused),
            Control::Loop(looping) => self.looping = looping,
            Control::Shutdown => {}
        }
    }

    fn execute(&mut self, cmd: Command) -> Result<(), String> {
        if let Command::LoadFile(path) = cmd {
            self.load(path);
            return Ok(());
        }
        if self.decoder.is_none() {
            return Err("no file loaded".to_string());
        }
        match cmd {
            Command::TogglePause => self.set_paused(!self.paused),
            Command::FrameStep => {
                self.set_paused(true);
                self.step();
            }
            Command::FrameBackStep => {
                self.set_paused(true);
                let pts = self.current.as_ref().map_or(0.0, |f| f.pts);
                let back = pts - self.frame_interval().as_secs_f64();
                self.seek_exact(back.max(0.0));
            }
            Command::Seek(target) => {
                let pos = self.current.as_ref().map_or(0.0, |f| f.pts);
                let duration = self.decoder.as_ref().map_or(0.0, |d| d.duration());
                let secs = match target {
                    SeekTarget::Relative(s) => pos + s,
                    SeekTarget::Absolute(s) => s,
                    SeekTarget::AbsolutePercent(p) => duration * p / 100.0,
                };
                let secs = if duration > 0.0 { secs.clamp(0.0, duration) } else { secs.max(0.0) };
                self.seek_exact(secs);
            }
            Command::ToggleFilter(filter) => {
                let on = self.filters.toggle(filter);
                debug!("filter {} {}", filter, if on { "on" } else { "off" });
                self.republish();
            }
            Command::LoadFile(_) => {}
        }
        Ok(())
    }

    fn load(&mut self, path: String) {
        if self.decoder.take().is_some() {
            self.emit(EngineEvent::EndFile { reason: EndReason::Replaced });
        }
        self.current = None;
        self.eof = false;

        let decoder = match VideoDecoder::open(&path) {
            Ok(decoder) => decoder,
            Err(e) => {
                self.update_shared(|s| {
                    s.frame = None;
                    s.width = None;
                    s.height = None;
                    s.path = None;
                });
                self.emit(EngineEvent::EndFile { reason: EndReason::Error(e.to_string()) });
                return;
            }
        };

        let (w, h, duration) = (decoder.width(), decoder.height(), decoder.duration());
        self.decoder = Some(decoder);
        self.update_shared(|s| {
            s.width = Some(w as i64);
            s.height = Some(h as i64);
            s.duration = (duration > 0.0).then_some(duration);
            s.path = Some(path.clone());
            s.eof = false;
        });
        self.emit(EngineEvent::FileLoaded { path });

        // First picture shows immediately, paused or not
        self.step();
        self.next_due = Instant::now() + self.frame_interval();
    }

    fn set_paused(&mut self, paused: bool) {
        if self.paused == paused {
            return;
        }
        self.paused = paused;
        if !paused {
            self.next_due = Instant::now();
        }
        self.update_shared(|s| s.paused = paused);
        self.emit(EngineEvent::PauseChanged(paused));
    }

    /// Playback clock fired.
    fn tick(&mut self) {
        self.step();
        let interval = self.frame_interval();
        let now = Instant::now();
        self.next_due += interval;
        // Fell behind: drop the backlog instead of racing
        if self.next_due + interval < now {
            self.next_due = now + interval;
        }
    }

    /// Show the next frame, handling end of file.
    fn step(&mut self) {
        match self.decode_next() {
            Some(frame) => self.show(frame),
            None => self.end_of_file(),
        }
    }

    fn decode_next(&mut self) -> Option<DecodedFrame> {
        let decoder = self.decoder.as_mut()?;
        match decoder.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                self.emit(EngineEvent::LogMessage {
                    level: log::Level::Warn,
                    text: e.to_string(),
                });
                None
            }
        }
    }

    fn end_of_file(&mut self) {
        if self.looping
            && let Some(decoder) = self.decoder.as_mut()
            && decoder.seek(0.0).is_ok()
            && let Some(frame) = self.decode_next()
        {
            self.show(frame);
            self.emit(EngineEvent::PlaybackRestart);
            return;
        }
        if !self.eof {
            self.eof = true;
            self.update_shared(|s| s.eof = true);
            self.emit(EngineEvent::EndFile { reason: EndReason::Eof });
        }
    }

    /// Land exactly on the first frame at or after `secs`.
    fn seek_exact(&mut self, secs: f64) {
        let Some(decoder) = self.decoder.as_mut() else {
            return;
        };
        if let Err(e) = decoder.seek(secs) {
            self.emit(EngineEvent::LogMessage {
                level: log::Level::Warn,
                text: e.to_string(),
            });
            return;
        }
        self.eof = false;
        self.update_shared(|s| s.eof = false);

        let half = self.frame_interval().as_secs_f64() / 2.0;
        let mut last = None;
        while let Some(frame) = self.decode_next() {
            let reached = frame.pts + half >= secs;
            last = Some(frame);
            if reached {
                break;
            }
        }
        match last {
            Some(frame) => {
                trace!("seek {:.3}s landed at {:.3}s", secs, frame.pts);
                self.show(frame);
            }
            None => self.end_of_file(),
        }
        self.next_due = Instant::now() + self.frame_interval();
        self.emit(EngineEvent::PlaybackRestart);
    }

    fn show(&mut self, frame: DecodedFrame) {
        self.current = Some(frame);
        self.republish();
    }

    /// Push the current picture through the filters and out.
    fn republish(&mut self) {
        let Some(frame) = self.current.as_ref() else {
            return;
        };
        let image = Arc::new(self.filters.apply(&frame.image).into_owned());
        let pts = frame.pts;
        self.update_shared(|s| {
            s.frame = Some(image);
            s.frame_seq += 1;
            s.time_pos = Some(pts);
        });
        self.notifier.frame();
    }

    fn emit(&self, event: EngineEvent) {
        trace!("event {:?}", event);
        self.update_shared(|s| s.events.push_back(event));
        self.notifier.events();
    }

    fn update_shared(&self, f: impl FnOnce(&mut Published)) {
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut shared);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn playback() -> (Playback, Arc<Mutex<Published>>, Arc<AtomicUsize>) {
        let (_tx, rx) = unbounded();
        let shared = Arc::new(Mutex::new(Published::default()));
        let notifier = Arc::new(Notifier::default());
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        notifier.set_wakeup(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let pb = Playback::new(rx, Arc::clone(&shared), notifier, true, true);
        (pb, shared, wakes)
    }

    fn args(s: &str) -> Vec<String> {
        s.split(' ').map(String::from).collect()
    }

    #[test]
    fn test_commands_without_file_fail_async() {
        let (mut pb, shared, wakes) = playback();
        pb.handle(Control::Command(args("frame-step")));
        pb.handle(Control::Command(args("bogus 1 2")));

        let events: Vec<_> = shared.lock().unwrap().events.drain(..).collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            EngineEvent::CommandFailed { command, error } if command == "frame-step" && error == "no file loaded"
        ));
        assert!(matches!(&events[1], EngineEvent::CommandFailed { command, .. } if command == "bogus 1 2"));
        assert_eq!(wakes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_pause_control_publishes_change() {
        let (mut pb, shared, _) = playback();
        pb.handle(Control::Pause(false));
        pb.handle(Control::Pause(false));
        let s = shared.lock().unwrap();
        assert!(!s.paused);
        assert_eq!(s.events.len(), 1);
        assert_eq!(s.events[0], EngineEvent::PauseChanged(false));
    }

    #[test]
    fn test_missing_file_ends_with_error() {
        let _ = playa_ffmpeg::init();
        let (mut pb, shared, _) = playback();
        pb.handle(Control::Command(args("loadfile /nonexistent/clip.mp4")));
        let s = shared.lock().unwrap();
        assert!(matches!(
            s.events.front(),
            Some(EngineEvent::EndFile { reason: EndReason::Error(_) })
        ));
        assert!(s.frame.is_none());
        assert!(!pb.is_running());
    }
}
