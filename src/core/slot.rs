//! Per-stream bookkeeping: engine handle plus private render target.
//!
//! This is the only place the typed `Command`/`ViewParams` world is turned
//! into the engine's argument vectors and option strings.

use log::{trace, warn};

use super::error::QueryError;
use super::transform::ViewParams;
use crate::engine::{Command, StreamEngine, options, props};
use crate::surface::Framebuffer;

/// Stable small-integer stream identity; also the grid cell index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub usize);

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What happens at end of file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Infinite,
    Once,
}

impl LoopMode {
    fn option_value(self) -> &'static str {
        match self {
            LoopMode::Infinite => "inf",
            LoopMode::Once => "no",
        }
    }
}

pub struct StreamSlot<E> {
    id: SlotId,
    source: String,
    engine: E,
    target: Framebuffer,
}

impl<E: StreamEngine> StreamSlot<E> {
    pub fn new(index: usize, source: impl Into<String>, engine: E) -> Self {
        Self {
            id: SlotId(index),
            source: source.into(),
            engine,
            target: Framebuffer::default(),
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn index(&self) -> usize {
        self.id.0
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn command(&mut self, cmd: &Command) {
        let args = cmd.to_args();
        trace!("slot {} <- {}", self.id, args.join(" "));
        self.engine.command_async(&args);
    }

    /// (Re)load this slot's source on the same engine.
    pub fn load(&mut self) {
        let cmd = Command::LoadFile(self.source.clone());
        self.command(&cmd);
    }

    fn set_option(&mut self, key: &str, value: &str) {
        if let Err(e) = self.engine.set_option(key, value) {
            warn!("slot {}: {}={} rejected: {}", self.id, key, value, e);
        }
    }

    pub fn set_zoom(&mut self, level: f64) {
        let view = ViewParams { zoom: level, pan_x: 0.0, pan_y: 0.0 };
        let [(key, value), ..] = view.to_options();
        self.set_option(key, &value);
    }

    pub fn set_pan(&mut self, x: f64, y: f64) {
        let view = ViewParams { zoom: 0.0, pan_x: x, pan_y: y };
        let [_, (kx, vx), (ky, vy)] = view.to_options();
        self.set_option(kx, &vx);
        self.set_option(ky, &vy);
    }

    /// Push all view parameters. Safe to repeat.
    pub fn set_view(&mut self, view: &ViewParams) {
        self.set_zoom(view.zoom);
        self.set_pan(view.pan_x, view.pan_y);
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.set_option(options::LOOP_FILE, mode.option_value());
    }

    /// Startup options: exact frame stepping, no timing offset, loop mode.
    pub fn apply_defaults(&mut self, mode: LoopMode) {
        self.set_option(options::HR_SEEK_FRAMEDROP, "no");
        self.set_option(options::VIDEO_TIMING_OFFSET, "0");
        self.set_loop_mode(mode);
    }

    /// Width / height of the decoded video.
    pub fn video_aspect(&self) -> Result<f64, QueryError> {
        let dim = |name: &'static str| -> Result<i64, QueryError> {
            let prop = self
                .engine
                .get_property(name)
                .ok_or(QueryError::Unavailable(name))?;
            match prop.as_i64() {
                Some(v) if v > 0 => Ok(v),
                _ => Err(QueryError::Unexpected {
                    name,
                    value: prop.to_string(),
                }),
            }
        };
        let w = dim(props::WIDTH)?;
        let h = dim(props::HEIGHT)?;
        Ok(w as f64 / h as f64)
    }

    /// Render the engine's image into the private target at `w` x `h`.
    pub fn render(&mut self, w: u32, h: u32) -> &Framebuffer {
        self.target.ensure_size(w, h);
        // Engines deliver images top-down; targets are bottom-up
        self.engine.render(&mut self.target, true);
        &self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineFactory;
    use crate::engine::mock::MockFactory;

    #[test]
    fn test_typed_setters_format_strings() {
        let factory = MockFactory::default();
        let mut slot = StreamSlot::new(0, "a.mp4", factory.create(0).unwrap());
        slot.set_zoom(-0.25);
        slot.set_pan(0.1234, -0.5);
        slot.apply_defaults(LoopMode::Once);

        let opts = factory.journal.lock().unwrap().options();
        let kv: Vec<_> = opts.iter().map(|(_, k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(
            kv,
            vec![
                ("video-zoom", "-0.250"),
                ("video-pan-x", "0.123"),
                ("video-pan-y", "-0.500"),
                ("hr-seek-framedrop", "no"),
                ("video-timing-offset", "0"),
                ("loop-file", "no"),
            ]
        );
    }

    #[test]
    fn test_reload_reuses_engine() {
        let factory = MockFactory::default();
        let mut slot = StreamSlot::new(2, "clip.mov", factory.create(2).unwrap());
        slot.load();
        slot.load();
        let cmds = factory.journal.lock().unwrap().commands();
        assert_eq!(cmds.len(), 2);
        assert!(cmds.iter().all(|(i, a)| *i == 2 && a == &["loadfile", "clip.mov"]));
        assert_eq!(slot.id(), SlotId(2));
    }

    #[test]
    fn test_video_aspect_query() {
        let factory = MockFactory::default();
        let slot = StreamSlot::new(0, "a", factory.create(0).unwrap());
        assert!((slot.video_aspect().unwrap() - 16.0 / 9.0).abs() < 1e-12);

        factory.state(0).lock().unwrap().height = None;
        assert_eq!(slot.video_aspect(), Err(QueryError::Unavailable("height")));

        factory.state(0).lock().unwrap().height = Some(0);
        assert!(matches!(slot.video_aspect(), Err(QueryError::Unexpected { name: "height", .. })));
    }

    #[test]
    fn test_render_sizes_target_and_flips() {
        let factory = MockFactory::default();
        let mut slot = StreamSlot::new(1, "a", factory.create(1).unwrap());
        assert_eq!(slot.render(320, 180).size(), (320, 180));
        let journal = factory.journal.lock().unwrap();
        assert!(matches!(
            journal.calls.last(),
            Some(crate::engine::mock::Call::Render { index: 1, size: (320, 180), flip_y: true })
        ));
    }
}
