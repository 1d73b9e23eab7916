//! Playback engine boundary.
//!
//! The grid core drives engines only through `StreamEngine`. The interface is
//! deliberately stringly, mirroring command-line style players:
//!
//! - commands are argument vectors, issued fire-and-forget
//! - options are key/value strings
//! - two callbacks signal "events pending" and "new frame may be ready"
//!
//! `Command` is the typed vocabulary on top; `core::slot` is the only place
//! that formats it into strings.

pub mod decoder;
pub mod ffmpeg;
pub mod filters;
#[cfg(test)]
pub mod mock;
pub mod playback;

pub use ffmpeg::{FfmpegBackend, FfmpegEngine};
pub use filters::Filter;

use crate::surface::Framebuffer;

/// Wake-up callback. Must only enqueue and return.
pub type WakeFn = Box<dyn Fn() + Send + Sync>;

/// Option keys understood by engines
pub mod options {
    pub const VIDEO_ZOOM: &str = "video-zoom";
    pub const VIDEO_PAN_X: &str = "video-pan-x";
    pub const VIDEO_PAN_Y: &str = "video-pan-y";
    pub const LOOP_FILE: &str = "loop-file";
    pub const PAUSE: &str = "pause";
    pub const HR_SEEK_FRAMEDROP: &str = "hr-seek-framedrop";
    pub const VIDEO_TIMING_OFFSET: &str = "video-timing-offset";
}

/// Property names engines answer
pub mod props {
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
    pub const PAUSE: &str = "pause";
    pub const EOF_REACHED: &str = "eof-reached";
    pub const TIME_POS: &str = "time-pos";
    pub const DURATION: &str = "duration";
    pub const PATH: &str = "path";
}

/// One playback engine instance. Owned exclusively by its slot; dropping it
/// destroys the engine.
pub trait StreamEngine: Send {
    /// Second-phase init after options that must precede it.
    fn initialize(&mut self) -> Result<(), EngineError>;

    /// Fire-and-forget command. Rejections arrive later as
    /// `EngineEvent::CommandFailed`.
    fn command_async(&mut self, args: &[String]);

    fn set_option(&mut self, key: &str, value: &str) -> Result<(), EngineError>;

    /// Called from any thread when events are waiting in `poll_event`.
    fn set_wakeup_callback(&mut self, cb: WakeFn);

    /// Called from any thread when `update()` may report a new frame.
    fn set_update_callback(&mut self, cb: WakeFn);

    /// Non-blocking; `None` once drained.
    fn poll_event(&mut self) -> Option<EngineEvent>;

    /// True if a new image should be rendered.
    fn update(&mut self) -> bool;

    /// Draw the current image into `target` at the target's size.
    fn render(&mut self, target: &mut Framebuffer, flip_y: bool);

    fn get_property(&self, name: &str) -> Option<Property>;
}

/// Creates engines; one call per stream at startup.
pub trait EngineFactory {
    type Engine: StreamEngine;

    fn create(&self, index: usize) -> Result<Self::Engine, EngineError>;
}

/// Property value returned by `get_property`.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Int(i64),
    Double(f64),
    Flag(bool),
    Text(String),
}

impl Property {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Property::Int(v) => Some(*v),
            Property::Double(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Property::Int(v) => Some(*v as f64),
            Property::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Property::Flag(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Property::Int(v) => write!(f, "{}", v),
            Property::Double(v) => write!(f, "{}", v),
            Property::Flag(v) => write!(f, "{}", if *v { "yes" } else { "no" }),
            Property::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Why playback of a file stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum EndReason {
    Eof,
    Error(String),
    Replaced,
}

/// Asynchronous engine notifications, drained with `poll_event`.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    LogMessage { level: log::Level, text: String },
    FileLoaded { path: String },
    EndFile { reason: EndReason },
    PlaybackRestart,
    PauseChanged(bool),
    CommandFailed { command: String, error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    Create(String),
    Init(String),
    BadCommand(String),
    UnknownOption(String),
    BadOptionValue { key: String, value: String },
    Decode(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Create(e) => write!(f, "engine creation failed: {}", e),
            EngineError::Init(e) => write!(f, "engine init failed: {}", e),
            EngineError::BadCommand(e) => write!(f, "bad command: {}", e),
            EngineError::UnknownOption(k) => write!(f, "unknown option '{}'", k),
            EngineError::BadOptionValue { key, value } => {
                write!(f, "bad value '{}' for option '{}'", value, key)
            }
            EngineError::Decode(e) => write!(f, "decode error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

/// Seek target, in seconds or percent of duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    Relative(f64),
    Absolute(f64),
    AbsolutePercent(f64),
}

/// Typed command vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadFile(String),
    TogglePause,
    FrameStep,
    FrameBackStep,
    Seek(SeekTarget),
    ToggleFilter(Filter),
}

impl Command {
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Command::LoadFile(path) => vec!["loadfile".into(), path.clone()],
            Command::TogglePause => vec!["cycle".into(), "pause".into()],
            Command::FrameStep => vec!["frame-step".into()],
            Command::FrameBackStep => vec!["frame-back-step".into()],
            Command::Seek(target) => {
                let (value, flags) = match target {
                    SeekTarget::Relative(s) => (*s, "exact"),
                    SeekTarget::Absolute(s) => (*s, "absolute+exact"),
                    SeekTarget::AbsolutePercent(p) => (*p, "absolute-percent+exact"),
                };
                vec!["seek".into(), format!("{}", value), flags.into()]
            }
            Command::ToggleFilter(filter) => {
                vec!["vf".into(), "toggle".into(), filter.to_string()]
            }
        }
    }

    pub fn parse(args: &[String]) -> Result<Self, EngineError> {
        let bad = || EngineError::BadCommand(args.join(" "));
        let name = args.first().ok_or_else(bad)?;
        match (name.as_str(), &args[1..]) {
            ("loadfile", [path, ..]) => Ok(Command::LoadFile(path.clone())),
            ("cycle", [prop]) if prop == "pause" => Ok(Command::TogglePause),
            ("frame-step", []) => Ok(Command::FrameStep),
            ("frame-back-step", []) => Ok(Command::FrameBackStep),
            ("seek", [value, rest @ ..]) => {
                let value: f64 = value.parse().map_err(|_| bad())?;
                if !value.is_finite() {
                    return Err(bad());
                }
                let flags = rest.first().map(String::as_str).unwrap_or("relative");
                let modes: Vec<&str> = flags.split('+').collect();
                let target = if modes.contains(&"absolute-percent") {
                    SeekTarget::AbsolutePercent(value)
                } else if modes.contains(&"absolute") {
                    SeekTarget::Absolute(value)
                } else {
                    SeekTarget::Relative(value)
                };
                Ok(Command::Seek(target))
            }
            ("vf", [op, filter]) if op == "toggle" => {
                Ok(Command::ToggleFilter(filter.parse().map_err(|_| bad())?))
            }
            _ => Err(bad()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_command_strings() {
        assert_eq!(Command::TogglePause.to_args(), args(&["cycle", "pause"]));
        assert_eq!(
            Command::Seek(SeekTarget::Absolute(0.0)).to_args(),
            args(&["seek", "0", "absolute+exact"])
        );
        assert_eq!(
            Command::Seek(SeekTarget::Relative(-30.0)).to_args(),
            args(&["seek", "-30", "exact"])
        );
        assert_eq!(
            Command::Seek(SeekTarget::AbsolutePercent(100.0)).to_args(),
            args(&["seek", "100", "absolute-percent+exact"])
        );
        assert_eq!(
            Command::ToggleFilter(Filter::LinearGamma).to_args(),
            args(&["vf", "toggle", "format:gamma=linear"])
        );
    }

    #[test]
    fn test_parse_accepts_own_vocabulary() {
        let cmds = [
            Command::LoadFile("/tmp/a b.mp4".into()),
            Command::TogglePause,
            Command::FrameStep,
            Command::FrameBackStep,
            Command::Seek(SeekTarget::Relative(30.0)),
            Command::Seek(SeekTarget::Absolute(0.0)),
            Command::Seek(SeekTarget::AbsolutePercent(100.0)),
            Command::ToggleFilter(Filter::Blur { sigma: 32.0 }),
        ];
        for cmd in cmds {
            assert_eq!(Command::parse(&cmd.to_args()), Ok(cmd));
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Command::parse(&[]).is_err());
        assert!(Command::parse(&args(&["screenshot-to-file", "x.png"])).is_err());
        assert!(Command::parse(&args(&["seek", "soon"])).is_err());
        assert!(Command::parse(&args(&["seek", "inf"])).is_err());
        assert!(Command::parse(&args(&["cycle", "mute"])).is_err());
        assert!(Command::parse(&args(&["vf", "toggle", "sepia"])).is_err());
    }

    #[test]
    fn test_seek_without_flags_is_relative() {
        assert_eq!(
            Command::parse(&args(&["seek", "5"])),
            Ok(Command::Seek(SeekTarget::Relative(5.0)))
        );
    }

    #[test]
    fn test_property_accessors() {
        assert_eq!(Property::Int(1920).as_f64(), Some(1920.0));
        assert_eq!(Property::Flag(true).as_i64(), None);
        assert_eq!(Property::Flag(false).to_string(), "no");
    }
}
