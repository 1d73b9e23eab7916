//! Error taxonomy for the grid core.
//!
//! - `InitError`: fatal, aborts startup with exit code 1
//! - `LoopError`: fatal, terminates a running loop
//! - `QueryError`: a collaborator property query failed; callers degrade
//!   to a default and log

use crate::engine::EngineError;

/// Startup failure. Nothing is retried, no partial run is attempted.
#[derive(Debug)]
pub enum InitError {
    NoSources,
    TooManySources { given: usize, max: usize },
    EngineCreate { index: usize, source: EngineError },
    EngineInit { index: usize, source: EngineError },
    Graphics(String),
}

impl std::fmt::Display for InitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitError::NoSources => write!(f, "no stream sources given"),
            InitError::TooManySources { given, max } => {
                write!(f, "too many stream sources: {} (max {})", given, max)
            }
            InitError::EngineCreate { index, source } => {
                write!(f, "context init failed for stream {}: {}", index, source)
            }
            InitError::EngineInit { index, source } => {
                write!(f, "engine init failed for stream {}: {}", index, source)
            }
            InitError::Graphics(e) => write!(f, "failed to create graphics context: {}", e),
        }
    }
}

impl std::error::Error for InitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InitError::EngineCreate { source, .. } | InitError::EngineInit { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Failure of the running loop itself.
#[derive(Debug)]
pub enum LoopError {
    /// The blocking wait on the event queue failed
    EventWait(String),
    /// The display refused the composed surface
    Present(String),
}

impl std::fmt::Display for LoopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopError::EventWait(e) => write!(f, "event loop error: {}", e),
            LoopError::Present(e) => write!(f, "present failed: {}", e),
        }
    }
}

impl std::error::Error for LoopError {}

/// A property query on an engine failed or returned unusable data.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    Unavailable(&'static str),
    Unexpected { name: &'static str, value: String },
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Unavailable(name) => write!(f, "property '{}' unavailable", name),
            QueryError::Unexpected { name, value } => {
                write!(f, "property '{}' has unexpected value {}", name, value)
            }
        }
    }
}

impl std::error::Error for QueryError {}
