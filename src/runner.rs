//! Application runner - wires engines, event loop and window together.
//!
//! Threads:
//! - main: eframe window (`GridWindow`)
//! - `grid-loop`: the `Orchestrator`, sole owner of all stream state
//! - `stream-N`: one playback thread per engine

use anyhow::{Context, anyhow};
use log::{debug, error, info};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::cli::Args;
use crate::core::error::{InitError, LoopError};
use crate::core::event_bus::EventBus;
use crate::core::orchestrator::Orchestrator;
use crate::engine::FfmpegBackend;
use crate::window::GridWindow;

type LoopHandle = JoinHandle<Result<(), LoopError>>;

/// Run the viewer until the window closes or the user quits.
///
/// Startup failures come back as `InitError`, loop failures as `LoopError`,
/// both wrapped in `anyhow` for the one-line diagnostic.
pub fn run_app(args: Args) -> anyhow::Result<()> {
    info!("gridplay v{} starting", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);

    let viewer = args.viewer_config();
    let window = args.window_config();
    let sources = args.sources.clone();
    for (i, source) in sources.iter().enumerate() {
        info!("Stream {}: {}", i, source);
    }

    let backend = FfmpegBackend::new()
        .map_err(|source| InitError::EngineCreate { index: 0, source })?;

    let bus = EventBus::new();
    let emitter = bus.emitter();

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title(format!(
                "gridplay v{} - {} streams - H for help",
                env!("CARGO_PKG_VERSION"),
                sources.len()
            ))
            .with_inner_size([window.width as f32, window.height as f32])
            .with_fullscreen(window.fullscreen)
            .with_resizable(true),
        ..Default::default()
    };

    // Filled by the app creator, read back after the window is gone
    let startup_error: Arc<Mutex<Option<InitError>>> = Arc::new(Mutex::new(None));
    let loop_handle: Arc<Mutex<Option<LoopHandle>>> = Arc::new(Mutex::new(None));

    let result = {
        let startup_error = Arc::clone(&startup_error);
        let loop_handle = Arc::clone(&loop_handle);
        let emitter = emitter.clone();
        eframe::run_native(
            "gridplay",
            native_options,
            Box::new(move |cc| {
                let (app, display) = GridWindow::new(
                    &cc.egui_ctx,
                    emitter,
                    (window.width, window.height),
                );
                let orchestrator =
                    match Orchestrator::new(&backend, &sources, display, bus, &viewer) {
                        Ok(orchestrator) => orchestrator,
                        Err(e) => {
                            let msg = e.to_string();
                            *startup_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(e);
                            return Err(msg.into());
                        }
                    };

                let handle = thread::Builder::new()
                    .name("grid-loop".into())
                    .spawn(move || {
                        let mut orchestrator = orchestrator;
                        orchestrator.run()
                    })?;
                *loop_handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
                Ok(Box::new(app))
            }),
        )
    };

    if let Some(e) = startup_error.lock().unwrap_or_else(|e| e.into_inner()).take() {
        return Err(e.into());
    }
    result.map_err(|e| InitError::Graphics(e.to_string()))?;

    // Window is gone; make sure the loop sees it
    emitter.quit();
    let handle = loop_handle.lock().unwrap_or_else(|e| e.into_inner()).take();
    if let Some(handle) = handle {
        match handle.join() {
            Ok(result) => result.context("event loop failed")?,
            Err(_) => {
                error!("event loop thread panicked");
                return Err(anyhow!("event loop thread panicked"));
            }
        }
    }

    info!("gridplay exiting");
    Ok(())
}
