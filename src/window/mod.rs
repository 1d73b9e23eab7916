//! Windowing boundary: input events in, composed surface out.

pub mod egui_window;

pub use egui_window::{EguiDisplay, GridWindow};

use crate::core::error::LoopError;
use crate::surface::Framebuffer;

/// Keys the loop reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Space,
    ArrowLeft,
    ArrowRight,
    G,
    B,
    R,
    J,
    L,
    E,
    F,
    Q,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Window input, positions in surface pixels (top-left origin).
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    /// Contents lost, redraw everything
    Expose,
    Resize { width: u32, height: u32 },
    Key(Key),
    /// `y > 0` is wheel up
    Wheel { x: i32, y: i32, pos_x: f64, pos_y: f64 },
    ButtonDown { button: PointerButton, x: f64, y: f64 },
    ButtonUp { button: PointerButton, x: f64, y: f64 },
    Motion { x: f64, y: f64 },
}

/// Presentation side of the window.
pub trait Display {
    /// Current drawable size in pixels.
    fn surface_size(&self) -> (u32, u32);

    /// Show the composed surface. Called once per composite pass.
    fn present(&mut self, surface: &Framebuffer) -> Result<(), LoopError>;

    /// Loop is terminating; the window may close.
    fn close(&mut self) {}
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Records presents; size is settable.
    #[derive(Debug, Default)]
    pub struct MockDisplay {
        pub size: (u32, u32),
        pub presents: usize,
        pub last: Option<Framebuffer>,
        pub closed: bool,
        pub fail_present: bool,
    }

    impl MockDisplay {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                size: (width, height),
                ..Default::default()
            }
        }
    }

    impl Display for MockDisplay {
        fn surface_size(&self) -> (u32, u32) {
            self.size
        }

        fn present(&mut self, surface: &Framebuffer) -> Result<(), LoopError> {
            if self.fail_present {
                return Err(LoopError::Present("mock".into()));
            }
            self.presents += 1;
            self.last = Some(surface.clone());
            Ok(())
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }
}
