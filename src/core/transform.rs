//! Shared pan/zoom state for the whole grid.
//!
//! One `TransformState` drives every stream. Pan is kept in window pixels
//! relative to a cell, zoom in log2 steps. `publish()` converts both into
//! the normalized units engines expect:
//!
//! - `video-zoom`: log2 scale factor
//! - `video-pan-x/y`: fraction of the displayed (scaled) video size
//!
//! Aspect correction: the video is letterboxed into its cell, so only one
//! axis fills the cell. The pan on the other axis is divided by the shrink
//! factor, keeping drags isotropic whatever the grid shape.

use glam::DVec2;
use log::trace;

use super::layout::GridGeometry;

/// Zoom change per wheel tick, log2 scale
pub const ZOOM_STEP: f64 = 0.125;

/// In-progress drag with the primary button held.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DragGesture {
    last: DVec2,
    delta: DVec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformState {
    zoom_level: f64,
    pan: DVec2,
    drag: Option<DragGesture>,
}

impl Default for TransformState {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformState {
    pub fn new() -> Self {
        Self {
            zoom_level: 0.0,
            pan: DVec2::ZERO,
            drag: None,
        }
    }

    pub fn zoom_level(&self) -> f64 {
        self.zoom_level
    }

    /// Effective pan, including an unreleased drag.
    pub fn pan(&self) -> DVec2 {
        self.pan + self.drag.map_or(DVec2::ZERO, |d| d.delta)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Primary button pressed at `pos`.
    pub fn begin_drag(&mut self, pos: DVec2) {
        self.drag = Some(DragGesture {
            last: pos,
            delta: DVec2::ZERO,
        });
    }

    /// Pointer moved. Returns true if pan changed.
    pub fn drag_to(&mut self, pos: DVec2) -> bool {
        let Some(drag) = self.drag.as_mut() else {
            return false;
        };
        let step = pos - drag.last;
        drag.last = pos;
        drag.delta += step;
        step != DVec2::ZERO
    }

    /// Primary button released: fold the gesture into the persistent pan.
    /// Returns true if a gesture was active.
    pub fn end_drag(&mut self, pos: DVec2) -> bool {
        if self.drag.is_none() {
            return false;
        }
        self.drag_to(pos);
        if let Some(drag) = self.drag.take() {
            self.pan += drag.delta;
        }
        true
    }

    /// Zoom by `steps` wheel ticks about `cursor` (offset from cell center).
    ///
    /// The point under the cursor stays put:
    /// `pan' = (pan - cursor) * 2^dz + cursor`.
    pub fn zoom_about(&mut self, steps: i32, cursor: DVec2) {
        if steps == 0 {
            return;
        }
        let dz = steps as f64 * ZOOM_STEP;
        let factor = dz.exp2();
        self.zoom_level += dz;
        self.pan = (self.pan - cursor) * factor + cursor;
        if let Some(drag) = self.drag.as_mut() {
            drag.delta *= factor;
        }
        trace!(
            "zoom {:+} -> level {:.3}, pan ({:.1}, {:.1})",
            steps, self.zoom_level, self.pan.x, self.pan.y
        );
    }

    /// Wheel tick(s). Wheel up (positive) zooms out.
    pub fn wheel(&mut self, wheel_y: i32, cursor: DVec2) {
        self.zoom_about(-wheel_y.signum(), cursor);
    }

    /// Zero zoom and pan. A drag in progress restarts from its current point.
    pub fn reset(&mut self) {
        self.zoom_level = 0.0;
        self.pan = DVec2::ZERO;
        if let Some(drag) = self.drag.as_mut() {
            drag.delta = DVec2::ZERO;
        }
    }

    /// Normalized per-stream parameters for the current geometry.
    ///
    /// `video_aspect` is width / height of the representative stream.
    pub fn publish(&self, geometry: &GridGeometry, video_aspect: f64) -> ViewParams {
        if geometry.is_degenerate() {
            return ViewParams {
                zoom: self.zoom_level,
                pan_x: 0.0,
                pan_y: 0.0,
            };
        }

        let cell_aspect = geometry.cell_aspect();
        let (aspect_w, aspect_h) = aspect_correction(video_aspect, cell_aspect);
        let scale = self.zoom_level.exp2();
        let pan = self.pan();

        ViewParams {
            zoom: self.zoom_level,
            pan_x: pan.x / geometry.cell_w as f64 / scale / aspect_w,
            pan_y: pan.y / geometry.cell_h as f64 / scale / aspect_h,
        }
    }
}

/// Fraction of the cell the letterboxed video covers on each axis.
pub fn aspect_correction(video_aspect: f64, cell_aspect: f64) -> (f64, f64) {
    if !(video_aspect.is_finite() && video_aspect > 0.0) {
        return (1.0, 1.0);
    }
    if video_aspect > cell_aspect {
        (1.0, cell_aspect / video_aspect)
    } else {
        (video_aspect / cell_aspect, 1.0)
    }
}

/// Cursor offset from the center of the cell containing `pos`.
///
/// Positions in the remainder strip wrap like the cell grid does.
pub fn cursor_offset(pos: DVec2, geometry: &GridGeometry) -> DVec2 {
    if geometry.is_degenerate() {
        return DVec2::ZERO;
    }
    let cell = DVec2::new(geometry.cell_w as f64, geometry.cell_h as f64);
    let local = DVec2::new(
        (pos.x.max(0.0) as u32 % geometry.cell_w) as f64,
        (pos.y.max(0.0) as u32 % geometry.cell_h) as f64,
    );
    local - (cell / 2.0).floor()
}

/// Normalized view parameters pushed to every stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParams {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl ViewParams {
    pub const ZOOM_KEY: &'static str = "video-zoom";
    pub const PAN_X_KEY: &'static str = "video-pan-x";
    pub const PAN_Y_KEY: &'static str = "video-pan-y";

    /// Fixed-precision option strings, in push order.
    pub fn to_options(&self) -> [(&'static str, String); 3] {
        [
            (Self::ZOOM_KEY, format_option(self.zoom)),
            (Self::PAN_X_KEY, format_option(self.pan_x)),
            (Self::PAN_Y_KEY, format_option(self.pan_y)),
        ]
    }
}

fn format_option(v: f64) -> String {
    let s = format!("{:.3}", v);
    // "-0.000" and "0.000" mean the same thing to engines
    if s == "-0.000" { "0.000".to_string() } else { s }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::layout::layout;

    fn geom() -> GridGeometry {
        layout(4, 2000, 1000)
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut t = TransformState::new();
        t.begin_drag(DVec2::new(10.0, 10.0));
        t.drag_to(DVec2::new(60.0, 30.0));
        t.end_drag(DVec2::new(70.0, 40.0));
        t.wheel(1, DVec2::new(100.0, -20.0));
        t.wheel(-1, DVec2::new(-300.0, 50.0));
        t.wheel(-1, DVec2::new(0.0, 0.0));

        t.reset();
        assert_eq!(t.zoom_level(), 0.0);
        assert_eq!(t.pan(), DVec2::ZERO);
    }

    #[test]
    fn test_drag_accumulates_and_folds_on_release() {
        let mut t = TransformState::new();
        t.begin_drag(DVec2::new(100.0, 100.0));
        assert!(t.drag_to(DVec2::new(110.0, 95.0)));
        assert!(t.drag_to(DVec2::new(130.0, 90.0)));
        assert_eq!(t.pan(), DVec2::new(30.0, -10.0));
        assert!(t.is_dragging());

        assert!(t.end_drag(DVec2::new(135.0, 90.0)));
        assert!(!t.is_dragging());
        assert_eq!(t.pan(), DVec2::new(35.0, -10.0));

        // Next gesture starts from zero delta
        t.begin_drag(DVec2::new(0.0, 0.0));
        assert_eq!(t.pan(), DVec2::new(35.0, -10.0));
        t.end_drag(DVec2::new(5.0, 5.0));
        assert_eq!(t.pan(), DVec2::new(40.0, -5.0));
    }

    #[test]
    fn test_motion_without_button_is_ignored() {
        let mut t = TransformState::new();
        assert!(!t.drag_to(DVec2::new(50.0, 50.0)));
        assert!(!t.end_drag(DVec2::new(60.0, 60.0)));
        assert_eq!(t.pan(), DVec2::ZERO);
    }

    #[test]
    fn test_wheel_up_then_down_restores_state() {
        let g = geom();
        let mut t = TransformState::new();
        t.begin_drag(DVec2::ZERO);
        t.end_drag(DVec2::new(37.0, -12.0));
        let before_zoom = t.zoom_level();
        let before_pan = t.pan();

        let cursor = cursor_offset(DVec2::new(100.0, 50.0), &g);
        t.wheel(1, cursor);
        assert_eq!(t.zoom_level(), before_zoom - ZOOM_STEP);
        t.wheel(-1, cursor);

        assert_eq!(t.zoom_level(), before_zoom);
        assert!((t.pan() - before_pan).length() < 1e-6);
    }

    #[test]
    fn test_zoom_round_trip_many_steps() {
        let mut t = TransformState::new();
        t.begin_drag(DVec2::ZERO);
        t.end_drag(DVec2::new(-250.0, 80.0));
        let before = t.pan();
        let cursor = DVec2::new(123.0, -45.0);

        for _ in 0..7 {
            t.zoom_about(1, cursor);
        }
        for _ in 0..7 {
            t.zoom_about(-1, cursor);
        }
        assert!(t.zoom_level().abs() < 1e-12);
        assert!((t.pan() - before).length() < 1e-6);
    }

    #[test]
    fn test_zoom_keeps_cursor_point_fixed() {
        // A point at offset p from the pan origin lands at pan + p * 2^z.
        // The image point under the cursor must stay under the cursor.
        let mut t = TransformState::new();
        let cursor = DVec2::new(200.0, 100.0);
        let image_point = (cursor - t.pan()) / t.zoom_level().exp2();

        t.zoom_about(3, cursor);
        let screen = t.pan() + image_point * t.zoom_level().exp2();
        assert!((screen - cursor).length() < 1e-9);
    }

    #[test]
    fn test_cursor_offset_is_relative_to_cell_center() {
        let g = geom(); // 1000x500 cells
        assert_eq!(cursor_offset(DVec2::new(100.0, 50.0), &g), DVec2::new(-400.0, -200.0));
        assert_eq!(cursor_offset(DVec2::new(1500.0, 750.0), &g), DVec2::ZERO);
    }

    #[test]
    fn test_publish_is_idempotent() {
        let g = geom();
        let mut t = TransformState::new();
        t.begin_drag(DVec2::ZERO);
        t.end_drag(DVec2::new(33.3, -71.9));
        t.wheel(-1, DVec2::new(12.0, 7.0));

        let a = t.publish(&g, 16.0 / 9.0).to_options();
        let b = t.publish(&g, 16.0 / 9.0).to_options();
        assert_eq!(a, b);
    }

    #[test]
    fn test_publish_aspect_correction() {
        let g = geom(); // cell aspect 2.0
        let mut t = TransformState::new();
        t.begin_drag(DVec2::ZERO);
        t.end_drag(DVec2::new(100.0, 50.0));

        // 4:3 video in a 2:1 cell is pillarboxed: displayed width is 666.7px
        let v = t.publish(&g, 4.0 / 3.0);
        assert!((v.pan_x - 100.0 / 1000.0 / (2.0 / 3.0)).abs() < 1e-12);
        assert!((v.pan_y - 50.0 / 500.0).abs() < 1e-12);

        // 4:1 video is letterboxed on y instead
        let v = t.publish(&g, 4.0);
        assert!((v.pan_x - 0.1).abs() < 1e-12);
        assert!((v.pan_y - 0.1 / 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_publish_scales_pan_by_zoom() {
        let g = geom();
        let mut t = TransformState::new();
        t.zoom_about(8, DVec2::ZERO); // 2x, pan stays at 0
        t.begin_drag(DVec2::ZERO);
        t.end_drag(DVec2::new(200.0, 0.0));
        let v = t.publish(&g, 2.0);
        assert_eq!(v.zoom, 1.0);
        assert!((v.pan_x - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_option_formatting() {
        let v = ViewParams { zoom: -0.125, pan_x: 0.00004, pan_y: -0.00004 };
        let opts = v.to_options();
        assert_eq!(opts[0], ("video-zoom", "-0.125".to_string()));
        assert_eq!(opts[1], ("video-pan-x", "0.000".to_string()));
        assert_eq!(opts[2], ("video-pan-y", "0.000".to_string()));
    }

    #[test]
    fn test_invalid_aspect_falls_back_to_square() {
        assert_eq!(aspect_correction(f64::NAN, 2.0), (1.0, 1.0));
        assert_eq!(aspect_correction(0.0, 2.0), (1.0, 1.0));
    }
}
