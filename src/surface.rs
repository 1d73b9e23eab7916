//! CPU render targets.
//!
//! `Framebuffer` mimics a GL framebuffer object: RGBA8, rows stored
//! bottom-up, so `(0, 0)` is the lower-left pixel. Engines render into one
//! per slot, the compositor blits them into a shared one, and the display
//! flips it back to top-down on present.
//!
//! Video drawing follows player conventions:
//! - the frame is letterboxed into the target (aspect preserved)
//! - `zoom` scales by `2^zoom` around the target center
//! - `pan_x/pan_y` shift by a fraction of the displayed video size
//!   (+x right, +y down)

use image::RgbaImage;

use crate::core::layout::CellRect;

pub const BLACK: [u8; 4] = [0, 0, 0, 255];

#[derive(Clone, PartialEq)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let mut fb = Self {
            width,
            height,
            pixels: Vec::new(),
        };
        fb.pixels = vec![0; fb.byte_len()];
        fb.clear(BLACK);
        fb
    }

    fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Reallocate (cleared to black) if the size changed. Returns true if it did.
    pub fn ensure_size(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        *self = Self::new(width, height);
        true
    }

    pub fn clear(&mut self, rgba: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Raw bytes, bottom row first.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Storage row `y` (0 = bottom).
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * 4;
        let start = y as usize * stride;
        &self.pixels[start..start + stride]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.width as usize * 4;
        let start = y as usize * stride;
        &mut self.pixels[start..start + stride]
    }

    /// Pixel at `(x, y)`, bottom-left origin.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Pixel at `(x, y)` as seen on screen (top-left origin).
    pub fn screen_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixel(x, self.height - 1 - y)
    }

    /// Nearest-neighbor copy of all of `src` into `dst` (bottom-left origin
    /// rect), clipped to this framebuffer. No blending.
    pub fn blit_from(&mut self, src: &Framebuffer, dst: CellRect) {
        if src.is_empty() || dst.is_empty() {
            return;
        }
        let x_end = dst.right().min(self.width);
        let y_end = dst.bottom().min(self.height);
        if dst.x >= x_end || dst.y >= y_end {
            return;
        }

        let src_cols: Vec<usize> = (dst.x..x_end)
            .map(|x| ((x - dst.x) as u64 * src.width as u64 / dst.w as u64) as usize * 4)
            .collect();

        for y in dst.y..y_end {
            let sy = ((y - dst.y) as u64 * src.height as u64 / dst.h as u64) as u32;
            let src_row = src.row(sy);
            let dst_row = self.row_mut(y);
            let mut di = dst.x as usize * 4;
            for &si in &src_cols {
                dst_row[di..di + 4].copy_from_slice(&src_row[si..si + 4]);
                di += 4;
            }
        }
    }

    /// Blit into a top-left-origin cell rect (display convention).
    pub fn blit_to_cell(&mut self, src: &Framebuffer, cell: CellRect) {
        if cell.bottom() > self.height {
            return;
        }
        let flipped = CellRect {
            y: self.height - cell.bottom(),
            ..cell
        };
        self.blit_from(src, flipped);
    }

    /// Top-down copy for display toolkits.
    pub fn to_image(&self) -> RgbaImage {
        let mut out = Vec::with_capacity(self.pixels.len());
        for y in (0..self.height).rev() {
            out.extend_from_slice(self.row(y));
        }
        RgbaImage::from_raw(self.width, self.height, out).unwrap_or_default()
    }
}

/// View parameters as an engine applies them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VideoView {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

/// Draw `frame` into `target` with letterboxing, zoom and pan.
///
/// With `flip_y` the frame's first row lands on the target's top row, which
/// is the last storage row of a bottom-up framebuffer.
pub fn draw_video(frame: &RgbaImage, target: &mut Framebuffer, view: &VideoView, flip_y: bool) {
    target.clear(BLACK);
    let (vw, vh) = frame.dimensions();
    if vw == 0 || vh == 0 || target.is_empty() {
        return;
    }

    let tw = target.width() as f64;
    let th = target.height() as f64;
    let scale = (tw / vw as f64).min(th / vh as f64) * view.zoom.exp2();
    let dw = vw as f64 * scale;
    let dh = vh as f64 * scale;
    let ox = (tw - dw) / 2.0 + view.pan_x * dw;
    let oy = (th - dh) / 2.0 + view.pan_y * dh;

    // Source column per target column, None outside the video
    let cols: Vec<Option<usize>> = (0..target.width())
        .map(|tx| {
            let sx = ((tx as f64 + 0.5 - ox) / scale).floor();
            (sx >= 0.0 && sx < vw as f64).then(|| sx as usize * 4)
        })
        .collect();

    let src = frame.as_raw();
    let src_stride = vw as usize * 4;
    let height = target.height();
    for ty in 0..height {
        let sy = ((ty as f64 + 0.5 - oy) / scale).floor();
        if sy < 0.0 || sy >= vh as f64 {
            continue;
        }
        let src_row = &src[sy as usize * src_stride..(sy as usize + 1) * src_stride];
        let storage_y = if flip_y { height - 1 - ty } else { ty };
        let dst_row = target.row_mut(storage_y);
        for (tx, col) in cols.iter().enumerate() {
            if let Some(si) = *col {
                dst_row[tx * 4..tx * 4 + 4].copy_from_slice(&src_row[si..si + 4]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    /// 2x2 frame: top row red, bottom row blue
    fn two_tone() -> RgbaImage {
        let mut img = RgbaImage::new(2, 2);
        for x in 0..2 {
            img.put_pixel(x, 0, Rgba(RED));
            img.put_pixel(x, 1, Rgba(BLUE));
        }
        img
    }

    #[test]
    fn test_flip_y_keeps_image_upright_on_screen() {
        let mut fb = Framebuffer::new(4, 4);
        draw_video(&two_tone(), &mut fb, &VideoView::default(), true);
        assert_eq!(fb.screen_pixel(0, 0), RED);
        assert_eq!(fb.screen_pixel(0, 3), BLUE);

        draw_video(&two_tone(), &mut fb, &VideoView::default(), false);
        assert_eq!(fb.screen_pixel(0, 0), BLUE);
    }

    #[test]
    fn test_letterbox_leaves_black_bars() {
        // 2x2 frame into 8x4: pillarboxed, 2px bars each side
        let mut fb = Framebuffer::new(8, 4);
        draw_video(&two_tone(), &mut fb, &VideoView::default(), true);
        assert_eq!(fb.screen_pixel(0, 0), BLACK);
        assert_eq!(fb.screen_pixel(1, 3), BLACK);
        assert_eq!(fb.screen_pixel(2, 0), RED);
        assert_eq!(fb.screen_pixel(5, 3), BLUE);
        assert_eq!(fb.screen_pixel(6, 0), BLACK);
    }

    #[test]
    fn test_pan_shifts_by_displayed_size() {
        let mut fb = Framebuffer::new(4, 4);
        let view = VideoView { zoom: 0.0, pan_x: 0.5, pan_y: 0.0 };
        draw_video(&two_tone(), &mut fb, &view, true);
        // Shifted right by half the displayed width
        assert_eq!(fb.screen_pixel(1, 0), BLACK);
        assert_eq!(fb.screen_pixel(2, 0), RED);
    }

    #[test]
    fn test_zoom_out_shrinks_around_center() {
        let mut fb = Framebuffer::new(4, 4);
        let view = VideoView { zoom: -1.0, pan_x: 0.0, pan_y: 0.0 };
        draw_video(&two_tone(), &mut fb, &view, true);
        assert_eq!(fb.screen_pixel(0, 0), BLACK);
        assert_eq!(fb.screen_pixel(1, 1), RED);
        assert_eq!(fb.screen_pixel(2, 2), BLUE);
        assert_eq!(fb.screen_pixel(3, 3), BLACK);
    }

    #[test]
    fn test_blit_to_cell_places_top_left_rect() {
        let mut surface = Framebuffer::new(4, 2);
        let mut cell = Framebuffer::new(2, 1);
        cell.clear(RED);

        // Top-right cell in display coordinates
        surface.blit_to_cell(&cell, CellRect { x: 2, y: 0, w: 2, h: 1 });
        assert_eq!(surface.screen_pixel(2, 0), RED);
        assert_eq!(surface.screen_pixel(3, 0), RED);
        assert_eq!(surface.screen_pixel(2, 1), BLACK);
        assert_eq!(surface.screen_pixel(0, 0), BLACK);
    }

    #[test]
    fn test_blit_scales_nearest() {
        let mut src = Framebuffer::new(1, 1);
        src.clear(BLUE);
        let mut dst = Framebuffer::new(3, 3);
        dst.blit_from(&src, CellRect { x: 0, y: 0, w: 3, h: 3 });
        assert!((0..3).all(|x| (0..3).all(|y| dst.pixel(x, y) == BLUE)));
    }

    #[test]
    fn test_blit_clips_to_bounds() {
        let mut src = Framebuffer::new(4, 4);
        src.clear(RED);
        let mut dst = Framebuffer::new(3, 3);
        dst.blit_from(&src, CellRect { x: 2, y: 2, w: 4, h: 4 });
        assert_eq!(dst.pixel(2, 2), RED);
        assert_eq!(dst.pixel(1, 1), BLACK);
    }

    #[test]
    fn test_to_image_is_top_down() {
        let mut fb = Framebuffer::new(1, 2);
        fb.row_mut(1).copy_from_slice(&RED); // storage top row
        let img = fb.to_image();
        assert_eq!(img.get_pixel(0, 0).0, RED);
        assert_eq!(img.get_pixel(0, 1).0, BLACK);
    }

    #[test]
    fn test_ensure_size_reallocates_only_on_change() {
        let mut fb = Framebuffer::new(2, 2);
        fb.clear(RED);
        assert!(!fb.ensure_size(2, 2));
        assert_eq!(fb.pixel(0, 0), RED);
        assert!(fb.ensure_size(3, 1));
        assert_eq!(fb.size(), (3, 1));
        assert_eq!(fb.as_bytes().len(), 12);
        assert_eq!(fb.pixel(2, 0), BLACK);
    }
}
