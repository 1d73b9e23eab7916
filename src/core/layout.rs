//! Grid layout: maps N streams onto rows x cols cells of the surface.
//!
//! `rows = floor(sqrt(n))`, `cols = ceil(n / rows)`, so the grid is never
//! taller than wide. Cell sizes use truncating division; remainder pixels
//! on the right and bottom edges belong to no cell.
//!
//! Cells are assigned row-major with a top-left origin: stream `i` sits in
//! column `i % cols`, row `i / cols`.

/// Pixel rectangle in top-left-origin surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl CellRect {
    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    pub fn intersects(&self, other: &CellRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Derived grid geometry for the current surface size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub rows: u32,
    pub cols: u32,
    pub cell_w: u32,
    pub cell_h: u32,
    pub surface_w: u32,
    pub surface_h: u32,
}

/// Compute the grid for `n` streams on a `surface_w` x `surface_h` surface.
pub fn layout(n: usize, surface_w: u32, surface_h: u32) -> GridGeometry {
    let n = n.max(1);
    let rows = n.isqrt();
    let cols = n.div_ceil(rows);
    let rows = rows as u32;
    let cols = cols as u32;

    GridGeometry {
        rows,
        cols,
        cell_w: surface_w / cols,
        cell_h: surface_h / rows,
        surface_w,
        surface_h,
    }
}

impl GridGeometry {
    /// Number of cells in the grid (>= number of streams).
    pub fn capacity(&self) -> usize {
        (self.rows * self.cols) as usize
    }

    /// Target rectangle for stream `index`.
    pub fn cell_rect(&self, index: usize) -> CellRect {
        let index = index as u32;
        let column = index % self.cols;
        let row = index / self.cols;
        CellRect {
            x: column * self.cell_w,
            y: row * self.cell_h,
            w: self.cell_w,
            h: self.cell_h,
        }
    }

    /// Cell index under a surface point, if any.
    pub fn cell_at(&self, x: u32, y: u32) -> Option<usize> {
        if self.cell_w == 0 || self.cell_h == 0 {
            return None;
        }
        let column = x / self.cell_w;
        let row = y / self.cell_h;
        if column >= self.cols || row >= self.rows {
            return None;
        }
        Some((row * self.cols + column) as usize)
    }

    /// Width / height of one cell. 1.0 for degenerate cells.
    pub fn cell_aspect(&self) -> f64 {
        if self.cell_w == 0 || self.cell_h == 0 {
            return 1.0;
        }
        self.cell_w as f64 / self.cell_h as f64
    }

    pub fn is_degenerate(&self) -> bool {
        self.cell_w == 0 || self.cell_h == 0
    }
}
