//! Composite pass: render dirty slots, blit into cells, present once.
//!
//! Presentation happens exactly once per pass, after every dirty slot has
//! been blitted, so cells never tear against each other and present cost
//! does not grow with N.

use log::trace;

use super::error::LoopError;
use super::layout::GridGeometry;
use super::slot::StreamSlot;
use crate::engine::StreamEngine;
use crate::surface::Framebuffer;
use crate::window::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassStats {
    pub rendered: usize,
    pub presents: usize,
}

/// Owns the shared surface all cells are blitted into.
#[derive(Debug, Default)]
pub struct Compositor {
    surface: Framebuffer,
    passes: u64,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn surface(&self) -> &Framebuffer {
        &self.surface
    }

    /// Render `dirty` (ascending) into their cells and present.
    ///
    /// Indices without a slot are skipped.
    pub fn composite<E: StreamEngine, D: Display>(
        &mut self,
        slots: &mut [StreamSlot<E>],
        dirty: &[usize],
        geometry: &GridGeometry,
        display: &mut D,
    ) -> Result<PassStats, LoopError> {
        if self.surface.ensure_size(geometry.surface_w, geometry.surface_h) {
            trace!("surface resized to {}x{}", geometry.surface_w, geometry.surface_h);
        }

        let mut stats = PassStats::default();
        let mut order = dirty.to_vec();
        order.sort_unstable();
        order.dedup();

        for index in order {
            let Some(slot) = slots.get_mut(index) else {
                continue;
            };
            let cell = geometry.cell_rect(index);
            if cell.is_empty() {
                continue;
            }
            let target = slot.render(cell.w, cell.h);
            self.surface.blit_to_cell(target, cell);
            stats.rendered += 1;
        }

        display.present(&self.surface)?;
        stats.presents = 1;
        self.passes += 1;
        trace!("pass {}: {} cells rendered", self.passes, stats.rendered);
        Ok(stats)
    }
}
