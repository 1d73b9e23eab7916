//! eframe frontend.
//!
//! `GridWindow` runs on the main thread: it forwards input to the event bus
//! and draws whatever surface was presented last. `EguiDisplay` is the
//! loop-thread half, implementing `Display` over the same shared slot.

use eframe::egui;
use image::RgbaImage;
use log::{debug, trace};
use std::sync::{Arc, Mutex};

use super::{Display, Key, PointerButton, WindowEvent};
use crate::core::error::LoopError;
use crate::core::event_bus::EventEmitter;
use crate::help;
use crate::surface::Framebuffer;

#[derive(Default)]
struct Shared {
    /// Drawable size in physical pixels
    size: (u32, u32),
    image: Option<RgbaImage>,
    generation: u64,
}

fn lock(shared: &Mutex<Shared>) -> std::sync::MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// Loop-side handle: presents composed surfaces into the window.
pub struct EguiDisplay {
    shared: Arc<Mutex<Shared>>,
    ctx: egui::Context,
}

impl Display for EguiDisplay {
    fn surface_size(&self) -> (u32, u32) {
        lock(&self.shared).size
    }

    fn present(&mut self, surface: &Framebuffer) -> Result<(), LoopError> {
        let image = surface.to_image();
        if image.width() != surface.width() || image.height() != surface.height() {
            return Err(LoopError::Present(format!(
                "surface {}x{} could not be converted",
                surface.width(),
                surface.height()
            )));
        }
        {
            let mut shared = lock(&self.shared);
            shared.image = Some(image);
            shared.generation += 1;
        }
        self.ctx.request_repaint();
        Ok(())
    }

    fn close(&mut self) {
        debug!("closing window");
        self.ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        self.ctx.request_repaint();
    }
}

/// The window itself (eframe app).
pub struct GridWindow {
    shared: Arc<Mutex<Shared>>,
    emitter: EventEmitter,
    texture: Option<egui::TextureHandle>,
    shown_generation: u64,
    exposed: bool,
    show_help: bool,
    quit_sent: bool,
}

impl GridWindow {
    /// Build the window and its display half. `initial_size` is reported
    /// until the first frame measures the real one.
    pub fn new(
        ctx: &egui::Context,
        emitter: EventEmitter,
        initial_size: (u32, u32),
    ) -> (Self, EguiDisplay) {
        let shared = Arc::new(Mutex::new(Shared {
            size: initial_size,
            ..Default::default()
        }));
        let window = Self {
            shared: Arc::clone(&shared),
            emitter,
            texture: None,
            shown_generation: 0,
            exposed: false,
            show_help: false,
            quit_sent: false,
        };
        let display = EguiDisplay {
            shared,
            ctx: ctx.clone(),
        };
        (window, display)
    }

    fn upload_latest(&mut self, ctx: &egui::Context) {
        let image = {
            let shared = lock(&self.shared);
            if shared.generation == self.shown_generation {
                return;
            }
            self.shown_generation = shared.generation;
            match &shared.image {
                Some(img) => egui::ColorImage::from_rgba_unmultiplied(
                    [img.width() as usize, img.height() as usize],
                    img.as_raw(),
                ),
                None => return,
            }
        };
        match &mut self.texture {
            Some(texture) => texture.set(image, egui::TextureOptions::NEAREST),
            None => {
                self.texture = Some(ctx.load_texture("grid", image, egui::TextureOptions::NEAREST))
            }
        }
    }

    /// Report size changes (and the first expose) to the loop.
    fn track_size(&mut self, size: (u32, u32)) {
        let changed = {
            let mut shared = lock(&self.shared);
            let changed = shared.size != size;
            shared.size = size;
            changed
        };
        if changed {
            debug!("window resized to {}x{}", size.0, size.1);
            self.emitter.window(WindowEvent::Resize {
                width: size.0,
                height: size.1,
            });
        }
        if !self.exposed {
            self.exposed = true;
            self.emitter.window(WindowEvent::Expose);
        }
    }

    fn forward_input(&mut self, ctx: &egui::Context, origin: egui::Pos2) {
        let ppp = ctx.pixels_per_point();
        let (events, hover) = ctx.input(|i| (i.events.clone(), i.pointer.latest_pos()));
        for event in &events {
            if let egui::Event::Key { key: egui::Key::H, pressed: true, .. } = event {
                self.show_help = !self.show_help;
                continue;
            }
            if let Some(ev) = translate(event, origin, ppp, hover) {
                trace!("input {:?}", ev);
                self.emitter.window(ev);
            }
        }
    }
}

impl eframe::App for GridWindow {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.viewport().close_requested()) && !self.quit_sent {
            self.quit_sent = true;
            self.emitter.quit();
        }

        self.upload_latest(ctx);

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let rect = ui.max_rect();
                let ppp = ctx.pixels_per_point();
                let size = (
                    (rect.width() * ppp).round().max(0.0) as u32,
                    (rect.height() * ppp).round().max(0.0) as u32,
                );
                self.track_size(size);
                self.forward_input(ctx, rect.min);

                if let Some(texture) = &self.texture {
                    let [w, h] = texture.size();
                    let image_rect = egui::Rect::from_min_size(
                        rect.min,
                        egui::vec2(w as f32 / ppp, h as f32 / ppp),
                    );
                    let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                    ui.painter()
                        .image(texture.id(), image_rect, uv, egui::Color32::WHITE);
                }
            });

        if self.show_help {
            egui::Area::new(egui::Id::new("help_overlay"))
                .anchor(egui::Align2::LEFT_TOP, egui::vec2(10.0, 10.0))
                .show(ctx, help::render_help_overlay);
        }
    }
}

fn map_key(key: egui::Key) -> Option<Key> {
    Some(match key {
        egui::Key::Space => Key::Space,
        egui::Key::ArrowLeft => Key::ArrowLeft,
        egui::Key::ArrowRight => Key::ArrowRight,
        egui::Key::G => Key::G,
        egui::Key::B => Key::B,
        egui::Key::R => Key::R,
        egui::Key::J => Key::J,
        egui::Key::L => Key::L,
        egui::Key::E => Key::E,
        egui::Key::F => Key::F,
        egui::Key::Q => Key::Q,
        egui::Key::Escape => Key::Escape,
        _ => return None,
    })
}

fn map_button(button: egui::PointerButton) -> Option<PointerButton> {
    match button {
        egui::PointerButton::Primary => Some(PointerButton::Primary),
        egui::PointerButton::Secondary => Some(PointerButton::Secondary),
        egui::PointerButton::Middle => Some(PointerButton::Middle),
        _ => None,
    }
}

/// egui input to a loop event in surface pixels, relative to `origin`.
fn translate(
    event: &egui::Event,
    origin: egui::Pos2,
    ppp: f32,
    hover: Option<egui::Pos2>,
) -> Option<WindowEvent> {
    let px = |p: egui::Pos2| (((p.x - origin.x) * ppp) as f64, ((p.y - origin.y) * ppp) as f64);
    match event {
        egui::Event::Key { key, pressed: true, .. } => map_key(*key).map(WindowEvent::Key),
        egui::Event::PointerButton { pos, button, pressed, .. } => {
            let button = map_button(*button)?;
            let (x, y) = px(*pos);
            Some(if *pressed {
                WindowEvent::ButtonDown { button, x, y }
            } else {
                WindowEvent::ButtonUp { button, x, y }
            })
        }
        egui::Event::PointerMoved(pos) => {
            let (x, y) = px(*pos);
            Some(WindowEvent::Motion { x, y })
        }
        egui::Event::MouseWheel { delta, .. } => wheel(*delta, hover?, origin, ppp),
        _ => None,
    }
}

/// One event per wheel burst; only the direction matters.
fn wheel(delta: egui::Vec2, pos: egui::Pos2, origin: egui::Pos2, ppp: f32) -> Option<WindowEvent> {
    let ticks = |d: f32| if d == 0.0 { 0 } else { d.signum() as i32 };
    let (x, y) = (ticks(delta.x), ticks(delta.y));
    (y != 0 || x != 0).then_some(WindowEvent::Wheel {
        x,
        y,
        pos_x: ((pos.x - origin.x) * ppp) as f64,
        pos_y: ((pos.y - origin.y) * ppp) as f64,
    })
}
