//! Key bindings - one table for `--help` and the on-screen overlay.

use eframe::egui;

/// Single help entry (key binding + description)
#[derive(Clone, Debug)]
pub struct HelpEntry {
    pub key: &'static str,
    pub desc: &'static str,
}

impl HelpEntry {
    pub const fn new(key: &'static str, desc: &'static str) -> Self {
        Self { key, desc }
    }
}

/// Playback controls, applied to every stream
pub const PLAYBACK_HELP: &[HelpEntry] = &[
    HelpEntry::new("Space", "Play/Pause"),
    HelpEntry::new("Left/Right", "Step 1 frame back/forward"),
    HelpEntry::new("J / L", "Seek -30s / +30s"),
    HelpEntry::new("E", "Seek to end"),
    HelpEntry::new("F", "Reload all streams"),
];

/// View controls, shared by all cells
pub const VIEW_HELP: &[HelpEntry] = &[
    HelpEntry::new("Mouse Wheel", "Zoom about cursor"),
    HelpEntry::new("Left Drag", "Pan"),
    HelpEntry::new("R", "Reset view and rewind"),
    HelpEntry::new("G", "Toggle linear gamma"),
    HelpEntry::new("B", "Toggle blur"),
];

pub const GLOBAL_HELP: &[HelpEntry] = &[
    HelpEntry::new("H", "Toggle this help"),
    HelpEntry::new("Q / ESC", "Quit"),
];

/// Plain-text key table for clap's `after_help`.
pub const KEYS_HELP: &str = "\
Keys (apply to all streams):
  Space        Play/Pause
  Left/Right   Step 1 frame back/forward
  J / L        Seek -30s / +30s
  E            Seek to end
  R            Reset view and rewind
  G            Toggle linear gamma
  B            Toggle blur
  F            Reload all streams
  Wheel        Zoom about cursor
  Left Drag    Pan
  H            Toggle help overlay
  Q / ESC      Quit";

pub fn all_help_sections() -> [(&'static str, &'static [HelpEntry]); 3] {
    [
        ("Playback", PLAYBACK_HELP),
        ("View", VIEW_HELP),
        ("Global", GLOBAL_HELP),
    ]
}

/// Render the help overlay.
pub fn render_help_overlay(ui: &mut egui::Ui) {
    let font_id = egui::FontId::proportional(13.0);
    let text_color = egui::Color32::from_rgba_unmultiplied(255, 255, 255, 200);
    let key_color = egui::Color32::from_rgb(255, 200, 100);

    let sections = all_help_sections();
    let max_key_len = sections
        .iter()
        .flat_map(|(_, entries)| entries.iter())
        .map(|e| e.key.len())
        .max()
        .unwrap_or(10);
    let max_key_width = (max_key_len as f32) * 8.0 + 20.0;

    egui::Frame::NONE
        .fill(egui::Color32::from_rgba_unmultiplied(0, 0, 0, 180))
        .inner_margin(12.0)
        .corner_radius(4.0)
        .show(ui, |ui| {
            for (i, (title, entries)) in sections.iter().enumerate() {
                if i > 0 {
                    ui.add_space(4.0);
                    ui.separator();
                }
                ui.label(
                    egui::RichText::new(*title)
                        .font(font_id.clone())
                        .color(egui::Color32::GRAY),
                );
                for entry in entries.iter() {
                    ui.horizontal(|ui| {
                        ui.add_sized(
                            [max_key_width, 18.0],
                            egui::Label::new(
                                egui::RichText::new(entry.key)
                                    .font(font_id.clone())
                                    .color(key_color),
                            ),
                        );
                        ui.label(
                            egui::RichText::new(entry.desc)
                                .font(font_id.clone())
                                .color(text_color),
                        );
                    });
                }
            }
        });
}
