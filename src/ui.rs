//! Settings panels: render state, light, and per-object properties, shown
//! in a single "Settings" window. Also paints the overlay text the frame
//! renderer emits.

use glam::Vec3;

use crate::renderer::OverlayText;
use crate::scene::Scene;
use crate::settings::{CullMode, FillMode, LightSettings, RenderSettings};

const WINDOW_POSITION: [f32; 2] = [0.0, 30.0];
const WINDOW_SIZE: [f32; 2] = [375.0, 275.0];
const OVERLAY_FONT_SIZE: f32 = 14.0;

/// Panel state that persists across frames.
#[derive(Debug, Default)]
pub struct SettingsWindow {
    selected_object: usize,
}

impl SettingsWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show the window. Returns whether a rasterizer-affecting setting changed.
    pub fn show(
        &mut self,
        ctx: &egui::Context,
        settings: &mut RenderSettings,
        light: &mut LightSettings,
        scene: &mut Scene,
    ) -> bool {
        let response = egui::Window::new("Settings")
            .default_pos(WINDOW_POSITION)
            .default_size(WINDOW_SIZE)
            .show(ctx, |ui| {
                let mut rasterizer_changed = false;
                egui::CollapsingHeader::new("Render")
                    .default_open(true)
                    .show(ui, |ui| rasterizer_changed = render_settings_panel(ui, settings));
                egui::CollapsingHeader::new("Light").show(ui, |ui| {
                    light_settings_panel(ui, light);
                });
                egui::CollapsingHeader::new("Objects").show(ui, |ui| {
                    object_panel(ui, scene, &mut self.selected_object);
                });
                rasterizer_changed
            });
        response.and_then(|response| response.inner).unwrap_or(false)
    }
}

/// Cull and fill dropdowns plus the FPS toggle. Returns whether the
/// rasterizer state changed.
pub fn render_settings_panel(ui: &mut egui::Ui, settings: &mut RenderSettings) -> bool {
    let before = settings.rasterizer_state();

    egui::ComboBox::from_label("Cull mode")
        .selected_text(settings.cull_mode.label())
        .show_ui(ui, |ui| {
            for mode in CullMode::ALL {
                ui.selectable_value(&mut settings.cull_mode, mode, mode.label());
            }
        });
    egui::ComboBox::from_label("Fill mode")
        .selected_text(settings.fill_mode.label())
        .show_ui(ui, |ui| {
            for mode in FillMode::ALL {
                ui.selectable_value(&mut settings.fill_mode, mode, mode.label());
            }
        });
    ui.checkbox(&mut settings.show_fps, "Show FPS");

    settings.rasterizer_state() != before
}

pub fn light_settings_panel(ui: &mut egui::Ui, light: &mut LightSettings) -> bool {
    let mut changed = false;
    changed |= color_row(ui, "Ambient", &mut light.ambient);
    changed |= color_row(ui, "Diffuse", &mut light.diffuse);
    changed |= color_row(ui, "Specular", &mut light.specular);
    changed |= vec3_row(ui, "Direction", &mut light.direction, 0.01);
    changed
}

/// Transform and material of one selected object.
pub fn object_panel(ui: &mut egui::Ui, scene: &mut Scene, selected: &mut usize) -> bool {
    if scene.is_empty() {
        ui.label("No objects");
        return false;
    }
    *selected = (*selected).min(scene.len() - 1);

    let selected_name = scene.objects()[*selected].name.clone();
    egui::ComboBox::from_label("Object")
        .selected_text(selected_name)
        .show_ui(ui, |ui| {
            for (index, object) in scene.iter().enumerate() {
                ui.selectable_value(selected, index, object.name.as_str());
            }
        });

    let Some(object) = scene.objects_mut().get_mut(*selected) else {
        return false;
    };

    let mut changed = false;
    changed |= vec3_row(ui, "Position", &mut object.transform.position, 0.05);
    changed |= vec3_row(ui, "Scale", &mut object.transform.scale, 0.05);
    ui.separator();
    changed |= color_row(ui, "Ambient", &mut object.material.ambient);
    changed |= color_row(ui, "Diffuse", &mut object.material.diffuse);
    changed |= color_row(ui, "Specular", &mut object.material.specular);
    changed |= ui
        .add(egui::Slider::new(&mut object.material.shininess, 1.0..=256.0).text("Shininess"))
        .changed();

    if let Some(mirror) = object.as_mirror() {
        let (width, height) = mirror.reflection_target().size();
        ui.separator();
        ui.label(format!("Mirror, reflection target {width}x{height}"));
    }
    changed
}

/// Paint overlay text on top of every window. Positions are in pixels.
pub fn paint_overlay_text(ctx: &egui::Context, texts: &[OverlayText]) {
    if texts.is_empty() {
        return;
    }
    let painter = ctx.layer_painter(egui::LayerId::new(
        egui::Order::Foreground,
        egui::Id::new("overlay_text"),
    ));
    let pixels_per_point = ctx.pixels_per_point();
    for overlay in texts {
        painter.text(
            egui::pos2(
                overlay.position[0] / pixels_per_point,
                overlay.position[1] / pixels_per_point,
            ),
            egui::Align2::LEFT_TOP,
            &overlay.text,
            egui::FontId::monospace(OVERLAY_FONT_SIZE),
            egui::Color32::WHITE,
        );
    }
}

fn color_row(ui: &mut egui::Ui, label: &str, value: &mut Vec3) -> bool {
    let mut rgb = value.to_array();
    let changed = ui
        .horizontal(|ui| {
            ui.label(label);
            ui.color_edit_button_rgb(&mut rgb).changed()
        })
        .inner;
    if changed {
        *value = Vec3::from_array(rgb);
    }
    changed
}

fn vec3_row(ui: &mut egui::Ui, label: &str, value: &mut Vec3, speed: f64) -> bool {
    ui.horizontal(|ui| {
        ui.label(label);
        let mut changed = false;
        changed |= ui.add(egui::DragValue::new(&mut value.x).speed(speed).prefix("x: ")).changed();
        changed |= ui.add(egui::DragValue::new(&mut value.y).speed(speed).prefix("y: ")).changed();
        changed |= ui.add(egui::DragValue::new(&mut value.z).speed(speed).prefix("z: ")).changed();
        changed
    })
    .inner
}
