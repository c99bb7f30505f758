//! Per-frame orchestration: mirror reflection passes, then the main pass.
//!
//! ```text
//! render(backend, scene, frame)
//!   │
//!   ├─ rasterizer rebuild ─── only when cull/fill changed
//!   ├─ clear main target
//!   ├─ for each mirror (registry order)
//!   │     world plane ── degenerate? draw unreflective
//!   │     reflected camera ── behind the mirror? skip
//!   │     clear + render every other object into the mirror's target
//!   ├─ main pass ─── every object, mirrors sample their target
//!   └─ FPS overlay
//! ```

use std::collections::HashSet;
use std::time::Duration;

use glam::Mat4;

use crate::backend::{
    ClearValues, DrawCall, MaterialColors, PassDesc, PassTarget, RenderBackend, TextureBinding,
    TextureHandle,
};
use crate::camera::Camera;
use crate::frame_rate::FrameRate;
use crate::scene::{MirrorView, Scene, SceneObject};
use crate::settings::{LightSettings, RasterizerState, RenderSettings};

/// Where the FPS text is drawn, in pixels from the top-left corner.
pub const FPS_TEXT_POSITION: [f32; 2] = [10.0, 10.0];

/// Everything a frame reads besides the scene. Immutable for the frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub camera: &'a Camera,
    pub light: &'a LightSettings,
    pub settings: &'a RenderSettings,
    /// Duration of the previous frame, fed to the FPS counter.
    pub frame_time: Duration,
}

/// Outcome of one frame, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameStats {
    pub rasterizer_rebuilt: bool,
    pub reflection_passes: usize,
    pub mirrors_behind_camera: usize,
    pub degenerate_mirrors: usize,
    pub draw_calls: usize,
}

/// What a mirror shows in the main pass this frame.
#[derive(Debug, Clone, Copy)]
enum MirrorImage {
    /// Rendered this frame through this view-projection.
    Reflected(Mat4),
    /// Pass skipped; the target holds last frame's (or cleared) contents.
    Stale,
    /// No usable plane; drawn with its material only.
    Unreflective,
}

pub struct FrameRenderer {
    clear: ClearValues,
    applied_rasterizer: Option<RasterizerState>,
    frame_rate: FrameRate,
    reported_textures: HashSet<TextureHandle>,
}

impl FrameRenderer {
    pub fn new() -> Self {
        Self {
            clear: ClearValues::default(),
            applied_rasterizer: None,
            frame_rate: FrameRate::new(),
            reported_textures: HashSet::new(),
        }
    }

    /// Force a rasterizer rebuild on the next frame, e.g. after the backend
    /// lost its pipelines.
    pub fn invalidate_rasterizer(&mut self) {
        self.applied_rasterizer = None;
    }

    /// Render one frame of `scene` as seen by `frame.camera`.
    pub fn render<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        scene: &Scene,
        frame: &FrameContext<'_>,
    ) -> FrameStats {
        let mut stats = FrameStats::default();
        self.frame_rate.record(frame.frame_time);

        let rasterizer = frame.settings.rasterizer_state();
        if self.applied_rasterizer != Some(rasterizer) {
            log::debug!(
                "Rebuilding rasterizer state: cull {:?}, fill {:?}",
                rasterizer.cull_mode,
                rasterizer.fill_mode
            );
            backend.rebuild_rasterizer(rasterizer);
            self.applied_rasterizer = Some(rasterizer);
            stats.rasterizer_rebuilt = true;
        }

        backend.clear(PassTarget::Main, self.clear);

        let mut images: Vec<Option<MirrorImage>> = vec![None; scene.len()];
        for (index, mirror) in scene.mirrors() {
            let image = self.render_reflection(backend, scene, index, mirror, frame, &mut stats);
            images[index] = Some(image);
        }

        backend.begin_pass(&PassDesc {
            target: PassTarget::Main,
            view_projection: frame.camera.view_projection(),
            camera_position: frame.camera.position,
            light: *frame.light,
            mirrored: frame.camera.is_mirrored(),
        });
        for (object, image) in scene.iter().zip(&images) {
            let texture = match (object.as_mirror(), image) {
                (Some(mirror), Some(MirrorImage::Reflected(projection))) => TextureBinding::Reflection {
                    target: mirror.reflection_target().id(),
                    projection: Some(*projection),
                },
                (Some(mirror), Some(MirrorImage::Stale)) => TextureBinding::Reflection {
                    target: mirror.reflection_target().id(),
                    projection: None,
                },
                (Some(_), _) => TextureBinding::None,
                (None, _) => self.material_texture(backend, object),
            };
            backend.draw(&draw_call(object, texture));
            stats.draw_calls += 1;
        }
        backend.end_pass();

        if frame.settings.show_fps {
            backend.draw_text(&self.frame_rate.message(), FPS_TEXT_POSITION);
        }

        stats
    }

    fn render_reflection<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        scene: &Scene,
        mirror_index: usize,
        mirror: MirrorView<'_>,
        frame: &FrameContext<'_>,
        stats: &mut FrameStats,
    ) -> MirrorImage {
        let camera = match mirror.reflection_camera(frame.camera) {
            Ok(Some(camera)) => camera,
            Ok(None) => {
                log::trace!("Camera is behind mirror {:?}, skipping its reflection", mirror.name());
                stats.mirrors_behind_camera += 1;
                return MirrorImage::Stale;
            }
            Err(err) => {
                log::warn!("Skipping reflection of mirror {:?}: {}", mirror.name(), err);
                stats.degenerate_mirrors += 1;
                return MirrorImage::Unreflective;
            }
        };

        let target = PassTarget::Reflection(mirror.reflection_target().id());
        let view_projection = camera.view_projection();

        backend.clear(target, self.clear);
        backend.begin_pass(&PassDesc {
            target,
            view_projection,
            camera_position: camera.position,
            light: *frame.light,
            mirrored: camera.is_mirrored(),
        });
        for (index, object) in scene.iter().enumerate() {
            if index == mirror_index {
                continue;
            }
            // Mirrors do not reflect other mirrors.
            let texture = if object.is_mirror() {
                TextureBinding::None
            } else {
                self.material_texture(backend, object)
            };
            backend.draw(&draw_call(object, texture));
            stats.draw_calls += 1;
        }
        backend.end_pass();
        stats.reflection_passes += 1;

        MirrorImage::Reflected(view_projection)
    }

    /// The object's own texture, or none when it is missing from the cache.
    fn material_texture<B: RenderBackend>(&mut self, backend: &B, object: &SceneObject) -> TextureBinding {
        match object.material.texture {
            Some(texture) if backend.is_texture_resident(texture) => TextureBinding::Texture(texture),
            Some(texture) => {
                if self.reported_textures.insert(texture) {
                    log::warn!(
                        "Object {:?} references a texture that is not loaded, drawing it untextured",
                        object.name
                    );
                }
                TextureBinding::None
            }
            None => TextureBinding::None,
        }
    }
}

impl Default for FrameRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn draw_call(object: &SceneObject, texture: TextureBinding) -> DrawCall<'_> {
    let material = &object.material;
    DrawCall {
        label: &object.name,
        mesh: object.mesh(),
        model: object.transform.matrix(),
        normal_matrix: object.transform.normal_matrix(),
        material: MaterialColors {
            ambient: material.ambient,
            diffuse: material.diffuse,
            specular: material.specular,
            shininess: material.shininess,
        },
        texture,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Transform;
    use crate::mesh::Mesh;
    use crate::recording::{Command, RecordingBackend};
    use crate::scene::Material;
    use crate::settings::CullMode;

    fn scene_with_mirror(backend: &mut RecordingBackend) -> Scene {
        let cube = backend.create_mesh(&Mesh::cube()).unwrap();
        let quad = backend.create_mesh(&Mesh::quad()).unwrap();
        let mut scene = Scene::new();
        scene.add_object(SceneObject::new("cube", cube, Transform::identity(), Material::default()));
        scene.add_object(
            SceneObject::new_mirror(
                backend,
                "mirror",
                quad,
                Transform::new(glam::Vec3::new(0.0, 0.0, -3.0), glam::Quat::IDENTITY, glam::Vec3::ONE),
                Material::default(),
                (256, 256),
            )
            .unwrap(),
        );
        scene
    }

    fn frame<'a>(camera: &'a Camera, light: &'a LightSettings, settings: &'a RenderSettings) -> FrameContext<'a> {
        FrameContext {
            camera,
            light,
            settings,
            frame_time: Duration::from_millis(16),
        }
    }

    #[test]
    fn rasterizer_is_rebuilt_only_on_change() {
        let mut backend = RecordingBackend::new();
        let scene = scene_with_mirror(&mut backend);
        let camera = Camera::new(glam::Vec3::new(0.0, 1.0, 5.0), glam::Vec3::ZERO);
        let light = LightSettings::default();
        let mut settings = RenderSettings::default();
        let mut renderer = FrameRenderer::new();

        assert!(renderer.render(&mut backend, &scene, &frame(&camera, &light, &settings)).rasterizer_rebuilt);
        let initial_rebuilds = backend.rasterizer_rebuilds();

        for _ in 0..3 {
            let stats = renderer.render(&mut backend, &scene, &frame(&camera, &light, &settings));
            assert!(!stats.rasterizer_rebuilt);
        }
        assert_eq!(backend.rasterizer_rebuilds(), initial_rebuilds);
        backend.take_commands();

        settings.cull_mode = CullMode::Front;
        assert!(renderer.render(&mut backend, &scene, &frame(&camera, &light, &settings)).rasterizer_rebuilt);
        assert!(!renderer.render(&mut backend, &scene, &frame(&camera, &light, &settings)).rasterizer_rebuilt);
        assert_eq!(backend.rasterizer_rebuilds(), 1);

        let commands = backend.commands();
        let rebuild = commands
            .iter()
            .position(|command| matches!(command, Command::RebuildRasterizer(_)))
            .unwrap();
        let first_draw = commands
            .iter()
            .position(|command| matches!(command, Command::Draw { .. }))
            .unwrap();
        assert!(rebuild < first_draw);
    }

    #[test]
    fn invalidation_forces_one_rebuild() {
        let mut backend = RecordingBackend::new();
        let scene = scene_with_mirror(&mut backend);
        let camera = Camera::new(glam::Vec3::new(0.0, 1.0, 5.0), glam::Vec3::ZERO);
        let light = LightSettings::default();
        let settings = RenderSettings::default();
        let mut renderer = FrameRenderer::new();

        renderer.render(&mut backend, &scene, &frame(&camera, &light, &settings));
        renderer.invalidate_rasterizer();
        renderer.render(&mut backend, &scene, &frame(&camera, &light, &settings));
        renderer.render(&mut backend, &scene, &frame(&camera, &light, &settings));
        assert_eq!(backend.rasterizer_rebuilds(), 2);
    }

    #[test]
    fn mirror_is_excluded_from_its_own_reflection() {
        let mut backend = RecordingBackend::new();
        let scene = scene_with_mirror(&mut backend);
        let camera = Camera::new(glam::Vec3::new(0.0, 1.0, 5.0), glam::Vec3::ZERO);
        let light = LightSettings::default();
        let settings = RenderSettings::default();

        let stats = FrameRenderer::new().render(&mut backend, &scene, &frame(&camera, &light, &settings));
        assert_eq!(stats.reflection_passes, 1);
        assert_eq!(stats.draw_calls, 3);

        let target = scene.mirrors().next().unwrap().1.reflection_target().id();
        assert_eq!(backend.draws_into(PassTarget::Reflection(target)), vec![vec!["cube".to_string()]]);
        assert_eq!(
            backend.draws_into(PassTarget::Main),
            vec![vec!["cube".to_string(), "mirror".to_string()]]
        );
    }

    #[test]
    fn fps_text_follows_the_setting() {
        let mut backend = RecordingBackend::new();
        let scene = scene_with_mirror(&mut backend);
        let camera = Camera::new(glam::Vec3::new(0.0, 1.0, 5.0), glam::Vec3::ZERO);
        let light = LightSettings::default();
        let mut settings = RenderSettings::default();
        let mut renderer = FrameRenderer::new();

        renderer.render(&mut backend, &scene, &frame(&camera, &light, &settings));
        assert!(matches!(
            backend.commands().last(),
            Some(Command::DrawText { position, .. }) if *position == FPS_TEXT_POSITION
        ));

        settings.show_fps = false;
        backend.take_commands();
        renderer.render(&mut backend, &scene, &frame(&camera, &light, &settings));
        assert!(!backend
            .commands()
            .iter()
            .any(|command| matches!(command, Command::DrawText { .. })));
    }
}
