// Frame sequencing tests: FrameRenderer against the recording backend.

use std::time::Duration;

use approx::assert_relative_eq;
use glam::{Vec3, Vec4};

use mirror_renderer::backend::{PassTarget, RenderBackend, TextureBinding};
use mirror_renderer::camera::Camera;
use mirror_renderer::frame::{FrameContext, FrameRenderer, FrameStats};
use mirror_renderer::math::Transform;
use mirror_renderer::mesh::Mesh;
use mirror_renderer::recording::{Command, RecordingBackend};
use mirror_renderer::scene::{Material, Scene, SceneObject};
use mirror_renderer::settings::{LightSettings, RenderSettings};

struct Fixture {
    backend: RecordingBackend,
    scene: Scene,
    renderer: FrameRenderer,
    light: LightSettings,
    settings: RenderSettings,
}

impl Fixture {
    fn new() -> Self {
        Self {
            backend: RecordingBackend::new(),
            scene: Scene::new(),
            renderer: FrameRenderer::new(),
            light: LightSettings::default(),
            settings: RenderSettings::default(),
        }
    }

    fn add_cube(&mut self, name: &str, position: Vec3) {
        let mesh = self.backend.create_mesh(&Mesh::cube()).unwrap();
        let transform = Transform::new(position, glam::Quat::IDENTITY, Vec3::ONE);
        self.scene
            .add_object(SceneObject::new(name, mesh, transform, Material::default()));
    }

    /// A quad mirror; `rotation` in degrees turns its +Z face.
    fn add_mirror(&mut self, name: &str, position: Vec3, rotation: Vec3, scale: Vec3) {
        let mesh = self.backend.create_mesh(&Mesh::quad()).unwrap();
        let transform = Transform::from_euler_degrees(position, rotation, scale);
        let mirror = SceneObject::new_mirror(
            &mut self.backend,
            name,
            mesh,
            transform,
            Material::default(),
            (512, 512),
        )
        .unwrap();
        self.scene.add_object(mirror);
    }

    fn render(&mut self, camera: &Camera) -> FrameStats {
        let frame = FrameContext {
            camera,
            light: &self.light,
            settings: &self.settings,
            frame_time: Duration::from_millis(16),
        };
        self.renderer.render(&mut self.backend, &self.scene, &frame)
    }

    fn target_of(&self, name: &str) -> PassTarget {
        let mirror = self.scene.get_object(name).unwrap().as_mirror().unwrap();
        PassTarget::Reflection(mirror.reflection_target().id())
    }

    fn main_draw_texture(&self, label: &str) -> TextureBinding {
        let main_start = self
            .backend
            .commands()
            .iter()
            .rposition(|command| matches!(command, Command::BeginPass(pass) if pass.target == PassTarget::Main))
            .unwrap();
        self.backend.commands()[main_start..]
            .iter()
            .find_map(|command| match command {
                Command::Draw { label: drawn, texture, .. } if drawn == label => Some(*texture),
                _ => None,
            })
            .unwrap()
    }
}

fn begin_index(commands: &[Command], target: PassTarget) -> usize {
    commands
        .iter()
        .position(|command| matches!(command, Command::BeginPass(pass) if pass.target == target))
        .unwrap()
}

fn end_index_after(commands: &[Command], start: usize) -> usize {
    start
        + commands[start..]
            .iter()
            .position(|command| matches!(command, Command::EndPass))
            .unwrap()
}

#[test]
fn mirror_passes_precede_the_main_pass_in_registry_order() {
    let mut fixture = Fixture::new();
    fixture.add_cube("cube", Vec3::ZERO);
    fixture.add_mirror("A", Vec3::new(0.0, 0.0, -3.0), Vec3::ZERO, Vec3::new(4.0, 3.0, 1.0));
    fixture.add_mirror("B", Vec3::new(-3.0, 0.0, 0.0), Vec3::new(0.0, 90.0, 0.0), Vec3::new(4.0, 3.0, 1.0));

    let camera = Camera::new(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO);
    let stats = fixture.render(&camera);
    assert_eq!(stats.reflection_passes, 2);

    let target_a = fixture.target_of("A");
    let target_b = fixture.target_of("B");
    let commands = fixture.backend.commands();

    let begin_a = begin_index(commands, target_a);
    let end_a = end_index_after(commands, begin_a);
    let begin_b = begin_index(commands, target_b);
    let end_b = end_index_after(commands, begin_b);
    let begin_main = begin_index(commands, PassTarget::Main);

    assert!(end_a < begin_b, "A's pass must finish before B's begins");
    assert!(end_b < begin_main, "mirror passes must finish before the main pass");

    let first_main_draw = begin_main
        + commands[begin_main..]
            .iter()
            .position(|command| matches!(command, Command::Draw { .. }))
            .unwrap();
    assert!(first_main_draw > end_b);

    // Each mirror's clear comes right before its own pass.
    assert!(matches!(
        commands[begin_a - 1],
        Command::Clear { target, .. } if target == target_a
    ));

    assert_eq!(
        fixture.backend.draws_into(target_a),
        vec![vec!["cube".to_string(), "B".to_string()]]
    );
    assert_eq!(
        fixture.backend.draws_into(target_b),
        vec![vec!["cube".to_string(), "A".to_string()]]
    );
}

#[test]
fn other_mirrors_are_drawn_without_reflections_inside_a_reflection() {
    let mut fixture = Fixture::new();
    fixture.add_mirror("A", Vec3::new(0.0, 0.0, -3.0), Vec3::ZERO, Vec3::ONE);
    fixture.add_mirror("B", Vec3::new(-3.0, 0.0, 0.0), Vec3::new(0.0, 90.0, 0.0), Vec3::ONE);

    fixture.render(&Camera::new(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO));

    let commands = fixture.backend.commands();
    let begin_a = begin_index(commands, fixture.target_of("A"));
    let end_a = end_index_after(commands, begin_a);
    let texture = commands[begin_a..end_a]
        .iter()
        .find_map(|command| match command {
            Command::Draw { label, texture, .. } if label == "B" => Some(*texture),
            _ => None,
        })
        .unwrap();
    assert_eq!(texture, TextureBinding::None);
}

#[test]
fn camera_behind_mirror_skips_its_reflection_pass() {
    let mut fixture = Fixture::new();
    fixture.add_cube("cube", Vec3::ZERO);
    fixture.add_mirror("mirror", Vec3::new(0.0, 0.0, -3.0), Vec3::ZERO, Vec3::new(4.0, 3.0, 1.0));

    let behind = Camera::new(Vec3::new(0.0, 1.0, -8.0), Vec3::ZERO);
    let stats = fixture.render(&behind);

    assert_eq!(stats.reflection_passes, 0);
    assert_eq!(stats.mirrors_behind_camera, 1);
    assert!(fixture.backend.passes_into(fixture.target_of("mirror")).is_empty());
    assert_eq!(
        fixture.backend.draws_into(PassTarget::Main),
        vec![vec!["cube".to_string(), "mirror".to_string()]]
    );

    let PassTarget::Reflection(id) = fixture.target_of("mirror") else {
        unreachable!()
    };
    assert_eq!(
        fixture.main_draw_texture("mirror"),
        TextureBinding::Reflection {
            target: id,
            projection: None
        }
    );
}

#[test]
fn degenerate_mirror_is_drawn_unreflective() {
    let mut fixture = Fixture::new();
    fixture.add_cube("cube", Vec3::ZERO);
    fixture.add_mirror("flat", Vec3::new(0.0, 0.0, -3.0), Vec3::ZERO, Vec3::new(4.0, 3.0, 0.0));

    let stats = fixture.render(&Camera::new(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO));

    assert_eq!(stats.degenerate_mirrors, 1);
    assert_eq!(stats.reflection_passes, 0);
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(fixture.main_draw_texture("flat"), TextureBinding::None);
}

#[test]
fn missing_texture_falls_back_to_untextured() {
    let mut fixture = Fixture::new();
    let texture = fixture
        .backend
        .create_texture("checker", 2, 2, &[255; 16])
        .unwrap();
    let mesh = fixture.backend.create_mesh(&Mesh::cube()).unwrap();
    let material = Material {
        texture: Some(texture),
        ..Material::default()
    };
    fixture
        .scene
        .add_object(SceneObject::new("textured", mesh, Transform::identity(), material));

    let camera = Camera::new(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO);
    fixture.render(&camera);
    assert_eq!(fixture.main_draw_texture("textured"), TextureBinding::Texture(texture));

    fixture.backend.evict_texture(texture);
    for _ in 0..2 {
        fixture.render(&camera);
        assert_eq!(fixture.main_draw_texture("textured"), TextureBinding::None);
    }
}

#[test]
fn main_pass_tracks_aspect_ratio_across_resizes() {
    let mut fixture = Fixture::new();
    fixture.add_cube("cube", Vec3::ZERO);
    fixture.add_mirror("mirror", Vec3::new(0.0, 0.0, -3.0), Vec3::ZERO, Vec3::new(4.0, 3.0, 1.0));

    let mut camera = Camera::new(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO);
    for (width, height) in [(1280, 720), (800, 600), (600, 800), (1920, 1080)] {
        camera.set_viewport_size(width, height);
        fixture.backend.take_commands();
        fixture.render(&camera);

        assert_relative_eq!(camera.aspect_ratio, width as f32 / height as f32);
        let main = fixture.backend.passes_into(PassTarget::Main);
        assert_eq!(main.len(), 1);
        assert!(main[0].view_projection.abs_diff_eq(camera.view_projection(), 1e-6));

        // The reflection keeps the target's own aspect ratio.
        let reflected = fixture
            .scene
            .get_object("mirror")
            .unwrap()
            .as_mirror()
            .unwrap()
            .reflection_camera(&camera)
            .unwrap()
            .unwrap();
        assert_relative_eq!(reflected.aspect_ratio, 1.0);
    }
}

#[test]
fn reflection_targets_are_allocated_once() {
    let mut fixture = Fixture::new();
    fixture.add_cube("cube", Vec3::ZERO);
    fixture.add_mirror("mirror", Vec3::new(0.0, 0.0, -3.0), Vec3::ZERO, Vec3::new(4.0, 3.0, 1.0));
    assert_eq!(fixture.backend.target_allocations(), 1);

    let mut camera = Camera::new(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO);
    for frame in 0..10 {
        camera.set_viewport_size(640 + frame * 10, 480);
        fixture.render(&camera);
    }
    assert_eq!(fixture.backend.target_allocations(), 1);
}

fn cube_corners() -> impl Iterator<Item = Vec4> {
    (0..8).map(|i| {
        Vec4::new(
            if i & 1 == 0 { -0.5 } else { 0.5 },
            if i & 2 == 0 { -0.5 } else { 0.5 },
            if i & 4 == 0 { -0.5 } else { 0.5 },
            1.0,
        )
    })
}

/// Cube at the origin, mirror at x = 3 facing -x.
fn cube_and_side_mirror() -> Fixture {
    let mut fixture = Fixture::new();
    fixture.add_cube("cube", Vec3::ZERO);
    fixture.add_mirror("mirror", Vec3::new(3.0, 0.0, 0.0), Vec3::new(0.0, -90.0, 0.0), Vec3::new(4.0, 4.0, 1.0));
    fixture
}

#[test]
fn camera_past_the_mirror_sees_no_reflection() {
    let mut fixture = cube_and_side_mirror();
    let camera = Camera::new(Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO);

    let stats = fixture.render(&camera);
    assert_eq!(stats.reflection_passes, 0);
    assert_eq!(stats.mirrors_behind_camera, 1);
    assert_eq!(
        fixture.backend.draws_into(PassTarget::Main),
        vec![vec!["cube".to_string(), "mirror".to_string()]]
    );
}

#[test]
fn reflection_shows_the_cube_mirrored_left_to_right() {
    let mut fixture = cube_and_side_mirror();
    let camera = Camera::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::ZERO);

    let stats = fixture.render(&camera);
    assert_eq!(stats.reflection_passes, 1);

    let target = fixture.target_of("mirror");
    assert_eq!(fixture.backend.draws_into(target), vec![vec!["cube".to_string()]]);

    let reflected = fixture
        .scene
        .get_object("mirror")
        .unwrap()
        .as_mirror()
        .unwrap()
        .reflection_camera(&camera)
        .unwrap()
        .unwrap();
    assert!(reflected.position.abs_diff_eq(Vec3::new(16.0, 0.0, 0.0), 1e-4));

    let pass = fixture.backend.passes_into(target)[0];
    assert!(pass.mirrored);
    assert!(pass.view_projection.abs_diff_eq(reflected.view_projection(), 1e-6));

    let mut direct = Camera::new(reflected.position, reflected.target);
    direct.aspect_ratio = reflected.aspect_ratio;

    for corner in cube_corners() {
        let via_mirror = pass.view_projection * corner;
        let straight = direct.view_projection() * corner;
        assert!(via_mirror.w > 0.0);

        let mirror_ndc = via_mirror.truncate() / via_mirror.w;
        let direct_ndc = straight.truncate() / straight.w;
        assert_relative_eq!(mirror_ndc.x, -direct_ndc.x, epsilon = 1e-4);
        assert_relative_eq!(mirror_ndc.y, direct_ndc.y, epsilon = 1e-4);

        assert!(mirror_ndc.x.abs() <= 1.0 && mirror_ndc.y.abs() <= 1.0);
        assert!((0.0..=1.0).contains(&mirror_ndc.z), "depth {}", mirror_ndc.z);
    }
}

#[test]
fn each_mirror_samples_its_own_reflection_through_the_reflected_projection() {
    let mut fixture = Fixture::new();
    fixture.add_cube("cube", Vec3::ZERO);
    fixture.add_mirror("A", Vec3::new(0.0, 0.0, -3.0), Vec3::ZERO, Vec3::new(4.0, 3.0, 1.0));
    fixture.add_mirror("B", Vec3::new(-3.0, 0.0, 0.0), Vec3::new(0.0, 90.0, 0.0), Vec3::new(4.0, 3.0, 1.0));

    let camera = Camera::new(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO);
    assert_eq!(fixture.render(&camera).reflection_passes, 2);

    for name in ["A", "B"] {
        let target = fixture.target_of(name);
        let PassTarget::Reflection(target_id) = target else {
            panic!("{name} has no reflection target");
        };
        let reflection_pass = fixture
            .backend
            .commands()
            .iter()
            .find_map(|command| match command {
                Command::BeginPass(pass) if pass.target == target => Some(*pass),
                _ => None,
            })
            .unwrap();
        assert!(reflection_pass.mirrored);

        match fixture.main_draw_texture(name) {
            TextureBinding::Reflection {
                target: bound,
                projection: Some(projection),
            } => {
                assert_eq!(bound, target_id, "{name} must sample its own target");
                assert_eq!(projection, reflection_pass.view_projection);
            }
            other => panic!("{name} drawn with {other:?}"),
        }
    }
    assert_ne!(fixture.target_of("A"), fixture.target_of("B"));
}
