// Perspective camera for the mirror renderer

use glam::{Mat4, Vec3, Vec4};

use crate::math::Plane;

/// Film height in millimeters used to turn a focal length into a field of view.
const FILM_HEIGHT_MM: f32 = 24.0;

/// Perspective camera looking from `position` towards `target`.
///
/// Cameras derived by [`reflect_camera`](crate::reflection::reflect_camera)
/// are *mirrored*: their view matrix flips the X axis so the rendered image is
/// a true mirror image, and they carry the mirror plane as an oblique near
/// clip plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    /// Width over height of the render target.
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    mirrored: bool,
    clip_plane: Option<Plane>,
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            fov_y: 45.0,
            aspect_ratio: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
            mirrored: false,
            clip_plane: None,
        }
    }

    /// Camera as produced by the reflection solver.
    pub(crate) fn mirrored_from(base: &Camera, position: Vec3, target: Vec3, up: Vec3, aspect_ratio: f32, clip_plane: Plane) -> Self {
        Self {
            position,
            target,
            up,
            fov_y: base.fov_y,
            aspect_ratio,
            near: base.near,
            far: base.far,
            mirrored: !base.mirrored,
            clip_plane: Some(clip_plane),
        }
    }

    /// Unit look direction. Falls back to -Z when target and position coincide.
    pub fn forward(&self) -> Vec3 {
        let forward = (self.target - self.position).normalize_or_zero();
        if forward == Vec3::ZERO {
            Vec3::NEG_Z
        } else {
            forward
        }
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    pub fn clip_plane(&self) -> Option<&Plane> {
        self.clip_plane.as_ref()
    }

    pub fn set_depth_range(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
    }

    /// Set the vertical field of view from a focal length in millimeters.
    pub fn set_focal_length(&mut self, focal_length_mm: f32) {
        if focal_length_mm <= 0.0 {
            return;
        }
        self.fov_y = (2.0 * (0.5 * FILM_HEIGHT_MM / focal_length_mm).atan()).to_degrees();
    }

    /// Track the size of the target this camera renders into.
    /// Zero-sized (minimized) targets leave the aspect ratio untouched.
    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect_ratio = width as f32 / height as f32;
    }

    /// The up vector the view is built with. When `up` is parallel to the
    /// look direction (or zero) another world axis stands in for it.
    pub fn view_up(&self) -> Vec3 {
        let forward = self.forward();
        if forward.cross(self.up).length_squared() > 1e-8 {
            return self.up;
        }
        if forward.z.abs() < 0.9 {
            Vec3::NEG_Z
        } else {
            Vec3::Y
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        let view = Mat4::look_at_rh(self.position, self.position + self.forward(), self.view_up());
        if self.mirrored {
            Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0)) * view
        } else {
            view
        }
    }

    /// Perspective projection with a 0..1 depth range. With a clip plane the
    /// near plane is replaced by it.
    pub fn projection_matrix(&self) -> Mat4 {
        let projection =
            Mat4::perspective_rh(self.fov_y.to_radians(), self.aspect_ratio, self.near, self.far);
        match self.clip_plane {
            Some(plane) => oblique_near_plane(projection, self.view_matrix(), &plane),
            None => projection,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Replace the near plane of `projection` with `plane` (world space), keeping
/// the far plane as tight as possible around the original frustum.
fn oblique_near_plane(projection: Mat4, view: Mat4, plane: &Plane) -> Mat4 {
    let clip_plane = view.inverse().transpose() * plane.to_vec4();
    let corner = projection.inverse()
        * Vec4::new(clip_plane.x.signum(), clip_plane.y.signum(), 1.0, 1.0);
    let denominator = clip_plane.dot(corner);
    if denominator.abs() <= f32::EPSILON || !denominator.is_finite() {
        return projection;
    }

    let depth_row = clip_plane / denominator;
    let mut columns = projection.to_cols_array_2d();
    for (column, value) in columns.iter_mut().zip(depth_row.to_array()) {
        column[2] = value;
    }
    Mat4::from_cols_array_2d(&columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn resize_sets_aspect_ratio() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        for (width, height) in [(1920, 1080), (800, 600), (1080, 1920), (1920, 1080), (333, 777)] {
            camera.set_viewport_size(width, height);
            assert_relative_eq!(camera.aspect_ratio, width as f32 / height as f32, epsilon = f32::EPSILON);
        }
    }

    #[test]
    fn zero_sized_resize_is_ignored() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        camera.set_viewport_size(1280, 720);
        camera.set_viewport_size(0, 720);
        camera.set_viewport_size(1280, 0);
        assert_relative_eq!(camera.aspect_ratio, 1280.0 / 720.0);
    }

    #[test]
    fn focal_length_maps_to_field_of_view() {
        let mut camera = Camera::new(Vec3::ZERO, Vec3::NEG_Z);
        camera.set_focal_length(12.0);
        assert_relative_eq!(camera.fov_y, 90.0, epsilon = 1e-4);
        camera.set_focal_length(30.0);
        assert_relative_eq!(camera.fov_y, 43.6028, epsilon = 1e-3);
    }

    #[test]
    fn target_projects_to_screen_center() {
        let camera = Camera::new(Vec3::new(6.0, 3.0, 3.0), Vec3::ZERO);
        let clip = camera.view_projection() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
        let depth = clip.z / clip.w;
        assert!((0.0..=1.0).contains(&depth));
    }

    #[test]
    fn looking_straight_down_gives_a_finite_view() {
        let camera = Camera::new(Vec3::new(0.0, 5.0, 0.0), Vec3::ZERO);
        assert_eq!(camera.view_up(), Vec3::NEG_Z);
        assert!(camera.view_matrix().is_finite());
        assert!(camera.view_projection().is_finite());

        let clip = camera.view_projection() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);

        // -Z is screen-up for the fallback.
        let ahead = camera.view_projection() * Vec4::new(0.0, 0.0, -1.0, 1.0);
        assert!(ahead.y / ahead.w > 0.0);
    }

    #[test]
    fn up_along_z_falls_back_to_y() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        camera.up = Vec3::Z;
        assert_eq!(camera.view_up(), Vec3::Y);
        assert!(camera.view_projection().is_finite());
    }

    #[test]
    fn forward_falls_back_when_target_equals_position() {
        let camera = Camera::new(Vec3::ONE, Vec3::ONE);
        assert_eq!(camera.forward(), Vec3::NEG_Z);
    }
}
