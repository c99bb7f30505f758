//! Reflected virtual camera for planar mirrors.
//!
//! The reflected camera sits at the mirror image of the real camera and looks
//! along the mirrored view direction. Rendering from it, with the X flip and
//! oblique near plane carried by the returned [`Camera`], yields exactly the
//! image the mirror should show.

use crate::camera::Camera;
use crate::math::Plane;

/// Derive the camera that sees what `plane` reflects towards `real`.
///
/// Field of view and depth range are inherited; the aspect ratio is the
/// reflection target's. Returns `None` when the real camera is behind the
/// plane or exactly on it, where the mirror shows nothing.
pub fn reflect_camera(real: &Camera, plane: &Plane, target_aspect: f32) -> Option<Camera> {
    if plane.signed_distance(real.position) <= 0.0 {
        return None;
    }

    let position = plane.reflect_point(real.position);
    let look_ahead = plane.reflect_point(real.position + real.forward());
    let up = plane.reflect_direction(real.view_up());

    Some(Camera::mirrored_from(
        real,
        position,
        look_ahead,
        up,
        target_aspect,
        *plane,
    ))
}
