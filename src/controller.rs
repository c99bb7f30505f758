// First-person camera controller

use std::time::Duration;

use glam::Vec3;
use winit::event::{ElementState, KeyEvent, MouseButton};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::camera::Camera;

/// Pitch stays this far away from straight up/down so `look_at` keeps a
/// valid up vector.
const MAX_PITCH: f32 = 89.0_f32 * (std::f32::consts::PI / 180.0);
const BOOST: f32 = 4.0;

#[derive(Debug, Default, Clone, Copy)]
struct KeyboardState {
    w: bool,
    a: bool,
    s: bool,
    d: bool,
    q: bool,
    e: bool,
    shift: bool,
}

/// WASD + mouse-look controller. Q/E move down/up, Shift speeds up, holding
/// the right mouse button rotates the view.
#[derive(Debug)]
pub struct FirstPersonController {
    pub speed: f32,
    /// Radians per pixel of mouse motion.
    pub sensitivity: f32,
    keys: KeyboardState,
    looking: bool,
    mouse_delta: (f64, f64),
    yaw: f32,
    pitch: f32,
}

impl FirstPersonController {
    /// Start from the orientation `camera` currently has.
    pub fn new(camera: &Camera, speed: f32) -> Self {
        let forward = camera.forward();
        Self {
            speed,
            sensitivity: 0.003,
            keys: KeyboardState::default(),
            looking: false,
            mouse_delta: (0.0, 0.0),
            yaw: forward.z.atan2(forward.x),
            pitch: forward.y.clamp(-1.0, 1.0).asin().clamp(-MAX_PITCH, MAX_PITCH),
        }
    }

    /// Returns whether the key is one the controller uses.
    pub fn on_key_event(&mut self, event: &KeyEvent) -> bool {
        let PhysicalKey::Code(keycode) = event.physical_key else {
            return false;
        };
        let is_pressed = event.state == ElementState::Pressed;
        self.on_key(keycode, is_pressed)
    }

    pub fn on_key(&mut self, keycode: KeyCode, is_pressed: bool) -> bool {
        match keycode {
            KeyCode::KeyW => self.keys.w = is_pressed,
            KeyCode::KeyA => self.keys.a = is_pressed,
            KeyCode::KeyS => self.keys.s = is_pressed,
            KeyCode::KeyD => self.keys.d = is_pressed,
            KeyCode::KeyQ => self.keys.q = is_pressed,
            KeyCode::KeyE => self.keys.e = is_pressed,
            KeyCode::ShiftLeft | KeyCode::ShiftRight => self.keys.shift = is_pressed,
            _ => return false,
        }
        true
    }

    pub fn on_mouse_button(&mut self, button: MouseButton, state: ElementState) -> bool {
        if button != MouseButton::Right {
            return false;
        }
        self.looking = state == ElementState::Pressed;
        true
    }

    /// Raw mouse motion in pixels. Ignored unless the look button is held.
    pub fn on_mouse_motion(&mut self, dx: f64, dy: f64) {
        if self.looking {
            self.mouse_delta.0 += dx;
            self.mouse_delta.1 += dy;
        }
    }

    /// Apply accumulated input to `camera` for a frame of length `dt`.
    pub fn update(&mut self, camera: &mut Camera, dt: Duration) {
        let (dx, dy) = std::mem::take(&mut self.mouse_delta);
        self.yaw += dx as f32 * self.sensitivity;
        self.pitch = (self.pitch - dy as f32 * self.sensitivity).clamp(-MAX_PITCH, MAX_PITCH);

        let forward = Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        );
        let right = forward.cross(Vec3::Y).normalize_or_zero();

        let mut movement = Vec3::ZERO;
        if self.keys.w {
            movement += forward;
        }
        if self.keys.s {
            movement -= forward;
        }
        if self.keys.d {
            movement += right;
        }
        if self.keys.a {
            movement -= right;
        }
        if self.keys.e {
            movement += Vec3::Y;
        }
        if self.keys.q {
            movement -= Vec3::Y;
        }

        let speed = if self.keys.shift { self.speed * BOOST } else { self.speed };
        camera.position += movement.normalize_or_zero() * speed * dt.as_secs_f32();
        camera.target = camera.position + forward;
        camera.up = Vec3::Y;
    }
}
