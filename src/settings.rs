// Render and light settings edited through the settings panels

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Which triangle faces the rasterizer discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CullMode {
    Front,
    Back,
    None,
}

impl CullMode {
    pub const ALL: [CullMode; 3] = [CullMode::Front, CullMode::Back, CullMode::None];

    pub fn label(self) -> &'static str {
        match self {
            CullMode::Front => "Front",
            CullMode::Back => "Back",
            CullMode::None => "None",
        }
    }
}

/// How triangles are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    Solid,
    Wireframe,
}

impl FillMode {
    pub const ALL: [FillMode; 2] = [FillMode::Solid, FillMode::Wireframe];

    pub fn label(self) -> &'static str {
        match self {
            FillMode::Solid => "Solid",
            FillMode::Wireframe => "Wire-frame",
        }
    }
}

/// The rasterizer configuration derived from [`RenderSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerState {
    pub cull_mode: CullMode,
    pub fill_mode: FillMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub cull_mode: CullMode,
    pub fill_mode: FillMode,
    pub show_fps: bool,
}

impl RenderSettings {
    pub fn rasterizer_state(&self) -> RasterizerState {
        RasterizerState {
            cull_mode: self.cull_mode,
            fill_mode: self.fill_mode,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            fill_mode: FillMode::Solid,
            show_fps: true,
        }
    }
}

/// The scene's single directional light. `direction` is the direction the
/// light travels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub direction: Vec3,
}

impl LightSettings {
    /// Unit travel direction, or straight down when the configured one is zero.
    pub fn unit_direction(&self) -> Vec3 {
        let direction = self.direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            Vec3::NEG_Y
        } else {
            direction
        }
    }
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            ambient: Vec3::new(0.2, 0.3, 0.5),
            diffuse: Vec3::new(0.2, 0.3, 0.5),
            specular: Vec3::new(0.2, 0.3, 0.5),
            direction: Vec3::new(0.2, -0.3, 0.5),
        }
    }
}
