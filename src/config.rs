//! Startup parameters: window, camera pose, light, render settings and the
//! initial object set, loaded from a TOML scene file.

use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::settings::{LightSettings, RenderSettings};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub light: LightSettings,
    pub render: RenderSettings,
    pub objects: Vec<ObjectConfig>,
}

impl SceneConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded scene {} ({} objects)", path.display(), config.objects.len());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            camera: CameraConfig::default(),
            light: LightSettings::default(),
            render: RenderSettings::default(),
            objects: default_objects(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Mirror renderer".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: Vec3,
    pub target: Vec3,
    /// Focal length in millimeters (24 mm film height).
    pub focal_length: f32,
    pub near: f32,
    pub far: f32,
    /// Movement speed of the first-person controller, units per second.
    pub speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(6.0, 3.0, 3.0),
            target: Vec3::ZERO,
            focal_length: 30.0,
            near: 0.1,
            far: 1000.0,
            speed: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Cube,
    Sphere,
    Quad,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    /// Image file, relative to the working directory.
    pub texture: Option<PathBuf>,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            ambient: Vec3::splat(1.0),
            diffuse: Vec3::splat(1.0),
            specular: Vec3::splat(1.0),
            shininess: 32.0,
            texture: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Reflection target size in pixels, independent of the window size.
    pub resolution: [u32; 2],
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self { resolution: [1024, 1024] }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub name: String,
    pub shape: Shape,
    #[serde(default)]
    pub position: Vec3,
    /// XYZ euler angles in degrees.
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
    #[serde(default)]
    pub material: MaterialConfig,
    /// Present for mirrors. Mirrors must use the `quad` shape.
    #[serde(default)]
    pub mirror: Option<MirrorConfig>,
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

fn default_objects() -> Vec<ObjectConfig> {
    vec![
        ObjectConfig {
            name: "sphere".to_string(),
            shape: Shape::Sphere,
            position: Vec3::new(0.0, 0.0, 0.0),
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            material: MaterialConfig {
                ambient: Vec3::new(0.8, 0.2, 0.2),
                diffuse: Vec3::new(0.9, 0.3, 0.3),
                ..MaterialConfig::default()
            },
            mirror: None,
        },
        ObjectConfig {
            name: "sphere2".to_string(),
            shape: Shape::Sphere,
            position: Vec3::new(1.5, 0.0, 1.5),
            rotation: Vec3::ZERO,
            scale: Vec3::splat(0.75),
            material: MaterialConfig {
                ambient: Vec3::new(0.2, 0.8, 0.2),
                diffuse: Vec3::new(0.3, 0.9, 0.3),
                ..MaterialConfig::default()
            },
            mirror: None,
        },
        ObjectConfig {
            name: "cube".to_string(),
            shape: Shape::Cube,
            position: Vec3::new(-1.5, 0.0, 1.0),
            rotation: Vec3::new(0.0, 30.0, 0.0),
            scale: Vec3::ONE,
            material: MaterialConfig {
                ambient: Vec3::new(0.3, 0.3, 0.9),
                diffuse: Vec3::new(0.3, 0.3, 0.9),
                ..MaterialConfig::default()
            },
            mirror: None,
        },
        ObjectConfig {
            name: "main mirror".to_string(),
            shape: Shape::Quad,
            position: Vec3::new(0.0, 1.0, -3.0),
            rotation: Vec3::ZERO,
            scale: Vec3::new(4.0, 3.0, 1.0),
            material: MaterialConfig {
                diffuse: Vec3::splat(0.95),
                ..MaterialConfig::default()
            },
            mirror: Some(MirrorConfig { resolution: [1024, 768] }),
        },
    ]
}
