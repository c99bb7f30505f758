//! Error types for scene, rendering, configuration and application setup.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by scene geometry queries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("degenerate geometry: {reason}")]
    DegenerateGeometry { reason: String },
}

/// Errors raised by a render backend.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("No suitable GPU adapter found")]
    AdapterNotFound,
    #[error("Failed to create surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    #[error("Failed to request device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
    #[error("Surface is not supported by the selected adapter")]
    SurfaceUnsupported,
    #[error("Failed to allocate reflection target {label:?} ({width}x{height}): {reason}")]
    TargetAllocation {
        label: String,
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("Invalid texture {label:?}: {reason}")]
    InvalidTexture { label: String, reason: String },
    #[error("Invalid mesh {label:?}: {reason}")]
    InvalidMesh { label: String, reason: String },
    #[error("Out of memory")]
    OutOfMemory,
}

/// Errors raised while loading a scene file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors raised while turning a configuration into a live scene.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("Object {name:?}: {source}")]
    Object {
        name: String,
        #[source]
        source: RenderError,
    },
}

/// Top-level application errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("Failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}
