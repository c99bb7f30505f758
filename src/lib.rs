//! Real-time rendering of scenes containing planar mirrors.
//!
//! Each frame, every mirror renders the scene from the camera reflected
//! across its plane into its own offscreen target; the main pass then draws
//! mirrors textured with that target.

pub mod app;
pub mod backend;
pub mod camera;
pub mod config;
pub mod controller;
pub mod error;
pub mod frame;
pub mod frame_rate;
pub mod math;
pub mod mesh;
pub mod overlay;
pub mod recording;
pub mod reflection;
pub mod renderer;
pub mod scene;
pub mod settings;
pub mod setup;
pub mod ui;
