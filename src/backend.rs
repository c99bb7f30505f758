//! Boundary between the frame renderer and whatever executes GPU work.
//!
//! [`RenderBackend`] is both the resource allocator (meshes, textures,
//! reflection targets, all created at setup) and the render-pass executor
//! (clears, passes, indexed draws, overlay text, issued every frame). The
//! wgpu implementation lives in [`renderer`](crate::renderer); the headless
//! [`RecordingBackend`](crate::recording::RecordingBackend) captures the same
//! calls as a command trace.

use glam::{Mat4, Vec3};

use crate::error::RenderError;
use crate::mesh::Mesh;
use crate::settings::{LightSettings, RasterizerState};

/// Handle to an uploaded mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub(crate) usize);

/// Handle to a texture held in the backend's texture cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) usize);

/// Identifies a reflection target inside the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub(crate) usize);

/// An offscreen color + depth pair a mirror renders its reflection into.
///
/// Deliberately not `Clone`: the mirror that requested it is its only owner.
#[derive(Debug, PartialEq, Eq)]
pub struct ReflectionTarget {
    id: TargetId,
    width: u32,
    height: u32,
}

impl ReflectionTarget {
    pub(crate) fn new(id: TargetId, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Where a pass renders to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassTarget {
    Main,
    Reflection(TargetId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValues {
    pub color: [f64; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: [0.0, 0.25, 0.0, 1.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// Per-pass state shared by every draw in the pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassDesc {
    pub target: PassTarget,
    pub view_projection: Mat4,
    pub camera_position: Vec3,
    pub light: LightSettings,
    /// The view mirrors the world, so front faces wind clockwise.
    pub mirrored: bool,
}

/// Texture input of a single draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureBinding {
    None,
    Texture(TextureHandle),
    /// A mirror's reflection target. With a projection the target is sampled
    /// at the fragment's position projected through it; without one the
    /// mesh UVs are used.
    Reflection {
        target: TargetId,
        projection: Option<Mat4>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialColors {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
}

/// Uniform bundle and geometry for one indexed draw.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub label: &'a str,
    pub mesh: MeshHandle,
    pub model: Mat4,
    pub normal_matrix: Mat4,
    pub material: MaterialColors,
    pub texture: TextureBinding,
}

pub trait RenderBackend {
    /// Upload immutable geometry.
    fn create_mesh(&mut self, mesh: &Mesh) -> Result<MeshHandle, RenderError>;

    /// Upload an RGBA8 image into the texture cache.
    fn create_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<TextureHandle, RenderError>;

    /// Allocate a color + depth target for a mirror. Setup-time only.
    fn create_reflection_target(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
    ) -> Result<ReflectionTarget, RenderError>;

    /// Whether `texture` still refers to a live cache entry.
    fn is_texture_resident(&self, texture: TextureHandle) -> bool;

    /// Rebuild the rasterizer configuration used by subsequent draws.
    fn rebuild_rasterizer(&mut self, state: RasterizerState);

    fn clear(&mut self, target: PassTarget, clear: ClearValues);

    fn begin_pass(&mut self, pass: &PassDesc);

    fn draw(&mut self, draw: &DrawCall<'_>);

    fn end_pass(&mut self);

    /// Overlay text in pixels from the top-left corner of the main target.
    fn draw_text(&mut self, text: &str, position: [f32; 2]);
}
