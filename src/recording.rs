//! Headless backend that records every call as a [`Command`].
//!
//! Performs no GPU work. Used to inspect the exact command sequence a frame
//! produces without requiring GPU hardware.

use glam::Mat4;

use crate::backend::{
    ClearValues, DrawCall, MeshHandle, PassDesc, PassTarget, ReflectionTarget, RenderBackend,
    TargetId, TextureBinding, TextureHandle,
};
use crate::error::RenderError;
use crate::mesh::Mesh;
use crate::settings::RasterizerState;

/// Largest target edge the recording backend accepts, mirroring a typical
/// `max_texture_dimension_2d` limit.
pub const MAX_TARGET_DIMENSION: u32 = 8192;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    RebuildRasterizer(RasterizerState),
    Clear {
        target: PassTarget,
        clear: ClearValues,
    },
    BeginPass(PassDesc),
    Draw {
        label: String,
        mesh: MeshHandle,
        model: Mat4,
        texture: TextureBinding,
    },
    EndPass,
    DrawText {
        text: String,
        position: [f32; 2],
    },
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Vec<Command>,
    meshes: Vec<String>,
    textures: Vec<Option<String>>,
    targets: Vec<(u32, u32)>,
    open_pass: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drop the recorded trace, keeping all created resources.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Number of reflection targets allocated so far.
    pub fn target_allocations(&self) -> usize {
        self.targets.len()
    }

    pub fn rasterizer_rebuilds(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, Command::RebuildRasterizer(_)))
            .count()
    }

    /// Evict a texture from the cache, leaving existing handles dangling.
    pub fn evict_texture(&mut self, texture: TextureHandle) {
        if let Some(slot) = self.textures.get_mut(texture.0) {
            *slot = None;
        }
    }

    /// Labels of the objects drawn in the pass targeting `target`, per pass,
    /// in issue order.
    pub fn draws_into(&self, target: PassTarget) -> Vec<Vec<String>> {
        let mut passes = Vec::new();
        let mut current: Option<Vec<String>> = None;
        for command in &self.commands {
            match command {
                Command::BeginPass(pass) if pass.target == target => current = Some(Vec::new()),
                Command::Draw { label, .. } => {
                    if let Some(draws) = current.as_mut() {
                        draws.push(label.clone());
                    }
                }
                Command::EndPass => {
                    if let Some(draws) = current.take() {
                        passes.push(draws);
                    }
                }
                _ => {}
            }
        }
        passes
    }

    /// The pass descriptors recorded for `target`, in issue order.
    pub fn passes_into(&self, target: PassTarget) -> Vec<PassDesc> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::BeginPass(pass) if pass.target == target => Some(*pass),
                _ => None,
            })
            .collect()
    }
}

impl RenderBackend for RecordingBackend {
    fn create_mesh(&mut self, mesh: &Mesh) -> Result<MeshHandle, RenderError> {
        if mesh.indices.is_empty() {
            return Err(RenderError::InvalidMesh {
                label: mesh.label.clone(),
                reason: "mesh has no indices".to_string(),
            });
        }
        log::trace!("RecordingBackend: creating mesh {:?}", mesh.label);
        self.meshes.push(mesh.label.clone());
        Ok(MeshHandle(self.meshes.len() - 1))
    }

    fn create_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<TextureHandle, RenderError> {
        if rgba.len() != (width as usize) * (height as usize) * 4 {
            return Err(RenderError::InvalidTexture {
                label: label.to_string(),
                reason: format!("expected {}x{} RGBA8 pixels, got {} bytes", width, height, rgba.len()),
            });
        }
        log::trace!("RecordingBackend: creating texture {:?} ({}x{})", label, width, height);
        self.textures.push(Some(label.to_string()));
        Ok(TextureHandle(self.textures.len() - 1))
    }

    fn create_reflection_target(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
    ) -> Result<ReflectionTarget, RenderError> {
        if width == 0
            || height == 0
            || width > MAX_TARGET_DIMENSION
            || height > MAX_TARGET_DIMENSION
        {
            return Err(RenderError::TargetAllocation {
                label: label.to_string(),
                width,
                height,
                reason: format!("each side must be within 1..={MAX_TARGET_DIMENSION}"),
            });
        }
        log::trace!("RecordingBackend: creating reflection target {:?} ({}x{})", label, width, height);
        self.targets.push((width, height));
        Ok(ReflectionTarget::new(TargetId(self.targets.len() - 1), width, height))
    }

    fn is_texture_resident(&self, texture: TextureHandle) -> bool {
        matches!(self.textures.get(texture.0), Some(Some(_)))
    }

    fn rebuild_rasterizer(&mut self, state: RasterizerState) {
        self.commands.push(Command::RebuildRasterizer(state));
    }

    fn clear(&mut self, target: PassTarget, clear: ClearValues) {
        self.commands.push(Command::Clear { target, clear });
    }

    fn begin_pass(&mut self, pass: &PassDesc) {
        debug_assert!(!self.open_pass, "begin_pass while another pass is open");
        self.open_pass = true;
        self.commands.push(Command::BeginPass(*pass));
    }

    fn draw(&mut self, draw: &DrawCall<'_>) {
        debug_assert!(self.open_pass, "draw outside of a pass");
        self.commands.push(Command::Draw {
            label: draw.label.to_string(),
            mesh: draw.mesh,
            model: draw.model,
            texture: draw.texture,
        });
    }

    fn end_pass(&mut self) {
        debug_assert!(self.open_pass, "end_pass without begin_pass");
        self.open_pass = false;
        self.commands.push(Command::EndPass);
    }

    fn draw_text(&mut self, text: &str, position: [f32; 2]) {
        self.commands.push(Command::DrawText {
            text: text.to_string(),
            position,
        });
    }
}
