//! wgpu implementation of [`RenderBackend`].
//!
//! Draw calls issued through the trait are recorded into a per-frame list and
//! encoded in one command buffer by [`GpuRenderer::present`], followed by the
//! egui overlay. Uniforms live in two dynamic-offset buffers (one slot per
//! pass, one per draw) so a frame needs no per-draw bind group creation.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Mat4;
use winit::window::Window;

use crate::backend::{
    ClearValues, DrawCall, MeshHandle, PassDesc, PassTarget, ReflectionTarget, RenderBackend, TargetId,
    TextureBinding, TextureHandle,
};
use crate::error::RenderError;
use crate::mesh::{Mesh, Vertex};
use crate::settings::{CullMode, FillMode, RasterizerState, RenderSettings};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;
const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

const INITIAL_PASS_CAPACITY: usize = 8;
const INITIAL_OBJECT_CAPACITY: usize = 64;

const TEXTURE_MODE_NONE: u32 = 0;
const TEXTURE_MODE_MESH_UV: u32 = 1;
const TEXTURE_MODE_PROJECTIVE: u32 = 2;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

// Uniform buffer structure shared by every draw of a pass
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct PassUniform {
    view_proj: [[f32; 4]; 4],
    camera_position: [f32; 3],
    _pad0: f32,
    light_ambient: [f32; 3],
    _pad1: f32,
    light_diffuse: [f32; 3],
    _pad2: f32,
    light_specular: [f32; 3],
    _pad3: f32,
    light_direction: [f32; 3],
    _pad4: f32,
}

impl PassUniform {
    fn new(pass: &PassDesc) -> Self {
        Self {
            view_proj: pass.view_projection.to_cols_array_2d(),
            camera_position: pass.camera_position.to_array(),
            _pad0: 0.0,
            light_ambient: pass.light.ambient.to_array(),
            _pad1: 0.0,
            light_diffuse: pass.light.diffuse.to_array(),
            _pad2: 0.0,
            light_specular: pass.light.specular.to_array(),
            _pad3: 0.0,
            light_direction: pass.light.unit_direction().to_array(),
            _pad4: 0.0,
        }
    }
}

// Uniform buffer structure for a single draw
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ObjectUniform {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    reflection_view_proj: [[f32; 4]; 4],
    ambient: [f32; 3],
    texture_mode: u32,
    diffuse: [f32; 3],
    _pad0: f32,
    specular: [f32; 3],
    shininess: f32,
}

impl ObjectUniform {
    fn new(draw: &DrawCall<'_>) -> Self {
        let (texture_mode, projection) = match draw.texture {
            TextureBinding::None => (TEXTURE_MODE_NONE, Mat4::IDENTITY),
            TextureBinding::Texture(_) => (TEXTURE_MODE_MESH_UV, Mat4::IDENTITY),
            TextureBinding::Reflection { projection: Some(projection), .. } => {
                (TEXTURE_MODE_PROJECTIVE, projection)
            }
            TextureBinding::Reflection { projection: None, .. } => (TEXTURE_MODE_MESH_UV, Mat4::IDENTITY),
        };
        Self {
            model: draw.model.to_cols_array_2d(),
            normal_matrix: draw.normal_matrix.to_cols_array_2d(),
            reflection_view_proj: projection.to_cols_array_2d(),
            ambient: draw.material.ambient.to_array(),
            texture_mode,
            diffuse: draw.material.diffuse.to_array(),
            _pad0: 0.0,
            specular: draw.material.specular.to_array(),
            shininess: draw.material.shininess,
        }
    }
}

/// A uniform buffer holding one `T` per slot, bound with a dynamic offset.
struct DynamicUniforms<T> {
    label: &'static str,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    capacity: usize,
    stride: usize,
    staged: Vec<T>,
}

impl<T: bytemuck::Pod> DynamicUniforms<T> {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, label: &'static str, capacity: usize) -> Self {
        let align = device.limits().min_uniform_buffer_offset_alignment as usize;
        let stride = align_up(std::mem::size_of::<T>(), align);
        let (buffer, bind_group) = create_uniform_buffer::<T>(device, layout, label, stride * capacity);
        Self {
            label,
            buffer,
            bind_group,
            capacity,
            stride,
            staged: Vec::new(),
        }
    }

    /// Stage `value` for the next upload and return its dynamic offset.
    fn push(&mut self, value: T) -> u32 {
        let offset = self.staged.len() * self.stride;
        self.staged.push(value);
        offset as u32
    }

    fn discard(&mut self) {
        self.staged.clear();
    }

    /// Write staged values to the GPU, growing the buffer when needed.
    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, layout: &wgpu::BindGroupLayout) {
        if self.staged.is_empty() {
            return;
        }
        if self.staged.len() > self.capacity {
            let capacity = self.staged.len().next_power_of_two();
            log::debug!("Growing {} from {} to {} slots", self.label, self.capacity, capacity);
            let (buffer, bind_group) = create_uniform_buffer::<T>(device, layout, self.label, self.stride * capacity);
            self.buffer = buffer;
            self.bind_group = bind_group;
            self.capacity = capacity;
        }

        let size = std::mem::size_of::<T>();
        let mut bytes = vec![0u8; self.stride * self.staged.len()];
        for (slot, value) in self.staged.iter().enumerate() {
            let start = slot * self.stride;
            bytes[start..start + size].copy_from_slice(bytemuck::bytes_of(value));
        }
        queue.write_buffer(&self.buffer, 0, &bytes);
        self.staged.clear();
    }
}

fn create_uniform_buffer<T>(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    label: &str,
    size: usize,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<T>() as u64),
            }),
        }],
    });
    (buffer, bind_group)
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct GpuReflectionTarget {
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
}

/// Pipelines for the current rasterizer state. Reflection passes use the
/// mirrored one, whose front faces wind clockwise.
struct Pipelines {
    standard: wgpu::RenderPipeline,
    mirrored: wgpu::RenderPipeline,
}

#[derive(Debug, Clone, Copy)]
enum TextureSlot {
    White,
    Texture(usize),
    Target(usize),
}

struct RecordedDraw {
    mesh: usize,
    uniform_offset: u32,
    texture: TextureSlot,
}

struct RecordedPass {
    target: PassTarget,
    mirrored: bool,
    clear: Option<ClearValues>,
    uniform_offset: u32,
    draws: Vec<RecordedDraw>,
}

#[derive(Default)]
struct FrameRecording {
    clears: HashMap<PassTarget, ClearValues>,
    passes: Vec<RecordedPass>,
    open_pass: Option<RecordedPass>,
}

impl FrameRecording {
    /// Passes in submission order. Clears no pass consumed, such as a fresh
    /// reflection target's, come first so this frame's passes sample them.
    fn into_passes(mut self) -> Vec<RecordedPass> {
        if let Some(pass) = self.open_pass.take() {
            log::warn!("Pass into {:?} was never ended", pass.target);
            self.passes.push(pass);
        }
        let mut passes: Vec<RecordedPass> = self
            .clears
            .into_iter()
            .map(|(target, clear)| RecordedPass {
                target,
                mirrored: false,
                clear: Some(clear),
                uniform_offset: 0,
                draws: Vec::new(),
            })
            .collect();
        passes.append(&mut self.passes);
        passes
    }
}

/// Text drawn on top of the frame, in pixels from the top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayText {
    pub text: String,
    pub position: [f32; 2],
}

/// Tessellated egui output for one frame.
pub struct UiFrame {
    pub paint_jobs: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

pub struct GpuRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    supports_wireframe: bool,

    shader: wgpu::ShaderModule,
    pipeline_layout: wgpu::PipelineLayout,
    pass_layout: wgpu::BindGroupLayout,
    object_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipelines: Pipelines,

    texture_sampler: wgpu::Sampler,
    target_sampler: wgpu::Sampler,
    white_texture: GpuTexture,
    depth_view: wgpu::TextureView,

    pass_uniforms: DynamicUniforms<PassUniform>,
    object_uniforms: DynamicUniforms<ObjectUniform>,

    meshes: Vec<GpuMesh>,
    textures: Vec<GpuTexture>,
    targets: Vec<GpuReflectionTarget>,

    recording: FrameRecording,
    overlay_text: Vec<OverlayText>,
    egui_renderer: egui_wgpu::Renderer,
}

impl GpuRenderer {
    /// Set up the device and a surface for `window`, sized to its inner size.
    pub async fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::AdapterNotFound)?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let supports_wireframe = adapter.features().contains(wgpu::Features::POLYGON_MODE_LINE);
        if !supports_wireframe {
            log::warn!("Adapter does not support line polygon mode, wire-frame falls back to solid");
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Renderer Device"),
                    required_features: adapter.features() & wgpu::Features::POLYGON_MODE_LINE,
                    required_limits: wgpu::Limits::default(),
                },
                None, // Trace path
            )
            .await?;

        // Get surface capabilities
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(RenderError::SurfaceUnsupported)?;

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let pass_layout = uniform_layout::<PassUniform>(&device, "Pass Bind Group Layout");
        let object_layout = uniform_layout::<ObjectUniform>(&device, "Object Bind Group Layout");
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&pass_layout, &object_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let initial_state = RenderSettings::default().rasterizer_state();
        let pipelines = Pipelines {
            standard: create_pipeline(
                &device,
                &pipeline_layout,
                &shader,
                surface_format,
                initial_state,
                wgpu::FrontFace::Ccw,
            ),
            mirrored: create_pipeline(
                &device,
                &pipeline_layout,
                &shader,
                surface_format,
                initial_state,
                wgpu::FrontFace::Cw,
            ),
        };

        let texture_sampler = create_sampler(&device, "Texture Sampler", wgpu::AddressMode::Repeat);
        let target_sampler = create_sampler(&device, "Reflection Sampler", wgpu::AddressMode::ClampToEdge);
        let white_texture = upload_texture(
            &device,
            &queue,
            &texture_layout,
            &texture_sampler,
            "White Texture",
            1,
            1,
            &[255, 255, 255, 255],
        );
        let depth_view = create_depth_view(&device, "Main Depth", surface_config.width, surface_config.height);

        let pass_uniforms = DynamicUniforms::new(&device, &pass_layout, "Pass Uniforms", INITIAL_PASS_CAPACITY);
        let object_uniforms =
            DynamicUniforms::new(&device, &object_layout, "Object Uniforms", INITIAL_OBJECT_CAPACITY);

        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1);

        Ok(Self {
            surface,
            device,
            queue,
            surface_config,
            supports_wireframe,
            shader,
            pipeline_layout,
            pass_layout,
            object_layout,
            texture_layout,
            pipelines,
            texture_sampler,
            target_sampler,
            white_texture,
            depth_view,
            pass_uniforms,
            object_uniforms,
            meshes: Vec::new(),
            textures: Vec::new(),
            targets: Vec::new(),
            recording: FrameRecording::default(),
            overlay_text: Vec::new(),
            egui_renderer,
        })
    }

    /// Size of the main target in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    /// Resize the main target. Reflection targets keep their size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, "Main Depth", width, height);
        log::debug!("Main target resized to {}x{}", width, height);
    }

    /// Overlay text requested since the last call.
    pub fn take_overlay_text(&mut self) -> Vec<OverlayText> {
        std::mem::take(&mut self.overlay_text)
    }

    /// Encode the recorded frame plus `ui` and present it.
    pub fn present(&mut self, ui: &UiFrame) -> Result<(), RenderError> {
        for (id, image_delta) in &ui.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, image_delta);
        }

        let passes = std::mem::take(&mut self.recording).into_passes();
        let result = self.encode_and_present(&passes, ui);

        for id in &ui.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
        result
    }

    fn encode_and_present(&mut self, passes: &[RecordedPass], ui: &UiFrame) -> Result<(), RenderError> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.surface_config);
                self.discard_uniforms();
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.discard_uniforms();
                return Err(RenderError::OutOfMemory);
            }
            Err(err) => {
                log::warn!("Dropping frame: {}", err);
                self.discard_uniforms();
                return Ok(());
            }
        };
        let surface_view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.pass_uniforms.upload(&self.device, &self.queue, &self.pass_layout);
        self.object_uniforms.upload(&self.device, &self.queue, &self.object_layout);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        for pass in passes {
            self.encode_pass(&mut encoder, &surface_view, pass);
        }

        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.surface_config.width, self.surface_config.height],
            pixels_per_point: ui.pixels_per_point,
        };
        let ui_commands =
            self.egui_renderer
                .update_buffers(&self.device, &self.queue, &mut encoder, &ui.paint_jobs, &screen);
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("UI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            self.egui_renderer.render(&mut render_pass, &ui.paint_jobs, &screen);
        }

        self.queue
            .submit(ui_commands.into_iter().chain(std::iter::once(encoder.finish())));
        frame.present();
        Ok(())
    }

    fn discard_uniforms(&mut self) {
        self.pass_uniforms.discard();
        self.object_uniforms.discard();
    }

    fn encode_pass(&self, encoder: &mut wgpu::CommandEncoder, surface_view: &wgpu::TextureView, pass: &RecordedPass) {
        let (color_view, depth_view) = match pass.target {
            PassTarget::Main => (surface_view, &self.depth_view),
            PassTarget::Reflection(id) => match self.targets.get(id.0) {
                Some(target) => (&target.color_view, &target.depth_view),
                None => {
                    log::warn!("Skipping pass into unknown reflection target {:?}", id);
                    return;
                }
            },
        };

        let color_load = match pass.clear {
            Some(clear) => wgpu::LoadOp::Clear(wgpu::Color {
                r: clear.color[0],
                g: clear.color[1],
                b: clear.color[2],
                a: clear.color[3],
            }),
            None => wgpu::LoadOp::Load,
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: pass.clear.map_or(wgpu::LoadOp::Load, |clear| wgpu::LoadOp::Clear(clear.depth)),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: pass
                        .clear
                        .map_or(wgpu::LoadOp::Load, |clear| wgpu::LoadOp::Clear(clear.stencil)),
                    store: wgpu::StoreOp::Store,
                }),
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        if pass.draws.is_empty() {
            return;
        }

        let pipeline = if pass.mirrored {
            &self.pipelines.mirrored
        } else {
            &self.pipelines.standard
        };
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &self.pass_uniforms.bind_group, &[pass.uniform_offset]);

        for draw in &pass.draws {
            let Some(mesh) = self.meshes.get(draw.mesh) else {
                continue;
            };
            render_pass.set_bind_group(1, &self.object_uniforms.bind_group, &[draw.uniform_offset]);
            render_pass.set_bind_group(2, self.texture_bind_group(draw.texture), &[]);
            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }

    fn texture_bind_group(&self, slot: TextureSlot) -> &wgpu::BindGroup {
        let bind_group = match slot {
            TextureSlot::White => None,
            TextureSlot::Texture(index) => self.textures.get(index).map(|texture| &texture.bind_group),
            TextureSlot::Target(index) => self.targets.get(index).map(|target| &target.bind_group),
        };
        bind_group.unwrap_or(&self.white_texture.bind_group)
    }

    fn texture_slot(&self, binding: TextureBinding) -> TextureSlot {
        match binding {
            TextureBinding::None => TextureSlot::White,
            TextureBinding::Texture(texture) if texture.0 < self.textures.len() => TextureSlot::Texture(texture.0),
            TextureBinding::Reflection { target, .. } if target.0 < self.targets.len() => {
                TextureSlot::Target(target.0)
            }
            _ => TextureSlot::White,
        }
    }

    /// Wire-frame needs a device feature; without it the request degrades to solid.
    fn supported_state(&self, state: RasterizerState) -> RasterizerState {
        if state.fill_mode == FillMode::Wireframe && !self.supports_wireframe {
            log::warn!("Wire-frame fill is not supported on this device, using solid");
            return RasterizerState {
                fill_mode: FillMode::Solid,
                ..state
            };
        }
        state
    }
}

impl RenderBackend for GpuRenderer {
    fn create_mesh(&mut self, mesh: &Mesh) -> Result<MeshHandle, RenderError> {
        use wgpu::util::DeviceExt;

        if mesh.indices.is_empty() || mesh.vertices.is_empty() {
            return Err(RenderError::InvalidMesh {
                label: mesh.label.clone(),
                reason: "mesh has no geometry".to_string(),
            });
        }
        if let Some(index) = mesh.indices.iter().find(|&&index| index as usize >= mesh.vertices.len()) {
            return Err(RenderError::InvalidMesh {
                label: mesh.label.clone(),
                reason: format!("index {} out of range for {} vertices", index, mesh.vertices.len()),
            });
        }

        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", mesh.label)),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Index Buffer", mesh.label)),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        self.meshes.push(GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count(),
        });
        log::debug!("Uploaded mesh {:?} ({} vertices)", mesh.label, mesh.vertices.len());
        Ok(MeshHandle(self.meshes.len() - 1))
    }

    fn create_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<TextureHandle, RenderError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(RenderError::InvalidTexture {
                label: label.to_string(),
                reason: format!("{}x{} is outside 1..={}", width, height, max),
            });
        }
        if rgba.len() != (width as usize) * (height as usize) * 4 {
            return Err(RenderError::InvalidTexture {
                label: label.to_string(),
                reason: format!("expected {}x{} RGBA8 pixels, got {} bytes", width, height, rgba.len()),
            });
        }

        let texture = upload_texture(
            &self.device,
            &self.queue,
            &self.texture_layout,
            &self.texture_sampler,
            label,
            width,
            height,
            rgba,
        );
        self.textures.push(texture);
        log::debug!("Uploaded texture {:?} ({}x{})", label, width, height);
        Ok(TextureHandle(self.textures.len() - 1))
    }

    fn create_reflection_target(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
    ) -> Result<ReflectionTarget, RenderError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(RenderError::TargetAllocation {
                label: label.to_string(),
                width,
                height,
                reason: format!("each side must be within 1..={max}"),
            });
        }

        let color = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.surface_config.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = create_depth_view(&self.device, label, width, height);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&color_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.target_sampler),
                },
            ],
        });

        self.targets.push(GpuReflectionTarget {
            color_view,
            depth_view,
            bind_group,
        });
        let id = TargetId(self.targets.len() - 1);
        // A mirror that is never rendered shows the clear color.
        self.recording
            .clears
            .insert(PassTarget::Reflection(id), ClearValues::default());
        log::info!("Allocated reflection target {:?} ({}x{})", label, width, height);
        Ok(ReflectionTarget::new(id, width, height))
    }

    fn is_texture_resident(&self, texture: TextureHandle) -> bool {
        texture.0 < self.textures.len()
    }

    fn rebuild_rasterizer(&mut self, state: RasterizerState) {
        let state = self.supported_state(state);
        let format = self.surface_config.format;
        self.pipelines = Pipelines {
            standard: create_pipeline(
                &self.device,
                &self.pipeline_layout,
                &self.shader,
                format,
                state,
                wgpu::FrontFace::Ccw,
            ),
            mirrored: create_pipeline(
                &self.device,
                &self.pipeline_layout,
                &self.shader,
                format,
                state,
                wgpu::FrontFace::Cw,
            ),
        };
    }

    fn clear(&mut self, target: PassTarget, clear: ClearValues) {
        self.recording.clears.insert(target, clear);
    }

    fn begin_pass(&mut self, pass: &PassDesc) {
        if let Some(open) = self.recording.open_pass.take() {
            log::warn!("Pass into {:?} began before the previous one ended", pass.target);
            self.recording.passes.push(open);
        }
        let uniform_offset = self.pass_uniforms.push(PassUniform::new(pass));
        self.recording.open_pass = Some(RecordedPass {
            target: pass.target,
            mirrored: pass.mirrored,
            clear: self.recording.clears.remove(&pass.target),
            uniform_offset,
            draws: Vec::new(),
        });
    }

    fn draw(&mut self, draw: &DrawCall<'_>) {
        if draw.mesh.0 >= self.meshes.len() {
            log::warn!("Draw {:?} references an unknown mesh, skipping", draw.label);
            return;
        }
        let texture = self.texture_slot(draw.texture);
        let Some(pass) = self.recording.open_pass.as_mut() else {
            log::warn!("Draw {:?} issued outside a pass, skipping", draw.label);
            return;
        };
        let uniform_offset = self.object_uniforms.push(ObjectUniform::new(draw));
        pass.draws.push(RecordedDraw {
            mesh: draw.mesh.0,
            uniform_offset,
            texture,
        });
    }

    fn end_pass(&mut self) {
        match self.recording.open_pass.take() {
            Some(pass) => self.recording.passes.push(pass),
            None => log::warn!("end_pass without a matching begin_pass"),
        }
    }

    fn draw_text(&mut self, text: &str, position: [f32; 2]) {
        self.overlay_text.push(OverlayText {
            text: text.to_string(),
            position,
        });
    }
}

fn uniform_layout<T>(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<T>() as u64),
            },
            count: None,
        }],
    })
}

fn cull_face(mode: CullMode) -> Option<wgpu::Face> {
    match mode {
        CullMode::Front => Some(wgpu::Face::Front),
        CullMode::Back => Some(wgpu::Face::Back),
        CullMode::None => None,
    }
}

fn polygon_mode(mode: FillMode) -> wgpu::PolygonMode {
    match mode {
        FillMode::Solid => wgpu::PolygonMode::Fill,
        FillMode::Wireframe => wgpu::PolygonMode::Line,
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    state: RasterizerState,
    front_face: wgpu::FrontFace,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Render Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[vertex_layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face,
            cull_mode: cull_face(state.cull_mode),
            unclipped_depth: false,
            polygon_mode: polygon_mode(state.fill_mode),
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

fn create_sampler(device: &wgpu::Device, label: &str, address_mode: wgpu::AddressMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

fn create_depth_view(device: &wgpu::Device, label: &str, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[allow(clippy::too_many_arguments)]
fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    label: &str,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> GpuTexture {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });

    GpuTexture {
        _texture: texture,
        bind_group,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MaterialColors;
    use crate::settings::LightSettings;
    use glam::Vec3;

    #[test]
    fn uniform_layouts_match_the_shader() {
        assert_eq!(std::mem::size_of::<PassUniform>(), 144);
        assert_eq!(std::mem::size_of::<ObjectUniform>(), 240);
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    fn main_pass_sampling_target(target: usize) -> RecordedPass {
        RecordedPass {
            target: PassTarget::Main,
            mirrored: false,
            clear: Some(ClearValues::default()),
            uniform_offset: 0,
            draws: vec![RecordedDraw {
                mesh: 0,
                uniform_offset: 0,
                texture: TextureSlot::Target(target),
            }],
        }
    }

    #[test]
    fn pending_target_clear_is_encoded_before_the_passes() {
        let fresh = PassTarget::Reflection(TargetId(0));
        let mut recording = FrameRecording::default();
        recording.clears.insert(fresh, ClearValues::default());
        recording.passes.push(main_pass_sampling_target(0));

        let passes = recording.into_passes();
        assert_eq!(passes.len(), 2);
        assert_eq!(passes[0].target, fresh);
        assert!(passes[0].clear.is_some());
        assert!(passes[0].draws.is_empty());
        assert_eq!(passes[1].target, PassTarget::Main);
        assert_eq!(passes[1].draws.len(), 1);
    }

    #[test]
    fn unended_pass_is_submitted_last() {
        let recording = FrameRecording {
            open_pass: Some(main_pass_sampling_target(0)),
            ..FrameRecording::default()
        };
        let passes = recording.into_passes();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].target, PassTarget::Main);
    }

    #[test]
    fn stride_is_aligned() {
        assert_eq!(align_up(144, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(240, 64), 256);
    }

    #[test]
    fn object_uniform_texture_modes() {
        let projection = Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0));
        let draw = |texture| DrawCall {
            label: "mirror",
            mesh: MeshHandle(0),
            model: Mat4::IDENTITY,
            normal_matrix: Mat4::IDENTITY,
            material: MaterialColors {
                ambient: Vec3::ONE,
                diffuse: Vec3::splat(0.5),
                specular: Vec3::ONE,
                shininess: 16.0,
            },
            texture,
        };

        let plain = ObjectUniform::new(&draw(TextureBinding::None));
        assert_eq!(plain.texture_mode, TEXTURE_MODE_NONE);
        assert_eq!(plain.diffuse, [0.5; 3]);
        assert_eq!(plain.shininess, 16.0);

        let textured = ObjectUniform::new(&draw(TextureBinding::Texture(TextureHandle(0))));
        assert_eq!(textured.texture_mode, TEXTURE_MODE_MESH_UV);

        let projected = ObjectUniform::new(&draw(TextureBinding::Reflection {
            target: TargetId(0),
            projection: Some(projection),
        }));
        assert_eq!(projected.texture_mode, TEXTURE_MODE_PROJECTIVE);
        assert_eq!(projected.reflection_view_proj, projection.to_cols_array_2d());

        let stale = ObjectUniform::new(&draw(TextureBinding::Reflection {
            target: TargetId(0),
            projection: None,
        }));
        assert_eq!(stale.texture_mode, TEXTURE_MODE_MESH_UV);
    }

    #[test]
    fn pass_uniform_normalizes_the_light() {
        let pass = PassDesc {
            target: PassTarget::Main,
            view_projection: Mat4::IDENTITY,
            camera_position: Vec3::new(1.0, 2.0, 3.0),
            light: LightSettings {
                direction: Vec3::new(0.0, -4.0, 0.0),
                ..LightSettings::default()
            },
            mirrored: false,
        };
        let uniform = PassUniform::new(&pass);
        assert_eq!(uniform.light_direction, [0.0, -1.0, 0.0]);
        assert_eq!(uniform.camera_position, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn rasterizer_maps_to_wgpu_state() {
        assert_eq!(cull_face(CullMode::Back), Some(wgpu::Face::Back));
        assert_eq!(cull_face(CullMode::Front), Some(wgpu::Face::Front));
        assert_eq!(cull_face(CullMode::None), None);
        assert_eq!(polygon_mode(FillMode::Wireframe), wgpu::PolygonMode::Line);
        assert_eq!(polygon_mode(FillMode::Solid), wgpu::PolygonMode::Fill);
    }
}
