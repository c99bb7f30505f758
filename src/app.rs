// Window, event loop and per-frame driver for the mirror renderer

use std::sync::Arc;
use std::time::Instant;

use winit::{
    dpi::PhysicalSize,
    event::{DeviceEvent, Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::{Window, WindowBuilder},
};

use crate::camera::Camera;
use crate::config::SceneConfig;
use crate::controller::FirstPersonController;
use crate::error::{AppError, RenderError};
use crate::frame::{FrameContext, FrameRenderer};
use crate::overlay::EguiOverlay;
use crate::renderer::GpuRenderer;
use crate::scene::Scene;
use crate::settings::{LightSettings, RenderSettings};
use crate::setup::{build_camera, build_scene};
use crate::ui::{self, SettingsWindow};

pub struct App {
    window: Arc<Window>,
    gpu: GpuRenderer,
    overlay: EguiOverlay,
    settings_window: SettingsWindow,
    frame_renderer: FrameRenderer,
    scene: Scene,
    camera: Camera,
    light: LightSettings,
    settings: RenderSettings,
    controller: FirstPersonController,
    last_frame: Instant,
}

impl App {
    pub async fn new(event_loop: &EventLoop<()>, config: SceneConfig) -> Result<Self, AppError> {
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(config.window.title.as_str())
                .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
                .build(event_loop)?,
        );

        let mut gpu = GpuRenderer::new(window.clone()).await?;
        let scene = build_scene(&config, &mut gpu)?;

        let (width, height) = gpu.size();
        let camera = build_camera(&config.camera, width, height);
        let controller = FirstPersonController::new(&camera, config.camera.speed);
        let overlay = EguiOverlay::new(&window);

        Ok(Self {
            window,
            gpu,
            overlay,
            settings_window: SettingsWindow::new(),
            frame_renderer: FrameRenderer::new(),
            scene,
            camera,
            light: config.light,
            settings: config.render,
            controller,
            last_frame: Instant::now(),
        })
    }

    /// Run until the window closes. A fatal render error stops the loop and
    /// is returned.
    pub fn run(mut self, event_loop: EventLoop<()>) -> Result<(), AppError> {
        let window_id = self.window.id();
        let mut failure: Option<RenderError> = None;

        event_loop.run(|event, target| {
            target.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { window_id: id, event } if id == window_id => {
                    match self.handle_window_event(&event) {
                        Ok(true) => {}
                        Ok(false) => target.exit(),
                        Err(err) => {
                            log::error!("Fatal render error: {}", err);
                            failure = Some(err);
                            target.exit();
                        }
                    }
                }
                Event::DeviceEvent {
                    event: DeviceEvent::MouseMotion { delta },
                    ..
                } => {
                    self.controller.on_mouse_motion(delta.0, delta.1);
                }
                Event::AboutToWait => {
                    self.window.request_redraw();
                }
                _ => {}
            }
        })?;

        match failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Returns `Ok(false)` when the application should exit.
    fn handle_window_event(&mut self, event: &WindowEvent) -> Result<bool, RenderError> {
        let consumed = self.overlay.on_window_event(&self.window, event);

        match event {
            WindowEvent::CloseRequested => return Ok(false),
            WindowEvent::Resized(size) => self.resize(*size),
            WindowEvent::RedrawRequested => self.redraw()?,
            WindowEvent::KeyboardInput { event, .. } => {
                // Releases always reach the controller so keys never stick.
                if !event.state.is_pressed() || !(consumed || self.overlay.wants_keyboard_input()) {
                    self.controller.on_key_event(event);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if !state.is_pressed() || !(consumed || self.overlay.wants_pointer_input()) {
                    self.controller.on_mouse_button(*button, *state);
                }
            }
            _ => {}
        }
        Ok(true)
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.camera.set_viewport_size(size.width, size.height);
        self.gpu.resize(size.width, size.height);
    }

    fn redraw(&mut self) -> Result<(), RenderError> {
        let now = Instant::now();
        let frame_time = now - self.last_frame;
        self.last_frame = now;

        self.controller.update(&mut self.camera, frame_time);

        let stats = self.frame_renderer.render(
            &mut self.gpu,
            &self.scene,
            &FrameContext {
                camera: &self.camera,
                light: &self.light,
                settings: &self.settings,
                frame_time,
            },
        );
        log::trace!("{:?}", stats);

        let overlay_text = self.gpu.take_overlay_text();
        let ui_frame = self.overlay.run(&self.window, |ctx| {
            if self
                .settings_window
                .show(ctx, &mut self.settings, &mut self.light, &mut self.scene)
            {
                log::debug!("Rasterizer settings edited");
            }
            ui::paint_overlay_text(ctx, &overlay_text);
        });

        self.gpu.present(&ui_frame)
    }
}
