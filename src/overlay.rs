//! egui input and frame plumbing for the settings window and overlay text.

use egui::ViewportId;
use winit::event::WindowEvent;
use winit::window::Window;

use crate::renderer::UiFrame;

pub struct EguiOverlay {
    ctx: egui::Context,
    winit_state: egui_winit::State,
}

impl EguiOverlay {
    pub fn new(window: &Window) -> Self {
        let ctx = egui::Context::default();
        let winit_state = egui_winit::State::new(
            ctx.clone(),
            ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
        );
        Self { ctx, winit_state }
    }

    /// Feed a window event to egui. Returns whether egui consumed it.
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.winit_state.on_window_event(window, event).consumed
    }

    pub fn wants_pointer_input(&self) -> bool {
        self.ctx.wants_pointer_input()
    }

    pub fn wants_keyboard_input(&self) -> bool {
        self.ctx.wants_keyboard_input()
    }

    /// Run one egui frame and tessellate its output.
    pub fn run(&mut self, window: &Window, run_ui: impl FnOnce(&egui::Context)) -> UiFrame {
        let raw_input = self.winit_state.take_egui_input(window);
        let full_output = self.ctx.run(raw_input, run_ui);

        self.winit_state
            .handle_platform_output(window, full_output.platform_output);

        UiFrame {
            paint_jobs: self.ctx.tessellate(full_output.shapes, full_output.pixels_per_point),
            textures_delta: full_output.textures_delta,
            pixels_per_point: full_output.pixels_per_point,
        }
    }
}
