//! egui overlay that writes layer labels over the 3D scene.

use crate::camera::project_to_screen;
use glam::{Mat4, Vec2, Vec3};
use neuroviz_gpu::wgpu;
use winit::event::WindowEvent;
use winit::window::Window;

const LABEL_FONT_SIZE: f32 = 14.0;
const LABEL_COLOR: egui::Color32 = egui::Color32::from_rgb(220, 220, 230);

/// Text anchored at a point in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldLabel {
    pub text: String,
    pub anchor: Vec3,
}

/// Screen positions, in `viewport` units, for the labels in front of the camera.
pub fn place_labels<'a>(
    labels: &'a [WorldLabel],
    view_proj: Mat4,
    viewport: Vec2,
) -> Vec<(Vec2, &'a str)> {
    labels
        .iter()
        .filter_map(|label| {
            let at = project_to_screen(view_proj, label.anchor, viewport)?;
            Some((at, label.text.as_str()))
        })
        .collect()
}

/// egui context, winit glue and wgpu painter for the label pass.
pub struct LabelOverlay {
    context: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

impl LabelOverlay {
    pub fn new(window: &Window, device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let context = egui::Context::default();
        let state = egui_winit::State::new(
            context.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            window.theme(),
            Some(device.limits().max_texture_dimension_2d as usize),
        );
        let renderer =
            egui_wgpu::Renderer::new(device, surface_format, egui_wgpu::RendererOptions::default());
        Self {
            context,
            state,
            renderer,
        }
    }

    /// Feed a window event to egui. Returns true if egui consumed it.
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    /// Record the label pass on top of `view`.
    ///
    /// Returns command buffers egui needs submitted before `encoder`.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        window: &Window,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        labels: &[WorldLabel],
        view_proj: Mat4,
    ) -> Vec<wgpu::CommandBuffer> {
        let size = window.inner_size();
        let pixels_per_point = egui_winit::pixels_per_point(&self.context, window);
        let viewport = Vec2::new(size.width as f32, size.height as f32) / pixels_per_point;
        let placed = place_labels(labels, view_proj, viewport);

        let raw_input = self.state.take_egui_input(window);
        let output = self.context.run(raw_input, |ctx| {
            let painter = ctx.layer_painter(egui::LayerId::background());
            for (at, text) in &placed {
                painter.text(
                    egui::pos2(at.x, at.y),
                    egui::Align2::CENTER_BOTTOM,
                    *text,
                    egui::FontId::proportional(LABEL_FONT_SIZE),
                    LABEL_COLOR,
                );
            }
        });
        self.state
            .handle_platform_output(window, output.platform_output);

        for (id, delta) in &output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, delta);
        }
        let paint_jobs = self
            .context
            .tessellate(output.shapes, output.pixels_per_point);
        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [size.width.max(1), size.height.max(1)],
            pixels_per_point: output.pixels_per_point,
        };
        let command_buffers =
            self.renderer
                .update_buffers(device, queue, encoder, &paint_jobs, &screen);

        {
            let mut render_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Label Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                })
                .forget_lifetime();
            self.renderer.render(&mut render_pass, &paint_jobs, &screen);
        }

        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }
        command_buffers
    }
}
