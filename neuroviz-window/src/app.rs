use crate::camera::{Camera, Projection};
use crate::controls::OrbitController;
use crate::overlay::{LabelOverlay, WorldLabel};
use neuroviz_gpu::wgpu;
use neuroviz_gpu::{
    CameraUniforms, Renderer, RendererError, ResourceRegistry, RetryPolicy, SceneBounds,
    SurfaceWrapper, retry_with_backoff,
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("Failed to create window: {0}")]
    Os(#[from] winit::error::OsError),
    #[error(transparent)]
    Renderer(#[from] RendererError),
    #[error("Failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("Delegate failed: {0}")]
    Delegate(String),
}

/// Window and GPU start-up settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// GPU initialization attempts before giving up.
    pub gpu_attempts: u32,
    pub gpu_backoff_ms: u64,
    /// Draw layer labels over the scene.
    pub show_labels: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            title: "Neuroviz".to_string(),
            width: 1280,
            height: 720,
            gpu_attempts: retry.max_attempts,
            gpu_backoff_ms: retry.backoff.as_millis() as u64,
            show_labels: true,
        }
    }
}

impl WindowConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.gpu_attempts)
            .with_backoff(Duration::from_millis(self.gpu_backoff_ms))
    }
}

/// Install the global tracing subscriber. Later calls are no-ops.
pub fn init_logging() {
    #[cfg(feature = "tracy")]
    {
        use tracing_subscriber::Layer;
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;
        let _ = tracing_subscriber::registry()
            .with(tracing_tracy::TracyLayer::default())
            .with(
                tracing_subscriber::fmt::layer().with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "info".into()),
                ),
            )
            .try_init();
    }

    #[cfg(not(feature = "tracy"))]
    {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_target(false)
            .try_init();
    }
}

/// Context passed to the render delegate for rendering.
pub struct RenderContext<'a> {
    pub color_view: &'a wgpu::TextureView,
    pub depth_view: Option<&'a wgpu::TextureView>,
}

/// What a delegate reports after preparing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Prepared {
    /// The scene bounds moved; the camera should be reframed.
    pub reframe: bool,
}

/// Trait for the application side of the render loop.
pub trait RenderDelegate: Sized {
    /// Data needed to construct the delegate.
    type InitData;

    /// Create GPU resources for rendering.
    fn create(
        renderer: &Renderer,
        registry: &mut ResourceRegistry,
        surface_format: wgpu::TextureFormat,
        init_data: Self::InitData,
    ) -> Result<Self, Box<dyn Error>>;

    /// Get the scene bounds for camera positioning.
    fn bounds(&self) -> &SceneBounds;

    /// Return depth format if depth testing is needed. Default is None (no depth).
    fn depth_format(&self) -> Option<wgpu::TextureFormat> {
        None
    }

    /// Per-frame CPU work and GPU resource sync, before the camera upload.
    fn prepare(
        &mut self,
        renderer: &Renderer,
        registry: &mut ResourceRegistry,
        now: Instant,
    ) -> Result<Prepared, Box<dyn Error>>;

    /// React to a window event. Return true if it was consumed.
    fn handle_window_event(&mut self, event: &WindowEvent, now: Instant) -> bool {
        let _ = (event, now);
        false
    }

    /// Text to draw over the scene this frame.
    fn labels(&self) -> Vec<WorldLabel> {
        Vec::new()
    }

    /// Update GPU resources (e.g., camera uniforms).
    fn update(&mut self, queue: &wgpu::Queue, registry: &ResourceRegistry, camera: &CameraUniforms);

    /// Record render commands.
    fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        ctx: RenderContext,
        registry: &ResourceRegistry,
    );
}

/// Run the viewer with a custom render delegate.
///
/// If the GPU cannot be initialized within the retry policy the loop exits
/// quietly and this returns `Ok(())`.
pub fn run_with_delegate<D: RenderDelegate + 'static>(
    config: WindowConfig,
    init_data: D::InitData,
) -> Result<(), Box<dyn Error>>
where
    D::InitData: 'static,
{
    init_logging();

    let event_loop = EventLoop::new().map_err(WindowError::from)?;
    let mut app = App::<D>::new(config, init_data);
    let run_result = event_loop.run_app(&mut app);
    let app_result = app.finish();
    run_result.map_err(WindowError::from)?;
    app_result
}

struct App<D: RenderDelegate> {
    config: WindowConfig,
    init_data: Option<D::InitData>,
    state: Option<ViewerState<D>>,
    error: Option<WindowError>,
}

impl<D: RenderDelegate> App<D> {
    fn new(config: WindowConfig, init_data: D::InitData) -> Self {
        Self {
            config,
            init_data: Some(init_data),
            state: None,
            error: None,
        }
    }

    fn finish(self) -> Result<(), Box<dyn Error>> {
        match self.error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

impl<D: RenderDelegate + 'static> ApplicationHandler for App<D> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() || self.error.is_some() {
            return;
        }
        let Some(init_data) = self.init_data.take() else {
            return;
        };

        match ViewerState::<D>::new(event_loop, &self.config, init_data) {
            Ok(Some(state)) => self.state = Some(state),
            Ok(None) => {
                info!("Rendering unavailable, closing");
                event_loop.exit();
            }
            Err(err) => {
                error!("Failed to initialize viewer: {err}");
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if state.window.id() != window_id {
            return;
        }

        if state.handle_window_event(event_loop, &event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size),
            WindowEvent::RedrawRequested => {
                let _frame_span = tracing::info_span!("frame").entered();
                match state.render(Instant::now()) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.window.inner_size();
                        state.resize(size);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        error!("GPU Out of Memory - exiting");
                        event_loop.exit();
                    }
                    Err(e) => error!("Render error: {:?}", e),
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.as_ref() {
            state.window.request_redraw();
        }
    }
}

struct ViewerState<D: RenderDelegate> {
    window: Arc<Window>,
    renderer: Renderer,
    surface: SurfaceWrapper,
    registry: ResourceRegistry,
    delegate: D,
    camera: Camera,
    controller: OrbitController,
    projection: Projection,
    depth: Option<(wgpu::Texture, wgpu::TextureView)>,
    overlay: Option<LabelOverlay>,
}

impl<D: RenderDelegate> ViewerState<D> {
    /// `Ok(None)` means the GPU never came up and the caller should exit.
    fn new(
        event_loop: &ActiveEventLoop,
        config: &WindowConfig,
        init_data: D::InitData,
    ) -> Result<Option<Self>, WindowError> {
        let window_attributes = Window::default_attributes()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height));
        let window = Arc::new(event_loop.create_window(window_attributes)?);

        let Some(renderer) = retry_with_backoff(
            config.retry_policy(),
            "GPU initialization",
            Renderer::new_blocking,
            std::thread::sleep,
        ) else {
            return Ok(None);
        };

        let size = window.inner_size();
        let surface = renderer.instance().create_surface(window.clone())?;
        let surface = renderer.create_surface(surface, size.width.max(1), size.height.max(1))?;

        let mut registry = ResourceRegistry::new();
        let delegate = D::create(&renderer, &mut registry, surface.format(), init_data)
            .map_err(|e| WindowError::Delegate(e.to_string()))?;

        let bounds = delegate.bounds();
        let camera = Camera::framing(bounds);
        let projection = Projection::for_bounds(surface.width(), surface.height(), bounds);

        let depth = delegate.depth_format().map(|format| {
            create_depth_texture(renderer.device(), surface.width(), surface.height(), format)
        });
        let overlay = config
            .show_labels
            .then(|| LabelOverlay::new(&window, renderer.device(), surface.format()));

        Ok(Some(Self {
            window,
            renderer,
            surface,
            registry,
            delegate,
            camera,
            controller: OrbitController::new(),
            projection,
            depth,
            overlay,
        }))
    }

    fn handle_window_event(&mut self, event_loop: &ActiveEventLoop, event: &WindowEvent) -> bool {
        if let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    state: ElementState::Pressed,
                    physical_key: PhysicalKey::Code(KeyCode::Escape),
                    ..
                },
            ..
        } = event
        {
            event_loop.exit();
            return true;
        }

        if let Some(overlay) = self.overlay.as_mut() {
            if overlay.on_window_event(&self.window, event) {
                return true;
            }
        }
        if self.delegate.handle_window_event(event, Instant::now()) {
            return true;
        }
        self.controller.process_event(event, self.camera.pose_mut())
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if !self
            .surface
            .resize(self.renderer.device(), new_size.width, new_size.height)
        {
            return;
        }
        self.projection.update_size(new_size.width, new_size.height);

        if let Some(format) = self.delegate.depth_format() {
            self.depth = Some(create_depth_texture(
                self.renderer.device(),
                new_size.width,
                new_size.height,
                format,
            ));
        }
    }

    fn reframe(&mut self) {
        let bounds = self.delegate.bounds();
        self.camera = Camera::framing(bounds);
        self.projection.set_far(bounds.radius * 10.0);
        self.controller.reset();
        info!(
            "Scene bounds: center={:?}, radius={}",
            bounds.center, bounds.radius
        );
    }

    fn render(&mut self, now: Instant) -> Result<(), wgpu::SurfaceError> {
        match self.delegate.prepare(&self.renderer, &mut self.registry, now) {
            Ok(prepared) if prepared.reframe => self.reframe(),
            Ok(_) => {}
            Err(err) => warn!("Frame preparation failed, drawing previous state: {err}"),
        }

        let uniforms = CameraUniforms::from_matrices(
            self.camera.view_matrix(),
            self.projection.matrix(),
            self.camera.position(),
        );
        self.delegate
            .update(self.renderer.queue(), &self.registry, &uniforms);

        let surface_texture = self.surface.get_current_texture()?;
        let surface_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder =
            self.renderer
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Frame Encoder"),
                });

        let ctx = RenderContext {
            color_view: &surface_view,
            depth_view: self.depth.as_ref().map(|(_, view)| view),
        };
        self.delegate.render(&mut encoder, ctx, &self.registry);

        let mut command_buffers = Vec::new();
        if let Some(overlay) = self.overlay.as_mut() {
            let view_proj = self.projection.matrix() * self.camera.view_matrix();
            command_buffers = overlay.render(
                &self.window,
                self.renderer.device(),
                self.renderer.queue(),
                &mut encoder,
                &surface_view,
                &self.delegate.labels(),
                view_proj,
            );
        }
        command_buffers.push(encoder.finish());

        self.renderer.queue().submit(command_buffers);
        surface_texture.present();
        Ok(())
    }
}

fn create_depth_texture(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_config_defaults_match_retry_policy() {
        let config = WindowConfig::default();
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!((config.width, config.height), (1280, 720));
        assert!(config.show_labels);
    }

    #[test]
    fn test_window_config_from_partial_json() {
        let config: WindowConfig =
            serde_json::from_str(r#"{"title": "MNIST", "gpu_attempts": 2}"#).unwrap();
        assert_eq!(config.title, "MNIST");
        assert!(config.show_labels);
        assert_eq!(config.width, 1280);
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.backoff, Duration::from_millis(500));
    }
}
