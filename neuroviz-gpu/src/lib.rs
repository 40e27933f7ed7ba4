//! Neuroviz GPU Crate
//!
//! wgpu device ownership, handle-addressed resources, buffer and pipeline
//! builders, and the [`SceneRenderer`] that mirrors a neuroviz scene into
//! instanced draws.

pub mod bounds;
pub mod builder;
pub mod pipeline;
pub mod resource_registry;
pub mod retry;
pub mod scene_renderer;
pub mod shaders;
pub mod surface;
pub mod types;

pub use bounds::SceneBounds;
pub use builder::{BufferBuildError, BufferBuilder, BufferUsage};
pub use pipeline::{PipelineBuildError, RenderPipelineBuilder};
pub use resource_registry::{Handle, ResourceRegistry};
pub use retry::{RetryPolicy, retry_with_backoff};
pub use scene_renderer::{
    DEFAULT_NEURON_SIZE, DEPTH_FORMAT, MirrorState, SceneRenderer, SyncPlan, plan_sync,
};
pub use surface::SurfaceWrapper;
pub use types::{CameraUniforms, ConnectionInstance, NeuronColorInstance, NeuronPositionInstance};

pub use wgpu;

use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("Request Adapter Error: {0}")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),
    #[error("Request Device Error: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("Create surface error: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("Surface Error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("Surface is not supported by the adapter")]
    UnsupportedSurface,
    #[error("Missing GPU resource: {0}")]
    MissingResource(&'static str),
    #[error(transparent)]
    Buffer(#[from] BufferBuildError),
    #[error(transparent)]
    Pipeline(#[from] PipelineBuildError),
}

/// Owns the wgpu instance, adapter, device and queue.
pub struct Renderer {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl Renderer {
    pub async fn new() -> Result<Self, RendererError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                ..Default::default()
            })
            .await?;
        info!("Using adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Renderer"),
                ..Default::default()
            })
            .await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Blocking variant of [`Renderer::new`] for synchronous callers.
    pub fn new_blocking() -> Result<Self, RendererError> {
        pollster::block_on(Self::new())
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn create_buffer(&self) -> BufferBuilder<'_> {
        BufferBuilder::new(&self.device)
    }

    /// Configure `surface` for this device, preferring an sRGB format.
    pub fn create_surface(
        &self,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
    ) -> Result<SurfaceWrapper, RendererError> {
        let mut config = surface
            .get_default_config(&self.adapter, width.max(1), height.max(1))
            .ok_or(RendererError::UnsupportedSurface)?;

        let caps = surface.get_capabilities(&self.adapter);
        if let Some(format) = caps.formats.iter().copied().find(|f| f.is_srgb()) {
            config.format = format;
        }

        surface.configure(&self.device, &config);
        info!(
            "Configured surface {}x{} ({:?})",
            config.width, config.height, config.format
        );
        Ok(SurfaceWrapper::new(surface, config))
    }
}
