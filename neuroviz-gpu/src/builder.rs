//! High-level builder APIs for creating GPU buffers
//!
//! These builders provide a simpler, more ergonomic API compared to
//! directly using wgpu descriptors.

use crate::resource_registry::{Handle, ResourceRegistry};

/// Buffer usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer
    Vertex,
    /// Per-instance vertex data. Dynamic buffers accept `Queue::write_buffer`.
    Instance { dynamic: bool },
    /// Uniform buffer
    Uniform,
}

impl BufferUsage {
    pub(crate) fn to_wgpu(self) -> wgpu::BufferUsages {
        match self {
            BufferUsage::Vertex | BufferUsage::Instance { dynamic: false } => {
                wgpu::BufferUsages::VERTEX
            }
            BufferUsage::Instance { dynamic: true } => {
                wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST
            }
            BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        }
    }
}

/// Builder for creating GPU buffers
pub struct BufferBuilder<'a> {
    device: &'a wgpu::Device,
    label: Option<String>,
    data: &'a [u8],
    usage: BufferUsage,
}

impl<'a> BufferBuilder<'a> {
    pub(crate) fn new(device: &'a wgpu::Device) -> Self {
        Self {
            device,
            label: None,
            data: &[],
            usage: BufferUsage::Vertex,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set buffer data from a slice of Pod types
    pub fn with_pod_data<T: bytemuck::Pod>(mut self, data: &'a [T]) -> Self {
        self.data = bytemuck::cast_slice(data);
        self
    }

    pub fn usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Build the buffer and register it in the registry
    pub fn build(
        self,
        registry: &mut ResourceRegistry,
    ) -> Result<Handle<wgpu::Buffer>, BufferBuildError> {
        use wgpu::util::DeviceExt;

        if self.data.is_empty() {
            return Err(BufferBuildError::Empty);
        }
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: self.label.as_deref(),
            contents: self.data,
            usage: self.usage.to_wgpu(),
        });

        Ok(registry.insert(buffer))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BufferBuildError {
    #[error("Buffer would be zero-sized")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_conversion() {
        assert_eq!(BufferUsage::Vertex.to_wgpu(), wgpu::BufferUsages::VERTEX);
        assert_eq!(
            BufferUsage::Instance { dynamic: false }.to_wgpu(),
            wgpu::BufferUsages::VERTEX
        );
        let dynamic = BufferUsage::Instance { dynamic: true }.to_wgpu();
        assert!(dynamic.contains(wgpu::BufferUsages::VERTEX));
        assert!(dynamic.contains(wgpu::BufferUsages::COPY_DST));
        assert!(BufferUsage::Uniform.to_wgpu().contains(wgpu::BufferUsages::UNIFORM));
        assert!(BufferUsage::Uniform.to_wgpu().contains(wgpu::BufferUsages::COPY_DST));
    }
}
