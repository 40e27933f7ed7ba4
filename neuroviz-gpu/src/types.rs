use glam::{Mat4, Vec3, Vec4};

/// Shared camera uniform layout between host and shader.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug)]
pub struct CameraUniforms {
    pub view_matrix: [[f32; 4]; 4],
    pub proj_matrix: [[f32; 4]; 4],
    pub view_pos: [f32; 3],
    pub _padding: f32,
}

impl CameraUniforms {
    pub fn from_matrices(view: Mat4, proj: Mat4, eye: Vec3) -> Self {
        Self {
            view_matrix: view.to_cols_array_2d(),
            proj_matrix: proj.to_cols_array_2d(),
            view_pos: [eye.x, eye.y, eye.z],
            _padding: 0.0,
        }
    }
}

impl Default for CameraUniforms {
    fn default() -> Self {
        Self::from_matrices(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO)
    }
}

/// Static per-neuron data: xyz center and billboard size in w.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct NeuronPositionInstance {
    pub position_size: [f32; 4],
}

impl NeuronPositionInstance {
    const ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x4];

    pub fn new(position: Vec3, size: f32) -> Self {
        Self {
            position_size: position.extend(size).to_array(),
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Per-neuron RGBA, rewritten whenever the batch revision changes.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct NeuronColorInstance {
    pub color: [f32; 4],
}

impl NeuronColorInstance {
    const ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x4];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

impl From<Vec4> for NeuronColorInstance {
    fn from(color: Vec4) -> Self {
        Self {
            color: color.to_array(),
        }
    }
}

/// One line segment between two neurons. `w` of both endpoints is unused.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct ConnectionInstance {
    pub start: [f32; 4],
    pub end: [f32; 4],
    pub color: [f32; 4],
}

impl ConnectionInstance {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4, 2 => Float32x4];

    pub fn new(start: Vec3, end: Vec3, color: Vec4) -> Self {
        Self {
            start: start.extend(1.0).to_array(),
            end: end.extend(1.0).to_array(),
            color: color.to_array(),
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_uniforms_size() {
        // Two mat4x4 plus a vec3 padded to 16 bytes.
        assert_eq!(std::mem::size_of::<CameraUniforms>(), 144);
    }

    #[test]
    fn test_instance_strides_match_layouts() {
        assert_eq!(NeuronPositionInstance::desc().array_stride, 16);
        assert_eq!(NeuronColorInstance::desc().array_stride, 16);
        let connection = ConnectionInstance::desc();
        assert_eq!(connection.array_stride, 48);
        assert_eq!(connection.attributes.len(), 3);
        assert_eq!(connection.attributes[2].offset, 32);
        assert_eq!(connection.step_mode, wgpu::VertexStepMode::Instance);
    }

    #[test]
    fn test_neuron_shader_locations_do_not_overlap() {
        assert_eq!(NeuronPositionInstance::desc().attributes[0].shader_location, 0);
        assert_eq!(NeuronColorInstance::desc().attributes[0].shader_location, 1);
    }

    #[test]
    fn test_instance_packing() {
        let p = NeuronPositionInstance::new(Vec3::new(1.0, 2.0, 3.0), 0.5);
        assert_eq!(p.position_size, [1.0, 2.0, 3.0, 0.5]);
        let c = NeuronColorInstance::from(Vec4::new(0.1, 0.2, 0.3, 1.0));
        assert_eq!(c.color, [0.1, 0.2, 0.3, 1.0]);
        let e = ConnectionInstance::new(Vec3::ZERO, Vec3::X, Vec4::ONE);
        assert_eq!(e.end, [1.0, 0.0, 0.0, 1.0]);
    }
}
