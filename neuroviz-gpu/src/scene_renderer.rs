//! GPU mirror of a neuroviz [`Scene`].
//!
//! Neuron batches become two instance buffers each: static positions that are
//! uploaded once, and colors that are rewritten in place whenever the batch
//! revision moves. Connection batches are recreated wholesale because the
//! scene replaces them on every full update.

use crate::bounds::SceneBounds;
use crate::builder::BufferUsage;
use crate::pipeline::RenderPipelineBuilder;
use crate::resource_registry::{Handle, ResourceRegistry};
use crate::types::{CameraUniforms, ConnectionInstance, NeuronColorInstance, NeuronPositionInstance};
use crate::{Renderer, RendererError, shaders};
use neuroviz_scene::{BatchId, ConnectionBatch, NeuronBatch, Scene};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Billboard half-extent of a neuron in world units.
pub const DEFAULT_NEURON_SIZE: f32 = 0.09;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.02,
    b: 0.025,
    a: 1.0,
};

/// What the GPU currently holds, by batch id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorState {
    /// Neuron batches and the color revision last uploaded.
    pub neurons: BTreeMap<BatchId, u64>,
    /// Visible connection batches.
    pub connections: BTreeSet<BatchId>,
}

/// Buffer work needed to bring the mirror in line with a scene.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub create_neurons: Vec<BatchId>,
    pub upload_colors: Vec<BatchId>,
    pub drop_neurons: Vec<BatchId>,
    pub create_connections: Vec<BatchId>,
    pub drop_connections: Vec<BatchId>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.create_neurons.is_empty()
            && self.upload_colors.is_empty()
            && self.drop_neurons.is_empty()
            && self.create_connections.is_empty()
            && self.drop_connections.is_empty()
    }
}

/// Diff the mirror against `scene`. A missing scene drops everything.
///
/// Newly created neuron batches carry their colors with them, so they never
/// appear in `upload_colors`. Hidden or empty batches of either kind count as
/// absent.
pub fn plan_sync(mirror: &MirrorState, scene: Option<&Scene>) -> SyncPlan {
    let mut plan = SyncPlan::default();
    let (neurons, connections): (&[NeuronBatch], &[ConnectionBatch]) = match scene {
        Some(scene) => (scene.neurons(), scene.connections()),
        None => (&[][..], &[][..]),
    };
    let neurons: Vec<&NeuronBatch> = neurons.iter().filter(|b| b.instance_count() > 0).collect();

    for batch in &neurons {
        match mirror.neurons.get(&batch.id()) {
            None => plan.create_neurons.push(batch.id()),
            Some(&revision) if revision != batch.revision() => plan.upload_colors.push(batch.id()),
            Some(_) => {}
        }
    }
    let live: BTreeSet<BatchId> = neurons.iter().map(|b| b.id()).collect();
    plan.drop_neurons = mirror
        .neurons
        .keys()
        .filter(|id| !live.contains(*id))
        .copied()
        .collect();

    let wanted: BTreeSet<BatchId> = connections
        .iter()
        .filter(|b| b.visible() && !b.is_empty())
        .map(ConnectionBatch::id)
        .collect();
    plan.create_connections = wanted.difference(&mirror.connections).copied().collect();
    plan.drop_connections = mirror.connections.difference(&wanted).copied().collect();

    plan
}

struct GpuNeuronBatch {
    positions: Handle<wgpu::Buffer>,
    colors: Handle<wgpu::Buffer>,
    count: u32,
}

struct GpuConnectionBatch {
    instances: Handle<wgpu::Buffer>,
    count: u32,
}

/// Owns the pipelines and buffers that draw a scene.
pub struct SceneRenderer {
    bounds: SceneBounds,
    neuron_size: f32,
    camera_buffer: Handle<wgpu::Buffer>,
    camera_bind_group: Handle<wgpu::BindGroup>,
    neuron_pipeline: Handle<wgpu::RenderPipeline>,
    connection_pipeline: Handle<wgpu::RenderPipeline>,
    mirror: MirrorState,
    neurons: BTreeMap<BatchId, GpuNeuronBatch>,
    connections: BTreeMap<BatchId, GpuConnectionBatch>,
}

impl SceneRenderer {
    pub fn new(
        renderer: &Renderer,
        registry: &mut ResourceRegistry,
        surface_format: wgpu::TextureFormat,
        neuron_size: f32,
    ) -> Result<Self, RendererError> {
        let device = renderer.device();

        let camera_buffer = renderer
            .create_buffer()
            .label("Camera Buffer")
            .with_pod_data(&[CameraUniforms::default()])
            .usage(BufferUsage::Uniform)
            .build(registry)?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<CameraUniforms>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let camera_bind_group = {
            let buffer = registry
                .get(camera_buffer)
                .ok_or(RendererError::MissingResource("camera buffer"))?;
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Camera Bind Group"),
                layout: &bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            })
        };
        let camera_bind_group = registry.insert(camera_bind_group);

        let neuron_shader = registry.insert(device.create_shader_module(
            wgpu::ShaderModuleDescriptor {
                label: Some("neuron"),
                source: wgpu::ShaderSource::Wgsl(shaders::NEURON.into()),
            },
        ));
        let connection_shader = registry.insert(device.create_shader_module(
            wgpu::ShaderModuleDescriptor {
                label: Some("connection"),
                source: wgpu::ShaderSource::Wgsl(shaders::CONNECTION.into()),
            },
        ));

        let pipeline_layout = |label: &str| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            })
        };

        let neuron_pipeline = RenderPipelineBuilder::new(device)
            .with_label("Neuron Pipeline")
            .with_shader(neuron_shader)
            .with_layout(pipeline_layout("Neuron Pipeline Layout"))
            .with_vertex_buffer(NeuronPositionInstance::desc())
            .with_vertex_buffer(NeuronColorInstance::desc())
            .with_topology(wgpu::PrimitiveTopology::TriangleList)
            .with_fragment_target(Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            }))
            .with_depth_stencil(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            })
            .build(registry)?;

        let connection_pipeline = RenderPipelineBuilder::new(device)
            .with_label("Connection Pipeline")
            .with_shader(connection_shader)
            .with_layout(pipeline_layout("Connection Pipeline Layout"))
            .with_vertex_buffer(ConnectionInstance::desc())
            .with_topology(wgpu::PrimitiveTopology::LineList)
            .with_fragment_target(Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            }))
            .with_depth_stencil(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            })
            .build(registry)?;

        Ok(Self {
            bounds: SceneBounds::default(),
            neuron_size,
            camera_buffer,
            camera_bind_group,
            neuron_pipeline,
            connection_pipeline,
            mirror: MirrorState::default(),
            neurons: BTreeMap::new(),
            connections: BTreeMap::new(),
        })
    }

    pub fn bounds(&self) -> &SceneBounds {
        &self.bounds
    }

    pub fn mirror(&self) -> &MirrorState {
        &self.mirror
    }

    /// Bring GPU buffers in line with `scene`. Returns whether anything changed.
    pub fn sync(
        &mut self,
        renderer: &Renderer,
        registry: &mut ResourceRegistry,
        scene: Option<&Scene>,
    ) -> Result<bool, RendererError> {
        let plan = plan_sync(&self.mirror, scene);
        if plan.is_empty() {
            return Ok(false);
        }

        for id in &plan.drop_neurons {
            if let Some(gpu) = self.neurons.remove(id) {
                destroy(registry, gpu.positions);
                destroy(registry, gpu.colors);
            }
            self.mirror.neurons.remove(id);
        }
        for id in &plan.drop_connections {
            if let Some(gpu) = self.connections.remove(id) {
                destroy(registry, gpu.instances);
            }
            self.mirror.connections.remove(id);
        }

        if let Some(scene) = scene {
            for batch in scene.neurons() {
                if plan.create_neurons.contains(&batch.id()) {
                    let gpu = self.create_neuron_batch(renderer, registry, batch)?;
                    self.neurons.insert(batch.id(), gpu);
                    self.mirror.neurons.insert(batch.id(), batch.revision());
                } else if plan.upload_colors.contains(&batch.id()) {
                    self.upload_colors(renderer.queue(), registry, batch)?;
                    self.mirror.neurons.insert(batch.id(), batch.revision());
                }
            }
            for batch in scene.connections() {
                if plan.create_connections.contains(&batch.id()) {
                    let gpu = create_connection_batch(renderer, registry, batch)?;
                    self.connections.insert(batch.id(), gpu);
                    self.mirror.connections.insert(batch.id());
                }
            }
            if !plan.create_neurons.is_empty() {
                self.bounds = SceneBounds::from_positions(
                    scene
                        .neurons()
                        .iter()
                        .flat_map(|b| b.positions().iter().copied()),
                );
                info!(
                    "Scene bounds: center={:?}, radius={}",
                    self.bounds.center, self.bounds.radius
                );
            }
        }

        debug!(
            "Synced scene: +{} neuron batches, {} recolored, -{} neuron batches, +{}/-{} connection batches",
            plan.create_neurons.len(),
            plan.upload_colors.len(),
            plan.drop_neurons.len(),
            plan.create_connections.len(),
            plan.drop_connections.len()
        );
        Ok(true)
    }

    fn create_neuron_batch(
        &self,
        renderer: &Renderer,
        registry: &mut ResourceRegistry,
        batch: &NeuronBatch,
    ) -> Result<GpuNeuronBatch, RendererError> {
        let positions: Vec<NeuronPositionInstance> = batch
            .positions()
            .iter()
            .map(|p| NeuronPositionInstance::new(*p, self.neuron_size))
            .collect();
        let colors: Vec<NeuronColorInstance> =
            batch.colors().iter().copied().map(Into::into).collect();

        let positions_handle = renderer
            .create_buffer()
            .label(format!("{} positions", batch.name()))
            .with_pod_data(&positions)
            .usage(BufferUsage::Instance { dynamic: false })
            .build(registry)?;
        let colors_handle = renderer
            .create_buffer()
            .label(format!("{} colors", batch.name()))
            .with_pod_data(&colors)
            .usage(BufferUsage::Instance { dynamic: true })
            .build(registry)?;

        Ok(GpuNeuronBatch {
            positions: positions_handle,
            colors: colors_handle,
            count: batch.instance_count() as u32,
        })
    }

    fn upload_colors(
        &self,
        queue: &wgpu::Queue,
        registry: &ResourceRegistry,
        batch: &NeuronBatch,
    ) -> Result<(), RendererError> {
        let buffer = self
            .neurons
            .get(&batch.id())
            .and_then(|gpu| registry.get(gpu.colors))
            .ok_or(RendererError::MissingResource("neuron color buffer"))?;
        let colors: Vec<NeuronColorInstance> =
            batch.colors().iter().copied().map(Into::into).collect();
        queue.write_buffer(buffer, 0, bytemuck::cast_slice(&colors));
        Ok(())
    }

    /// Upload the camera for the next frame.
    pub fn update_camera(
        &self,
        queue: &wgpu::Queue,
        registry: &ResourceRegistry,
        camera: &CameraUniforms,
    ) {
        if let Some(buffer) = registry.get(self.camera_buffer) {
            queue.write_buffer(buffer, 0, bytemuck::bytes_of(camera));
        }
    }

    /// Record one pass: clear, neurons, then blended connections on top.
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        color_view: &wgpu::TextureView,
        depth_view: Option<&wgpu::TextureView>,
        registry: &ResourceRegistry,
    ) {
        let depth_stencil_attachment =
            depth_view.map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let Some(bind_group) = registry.get(self.camera_bind_group) else {
            return;
        };
        render_pass.set_bind_group(0, bind_group, &[]);

        if let Some(pipeline) = registry.get(self.neuron_pipeline) {
            render_pass.set_pipeline(pipeline);
            for gpu in self.neurons.values() {
                let (Some(positions), Some(colors)) =
                    (registry.get(gpu.positions), registry.get(gpu.colors))
                else {
                    continue;
                };
                render_pass.set_vertex_buffer(0, positions.slice(..));
                render_pass.set_vertex_buffer(1, colors.slice(..));
                // 6 vertices per neuron (two triangles)
                render_pass.draw(0..6, 0..gpu.count);
            }
        }

        if let Some(pipeline) = registry.get(self.connection_pipeline) {
            render_pass.set_pipeline(pipeline);
            for gpu in self.connections.values() {
                let Some(instances) = registry.get(gpu.instances) else {
                    continue;
                };
                render_pass.set_vertex_buffer(0, instances.slice(..));
                render_pass.draw(0..2, 0..gpu.count);
            }
        }
    }

    /// Destroy every mirrored buffer. The pipelines stay.
    pub fn clear(&mut self, registry: &mut ResourceRegistry) {
        for (_, gpu) in std::mem::take(&mut self.neurons) {
            destroy(registry, gpu.positions);
            destroy(registry, gpu.colors);
        }
        for (_, gpu) in std::mem::take(&mut self.connections) {
            destroy(registry, gpu.instances);
        }
        self.mirror = MirrorState::default();
    }
}

fn create_connection_batch(
    renderer: &Renderer,
    registry: &mut ResourceRegistry,
    batch: &ConnectionBatch,
) -> Result<GpuConnectionBatch, RendererError> {
    let instances: Vec<ConnectionInstance> = batch
        .segments()
        .iter()
        .map(|s| ConnectionInstance::new(s.start, s.end, s.color))
        .collect();
    let handle = renderer
        .create_buffer()
        .label(format!(
            "connections {}->{}",
            batch.source_layer(),
            batch.target_layer()
        ))
        .with_pod_data(&instances)
        .usage(BufferUsage::Instance { dynamic: false })
        .build(registry)?;
    Ok(GpuConnectionBatch {
        instances: handle,
        count: instances.len() as u32,
    })
}

fn destroy(registry: &mut ResourceRegistry, handle: Handle<wgpu::Buffer>) {
    if let Some(buffer) = registry.remove(handle) {
        buffer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};
    use neuroviz_data::{Layer, LayerKind, LayerShape, PixelGrid};
    use neuroviz_scene::{Label, SceneBuilder};

    fn layers(scale: f32) -> Vec<Layer> {
        vec![
            Layer::input("input", &PixelGrid::new(4, 4, vec![scale; 16])),
            Layer::new("dense1", LayerShape::Dense { units: 8 }, vec![0.5 * scale; 8]),
            Layer::new(
                "output",
                LayerShape::Output { classes: 3 },
                vec![0.1 * scale, 0.9 * scale, 0.2 * scale],
            ),
        ]
    }

    fn built(scale: f32) -> SceneBuilder {
        let mut builder = SceneBuilder::default();
        let layers = layers(scale);
        builder.build_neurons(&layers);
        builder.replace_connections(&layers);
        builder.apply_colors(&layers);
        builder
    }

    /// Pretend the plan was carried out against `scene`.
    fn applied(scene: &Scene) -> MirrorState {
        MirrorState {
            neurons: scene
                .neurons()
                .iter()
                .filter(|b| b.instance_count() > 0)
                .map(|b| (b.id(), b.revision()))
                .collect(),
            connections: scene
                .connections()
                .iter()
                .filter(|b| b.visible() && !b.is_empty())
                .map(|b| b.id())
                .collect(),
        }
    }

    #[test]
    fn test_first_sync_creates_everything() {
        let builder = built(1.0);
        let scene = builder.scene().unwrap();
        let plan = plan_sync(&MirrorState::default(), Some(scene));
        assert_eq!(plan.create_neurons.len(), 3);
        assert!(plan.upload_colors.is_empty());
        assert_eq!(plan.create_connections.len(), 2);
        assert!(plan.drop_neurons.is_empty());
        assert!(plan.drop_connections.is_empty());
    }

    #[test]
    fn test_unchanged_scene_is_a_no_op() {
        let builder = built(1.0);
        let scene = builder.scene().unwrap();
        assert!(plan_sync(&applied(scene), Some(scene)).is_empty());
    }

    #[test]
    fn test_full_update_reuploads_colors_and_swaps_connections() {
        let mut builder = built(1.0);
        let mirror = applied(builder.scene().unwrap());

        let next = layers(0.5);
        builder.replace_connections(&next);
        builder.apply_colors(&next);

        let plan = plan_sync(&mirror, builder.scene());
        assert!(plan.create_neurons.is_empty());
        assert_eq!(plan.upload_colors.len(), 3);
        assert_eq!(plan.create_connections.len(), 2);
        assert_eq!(plan.drop_connections.len(), 2);
        assert!(plan
            .drop_connections
            .iter()
            .all(|id| mirror.connections.contains(id)));
    }

    #[test]
    fn test_partial_update_touches_only_input_colors() {
        let mut builder = built(1.0);
        let mirror = applied(builder.scene().unwrap());
        let input_id = builder.scene().unwrap().neurons()[0].id();

        let mut grid = PixelGrid::blank(4, 4);
        grid.set(1, 2, 1.0);
        assert!(builder.recolor_input(&grid));

        let plan = plan_sync(&mirror, builder.scene());
        assert_eq!(plan.upload_colors, vec![input_id]);
        assert!(plan.create_connections.is_empty());
        assert!(plan.drop_connections.is_empty());
    }

    #[test]
    fn test_reset_hides_connections() {
        let mut builder = built(1.0);
        let mirror = applied(builder.scene().unwrap());
        builder.reset_to_empty_colors();

        let plan = plan_sync(&mirror, builder.scene());
        assert_eq!(plan.drop_connections.len(), 2);
        assert!(plan.create_connections.is_empty());
        assert_eq!(plan.upload_colors.len(), 3);
    }

    #[test]
    fn test_empty_neuron_batch_is_never_created() {
        let label = |index: usize| Label {
            layer_index: index,
            text: String::new(),
            anchor: Vec3::ZERO,
        };
        let batch = |index: usize, name: &str, count: usize| {
            NeuronBatch::new(
                index,
                name.to_string(),
                LayerKind::Dense,
                vec![Vec3::new(index as f32, 0.0, 0.0); count],
                Vec4::ONE,
                label(index),
            )
        };
        let scene = Scene::new(
            vec![batch(0, "input", 4), batch(1, "dense1", 0), batch(2, "output", 2)],
            Vec::new(),
        );
        let empty_id = scene.neurons()[1].id();

        let plan = plan_sync(&MirrorState::default(), Some(&scene));
        assert_eq!(plan.create_neurons.len(), 2);
        assert!(!plan.create_neurons.contains(&empty_id));
        assert!(plan_sync(&applied(&scene), Some(&scene)).is_empty());
    }

    #[test]
    fn test_dispose_drops_everything() {
        let mut builder = built(1.0);
        let mirror = applied(builder.scene().unwrap());
        builder.dispose();

        let plan = plan_sync(&mirror, builder.scene());
        assert_eq!(plan.drop_neurons.len(), 3);
        assert_eq!(plan.drop_connections.len(), 2);
        assert!(plan.create_neurons.is_empty());
    }
}
