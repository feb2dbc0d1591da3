use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use nalgebra::Matrix4;
use wgpu::util::DeviceExt;

use super::{RenderCtx, RenderTarget};

/// Placeholder mesh renderer: one vertex-coloured cube.
///
/// Pipelines are created lazily per target format, since stream render targets
/// and window swap chains rarely share one. The mesh itself is the render
/// payload and is uploaded once by [`MeshRenderer::load_mesh`]; until then
/// [`MeshRenderer::draw`] only clears the target.
pub struct MeshRenderer {
    shader: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
    mesh: Option<MeshBuffers>,
}

struct MeshBuffers {
    vbo: wgpu::Buffer,
    ibo: wgpu::Buffer,
    index_count: u32,
}

/// Per-stream transform uniform and its bind group.
pub struct TransformBinding {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl TransformBinding {
    pub fn write(&self, queue: &wgpu::Queue, transform: &Matrix4<f32>) {
        let u = TransformUniform {
            mvp: (*transform).into(),
        };
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(&u));
    }
}

impl MeshRenderer {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("relay mesh shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("relay mesh bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<TransformUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("relay mesh pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        Self {
            shader,
            bind_group_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            mesh: None,
        }
    }

    /// Uploads the cube. Calling it again is a no-op.
    pub fn load_mesh(&mut self, device: &wgpu::Device) {
        if self.mesh.is_some() {
            return;
        }

        let vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("relay mesh vbo"),
            contents: bytemuck::cast_slice(&CUBE_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let ibo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("relay mesh ibo"),
            contents: bytemuck::cast_slice(&CUBE_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        self.mesh = Some(MeshBuffers {
            vbo,
            ibo,
            index_count: CUBE_INDICES.len() as u32,
        });
        log::debug!("placeholder mesh loaded");
    }

    /// Creates a transform uniform bound to this renderer's layout.
    pub fn create_binding(&self, device: &wgpu::Device, label: &str) -> TransformBinding {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<TransformUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        TransformBinding { buffer, bind_group }
    }

    /// Clears `target` and draws the mesh with `binding`'s transform.
    pub fn draw(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        binding: &TransformBinding,
        clear: wgpu::Color,
    ) {
        self.ensure_pipeline(ctx);

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("relay mesh pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let Some(mesh) = self.mesh.as_ref() else { return };
        let Some(pipeline) = self.pipelines.get(&ctx.format) else { return };

        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, &binding.bind_group, &[]);
        rpass.set_vertex_buffer(0, mesh.vbo.slice(..));
        rpass.set_index_buffer(mesh.ibo.slice(..), wgpu::IndexFormat::Uint16);
        rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
    }

    fn ensure_pipeline(&mut self, ctx: &RenderCtx<'_>) {
        if self.pipelines.contains_key(&ctx.format) {
            return;
        }

        let pipeline = ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("relay mesh pipeline"),
            layout: Some(&self.pipeline_layout),

            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[MeshVertex::layout()],
            },

            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            // The cube is convex: back-face culling alone resolves visibility.
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!("created mesh pipeline for {:?}", ctx.format);
        self.pipelines.insert(ctx.format, pipeline);
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct TransformUniform {
    mvp: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct MeshVertex {
    pos: [f32; 3],
    color: [f32; 3],
}

impl MeshVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3, // pos
        1 => Float32x3  // color
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

const fn v(pos: [f32; 3], color: [f32; 3]) -> MeshVertex {
    MeshVertex { pos, color }
}

const CUBE_VERTICES: [MeshVertex; 8] = [
    v([-1.0, -1.0, -1.0], [0.0, 0.0, 0.0]),
    v([1.0, -1.0, -1.0], [1.0, 0.0, 0.0]),
    v([1.0, 1.0, -1.0], [1.0, 1.0, 0.0]),
    v([-1.0, 1.0, -1.0], [0.0, 1.0, 0.0]),
    v([-1.0, -1.0, 1.0], [0.0, 0.0, 1.0]),
    v([1.0, -1.0, 1.0], [1.0, 0.0, 1.0]),
    v([1.0, 1.0, 1.0], [1.0, 1.0, 1.0]),
    v([-1.0, 1.0, 1.0], [0.0, 1.0, 1.0]),
];

// Counter-clockwise seen from outside each face.
const CUBE_INDICES: [u16; 36] = [
    4, 5, 6, 4, 6, 7, // +Z
    1, 0, 3, 1, 3, 2, // -Z
    5, 1, 2, 5, 2, 6, // +X
    0, 4, 7, 0, 7, 3, // -X
    7, 6, 2, 7, 2, 3, // +Y
    0, 1, 5, 0, 5, 4, // -Y
];

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn every_face_winds_outward() {
        for tri in CUBE_INDICES.chunks_exact(3) {
            let p = |i: u16| Vector3::from(CUBE_VERTICES[i as usize].pos);
            let (a, b, c) = (p(tri[0]), p(tri[1]), p(tri[2]));
            let normal = (b - a).cross(&(c - a));
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(&centroid) > 0.0, "triangle {tri:?} faces inward");
        }
    }

    #[test]
    fn uniform_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<TransformUniform>(), 64);
        assert_eq!(std::mem::size_of::<MeshVertex>(), 24);
    }
}
