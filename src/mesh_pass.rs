//! Forward mesh pass of the GPU backend.
//!
//! [`MeshPass`] owns the pipeline and is built once per device. Each surface
//! gets its own [`MeshFrame`]: uniform buffers, the bind group and the mesh
//! buffers, so concurrent renders never share writable GPU state.
//!
//! # Bind group layout
//!
//! | Binding | Uniform            | Stages           |
//! |---------|--------------------|------------------|
//! | 0       | [`CameraUniforms`] | vertex, fragment |
//! | 1       | [`ModelUniforms`]  | vertex, fragment |
//! | 2       | [`LightUniforms`]  | fragment         |

use crate::color::Color;
use crate::mesh::{MeshData, Vertex3d};
use crate::scene::Scene;

/// Color format of the offscreen target. Shader output is linear and
/// encoded to sRGB on store.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    pub _pad: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub color: [f32; 4],
}

/// Packed lighting state.
///
/// `params` holds `[lit, spot enabled, cos(outer cone), cos(inner cone)]`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniforms {
    pub ambient: [f32; 4],
    pub spot_position: [f32; 4],
    pub spot_direction: [f32; 4],
    pub spot_radiance: [f32; 4],
    pub params: [f32; 4],
}

impl CameraUniforms {
    pub fn from_scene(scene: &Scene) -> Self {
        Self {
            view_proj: scene.camera.view_projection().to_cols_array_2d(),
            camera_pos: scene.camera.position.to_array(),
            _pad: 0.0,
        }
    }
}

impl ModelUniforms {
    pub fn from_scene(scene: &Scene) -> Self {
        Self {
            model: scene.transform.matrix().to_cols_array_2d(),
            normal_matrix: scene.transform.normal_matrix().to_cols_array_2d(),
            color: scene.material.color.to_array(),
        }
    }
}

impl LightUniforms {
    pub fn from_scene(scene: &Scene) -> Self {
        let ambient = scene
            .ambient_light
            .map_or(Color::BLACK, |light| light.radiance());
        let lit = if scene.material.lit { 1.0 } else { 0.0 };

        match scene.spot_light {
            Some(spot) => {
                let (outer, inner) = spot.cone_cosines();
                let radiance = spot.radiance();
                Self {
                    ambient: [ambient.r, ambient.g, ambient.b, 1.0],
                    spot_position: spot.position.extend(1.0).to_array(),
                    spot_direction: spot.direction().extend(0.0).to_array(),
                    spot_radiance: [radiance.r, radiance.g, radiance.b, 1.0],
                    params: [lit, 1.0, outer, inner],
                }
            }
            None => Self {
                ambient: [ambient.r, ambient.g, ambient.b, 1.0],
                spot_position: [0.0; 4],
                spot_direction: [0.0; 4],
                spot_radiance: [0.0; 4],
                params: [lit, 0.0, 1.0, 1.0],
            },
        }
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_buffer<T>(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<T>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Pipeline and layout shared by every surface of a device.
pub struct MeshPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl MeshPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
        });

        let both = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mesh Bind Group Layout"),
            entries: &[
                uniform_entry(0, both),
                uniform_entry(1, both),
                uniform_entry(2, wgpu::ShaderStages::FRAGMENT),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Mesh Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[Vertex3d::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                front_face: wgpu::FrontFace::Ccw,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            bind_group_layout,
        }
    }

    /// Allocates the per-surface buffers and uploads `mesh`.
    pub fn create_frame(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mesh: &MeshData,
    ) -> MeshFrame {
        let camera_buffer = uniform_buffer::<CameraUniforms>(device, "Camera Uniforms");
        let model_buffer = uniform_buffer::<ModelUniforms>(device, "Model Uniforms");
        let light_buffer = uniform_buffer::<LightUniforms>(device, "Light Uniforms");

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mesh Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: model_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: light_buffer.as_entire_binding(),
                },
            ],
        });

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Mesh Vertex Buffer"),
            size: vertex_bytes.len() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&vertex_buffer, 0, vertex_bytes);

        let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);
        let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Mesh Index Buffer"),
            size: index_bytes.len() as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&index_buffer, 0, index_bytes);

        MeshFrame {
            camera_buffer,
            model_buffer,
            light_buffer,
            bind_group,
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        }
    }

    /// Records one cleared, depth-tested pass drawing the scene's mesh.
    pub fn draw(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        frame: &MeshFrame,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        scene: &Scene,
    ) {
        queue.write_buffer(
            &frame.camera_buffer,
            0,
            bytemuck::cast_slice(&[CameraUniforms::from_scene(scene)]),
        );
        queue.write_buffer(
            &frame.model_buffer,
            0,
            bytemuck::cast_slice(&[ModelUniforms::from_scene(scene)]),
        );
        queue.write_buffer(
            &frame.light_buffer,
            0,
            bytemuck::cast_slice(&[LightUniforms::from_scene(scene)]),
        );

        let clear = scene.clear_color;
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Mesh Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: clear.r as f64,
                        g: clear.g as f64,
                        b: clear.b as f64,
                        a: clear.a as f64,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &frame.bind_group, &[]);
        render_pass.set_vertex_buffer(0, frame.vertex_buffer.slice(..));
        render_pass.set_index_buffer(frame.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..frame.index_count, 0, 0..1);
    }
}

/// GPU resources of one surface.
pub struct MeshFrame {
    camera_buffer: wgpu::Buffer,
    model_buffer: wgpu::Buffer,
    light_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl MeshFrame {
    pub fn destroy(&self) {
        self.camera_buffer.destroy();
        self.model_buffer.destroy();
        self.light_buffer.destroy();
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
    }
}
