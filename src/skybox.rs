// skybox.rs — 天空盒：把立方体贴图作为环境背景绘制

use crate::cubemap::Cubemap;
use crate::mesh::{build_cube, GpuMesh, POSITION_LAYOUT};
use glam::Mat4;
use wgpu::util::DeviceExt;

/// Display-only flags. They never influence the bake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionUniforms {
    pub do_gamma: bool,
    pub vertically_flipped: bool,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SkyboxUniform {
    view_proj: [[f32; 4]; 4],
    do_gamma: i32,
    vflipped: i32,
    pad0: i32,
    pad1: i32,
}

struct Environment {
    cubemap: Cubemap,
    bind_group: wgpu::BindGroup,
}

pub struct SkyboxPresenter {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform: SkyboxUniform,
    uniform_buffer: wgpu::Buffer,
    cube: GpuMesh,
    environment: Option<Environment>,
}

impl SkyboxPresenter {
    pub fn new(device: &wgpu::Device, target_format: wgpu::TextureFormat, flags: ProjectionUniforms) -> Self {
        let mut uniform = SkyboxUniform {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            do_gamma: 0,
            vflipped: 0,
            pad0: 0,
            pad1: 0,
        };
        apply_flags(&mut uniform, flags);

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("skybox_uniform"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("skybox_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("skybox_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let shader = device.create_shader_module(wgpu::include_wgsl!("shaders/skybox.wgsl"));
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("skybox_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("skybox_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[POSITION_LAYOUT],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None, // 从内部观察立方体
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None, // 背景层，不写深度
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        Self {
            pipeline,
            bind_group_layout,
            sampler,
            uniform,
            uniform_buffer,
            cube: build_cube(0.5).upload(device, "skybox_cube"),
            environment: None,
        }
    }

    /// Makes `cubemap` the current environment and hands back the previous
    /// one, which the caller is expected to release.
    pub fn install(&mut self, device: &wgpu::Device, cubemap: Cubemap) -> Option<Cubemap> {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("skybox_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(cubemap.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        self.environment
            .replace(Environment { cubemap, bind_group })
            .map(|previous| previous.cubemap)
    }

    pub fn cubemap(&self) -> Option<&Cubemap> {
        self.environment.as_ref().map(|env| &env.cubemap)
    }

    pub fn set_flags(&mut self, queue: &wgpu::Queue, flags: ProjectionUniforms) {
        apply_flags(&mut self.uniform, flags);
        self.write_uniform(queue);
    }

    /// `view` must already have its translation stripped.
    pub fn update(&mut self, queue: &wgpu::Queue, projection: Mat4, view: Mat4) {
        self.uniform.view_proj = (projection * view).to_cols_array_2d();
        self.write_uniform(queue);
    }

    fn write_uniform(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }

    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        let Some(env) = &self.environment else {
            return;
        };
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &env.bind_group, &[]);
        pass.set_vertex_buffer(0, self.cube.vertex_buffer.slice(..));
        pass.set_index_buffer(self.cube.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.cube.index_count, 0, 0..1);
    }
}

fn apply_flags(uniform: &mut SkyboxUniform, flags: ProjectionUniforms) {
    uniform.do_gamma = flags.do_gamma as i32;
    uniform.vflipped = flags.vertically_flipped as i32;
}
