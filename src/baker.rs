// baker.rs — 全景图 -> 立方体贴图的离屏烘焙（六次渲染）
//
// 每个面：绑定该面的视图矩阵，把立方体纹理对应的层作为颜色附件，
// 清屏后从内部绘制单位立方体。剔除和深度写入只在烘焙管线里关闭，
// 不会影响其它渲染流程。

use crate::cubemap::{face_projection, CubeFace, Cubemap, PixelFormat, CUBE_FACE_COUNT};
use crate::error::{Result, ViewError};
use crate::mesh::{build_cube, GpuMesh, POSITION_LAYOUT};
use crate::panorama::PanoramaTexture;
use crate::projector;
use std::time::Instant;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct FaceUniform {
    projection: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
}

/// Captures device errors raised while it is alive. The scopes are popped on
/// every exit path: explicitly through `finish`, otherwise on drop.
struct ErrorScope<'a> {
    device: &'a wgpu::Device,
    active: bool,
}

impl<'a> ErrorScope<'a> {
    fn push(device: &'a wgpu::Device) -> Self {
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        Self {
            device,
            active: true,
        }
    }

    fn pop(&mut self) -> Option<wgpu::Error> {
        self.active = false;
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        validation.or(out_of_memory)
    }

    fn finish(mut self) -> Option<wgpu::Error> {
        self.pop()
    }
}

impl Drop for ErrorScope<'_> {
    fn drop(&mut self) {
        if self.active {
            if let Some(err) = self.pop() {
                log::warn!("discarding GPU error from abandoned bake: {}", err);
            }
        }
    }
}

/// Depth attachment of a single bake. The color attachment is rebound to each
/// cube face in turn; this target is dropped as soon as the passes are submitted.
struct BakeTarget {
    _depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

impl BakeTarget {
    fn new(device: &wgpu::Device, edge_length: u32) -> Self {
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("bake_depth"),
            size: wgpu::Extent3d {
                width: edge_length,
                height: edge_length,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _depth: depth,
            depth_view,
        }
    }
}

pub struct CubemapBaker {
    pipeline_rgba8: wgpu::RenderPipeline,
    pipeline_rgba16f: wgpu::RenderPipeline,
    face_layout: wgpu::BindGroupLayout,
    source_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    cube: GpuMesh,
    uniform_stride: u64,
}

impl CubemapBaker {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_size = std::mem::size_of::<FaceUniform>() as u64;
        let face_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bake_face_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(uniform_size),
                },
                count: None,
            }],
        });

        let source_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bake_source_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let shader = projector::shader_module(device);
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("bake_pipeline_layout"),
            bind_group_layouts: &[&face_layout, &source_layout],
            push_constant_ranges: &[],
        });

        let pipeline_rgba8 = create_pipeline(device, &layout, &shader, PixelFormat::Rgba8);
        let pipeline_rgba16f = create_pipeline(device, &layout, &shader, PixelFormat::Rgba16Float);

        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let uniform_stride = (uniform_size + alignment - 1) / alignment * alignment;

        Self {
            pipeline_rgba8,
            pipeline_rgba16f,
            face_layout,
            source_layout,
            sampler: projector::create_sampler(device),
            cube: build_cube(0.5).upload(device, "bake_cube"),
            uniform_stride,
        }
    }

    fn pipeline(&self, format: PixelFormat) -> &wgpu::RenderPipeline {
        match format {
            PixelFormat::Rgba8 => &self.pipeline_rgba8,
            PixelFormat::Rgba16Float => &self.pipeline_rgba16f,
        }
    }

    /// Renders `panorama` into a new `edge_length`² cubemap of `format`.
    ///
    /// The returned cubemap belongs to the caller; the baker keeps nothing.
    /// Any device error during the bake aborts it with `RenderTarget`.
    pub fn bake(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        panorama: &PanoramaTexture,
        edge_length: u32,
        format: PixelFormat,
    ) -> Result<Cubemap> {
        let (src_w, src_h) = panorama.dimensions();
        if src_w == 0 || src_h == 0 {
            return Err(ViewError::InvalidInput(format!("panorama is {}x{}", src_w, src_h)));
        }
        if edge_length == 0 {
            return Err(ViewError::InvalidInput("cubemap edge length must be positive".into()));
        }
        let max_dimension = device.limits().max_texture_dimension_2d;
        if edge_length > max_dimension {
            return Err(ViewError::RenderTarget(format!(
                "edge length {} exceeds the device limit {}",
                edge_length, max_dimension
            )));
        }

        let started = Instant::now();
        let scope = ErrorScope::push(device);

        let target = BakeTarget::new(device, edge_length);
        let cubemap = Cubemap::allocate(
            device,
            edge_length,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            "baked_cubemap",
        );

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("bake_face_uniforms"),
            size: self.uniform_stride * CUBE_FACE_COUNT as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let projection = face_projection().to_cols_array_2d();
        for face in CubeFace::ALL {
            let uniform = FaceUniform {
                projection,
                view: face.view_matrix().to_cols_array_2d(),
            };
            queue.write_buffer(
                &uniform_buffer,
                self.uniform_stride * face.layer() as u64,
                bytemuck::bytes_of(&uniform),
            );
        }

        let face_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bake_face_bind_group"),
            layout: &self.face_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<FaceUniform>() as u64),
                }),
            }],
        });
        let source_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bake_source_bind_group"),
            layout: &self.source_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(panorama.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("bake_encoder"),
        });

        for face in CubeFace::ALL {
            let face_view = cubemap.face_view(face);
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("bake_face_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &face_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: false,
                    }),
                    stencil_ops: None,
                }),
            });

            pass.set_viewport(0.0, 0.0, edge_length as f32, edge_length as f32, 0.0, 1.0);
            pass.set_pipeline(self.pipeline(format));
            let offset = (self.uniform_stride * face.layer() as u64) as wgpu::DynamicOffset;
            pass.set_bind_group(0, &face_bind_group, &[offset]);
            pass.set_bind_group(1, &source_bind_group, &[]);
            pass.set_vertex_buffer(0, self.cube.vertex_buffer.slice(..));
            pass.set_index_buffer(self.cube.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..self.cube.index_count, 0, 0..1);
        }

        queue.submit(std::iter::once(encoder.finish()));
        drop(target);

        if let Some(err) = scope.finish() {
            return Err(ViewError::RenderTarget(err.to_string()));
        }

        log::info!(
            "baked {}x{} panorama into {}² {:?} cubemap in {:.1} ms",
            src_w,
            src_h,
            edge_length,
            format,
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(cubemap)
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: PixelFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("bake_pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[POSITION_LAYOUT],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format: format.texture_format(),
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None, // 相机位于立方体内部
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}
