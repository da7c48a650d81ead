// test_support.rs — 测试用的无窗口 GPU 设备与立方体面回读
//
// 立方体纹理的单层不能直接拷贝到缓冲区（GL 后端下是 GL_TEXTURE_CUBE_MAP，
// 读回全是 0），所以回读时先通过 cube 视图采样到一张 2D 纹理，再拷贝这张 2D 纹理。

use crate::cubemap::{CubeFace, Cubemap};
use wgpu::util::DeviceExt;

/// Headless device, or `None` (test skipped) on machines without an adapter.
pub fn test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let Some(adapter) = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
        else {
            eprintln!("no GPU adapter available, skipping");
            return None;
        };

        adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("test_device"),
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .ok()
    })
}

// 方向公式与 CubeFace::texel_direction 相同
const FACE_READER_WGSL: &str = r#"
struct Params {
    face: u32,
    size: f32,
    pad0: u32,
    pad1: u32,
};

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var cube_tex: texture_cube<f32>;
@group(0) @binding(2) var cube_sampler: sampler;

@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    let x = f32((i << 1u) & 2u);
    let y = f32(i & 2u);
    return vec4<f32>(x * 2.0 - 1.0, 1.0 - y * 2.0, 0.0, 1.0);
}

@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    let a = 2.0 * pos.x / params.size - 1.0;
    let b = 2.0 * pos.y / params.size - 1.0;
    var dir: vec3<f32>;
    switch params.face {
        case 0u: { dir = vec3<f32>(1.0, -b, -a); }
        case 1u: { dir = vec3<f32>(-1.0, -b, a); }
        case 2u: { dir = vec3<f32>(a, 1.0, b); }
        case 3u: { dir = vec3<f32>(a, -1.0, -b); }
        case 4u: { dir = vec3<f32>(a, -b, 1.0); }
        default: { dir = vec3<f32>(-a, -b, -1.0); }
    }
    return textureSampleLevel(cube_tex, cube_sampler, dir, 0.0);
}
"#;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ReaderParams {
    face: u32,
    size: f32,
    pad0: u32,
    pad1: u32,
}

fn align_bytes_per_row(value: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (value + align - 1) / align * align
}

/// Draws `face` of the cube view into a fresh 2D texture, one fragment per texel.
fn resample_face(device: &wgpu::Device, queue: &wgpu::Queue, cubemap: &Cubemap, face: CubeFace) -> wgpu::Texture {
    let size = cubemap.edge_length();
    let format = cubemap.format().texture_format();

    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("face_readback_target"),
        size: wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let params = ReaderParams {
        face: face.layer(),
        size: size as f32,
        pad0: 0,
        pad1: 0,
    };
    let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("face_readback_params"),
        contents: bytemuck::bytes_of(&params),
        usage: wgpu::BufferUsages::UNIFORM,
    });

    // 采样点正好落在 texel 中心，Nearest 取回原值
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("face_readback_sampler"),
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("face_readback_layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
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
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("face_readback_bind_group"),
        layout: &bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(cubemap.view()),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    });

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("face_readback_shader"),
        source: wgpu::ShaderSource::Wgsl(FACE_READER_WGSL.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("face_readback_pipeline_layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("face_readback_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_main",
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("face_resample_encoder"),
    });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("face_resample_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: true,
                },
            })],
            depth_stencil_attachment: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
    queue.submit(std::iter::once(encoder.finish()));

    target
}

/// Reads one face back as tightly packed rows, sampled through the cube view.
pub fn read_face(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    cubemap: &Cubemap,
    face: CubeFace,
) -> Vec<u8> {
    let size = cubemap.edge_length();
    let tight_bpr = cubemap.format().bytes_per_pixel() * size;
    let padded_bpr = align_bytes_per_row(tight_bpr);
    let source = resample_face(device, queue, cubemap, face);

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("face_readback"),
        size: (padded_bpr * size) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("face_readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture: &source,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_bpr),
                rows_per_image: Some(size),
            },
        },
        wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv().unwrap().unwrap();

    let data = slice.get_mapped_range();
    let mut tight = Vec::with_capacity((tight_bpr * size) as usize);
    for row in data.chunks(padded_bpr as usize) {
        tight.extend_from_slice(&row[..tight_bpr as usize]);
    }
    drop(data);
    staging.unmap();
    tight
}

/// Fails when every texel of `face` is the same, e.g. a readback of nothing.
pub fn assert_not_constant(face: &[u8], bytes_per_pixel: usize, what: &str) {
    let first = &face[..bytes_per_pixel];
    assert!(
        face.chunks(bytes_per_pixel).any(|px| px != first),
        "{} is constant: {:?}",
        what,
        first
    );
}
