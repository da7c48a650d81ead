// mesh.rs — 立方体与地面网格的几何生成
// 烘焙和天空盒共用同一个立方体，网格线用于参考地面

use wgpu::util::DeviceExt;

#[derive(Debug, Clone)]
pub struct CubeMesh {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

/// Axis-aligned cube centred on the origin. Winding is irrelevant: every
/// pipeline drawing it runs with culling disabled.
pub fn build_cube(half_extent: f32) -> CubeMesh {
    let h = half_extent;
    let positions = vec![
        [-h, -h, -h],
        [h, -h, -h],
        [h, h, -h],
        [-h, h, -h],
        [-h, -h, h],
        [h, -h, h],
        [h, h, h],
        [-h, h, h],
    ];

    #[rustfmt::skip]
    let indices = vec![
        0, 1, 2,  2, 3, 0, // -Z
        5, 4, 7,  7, 6, 5, // +Z
        4, 0, 3,  3, 7, 4, // -X
        1, 5, 6,  6, 2, 1, // +X
        3, 2, 6,  6, 7, 3, // +Y
        4, 5, 1,  1, 0, 4, // -Y
    ];

    CubeMesh { positions, indices }
}

pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl CubeMesh {
    pub fn upload(&self, device: &wgpu::Device, label: &str) -> GpuMesh {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&self.positions),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&self.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: self.indices.len() as u32,
        }
    }
}

pub const POSITION_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[wgpu::VertexAttribute {
        offset: 0,
        shader_location: 0,
        format: wgpu::VertexFormat::Float32x3,
    }],
};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GridVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

const GRID_AXIS_COLOR: [f32; 3] = [0.5, 0.5, 0.5];
const GRID_LINE_COLOR: [f32; 3] = [0.75, 0.75, 0.75];

/// Line list for a `slices` x `slices` grid on the y = 0 plane.
pub fn build_grid(slices: u32, spacing: f32) -> Vec<GridVertex> {
    let half = slices as f32 * spacing / 2.0;
    let mut vertices = Vec::with_capacity(((slices + 1) * 4) as usize);

    for i in 0..=slices {
        let offset = -half + i as f32 * spacing;
        let color = if i == slices / 2 {
            GRID_AXIS_COLOR
        } else {
            GRID_LINE_COLOR
        };

        vertices.push(GridVertex { position: [offset, 0.0, -half], color });
        vertices.push(GridVertex { position: [offset, 0.0, half], color });
        vertices.push(GridVertex { position: [-half, 0.0, offset], color });
        vertices.push(GridVertex { position: [half, 0.0, offset], color });
    }

    vertices
}
