// cubemap.rs — 立方体贴图：六个面的固定朝向与 GPU 纹理

use glam::{Mat4, Vec3};

pub const CUBE_FACE_COUNT: u32 = 6;

pub const BAKE_NEAR: f32 = 0.01;
pub const BAKE_FAR: f32 = 1000.0;

/// One of the six cube faces, in the layer order of a wgpu cube texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub fn layer(self) -> u32 {
        self as u32
    }

    pub fn direction(self) -> Vec3 {
        match self {
            CubeFace::PositiveX => Vec3::X,
            CubeFace::NegativeX => Vec3::NEG_X,
            CubeFace::PositiveY => Vec3::Y,
            CubeFace::NegativeY => Vec3::NEG_Y,
            CubeFace::PositiveZ => Vec3::Z,
            CubeFace::NegativeZ => Vec3::NEG_Z,
        }
    }

    /// ±Y faces look along the up axis, so they take ±Z as their up vector.
    pub fn up(self) -> Vec3 {
        match self {
            CubeFace::PositiveY => Vec3::Z,
            CubeFace::NegativeY => Vec3::NEG_Z,
            _ => Vec3::NEG_Y,
        }
    }

    pub fn view_matrix(self) -> Mat4 {
        Mat4::look_at_rh(Vec3::ZERO, self.direction(), self.up())
    }

    /// Direction through the point `(s, t)` of this face, `s`/`t` in `[0, 1]`
    /// with `(0, 0)` at the first texel in memory (WebGPU cube convention).
    pub fn texel_direction(self, s: f32, t: f32) -> Vec3 {
        let a = 2.0 * s - 1.0;
        let b = 2.0 * t - 1.0;
        let dir = match self {
            CubeFace::PositiveX => Vec3::new(1.0, -b, -a),
            CubeFace::NegativeX => Vec3::new(-1.0, -b, a),
            CubeFace::PositiveY => Vec3::new(a, 1.0, b),
            CubeFace::NegativeY => Vec3::new(a, -1.0, -b),
            CubeFace::PositiveZ => Vec3::new(a, -b, 1.0),
            CubeFace::NegativeZ => Vec3::new(-a, -b, -1.0),
        };
        dir.normalize()
    }
}

/// 90° symmetric projection shared by all six face passes.
///
/// The face up vectors come from a bottom-left-origin convention; the Y flip
/// lines them up with wgpu's top-left render target origin so the rendered
/// rows match how cube textures are sampled.
pub fn face_projection() -> Mat4 {
    Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0))
        * Mat4::perspective_rh(90f32.to_radians(), 1.0, BAKE_NEAR, BAKE_FAR)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Uncompressed 8-bit RGBA.
    Rgba8,
    /// Half-float RGBA, keeps HDR radiance through the bake.
    Rgba16Float,
}

impl PixelFormat {
    pub fn texture_format(self) -> wgpu::TextureFormat {
        match self {
            PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        }
    }

    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgba16Float => 8,
        }
    }
}

/// A six-face cube texture with a single mip level, owned by whoever holds it.
/// Dropping it releases the GPU memory.
pub struct Cubemap {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    edge_length: u32,
    format: PixelFormat,
}

impl Cubemap {
    pub(crate) fn allocate(
        device: &wgpu::Device,
        edge_length: u32,
        format: PixelFormat,
        usage: wgpu::TextureUsages,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: edge_length,
                height: edge_length,
                depth_or_array_layers: CUBE_FACE_COUNT,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: format.texture_format(),
            usage,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            array_layer_count: Some(CUBE_FACE_COUNT),
            ..Default::default()
        });

        Self {
            texture,
            view,
            edge_length,
            format,
        }
    }

    /// Single-layer 2D view of one face, usable as a color attachment.
    pub fn face_view(&self, face: CubeFace) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("cubemap_face"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_array_layer: face.layer(),
            array_layer_count: Some(1),
            ..Default::default()
        })
    }

    pub fn edge_length(&self) -> u32 {
        self.edge_length
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn face_count(&self) -> u32 {
        self.texture.depth_or_array_layers()
    }

    pub fn mip_level_count(&self) -> u32 {
        self.texture.mip_level_count()
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}
