// layout.rs — 直接加载已排布好的立方体贴图（不经过全景投影）

use crate::cubemap::{CubeFace, Cubemap};
use crate::error::{Result, ViewError};
use crate::panorama::{rgba32f_to_half_bytes, PanoramaImage};
use image::{imageops, ImageBuffer, Pixel};

/// How the six faces are arranged inside a single source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubemapLayout {
    Auto,
    /// 6N x N, faces left to right in layer order.
    HorizontalStrip,
    /// N x 6N, faces top to bottom in layer order.
    VerticalStrip,
    /// 4N x 3N: +Y above +Z, middle row -X +Z +X -Z, -Y below +Z.
    HorizontalCross,
    /// 3N x 4N: +Y on top, middle row -X +Z +X, then -Y, then -Z upside down.
    VerticalCross,
}

impl CubemapLayout {
    /// Resolves `Auto` from the image shape and returns the face edge length.
    pub fn resolve(self, width: u32, height: u32) -> Result<(CubemapLayout, u32)> {
        let unsupported = ViewError::UnsupportedFormat { width, height };
        let layout = match self {
            CubemapLayout::Auto => Self::detect(width, height).ok_or(unsupported)?,
            explicit => explicit,
        };

        let (cols, rows) = layout.grid();
        if width == 0 || width % cols != 0 || height % rows != 0 || width / cols != height / rows {
            return Err(ViewError::UnsupportedFormat { width, height });
        }
        Ok((layout, width / cols))
    }

    fn detect(width: u32, height: u32) -> Option<CubemapLayout> {
        let candidates = if width > height {
            [CubemapLayout::HorizontalStrip, CubemapLayout::HorizontalCross]
        } else if height > width {
            [CubemapLayout::VerticalStrip, CubemapLayout::VerticalCross]
        } else {
            return None;
        };

        candidates.into_iter().find(|layout| {
            let (cols, rows) = layout.grid();
            width % cols == 0 && height % rows == 0 && width / cols == height / rows
        })
    }

    fn grid(self) -> (u32, u32) {
        match self {
            CubemapLayout::HorizontalStrip => (6, 1),
            CubemapLayout::VerticalStrip => (1, 6),
            CubemapLayout::HorizontalCross => (4, 3),
            CubemapLayout::VerticalCross => (3, 4),
            CubemapLayout::Auto => (1, 1),
        }
    }

    /// Cell (column, row) of a face, and whether it is stored rotated by 180°.
    fn cell(self, face: CubeFace) -> (u32, u32, bool) {
        let i = face.layer();
        match self {
            CubemapLayout::HorizontalStrip | CubemapLayout::Auto => (i, 0, false),
            CubemapLayout::VerticalStrip => (0, i, false),
            CubemapLayout::HorizontalCross => match face {
                CubeFace::PositiveX => (2, 1, false),
                CubeFace::NegativeX => (0, 1, false),
                CubeFace::PositiveY => (1, 0, false),
                CubeFace::NegativeY => (1, 2, false),
                CubeFace::PositiveZ => (1, 1, false),
                CubeFace::NegativeZ => (3, 1, false),
            },
            CubemapLayout::VerticalCross => match face {
                CubeFace::PositiveX => (2, 1, false),
                CubeFace::NegativeX => (0, 1, false),
                CubeFace::PositiveY => (1, 0, false),
                CubeFace::NegativeY => (1, 2, false),
                CubeFace::PositiveZ => (1, 1, false),
                CubeFace::NegativeZ => (1, 3, true),
            },
        }
    }
}

fn split_faces<P>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    layout: CubemapLayout,
    size: u32,
) -> [ImageBuffer<P, Vec<P::Subpixel>>; 6]
where
    P: Pixel + 'static,
{
    CubeFace::ALL.map(|face| {
        let (col, row, rotated) = layout.cell(face);
        let cell = imageops::crop_imm(image, col * size, row * size, size, size).to_image();
        if rotated {
            imageops::rotate180(&cell)
        } else {
            cell
        }
    })
}

/// Six decoded faces in layer order, tightly packed, ready for upload.
pub struct CubeFaceSet {
    pub edge_length: u32,
    pub faces: [Vec<u8>; 6],
}

impl CubeFaceSet {
    pub fn from_image(image: &PanoramaImage, layout: CubemapLayout) -> Result<Self> {
        image.validate()?;
        let (width, height) = image.dimensions();
        let (layout, size) = layout.resolve(width, height)?;
        log::info!("cubemap layout {:?}, face size {}", layout, size);

        let faces = match image {
            PanoramaImage::Ldr(img) => split_faces(img, layout, size).map(|f| f.into_raw()),
            PanoramaImage::Hdr(img) => {
                split_faces(img, layout, size).map(|f| rgba32f_to_half_bytes(&f))
            }
        };

        Ok(Self {
            edge_length: size,
            faces,
        })
    }
}

/// Decodes a pre-laid-out cubemap image straight into a cube texture, no render pass.
pub fn load_cubemap_direct(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &PanoramaImage,
    layout: CubemapLayout,
) -> Result<Cubemap> {
    let face_set = CubeFaceSet::from_image(image, layout)?;
    let size = face_set.edge_length;
    if size > device.limits().max_texture_dimension_2d {
        return Err(ViewError::InvalidInput(format!(
            "cubemap face {} exceeds GPU limit {}",
            size,
            device.limits().max_texture_dimension_2d
        )));
    }

    let format = image.pixel_format();
    let cubemap = Cubemap::allocate(
        device,
        size,
        format,
        wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
        "direct_cubemap",
    );

    for (face, data) in CubeFace::ALL.iter().zip(face_set.faces.iter()) {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: cubemap.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: face.layer(),
                },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(format.bytes_per_pixel() * size),
                rows_per_image: Some(size),
            },
            wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
        );
    }

    Ok(cubemap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn face_color(i: u32) -> Rgba<u8> {
        Rgba([(i * 40) as u8, 255 - (i * 40) as u8, i as u8, 255])
    }

    #[test]
    fn detects_common_layouts() {
        let auto = CubemapLayout::Auto;
        assert_eq!(auto.resolve(6 * 32, 32).unwrap(), (CubemapLayout::HorizontalStrip, 32));
        assert_eq!(auto.resolve(32, 6 * 32).unwrap(), (CubemapLayout::VerticalStrip, 32));
        assert_eq!(auto.resolve(4 * 32, 3 * 32).unwrap(), (CubemapLayout::HorizontalCross, 32));
        assert_eq!(auto.resolve(3 * 32, 4 * 32).unwrap(), (CubemapLayout::VerticalCross, 32));
    }

    #[test]
    fn rejects_shapes_without_a_layout() {
        for (w, h) in [(512, 512), (2048, 1024), (100, 33), (0, 0)] {
            assert!(
                matches!(
                    CubemapLayout::Auto.resolve(w, h),
                    Err(ViewError::UnsupportedFormat { .. })
                ),
                "{}x{}",
                w,
                h
            );
        }
        assert!(CubemapLayout::VerticalCross.resolve(6 * 8, 8).is_err());
    }

    #[test]
    fn horizontal_strip_keeps_left_to_right_order() {
        let n = 8;
        let mut img = RgbaImage::new(6 * n, n);
        for (x, _, p) in img.enumerate_pixels_mut() {
            *p = face_color(x / n);
        }

        let set = CubeFaceSet::from_image(&PanoramaImage::Ldr(img), CubemapLayout::Auto).unwrap();
        assert_eq!(set.edge_length, n);
        for (i, face) in set.faces.iter().enumerate() {
            assert_eq!(face.len(), (n * n * 4) as usize);
            assert!(face.chunks(4).all(|px| px == face_color(i as u32).0));
        }
    }

    #[test]
    fn horizontal_cross_picks_faces_from_cells() {
        let n = 4;
        let mut img = RgbaImage::new(4 * n, 3 * n);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = face_color((y / n) * 4 + x / n);
        }

        let set = CubeFaceSet::from_image(&PanoramaImage::Ldr(img), CubemapLayout::Auto).unwrap();
        // +X at (2,1), -Y at (1,2), -Z at (3,1)
        assert_eq!(&set.faces[0][..4], &face_color(6).0);
        assert_eq!(&set.faces[3][..4], &face_color(9).0);
        assert_eq!(&set.faces[5][..4], &face_color(7).0);
    }

    #[test]
    fn vertical_cross_turns_negative_z_upright() {
        let n = 2;
        let mut img = RgbaImage::from_pixel(3 * n, 4 * n, Rgba([0, 0, 0, 255]));
        // mark the bottom-right texel of the -Z cell
        img.put_pixel(2 * n - 1, 4 * n - 1, Rgba([255, 0, 0, 255]));

        let set = CubeFaceSet::from_image(&PanoramaImage::Ldr(img), CubemapLayout::Auto).unwrap();
        let neg_z = &set.faces[CubeFace::NegativeZ.layer() as usize];
        assert_eq!(&neg_z[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn direct_load_uploads_every_layer() {
        let Some((device, queue)) = crate::test_support::test_device() else { return };
        let n = 4;
        let mut img = RgbaImage::new(n, 6 * n);
        for (_, y, p) in img.enumerate_pixels_mut() {
            *p = face_color(y / n);
        }

        let cubemap =
            load_cubemap_direct(&device, &queue, &PanoramaImage::Ldr(img), CubemapLayout::Auto).unwrap();
        assert_eq!(cubemap.edge_length(), n);
        for (i, face) in CubeFace::ALL.iter().enumerate() {
            let texels = crate::test_support::read_face(&device, &queue, &cubemap, *face);
            assert!(texels.chunks(4).all(|px| px == face_color(i as u32).0), "{:?}", face);
        }
    }

    #[test]
    fn direct_load_keeps_texel_orientation_through_cube_sampling() {
        let Some((device, queue)) = crate::test_support::test_device() else { return };
        let n = 8;
        // every texel distinct: red follows x, green follows y, blue names the face
        let img = RgbaImage::from_fn(6 * n, n, |x, y| {
            Rgba([((x % n) * 30) as u8, (y * 30) as u8, ((x / n) * 40) as u8, 255])
        });
        let image = PanoramaImage::Ldr(img);
        let set = CubeFaceSet::from_image(&image, CubemapLayout::HorizontalStrip).unwrap();

        let cubemap = load_cubemap_direct(&device, &queue, &image, CubemapLayout::HorizontalStrip).unwrap();
        for (i, face) in CubeFace::ALL.iter().enumerate() {
            let texels = crate::test_support::read_face(&device, &queue, &cubemap, *face);
            crate::test_support::assert_not_constant(&texels, 4, &format!("{:?}", face));
            assert_eq!(texels, set.faces[i], "{:?}", face);
        }
    }
}
