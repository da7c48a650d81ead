// panorama.rs — 全景图源：解码、尺寸限制与上传到 GPU

use crate::cubemap::PixelFormat;
use crate::error::{Result, ViewError};
use image::io::Reader as ImageReader;
use image::{DynamicImage, Rgba32FImage, RgbaImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Decoded source image. Float sources stay float so HDR radiance survives.
#[derive(Debug, Clone)]
pub enum PanoramaImage {
    Ldr(RgbaImage),
    Hdr(Rgba32FImage),
}

impl PanoramaImage {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut reader = ImageReader::new(reader).with_guessed_format()?;
        reader.no_limits();
        Self::from_dynamic(reader.decode()?)
    }

    pub fn from_dynamic(img: DynamicImage) -> Result<Self> {
        let image = match img {
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                PanoramaImage::Hdr(img.to_rgba32f())
            }
            other => PanoramaImage::Ldr(other.to_rgba8()),
        };
        image.validate()?;
        Ok(image)
    }

    pub fn validate(&self) -> Result<()> {
        let (w, h) = self.dimensions();
        if w == 0 || h == 0 {
            return Err(ViewError::InvalidInput(format!("image is {}x{}", w, h)));
        }
        Ok(())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            PanoramaImage::Ldr(img) => img.dimensions(),
            PanoramaImage::Hdr(img) => img.dimensions(),
        }
    }

    pub fn pixel_format(&self) -> PixelFormat {
        match self {
            PanoramaImage::Ldr(_) => PixelFormat::Rgba8,
            PanoramaImage::Hdr(_) => PixelFormat::Rgba16Float,
        }
    }

    /// 如果图片超过 GPU 限制，则等比缩放到限制内
    pub fn fit_within(self, max_dimension: u32) -> Self {
        let (src_w, src_h) = self.dimensions();
        if src_w <= max_dimension && src_h <= max_dimension {
            return self;
        }

        let scale = max_dimension as f32 / src_w.max(src_h) as f32;
        let new_w = ((src_w as f32 * scale) as u32).clamp(1, max_dimension);
        let new_h = ((src_h as f32 * scale) as u32).clamp(1, max_dimension);
        log::warn!(
            "image {}x{} exceeds GPU limit {}, scaled to {}x{}",
            src_w,
            src_h,
            max_dimension,
            new_w,
            new_h
        );

        let filter = image::imageops::FilterType::Lanczos3;
        match self {
            PanoramaImage::Ldr(img) => PanoramaImage::Ldr(
                DynamicImage::ImageRgba8(img).resize_exact(new_w, new_h, filter).to_rgba8(),
            ),
            PanoramaImage::Hdr(img) => PanoramaImage::Hdr(
                DynamicImage::ImageRgba32F(img)
                    .resize_exact(new_w, new_h, filter)
                    .to_rgba32f(),
            ),
        }
    }

    /// Tightly packed texel bytes in the layout of `pixel_format()`.
    pub fn texel_bytes(&self) -> Vec<u8> {
        match self {
            PanoramaImage::Ldr(img) => img.as_raw().clone(),
            PanoramaImage::Hdr(img) => rgba32f_to_half_bytes(img),
        }
    }
}

pub(crate) fn rgba32f_to_half_bytes(img: &Rgba32FImage) -> Vec<u8> {
    let halves: Vec<u16> = img
        .as_raw()
        .iter()
        .map(|&c| half::f16::from_f32(c).to_bits())
        .collect();
    bytemuck::cast_slice(&halves).to_vec()
}

/// The panorama resident on the GPU for the duration of a bake.
pub struct PanoramaTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: PixelFormat,
}

impl PanoramaTexture {
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, image: &PanoramaImage) -> Result<Self> {
        image.validate()?;

        let (width, height) = image.dimensions();
        let format = image.pixel_format();
        let texture_size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            size: texture_size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: format.texture_format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            label: Some("panorama_texture"),
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.texel_bytes(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(format.bytes_per_pixel() * width),
                rows_per_image: Some(height),
            },
            texture_size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            texture,
            view,
            format,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, Rgba};

    #[test]
    fn float_images_stay_hdr() {
        let hdr = ImageBuffer::from_pixel(4, 2, Rgb([4.0f32, 0.5, 0.25]));
        let image = PanoramaImage::from_dynamic(DynamicImage::ImageRgb32F(hdr)).unwrap();
        assert_eq!(image.pixel_format(), PixelFormat::Rgba16Float);

        let PanoramaImage::Hdr(img) = &image else {
            panic!("expected HDR image");
        };
        assert_eq!(img.get_pixel(0, 0).0, [4.0, 0.5, 0.25, 1.0]);
        assert_eq!(image.texel_bytes().len(), 4 * 2 * 8);
    }

    #[test]
    fn byte_images_become_rgba8() {
        let rgb = ImageBuffer::from_pixel(2, 1, Rgb([10u8, 20, 30]));
        let image = PanoramaImage::from_dynamic(DynamicImage::ImageRgb8(rgb)).unwrap();
        assert_eq!(image.pixel_format(), PixelFormat::Rgba8);
        assert_eq!(image.texel_bytes(), vec![10, 20, 30, 255, 10, 20, 30, 255]);
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let empty = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));
        assert!(matches!(
            PanoramaImage::from_dynamic(empty),
            Err(ViewError::InvalidInput(_))
        ));
    }

    #[test]
    fn oversized_image_is_scaled_to_limit() {
        let img = PanoramaImage::Ldr(RgbaImage::from_pixel(64, 32, Rgba([90, 90, 90, 255])));
        let fitted = img.fit_within(16);
        assert_eq!(fitted.dimensions(), (16, 8));

        let small = PanoramaImage::Ldr(RgbaImage::new(8, 4));
        assert_eq!(small.fit_within(16).dimensions(), (8, 4));
    }

    #[test]
    fn half_conversion_preserves_radiance_above_one() {
        let img = Rgba32FImage::from_pixel(1, 1, Rgba([12.5, 1.0, 0.0, 1.0]));
        let bytes = rgba32f_to_half_bytes(&img);
        let red = u16::from_ne_bytes([bytes[0], bytes[1]]);
        assert_eq!(half::f16::from_bits(red).to_f32(), 12.5);
    }
}
