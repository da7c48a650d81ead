// projector.rs — 球面投影：方向向量 -> 等矩形纹理坐标
//
// GPU 端实现在 shaders/equirect_to_cube.wgsl，这里是同一公式的 CPU 版本，
// 以及烘焙时使用的采样器（水平 Repeat、垂直 ClampToEdge）。

use glam::{Vec2, Vec3};
use std::f32::consts::{FRAC_1_PI, PI};

const INV_TWO_PI: f32 = 1.0 / (2.0 * PI);

/// Maps a direction on the unit sphere to equirectangular texture coordinates.
///
/// `u` follows longitude `atan2(z, x)`, `v` follows latitude `asin(y)`. The
/// vector is normalized first and the `asin` input clamped, so poles and
/// slightly overlong vectors still land on a finite coordinate.
pub fn equirect_uv(direction: Vec3) -> Vec2 {
    let v = direction.normalize_or_zero();
    let u = v.z.atan2(v.x) * INV_TWO_PI + 0.5;
    let w = v.y.clamp(-1.0, 1.0).asin() * FRAC_1_PI + 0.5;
    Vec2::new(u, w)
}

pub fn shader_module(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::include_wgsl!("shaders/equirect_to_cube.wgsl"))
}

pub fn create_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("equirect_sampler"),
        address_mode_u: wgpu::AddressMode::Repeat, // 经度方向循环，避免 ±π 处接缝
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// CPU reference of the bake sampler: bilinear, repeat on `u`, clamp on `v`.
#[cfg(test)]
pub fn sample_bilinear(image: &image::RgbaImage, uv: Vec2) -> [f32; 4] {
    let (w, h) = image.dimensions();
    let x = uv.x * w as f32 - 0.5;
    let y = (uv.y * h as f32 - 0.5).clamp(0.0, (h - 1) as f32);

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let wrap = |i: i64| i.rem_euclid(w as i64) as u32;
    let clamp = |j: i64| j.clamp(0, h as i64 - 1) as u32;

    let (xa, xb) = (wrap(x0 as i64), wrap(x0 as i64 + 1));
    let (ya, yb) = (clamp(y0 as i64), clamp(y0 as i64 + 1));

    let mut out = [0.0f32; 4];
    for (c, slot) in out.iter_mut().enumerate() {
        let p = |px: u32, py: u32| image.get_pixel(px, py).0[c] as f32;
        let top = p(xa, ya) * (1.0 - fx) + p(xb, ya) * fx;
        let bottom = p(xa, yb) * (1.0 - fx) + p(xb, yb) * fx;
        *slot = top * (1.0 - fy) + bottom * fy;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).abs().max_element() < 1e-6
    }

    #[test]
    fn axis_directions_hit_expected_coordinates() {
        assert!(close(equirect_uv(Vec3::X), Vec2::new(0.5, 0.5)));
        assert!(close(equirect_uv(Vec3::Z), Vec2::new(0.75, 0.5)));
        assert!(close(equirect_uv(Vec3::NEG_Z), Vec2::new(0.25, 0.5)));
        assert!(close(equirect_uv(Vec3::Y), Vec2::new(0.5, 1.0)));
        assert!(close(equirect_uv(Vec3::NEG_Y), Vec2::new(0.5, 0.0)));

        let back = equirect_uv(Vec3::NEG_X);
        assert!((back.x - 1.0).abs() < 1e-6 || back.x.abs() < 1e-6);
    }

    #[test]
    fn poles_stay_finite_with_overshoot() {
        for y in [1.0f32, -1.0, 1.000_000_1, -1.000_000_1] {
            let uv = equirect_uv(Vec3::new(0.0, y, 0.0));
            assert!(uv.is_finite(), "uv {:?} for y = {}", uv, y);
            assert!((0.0..=1.0).contains(&uv.y));
        }

        let tiny_x = equirect_uv(Vec3::new(1e-12, 1.0, 0.0));
        assert!(tiny_x.is_finite());
    }

    #[test]
    fn unnormalized_input_matches_normalized() {
        let d = Vec3::new(3.0, -2.0, 5.0);
        assert!(close(equirect_uv(d), equirect_uv(d.normalize())));
    }

    #[test]
    fn sampler_wraps_horizontally_and_clamps_vertically() {
        let mut img = RgbaImage::from_pixel(4, 2, Rgba([0, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([200, 0, 0, 255]));
        img.put_pixel(0, 1, Rgba([200, 0, 0, 255]));

        // u = 0 lies halfway between the last and the first column
        let seam = sample_bilinear(&img, Vec2::new(0.0, 0.5));
        assert!((seam[0] - 100.0).abs() < 1e-3);

        let above = sample_bilinear(&img, Vec2::new(0.125, -0.5));
        let top = sample_bilinear(&img, Vec2::new(0.125, 0.0));
        assert_eq!(above, top);
    }
}
