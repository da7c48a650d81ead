// camera.rs — 第一人称相机（鼠标拖动旋转，滚轮缩放视角由 Session 管理）

use glam::{Mat3, Mat4, Vec3};

pub const NEAR: f32 = 0.01;
pub const FAR: f32 = 1000.0;

const PITCH_LIMIT: f32 = 89.0;

/// Walking speed in world units per second (0.09 per frame at 60 Hz).
pub const MOVE_SPEED: f32 = 5.4;

#[derive(Debug, Clone, PartialEq)]
pub struct FirstPersonCamera {
    pub position: Vec3,
    /// Degrees, 0 looks along +X, increasing turns toward +Z (to the right).
    pub yaw: f32,
    pub pitch: f32,
}

impl FirstPersonCamera {
    /// Eye at (1, 1, 1) looking toward (4, 1, 4).
    pub fn new() -> Self {
        Self::looking_at(Vec3::ONE, Vec3::new(4.0, 1.0, 4.0))
    }

    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let dir = (target - position).normalize();
        Self {
            position,
            yaw: dir.z.atan2(dir.x).to_degrees(),
            pitch: dir.y.clamp(-1.0, 1.0).asin().to_degrees().clamp(-PITCH_LIMIT, PITCH_LIMIT),
        }
    }

    pub fn forward(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(pitch.cos() * yaw.cos(), pitch.sin(), pitch.cos() * yaw.sin())
    }

    /// Rotates by a mouse drag of `(dx, dy)` pixels so that one viewport
    /// width spans the horizontal field of view.
    pub fn drag(&mut self, dx: f32, dy: f32, viewport: (f32, f32), fovy: f32, sensitivity: f32) {
        let (width, height) = viewport;
        if width <= 0.0 || height <= 0.0 {
            return;
        }

        let v_f = fovy.to_radians();
        let h_f = 2.0 * ((v_f / 2.0).tan() * width / height).atan();
        let yaw_per_px = (h_f / width).to_degrees();
        let pitch_per_px = (v_f / height).to_degrees();

        self.yaw = (self.yaw + dx * yaw_per_px * sensitivity).rem_euclid(360.0);
        self.pitch = (self.pitch - dy * pitch_per_px * sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Moves the eye in the ground plane. `forward` and `right` are axis
    /// values in -1..=1 (W/S and D/A); height never changes.
    pub fn walk(&mut self, forward: f32, right: f32, distance: f32) {
        let yaw = self.yaw.to_radians();
        let ahead = Vec3::new(yaw.cos(), 0.0, yaw.sin());
        let side = Vec3::new(-yaw.sin(), 0.0, yaw.cos());
        let step = (ahead * forward + side * right).normalize_or_zero();
        self.position += step * distance;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    /// View rotation only, so the skybox stays centred on the eye.
    pub fn rotation_view(&self) -> Mat4 {
        Mat4::from_mat3(Mat3::from_mat4(self.view()))
    }

    pub fn projection(&self, fovy: f32, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(fovy.to_radians(), aspect.max(f32::EPSILON), NEAR, FAR)
    }
}

impl Default for FirstPersonCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_looking_along_the_xz_diagonal() {
        let cam = FirstPersonCamera::new();
        assert!((cam.yaw - 45.0).abs() < 1e-4);
        assert!(cam.pitch.abs() < 1e-4);
        assert!((cam.forward() - Vec3::new(1.0, 0.0, 1.0).normalize()).length() < 1e-5);
    }

    #[test]
    fn drag_right_turns_right_and_pitch_is_clamped() {
        let mut cam = FirstPersonCamera::looking_at(Vec3::ZERO, Vec3::X);
        cam.drag(100.0, 0.0, (800.0, 450.0), 45.0, 1.0);
        // right of +X is +Z in a right-handed, y-up frame
        assert!(cam.forward().z > 0.0);

        cam.drag(0.0, -100_000.0, (800.0, 450.0), 45.0, 1.0);
        assert_eq!(cam.pitch, PITCH_LIMIT);
        cam.drag(0.0, 100_000.0, (800.0, 450.0), 45.0, 1.0);
        assert_eq!(cam.pitch, -PITCH_LIMIT);
    }

    #[test]
    fn rotation_view_drops_translation() {
        let cam = FirstPersonCamera::new();
        let rot = cam.rotation_view();
        assert_eq!(rot.w_axis, glam::Vec4::W);
        let fwd = rot.transform_vector3(cam.forward());
        assert!((fwd - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn zero_sized_viewport_is_ignored() {
        let mut cam = FirstPersonCamera::new();
        let before = cam.clone();
        cam.drag(10.0, 10.0, (0.0, 0.0), 45.0, 1.0);
        assert_eq!(cam, before);
    }

    #[test]
    fn walking_stays_level_and_follows_yaw() {
        let mut cam = FirstPersonCamera::new();
        cam.pitch = 60.0;
        cam.walk(1.0, 0.0, 2.0);
        let expected = Vec3::ONE + Vec3::new(1.0, 0.0, 1.0).normalize() * 2.0;
        assert!((cam.position - expected).length() < 1e-5, "{:?}", cam.position);

        // strafing right from +X goes toward +Z; diagonal input is not faster
        let mut cam = FirstPersonCamera::looking_at(Vec3::ZERO, Vec3::X);
        cam.walk(0.0, 1.0, 1.0);
        assert!((cam.position - Vec3::Z).length() < 1e-5);
        cam.walk(1.0, -1.0, 1.0);
        let h = std::f32::consts::FRAC_1_SQRT_2;
        assert!((cam.position - Vec3::new(h, 0.0, 1.0 - h)).length() < 1e-5, "{:?}", cam.position);
        assert_eq!(cam.position.y, 0.0);

        let before = cam.clone();
        cam.walk(0.0, 0.0, 10.0);
        assert_eq!(cam, before);
    }
}
