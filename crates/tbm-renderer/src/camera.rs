use crate::math;
use glam::{Mat4, Vec3};
use tbm_config::CameraConfig;

/// Static scene camera.
///
/// Position and target never change; only the aspect ratio follows the
/// surface size.
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Aspect ratio (width / height).
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn from_config(config: &CameraConfig, width: u32, height: u32) -> Self {
        let mut camera = Self {
            eye: config.eye,
            target: config.target,
            up: config.up,
            fov_y_degrees: config.fov_y_degrees,
            aspect_ratio: 1.0,
            near: config.near,
            far: config.far,
        };
        camera.set_viewport(width, height);
        camera
    }

    /// Update the aspect ratio for a new surface size. Zero sizes are ignored.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect_ratio = width as f32 / height as f32;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        math::look_at(self.eye, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        math::perspective(self.fov_y_degrees, self.aspect_ratio, self.near, self.far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_follows_viewport() {
        let mut camera = Camera::from_config(&CameraConfig::default(), 900, 660);
        assert!((camera.aspect_ratio - 900.0 / 660.0).abs() < 1e-6);

        camera.set_viewport(0, 400);
        assert!((camera.aspect_ratio - 900.0 / 660.0).abs() < 1e-6);

        camera.set_viewport(800, 400);
        assert!((camera.aspect_ratio - 2.0).abs() < 1e-6);
    }
}
