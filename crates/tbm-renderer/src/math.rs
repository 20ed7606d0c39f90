//! Projection, view and rotation matrices.
//!
//! Column-major `glam` matrices with wgpu clip conventions (depth in `0..1`),
//! composed as `projection * view * model`.

use glam::{Mat4, Vec3, Vec4};

/// Symmetric right-handed perspective projection.
pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh(fov_y_degrees.to_radians(), aspect, near, far)
}

/// Right-handed view matrix looking from `eye` towards `target`.
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    Mat4::look_at_rh(eye, target, up)
}

/// 2D projection for screen-space pixels, z range `-1..1`.
///
/// `orthographic(0, w, 0, h)` puts the origin at the bottom-left, y up.
pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32) -> Mat4 {
    Mat4::orthographic_rh(left, right, bottom, top, -1.0, 1.0)
}

/// Rotation matrix of the quaternion `(w, x, y, z)`.
///
/// Expanded directly rather than through `Quat`, so inputs that are only
/// approximately unit length are used exactly as given.
pub fn quaternion_to_matrix(w: f32, x: f32, y: f32, z: f32) -> Mat4 {
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, xz, yz) = (x * y, x * z, y * z);
    let (wx, wy, wz) = (w * x, w * y, w * z);

    Mat4::from_cols(
        Vec4::new(1.0 - 2.0 * (yy + zz), 2.0 * (xy + wz), 2.0 * (xz - wy), 0.0),
        Vec4::new(2.0 * (xy - wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz + wx), 0.0),
        Vec4::new(2.0 * (xz + wy), 2.0 * (yz - wx), 1.0 - 2.0 * (xx + yy), 0.0),
        Vec4::W,
    )
}

/// `projection * view * model`. No other order is used anywhere.
pub fn compose_mvp(projection: Mat4, view: Mat4, model: Mat4) -> Mat4 {
    projection * view * model
}
