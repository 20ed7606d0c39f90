use glam::Quat;

/// Raw reading as the sensor driver reports it: vector part first, real part last.
///
/// The BNO085 rotation vector report uses this `(i, j, k, real)` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorQuaternion {
    pub i: f32,
    pub j: f32,
    pub k: f32,
    pub real: f32,
}

impl SensorQuaternion {
    pub fn new(i: f32, j: f32, k: f32, real: f32) -> Self {
        Self { i, j, k, real }
    }

    /// Build from the mathematical `(w, x, y, z)` convention.
    pub fn from_wxyz(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self::new(x, y, z, w)
    }

    /// Reorder into a quaternion with `w = real`, `(x, y, z) = (i, j, k)`.
    ///
    /// No renormalization: the sensor is trusted to report unit quaternions.
    pub fn to_quat(self) -> Quat {
        Quat::from_xyzw(self.i, self.j, self.k, self.real)
    }
}

/// Roll, pitch and yaw in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EulerAngles {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl EulerAngles {
    /// Z-Y-X (yaw, pitch, roll) decomposition of `q`.
    ///
    /// Pitch saturates at ±90° when the `asin` argument drifts past ±1.
    pub fn from_quat(q: Quat) -> Self {
        let (w, x, y, z) = (q.w, q.x, q.y, q.z);
        let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
        let pitch = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0).asin();
        let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));
        Self {
            roll: roll.to_degrees(),
            pitch: pitch.to_degrees(),
            yaw: yaw.to_degrees(),
        }
    }
}

/// Latest orientation: the quaternion plus its derived Euler angles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationSample {
    /// Orientation as reported, `(w, x, y, z)` convention.
    pub quaternion: Quat,
    pub euler: EulerAngles,
}

impl OrientationSample {
    pub fn from_quat(quaternion: Quat) -> Self {
        Self {
            quaternion,
            euler: EulerAngles::from_quat(quaternion),
        }
    }

    pub fn from_reading(reading: SensorQuaternion) -> Self {
        Self::from_quat(reading.to_quat())
    }
}

impl Default for OrientationSample {
    fn default() -> Self {
        Self {
            quaternion: Quat::IDENTITY,
            euler: EulerAngles::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f32 = 1e-3;

    #[test]
    fn identity_has_zero_angles() {
        let euler = EulerAngles::from_quat(Quat::IDENTITY);
        assert!(euler.roll.abs() < TOL);
        assert!(euler.pitch.abs() < TOL);
        assert!(euler.yaw.abs() < TOL);
    }

    #[test]
    fn quarter_turn_about_z_is_yaw() {
        let h = std::f32::consts::FRAC_1_SQRT_2;
        let euler = EulerAngles::from_quat(Quat::from_xyzw(0.0, 0.0, h, h));
        assert!((euler.yaw - 90.0).abs() < TOL);
        assert!(euler.roll.abs() < TOL);
        assert!(euler.pitch.abs() < TOL);
    }

    #[test]
    fn quarter_turn_about_x_is_roll() {
        let q = Quat::from_rotation_x(30f32.to_radians());
        let euler = EulerAngles::from_quat(q);
        assert!((euler.roll - 30.0).abs() < TOL);
        assert!(euler.pitch.abs() < TOL);
        assert!(euler.yaw.abs() < TOL);
    }

    #[test]
    fn pitch_about_y() {
        let q = Quat::from_rotation_y(-40f32.to_radians());
        let euler = EulerAngles::from_quat(q);
        assert!((euler.pitch + 40.0).abs() < TOL);
        assert!(euler.roll.abs() < TOL);
        assert!(euler.yaw.abs() < TOL);
    }

    #[test]
    fn pitch_saturates_instead_of_nan() {
        // Slightly over-unit input pushes the asin argument past 1.
        let q = Quat::from_xyzw(0.0, 0.7072, 0.0, 0.7072);
        let euler = EulerAngles::from_quat(q);
        assert!(euler.pitch.is_finite());
        assert!((euler.pitch - 90.0).abs() < 0.1);
    }

    #[test]
    fn sensor_order_is_reordered() {
        // Driver reports (i, j, k, real); real part lands in w.
        let reading = SensorQuaternion::new(0.1, 0.2, 0.3, 0.9);
        let q = reading.to_quat();
        assert_eq!(q.w, 0.9);
        assert_eq!(q.x, 0.1);
        assert_eq!(q.y, 0.2);
        assert_eq!(q.z, 0.3);
        assert_eq!(SensorQuaternion::from_wxyz(0.9, 0.1, 0.2, 0.3), reading);
    }

    #[test]
    fn default_sample_is_identity() {
        let sample = OrientationSample::default();
        assert_eq!(sample.quaternion, Quat::IDENTITY);
        assert_eq!(sample.euler, EulerAngles::default());
    }
}
