use glam::Vec3;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Window and frame pacing.
    pub window: WindowConfig,
    /// Orientation sensor source and polling.
    pub sensor: SensorConfig,
    /// Cutter body dimensions.
    pub geometry: GeometryConfig,
    /// Static camera and light.
    pub camera: CameraConfig,
    /// Surface colors.
    pub materials: MaterialConfig,
    /// Heads-up display labels.
    pub hud: HudConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Frame limiter target. Presentation is also vsynced.
    pub target_fps: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "TBM Orientation".to_string(),
            width: 900,
            height: 660,
            target_fps: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Where orientation readings come from.
    pub source: SensorSource,
    /// Sleep between acquisition cycles (50 Hz by default).
    pub poll_interval_ms: u64,
    /// How long shutdown waits for a blocked sensor read before detaching it.
    pub stop_grace_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            source: SensorSource::Stdin,
            poll_interval_ms: 20,
            stop_grace_ms: 250,
        }
    }
}

/// Sensor driver selection.
///
/// Line-based sources carry one `i j k real` reading per line, the component
/// order the BNO085 rotation vector report uses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorSource {
    /// No hardware; orientation stays at identity.
    Mock,
    /// Readings piped into standard input.
    Stdin,
    /// Readings streamed over a TCP connection.
    Tcp { address: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub radius: f32,
    pub length: f32,
    pub segments: u32,
    /// Cutter ring radius relative to the body radius.
    pub ring_scale: f32,
    /// Cutter ring extent along -Z from the front face.
    pub ring_depth: f32,
    /// Spoke half-length relative to the body radius.
    pub spoke_radius_scale: f32,
    pub spoke_half_width: f32,
    /// Offset of the spokes past the front face, against z-fighting.
    pub spoke_z_offset: f32,
    /// Length of the reference axis lines.
    pub axis_scale: f32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            radius: 0.36,
            length: 1.7,
            segments: 60,
            ring_scale: 1.12,
            ring_depth: 0.09,
            spoke_radius_scale: 0.97,
            spoke_half_width: 0.028,
            spoke_z_offset: 0.002,
            axis_scale: 0.7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    #[serde(deserialize_with = "vec3_serde::deserialize")]
    pub eye: Vec3,
    #[serde(deserialize_with = "vec3_serde::deserialize")]
    pub target: Vec3,
    #[serde(deserialize_with = "vec3_serde::deserialize")]
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Point light position in world space.
    #[serde(deserialize_with = "vec3_serde::deserialize")]
    pub light: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 1.0, 3.8),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 100.0,
            light: Vec3::new(4.0, 5.0, 5.0),
        }
    }
}

/// Linear RGB colors in `0.0..=1.0`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    pub steel: [f32; 3],
    pub cap: [f32; 3],
    pub cutter: [f32; 3],
    pub spoke: [f32; 3],
    pub clear: [f32; 3],
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            steel: [0.70, 0.70, 0.76],
            cap: [0.55, 0.55, 0.60],
            cutter: [0.88, 0.35, 0.08],
            spoke: [0.20, 0.20, 0.22],
            clear: [0.05, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HudConfig {
    /// TrueType font to use. `None` searches common system locations.
    pub font_path: Option<String>,
    pub title: String,
    pub hint: String,
    pub title_px: f32,
    pub value_px: f32,
    pub hint_px: f32,
    /// 8-bit sRGB label colors.
    pub title_color: [u8; 3],
    pub hint_color: [u8; 3],
    pub roll_color: [u8; 3],
    pub pitch_color: [u8; 3],
    pub yaw_color: [u8; 3],
}

impl Default for HudConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            title: "DIG 'EM AGGIES  |  TBM ORIENTATION".to_string(),
            hint: "ESC to quit".to_string(),
            title_px: 24.0,
            value_px: 22.0,
            hint_px: 15.0,
            title_color: [210, 160, 160],
            hint_color: [100, 75, 75],
            roll_color: [255, 210, 80],
            pitch_color: [80, 230, 130],
            yaw_color: [80, 190, 255],
        }
    }
}

// glam reads vectors as structs; config files use plain `[x, y, z]` arrays.
mod vec3_serde {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec3, D::Error> {
        let [x, y, z] = <[f32; 3]>::deserialize(d)?;
        Ok(Vec3::new(x, y, z))
    }
}
