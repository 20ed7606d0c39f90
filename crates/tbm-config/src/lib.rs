mod types;

pub use types::*;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable that points at an explicit config file.
pub const CONFIG_ENV: &str = "TBM_CONFIG";

/// Returns the config file path: `$TBM_CONFIG`, or `<config dir>/tbm-visualizer/config.toml`.
pub fn config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(dir.join("tbm-visualizer").join("config.toml"))
}

/// Load config from disk, or return default if not found.
pub fn load_config() -> Result<AppConfig> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        let config = parse_config(&contents)?;
        info!(?path, "Loaded config");
        Ok(config)
    } else {
        info!(?path, "No config found, using defaults");
        Ok(AppConfig::default())
    }
}

/// Parse a TOML document. Missing sections and fields keep their defaults.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    Ok(toml::from_str(contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn empty_document_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.window.width, 900);
        assert_eq!(config.window.height, 660);
        assert_eq!(config.sensor.poll_interval_ms, 20);
        assert_eq!(config.sensor.source, SensorSource::Stdin);
        assert_eq!(config.geometry.segments, 60);
        assert!((config.geometry.radius - 0.36).abs() < 1e-6);
    }

    #[test]
    fn partial_sections_keep_other_fields() {
        let config = parse_config(
            r#"
            [sensor]
            poll_interval_ms = 10
            source = { kind = "tcp", address = "192.168.4.2:7000" }

            [camera]
            eye = [0.0, 2.0, 5.0]
            "#,
        )
        .unwrap();

        assert_eq!(config.sensor.poll_interval_ms, 10);
        assert_eq!(config.sensor.stop_grace_ms, 250);
        assert_eq!(
            config.sensor.source,
            SensorSource::Tcp {
                address: "192.168.4.2:7000".to_string()
            }
        );
        assert_eq!(config.camera.eye, Vec3::new(0.0, 2.0, 5.0));
        assert_eq!(config.camera.up, Vec3::Y);
        assert!((config.camera.fov_y_degrees - 45.0).abs() < 1e-6);
    }

    #[test]
    fn camera_vectors_need_three_components() {
        assert!(parse_config("[camera]\nlight = [1.0, 2.0]\n").is_err());
        let config = parse_config("[camera]\nlight = [1.0, 2.0, 3.0]\n").unwrap();
        assert_eq!(config.camera.light, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn mock_source_parses() {
        let config = parse_config("[sensor.source]\nkind = \"mock\"\n").unwrap();
        assert_eq!(config.sensor.source, SensorSource::Mock);
    }

    #[test]
    fn invalid_document_is_an_error() {
        assert!(parse_config("[geometry]\nsegments = \"many\"\n").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("tbm-config-does-not-exist.toml");
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.window.target_fps, 60);
    }
}
