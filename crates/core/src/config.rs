//! Viewer configuration.
//!
//! Settings are read once at startup from a TOML file. Every section and
//! every field is optional; anything missing falls back to [`Default`].
//!
//! ```toml
//! [window]
//! width = 1600
//! height = 900
//!
//! [lights]
//! count = 150
//! seed = 1100
//!
//! [scene]
//! models = ["assets/models/sponza/Sponza.gltf"]
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Most lights the shading program's uniform array holds.
pub const MAX_LIGHT_COUNT: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub lights: LightConfig,
    pub scene: SceneConfig,
    pub export: ExportConfig,
    pub debug: DebugConfig,
}

impl Config {
    /// Reads and validates a config file.
    pub fn from_file<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let buf = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&buf)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise returns the defaults.
    pub fn load_or_default<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!(
                "No config file at {}, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid {
                field: "window",
                reason: format!(
                    "size must be non-zero, got {}x{}",
                    self.window.width, self.window.height
                ),
            });
        }
        if !(self.camera.near > 0.0 && self.camera.far > self.camera.near) {
            return Err(ConfigError::Invalid {
                field: "camera.near/far",
                reason: format!(
                    "expected 0 < near < far, got near={} far={}",
                    self.camera.near, self.camera.far
                ),
            });
        }
        if self.lights.count == 0 {
            return Err(ConfigError::Invalid {
                field: "lights.count",
                reason: "at least one light is required".to_string(),
            });
        }
        if self.lights.count > MAX_LIGHT_COUNT {
            return Err(ConfigError::Invalid {
                field: "lights.count",
                reason: format!(
                    "at most {} lights are supported, got {}",
                    MAX_LIGHT_COUNT, self.lights.count
                ),
            });
        }
        if !(self.lights.world_scale > 0.0) {
            return Err(ConfigError::Invalid {
                field: "lights.world_scale",
                reason: format!("must be positive, got {}", self.lights.world_scale),
            });
        }
        if !(1..=100).contains(&self.export.jpeg_quality) {
            return Err(ConfigError::Invalid {
                field: "export.jpeg_quality",
                reason: format!("must be in 1..=100, got {}", self.export.jpeg_quality),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Deferred Viewer".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// World units per second.
    pub move_speed: f32,
    /// Radians per pixel of mouse motion.
    pub turn_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 60.0,
            near: 0.1,
            far: 30.0,
            move_speed: 2.0,
            turn_speed: 0.002,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LightConfig {
    /// Fixed for the lifetime of the renderer.
    pub count: usize,
    pub seed: u64,
    pub world_scale: f32,
    /// Start with the lights orbiting.
    pub animate: bool,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            count: 150,
            seed: 1100,
            world_scale: 6.0,
            animate: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SceneConfig {
    /// glTF files, drawn in order.
    pub models: Vec<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub directory: PathBuf,
    pub jpeg_quality: u8,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            jpeg_quality: 85,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DebugConfig {
    pub validation: bool,
    /// Directory holding the compiled `*.spv` files.
    pub shader_dir: PathBuf,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            shader_dir: PathBuf::from("shaders/spirv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.lights.count, 150);
        assert_eq!(config.lights.seed, 1100);
        assert_eq!(config.export.jpeg_quality, 85);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [lights]
            count = 10
            seed = 42
            "#,
        )
        .unwrap();
        assert_eq!(config.lights.count, 10);
        assert_eq!(config.lights.seed, 42);
        assert_eq!(config.lights.world_scale, 6.0);
        assert_eq!(config.window, WindowConfig::default());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = Config::from_toml_str("[lights]\nradius = 2.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_invalid_planes_are_rejected() {
        let err = Config::from_toml_str("[camera]\nnear = 5.0\nfar = 1.0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "camera.near/far",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_lights_rejected() {
        let err = Config::from_toml_str("[lights]\ncount = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "lights.count", .. }));
    }

    #[test]
    fn test_light_count_capped_at_uniform_array() {
        let err = Config::from_toml_str("[lights]\ncount = 300\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "lights.count", .. }));

        let config = Config::from_toml_str("[lights]\ncount = 256\n").unwrap();
        assert_eq!(config.lights.count, MAX_LIGHT_COUNT);
    }

    #[test]
    fn test_from_file_and_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[window]\nwidth = 800\nheight = 600").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!((config.window.width, config.window.height), (800, 600));

        let missing = file.path().with_extension("does-not-exist");
        assert!(matches!(
            Config::from_file(&missing),
            Err(ConfigError::Io { .. })
        ));
        assert_eq!(Config::load_or_default(&missing).unwrap(), Config::default());
    }
}
