use serde::{Deserialize, Serialize};

use crate::{Color, PolarisError, PolarisResult, Viewport};

/// Which render backend the host should create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Cpu,
    Gpu,
    /// GPU when an adapter is available, otherwise CPU.
    Auto,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub backend: BackendKind,
    pub clear_color: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            viewport_width: 1280,
            viewport_height: 720,
            backend: BackendKind::Cpu,
            clear_color: "#000000".to_string(),
        }
    }
}

impl RenderConfig {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.viewport_width, self.viewport_height)
    }

    pub fn clear_color(&self) -> PolarisResult<Color> {
        Color::from_hex(&self.clear_color)
            .map_err(|e| PolarisError::Config(format!("clear_color {:?}: {e}", self.clear_color)))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub output_channels: u16,
    /// Largest block the real-time side converts in one pass. Scratch
    /// buffers are sized from this up front.
    pub max_block_frames: usize,
    pub output: String, // "none" | "rodio"
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            output_channels: 2,
            max_block_frames: 4096,
            output: "none".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub assets_dir: String,
    pub save_file: String,
    pub save_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            assets_dir: "assets".to_string(),
            save_file: "sav/polaris-saves.json".to_string(),
            save_prefix: "sav/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocaleConfig {
    pub fallback: String,
    pub detect_from_env: bool,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            fallback: "ja".to_string(),
            detect_from_env: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub error_ring_capacity: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            error_ring_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PolarisConfig {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub locale: LocaleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PolarisConfig {
    pub fn from_toml_str(contents: &str) -> PolarisResult<Self> {
        toml::from_str(contents).map_err(|e| PolarisError::Config(e.to_string()))
    }

    pub fn load_from_file(path: &std::path::Path) -> PolarisResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> PolarisResult<String> {
        toml::to_string_pretty(self).map_err(|e| PolarisError::Config(e.to_string()))
    }

    pub fn save_to_file(&self, path: &std::path::Path) -> PolarisResult<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}
