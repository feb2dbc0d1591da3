//! Client configuration.
//!
//! Loaded from a TOML file; every field has a default so an empty file (or no
//! file at all) is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use relay_engine::device::GpuInit;
use relay_wire::PixelFormat;

use crate::endpoint::{SdkEndpoint, SimulatedStream, API_VERSION_MAJOR, API_VERSION_MINOR};
use crate::exchange::{ExchangeSettings, Lifecycle};

/// Process exit code for an unreadable or invalid configuration (`EX_USAGE`).
pub const CONFIG_EXIT_CODE: u8 = 64;

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub endpoint: EndpointConfig,
    pub exchange: ExchangeConfig,
    pub gpu: GpuConfig,
    pub logging: LoggingSection,
}

impl ClientConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }
}

/// Which endpoint the session talks to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EndpointConfig {
    Sdk(SdkConfig),
    Simulated(SimulatedConfig),
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig::Sdk(SdkConfig::default())
    }
}

impl EndpointConfig {
    /// Protocol version requested at initialisation.
    pub fn api_version(&self) -> (u32, u32) {
        match self {
            EndpointConfig::Sdk(sdk) => (sdk.version_major, sdk.version_minor),
            EndpointConfig::Simulated(_) => (API_VERSION_MAJOR, API_VERSION_MINOR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Library to load; `RELAY_SDK_PATH` or the platform default when unset.
    pub library: Option<PathBuf>,
    pub version_major: u32,
    pub version_minor: u32,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            library: None,
            version_major: API_VERSION_MAJOR,
            version_minor: API_VERSION_MINOR,
        }
    }
}

impl SdkConfig {
    pub fn library_path(&self) -> PathBuf {
        self.library.clone().unwrap_or_else(SdkEndpoint::library_from_env)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimulatedConfig {
    pub streams: Vec<StreamConfig>,
    pub frame_interval_ms: u64,
    pub quit_after_frames: Option<u64>,
    pub change_streams_every: Option<u64>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            streams: vec![
                StreamConfig {
                    name: "simulated front".into(),
                    width: 640,
                    height: 480,
                    format: FormatName::Bgra8,
                },
                StreamConfig {
                    name: "simulated wide".into(),
                    width: 1920,
                    height: 1080,
                    format: FormatName::Bgra8,
                },
            ],
            frame_interval_ms: 16,
            quit_after_frames: None,
            change_streams_every: None,
        }
    }
}

impl SimulatedConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn simulated_streams(&self) -> Vec<SimulatedStream> {
        self.streams
            .iter()
            .map(|s| SimulatedStream {
                name: s.name.clone(),
                width: s.width,
                height: s.height,
                format: s.format.into(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub format: FormatName,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatName {
    #[default]
    Bgra8,
    Bgra8Srgb,
    Rgba8,
    Rgba8Srgb,
    Rgba16Float,
    Rgba32Float,
}

impl From<FormatName> for PixelFormat {
    fn from(name: FormatName) -> Self {
        match name {
            FormatName::Bgra8 => PixelFormat::Bgra8,
            FormatName::Bgra8Srgb => PixelFormat::Bgra8Srgb,
            FormatName::Rgba8 => PixelFormat::Rgba8,
            FormatName::Rgba8Srgb => PixelFormat::Rgba8Srgb,
            FormatName::Rgba16Float => PixelFormat::Rgba16Float,
            FormatName::Rgba32Float => PixelFormat::Rgba32Float,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExchangeConfig {
    pub await_timeout_ms: u64,
    pub fps_window_ms: u64,
    pub lifecycle: Lifecycle,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            await_timeout_ms: 5000,
            fps_window_ms: 1000,
            lifecycle: Lifecycle::default(),
        }
    }
}

impl ExchangeConfig {
    pub fn settings(&self) -> ExchangeSettings {
        ExchangeSettings {
            await_timeout: Duration::from_millis(self.await_timeout_ms),
            fps_window: Duration::from_millis(self.fps_window_ms.max(1)),
            lifecycle: self.lifecycle,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    #[default]
    HighPerformance,
    LowPower,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresentMode {
    #[default]
    Fifo,
    Mailbox,
    Immediate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GpuConfig {
    pub power_preference: PowerPreference,
    pub present_mode: PresentMode,
}

impl GpuConfig {
    pub fn to_init(&self) -> GpuInit {
        GpuInit {
            power_preference: match self.power_preference {
                PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
                PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            },
            present_mode: match self.present_mode {
                PresentMode::Fifo => wgpu::PresentMode::Fifo,
                PresentMode::Mailbox => wgpu::PresentMode::Mailbox,
                PresentMode::Immediate => wgpu::PresentMode::Immediate,
            },
            ..GpuInit::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// `env_logger` filter, e.g. `info,relay_client=debug`.
    pub filter: Option<String>,
}
