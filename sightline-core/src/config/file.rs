//! Configuration file loading
//!
//! Loads user configuration from `~/.config/sightline/config.toml`

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{CaptureConfig, ServerConfig};
use crate::capture::synthetic::{default_windows, DEFAULT_CHUNK_INTERVAL};
use crate::capture::{SelectionMode, SyntheticDesktop, SyntheticWindow};
use crate::error::{Result, SightlineError};
use crate::types::SourceKind;

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Capture pipeline settings
    #[serde(default)]
    pub capture: CaptureSettings,

    /// Room relay settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Synthetic desktop backend
    #[serde(default)]
    pub desktop: DesktopSettings,
}

/// Capture settings as written in the file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Selection mode (auto, manual)
    #[serde(default = "default_selection")]
    pub selection: String,

    /// Manual selection timeout in seconds (0 = wait indefinitely)
    #[serde(default)]
    pub selection_timeout: u64,

    /// Source kinds to list (window, screen, tab)
    #[serde(default = "default_kinds")]
    pub kinds: Vec<String>,

    #[serde(default = "default_max_width")]
    pub max_width: u32,

    #[serde(default = "default_max_height")]
    pub max_height: u32,

    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_width: u32,

    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_height: u32,
}

/// Room relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Route prefix
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Seats per room
    #[serde(default = "default_room_capacity")]
    pub room_capacity: u32,

    /// Seconds an empty room survives
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,

    /// Largest streamed chunk in bytes
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,
}

/// Synthetic desktop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesktopSettings {
    /// Milliseconds between stream chunks
    #[serde(default = "default_chunk_interval_ms")]
    pub chunk_interval_ms: u64,

    /// Windows on the desktop; built-in ones are used when empty
    #[serde(default)]
    pub windows: Vec<SyntheticWindow>,
}

// Default value functions
fn default_selection() -> String {
    "auto".to_string()
}

fn default_kinds() -> Vec<String> {
    vec!["window".to_string()]
}

fn default_max_width() -> u32 {
    CaptureConfig::default().max_width
}

fn default_max_height() -> u32 {
    CaptureConfig::default().max_height
}

fn default_thumbnail_size() -> u32 {
    CaptureConfig::default().thumbnail_width
}

fn default_bind() -> String {
    ServerConfig::default().bind.to_string()
}

fn default_api_prefix() -> String {
    ServerConfig::default().api_prefix
}

fn default_room_capacity() -> u32 {
    ServerConfig::default().room_capacity
}

fn default_idle_timeout() -> u64 {
    ServerConfig::default().idle_timeout.as_secs()
}

fn default_max_chunk_bytes() -> usize {
    ServerConfig::default().max_chunk_bytes
}

fn default_chunk_interval_ms() -> u64 {
    DEFAULT_CHUNK_INTERVAL.as_millis() as u64
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            selection: default_selection(),
            selection_timeout: 0,
            kinds: default_kinds(),
            max_width: default_max_width(),
            max_height: default_max_height(),
            thumbnail_width: default_thumbnail_size(),
            thumbnail_height: default_thumbnail_size(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_prefix: default_api_prefix(),
            room_capacity: default_room_capacity(),
            idle_timeout: default_idle_timeout(),
            max_chunk_bytes: default_max_chunk_bytes(),
        }
    }
}

impl Default for DesktopSettings {
    fn default() -> Self {
        Self {
            chunk_interval_ms: default_chunk_interval_ms(),
            windows: Vec::new(),
        }
    }
}

impl CaptureSettings {
    /// Parse into a typed capture config
    pub fn to_config(&self) -> Result<CaptureConfig> {
        let selection: SelectionMode = self
            .selection
            .parse()
            .map_err(SightlineError::config)?;

        let kinds = self
            .kinds
            .iter()
            .map(|k| k.parse::<SourceKind>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(SightlineError::config)?;

        let config = CaptureConfig {
            kinds,
            selection,
            selection_timeout: (self.selection_timeout > 0)
                .then(|| Duration::from_secs(self.selection_timeout)),
            max_width: self.max_width,
            max_height: self.max_height,
            thumbnail_width: self.thumbnail_width,
            thumbnail_height: self.thumbnail_height,
        };

        config.validate_strict().map_err(SightlineError::config)?;
        Ok(config)
    }
}

impl ServerSettings {
    /// Parse into a typed server config
    pub fn to_config(&self) -> Result<ServerConfig> {
        let bind: SocketAddr = self.bind.parse().map_err(|e| {
            SightlineError::config(format!("Invalid bind address '{}': {}", self.bind, e))
        })?;

        let config = ServerConfig {
            bind,
            api_prefix: self.api_prefix.clone(),
            room_capacity: self.room_capacity,
            idle_timeout: Duration::from_secs(self.idle_timeout),
            max_chunk_bytes: self.max_chunk_bytes,
            ..ServerConfig::default()
        };

        config.validate_strict().map_err(SightlineError::config)?;
        Ok(config)
    }
}

impl DesktopSettings {
    /// Build the synthetic desktop described by these settings
    pub fn build(&self) -> SyntheticDesktop {
        let windows = if self.windows.is_empty() {
            default_windows()
        } else {
            self.windows.clone()
        };
        let interval = Duration::from_millis(self.chunk_interval_ms.max(1));
        SyntheticDesktop::new(windows).with_chunk_interval(interval)
    }
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("sightline").join("config.toml")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("sightline")
                .join("config.toml")
        } else {
            PathBuf::from("/etc/sightline/config.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| SightlineError::config(format!("Failed to read config file: {}", e)))?;

        let config: ConfigFile = toml::from_str(&content)?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, logging warnings but returning defaults on error
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::default_path())
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SightlineError::config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SightlineError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SightlineError::config(format!("Failed to write config file: {}", e)))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Typed capture configuration
    pub fn capture_config(&self) -> Result<CaptureConfig> {
        self.capture.to_config()
    }

    /// Typed server configuration
    pub fn server_config(&self) -> Result<ServerConfig> {
        self.server.to_config()
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# Sightline Configuration

[capture]
# Selection mode: auto (first listed window) or manual (wait for `sightline select`)
selection = "auto"

# Manual selection timeout in seconds (0 = wait until a source is picked)
selection_timeout = 0

# Source kinds to list: window, screen, tab
kinds = ["window"]

# Upper bound on the captured stream size
max_width = 400
max_height = 300

# Thumbnail bounding box
thumbnail_width = 150
thumbnail_height = 150

[server]
# Room relay listen address
bind = "0.0.0.0:8181"

# Route prefix
api_prefix = "/api/v1"

# Seats per room
room_capacity = 8

# Seconds an empty room survives
idle_timeout = 180

# Largest streamed chunk in bytes
max_chunk_bytes = 8388608

[desktop]
# Milliseconds between stream chunks
chunk_interval_ms = 1000

[[desktop.windows]]
id = "window:1"
name = "Editor"
color = [40, 44, 52]

[[desktop.windows]]
id = "window:2"
name = "Browser"
width = 1920
height = 1080
color = [240, 240, 240]
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert_eq!(config.capture.selection, "auto");
        assert_eq!(config.server.bind, "0.0.0.0:8181");
        assert!(config.desktop.windows.is_empty());
    }

    #[test]
    fn test_sample_config_parses() {
        let config: ConfigFile = toml::from_str(&sample_config()).unwrap();
        assert_eq!(config.capture.max_width, 400);
        assert_eq!(config.desktop.windows.len(), 2);
        assert_eq!(config.desktop.windows[1].width, 1920);
        assert!(config.capture_config().is_ok());
        assert!(config.server_config().is_ok());
    }

    #[test]
    fn test_unknown_selection_mode_is_rejected() {
        let settings = CaptureSettings {
            selection: "sometimes".to_string(),
            ..CaptureSettings::default()
        };
        assert!(matches!(
            settings.to_config(),
            Err(SightlineError::Config(_))
        ));
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let settings = CaptureSettings {
            selection: "manual".to_string(),
            ..CaptureSettings::default()
        };
        let config = settings.to_config().unwrap();
        assert_eq!(config.selection, SelectionMode::Manual);
        assert_eq!(config.selection_timeout(), None);
    }
}
