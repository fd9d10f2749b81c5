//! Configuration schema for Dockyard
//!
//! Configuration is stored at `~/.config/dockyard/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Container runtime settings
    pub runtime: RuntimeConfig,

    /// Artifact cache settings
    pub cache: CacheConfig,

    /// Build settings
    pub build: BuildConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Container runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Runtime CLI to drive: "podman" or "docker"
    pub binary: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary: "podman".to_string(),
        }
    }
}

/// Artifact cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Reuse previous builds when inputs are unchanged (default: true)
    pub enabled: bool,

    /// Cache file location (default: `<state dir>/cache.json`)
    pub file: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: None,
        }
    }
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Push built images to their registry
    pub push: bool,

    /// Registries contacted over plain HTTP / without TLS verification
    pub insecure_registries: Vec<String>,

    /// Tag applied to every artifact
    pub tag: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            push: false,
            insecure_registries: vec![],
            tag: "latest".to_string(),
        }
    }
}
