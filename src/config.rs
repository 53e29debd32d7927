//! Configuration for rendering, import and archive operations
//!
//! Everything that used to be a module-level constant (server URL, colours,
//! archive naming) lives here and is passed explicitly to the entry points.
//! A complete configuration can be loaded from a TOML file; every section and
//! field is optional and falls back to its default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    pub repository: RepositoryConfig,
    pub render: RenderConfig,
    pub import: ImportConfig,
    pub archive: ArchiveConfig,
}

impl SdkConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Connection settings for a remote repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Base URL of the REST API (e.g. `https://girder.example.com/api/v1`)
    pub api_url: String,
    /// API key exchanged for a session token
    pub api_key: Option<String>,
    /// Session token used directly
    pub token: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            api_url: "https://girder.example.com/api/v1".to_string(),
            api_key: None,
            token: None,
            timeout_secs: 60,
        }
    }
}

impl RepositoryConfig {
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Overlay rendering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// JPEG quality (1-100)
    pub quality: u8,
    /// Which annotation layer of an annotation file to draw
    pub layer_index: usize,
    /// RGBA fill of closed polylines
    pub fill_color: [u8; 4],
    /// RGBA outline of closed polylines
    pub outline_color: [u8; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            quality: 92,
            layer_index: 0,
            fill_color: [74, 204, 181, 74],
            outline_color: [0, 212, 186, 255],
        }
    }
}

impl RenderConfig {
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_layer_index(mut self, index: usize) -> Self {
        self.layer_index = index;
        self
    }

    pub fn with_fill_color(mut self, rgba: [u8; 4]) -> Self {
        self.fill_color = rgba;
        self
    }

    pub fn with_outline_color(mut self, rgba: [u8; 4]) -> Self {
        self.outline_color = rgba;
        self
    }
}

/// What to do when the repository fails for a single entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Stop the run and return the error
    #[default]
    Abort,
    /// Log the failure, count it, and continue with the next entity
    SkipEntity,
}

impl std::str::FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(ErrorPolicy::Abort),
            "skip" | "skip-entity" => Ok(ErrorPolicy::SkipEntity),
            _ => Err(format!(
                "Invalid error policy: {}. Expected: abort, skip",
                s
            )),
        }
    }
}

/// Import behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub error_policy: ErrorPolicy,
    /// Re-apply annotation access blocks on created annotations
    pub apply_access_control: bool,
    /// Copy `meta` blobs onto created collections, folders and items
    pub apply_metadata: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::Abort,
            apply_access_control: true,
            apply_metadata: true,
        }
    }
}

impl ImportConfig {
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_access_control(mut self, enabled: bool) -> Self {
        self.apply_access_control = enabled;
        self
    }

    pub fn with_metadata(mut self, enabled: bool) -> Self {
        self.apply_metadata = enabled;
        self
    }
}

/// Archive naming and de-duplication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Prefix of dated backup archives
    pub name_prefix: String,
    /// Remove a new archive identical to the previous one
    pub dedup: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            name_prefix: "Annotation_Backup_".to_string(),
            dedup: true,
        }
    }
}

impl ArchiveConfig {
    /// Archive base name for today (`<prefix>YYYY_MM_DD`)
    pub fn dated_name(&self) -> String {
        format!(
            "{}{}",
            self.name_prefix,
            chrono::Local::now().format("%Y_%m_%d")
        )
    }

    /// Glob matching every archive produced with this prefix
    pub fn glob_pattern(&self) -> String {
        format!("{}*.tar.gz", self.name_prefix)
    }
}
