//! Optional TOML configuration.
//!
//! Every key has a default pointing at the public ROS, OpenEmbedded and
//! GitHub endpoints, so a missing file is not an error.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_INDEX_URL: &str =
    "https://raw.githubusercontent.com/ros/rosdistro/master/index-v4.yaml";
pub const DEFAULT_ROSDEP_BASE: &str = "https://raw.githubusercontent.com/ros/rosdistro/master/rosdep";
pub const DEFAULT_LAYER_INDEX_URL: &str = "https://layers.openembedded.org";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_PACKAGES_URL: &str = "http://packages.ros.org";
pub const DEFAULT_DISTRIBUTOR: &str = "Open Source Robotics Foundation";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// rosdistro index (`index-v4.yaml`).
    pub index_url: String,
    /// rosdep rule files, URLs or local paths, merged in order.
    pub rosdep_sources: Vec<String>,
    /// OpenEmbedded layer index used as a last resort for unresolved keys.
    pub layer_index_url: String,
    /// GitHub REST API base.
    pub github_api_url: String,
    /// ROS apt repository, for the newer-platform-components list.
    pub packages_url: String,
    /// Ubuntu release whose `Sources.gz` is scanned. Defaults to the first
    /// Ubuntu release platform of the distro.
    pub platform_release: Option<String>,
    /// Copyright holder written into generated files.
    pub distributor: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            rosdep_sources: ["base.yaml", "python.yaml", "ruby.yaml"]
                .iter()
                .map(|f| format!("{DEFAULT_ROSDEP_BASE}/{f}"))
                .collect(),
            layer_index_url: DEFAULT_LAYER_INDEX_URL.to_string(),
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            packages_url: DEFAULT_PACKAGES_URL.to_string(),
            platform_release: None,
            distributor: DEFAULT_DISTRIBUTOR.to_string(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this schema.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse flor configuration")
    }

    /// Load configuration from `explicit`, else the default location, else defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be read, or any
    /// file that exists fails to parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            return Self::from_toml(&text);
        }
        if let Some(path) = crate::paths::default_config_path() {
            if path.exists() {
                tracing::debug!("loading config from {}", path.display());
                let text = std::fs::read_to_string(&path)?;
                return Self::from_toml(&text);
            }
        }
        Ok(Self::default())
    }
}
