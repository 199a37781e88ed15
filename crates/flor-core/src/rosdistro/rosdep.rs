//! The rosdep rule table.
//!
//! rosdep rules map a key to per-OS installer rules:
//!
//! ```yaml
//! boost:
//!   gentoo: [dev-libs/boost]
//!   openembedded: [boost@openembedded-core]
//! python3-yaml:
//!   openembedded:
//!     '*': ['${PYTHON_PN}-pyyaml@openembedded-core']
//! ```

use crate::resolver::ResolutionTable;
use crate::retry::{RetryConfig, retry_on_error};
use crate::Reporter;
use anyhow::{Context, Result};
use flor_schema::Platform;
use reqwest::Client;
use serde_yaml::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct RosdepTable {
    rules: BTreeMap<String, Value>,
}

/// Extract the package names of a rule value.
///
/// `None` means the value has no usable rule for `version`.
fn packages(value: &Value, version: &str) -> Option<Vec<String>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::String(s) => Some(s.split_whitespace().map(ToString::to_string).collect()),
        Value::Sequence(items) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(ToString::to_string))
                .collect(),
        ),
        Value::Mapping(map) => {
            if let Some(pkgs) = map.get("packages") {
                return packages(pkgs, version);
            }
            if !version.is_empty() {
                if let Some(v) = map.get(version) {
                    return packages(v, version);
                }
            }
            if let Some(v) = map.get("*") {
                return packages(v, version);
            }
            // a single installer key, e.g. `portage: {packages: [...]}`
            if map.len() == 1 {
                if let Some((_, v)) = map.iter().next() {
                    if v.is_mapping() {
                        return packages(v, version);
                    }
                }
            }
            None
        }
        _ => None,
    }
}

impl RosdepTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge rules from a rosdep YAML document. Keys already present keep
    /// their earlier rule, so sources are listed in priority order.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed YAML.
    pub fn add_source(&mut self, yaml: &str) -> Result<usize> {
        let doc: BTreeMap<String, Value> =
            serde_yaml::from_str::<Option<_>>(yaml)?.unwrap_or_default();
        let mut added = 0;
        for (key, rule) in doc {
            if let std::collections::btree_map::Entry::Vacant(e) = self.rules.entry(key) {
                e.insert(rule);
                added += 1;
            }
        }
        Ok(added)
    }

    /// Parse a single document.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut table = Self::new();
        table.add_source(yaml)?;
        Ok(table)
    }

    /// Load rules from URLs or local paths, in priority order.
    ///
    /// # Errors
    ///
    /// Returns an error if any source cannot be fetched, read or parsed.
    pub async fn load(client: &Client, sources: &[String], reporter: &dyn Reporter) -> Result<Self> {
        let mut table = Self::new();
        for source in sources {
            let text = if source.starts_with("http://") || source.starts_with("https://") {
                retry_on_error(
                    &RetryConfig::default(),
                    reporter,
                    "Retrying rosdep source download",
                    "Failed to download rosdep source",
                    || async {
                        client
                            .get(source)
                            .send()
                            .await?
                            .error_for_status()?
                            .text()
                            .await
                    },
                )
                .await
                .with_context(|| format!("Failed to fetch rosdep source {source}"))?
            } else {
                std::fs::read_to_string(source)
                    .with_context(|| format!("Failed to read rosdep source {source}"))?
            };
            let added = table
                .add_source(&text)
                .with_context(|| format!("Invalid rosdep source {source}"))?;
            tracing::debug!("{added} rosdep keys from {source}");
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl ResolutionTable for RosdepTable {
    fn resolve(&self, key: &str, platform: Platform) -> Option<Vec<String>> {
        let os_rules = self.rules.get(key)?.get(platform.as_str())?;
        packages(os_rules, platform.rosdep_version())
    }
}
