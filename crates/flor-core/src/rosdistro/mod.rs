//! rosdistro collaborators: the distribution index, package manifests and
//! the rosdep rule table.

pub mod index;
pub mod package_xml;
pub mod rosdep;

use anyhow::Result;
use async_trait::async_trait;
use flor_schema::{Distribution, DistributionCache, IndexFile};

pub use index::HttpIndex;
pub use package_xml::{ConditionEnv, PackageMetadata};
pub use rosdep::RosdepTable;

/// Source of distribution metadata.
#[async_trait]
pub trait IndexSource: Send + Sync {
    /// The rosdistro index.
    async fn index(&self) -> Result<IndexFile>;

    /// The distribution cache of `distro`, as raw YAML text and parsed.
    async fn distribution_cache(&self, distro: &str) -> Result<(String, DistributionCache)>;

    /// Last-modified time of the distribution cache, `%Y%m%d%H%M%S` in UTC.
    async fn cache_last_modified(&self, distro: &str) -> Result<String>;
}

/// A distribution together with the raw cache text it was built from.
#[derive(Debug, Clone)]
pub struct LoadedDistro {
    pub distribution: Distribution,
    pub cache_yaml: String,
}

/// Fetch and resolve one distribution.
///
/// # Errors
///
/// Returns an error if the index or cache cannot be fetched or parsed.
pub async fn load_distribution(source: &dyn IndexSource, distro: &str) -> Result<LoadedDistro> {
    let index = source.index().await?;
    let (cache_yaml, cache) = source.distribution_cache(distro).await?;
    let distribution = Distribution::from_cache(cache, index.ros_version(distro))?;
    Ok(LoadedDistro {
        distribution,
        cache_yaml,
    })
}
