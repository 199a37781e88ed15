//! rosdistro file formats and the resolved view of one distribution.

use crate::types::{PackageName, RosVersion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Errors raised while reading distribution metadata.
#[derive(thiserror::Error, Debug)]
pub enum DistroError {
    /// The package is not released in this distribution.
    #[error("package '{0}' is not part of the distribution")]
    UnknownPackage(String),

    /// A field required for generation is absent.
    #[error("package '{package}' has no '{key}'")]
    MissingKey {
        /// Package being looked up.
        package: String,
        /// Name of the missing field.
        key: &'static str,
    },

    /// The distribution cache did not contain a distribution file.
    #[error("distribution cache for '{0}' has no distribution_file")]
    EmptyCache(String),

    /// YAML parse failure.
    #[error("invalid rosdistro yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// The rosdistro `index-v4.yaml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexFile {
    /// Format version of the index.
    #[serde(default)]
    pub version: u32,
    /// Known distributions keyed by name.
    #[serde(default)]
    pub distributions: BTreeMap<String, DistributionEntry>,
}

/// One distribution listed in the index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistributionEntry {
    /// Relative paths of the distribution files.
    #[serde(default)]
    pub distribution: Vec<String>,
    /// URL of the compressed distribution cache.
    pub distribution_cache: Option<String>,
    /// `active`, `end-of-life`, `rolling`, ...
    pub distribution_status: Option<String>,
    /// `ros1` or `ros2`.
    pub distribution_type: Option<String>,
    /// Python major version of the distro.
    pub python_version: Option<u32>,
}

impl DistributionEntry {
    /// Major ROS version derived from `distribution_type` (`ros2` -> 2).
    pub fn ros_version(&self) -> u32 {
        self.distribution_type
            .as_deref()
            .and_then(|t| t.strip_prefix("ros"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(2)
    }
}

impl IndexFile {
    /// Parse an index from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`DistroError::Yaml`] on malformed input.
    pub fn parse(yaml: &str) -> Result<Self, DistroError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Names of all distributions with the given status, sorted.
    pub fn distros_by_status(&self, status: &str) -> Vec<String> {
        self.distributions
            .iter()
            .filter(|(_, d)| d.distribution_status.as_deref() == Some(status))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Major ROS version of a distro. Unknown distros are assumed to be ROS 2.
    pub fn ros_version(&self, distro: &str) -> u32 {
        self.distributions
            .get(distro)
            .map_or(2, DistributionEntry::ros_version)
    }
}

/// A `distribution.yaml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistributionFile {
    /// Linux distro -> supported releases (`ubuntu: [jammy]`).
    #[serde(default)]
    pub release_platforms: BTreeMap<String, Vec<String>>,
    /// Source repositories keyed by repository name.
    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryEntry>,
}

/// One repository of a distribution file. Only the release section matters here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryEntry {
    /// Release (bloom) repository information.
    pub release: Option<ReleaseRepository>,
}

/// Release repository information for a source repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseRepository {
    /// Packages released from this repository. Empty means a single package
    /// named after the repository.
    #[serde(default)]
    pub packages: Vec<String>,
    /// Tag templates; `release` is used to locate source archives.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// URL of the release repository.
    pub url: Option<String>,
    /// Released version (`x.y.z-N`).
    pub version: Option<String>,
}

/// The distribution cache (`<distro>-cache.yaml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistributionCache {
    /// Distribution name.
    #[serde(default)]
    pub name: String,
    /// Distribution files, later entries override earlier ones.
    #[serde(default)]
    pub distribution_file: Vec<DistributionFile>,
    /// `package.xml` text of every released package.
    #[serde(default)]
    pub release_package_xmls: BTreeMap<String, String>,
}

impl DistributionCache {
    /// Parse a distribution cache from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`DistroError::Yaml`] on malformed input.
    pub fn parse(yaml: &str) -> Result<Self, DistroError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// The resolved view of one distribution: package list, release versions,
/// release repositories and package manifests.
#[derive(Debug, Clone)]
pub struct Distribution {
    name: String,
    ros_version: u32,
    file: DistributionFile,
    package_xmls: BTreeMap<String, String>,
    packages: BTreeMap<PackageName, String>,
}

impl Distribution {
    /// Build a distribution from its file and package manifests.
    pub fn new(
        name: &str,
        ros_version: u32,
        file: DistributionFile,
        package_xmls: BTreeMap<String, String>,
    ) -> Self {
        let mut packages = BTreeMap::new();
        for (repo_name, repo) in &file.repositories {
            let Some(release) = &repo.release else {
                continue;
            };
            if release.packages.is_empty() {
                packages.insert(PackageName::new(repo_name), repo_name.clone());
            } else {
                for pkg in &release.packages {
                    packages.insert(PackageName::new(pkg), repo_name.clone());
                }
            }
        }
        Self {
            name: name.to_string(),
            ros_version,
            file,
            package_xmls,
            packages,
        }
    }

    /// Build a distribution from a parsed cache, merging its distribution files.
    ///
    /// # Errors
    ///
    /// Returns [`DistroError::EmptyCache`] when the cache carries no
    /// distribution file.
    pub fn from_cache(cache: DistributionCache, ros_version: u32) -> Result<Self, DistroError> {
        let mut files = cache.distribution_file.into_iter();
        let mut merged = files
            .next()
            .ok_or_else(|| DistroError::EmptyCache(cache.name.clone()))?;
        for file in files {
            merged.release_platforms.extend(file.release_platforms);
            merged.repositories.extend(file.repositories);
        }
        Ok(Self::new(
            &cache.name,
            ros_version,
            merged,
            cache.release_package_xmls,
        ))
    }

    /// Distribution name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Major ROS version.
    pub fn ros_version(&self) -> u32 {
        self.ros_version
    }

    /// Release platforms of the distribution file.
    pub fn release_platforms(&self) -> &BTreeMap<String, Vec<String>> {
        &self.file.release_platforms
    }

    /// Released package names, sorted.
    pub fn package_names(&self) -> impl Iterator<Item = &PackageName> {
        self.packages.keys()
    }

    /// Number of released packages.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the distribution releases no packages.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Whether `pkg` is released in this distribution.
    pub fn contains(&self, pkg: &str) -> bool {
        self.packages.contains_key(pkg)
    }

    /// Name of the repository `pkg` is released from.
    ///
    /// # Errors
    ///
    /// Returns [`DistroError::UnknownPackage`] for packages outside the distro.
    pub fn repository_name(&self, pkg: &str) -> Result<&str, DistroError> {
        self.packages
            .get(pkg)
            .map(String::as_str)
            .ok_or_else(|| DistroError::UnknownPackage(pkg.to_string()))
    }

    /// Release repository information for `pkg`.
    ///
    /// # Errors
    ///
    /// Returns an error when the package is unknown or its repository has no
    /// release section.
    pub fn release_repository(&self, pkg: &str) -> Result<&ReleaseRepository, DistroError> {
        let repo = self.repository_name(pkg)?;
        self.file
            .repositories
            .get(repo)
            .and_then(|r| r.release.as_ref())
            .ok_or(DistroError::MissingKey {
                package: pkg.to_string(),
                key: "release",
            })
    }

    /// Released version of `pkg`.
    ///
    /// # Errors
    ///
    /// Returns [`DistroError::MissingKey`] when no version is recorded.
    pub fn version(&self, pkg: &str) -> Result<RosVersion, DistroError> {
        let missing = || DistroError::MissingKey {
            package: pkg.to_string(),
            key: "version",
        };
        let raw = self
            .release_repository(pkg)?
            .version
            .as_deref()
            .ok_or_else(missing)?;
        RosVersion::parse(raw).map_err(|_| missing())
    }

    /// The `package.xml` text of `pkg`, if the cache carries it.
    pub fn package_xml(&self, pkg: &str) -> Option<&str> {
        self.package_xmls.get(pkg).map(String::as_str)
    }

    /// URL of the source archive for the released version of `pkg`.
    ///
    /// Built from the release repository URL and its `release` tag template,
    /// e.g. `https://github.com/ros2-gbp/foo-release/archive/release/humble/foo/1.0.0-1.tar.gz`.
    ///
    /// # Errors
    ///
    /// Returns [`DistroError::MissingKey`] when the repository URL or version
    /// is absent.
    pub fn release_archive_url(&self, pkg: &str) -> Result<String, DistroError> {
        let release = self.release_repository(pkg)?;
        let url = release.url.as_deref().ok_or(DistroError::MissingKey {
            package: pkg.to_string(),
            key: "url",
        })?;
        let version = release.version.as_deref().ok_or(DistroError::MissingKey {
            package: pkg.to_string(),
            key: "version",
        })?;
        let template = release
            .tags
            .get("release")
            .map_or("release/{distro}/{package}/{version}", String::as_str);
        let tag = template
            .replace("{package}", pkg)
            .replace("{version}", version)
            .replace("{distro}", &self.name);
        let base = url.strip_suffix(".git").unwrap_or(url);
        Ok(format!("{base}/archive/{tag}.tar.gz"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CACHE: &str = r"
type: cache
version: 2
name: humble
distribution_file:
- release_platforms:
    ubuntu: [jammy]
  repositories:
    ament_cmake:
      release:
        packages: [ament_cmake, ament_cmake_core]
        tags:
          release: release/humble/{package}/{version}
        url: https://github.com/ros2-gbp/ament_cmake-release.git
        version: 1.3.0-1
    rcutils:
      release:
        tags:
          release: release/humble/{package}/{version}
        url: https://github.com/ros2-gbp/rcutils-release.git
        version: 5.1.3-0
    docs_only:
      doc:
        type: git
release_package_xmls:
  rcutils: <package><name>rcutils</name></package>
";

    #[test]
    fn test_release_packages() {
        let cache = DistributionCache::parse(CACHE).unwrap();
        let distro = Distribution::from_cache(cache, 2).unwrap();

        let names: Vec<&str> = distro.package_names().map(PackageName::as_str).collect();
        assert_eq!(names, vec!["ament_cmake", "ament_cmake_core", "rcutils"]);
        assert_eq!(distro.repository_name("ament_cmake_core").unwrap(), "ament_cmake");
        assert!(!distro.contains("docs_only"));
        assert!(distro.package_xml("rcutils").is_some());
    }

    #[test]
    fn test_release_archive_url() {
        let cache = DistributionCache::parse(CACHE).unwrap();
        let distro = Distribution::from_cache(cache, 2).unwrap();
        assert_eq!(
            distro.release_archive_url("ament_cmake_core").unwrap(),
            "https://github.com/ros2-gbp/ament_cmake-release/archive/release/humble/ament_cmake_core/1.3.0-1.tar.gz"
        );
        assert_eq!(distro.version("rcutils").unwrap().upstream(), "5.1.3");
        assert!(matches!(
            distro.version("nope"),
            Err(DistroError::UnknownPackage(_))
        ));
    }

    #[test]
    fn test_index_status_and_ros_version() {
        let index = IndexFile::parse(
            r"
version: 4
distributions:
  humble:
    distribution: [humble/distribution.yaml]
    distribution_cache: http://repo.ros2.org/rosdistro_cache/humble-cache.yaml.gz
    distribution_status: active
    distribution_type: ros2
  noetic:
    distribution: [noetic/distribution.yaml]
    distribution_status: end-of-life
    distribution_type: ros1
",
        )
        .unwrap();
        assert_eq!(index.distros_by_status("active"), vec!["humble"]);
        assert_eq!(index.ros_version("noetic"), 1);
        assert_eq!(index.ros_version("unknown"), 2);
    }

    #[test]
    fn test_empty_cache_is_rejected() {
        let cache = DistributionCache {
            name: "jazzy".to_string(),
            ..DistributionCache::default()
        };
        assert!(matches!(
            Distribution::from_cache(cache, 2),
            Err(DistroError::EmptyCache(_))
        ));
    }
}
