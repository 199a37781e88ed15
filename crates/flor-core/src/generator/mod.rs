//! Per-package installer generation.
//!
//! A generator turns one released package into a recipe file (or reports
//! why it cannot) and feeds the per-distro accumulators on the way.

pub mod gentoo;
pub mod yocto;

use crate::rosdistro::{ConditionEnv, PackageMetadata};
use crate::{FlorError, GenerationContext};
use anyhow::Result;
use async_trait::async_trait;
use flor_schema::{DependencySet, Distribution};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub use gentoo::GentooGenerator;
pub use yocto::YoctoGenerator;

/// What happened to one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// A recipe was written. `previous` is the version it replaced.
    Changed {
        version: String,
        previous: Option<String>,
    },
    /// An up to date recipe already existed and was kept.
    Unchanged,
    /// Some external keys have no mapping on the target platform.
    UnresolvedDependency(Vec<String>),
    /// A license string that the target cannot express.
    UnknownLicense(String),
    /// Required release or manifest data is absent.
    MissingMetadata(String),
}

#[async_trait]
pub trait InstallerGenerator: Send + Sync {
    /// Generate the recipe of `pkg`.
    ///
    /// Expected per-package failures come back as a [`GenerationOutcome`];
    /// an `Err` means something is wrong beyond this package and the batch
    /// should stop.
    async fn generate(
        &self,
        ctx: &mut GenerationContext,
        distro: &Distribution,
        pkg: &str,
        preserve_existing: bool,
    ) -> Result<GenerationOutcome>;
}

/// Parse the manifest of `pkg` for `distro`.
///
/// Returns the raw XML alongside the parsed fields.
pub(crate) fn read_manifest(
    distro: &Distribution,
    pkg: &str,
) -> std::result::Result<(String, PackageMetadata), FlorError> {
    let xml = distro
        .package_xml(pkg)
        .ok_or_else(|| FlorError::NoPackageXml(pkg.to_string()))?;
    let env = ConditionEnv::for_distro(distro.name(), distro.ros_version());
    let meta = PackageMetadata::parse(xml, &env).map_err(|e| {
        FlorError::context("Failed to parse package.xml", format!("'{pkg}': {e}"))
    })?;
    Ok((xml.to_string(), meta))
}

/// Record `pkg` as not generated because of `err`.
pub(crate) fn not_generated(
    ctx: &mut GenerationContext,
    pkg: &str,
    err: impl Into<FlorError>,
) -> GenerationOutcome {
    ctx.not_generated.insert(pkg.to_string());
    GenerationOutcome::MissingMetadata(err.into().to_string())
}

/// Split the manifest dependencies into internal and external keys.
pub(crate) fn dependency_set(
    meta: &PackageMetadata,
    distro: &Distribution,
    skip_keys: &BTreeSet<String>,
) -> DependencySet {
    let mut deps = DependencySet::with_skip_keys(skip_keys.iter().cloned());
    for (category, key) in &meta.dependencies {
        deps.add(*category, key, distro.contains(key));
    }
    deps
}

/// Files matching `<dir>/<prefix><anything><suffix>`, with the middle part.
pub(crate) fn existing_versions(
    dir: &Path,
    prefix: &str,
    suffix: &str,
) -> Vec<(PathBuf, String)> {
    let pattern = format!(
        "{}/{}*{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(prefix),
        suffix
    );
    let Ok(paths) = glob::glob(&pattern) else {
        return Vec::new();
    };
    let mut found: Vec<(PathBuf, String)> = paths
        .flatten()
        .filter_map(|path| {
            let file = path.file_name()?.to_str()?;
            let version = file.strip_prefix(prefix)?.strip_suffix(suffix)?.to_string();
            Some((path, version))
        })
        .collect();
    found.sort();
    found
}

/// Remove stale recipe files, keeping `keep`.
pub(crate) fn remove_stale(found: &[(PathBuf, String)], keep: &Path) -> Result<()> {
    for (path, _) in found {
        if path != keep {
            tracing::debug!("removing {}", path.display());
            std::fs::remove_file(path)?;
        }
    }
    Ok(())
}
