//! BitBake recipe generation for meta-ros.

use super::{
    GenerationOutcome, InstallerGenerator, dependency_set, existing_versions, not_generated,
    read_manifest, remove_stale,
};
use crate::archive::{ArchiveRequest, ArchiveSource};
use crate::naming::convert_to_oe_name;
use crate::paths::{recipe_path, recipes_dir};
use crate::recipe::yocto::{license_line, src_location};
use crate::recipe::YoctoRecipe;
use crate::resolver::DependencyResolver;
use crate::{FlorError, GenerationContext, Reporter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use flor_schema::{Distribution, Platform};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub struct YoctoGenerator<'a> {
    root: PathBuf,
    resolver: DependencyResolver<'a>,
    archives: &'a dyn ArchiveSource,
    reporter: &'a dyn Reporter,
    skip_keys: BTreeSet<String>,
    distributor: String,
    year: i32,
}

impl std::fmt::Debug for YoctoGenerator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoctoGenerator")
            .field("root", &self.root)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

/// Existing `<oe_name>_<version>.bb` files in any component directory.
fn existing_recipes(root: &Path, distro: &str, oe_name: &str) -> Vec<(PathBuf, String)> {
    let prefix = format!("{oe_name}_");
    let Ok(entries) = std::fs::read_dir(recipes_dir(root, distro)) else {
        return Vec::new();
    };
    let mut found: Vec<(PathBuf, String)> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .flat_map(|dir| existing_versions(&dir, &prefix, ".bb"))
        .collect();
    found.sort();
    found
}

impl<'a> YoctoGenerator<'a> {
    pub fn new(
        root: &Path,
        resolver: DependencyResolver<'a>,
        archives: &'a dyn ArchiveSource,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            resolver,
            archives,
            reporter,
            skip_keys: BTreeSet::new(),
            distributor: crate::config::DEFAULT_DISTRIBUTOR.to_string(),
            year: 1970,
        }
    }

    pub fn with_skip_keys(mut self, skip_keys: BTreeSet<String>) -> Self {
        self.skip_keys = skip_keys;
        self
    }

    /// Copyright line of generated recipes.
    pub fn with_copyright(mut self, distributor: &str, year: i32) -> Self {
        self.distributor = distributor.to_string();
        self.year = year;
        self
    }
}

#[async_trait]
impl InstallerGenerator for YoctoGenerator<'_> {
    async fn generate(
        &self,
        ctx: &mut GenerationContext,
        distro: &Distribution,
        pkg: &str,
        preserve_existing: bool,
    ) -> Result<GenerationOutcome> {
        let name = distro.name();
        let version = match distro.version(pkg) {
            Ok(v) => v.for_platform(Platform::OpenEmbedded),
            Err(e) => return Ok(not_generated(ctx, pkg, e)),
        };
        let component = match distro.repository_name(pkg) {
            Ok(c) => c.to_string(),
            Err(e) => {
                let err = FlorError::from(e);
                return Ok(GenerationOutcome::MissingMetadata(err.to_string()));
            }
        };
        let oe_component = convert_to_oe_name(&component, false);
        let oe_name = convert_to_oe_name(pkg, false);
        let path = recipe_path(&self.root, name, &oe_component, &oe_name, &version);

        let existing = existing_recipes(&self.root, name, &oe_name);
        if preserve_existing && existing.iter().any(|(p, _)| p == &path) {
            self.reporter
                .ok(&format!("recipe for package '{pkg}' up to date, skipping..."));
            ctx.register_recipe(&oe_name, &version, &oe_component);
            return Ok(GenerationOutcome::Unchanged);
        }
        let previous = existing
            .iter()
            .map(|(_, v)| v)
            .find(|v| **v != version)
            .cloned();

        let src_uri = match distro.release_archive_url(pkg) {
            Ok(url) => url,
            Err(e) => return Ok(not_generated(ctx, pkg, e)),
        };
        if src_location(&src_uri).is_none() {
            return Ok(not_generated(ctx, pkg, FlorError::NotGitHub(src_uri)));
        }
        let (xml, meta) = match read_manifest(distro, pkg) {
            Ok(found) => found,
            Err(e) => return Ok(not_generated(ctx, pkg, e)),
        };
        if license_line(&xml).is_none() {
            let missing = FlorError::MissingMetadata {
                pkg: pkg.to_string(),
                what: "license",
            };
            return Ok(not_generated(ctx, pkg, missing));
        }

        let checksums = self
            .archives
            .checksums(ArchiveRequest {
                package: pkg,
                version: &version,
                distro: name,
                url: &src_uri,
            })
            .await
            .with_context(|| format!("Failed to fetch the source archive of '{pkg}'"))?;

        let recipe = YoctoRecipe {
            name: pkg.to_string(),
            component,
            version: version.clone(),
            description: meta.description.clone(),
            maintainer: meta.maintainer(),
            author: meta.author(),
            homepage: meta.homepage.clone(),
            licenses: meta.licenses.clone(),
            build_type: meta.build_type.clone(),
            package_xml: xml,
            src_uri,
            checksums,
            deps: dependency_set(&meta, distro, &self.skip_keys),
        };
        let deps = recipe.resolve(ctx, &self.resolver).await;
        let Some(text) = recipe.sections(&deps, &self.distributor, self.year) else {
            let missing = FlorError::MissingMetadata {
                pkg: pkg.to_string(),
                what: "recipe layout",
            };
            return Ok(not_generated(ctx, pkg, missing));
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        remove_stale(&existing, &path)?;
        std::fs::write(&path, text.render())
            .with_context(|| format!("Failed to write recipe {}", path.display()))?;
        tracing::info!("wrote {}", path.display());
        ctx.register_recipe(&oe_name, &version, &oe_component);

        Ok(GenerationOutcome::Changed { version, previous })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveChecksums;
    use crate::resolver::ResolutionTable;
    use crate::NullReporter;
    use flor_schema::DistributionCache;

    struct NoRules;

    impl ResolutionTable for NoRules {
        fn resolve(&self, key: &str, _platform: Platform) -> Option<Vec<String>> {
            (key == "boost").then(|| vec!["boost".to_string()])
        }
    }

    struct FixedSums;

    #[async_trait]
    impl ArchiveSource for FixedSums {
        async fn checksums(&self, _request: ArchiveRequest<'_>) -> Result<ArchiveChecksums> {
            Ok(ArchiveChecksums {
                md5: "m".to_string(),
                sha256: "s".to_string(),
            })
        }
    }

    const CACHE: &str = r#"
name: humble
distribution_file:
- release_platforms:
    ubuntu: [jammy]
  repositories:
    demos:
      release:
        packages: [demo_nodes]
        tags: {release: 'release/humble/{package}/{version}'}
        url: https://github.com/ros2-gbp/demos-release.git
        version: 0.20.3-1
    elsewhere:
      release:
        url: https://gitlab.com/foo/elsewhere-release.git
        version: 1.0.0-1
release_package_xmls:
  demo_nodes: |
    <package format="3">
      <name>demo_nodes</name>
      <version>0.20.3</version>
      <description>Demo</description>
      <maintainer email="jane@example.com">Jane</maintainer>
      <license>Apache License 2.0</license>
      <depend>boost</depend>
    </package>
"#;

    fn distro() -> Distribution {
        Distribution::from_cache(DistributionCache::parse(CACHE).unwrap(), 2).unwrap()
    }

    #[tokio::test]
    async fn test_generate_writes_recipe_then_preserves() {
        let dir = tempfile::tempdir().unwrap();
        let table = NoRules;
        let resolver =
            DependencyResolver::new("openembedded", "humble", &table, &NullReporter).unwrap();
        let generator = YoctoGenerator::new(dir.path(), resolver, &FixedSums, &NullReporter)
            .with_copyright("Example", 2026);
        let distro = distro();
        let mut ctx = GenerationContext::new();

        let outcome = generator
            .generate(&mut ctx, &distro, "demo_nodes", true)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            GenerationOutcome::Changed {
                version: "0.20.3-1".to_string(),
                previous: None
            }
        );
        let path = dir
            .path()
            .join("generated-recipes-humble/demos/demo-nodes_0.20.3-1.bb");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("ROS_BUILD_DEPENDS = \" \\\n    boost \\\n\"\n"));
        assert!(ctx.platform_deps.contains("boost"));
        assert_eq!(
            ctx.recipes.get("demo-nodes"),
            Some(&("0.20.3-1".to_string(), "demos".to_string()))
        );

        let mut ctx = GenerationContext::new();
        let again = generator
            .generate(&mut ctx, &distro, "demo_nodes", true)
            .await
            .unwrap();
        assert_eq!(again, GenerationOutcome::Unchanged);
        assert!(ctx.recipes.contains_key("demo-nodes"));
    }

    #[tokio::test]
    async fn test_replaces_older_version() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir
            .path()
            .join("generated-recipes-humble/demos/demo-nodes_0.20.2-1.bb");
        std::fs::create_dir_all(old.parent().unwrap()).unwrap();
        std::fs::write(&old, "old").unwrap();

        let table = NoRules;
        let resolver =
            DependencyResolver::new("openembedded", "humble", &table, &NullReporter).unwrap();
        let generator = YoctoGenerator::new(dir.path(), resolver, &FixedSums, &NullReporter);
        let mut ctx = GenerationContext::new();
        let outcome = generator
            .generate(&mut ctx, &distro(), "demo_nodes", true)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            GenerationOutcome::Changed {
                version: "0.20.3-1".to_string(),
                previous: Some("0.20.2-1".to_string())
            }
        );
        assert!(!old.exists());
    }

    #[tokio::test]
    async fn test_non_github_source_is_not_generated() {
        let dir = tempfile::tempdir().unwrap();
        let table = NoRules;
        let resolver =
            DependencyResolver::new("openembedded", "humble", &table, &NullReporter).unwrap();
        let generator = YoctoGenerator::new(dir.path(), resolver, &FixedSums, &NullReporter);
        let mut ctx = GenerationContext::new();
        let outcome = generator
            .generate(&mut ctx, &distro(), "elsewhere", false)
            .await
            .unwrap();
        let GenerationOutcome::MissingMetadata(reason) = outcome else {
            panic!("expected missing metadata, got {outcome:?}");
        };
        assert!(reason.contains("non-GitHub repositories is not supported"));
        assert!(ctx.not_generated.contains("elsewhere"));
        assert!(ctx.recipes.is_empty());
    }
}
