//! Ebuild generation for ros-overlay.

use super::{
    GenerationOutcome, InstallerGenerator, dependency_set, existing_versions, not_generated,
    read_manifest, remove_stale,
};
use crate::license::{classify, is_gentoo_token};
use crate::paths::ebuild_dir;
use crate::recipe::Ebuild;
use crate::resolver::DependencyResolver;
use crate::{GenerationContext, Reporter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use flor_schema::{DependencyCategory, DependencySet, Distribution, Platform};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub struct GentooGenerator<'a> {
    root: PathBuf,
    resolver: DependencyResolver<'a>,
    reporter: &'a dyn Reporter,
    skip_keys: BTreeSet<String>,
    distributor: String,
    year: i32,
}

impl std::fmt::Debug for GentooGenerator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GentooGenerator")
            .field("root", &self.root)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

/// Gentoo license names, or the first string nothing can express.
fn gentoo_licenses(raw: &[String]) -> std::result::Result<Vec<String>, String> {
    raw.iter()
        .map(|license| match classify(license) {
            Some(known) => Ok(known),
            None if is_gentoo_token(license) => Ok(license.clone()),
            None => Err(license.clone()),
        })
        .collect()
}

impl<'a> GentooGenerator<'a> {
    pub fn new(root: &Path, resolver: DependencyResolver<'a>, reporter: &'a dyn Reporter) -> Self {
        Self {
            root: root.to_path_buf(),
            resolver,
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

    pub fn with_copyright(mut self, distributor: &str, year: i32) -> Self {
        self.distributor = distributor.to_string();
        self.year = year;
        self
    }

    async fn resolve(
        &self,
        ctx: &mut GenerationContext,
        deps: &DependencySet,
        categories: &[DependencyCategory],
        unresolved: &mut BTreeSet<String>,
    ) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for category in categories {
            let resolved = self
                .resolver
                .resolve_all(ctx, deps.internal(*category), deps.external(*category), false)
                .await;
            ctx.platform_deps.extend(resolved.platform);
            unresolved.extend(resolved.unresolved);
            names.extend(resolved.names);
        }
        names
    }
}

#[async_trait]
impl InstallerGenerator for GentooGenerator<'_> {
    async fn generate(
        &self,
        ctx: &mut GenerationContext,
        distro: &Distribution,
        pkg: &str,
        preserve_existing: bool,
    ) -> Result<GenerationOutcome> {
        use DependencyCategory::{Build, BuildTool, BuildToolExport, Export, Run, Test};

        let name = distro.name();
        let (version, component, src_uri) = match (
            distro.version(pkg),
            distro.repository_name(pkg),
            distro.release_archive_url(pkg),
        ) {
            (Ok(v), Ok(c), Ok(u)) => (v.for_platform(Platform::Gentoo), c.to_string(), u),
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                return Ok(not_generated(ctx, pkg, e));
            }
        };
        let dashed = pkg.replace('_', "-");
        let dir = ebuild_dir(&self.root, name, &dashed);
        let path = dir.join(format!("{dashed}-{version}.ebuild"));

        let existing = existing_versions(&dir, &format!("{dashed}-"), ".ebuild");
        if preserve_existing && existing.iter().any(|(p, _)| p == &path) {
            self.reporter
                .ok(&format!("ebuild for package '{pkg}' up to date, skipping..."));
            ctx.register_recipe(&dashed, &version, &component);
            return Ok(GenerationOutcome::Unchanged);
        }
        let previous = existing
            .iter()
            .map(|(_, v)| v)
            .find(|v| **v != version)
            .cloned();

        let (_, meta) = match read_manifest(distro, pkg) {
            Ok(found) => found,
            Err(e) => return Ok(not_generated(ctx, pkg, e)),
        };
        let licenses = match gentoo_licenses(&meta.licenses) {
            Ok(licenses) => licenses,
            Err(unknown) => return Ok(GenerationOutcome::UnknownLicense(unknown)),
        };

        let deps = dependency_set(&meta, distro, &self.skip_keys);
        let mut unresolved = BTreeSet::new();
        let rdepend = self
            .resolve(ctx, &deps, &[Run, Export, BuildToolExport], &mut unresolved)
            .await;
        let depend = self
            .resolve(ctx, &deps, &[Build, BuildTool], &mut unresolved)
            .await;
        let tdepend = self.resolve(ctx, &deps, &[Test], &mut unresolved).await;
        if !unresolved.is_empty() {
            return Ok(GenerationOutcome::UnresolvedDependency(
                unresolved.into_iter().collect(),
            ));
        }

        let ebuild = Ebuild {
            distro: name.to_string(),
            ros_version: distro.ros_version(),
            name: pkg.to_string(),
            description: meta.description.clone(),
            homepage: meta.homepage.clone(),
            src_uri,
            licenses,
            build_type: meta.build_type.clone(),
            maintainer_name: meta.maintainer_name.clone(),
            maintainer_email: meta.maintainer_email.clone(),
            depend: depend.difference(&rdepend).cloned().collect(),
            rdepend,
            tdepend,
        };

        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        remove_stale(&existing, &path)?;
        std::fs::write(&path, ebuild.sections(&self.distributor, self.year).render())
            .with_context(|| format!("Failed to write ebuild {}", path.display()))?;
        std::fs::write(dir.join("metadata.xml"), ebuild.metadata_xml())
            .with_context(|| format!("Failed to write metadata.xml for '{pkg}'"))?;
        tracing::info!("wrote {}", path.display());
        ctx.register_recipe(&dashed, &version, &component);

        Ok(GenerationOutcome::Changed { version, previous })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolutionTable;
    use crate::NullReporter;
    use flor_schema::DistributionCache;

    struct Rules;

    impl ResolutionTable for Rules {
        fn resolve(&self, key: &str, _platform: Platform) -> Option<Vec<String>> {
            match key {
                "boost" => Some(vec!["dev-libs/boost".to_string()]),
                "gtest" => Some(vec!["dev-cpp/gtest".to_string()]),
                _ => None,
            }
        }
    }

    fn cache(extra_dep: &str, license: &str) -> Distribution {
        let yaml = format!(
            r#"
name: humble
distribution_file:
- repositories:
    demos:
      release:
        packages: [demo_nodes, demo_msgs]
        url: https://github.com/ros2-gbp/demos-release.git
        version: 0.20.3-2
release_package_xmls:
  demo_nodes: |
    <package format="3">
      <name>demo_nodes</name>
      <version>0.20.3</version>
      <description>Demo</description>
      <maintainer email="jane@example.com">Jane</maintainer>
      <license>{license}</license>
      <buildtool_depend>boost</buildtool_depend>
      <depend>demo_msgs</depend>
      <test_depend>gtest</test_depend>
      {extra_dep}
    </package>
"#
        );
        Distribution::from_cache(DistributionCache::parse(&yaml).unwrap(), 2).unwrap()
    }

    #[tokio::test]
    async fn test_generate_ebuild() {
        let dir = tempfile::tempdir().unwrap();
        let table = Rules;
        let resolver = DependencyResolver::new("gentoo", "humble", &table, &NullReporter).unwrap();
        let generator = GentooGenerator::new(dir.path(), resolver, &NullReporter);
        let mut ctx = GenerationContext::new();
        let outcome = generator
            .generate(&mut ctx, &cache("", "BSD"), "demo_nodes", false)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            GenerationOutcome::Changed {
                version: "0.20.3-r2".to_string(),
                previous: None
            }
        );

        let pkg_dir = dir.path().join("ros-humble/demo-nodes");
        let text = std::fs::read_to_string(pkg_dir.join("demo-nodes-0.20.3-r2.ebuild")).unwrap();
        assert!(text.contains("RDEPEND=\"\n\tros-humble/demo-msgs\n\"\n"));
        assert!(text.contains("DEPEND=\"${RDEPEND}\n\tdev-libs/boost\n\ttest? (\n\t\tdev-cpp/gtest\n\t)\n\"\n"));
        assert!(text.contains("LICENSE=\"BSD\"\n"));
        assert!(pkg_dir.join("metadata.xml").exists());
    }

    #[tokio::test]
    async fn test_unresolved_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let table = Rules;
        let resolver = DependencyResolver::new("gentoo", "humble", &table, &NullReporter).unwrap();
        let generator = GentooGenerator::new(dir.path(), resolver, &NullReporter);
        let mut ctx = GenerationContext::new();
        let outcome = generator
            .generate(
                &mut ctx,
                &cache("<exec_depend>mystery</exec_depend>", "BSD"),
                "demo_nodes",
                false,
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            GenerationOutcome::UnresolvedDependency(vec!["mystery".to_string()])
        );
        assert!(!dir.path().join("ros-humble/demo-nodes").exists());
    }

    #[tokio::test]
    async fn test_unknown_license() {
        let dir = tempfile::tempdir().unwrap();
        let table = Rules;
        let resolver = DependencyResolver::new("gentoo", "humble", &table, &NullReporter).unwrap();
        let generator = GentooGenerator::new(dir.path(), resolver, &NullReporter);
        let mut ctx = GenerationContext::new();
        let outcome = generator
            .generate(&mut ctx, &cache("", "Some Odd License!"), "demo_nodes", false)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            GenerationOutcome::UnknownLicense("Some Odd License!".to_string())
        );
    }

    #[test]
    fn test_gentoo_licenses() {
        let raw = vec!["Apache License 2.0".to_string(), "Unlicense".to_string()];
        assert_eq!(
            gentoo_licenses(&raw).unwrap(),
            vec!["Apache-2.0".to_string(), "Unlicense".to_string()]
        );
    }
}
