//! Full regeneration of a small distro into a meta-ros checkout.

use anyhow::Result;
use async_trait::async_trait;
use flor_core::archive::{ArchiveChecksums, ArchiveRequest, ArchiveSource};
use flor_core::batch::{BatchOptions, gen_delta_msg, generate_installers};
use flor_core::generator::YoctoGenerator;
use flor_core::git::RepoInstance;
use flor_core::overlay::RosMeta;
use flor_core::repo::RepoKey;
use flor_core::resolver::{
    CacheEntry, DependencyResolver, RecipeLookup, RecipeMatch, ResolutionCache,
};
use flor_core::rosdistro::RosdepTable;
use flor_core::sidecar::{write_change_summary, write_rosdep_resolve};
use flor_core::{GenerationContext, NullReporter, change_summary_path, rosdep_resolve_path};
use flor_schema::{Distribution, DistributionCache};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

const CACHE: &str = r#"
name: humble
distribution_file:
- release_platforms:
    ubuntu: [jammy]
  repositories:
    demos:
      release:
        packages: [talker, usb_cam]
        tags: {release: 'release/humble/{package}/{version}'}
        url: https://github.com/ros2-gbp/demos-release.git
        version: 0.20.3-1
release_package_xmls:
  talker: |
    <package format="3">
      <name>talker</name>
      <version>0.20.3</version>
      <description>Talks</description>
      <maintainer email="jane@example.com">Jane</maintainer>
      <license>Apache License 2.0</license>
      <depend>usb_cam</depend>
    </package>
  usb_cam: |
    <package format="3">
      <name>usb_cam</name>
      <version>0.20.3</version>
      <description>Camera</description>
      <maintainer email="jane@example.com">Jane</maintainer>
      <license>BSD</license>
      <depend>libusb-1.0</depend>
    </package>
"#;

#[derive(Default)]
struct LayerStub {
    calls: AtomicUsize,
}

#[async_trait]
impl RecipeLookup for LayerStub {
    async fn query_recipe(&self, name: &str) -> Result<Option<RecipeMatch>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((name == "libusb-1.0").then(|| RecipeMatch {
            name: "libusb1".to_string(),
            layer: "openembedded-core".to_string(),
        }))
    }
}

struct FixedSums;

#[async_trait]
impl ArchiveSource for FixedSums {
    async fn checksums(&self, _request: ArchiveRequest<'_>) -> Result<ArchiveChecksums> {
        Ok(ArchiveChecksums {
            md5: "0".repeat(32),
            sha256: "0".repeat(64),
        })
    }
}

fn init_checkout(dir: &Path) -> RepoInstance {
    let repo = git2::Repository::init(dir).unwrap();
    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Test").unwrap();
    config.set_str("user.email", "test@example.com").unwrap();
    std::fs::write(dir.join("README"), "meta-ros\n").unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new("README")).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = repo.signature().unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
        .unwrap();
    RepoInstance::open(RepoKey::new("ros", "meta-ros"), dir).unwrap()
}

#[tokio::test]
async fn test_regenerate_two_package_distro() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let meta = RosMeta::new(init_checkout(root), "superflore/20260101000000", &NullReporter)
        .unwrap();

    let distro =
        Distribution::from_cache(DistributionCache::parse(CACHE).unwrap(), 2).unwrap();
    let table = RosdepTable::new();
    let lookup = LayerStub::default();
    let resolver = DependencyResolver::new("openembedded", "humble", &table, &NullReporter)
        .unwrap()
        .with_lookup(&lookup);
    let generator = YoctoGenerator::new(root, resolver, &FixedSums, &NullReporter);

    let mut ctx = GenerationContext::new();
    let report = generate_installers(
        &mut ctx,
        &distro,
        &generator,
        &BatchOptions::default(),
        &NullReporter,
    )
    .await
    .unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.installers, vec!["talker", "usb_cam"]);
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);

    let recipes = root.join("generated-recipes-humble/demos");
    let talker = std::fs::read_to_string(recipes.join("talker_0.20.3-1.bb")).unwrap();
    assert!(talker.contains("ROS_BUILD_DEPENDS = \" \\\n    usb-cam \\\n\"\n"));
    let usb_cam = std::fs::read_to_string(recipes.join("usb-cam_0.20.3-1.bb")).unwrap();
    assert!(usb_cam.contains("ROS_BUILD_DEPENDS = \" \\\n    libusb1 \\\n\"\n"));

    write_rosdep_resolve(root, "humble", &ctx, &NullReporter).unwrap();
    let dump = std::fs::read_to_string(rosdep_resolve_path(root, "humble")).unwrap();
    let body = dump.split_once('\n').unwrap().1;
    let entries = ResolutionCache::parse_dump(body).unwrap();
    assert_eq!(
        entries,
        BTreeMap::from([(
            "libusb-1.0".to_string(),
            CacheEntry::Resolved(["libusb1".to_string()].into())
        )])
    );

    let summary = meta.change_summary().unwrap();
    write_change_summary(root, "humble", &summary, &NullReporter).unwrap();
    let written = std::fs::read_to_string(change_summary_path(root, "humble")).unwrap();
    assert!(written.starts_with("humble/superflore-change-summary.txt\n-----\n"));
    assert!(written.contains("A  generated-recipes-humble/demos/talker_0.20.3-1.bb"));
    assert!(written.contains("A  generated-recipes-humble/demos/usb-cam_0.20.3-1.bb"));

    let delta = gen_delta_msg(&BTreeMap::from([("humble".to_string(), report.changes)]));
    assert!(delta.contains("* *talker 0.20.3-1*\n* *usb_cam 0.20.3-1*\n"));
}
