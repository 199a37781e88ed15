//! ros-overlay checkout.

use super::{CommitScope, commit_message};
use crate::docker::{Docker, RunSpec};
use crate::git::RepoInstance;
use crate::util::rand_ascii_str;
use crate::Reporter;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const CONTAINER_OVERLAY: &str = "/tmp/ros-overlay";
const MANIFEST_IMAGE_TAG: &str = "gentoo_repoman";

/// Where the repoman container comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestImage {
    /// Build from a Dockerfile (or the directory holding one).
    Dockerfile(PathBuf),
    /// Pull `org/repo[:tag]`.
    Image(String),
}

pub struct RosOverlay {
    repo: RepoInstance,
    branch: String,
}

impl std::fmt::Debug for RosOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RosOverlay")
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .finish()
    }
}

/// Mounts and commands that run `repoman manifest` for every package.
pub fn manifest_spec(
    repo_dir: &Path,
    gnupg: Option<&Path>,
    regen: &BTreeMap<String, Vec<String>>,
) -> RunSpec {
    let mut spec = RunSpec::default();
    if let Some(gnupg) = gnupg {
        spec.map_directory(&gnupg.to_string_lossy(), Some("/root/.gnupg"), "rw");
    }
    spec.map_directory(&repo_dir.to_string_lossy(), Some(CONTAINER_OVERLAY), "rw");
    for (distro, pkgs) in regen {
        for pkg in pkgs {
            let dashed = pkg.replace('_', "-");
            spec.add_bash_command(&format!("cd {CONTAINER_OVERLAY}/ros-{distro}/{dashed}"));
            spec.add_bash_command("repoman manifest");
        }
    }
    spec
}

fn split_image(image: &str) -> (&str, &str, &str) {
    let (name, tag) = image.rsplit_once(':').unwrap_or((image, "latest"));
    let (org, repo) = name.split_once('/').unwrap_or(("library", name));
    (org, repo, tag)
}

impl RosOverlay {
    /// Take over `repo` on a fresh `gentoo-bot-*` branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch cannot be created.
    pub fn new(repo: RepoInstance, reporter: &dyn Reporter) -> Result<Self> {
        let branch = format!("gentoo-bot-{}", rand_ascii_str(10));
        reporter.info(&format!("Creating new branch {branch}..."));
        repo.create_branch(&branch)?;
        Ok(Self { repo, branch })
    }

    pub fn repo(&self) -> &RepoInstance {
        &self.repo
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Stage the whole overlay and commit it.
    ///
    /// # Errors
    ///
    /// Returns an error if staging or committing fails.
    pub fn commit_changes(
        &self,
        scope: &CommitScope,
        ctime: &str,
        reporter: &dyn Reporter,
    ) -> Result<bool> {
        reporter.info("Adding changes...");
        self.repo.add(&["*"])?;
        reporter.info(&format!("Committing to branch {}...", self.branch));
        let committed = self.repo.commit(&commit_message(scope, ctime))?.is_some();
        if !committed {
            reporter.info("Nothing changed; no commit done");
        }
        Ok(committed)
    }

    /// Regenerate the `Manifest` files of `regen` (distro -> packages) in a
    /// container.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be prepared or repoman fails.
    pub async fn regenerate_manifests(
        &self,
        regen: &BTreeMap<String, Vec<String>>,
        image: &ManifestImage,
        reporter: &dyn Reporter,
    ) -> Result<()> {
        let mut docker = Docker::connect()?;
        match image {
            ManifestImage::Dockerfile(path) => {
                reporter.info("Building docker image...");
                docker.build(path, MANIFEST_IMAGE_TAG).await?;
            }
            ManifestImage::Image(name) => {
                let (org, repo, tag) = split_image(name);
                if let Err(e) = docker.login() {
                    reporter.warn(&format!("{e} Pulling without credentials."));
                }
                reporter.info(&format!("Pulling docker image {org}/{repo}:{tag}..."));
                docker.pull(org, repo, tag).await?;
            }
        }
        reporter.info("Running docker image...");
        reporter.info("Generating manifests...");
        let gnupg = dirs::home_dir().map(|home| home.join(".gnupg"));
        let spec = manifest_spec(self.repo.dir(), gnupg.as_deref(), regen);
        docker.apply(spec);
        docker
            .run(true, true, false, reporter)
            .await
            .context("Failed to regenerate manifests")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::tests::init_repo;
    use crate::NullReporter;

    #[test]
    fn test_manifest_spec() {
        let regen = BTreeMap::from([(
            "humble".to_string(),
            vec!["demo_nodes".to_string(), "rclcpp".to_string()],
        )]);
        let spec = manifest_spec(
            Path::new("/srv/overlay"),
            Some(Path::new("/home/me/.gnupg")),
            &regen,
        );
        assert_eq!(
            spec.command_string(),
            "bash -c 'cd /tmp/ros-overlay/ros-humble/demo-nodes && repoman manifest && \
             cd /tmp/ros-overlay/ros-humble/rclcpp && repoman manifest'"
        );
        assert_eq!(
            spec.binds(),
            vec![
                "/home/me/.gnupg:/root/.gnupg:rw",
                "/srv/overlay:/tmp/ros-overlay:rw"
            ]
        );
    }

    #[test]
    fn test_split_image() {
        assert_eq!(
            split_image("allenh1/ros_gentoo_base:latest"),
            ("allenh1", "ros_gentoo_base", "latest")
        );
        assert_eq!(split_image("gentoo/stage3"), ("gentoo", "stage3", "latest"));
    }

    #[test]
    fn test_branch_and_commit() {
        let dir = tempfile::tempdir().unwrap();
        let overlay = RosOverlay::new(init_repo(dir.path()), &NullReporter).unwrap();
        assert!(overlay.branch().starts_with("gentoo-bot-"));
        assert_eq!(overlay.branch().len(), "gentoo-bot-".len() + 10);

        std::fs::create_dir_all(dir.path().join("ros-humble/demo-nodes")).unwrap();
        std::fs::write(dir.path().join("ros-humble/demo-nodes/metadata.xml"), "x").unwrap();
        assert!(
            overlay
                .commit_changes(&CommitScope::Sync, "now", &NullReporter)
                .unwrap()
        );
        assert_eq!(overlay.repo().status_porcelain().unwrap(), "");
    }
}
