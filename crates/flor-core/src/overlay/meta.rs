//! meta-ros checkout.

use crate::git::RepoInstance;
use crate::Reporter;
use anyhow::Result;
use std::path::Path;

const SEPARATOR: &str = "-----";

pub struct RosMeta {
    repo: RepoInstance,
    branch: String,
}

impl std::fmt::Debug for RosMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RosMeta")
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .finish()
    }
}

/// Paths a regeneration of `distro` writes.
fn generated_paths(distro: &str) -> Vec<String> {
    vec![
        format!("generated-recipes-{distro}"),
        format!("conf/ros-distro/include/{distro}/*.inc"),
        format!("files/{distro}/cache.*"),
        format!("files/{distro}/rosdep-resolve.yaml"),
        format!("files/{distro}/newer-platform-components.list"),
        format!("files/{distro}/superflore-change-summary.txt"),
    ]
}

impl RosMeta {
    /// Take over `repo` and switch it to a new `branch`.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch cannot be created.
    pub fn new(repo: RepoInstance, branch: &str, reporter: &dyn Reporter) -> Result<Self> {
        reporter.info(&format!("Creating new branch {branch}..."));
        repo.create_branch(branch)?;
        Ok(Self {
            repo,
            branch: branch.to_string(),
        })
    }

    pub fn repo(&self) -> &RepoInstance {
        &self.repo
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Stage the generated files of `distros` and commit them.
    ///
    /// Returns whether a commit was made.
    ///
    /// # Errors
    ///
    /// Returns an error if staging or committing fails.
    pub fn commit_changes(
        &self,
        distros: &[String],
        message: &str,
        reporter: &dyn Reporter,
    ) -> Result<bool> {
        reporter.info("Adding changes...");
        let paths: Vec<String> = distros.iter().flat_map(|d| generated_paths(d)).collect();
        let specs: Vec<&str> = paths.iter().map(String::as_str).collect();
        self.repo.add(&specs)?;
        if self.repo.commit(message)?.is_none() {
            reporter.info("Nothing changed; no commit done");
            return Ok(false);
        }
        reporter.info(&format!("Committing to branch {}...", self.branch));
        Ok(true)
    }

    /// Commits so far that touched `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be walked.
    pub fn file_revision_logs(&self, path: &Path) -> Result<usize> {
        self.repo.file_revision_logs(path)
    }

    /// Status and diffs of the regeneration, for the change summary.
    ///
    /// Stages the recipe directories first so that new recipes show up as
    /// added files instead of untracked directories.
    ///
    /// # Errors
    ///
    /// Returns an error if staging, status or diff fails.
    pub fn change_summary(&self) -> Result<String> {
        self.repo.add(&["generated-recipes-*"])?;
        let parts = [
            SEPARATOR.to_string(),
            self.repo.status_porcelain()?,
            SEPARATOR.to_string(),
            self.repo.diff(&["conf"])?,
            SEPARATOR.to_string(),
            self.repo.diff(&[
                "files/*/cache.diffme",
                "files/*/newer-platform-components.list",
                "files/*/rosdep-resolve.yaml",
            ])?,
        ];
        Ok(parts.join("\n") + "\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::tests::init_repo;
    use crate::NullReporter;

    #[test]
    fn test_change_summary_and_commit() {
        let dir = tempfile::tempdir().unwrap();
        let meta = RosMeta::new(
            init_repo(dir.path()),
            "superflore/20260101000000",
            &NullReporter,
        )
        .unwrap();
        let recipes = dir.path().join("generated-recipes-humble/demos");
        std::fs::create_dir_all(&recipes).unwrap();
        std::fs::write(recipes.join("demo-nodes_0.20.3-1.bb"), "x\n").unwrap();

        let summary = meta.change_summary().unwrap();
        assert!(summary.starts_with(
            "-----\nA  generated-recipes-humble/demos/demo-nodes_0.20.3-1.bb\n-----\n"
        ));
        assert!(summary.ends_with("-----\n\n"));

        assert!(
            meta.commit_changes(&["humble".to_string()], "regen", &NullReporter)
                .unwrap()
        );
        assert!(
            !meta
                .commit_changes(&["humble".to_string()], "regen", &NullReporter)
                .unwrap()
        );
        assert_eq!(meta.repo().status_porcelain().unwrap(), "");
    }
}
