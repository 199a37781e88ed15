//! Local checkout of the target repository.
//!
//! Thin layer over `git2` with just the operations the orchestrators need:
//! clone or open, branch, stage, commit, porcelain status, diffs and push.

use crate::Reporter;
use crate::recipe::GENERATOR_NAME;
use crate::repo::RepoKey;
use anyhow::{Context, Result, anyhow};
use git2::{
    Cred, DiffFormat, DiffOptions, IndexAddOption, Oid, PushOptions, RemoteCallbacks, Repository,
    Signature, Status, StatusOptions, build::RepoBuilder,
};
use std::path::{Path, PathBuf};

pub struct RepoInstance {
    key: RepoKey,
    dir: PathBuf,
    repo: Repository,
}

impl std::fmt::Debug for RepoInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoInstance")
            .field("key", &self.key)
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

/// Two-letter porcelain code of one status entry.
fn porcelain_code(status: Status) -> String {
    if status.contains(Status::WT_NEW) && !status.intersects(Status::INDEX_NEW) {
        return "??".to_string();
    }
    let index = if status.contains(Status::INDEX_NEW) {
        'A'
    } else if status.contains(Status::INDEX_MODIFIED) {
        'M'
    } else if status.contains(Status::INDEX_DELETED) {
        'D'
    } else if status.contains(Status::INDEX_RENAMED) {
        'R'
    } else if status.contains(Status::INDEX_TYPECHANGE) {
        'T'
    } else {
        ' '
    };
    let worktree = if status.contains(Status::WT_MODIFIED) {
        'M'
    } else if status.contains(Status::WT_DELETED) {
        'D'
    } else if status.contains(Status::WT_RENAMED) {
        'R'
    } else if status.contains(Status::WT_TYPECHANGE) {
        'T'
    } else {
        ' '
    };
    format!("{index}{worktree}")
}

impl RepoInstance {
    /// Clone `key` into `dir`, optionally checking out `branch`.
    ///
    /// # Errors
    ///
    /// Returns an error if the clone fails.
    pub fn clone_from(
        key: RepoKey,
        dir: &Path,
        branch: Option<&str>,
        reporter: &dyn Reporter,
    ) -> Result<Self> {
        let mut msg = format!("Cloning repo {key}");
        if dir.file_name().and_then(|n| n.to_str()) != Some(key.repo.as_str()) {
            msg.push_str(&format!(" into directory {}", dir.display()));
        }
        msg.push_str("...");
        reporter.info(&msg);

        let mut builder = RepoBuilder::new();
        if let Some(branch) = branch {
            builder.branch(branch);
        }
        let repo = builder
            .clone(&key.url(), dir)
            .with_context(|| format!("Failed to clone {}", key.url()))?;
        Ok(Self {
            key,
            dir: dir.to_path_buf(),
            repo,
        })
    }

    /// Open an existing checkout.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` is not a git repository.
    pub fn open(key: RepoKey, dir: &Path) -> Result<Self> {
        let repo = Repository::open(dir)
            .with_context(|| format!("Failed to open repository {}", dir.display()))?;
        Ok(Self {
            key,
            dir: dir.to_path_buf(),
            repo,
        })
    }

    pub fn key(&self) -> &RepoKey {
        &self.key
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create `name` at HEAD and switch to it.
    ///
    /// # Errors
    ///
    /// Returns an error if HEAD has no commit or the branch exists.
    pub fn create_branch(&self, name: &str) -> Result<()> {
        let head = self.repo.head()?.peel_to_commit()?;
        self.repo
            .branch(name, &head, false)
            .with_context(|| format!("Failed to create branch {name}"))?;
        self.repo.set_head(&format!("refs/heads/{name}"))?;
        tracing::debug!("switched to new branch {name}");
        Ok(())
    }

    /// Name of the checked out branch.
    ///
    /// # Errors
    ///
    /// Returns an error when HEAD is detached.
    pub fn current_branch(&self) -> Result<String> {
        let head = self.repo.head().context("Failed to get HEAD reference")?;
        head.shorthand()
            .map(ToString::to_string)
            .ok_or_else(|| anyhow!("HEAD is detached"))
    }

    /// Full hash of HEAD.
    ///
    /// # Errors
    ///
    /// Returns an error if HEAD has no commit.
    pub fn last_hash(&self) -> Result<String> {
        Ok(self.repo.head()?.peel_to_commit()?.id().to_string())
    }

    /// Stage additions, modifications and removals under `pathspecs`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be updated or written.
    pub fn add(&self, pathspecs: &[&str]) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_all(pathspecs.iter().copied(), IndexAddOption::DEFAULT, None)?;
        index.update_all(pathspecs.iter().copied(), None)?;
        index.write()?;
        Ok(())
    }

    /// Commit the index when it differs from HEAD.
    ///
    /// Returns the new commit, or `None` when there was nothing to commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit cannot be written.
    pub fn commit(&self, message: &str) -> Result<Option<Oid>> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let parent = self.repo.head()?.peel_to_commit()?;
        if parent.tree_id() == tree_id {
            return Ok(None);
        }
        let tree = self.repo.find_tree(tree_id)?;
        let signature = self
            .repo
            .signature()
            .or_else(|_| Signature::now(GENERATOR_NAME, &format!("{GENERATOR_NAME}@localhost")))?;
        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &[&parent],
        )?;
        Ok(Some(oid))
    }

    /// `git status --porcelain`, one `XY path` line per entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be computed.
    pub fn status_porcelain(&self) -> Result<String> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        let lines: Vec<String> = statuses
            .iter()
            .filter_map(|entry| {
                let path = entry.path()?;
                Some(format!("{} {path}", porcelain_code(entry.status())))
            })
            .collect();
        Ok(lines.join("\n"))
    }

    /// Unstaged changes under `pathspecs`, as a unified patch.
    ///
    /// # Errors
    ///
    /// Returns an error if the diff cannot be computed.
    pub fn diff(&self, pathspecs: &[&str]) -> Result<String> {
        let mut opts = DiffOptions::new();
        for spec in pathspecs {
            opts.pathspec(*spec);
        }
        let diff = self.repo.diff_index_to_workdir(None, Some(&mut opts))?;
        let mut patch = String::new();
        diff.print(DiffFormat::Patch, |_, _, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                patch.push(line.origin());
            }
            patch.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;
        Ok(patch.trim_end_matches('\n').to_string())
    }

    /// Number of commits reachable from HEAD that changed `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be walked.
    pub fn file_revision_logs(&self, path: &Path) -> Result<usize> {
        let mut walk = self.repo.revwalk()?;
        walk.push_head()?;
        let mut count = 0;
        for oid in walk {
            let commit = self.repo.find_commit(oid?)?;
            let entry = commit.tree()?.get_path(path).ok().map(|e| e.id());
            let parent_entry = match commit.parents().next() {
                Some(parent) => parent.tree()?.get_path(path).ok().map(|e| e.id()),
                None => None,
            };
            if entry != parent_entry {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Push `branch` to `origin`, authenticating with a GitHub token.
    ///
    /// # Errors
    ///
    /// Returns an error if the push fails or the remote rejects the ref.
    pub fn push(&self, branch: &str, token: &str) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote("origin")
            .context("Failed to find origin remote")?;
        let mut rejected: Option<String> = None;
        {
            let mut callbacks = RemoteCallbacks::new();
            callbacks.credentials(|_, _, _| Cred::userpass_plaintext("x-access-token", token));
            callbacks.push_update_reference(|refname, status| {
                if let Some(status) = status {
                    rejected = Some(format!("{refname}: {status}"));
                }
                Ok(())
            });
            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);
            let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
            remote
                .push(&[refspec.as_str()], Some(&mut options))
                .with_context(|| format!("Failed to push {branch} to {}", self.key))?;
        }
        match rejected {
            Some(reason) => Err(anyhow!("Push of {branch} was rejected: {reason}")),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A fresh repository with one commit holding `README`.
    pub(crate) fn init_repo(dir: &Path) -> RepoInstance {
        let repo = Repository::init(dir).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Test").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }
        std::fs::write(dir.join("README"), "meta-ros\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("README")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = repo.signature().unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .unwrap();
        drop(tree);
        RepoInstance {
            key: RepoKey::new("ros", "meta-ros"),
            dir: dir.to_path_buf(),
            repo,
        }
    }

    #[test]
    fn test_commit_only_when_changed() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        repo.create_branch("superflore/20260101000000").unwrap();
        assert_eq!(repo.current_branch().unwrap(), "superflore/20260101000000");

        repo.add(&["files"]).unwrap();
        assert!(repo.commit("nothing").unwrap().is_none());

        std::fs::create_dir_all(dir.path().join("files/humble")).unwrap();
        std::fs::write(dir.path().join("files/humble/cache.yaml"), "a\n").unwrap();
        repo.add(&["files"]).unwrap();
        let oid = repo.commit("rosdistro sync").unwrap().unwrap();
        assert_eq!(repo.last_hash().unwrap(), oid.to_string());
        assert_eq!(
            repo.file_revision_logs(Path::new("files/humble/cache.yaml"))
                .unwrap(),
            1
        );

        std::fs::write(dir.path().join("files/humble/cache.yaml"), "b\n").unwrap();
        repo.add(&["files"]).unwrap();
        repo.commit("again").unwrap().unwrap();
        assert_eq!(
            repo.file_revision_logs(Path::new("files/humble/cache.yaml"))
                .unwrap(),
            2
        );
        assert_eq!(repo.file_revision_logs(Path::new("README")).unwrap(), 1);
    }

    #[test]
    fn test_status_and_diff() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        std::fs::write(dir.path().join("README"), "meta-ros\nmore\n").unwrap();
        std::fs::write(dir.path().join("NEW"), "x\n").unwrap();

        assert_eq!(repo.status_porcelain().unwrap(), "?? NEW\n M README");
        let diff = repo.diff(&["README"]).unwrap();
        assert!(diff.contains("+more"));
        assert!(diff.contains(" meta-ros"));
        assert!(repo.diff(&["conf"]).unwrap().is_empty());

        repo.add(&["NEW"]).unwrap();
        assert_eq!(repo.status_porcelain().unwrap(), "A  NEW\n M README");
    }
}
