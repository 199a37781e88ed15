//! Subcommand drivers.
//!
//! Both generators share the same outer flow: pick the target distros,
//! check out the upstream repository on a new branch, regenerate, commit,
//! then either save the PR text (dry run) or push and file it.

pub mod completions;
pub mod gentoo;
pub mod yocto;

use crate::CommonArgs;
use anyhow::{Context, Result};
use flor_core::git::RepoInstance;
use flor_core::overlay::CommitScope;
use flor_core::pull_request::{
    GitHubClient, PrText, clean_up, ctime, file_pr, get_pr_text, load_pr, pr_body, pr_title,
    save_pr,
};
use flor_core::repo::RepoKey;
use flor_core::{FlorError, Reporter};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Distros to regenerate and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub targets: Vec<String>,
    pub preserve_existing: bool,
    pub scope: CommitScope,
}

/// Targets from the flags; `active` are the distros with status `active`.
pub fn plan(args: &CommonArgs, active: Vec<String>, reporter: &dyn Reporter) -> Plan {
    if args.all {
        reporter.warn("\"All\" mode detected... this may take a while!");
        Plan {
            targets: active,
            preserve_existing: false,
            scope: CommitScope::All,
        }
    } else if let Some(distro) = &args.ros_distro {
        reporter.warn(&format!("\"{distro}\" distro detected..."));
        Plan {
            targets: vec![distro.clone()],
            preserve_existing: false,
            scope: CommitScope::Distro(distro.clone()),
        }
    } else {
        Plan {
            targets: active,
            preserve_existing: true,
            scope: CommitScope::Sync,
        }
    }
}

/// `--upstream-repo` or the default owner/repo.
pub fn upstream(args: &CommonArgs, owner: &str, repo: &str) -> Result<RepoKey, FlorError> {
    match &args.upstream_repo {
        Some(url) => RepoKey::from_url(url),
        None => Ok(RepoKey::new(owner, repo)),
    }
}

/// A working tree, possibly in a temporary directory that lives as long as
/// this value.
#[derive(Debug)]
pub struct Checkout {
    pub repo: RepoInstance,
    temp: Option<TempDir>,
}

impl Checkout {
    /// The checkout and the temp dir guard that must outlive it.
    pub fn into_parts(self) -> (RepoInstance, Option<TempDir>) {
        (self.repo, self.temp)
    }
}

/// Open `--output-repository-path`, or clone `key` into a temp dir.
pub fn checkout(args: &CommonArgs, key: RepoKey, reporter: &dyn Reporter) -> Result<Checkout> {
    match &args.output_repository_path {
        Some(path) if path.join(".git").exists() => Ok(Checkout {
            repo: RepoInstance::open(key, path)?,
            temp: None,
        }),
        Some(path) => Ok(Checkout {
            repo: RepoInstance::clone_from(key, path, args.upstream_branch.as_deref(), reporter)?,
            temp: None,
        }),
        None => {
            let temp = tempfile::Builder::new()
                .prefix("flor-")
                .tempdir()
                .context("Failed to create a temporary directory")?;
            let dir = temp.path().join(&key.repo);
            let repo =
                RepoInstance::clone_from(key, &dir, args.upstream_branch.as_deref(), reporter)?;
            Ok(Checkout {
                repo,
                temp: Some(temp),
            })
        }
    }
}

/// Where the PR temp files live.
pub fn pr_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn github(args: &CommonArgs, api_url: &str) -> Result<GitHubClient> {
    let token = args.github_token.as_deref().ok_or_else(|| {
        FlorError::Credentials("Please set 'GITHUB_TOKEN' to push and file pull requests.".into())
    })?;
    Ok(GitHubClient::new(flor_core::http_client()?, api_url, token))
}

async fn base_branch(args: &CommonArgs, gh: &GitHubClient, key: &RepoKey) -> Result<String> {
    match &args.upstream_branch {
        Some(branch) => Ok(branch.clone()),
        None => gh
            .default_branch(key)
            .await
            .with_context(|| format!("Failed to look up the default branch of {key}")),
    }
}

/// Push `branch` of `repo` and open the PR against the upstream.
pub async fn push_and_file(
    args: &CommonArgs,
    api_url: &str,
    repo: &RepoInstance,
    branch: &str,
    pr: &PrText,
    reporter: &dyn Reporter,
) -> Result<String> {
    let gh = github(args, api_url)?;
    let base = base_branch(args, &gh, repo.key()).await?;
    let token = args.github_token.as_deref().unwrap_or_default();
    repo.push(branch, token)?;
    Ok(file_pr(&gh, repo.key(), pr, branch, &base, reporter).await?)
}

/// `--pr-only`: file what an earlier dry run saved.
pub async fn pr_only(
    args: &CommonArgs,
    key: RepoKey,
    api_url: &str,
    reporter: &dyn Reporter,
) -> Result<()> {
    let Some(path) = args.output_repository_path.as_deref() else {
        anyhow::bail!("Invalid args! no repository specified");
    };
    let dir = pr_dir();
    let filed = async {
        let repo = RepoInstance::open(key, path)?;
        let pr = load_pr(&dir, reporter)?;
        let branch = repo.current_branch()?;
        push_and_file(args, api_url, &repo, &branch, &pr, reporter).await
    }
    .await;
    match filed {
        Ok(_) => {
            clean_up(&dir);
            Ok(())
        }
        Err(e) => {
            reporter.err("Failed to file PR!");
            reporter.err(&format!("reason: {e:#}"));
            Err(e)
        }
    }
}

/// Title and body of the PR for this run.
pub fn pr_text(comment: &str, argv: &[String], delta: &str, missing_deps: &str) -> PrText {
    let now = ctime(chrono::Local::now());
    PrText {
        title: pr_title(&now),
        body: pr_body(&get_pr_text(Some(comment), argv), delta, missing_deps),
    }
}

/// Save the PR for `--pr-only` (dry run) or push and file it.
pub async fn deliver(
    args: &CommonArgs,
    api_url: &str,
    repo: &RepoInstance,
    branch: &str,
    pr: &PrText,
    reporter: &dyn Reporter,
) -> Result<()> {
    let dir = pr_dir();
    if args.dry_run {
        reporter.info("Running in dry mode, not filing PR");
        return save_pr(&dir, pr);
    }
    push_and_file(args, api_url, repo, branch, pr, reporter).await?;
    clean_up(&dir);
    reporter.ok("Successfully synchronized repositories!");
    Ok(())
}

/// Commits so far touching `files/<distro>/cache.yaml`.
pub fn cache_commits(repo: &RepoInstance, distro: &str) -> usize {
    let path = format!("files/{distro}/cache.yaml");
    repo.file_revision_logs(Path::new(&path)).unwrap_or_else(|e| {
        tracing::warn!("failed to count revisions of {path}: {e}");
        0
    })
}
