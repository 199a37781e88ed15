//! Pull request text and filing.
//!
//! A dry run saves the title and body next to the working directory so a
//! later `--pr-only` run can file exactly the same PR.

use crate::paths::{PR_MESSAGE_FILE, PR_TITLE_FILE};
use crate::repo::RepoKey;
use crate::{FlorError, Reporter};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `time.ctime()` style timestamp, e.g. `Fri Oct 16 09:01:02 2026`.
pub fn ctime(now: DateTime<Local>) -> String {
    now.format("%a %b %e %H:%M:%S %Y").to_string()
}

pub fn pr_title(ctime: &str) -> String {
    format!("rosdistro sync, {ctime}")
}

/// Leading PR text: the optional comment and the command that reproduces it.
pub fn get_pr_text(comment: Option<&str>, args: &[String]) -> String {
    let mut msg = String::new();
    if let Some(comment) = comment {
        msg.push_str(comment);
        msg.push('\n');
    }
    msg.push_str("To reproduce this PR, run the following command.\n\n");
    let mut args = args.to_vec();
    if let Some(first) = args.first_mut() {
        if let Some(base) = first.rsplit('/').next() {
            *first = base.to_string();
        }
    }
    msg.push_str(&format!("```\n{}\n```\n", args.join(" ")));
    msg
}

/// `text`, the change list and the missing dependency checklist.
pub fn pr_body(text: &str, delta: &str, missing_deps: &str) -> String {
    format!("{text}\n{delta}\n{missing_deps}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrText {
    pub title: String,
    pub body: String,
}

/// Write the PR title and body to the temp files in `dir`.
///
/// # Errors
///
/// Returns an error if either file cannot be written.
pub fn save_pr(dir: &Path, pr: &PrText) -> Result<()> {
    let title = dir.join(PR_TITLE_FILE);
    std::fs::write(&title, format!("{}\n", pr.title))
        .with_context(|| format!("Failed to write {}", title.display()))?;
    let message = dir.join(PR_MESSAGE_FILE);
    std::fs::write(&message, format!("{}\n", pr.body))
        .with_context(|| format!("Failed to write {}", message.display()))?;
    Ok(())
}

/// Read back what [`save_pr`] wrote.
///
/// # Errors
///
/// Returns an error if either file is missing or unreadable.
pub fn load_pr(dir: &Path, reporter: &dyn Reporter) -> Result<PrText> {
    let read = |name: &str| std::fs::read_to_string(dir.join(name));
    match (read(PR_MESSAGE_FILE), read(PR_TITLE_FILE)) {
        (Ok(body), Ok(title)) => Ok(PrText {
            title: title.trim_end_matches('\n').to_string(),
            body: body.trim_end_matches('\n').to_string(),
        }),
        (Err(e), _) | (_, Err(e)) => {
            reporter.err("Failed to open PR title/message file!");
            reporter.err(&format!(
                "Please supply the {PR_MESSAGE_FILE} and {PR_TITLE_FILE} files"
            ));
            Err(e).context("Failed to load saved PR")
        }
    }
}

/// Remove the PR temp files, if present.
pub fn clean_up(dir: &Path) {
    for name in [PR_MESSAGE_FILE, PR_TITLE_FILE] {
        let path = dir.join(name);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("failed to remove {}: {e}", path.display());
            }
        }
    }
}

#[derive(Serialize)]
struct NewPull<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Deserialize)]
struct PullResponse {
    html_url: String,
}

#[derive(Deserialize)]
struct RepoResponse {
    default_branch: String,
}

/// Minimal GitHub REST client.
pub struct GitHubClient {
    client: Client,
    api_url: String,
    token: String,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    pub fn new(client: Client, api_url: &str, token: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.api_url))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
    }

    /// Default branch of `repo`.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be queried.
    pub async fn default_branch(&self, repo: &RepoKey) -> Result<String> {
        let info: RepoResponse = self
            .request(reqwest::Method::GET, &format!("/repos/{}/{}", repo.owner, repo.repo))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(info.default_branch)
    }

    /// Open a PR from `head` into `base`, returning its URL.
    ///
    /// # Errors
    ///
    /// Returns [`FlorError::PrFiling`] when GitHub refuses the request.
    pub async fn create_pull(
        &self,
        repo: &RepoKey,
        pr: &PrText,
        head: &str,
        base: &str,
    ) -> Result<String, FlorError> {
        let filing = |reason: String| FlorError::PrFiling {
            repo: repo.to_string(),
            reason,
        };
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/repos/{}/{}/pulls", repo.owner, repo.repo),
            )
            .json(&NewPull {
                title: &pr.title,
                body: &pr.body,
                head,
                base,
            })
            .send()
            .await
            .map_err(|e| filing(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(filing(format!("{status}: {text}")));
        }
        let created: PullResponse = response.json().await.map_err(|e| filing(e.to_string()))?;
        Ok(created.html_url)
    }
}

/// File `pr` and report the outcome.
///
/// # Errors
///
/// Returns [`FlorError::PrFiling`] if the PR could not be opened.
pub async fn file_pr(
    github: &GitHubClient,
    repo: &RepoKey,
    pr: &PrText,
    head: &str,
    base: &str,
    reporter: &dyn Reporter,
) -> Result<String, FlorError> {
    reporter.info("Filing pull-request...");
    match github.create_pull(repo, pr, head, base).await {
        Ok(url) => {
            reporter.ok("Successfully filed a pull request.");
            reporter.info(&url);
            Ok(url)
        }
        Err(e) => {
            reporter.err(&format!("Failed to file PR with the {repo} repo!"));
            reporter.err(&format!("Exception: {e}"));
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use chrono::TimeZone;

    #[test]
    fn test_ctime() {
        let now = Local.with_ymd_and_hms(2026, 10, 6, 9, 1, 2).unwrap();
        assert_eq!(ctime(now), "Tue Oct  6 09:01:02 2026");
        assert_eq!(pr_title("x"), "rosdistro sync, x");
    }

    #[test]
    fn test_get_pr_text() {
        let args = vec![
            "/usr/bin/flor".to_string(),
            "yocto".to_string(),
            "--dry-run".to_string(),
        ];
        assert_eq!(
            get_pr_text(Some("hello"), &args),
            "hello\nTo reproduce this PR, run the following command.\n\n```\nflor yocto --dry-run\n```\n"
        );
        assert!(get_pr_text(None, &args).starts_with("To reproduce"));
        assert_eq!(pr_body("t", "d", "m"), "t\nd\nm");
    }

    #[test]
    fn test_save_load_clean_up() {
        let dir = tempfile::tempdir().unwrap();
        let pr = PrText {
            title: "rosdistro sync, now".to_string(),
            body: "body\n\ntext".to_string(),
        };
        save_pr(dir.path(), &pr).unwrap();
        assert_eq!(load_pr(dir.path(), &NullReporter).unwrap(), pr);

        clean_up(dir.path());
        assert!(!dir.path().join(PR_TITLE_FILE).exists());
        assert!(load_pr(dir.path(), &NullReporter).is_err());
    }

    #[tokio::test]
    async fn test_file_pr() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/ros/meta-ros/pulls")
            .match_header("authorization", "Bearer secret")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "title": "t",
                "head": "superflore/20260101000000",
                "base": "master",
            })))
            .with_status(201)
            .with_body(r#"{"html_url": "https://github.com/ros/meta-ros/pull/1"}"#)
            .create_async()
            .await;
        let github = GitHubClient::new(Client::new(), &server.url(), "secret");
        let pr = PrText {
            title: "t".to_string(),
            body: "b".to_string(),
        };
        let url = file_pr(
            &github,
            &RepoKey::new("ros", "meta-ros"),
            &pr,
            "superflore/20260101000000",
            "master",
            &NullReporter,
        )
        .await
        .unwrap();
        assert_eq!(url, "https://github.com/ros/meta-ros/pull/1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_file_pr_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/repos/ros/meta-ros/pulls")
            .with_status(422)
            .with_body("{}")
            .create_async()
            .await;
        let github = GitHubClient::new(Client::new(), &server.url(), "secret");
        let pr = PrText {
            title: "t".to_string(),
            body: "b".to_string(),
        };
        let err = file_pr(
            &github,
            &RepoKey::new("ros", "meta-ros"),
            &pr,
            "x",
            "master",
            &NullReporter,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FlorError::PrFiling { .. }));
    }

    #[tokio::test]
    async fn test_default_branch() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/repos/ros/meta-ros")
            .with_body(r#"{"default_branch": "kirkstone"}"#)
            .create_async()
            .await;
        let github = GitHubClient::new(Client::new(), &server.url(), "secret");
        assert_eq!(
            github
                .default_branch(&RepoKey::new("ros", "meta-ros"))
                .await
                .unwrap(),
            "kirkstone"
        );
    }
}
