//! GitHub repository references for the upstream and PR targets.

use crate::FlorError;

const GITHUB_HOST: &str = "github.com";

/// A repository key uniquely identifying a GitHub repository
///
/// This newtype eliminates the ambiguity of `(String, String)` tuples
/// and makes the API self-documenting.
#[derive(Debug, Clone, Hash, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RepoKey {
    /// Repository owner (GitHub user or organization).
    pub owner: String,
    /// Repository name.
    pub repo: String,
}

impl RepoKey {
    /// Create a new `RepoKey` from an owner and repository name.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Parse a GitHub URL such as `https://github.com/ros/meta-ros`.
    ///
    /// # Errors
    ///
    /// Returns [`FlorError::NotGitHub`] for URLs on any other host, or when
    /// the owner or repository segment is missing.
    pub fn from_url(url: &str) -> Result<Self, FlorError> {
        url_to_repo_org(url).map(|(owner, repo)| Self::new(owner, repo))
    }

    /// Clone URL of the repository.
    pub fn url(&self) -> String {
        format!("https://{GITHUB_HOST}/{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for RepoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Extract `(owner, repository)` from a GitHub URL.
///
/// # Errors
///
/// Returns [`FlorError::NotGitHub`] when the URL is not a GitHub URL.
pub fn url_to_repo_org(url: &str) -> Result<(String, String), FlorError> {
    if !url.contains(GITHUB_HOST) {
        return Err(FlorError::NotGitHub(url.to_string()));
    }
    let path = url
        .split_once(GITHUB_HOST)
        .map_or("", |(_, rest)| rest)
        .trim_start_matches([':', '/']);
    let mut parts = path.split('/');
    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
            let repo = repo.strip_suffix(".git").unwrap_or(repo);
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(FlorError::NotGitHub(url.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_to_repo_org() {
        assert_eq!(
            url_to_repo_org("https://github.com/allenh1/p2os").unwrap(),
            ("allenh1".to_string(), "p2os".to_string())
        );
        let key = RepoKey::from_url("https://github.com/ros/meta-ros.git").unwrap();
        assert_eq!(key, RepoKey::new("ros", "meta-ros"));
        assert_eq!(key.url(), "https://github.com/ros/meta-ros");
        assert_eq!(key.to_string(), "ros/meta-ros");
    }

    #[test]
    fn test_non_github_is_rejected() {
        let err = url_to_repo_org("https://gitlab.com/allenh1/p2os").unwrap_err();
        assert!(matches!(err, FlorError::NotGitHub(_)));
        assert!(url_to_repo_org("https://github.com/allenh1").is_err());
    }
}
