//! Domain-specific errors for generation and orchestration

use flor_schema::{DistroError, UnknownPlatform};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlorError {
    #[error(transparent)]
    UnknownPlatform(#[from] UnknownPlatform),

    #[error("No package xml file for '{0}'")]
    NoPackageXml(String),

    #[error("You must supply the location of the Dockerfile (no Dockerfile in {})", .0.display())]
    NoDockerfile(PathBuf),

    #[error(
        "Extraction of repository and owner info from non-GitHub repositories is not supported: '{0}'"
    )]
    NotGitHub(String),

    #[error("Missing {what} for '{pkg}'")]
    MissingMetadata { pkg: String, what: &'static str },

    #[error(transparent)]
    Distro(#[from] DistroError),

    #[error("Failed to file PR with the {repo} repo: {reason}")]
    PrFiling { repo: String, reason: String },

    #[error("{0}")]
    Credentials(String),

    #[error("{context}: {message}")]
    Context {
        context: &'static str,
        message: String,
    },
}

impl FlorError {
    /// Create an error with context for better debugging.
    pub fn context(ctx: &'static str, msg: impl std::fmt::Display) -> Self {
        Self::Context {
            context: ctx,
            message: msg.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let err = FlorError::context("writing conf", "disk full");
        assert_eq!(err.to_string(), "writing conf: disk full");
    }

    #[test]
    fn test_missing_metadata_display() {
        let err = FlorError::MissingMetadata {
            pkg: "demo_nodes".to_string(),
            what: "license",
        };
        assert_eq!(err.to_string(), "Missing license for 'demo_nodes'");
        assert_eq!(
            FlorError::NoPackageXml("demo_nodes".to_string()).to_string(),
            "No package xml file for 'demo_nodes'"
        );
    }

    #[test]
    fn test_unknown_platform_is_transparent() {
        let err: FlorError = UnknownPlatform("debian".to_string()).into();
        assert_eq!(err.to_string(), "Unknown target platform 'debian'");
    }
}
