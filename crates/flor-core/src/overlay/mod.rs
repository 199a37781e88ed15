//! Target repositories: meta-ros for OpenEmbedded, ros-overlay for Gentoo.

pub mod gentoo;
pub mod meta;

pub use gentoo::{ManifestImage, RosOverlay};
pub use meta::RosMeta;

/// What a regeneration commit covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitScope {
    /// Plain sync of the active distros.
    Sync,
    /// Every distro regenerated from scratch.
    All,
    /// One distro regenerated from scratch.
    Distro(String),
}

pub fn commit_message(scope: &CommitScope, ctime: &str) -> String {
    let prefix = match scope {
        CommitScope::Sync => "rosdistro sync, ".to_string(),
        CommitScope::All => "regenerate all distros, ".to_string(),
        CommitScope::Distro(distro) => format!("regenerate ros-{distro}, "),
    };
    format!("{prefix}{ctime}")
}
