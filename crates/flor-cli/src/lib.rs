//! flor - ROS recipe regeneration
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Regenerates the recipes of released ROS packages for OpenEmbedded
//! (meta-ros) and Gentoo (ros-overlay), commits them on a fresh branch and
//! files a pull request against the upstream repository.
//!
//! # Layout of a meta-ros run
//!
//! ```text
//! <meta-ros>/
//! ├── generated-recipes-<distro>/<component>/<recipe>_<version>.bb
//! ├── conf/ros-distro/include/<distro>/generated-ros-distro.inc
//! └── files/<distro>/
//!     ├── cache.yaml, cache.diffme
//!     ├── rosdep-resolve.yaml
//!     ├── newer-platform-components.list
//!     └── superflore-change-summary.txt
//! ```

pub mod cmd;
pub mod ui;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "flor")]
#[command(author, version, about = "flor - regenerate ROS recipes for Yocto and Gentoo")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Deploy ROS packages into Yocto Linux (meta-ros)
    Yocto(YoctoArgs),
    /// Deploy ROS packages into Gentoo Linux (ros-overlay)
    Gentoo(GentooArgs),
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Flags shared by every generator.
#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// Regenerate packages for this distro only
    #[arg(long)]
    pub ros_distro: Option<String>,

    /// Regenerate every package of the active distros
    #[arg(long, conflicts_with = "ros_distro")]
    pub all: bool,

    /// Regenerate only these packages (requires --ros-distro)
    #[arg(long, num_args = 1..)]
    pub only: Option<Vec<String>>,

    /// Packages never to generate
    #[arg(long, num_args = 1..)]
    pub skip_keys: Vec<String>,

    /// Generate and commit locally, save the PR text instead of filing it
    #[arg(long)]
    pub dry_run: bool,

    /// File the PR saved by an earlier --dry-run
    #[arg(long)]
    pub pr_only: bool,

    /// Existing checkout to work in (cloned into a temp dir otherwise)
    #[arg(long)]
    pub output_repository_path: Option<PathBuf>,

    /// Upstream repository URL (https://github.com/<owner>/<repo>)
    #[arg(long)]
    pub upstream_repo: Option<String>,

    /// Branch to clone and to file the PR against
    #[arg(long)]
    pub upstream_branch: Option<String>,

    /// Comment placed at the top of the PR body
    #[arg(long)]
    pub pr_comment: Option<String>,

    /// Configuration file
    #[arg(long, env = "FLOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Token for pushing the branch and filing the PR
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,
}

impl CommonArgs {
    /// Reject flag combinations that cannot work together.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pr_only {
            if self.dry_run {
                anyhow::bail!("Invalid args! cannot dry-run and file PR");
            }
            if self.output_repository_path.is_none() {
                anyhow::bail!("Invalid args! no repository specified");
            }
        } else if self.only.is_some() && self.ros_distro.is_none() {
            anyhow::bail!("Invalid args! --only requires specifying --ros-distro");
        }
        Ok(())
    }

    pub fn skip_keys(&self) -> std::collections::BTreeSet<String> {
        self.skip_keys.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Args)]
pub struct YoctoArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Location to store archived packages (and their checksum cache)
    #[arg(long)]
    pub tar_archive_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct GentooArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Dockerfile (or its directory) of the image that regenerates manifests
    #[arg(long, conflicts_with = "image")]
    pub dockerfile: Option<PathBuf>,

    /// Image (org/repo[:tag]) that regenerates manifests
    #[arg(long)]
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn common(cli: Cli) -> CommonArgs {
        match cli.command {
            Commands::Yocto(args) => args.common,
            Commands::Gentoo(args) => args.common,
            Commands::Completions { .. } => panic!("not a generator"),
        }
    }

    #[test]
    fn test_parse_yocto() {
        let cli = parse(&[
            "flor",
            "yocto",
            "--ros-distro",
            "humble",
            "--only",
            "rclcpp",
            "rcutils",
            "--tar-archive-dir",
            "/tmp/tars",
        ]);
        let Commands::Yocto(args) = cli.command else {
            panic!("expected yocto");
        };
        assert_eq!(args.common.ros_distro.as_deref(), Some("humble"));
        assert_eq!(
            args.common.only,
            Some(vec!["rclcpp".to_string(), "rcutils".to_string()])
        );
        assert_eq!(args.tar_archive_dir, Some(PathBuf::from("/tmp/tars")));
        assert!(args.common.validate().is_ok());
    }

    #[test]
    fn test_all_conflicts_with_distro() {
        assert!(Cli::try_parse_from(["flor", "yocto", "--all", "--ros-distro", "humble"]).is_err());
    }

    #[test]
    fn test_validate() {
        let args = common(parse(&["flor", "gentoo", "--pr-only", "--dry-run"]));
        assert!(args.validate().unwrap_err().to_string().contains("cannot dry-run"));

        let args = common(parse(&["flor", "gentoo", "--pr-only"]));
        assert!(args.validate().unwrap_err().to_string().contains("no repository"));

        let args = common(parse(&["flor", "yocto", "--only", "rclcpp"]));
        assert!(args.validate().unwrap_err().to_string().contains("--only requires"));

        let args = common(parse(&[
            "flor",
            "yocto",
            "--pr-only",
            "--output-repository-path",
            "/srv/meta-ros",
        ]));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_skip_keys() {
        let args = common(parse(&["flor", "yocto", "--skip-keys", "b", "a", "b"]));
        assert_eq!(
            args.skip_keys().into_iter().collect::<Vec<_>>(),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
