//! Output layout of the target repositories.
//!
//! Everything here is relative to the root of a checked-out meta-ros or
//! ros-overlay working tree.

use dirs::home_dir;
use std::path::{Path, PathBuf};

/// Temp file holding a deferred PR title.
pub const PR_TITLE_FILE: &str = ".pr-title.tmp";
/// Temp file holding a deferred PR body.
pub const PR_MESSAGE_FILE: &str = ".pr-message.tmp";

/// Name of the generated distro configuration include.
pub const CONF_FILE_NAME: &str = "generated-ros-distro.inc";

/// Returns the flor state directory, or None if the user's home cannot be resolved.
pub fn try_flor_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("FLOR_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".flor"))
}

/// Default location of the optional configuration file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("flor").join("config.toml"))
}

/// `generated-recipes-<distro>`
pub fn recipes_dir(root: &Path, distro: &str) -> PathBuf {
    root.join(format!("generated-recipes-{distro}"))
}

/// `generated-recipes-<distro>/<component>/<name>_<version>.bb`
pub fn recipe_path(root: &Path, distro: &str, component: &str, name: &str, version: &str) -> PathBuf {
    recipes_dir(root, distro)
        .join(component)
        .join(format!("{name}_{version}.bb"))
}

/// `conf/ros-distro/include/<distro>`
pub fn conf_dir(root: &Path, distro: &str) -> PathBuf {
    root.join("conf")
        .join("ros-distro")
        .join("include")
        .join(distro)
}

/// `conf/ros-distro/include/<distro>/generated-ros-distro.inc`
pub fn conf_path(root: &Path, distro: &str) -> PathBuf {
    conf_dir(root, distro).join(CONF_FILE_NAME)
}

/// `files/<distro>`
pub fn files_dir(root: &Path, distro: &str) -> PathBuf {
    root.join("files").join(distro)
}

/// `files/<distro>/cache.yaml`
pub fn distro_cache_path(root: &Path, distro: &str) -> PathBuf {
    files_dir(root, distro).join("cache.yaml")
}

/// `files/<distro>/cache.diffme`
pub fn distro_cache_diff_path(root: &Path, distro: &str) -> PathBuf {
    files_dir(root, distro).join("cache.diffme")
}

/// `files/<distro>/rosdep-resolve.yaml`
pub fn rosdep_resolve_path(root: &Path, distro: &str) -> PathBuf {
    files_dir(root, distro).join("rosdep-resolve.yaml")
}

/// `files/<distro>/superflore-change-summary.txt`
pub fn change_summary_path(root: &Path, distro: &str) -> PathBuf {
    files_dir(root, distro).join("superflore-change-summary.txt")
}

/// `files/<distro>/newer-platform-components.list`
pub fn newer_platform_components_path(root: &Path, distro: &str) -> PathBuf {
    files_dir(root, distro).join("newer-platform-components.list")
}

/// `ros-<distro>/<package>` in a Gentoo overlay.
pub fn ebuild_dir(root: &Path, distro: &str, package: &str) -> PathBuf {
    root.join(format!("ros-{distro}")).join(package)
}

/// Extract the filename from a URL.
pub fn filename_from_url(url: &str) -> &str {
    url.split('/').next_back().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let root = Path::new("/tmp/meta-ros");
        assert_eq!(
            recipe_path(root, "humble", "rcutils", "rcutils", "5.1.3"),
            Path::new("/tmp/meta-ros/generated-recipes-humble/rcutils/rcutils_5.1.3.bb")
        );
        assert_eq!(
            conf_path(root, "humble"),
            Path::new("/tmp/meta-ros/conf/ros-distro/include/humble/generated-ros-distro.inc")
        );
        assert_eq!(
            rosdep_resolve_path(root, "humble"),
            Path::new("/tmp/meta-ros/files/humble/rosdep-resolve.yaml")
        );
        assert_eq!(
            ebuild_dir(root, "humble", "rclcpp-action"),
            Path::new("/tmp/meta-ros/ros-humble/rclcpp-action")
        );
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(filename_from_url("https://example.com/a/b/file.tar.gz"), "file.tar.gz");
        assert_eq!(filename_from_url(""), "");
    }
}
