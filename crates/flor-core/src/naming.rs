//! Conversions from rosdep keys and ROS package names to target names.

const OE_VAR_BEGIN: &str = "${";
const OE_VAR_END: &str = "}";

/// Lowercase `dep` and turn `_` into `-`, leaving `${...}` bitbake
/// variable references byte-identical. An unterminated `${` is treated as
/// plain text.
pub fn convert_dep_except_oe_vars(dep: &str) -> String {
    let plain = |s: &str| s.to_lowercase().replace('_', "-");
    let mut result = String::with_capacity(dep.len());
    let mut rest = dep;
    while let Some(begin) = rest.find(OE_VAR_BEGIN) {
        let after = &rest[begin + OE_VAR_BEGIN.len()..];
        let Some(end) = after.find(OE_VAR_END) else {
            result.push_str(&plain(&rest[..begin]));
            rest = &rest[begin..];
            break;
        };
        result.push_str(&plain(&rest[..begin]));
        result.push_str(OE_VAR_BEGIN);
        result.push_str(&after[..end]);
        result.push_str(OE_VAR_END);
        rest = &after[end + OE_VAR_END.len()..];
    }
    result.push_str(&plain(rest));
    result
}

/// `-native` when building for the host.
pub fn native_suffix(native: bool) -> &'static str {
    if native { "-native" } else { "" }
}

/// OpenEmbedded recipe name for a package or rosdep key.
///
/// Anything after `@` (a meta-layer hint) is dropped; `_native` / `_dev`
/// endings become `-rosnative` / `-rosdev`, and the bare `ros1` / `ros2`
/// keys are renamed so they cannot clash with the distro-type recipes.
pub fn convert_to_oe_name(dep: &str, native: bool) -> String {
    let dep = dep.split('@').next().unwrap_or(dep);
    let renamed = if let Some(base) = dep.strip_suffix("_native") {
        format!("{base}-rosnative")
    } else if let Some(base) = dep.strip_suffix("_dev") {
        format!("{base}-rosdev")
    } else if dep == "ros1" || dep == "ros2" {
        format!("{dep}--distro-renamed")
    } else {
        dep.to_string()
    };
    let mut name = convert_dep_except_oe_vars(&renamed);
    name.push_str(native_suffix(native));
    name
}

/// Gentoo atom of a package that is part of the distro being generated.
pub fn gentoo_internal_name(distro: &str, pkg: &str) -> String {
    format!("ros-{distro}/{}", pkg.replace('_', "-"))
}

/// Local file name for a release archive.
pub fn archive_file_name(pkg: &str, version: &str, distro: &str) -> String {
    format!("{}-{version}-{distro}.tar.gz", pkg.replace('-', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_basic() {
        assert_eq!(convert_to_oe_name("rclcpp_action", false), "rclcpp-action");
        assert_eq!(convert_to_oe_name("Boost_Python", true), "boost-python-native");
        assert_eq!(convert_to_oe_name("python3-numpy@meta-python", false), "python3-numpy");
    }

    #[test]
    fn test_convert_suffixes() {
        assert_eq!(convert_to_oe_name("foo_native", false), "foo-rosnative");
        assert_eq!(convert_to_oe_name("foo_dev", true), "foo-rosdev-native");
        assert_eq!(convert_to_oe_name("ros2", false), "ros2--distro-renamed");
        assert_eq!(convert_to_oe_name("ros3", false), "ros3");
    }

    #[test]
    fn test_oe_variables_are_preserved() {
        assert_eq!(
            convert_dep_except_oe_vars("Foo_${PYTHON_PN}_Bar"),
            "foo-${PYTHON_PN}-bar"
        );
        assert_eq!(
            convert_dep_except_oe_vars("${PYTHON_PN}-Numpy_X${ROS_DISTRO}"),
            "${PYTHON_PN}-numpy-x${ROS_DISTRO}"
        );
        // unterminated variables are ordinary text
        assert_eq!(convert_dep_except_oe_vars("A_${B_C"), "a-${b-c");
    }

    #[test]
    fn test_convert_idempotent() {
        for dep in [
            "rclcpp_action",
            "Foo_${PYTHON_PN}_Bar",
            "A_${B_C",
            "foo_native",
            "ros2",
            "lib${X}_y@layer",
        ] {
            let once = convert_to_oe_name(dep, false);
            assert_eq!(convert_to_oe_name(&once, false), once, "dep {dep:?}");
        }
    }

    #[test]
    fn test_gentoo_and_archive_names() {
        assert_eq!(gentoo_internal_name("humble", "rclcpp_action"), "ros-humble/rclcpp-action");
        assert_eq!(
            archive_file_name("foo-bar", "1.2.3-1", "humble"),
            "foo_bar-1.2.3-1-humble.tar.gz"
        );
    }
}
