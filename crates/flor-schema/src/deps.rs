//! Per-package dependency sets.
//!
//! A package declares dependency keys in six categories. Each key is either
//! *internal* (another package of the same distro) or *external* (a system
//! package resolved through rosdep). A key never appears in both classes of
//! the same category.

use std::collections::BTreeSet;

/// The dependency categories of a `package.xml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyCategory {
    /// `<build_depend>`
    Build,
    /// `<buildtool_depend>`
    BuildTool,
    /// `<build_export_depend>`
    Export,
    /// `<buildtool_export_depend>`
    BuildToolExport,
    /// `<exec_depend>` / `<run_depend>`
    Run,
    /// `<test_depend>`
    Test,
}

impl DependencyCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Build,
        Self::BuildTool,
        Self::Export,
        Self::BuildToolExport,
        Self::Run,
        Self::Test,
    ];

    /// Whether dependencies in this category are needed on the build host.
    pub fn is_native(self) -> bool {
        matches!(self, Self::BuildTool | Self::BuildToolExport)
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Classes {
    internal: BTreeSet<String>,
    external: BTreeSet<String>,
}

/// Dependency keys of one package, split by category and class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    classes: [Classes; 6],
    skip_keys: BTreeSet<String>,
}

impl DependencySet {
    /// An empty set that accepts every key.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty set that silently drops the given keys.
    pub fn with_skip_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            skip_keys: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Record `key` under `category`.
    ///
    /// Internal membership wins: adding an internal key evicts an external
    /// entry for the same key, and an external key is ignored when the key
    /// is already internal. Returns `false` when the key was skipped or
    /// ignored.
    pub fn add(&mut self, category: DependencyCategory, key: &str, internal: bool) -> bool {
        if key.is_empty() || self.skip_keys.contains(key) {
            return false;
        }
        let classes = &mut self.classes[category.index()];
        if internal {
            classes.external.remove(key);
            classes.internal.insert(key.to_string());
            true
        } else if classes.internal.contains(key) {
            false
        } else {
            classes.external.insert(key.to_string());
            true
        }
    }

    /// Internal keys of a category.
    pub fn internal(&self, category: DependencyCategory) -> &BTreeSet<String> {
        &self.classes[category.index()].internal
    }

    /// External keys of a category.
    pub fn external(&self, category: DependencyCategory) -> &BTreeSet<String> {
        &self.classes[category.index()].external
    }

    /// Whether no key has been recorded in any category.
    pub fn is_empty(&self) -> bool {
        self.classes
            .iter()
            .all(|c| c.internal.is_empty() && c.external.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_takes_precedence() {
        let mut deps = DependencySet::new();
        assert!(deps.add(DependencyCategory::Build, "rclcpp", false));
        assert!(deps.add(DependencyCategory::Build, "rclcpp", true));
        assert!(!deps.add(DependencyCategory::Build, "rclcpp", false));

        assert!(deps.internal(DependencyCategory::Build).contains("rclcpp"));
        assert!(deps.external(DependencyCategory::Build).is_empty());
    }

    #[test]
    fn test_categories_are_independent() {
        let mut deps = DependencySet::new();
        deps.add(DependencyCategory::Build, "boost", false);
        deps.add(DependencyCategory::Run, "boost", false);
        deps.add(DependencyCategory::Test, "gtest", false);

        assert_eq!(deps.external(DependencyCategory::Run).len(), 1);
        assert!(deps.external(DependencyCategory::Build).contains("boost"));
        assert!(deps.internal(DependencyCategory::Test).is_empty());
    }

    #[test]
    fn test_skip_keys() {
        let mut deps = DependencySet::with_skip_keys(["python-qt-binding"]);
        assert!(!deps.add(DependencyCategory::Run, "python-qt-binding", false));
        assert!(!deps.add(DependencyCategory::Run, "", true));
        assert!(deps.is_empty());
    }

    #[test]
    fn test_native_categories() {
        assert!(DependencyCategory::BuildTool.is_native());
        assert!(DependencyCategory::BuildToolExport.is_native());
        assert!(!DependencyCategory::Export.is_native());
    }
}
