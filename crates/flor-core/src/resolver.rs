//! Dependency resolution.
//!
//! Maps rosdep keys to target package names. Internal keys (packages of the
//! distro being generated) are renamed directly. External keys go through,
//! in order: the per-run cache, the static rosdep table, the resolutions of
//! the previous run, and for OpenEmbedded the layer index. Keys nobody can
//! resolve fall back to the raw key on OpenEmbedded and fail the package on
//! Gentoo.

use crate::naming::{convert_to_oe_name, gentoo_internal_name, native_suffix};
use crate::{FlorError, GenerationContext, Reporter};
use async_trait::async_trait;
use flor_schema::Platform;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Outcome of resolving one rosdep key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    /// Resolved to one or more platform names.
    Resolved(BTreeSet<String>),
    /// A rule exists but maps to nothing on this platform.
    Empty,
    /// No rule, no lookup hit.
    NotFound,
}

/// rosdep key -> resolution, for one distro run.
///
/// Also holds the resolutions of the previous run (from
/// `rosdep-resolve.yaml`) which are only consulted after the static table.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: BTreeMap<String, CacheEntry>,
    previous: BTreeMap<String, CacheEntry>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: &str, entry: CacheEntry) {
        self.entries.insert(key.to_string(), entry);
    }

    /// Add one resolved name for `key`, merging with earlier names.
    pub fn record_name(&mut self, key: &str, name: &str) {
        match self.entries.get_mut(key) {
            Some(CacheEntry::Resolved(names)) => {
                names.insert(name.to_string());
            }
            _ => {
                self.entries.insert(
                    key.to_string(),
                    CacheEntry::Resolved(BTreeSet::from([name.to_string()])),
                );
            }
        }
    }

    /// Resolution recorded by the previous run.
    pub fn previous(&self, key: &str) -> Option<&CacheEntry> {
        self.previous.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<String, CacheEntry> {
        &self.entries
    }

    /// Dump as YAML: a list of names, `[]` for empty, `null` for not found.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        let dump: BTreeMap<&str, Option<Vec<&str>>> = self
            .entries
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    CacheEntry::Resolved(names) => Some(names.iter().map(String::as_str).collect()),
                    CacheEntry::Empty => Some(Vec::new()),
                    CacheEntry::NotFound => None,
                };
                (k.as_str(), value)
            })
            .collect();
        serde_yaml::to_string(&dump)
    }

    /// Parse a dump written by [`ResolutionCache::to_yaml`].
    ///
    /// # Errors
    ///
    /// Returns an error on malformed YAML.
    pub fn parse_dump(yaml: &str) -> Result<BTreeMap<String, CacheEntry>, serde_yaml::Error> {
        let raw: Option<BTreeMap<String, Option<Vec<String>>>> = serde_yaml::from_str(yaml)?;
        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| {
                let entry = match v {
                    None => CacheEntry::NotFound,
                    Some(names) if names.is_empty() => CacheEntry::Empty,
                    Some(names) => CacheEntry::Resolved(names.into_iter().collect()),
                };
                (k, entry)
            })
            .collect())
    }

    /// Load the previous run's dump. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_previous(&mut self, path: &Path) -> anyhow::Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let text = std::fs::read_to_string(path)?;
        self.previous = Self::parse_dump(&text)?;
        tracing::debug!(
            "loaded {} previous resolutions from {}",
            self.previous.len(),
            path.display()
        );
        Ok(())
    }
}

/// Static rosdep rules.
pub trait ResolutionTable: Send + Sync {
    /// Names `key` maps to on `platform`. `None` when there is no rule,
    /// `Some(vec![])` when the rule maps to nothing.
    fn resolve(&self, key: &str, platform: Platform) -> Option<Vec<String>>;
}

/// A recipe found by a remote lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeMatch {
    /// Recipe name (`pn`).
    pub name: String,
    /// Layer the recipe lives in.
    pub layer: String,
}

/// Last-resort remote lookup for keys the table cannot resolve.
#[async_trait]
pub trait RecipeLookup: Send + Sync {
    async fn query_recipe(&self, name: &str) -> anyhow::Result<Option<RecipeMatch>>;
}

/// Result of resolving one category of dependencies.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Target names to depend on.
    pub names: BTreeSet<String>,
    /// Platform packages touched by the external keys.
    pub platform: BTreeSet<String>,
    /// External keys that could not be resolved (Gentoo only).
    pub unresolved: Vec<String>,
}

pub struct DependencyResolver<'a> {
    platform: Platform,
    distro: String,
    table: &'a dyn ResolutionTable,
    lookup: Option<&'a dyn RecipeLookup>,
    reporter: &'a dyn Reporter,
}

impl std::fmt::Debug for DependencyResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyResolver")
            .field("platform", &self.platform)
            .field("distro", &self.distro)
            .field("lookup", &self.lookup.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> DependencyResolver<'a> {
    /// # Errors
    ///
    /// Returns [`FlorError::UnknownPlatform`] for anything other than
    /// `openembedded` or `gentoo`.
    pub fn new(
        platform: &str,
        distro: &str,
        table: &'a dyn ResolutionTable,
        reporter: &'a dyn Reporter,
    ) -> Result<Self, FlorError> {
        Ok(Self {
            platform: platform.parse()?,
            distro: distro.to_string(),
            table,
            lookup: None,
            reporter,
        })
    }

    /// Use `lookup` for keys the table cannot resolve.
    pub fn with_lookup(mut self, lookup: &'a dyn RecipeLookup) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Target name of a package that belongs to the distro.
    pub fn internal_name(&self, pkg: &str, native: bool) -> String {
        match self.platform {
            Platform::OpenEmbedded => convert_to_oe_name(pkg, native),
            Platform::Gentoo => gentoo_internal_name(&self.distro, pkg),
        }
    }

    fn target_name(&self, name: &str, native: bool) -> String {
        match self.platform {
            Platform::OpenEmbedded => convert_to_oe_name(name, native),
            Platform::Gentoo => name.to_string(),
        }
    }

    fn platform_name(&self, name: &str) -> String {
        self.target_name(name, false)
    }

    /// Resolve every key of one dependency category.
    pub async fn resolve_all(
        &self,
        ctx: &mut GenerationContext,
        internal: &BTreeSet<String>,
        external: &BTreeSet<String>,
        native: bool,
    ) -> Resolved {
        let mut out = Resolved::default();
        for key in internal {
            let name = self.internal_name(key, native);
            tracing::debug!("Internal dependency add: {name}");
            out.names.insert(name);
        }
        for key in external.iter().filter(|k| !internal.contains(*k)) {
            self.resolve_external(ctx, key, native, &mut out).await;
        }
        out
    }

    async fn resolve_external(
        &self,
        ctx: &mut GenerationContext,
        key: &str,
        native: bool,
        out: &mut Resolved,
    ) {
        if let Some(entry) = ctx.cache.get(key).cloned() {
            self.apply_entry(key, &entry, native, out, "cached");
            return;
        }

        match self.table.resolve(key, self.platform) {
            Some(names) if names.is_empty() => {
                ctx.cache.insert(key, CacheEntry::Empty);
                return;
            }
            Some(names) => {
                for name in &names {
                    let recipe = self.target_name(name, native);
                    tracing::debug!("External dependency add: {recipe}");
                    out.names.insert(recipe);
                    out.platform.insert(self.platform_name(name));
                    ctx.cache.record_name(key, name);
                }
                return;
            }
            None => {}
        }

        if let Some(entry) = ctx.cache.previous(key).cloned() {
            self.apply_entry(key, &entry, native, out, "previous run");
            ctx.cache.insert(key, entry);
            return;
        }

        if let Some(lookup) = self.lookup {
            let query = convert_to_oe_name(key, false);
            match lookup.query_recipe(&query).await {
                Ok(Some(found)) => {
                    let recipe = self.target_name(&found.name, native);
                    let oe_name = self.platform_name(&found.name);
                    self.reporter.info(&format!(
                        "Resolved in OpenEmbedded: {key} as {} in {} as recipe {recipe}",
                        found.name, found.layer
                    ));
                    out.names.insert(recipe);
                    out.platform.insert(oe_name.clone());
                    ctx.cache.record_name(key, &oe_name);
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    // not cached, so a later package may retry the lookup
                    self.reporter
                        .warn(&format!("Layer index lookup for '{key}' failed: {e}"));
                    self.fall_back(key, native, out);
                    return;
                }
            }
        }

        ctx.cache.insert(key, CacheEntry::NotFound);
        self.fall_back(key, native, out);
        if self.platform.is_oe() {
            self.reporter
                .warn(&format!("Failed to resolve fully: {key}"));
        }
    }

    fn apply_entry(
        &self,
        key: &str,
        entry: &CacheEntry,
        native: bool,
        out: &mut Resolved,
        source: &str,
    ) {
        match entry {
            CacheEntry::Resolved(names) => {
                for name in names {
                    let recipe = self.target_name(name, native);
                    tracing::debug!("Resolved ({source}): {key}: {recipe}");
                    out.names.insert(recipe);
                    out.platform.insert(self.platform_name(name));
                }
            }
            CacheEntry::Empty => {}
            CacheEntry::NotFound => {
                self.fall_back(key, native, out);
                if self.platform.is_oe() {
                    self.reporter.warn(&format!(
                        "Failed to resolve ({source}): {key}: {key}{}",
                        native_suffix(native)
                    ));
                }
            }
        }
    }

    fn fall_back(&self, key: &str, native: bool, out: &mut Resolved) {
        match self.platform {
            Platform::OpenEmbedded => {
                out.names.insert(format!("{key}{}", native_suffix(native)));
                out.platform.insert(key.to_string());
            }
            Platform::Gentoo => out.unresolved.push(key.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Table(HashMap<&'static str, Vec<&'static str>>);

    impl ResolutionTable for Table {
        fn resolve(&self, key: &str, _platform: Platform) -> Option<Vec<String>> {
            self.0
                .get(key)
                .map(|names| names.iter().map(ToString::to_string).collect())
        }
    }

    fn table() -> Table {
        Table(HashMap::from([
            ("boost", vec!["boost"]),
            ("python3-yaml", vec!["${PYTHON_PN}-pyyaml"]),
            ("libomp", vec![]),
        ]))
    }

    #[derive(Default)]
    struct CountingLookup {
        calls: AtomicUsize,
        hit: Option<&'static str>,
    }

    #[async_trait]
    impl RecipeLookup for CountingLookup {
        async fn query_recipe(&self, _name: &str) -> anyhow::Result<Option<RecipeMatch>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.hit.map(|name| RecipeMatch {
                name: name.to_string(),
                layer: "meta-oe".to_string(),
            }))
        }
    }

    fn set(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_unknown_platform() {
        let table = table();
        let err = DependencyResolver::new("debian", "humble", &table, &NullReporter).unwrap_err();
        assert!(matches!(err, FlorError::UnknownPlatform(_)));
    }

    #[tokio::test]
    async fn test_internal_and_table() {
        let table = table();
        let resolver =
            DependencyResolver::new("openembedded", "humble", &table, &NullReporter).unwrap();
        let mut ctx = GenerationContext::new();
        let out = resolver
            .resolve_all(
                &mut ctx,
                &set(&["rclcpp_action"]),
                &set(&["boost", "python3-yaml", "libomp"]),
                true,
            )
            .await;
        assert_eq!(
            out.names,
            set(&["boost-native", "${PYTHON_PN}-pyyaml-native", "rclcpp-action-native"])
        );
        assert_eq!(out.platform, set(&["boost", "${PYTHON_PN}-pyyaml"]));
        assert_eq!(ctx.cache.get("libomp"), Some(&CacheEntry::Empty));
        assert_eq!(
            ctx.cache.get("boost"),
            Some(&CacheEntry::Resolved(set(&["boost"])))
        );
    }

    #[tokio::test]
    async fn test_remote_lookup_happens_once() {
        let table = table();
        let lookup = CountingLookup {
            hit: Some("libusb1"),
            ..Default::default()
        };
        let resolver = DependencyResolver::new("openembedded", "humble", &table, &NullReporter)
            .unwrap()
            .with_lookup(&lookup);
        let mut ctx = GenerationContext::new();
        let mut results = Vec::new();
        for _ in 0..4 {
            results.push(
                resolver
                    .resolve_all(&mut ctx, &BTreeSet::new(), &set(&["libusb-1.0"]), false)
                    .await,
            );
        }
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(results[0].names, set(&["libusb1"]));
    }

    #[tokio::test]
    async fn test_not_found_falls_back_once() {
        let table = table();
        let lookup = CountingLookup::default();
        let resolver = DependencyResolver::new("openembedded", "humble", &table, &NullReporter)
            .unwrap()
            .with_lookup(&lookup);
        let mut ctx = GenerationContext::new();
        for native in [false, true, false] {
            let out = resolver
                .resolve_all(&mut ctx, &BTreeSet::new(), &set(&["mystery_lib"]), native)
                .await;
            let expected = if native { "mystery_lib-native" } else { "mystery_lib" };
            assert_eq!(out.names, set(&[expected]));
            assert_eq!(out.platform, set(&["mystery_lib"]));
        }
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.cache.get("mystery_lib"), Some(&CacheEntry::NotFound));
    }

    #[tokio::test]
    async fn test_previous_run_is_consulted_after_table() {
        let table = table();
        let lookup = CountingLookup::default();
        let resolver = DependencyResolver::new("openembedded", "humble", &table, &NullReporter)
            .unwrap()
            .with_lookup(&lookup);
        let mut ctx = GenerationContext::new();
        ctx.cache.previous = ResolutionCache::parse_dump(
            "boost:\n- stale-boost\nlibfoo:\n- foo\n",
        )
        .unwrap();

        let out = resolver
            .resolve_all(&mut ctx, &BTreeSet::new(), &set(&["boost", "libfoo"]), false)
            .await;
        assert_eq!(out.names, set(&["boost", "foo"]));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.cache.get("libfoo"), Some(&CacheEntry::Resolved(set(&["foo"]))));
    }

    #[tokio::test]
    async fn test_gentoo_unresolved() {
        let table = table();
        let resolver = DependencyResolver::new("gentoo", "humble", &table, &NullReporter).unwrap();
        let mut ctx = GenerationContext::new();
        let out = resolver
            .resolve_all(&mut ctx, &set(&["rcl_yaml"]), &set(&["boost", "nope"]), false)
            .await;
        assert_eq!(out.names, set(&["boost", "ros-humble/rcl-yaml"]));
        assert_eq!(out.unresolved, vec!["nope"]);
    }

    #[test]
    fn test_dump_roundtrip_tri_state() {
        let mut cache = ResolutionCache::new();
        cache.record_name("boost", "boost");
        cache.insert("libomp", CacheEntry::Empty);
        cache.insert("mystery", CacheEntry::NotFound);
        let yaml = cache.to_yaml().unwrap();
        assert_eq!(yaml, "boost:\n- boost\nlibomp: []\nmystery: null\n");
        let parsed = ResolutionCache::parse_dump(&yaml).unwrap();
        assert_eq!(&parsed, cache.entries());
    }
}
