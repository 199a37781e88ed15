//! Per-distro generation state.
//!
//! One `GenerationContext` lives for the batch over a single distro. It
//! carries the resolution cache and the accumulators the side-car files are
//! rendered from, and is reset before the next distro starts.

use crate::resolver::ResolutionCache;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
pub struct GenerationContext {
    /// rosdep key resolutions seen so far in this run
    pub cache: ResolutionCache,
    /// recipe name -> (version, component)
    pub recipes: BTreeMap<String, (String, String)>,
    /// Components that produced at least one recipe
    pub components: BTreeSet<String>,
    /// Recipes needed on the build host (`-native`)
    pub native_recipes: BTreeSet<String>,
    /// Dependencies named by `<test_depend>`
    pub test_deps: BTreeSet<String>,
    /// Dependencies named anywhere else
    pub non_test_deps: BTreeSet<String>,
    /// Packages that could not be generated at all
    pub not_generated: BTreeSet<String>,
    /// Platform packages pulled in by external dependencies
    pub platform_deps: BTreeSet<String>,
    /// Width of the longest component name, for column alignment
    pub max_component_name: usize,
}

impl GenerationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything accumulated for the previous distro.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record a generated (or preserved) recipe.
    pub fn register_recipe(&mut self, recipe: &str, version: &str, component: &str) {
        self.max_component_name = self.max_component_name.max(component.len());
        self.components.insert(component.to_string());
        self.recipes
            .insert(recipe.to_string(), (version.to_string(), component.to_string()));
    }

    /// Test dependencies that nothing outside a `<test_depend>` asks for.
    pub fn test_only_deps(&self) -> BTreeSet<String> {
        self.test_deps
            .difference(&self.non_test_deps)
            .cloned()
            .collect()
    }
}
