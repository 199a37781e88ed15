//! Shared types and wire formats for flor.
//!
//! This crate holds the plain data that every other part of flor passes
//! around: validated package names, ROS release versions, target platforms,
//! dependency sets, and the rosdistro index / distribution-cache file
//! formats. It performs no I/O.

pub mod deps;
pub mod distro;
pub mod types;

pub use deps::{DependencyCategory, DependencySet};
pub use distro::{
    DistributionCache, DistributionEntry, DistributionFile, Distribution, DistroError, IndexFile,
    ReleaseRepository, RepositoryEntry,
};
pub use types::{PackageName, Platform, RosVersion, UnknownPlatform, VersionError};
