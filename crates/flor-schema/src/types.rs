//! Core value types: package names, ROS versions, and target platforms.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// A ROS package name as it appears in a distribution file.
///
/// Unlike recipe names, ROS package names are kept verbatim: conversion to a
/// target naming convention happens at emission time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    /// Wrap a package name.
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Return the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name with underscores replaced by hyphens (`rclcpp_action` -> `rclcpp-action`).
    pub fn dashed(&self) -> String {
        self.0.replace('_', "-")
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Raised when a target platform identifier is not one flor can generate for.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown target platform '{0}'")]
pub struct UnknownPlatform(pub String);

/// A packaging system flor emits recipes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Yocto / OpenEmbedded bitbake recipes.
    OpenEmbedded,
    /// Gentoo ebuilds.
    Gentoo,
}

impl Platform {
    /// The rosdep OS key for this platform.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenEmbedded => "openembedded",
            Self::Gentoo => "gentoo",
        }
    }

    /// The OS version rosdep rules are looked up under.
    ///
    /// OpenEmbedded rules are unversioned; Gentoo rules are keyed on the
    /// profile version.
    pub fn rosdep_version(self) -> &'static str {
        match self {
            Self::OpenEmbedded => "",
            Self::Gentoo => "2.4.0",
        }
    }

    /// Whether this is the OpenEmbedded backend.
    pub fn is_oe(self) -> bool {
        matches!(self, Self::OpenEmbedded)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openembedded" => Ok(Self::OpenEmbedded),
            "gentoo" => Ok(Self::Gentoo),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

/// Errors from parsing a release version string.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The version string was empty.
    #[error("empty version string")]
    Empty,
}

/// A bloom release version: an upstream `x.y.z` plus a release increment.
///
/// `1.4.2-3` has upstream `1.4.2` and increment `3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RosVersion {
    upstream: String,
    release_inc: String,
}

impl RosVersion {
    /// Parse a `x.y.z-N` release version. A missing increment is treated as `0`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::Empty`] for an empty string.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::Empty);
        }
        let (upstream, inc) = match s.split_once('-') {
            Some((up, inc)) => (up, inc),
            None => (s, "0"),
        };
        Ok(Self {
            upstream: upstream.to_string(),
            release_inc: inc.to_string(),
        })
    }

    /// The upstream `x.y.z` part.
    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// The release increment.
    pub fn release_inc(&self) -> &str {
        &self.release_inc
    }

    /// Render the version the way the given platform spells it.
    ///
    /// Increment `0` is dropped entirely. Otherwise OpenEmbedded uses
    /// `x.y.z-N` and Gentoo uses the revision form `x.y.z-rN`.
    pub fn for_platform(&self, platform: Platform) -> String {
        if self.release_inc == "0" {
            return self.upstream.clone();
        }
        let prefix = if platform.is_oe() { "" } else { "r" };
        format!("{}-{}{}", self.upstream, prefix, self.release_inc)
    }
}

impl fmt::Display for RosVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.upstream, self.release_inc)
    }
}

impl Ord for RosVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let inc = |v: &Self| v.release_inc.parse::<u64>().unwrap_or(0);
        match (
            semver::Version::parse(&self.upstream),
            semver::Version::parse(&other.upstream),
        ) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| inc(self).cmp(&inc(other))),
            (Ok(_), Err(_)) => std::cmp::Ordering::Greater,
            (Err(_), Ok(_)) => std::cmp::Ordering::Less,
            (Err(_), Err(_)) => self.to_string().cmp(&other.to_string()),
        }
    }
}

impl PartialOrd for RosVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
