//! Batch driver and delta reporting.
//!
//! Runs a generator over every package of one distro, classifies each
//! outcome and aggregates the changes for the commit and PR text. Only
//! errors the generator could not classify stop the batch.

use crate::generator::{GenerationOutcome, InstallerGenerator};
use crate::util::title_case;
use crate::{GenerationContext, Reporter};
use anyhow::{Result, bail};
use flor_schema::Distribution;
use std::collections::{BTreeMap, BTreeSet};

/// How a batch picks and treats packages.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Keep recipes that already exist for the released version.
    pub preserve_existing: bool,
    /// Packages never generated.
    pub skip_keys: BTreeSet<String>,
    /// Only these packages instead of the whole distro.
    pub only: Option<Vec<String>>,
}

/// Aggregated result of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub distro: String,
    /// Packages whose recipe was (re)written.
    pub installers: Vec<String>,
    /// `*pkg version*` or `*pkg old --> new*` for every written recipe.
    pub changes: Vec<String>,
    /// Package -> external keys that could not be resolved.
    pub unresolved: BTreeMap<String, Vec<String>>,
    /// Packages that failed for any other classified reason.
    pub failed: Vec<String>,
    pub succeeded: usize,
}

impl BatchReport {
    /// Packages attempted, skipped ones excluded.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed_count()
    }

    pub fn failed_count(&self) -> usize {
        self.unresolved.len() + self.failed.len()
    }
}

fn select_packages(distro: &Distribution, only: Option<&[String]>) -> Result<Vec<String>> {
    match only {
        Some(pkgs) => {
            for pkg in pkgs {
                if !distro.contains(pkg) {
                    bail!("No package to satisfy key '{pkg}'");
                }
            }
            Ok(pkgs.to_vec())
        }
        None => Ok(distro.package_names().map(ToString::to_string).collect()),
    }
}

/// Generate installers for the packages of `distro`.
///
/// # Errors
///
/// Returns the first error a generator could not classify, or an error when
/// an `only` package is not part of the distro.
pub async fn generate_installers(
    ctx: &mut GenerationContext,
    distro: &Distribution,
    generator: &dyn InstallerGenerator,
    options: &BatchOptions,
    reporter: &dyn Reporter,
) -> Result<BatchReport> {
    let packages = select_packages(distro, options.only.as_deref())?;
    let total = packages.len().max(1) as f64;
    let mut report = BatchReport {
        distro: distro.name().to_string(),
        ..BatchReport::default()
    };

    reporter.info(&format!(
        "Generating installers for distro '{}'",
        distro.name()
    ));
    for (i, pkg) in packages.iter().enumerate() {
        if options.skip_keys.contains(pkg) {
            reporter.warn(&format!("Package '{pkg}' is in skip-keys list, skipping..."));
            continue;
        }
        let percent = 100.0 * i as f64 / total;
        reporter.progress(percent, &format!("Regenerating package '{pkg}'..."));

        let outcome = generator
            .generate(ctx, distro, pkg, options.preserve_existing)
            .await?;
        match outcome {
            GenerationOutcome::Changed { version, previous } => {
                reporter.ok(&format!(
                    "{percent:.1}%: Successfully generated installer for package '{pkg}'."
                ));
                report.succeeded += 1;
                report.changes.push(match previous {
                    Some(previous) => format!("*{pkg} {previous} --> {version}*"),
                    None => format!("*{pkg} {version}*"),
                });
                report.installers.push(pkg.clone());
            }
            GenerationOutcome::Unchanged => report.succeeded += 1,
            GenerationOutcome::UnresolvedDependency(keys) => {
                reporter.err(&format!(
                    "{percent:.1}%: Failed to generate installer for package '{pkg}'!"
                ));
                for key in &keys {
                    reporter.err(&format!(" unresolved: \"{key}\""));
                }
                report.unresolved.insert(pkg.clone(), keys);
            }
            GenerationOutcome::UnknownLicense(license) => {
                reporter.err(&format!("{percent:.1}%: Unknown License '{license}'."));
                report.failed.push(pkg.clone());
            }
            GenerationOutcome::MissingMetadata(reason) => {
                tracing::debug!("{pkg}: {reason}");
                reporter.err(&format!(
                    "{percent:.1}%: Failed to generate installer for package {pkg}!"
                ));
                report.failed.push(pkg.clone());
            }
        }
    }

    reporter.info(&format!(
        "------ Generated {} / {} for distro {} ------",
        report.succeeded,
        report.total(),
        report.distro
    ));
    if !report.unresolved.is_empty() {
        reporter.warn("Unresolved:");
        for (pkg, keys) in &report.unresolved {
            reporter.warn(&format!("{pkg}:"));
            reporter.warn(&format!("  {}", keys.join(", ")));
        }
    }
    Ok(report)
}

/// Changes grouped by distro, for the PR body.
///
/// Distros without changes are left out; the rest are title-cased and
/// sorted, each with its changes sorted.
pub fn gen_delta_msg(total_changes: &BTreeMap<String, Vec<String>>) -> String {
    let mut delta = String::from("Changes:\n========\n");
    for (distro, changes) in total_changes {
        if changes.is_empty() {
            continue;
        }
        let mut changes = changes.clone();
        changes.sort();
        delta.push_str(&format!("{} Changes:\n---------------\n", title_case(distro)));
        for change in &changes {
            delta.push_str(&format!("* {change}\n"));
        }
        delta.push('\n');
    }
    delta
}

/// Checklist of packages with missing dependencies.
pub fn gen_missing_deps_msg<S: AsRef<str>>(missing: &[S]) -> String {
    if missing.is_empty() {
        return "No missing dependencies.\n".to_string();
    }
    let mut sorted: Vec<&str> = missing.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    let mut msg = String::from("Missing Dependencies:\n=====================\n");
    for pkg in sorted {
        msg.push_str(&format!(" * [ ] {pkg}\n"));
    }
    msg
}
