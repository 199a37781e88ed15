//! `flor gentoo`: regenerate ros-overlay.

use super::{Plan, checkout, deliver, plan, pr_dir, pr_only, pr_text, upstream};
use crate::GentooArgs;
use crate::ui::{ConsoleReporter, summary_table};
use anyhow::Result;
use chrono::Datelike;
use flor_core::batch::{
    BatchOptions, BatchReport, gen_delta_msg, gen_missing_deps_msg, generate_installers,
};
use flor_core::config::Config;
use flor_core::generator::GentooGenerator;
use flor_core::overlay::{ManifestImage, RosOverlay};
use flor_core::pull_request::{clean_up, ctime};
use flor_core::recipe::GENERATOR_NAME;
use flor_core::resolver::DependencyResolver;
use flor_core::rosdistro::{HttpIndex, IndexSource, RosdepTable, load_distribution};
use flor_core::{GenerationContext, Reporter};
use std::collections::{BTreeMap, BTreeSet};

/// Container that regenerates manifests, if one was requested.
fn manifest_image(args: &GentooArgs) -> Option<ManifestImage> {
    match (&args.dockerfile, &args.image) {
        (Some(dockerfile), _) => Some(ManifestImage::Dockerfile(dockerfile.clone())),
        (None, Some(image)) => Some(ManifestImage::Image(image.clone())),
        (None, None) => None,
    }
}

fn default_comment(args: &GentooArgs, plan: &Plan, hash: &str) -> String {
    match (&args.common.only, &args.common.ros_distro) {
        (Some(only), Some(distro)) => format!(
            "{GENERATOR_NAME} ebuild generator began regeneration of package(s) {only:?} \
             from ROS distribution(s) {distro} on ros-overlay from commit {hash}."
        ),
        _ => format!(
            "{GENERATOR_NAME} ebuild generator began regeneration of all packages from ROS \
             distribution(s) {:?} on ros-overlay from commit {hash}.",
            plan.targets
        ),
    }
}

/// Packages that failed on unresolved keys, across distros.
fn missing_packages(reports: &[BatchReport]) -> Vec<String> {
    reports
        .iter()
        .flat_map(|r| r.unresolved.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Regenerate ros-overlay for the selected distros and file (or save) the PR.
pub async fn run(args: &GentooArgs, argv: &[String]) -> Result<()> {
    let common = &args.common;
    common.validate()?;
    let reporter: &dyn Reporter = &ConsoleReporter;
    let config = Config::load(common.config.as_deref())?;
    let key = upstream(common, "ros", "ros-overlay")?;
    if common.pr_only {
        return pr_only(common, key, &config.github_api_url, reporter).await;
    }

    let client = flor_core::http_client()?;
    let index = HttpIndex::new(client.clone(), &config.index_url);
    let active = index.index().await?.distros_by_status("active");
    let plan = plan(common, active, reporter);

    let (repo, _temp) = checkout(common, key, reporter)?.into_parts();
    let overlay = RosOverlay::new(repo, reporter)?;
    let root = overlay.repo().dir().to_path_buf();
    let comment = match &common.pr_comment {
        Some(comment) => comment.clone(),
        None => default_comment(args, &plan, &overlay.repo().last_hash()?),
    };

    let table = RosdepTable::load(&client, &config.rosdep_sources, reporter).await?;
    let skip_keys = common.skip_keys();
    let options = BatchOptions {
        preserve_existing: plan.preserve_existing,
        skip_keys: skip_keys.clone(),
        only: common.only.clone(),
    };
    let year = chrono::Local::now().year();

    let mut ctx = GenerationContext::new();
    let mut reports = Vec::new();
    for distro in &plan.targets {
        ctx.reset();
        let loaded = load_distribution(&index, distro).await?;
        let resolver = DependencyResolver::new("gentoo", distro, &table, reporter)?;
        let generator = GentooGenerator::new(&root, resolver, reporter)
            .with_skip_keys(skip_keys.clone())
            .with_copyright(&config.distributor, year);
        reports.push(
            generate_installers(&mut ctx, &loaded.distribution, &generator, &options, reporter)
                .await?,
        );
    }
    println!("{}", summary_table(&reports));

    let total_changes: BTreeMap<String, Vec<String>> = reports
        .iter()
        .map(|r| (r.distro.clone(), r.changes.clone()))
        .collect();
    let delta = match &common.only {
        Some(only) => format!("Regenerated: '{}'\n", only.join(" ")),
        None => {
            if total_changes.values().all(Vec::is_empty) {
                reporter.info("ROS distro is up to date.");
                reporter.info("Exiting...");
                clean_up(&pr_dir());
                return Ok(());
            }
            gen_delta_msg(&total_changes)
        }
    };
    let missing_deps = gen_missing_deps_msg(&missing_packages(&reports));

    if let Some(image) = manifest_image(args) {
        let regen: BTreeMap<String, Vec<String>> = reports
            .iter()
            .map(|r| (r.distro.clone(), r.installers.clone()))
            .collect();
        overlay.regenerate_manifests(&regen, &image, reporter).await?;
    }

    overlay.commit_changes(&plan.scope, &ctime(chrono::Local::now()), reporter)?;
    let pr = pr_text(&comment, argv, &delta, &missing_deps);
    deliver(
        common,
        &config.github_api_url,
        overlay.repo(),
        overlay.branch(),
        &pr,
        reporter,
    )
    .await
}
