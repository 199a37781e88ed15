//! `flor yocto`: regenerate meta-ros.

use super::{Plan, cache_commits, checkout, deliver, plan, pr_only, pr_text, upstream};
use crate::YoctoArgs;
use crate::ui::{ConsoleReporter, summary_table};
use anyhow::{Context, Result};
use chrono::Datelike;
use flor_core::archive::HttpArchives;
use flor_core::batch::{BatchOptions, BatchReport, gen_delta_msg, generate_installers};
use flor_core::config::Config;
use flor_core::generator::YoctoGenerator;
use flor_core::layer_index::LayerIndex;
use flor_core::overlay::{RosMeta, commit_message};
use flor_core::pull_request::{clean_up, ctime};
use flor_core::recipe::GENERATOR_NAME;
use flor_core::resolver::DependencyResolver;
use flor_core::rosdistro::{HttpIndex, IndexSource, RosdepTable, load_distribution};
use flor_core::sidecar::{
    ConfParams, sources_url, write_change_summary, write_conf, write_distro_cache,
    write_newer_platform_components, write_rosdep_resolve,
};
use flor_core::{GenerationContext, Reporter, rosdep_resolve_path};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

/// Collaborators shared by every distro of one run.
struct Session<'a> {
    config: &'a Config,
    client: reqwest::Client,
    index: HttpIndex,
    table: RosdepTable,
    layers: LayerIndex,
    archives: HttpArchives,
    meta: &'a RosMeta,
    skip_keys: BTreeSet<String>,
    options: BatchOptions,
    year: i32,
    reporter: Arc<dyn Reporter>,
}

impl Session<'_> {
    fn root(&self) -> &Path {
        self.meta.repo().dir()
    }

    /// Generate every recipe of `distro` and rewrite its side-car files.
    async fn regenerate(&self, ctx: &mut GenerationContext, distro: &str) -> Result<BatchReport> {
        let reporter = self.reporter.as_ref();
        let root = self.root();
        ctx.reset();
        ctx.cache
            .load_previous(&rosdep_resolve_path(root, distro))
            .with_context(|| format!("Failed to load the previous rosdep resolutions of {distro}"))?;

        let loaded = load_distribution(&self.index, distro).await?;
        let distribution = &loaded.distribution;
        let resolver = DependencyResolver::new("openembedded", distro, &self.table, reporter)?
            .with_lookup(&self.layers);
        let generator = YoctoGenerator::new(root, resolver, &self.archives, reporter)
            .with_skip_keys(self.skip_keys.clone())
            .with_copyright(&self.config.distributor, self.year);
        let report =
            generate_installers(ctx, distribution, &generator, &self.options, reporter).await?;

        let last_modified = self.index.cache_last_modified(distro).await?;
        let params = ConfParams {
            distro,
            ros_version: distribution.ros_version(),
            cache_commits: cache_commits(self.meta.repo(), distro),
            release_platforms: distribution.release_platforms(),
            skip_keys: &self.skip_keys,
            last_modified: &last_modified,
            distributor: &self.config.distributor,
            year: self.year,
        };
        write_conf(root, ctx, &params, reporter)?;
        write_distro_cache(root, distro, &loaded.cache_yaml, reporter)?;
        write_rosdep_resolve(root, distro, ctx, reporter)?;
        write_change_summary(root, distro, &self.meta.change_summary()?, reporter)?;

        let release = self.config.platform_release.clone().or_else(|| {
            distribution
                .release_platforms()
                .get("ubuntu")
                .and_then(|releases| releases.first().cloned())
        });
        if let Some(release) = release {
            let url = sources_url(&self.config.packages_url, distribution.ros_version(), &release);
            write_newer_platform_components(root, distro, &url, &self.client, reporter).await?;
        } else {
            reporter.warn(&format!(
                "No ubuntu release platform for {distro}; not writing newer platform components"
            ));
        }
        Ok(report)
    }
}

fn default_comment(args: &YoctoArgs, plan: &Plan, hash: &str) -> String {
    match (&args.common.only, &args.common.ros_distro) {
        (Some(only), Some(distro)) => format!(
            "{GENERATOR_NAME} yocto generator began regeneration of package(s) {only:?} \
             from ROS distribution(s) {distro} on Meta-ROS from commit {hash}."
        ),
        _ => format!(
            "{GENERATOR_NAME} yocto generator began regeneration of all packages from ROS \
             distribution(s) {:?} on Meta-ROS from commit {hash}.",
            plan.targets
        ),
    }
}

/// Regenerate meta-ros for the selected distros and file (or save) the PR.
pub async fn run(args: &YoctoArgs, argv: &[String]) -> Result<()> {
    let common = &args.common;
    common.validate()?;
    let reporter: Arc<dyn Reporter> = Arc::new(ConsoleReporter);
    let config = Config::load(common.config.as_deref())?;
    let key = upstream(common, "ros", "meta-ros")?;
    if common.pr_only {
        return pr_only(common, key, &config.github_api_url, reporter.as_ref()).await;
    }

    let client = flor_core::http_client()?;
    let index = HttpIndex::new(client.clone(), &config.index_url);
    let active = index.index().await?.distros_by_status("active");
    let plan = plan(common, active, reporter.as_ref());

    let (repo, _temp) = checkout(common, key, reporter.as_ref())?.into_parts();
    let branch = format!("superflore/{}", chrono::Utc::now().format("%Y%m%d%H%M%S"));
    let meta = RosMeta::new(repo, &branch, reporter.as_ref())?;
    let comment = match &common.pr_comment {
        Some(comment) => comment.clone(),
        None => default_comment(args, &plan, &meta.repo().last_hash()?),
    };

    let skip_keys = common.skip_keys();
    let session = Session {
        config: &config,
        table: RosdepTable::load(&client, &config.rosdep_sources, reporter.as_ref()).await?,
        layers: LayerIndex::new(client.clone(), &config.layer_index_url, reporter.clone()),
        archives: HttpArchives::new(
            client.clone(),
            args.tar_archive_dir.as_deref(),
            reporter.clone(),
        )?,
        client,
        index,
        meta: &meta,
        options: BatchOptions {
            preserve_existing: plan.preserve_existing,
            skip_keys: skip_keys.clone(),
            only: common.only.clone(),
        },
        skip_keys,
        year: chrono::Local::now().year(),
        reporter: reporter.clone(),
    };

    let mut ctx = GenerationContext::new();
    let mut reports = Vec::new();
    for distro in &plan.targets {
        reports.push(session.regenerate(&mut ctx, distro).await?);
    }
    session.archives.save().await?;
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
                clean_up(&super::pr_dir());
                return Ok(());
            }
            gen_delta_msg(&total_changes)
        }
    };

    let message = commit_message(&plan.scope, &ctime(chrono::Local::now()));
    meta.commit_changes(&plan.targets, &message, reporter.as_ref())?;
    let pr = pr_text(&comment, argv, &delta, "");
    deliver(
        common,
        &config.github_api_url,
        meta.repo(),
        meta.branch(),
        &pr,
        reporter.as_ref(),
    )
    .await
}
