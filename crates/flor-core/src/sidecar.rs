//! Per-distro side-car files of meta-ros.
//!
//! Written once per distro after every package went through the generator:
//! the `generated-ros-distro.inc` conf include, the distro cache and its
//! diffable twin, the resolution dump, the change summary and the list of
//! platform packages the ROS apt repository ships.

use crate::naming::convert_to_oe_name;
use crate::paths::{
    change_summary_path, conf_path, distro_cache_diff_path, distro_cache_path,
    newer_platform_components_path, rosdep_resolve_path,
};
use crate::recipe::{GENERATOR_NAME, RecipeText, SortOrder};
use crate::retry::{RetryConfig, retry_on_error};
use crate::{GenerationContext, Reporter, VERSION};
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use regex::Regex;
use reqwest::Client;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

/// Inputs of the conf include besides the accumulators.
#[derive(Debug, Clone, Copy)]
pub struct ConfParams<'a> {
    pub distro: &'a str,
    pub ros_version: u32,
    /// Commits that touched `files/<distro>/cache.yaml` so far.
    pub cache_commits: usize,
    pub release_platforms: &'a BTreeMap<String, Vec<String>>,
    pub skip_keys: &'a BTreeSet<String>,
    /// `%Y%m%d%H%M%S` of the upstream distro cache.
    pub last_modified: &'a str,
    pub distributor: &'a str,
    pub year: i32,
}

fn basename_key(entry: &str) -> String {
    entry
        .split('/')
        .nth(1)
        .unwrap_or(entry)
        .split('_')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Lay out `generated-ros-distro.inc`.
pub fn conf_sections(ctx: &GenerationContext, params: &ConfParams<'_>) -> RecipeText {
    let ros_version = params.ros_version;
    let python_version = if ros_version == 1 { 2 } else { 3 };
    let mut text = RecipeText::new();

    text.raw(format!(
        "# {}/{}\n# Generated by {GENERATOR_NAME} -- DO NOT EDIT (except ROS_DISTRO_METADATA_VERSION_REVISION)\n#\n# Copyright {} {}\n\n",
        params.distro,
        crate::paths::CONF_FILE_NAME,
        params.year,
        params.distributor
    ))
    .comment(format!(
        "Increment every time meta-ros is released because of a manually created change, ie, NOT as a result of a {GENERATOR_NAME} run (which"
    ))
    .comment("resets it to \"0\").")
    .assign("ROS_DISTRO_METADATA_VERSION_REVISION", "0")
    .blank()
    .assign("ROS_SUPERFLORE_PROGRAM_VERSION", VERSION)
    .assign("ROS_SUPERFLORE_GENERATION_SCHEME", "1")
    .blank()
    .assign("ROS_DISTRO_TYPE", format!("ros{ros_version}"))
    .assign("ROS_VERSION", ros_version.to_string())
    .comment("DO NOT OVERRIDE ROS_PYTHON_VERSION")
    .assign("ROS_PYTHON_VERSION", python_version.to_string())
    .blank()
    .comment(format!(
        "The last-modified timestamp in UTC of the upstream ROS_DISTRO-cache.yaml from which {GENERATOR_NAME} generated the recipes. The date"
    ))
    .comment("portion is used as the second version field of DISTRO_VERSION prior to the first release of a ROS_DISTRO.")
    .assign("ROS_SUPERFLORE_GENERATION_DATETIME", params.last_modified)
    .blank();

    let skip: Vec<String> = params
        .skip_keys
        .iter()
        .map(|k| convert_to_oe_name(k, false))
        .collect();
    text.multiline("ROS_SUPERFLORE_GENERATION_SKIP_LIST", &skip)
        .blank()
        .comment(format!(
            "{GENERATOR_NAME} was unable to generate recipes for these packages, eg, because their repositories are not on GitHub."
        ))
        .multiline("ROS_SUPERFLORE_GENERATION_NOT_POSSIBLE", &ctx.not_generated)
        .blank()
        .comment("Number of commits that will be returned by \"git log files/ROS_DISTRO-cache.yaml\" when the generated files are committed. This is")
        .comment("used for the third version field of DISTRO_VERSION.")
        .assign(
            "ROS_NUM_CACHE_YAML_COMMITS",
            (params.cache_commits + 1).to_string(),
        )
        .blank();

    let platforms: Vec<String> = params
        .release_platforms
        .iter()
        .flat_map(|(os, releases)| releases.iter().map(move |r| format!("{os}-{r}")))
        .collect();
    text.comment("Iterated values of ROS_DISTRO-cache.distribution_file.release_platforms.<LINUX-DISTRO>.[ <NAME> ... ] .")
        .multiline_sorted("ROS_DISTRO_RELEASE_PLATFORMS", &platforms, SortOrder::Preserve)
        .blank()
        .multiline("ROS_SUPERFLORE_GENERATED_RECIPES", ctx.recipes.keys())
        .blank();

    let width = ctx.max_component_name;
    let basenames: Vec<String> = ctx
        .recipes
        .iter()
        .map(|(recipe, (version, component))| {
            format!("{component:>width$}/{recipe}_{version}")
        })
        .collect();
    text.multiline_sorted(
        "ROS_SUPERFLORE_GENERATED_RECIPE_BASENAMES_WITH_COMPONENT",
        &basenames,
        SortOrder::ByKey(basename_key),
    );

    let tests: BTreeSet<String> = ctx
        .test_only_deps()
        .iter()
        .map(|d| convert_to_oe_name(d, false))
        .collect();
    let world = ctx
        .recipes
        .keys()
        .filter(|r| !ctx.native_recipes.contains(*r) && !tests.contains(*r));
    text.blank()
        .comment("What's built by packagegroup-ros-world. Does not include packages that appear solely in ROS_SUPERFLORE_GENERATED_BUILDTOOLS")
        .comment("(with a -native suffix) or ROS_SUPERFLORE_GENERATED_TESTS.")
        .multiline("ROS_SUPERFLORE_GENERATED_WORLD_PACKAGES", world)
        .blank()
        .comment("Packages found in the <buildtool_depend> and <buildtool_export_depend> items, ie, ones for which a -native is built. Does not")
        .comment("include those found in the ROS_EXEC_DEPENDS values in the recipes of build tools.")
        .multiline("ROS_SUPERFLORE_GENERATED_BUILDTOOLS", &ctx.native_recipes)
        .blank()
        .multiline(
            "ROS_SUPERFLORE_GENERATED_PLATFORM_PACKAGE_DEPENDENCIES",
            &ctx.platform_deps,
        )
        .blank()
        .comment("Packages found only in <test_depend> items. Does not include those found only in the ROS_*_DEPENDS of recipes of tests.")
        .multiline("ROS_SUPERFLORE_GENERATED_TESTS", &tests)
        .blank()
        .multiline("ROS_SUPERFLORE_GENERATED_RECIPES_FOR_COMPONENTS", &ctx.components);
    text
}

fn write_file(path: &Path, contents: &str, what: &str, reporter: &dyn Reporter) -> Result<()> {
    let result = path
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|()| std::fs::write(path, contents));
    if let Err(e) = result {
        reporter.err(&format!(
            "Failed to write {what} {} to disk! {e}",
            path.display()
        ));
        return Err(e).with_context(|| format!("Failed to write {}", path.display()));
    }
    reporter.ok(&format!("Wrote {}", path.display()));
    Ok(())
}

/// Write `conf/ros-distro/include/<distro>/generated-ros-distro.inc`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_conf(
    root: &Path,
    ctx: &GenerationContext,
    params: &ConfParams<'_>,
    reporter: &dyn Reporter,
) -> Result<()> {
    let text = conf_sections(ctx, params).render();
    write_file(&conf_path(root, params.distro), &text, "conf", reporter)
}

static DIFFME_TABLE: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\{([^ }][^ }]*)\}", "[[${1}]]"),
        (r"\{", "{\n"),
        (r"\}", "\n}"),
        (r"\[\[", "{"),
        (r"\]\]", "}"),
        (r", ", ",\n"),
        (r"^    ", "-----\n"),
        (r"<version>[^<]*</version>", ""),
        (r"><", ">\n<"),
        (r"^  ", "-----\n"),
        (r"^(source_repo_package_xmls:)", "-----\n${1}"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        let re = Regex::new(&format!("(?m){pattern}"))
            .unwrap_or_else(|e| panic!("invalid diffme pattern {pattern}: {e}"));
        (re, replacement)
    })
    .collect()
});

/// Line-split variant of the distro cache that diffs well in review.
pub fn diffme(cache_yaml: &str) -> String {
    DIFFME_TABLE
        .iter()
        .fold(cache_yaml.to_string(), |text, (re, replacement)| {
            re.replace_all(&text, *replacement).into_owned()
        })
}

/// Write `files/<distro>/cache.yaml` and `files/<distro>/cache.diffme`.
///
/// # Errors
///
/// Returns an error if either file cannot be written.
pub fn write_distro_cache(
    root: &Path,
    distro: &str,
    cache_yaml: &str,
    reporter: &dyn Reporter,
) -> Result<()> {
    write_file(
        &distro_cache_path(root, distro),
        &format!("# {distro}/cache.yaml\n{cache_yaml}"),
        "distro cache",
        reporter,
    )?;
    write_file(
        &distro_cache_diff_path(root, distro),
        &format!("# {distro}/cache.diffme\n{}", diffme(cache_yaml)),
        "diffme distro cache",
        reporter,
    )
}

/// Write `files/<distro>/rosdep-resolve.yaml` from the resolution cache.
///
/// # Errors
///
/// Returns an error if the cache cannot be serialized or written.
pub fn write_rosdep_resolve(
    root: &Path,
    distro: &str,
    ctx: &GenerationContext,
    reporter: &dyn Reporter,
) -> Result<()> {
    let dump = ctx.cache.to_yaml()?;
    write_file(
        &rosdep_resolve_path(root, distro),
        &format!("# {distro}/rosdep-resolve.yaml\n{dump}"),
        "rosdep resolve cache",
        reporter,
    )
}

/// Write `files/<distro>/superflore-change-summary.txt`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_change_summary(
    root: &Path,
    distro: &str,
    summary: &str,
    reporter: &dyn Reporter,
) -> Result<()> {
    write_file(
        &change_summary_path(root, distro),
        &format!("{distro}/superflore-change-summary.txt\n{summary}"),
        "change summary",
        reporter,
    )
}

/// `name;version;build-deps` for every non-ROS source package of a
/// Debian `Sources` index, sorted bytewise by name.
pub fn platform_components(sources: &str) -> Vec<String> {
    let mut lines: Vec<(String, String)> = Vec::new();
    for stanza in sources.split("\n\n") {
        let mut fields: BTreeMap<&str, String> = BTreeMap::new();
        let mut current: Option<&str> = None;
        for line in stanza.lines() {
            if line.starts_with([' ', '\t']) {
                if let Some(key) = current {
                    if let Some(value) = fields.get_mut(key) {
                        value.push_str(line.trim_start());
                    }
                }
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                current = Some(key);
                fields.insert(key, value.trim().to_string());
            }
        }
        let Some(name) = fields.get("Package") else {
            continue;
        };
        if name.starts_with("ros-") {
            continue;
        }
        let version = fields.get("Version").map_or("", String::as_str);
        let deps = fields
            .get("Build-Depends")
            .map_or_else(String::new, |d| d.replace(", ", ","));
        lines.push((name.clone(), format!("{name};{version};{deps}")));
    }
    lines.sort();
    lines.into_iter().map(|(_, line)| line).collect()
}

/// URL of the `Sources.gz` index the platform list is built from.
pub fn sources_url(packages_url: &str, ros_version: u32, release: &str) -> String {
    let repo = if ros_version == 1 {
        "ros".to_string()
    } else {
        format!("ros{ros_version}")
    };
    format!(
        "{}/{repo}/ubuntu/dists/{release}/main/source/Sources.gz",
        packages_url.trim_end_matches('/')
    )
}

/// Fetch `Sources.gz` and write `files/<distro>/newer-platform-components.list`.
///
/// # Errors
///
/// Returns an error if the index cannot be fetched or decoded, or the file
/// cannot be written.
pub async fn write_newer_platform_components(
    root: &Path,
    distro: &str,
    url: &str,
    client: &Client,
    reporter: &dyn Reporter,
) -> Result<()> {
    let path = newer_platform_components_path(root, distro);
    let bytes = retry_on_error(
        &RetryConfig::default(),
        reporter,
        "Retrying Sources.gz download",
        "Failed to download Sources.gz",
        || async {
            client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await
        },
    )
    .await
    .inspect_err(|e| {
        reporter.err(&format!(
            "Failed to write newer platform components {} to disk! {e}",
            path.display()
        ));
    })
    .with_context(|| format!("Failed to fetch {url}"))?;

    let mut sources = String::new();
    GzDecoder::new(&bytes[..])
        .read_to_string(&mut sources)
        .with_context(|| format!("Failed to decompress {url}"))?;
    let mut text = format!("# {distro}/newer-platform-components.list\n");
    for line in platform_components(&sources) {
        text.push_str(&line);
        text.push('\n');
    }
    write_file(&path, &text, "newer platform components", reporter)
}
