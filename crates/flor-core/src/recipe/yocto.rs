//! BitBake recipes for meta-ros.

use super::{GENERATOR_NAME, RecipeText};
use crate::archive::ArchiveChecksums;
use crate::license::{normalize, translate_for_bitbake};
use crate::naming::convert_to_oe_name;
use crate::resolver::DependencyResolver;
use crate::GenerationContext;
use flor_schema::{DependencyCategory, DependencySet};
use std::collections::BTreeSet;

const GITHUB_PREFIX: &str = "https://github.com/";

/// The package whose export dependencies are built natively instead, to
/// break the bootstrap cycle of the build tool itself.
pub const BOOTSTRAP_PACKAGE: &str = "ament_cmake";

/// Everything needed to render one recipe.
#[derive(Debug, Clone)]
pub struct YoctoRecipe {
    /// ROS package name (`ROS_BPN`).
    pub name: String,
    /// Repository the package is released from (`ROS_CN`).
    pub component: String,
    /// Release version in OpenEmbedded form.
    pub version: String,
    pub description: String,
    pub maintainer: String,
    pub author: Option<String>,
    pub homepage: Option<String>,
    pub licenses: Vec<String>,
    pub build_type: String,
    /// The package's `package.xml`, for `LIC_FILES_CHKSUM`.
    pub package_xml: String,
    pub src_uri: String,
    pub checksums: ArchiveChecksums,
    pub deps: DependencySet,
}

/// Target names of each dependency block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedDeps {
    pub build: BTreeSet<String>,
    pub buildtool: BTreeSet<String>,
    pub export: BTreeSet<String>,
    pub buildtool_export: BTreeSet<String>,
    pub exec: BTreeSet<String>,
    pub test: BTreeSet<String>,
}

/// Line number and md5 of the first `package.xml` line mentioning a license.
pub fn license_line(package_xml: &str) -> Option<(usize, String)> {
    package_xml
        .split('\n')
        .enumerate()
        .find(|(_, line)| line.contains("license"))
        .map(|(i, line)| (i + 1, format!("{:x}", md5::compute(format!("{line}\n")))))
}

/// Directory the release archive unpacks to.
///
/// `https://github.com/ros2-gbp/foo-release/archive/release/humble/foo/1.0.0-1.tar.gz`
/// unpacks to `foo-release-release-humble-foo-1.0.0-1`.
pub fn src_location(src_uri: &str) -> Option<String> {
    let path = src_uri.strip_prefix(GITHUB_PREFIX)?;
    let dirs: Vec<&str> = path.split('/').collect();
    if dirs.len() < 7 {
        return None;
    }
    Some(
        format!(
            "{}-{}-{}-{}-{}",
            dirs[1], dirs[3], dirs[4], dirs[5], dirs[6]
        )
        .replace(".tar.gz", ""),
    )
}

/// Resolve one category and record its platform packages.
async fn resolve_category(
    ctx: &mut GenerationContext,
    resolver: &DependencyResolver<'_>,
    deps: &DependencySet,
    category: DependencyCategory,
    native: bool,
) -> BTreeSet<String> {
    let resolved = resolver
        .resolve_all(ctx, deps.internal(category), deps.external(category), native)
        .await;
    ctx.platform_deps.extend(resolved.platform);
    resolved.names
}

impl YoctoRecipe {
    /// `meta-ros` component directory.
    pub fn oe_component(&self) -> String {
        convert_to_oe_name(&self.component, false)
    }

    /// Recipe name.
    pub fn oe_name(&self) -> String {
        convert_to_oe_name(&self.name, false)
    }

    /// Resolve every dependency block and feed the context accumulators.
    pub async fn resolve(
        &self,
        ctx: &mut GenerationContext,
        resolver: &DependencyResolver<'_>,
    ) -> ResolvedDeps {
        use DependencyCategory::{Build, BuildTool, BuildToolExport, Export, Run, Test};

        let deps = &self.deps;
        let build = resolve_category(ctx, resolver, deps, Build, false).await;
        let buildtool = resolve_category(ctx, resolver, deps, BuildTool, true).await;
        let mut native = buildtool.clone();
        let mut export = resolve_category(ctx, resolver, deps, Export, false).await;
        let mut buildtool_export = resolve_category(ctx, resolver, deps, BuildToolExport, true).await;
        native.extend(buildtool_export.iter().cloned());
        ctx.native_recipes.extend(native.iter().cloned());
        let exec = resolve_category(ctx, resolver, deps, Run, false).await;
        let test = resolve_category(ctx, resolver, deps, Test, false).await;

        ctx.non_test_deps.extend(
            build
                .iter()
                .chain(&export)
                .chain(&native)
                .chain(&exec)
                .cloned(),
        );
        ctx.test_deps.extend(test.iter().cloned());

        if self.name == BOOTSTRAP_PACKAGE {
            let bootstrap = resolve_category(ctx, resolver, deps, Export, true).await;
            buildtool_export.extend(bootstrap.iter().cloned());
            ctx.non_test_deps.extend(bootstrap.iter().cloned());
            ctx.native_recipes.extend(bootstrap);
            export.clear();
        }

        ResolvedDeps {
            build,
            buildtool,
            export,
            buildtool_export,
            exec,
            test,
        }
    }

    /// Lay out the recipe.
    ///
    /// Returns `None` when `package.xml` has no license line or the source
    /// is not a GitHub release archive.
    pub fn sections(
        &self,
        deps: &ResolvedDeps,
        distributor: &str,
        year: i32,
    ) -> Option<RecipeText> {
        let (license_line, license_md5) = license_line(&self.package_xml)?;
        let src_location = src_location(&self.src_uri)?;
        let oe_component = self.oe_component();

        let mut text = RecipeText::new();
        text.raw(format!(
            "# Generated by {GENERATOR_NAME} -- DO NOT EDIT\n#\n# Copyright {year} {distributor}\n\n"
        ))
        .raw("inherit ros_distro_${ROS_DISTRO}\ninherit ros_superflore_generated\n\n");

        let description = if self.description.is_empty() {
            "None".to_string()
        } else {
            self.description.replace('\n', " ")
        };
        text.assign("DESCRIPTION", description)
            .assign("AUTHOR", &self.maintainer);
        if let Some(author) = &self.author {
            text.assign("ROS_AUTHOR", author);
        }
        if let Some(homepage) = &self.homepage {
            text.assign("HOMEPAGE", homepage);
        }
        let license = self
            .licenses
            .iter()
            .map(|l| translate_for_bitbake(&normalize(l)))
            .collect::<Vec<_>>()
            .join(" & ");
        text.assign("SECTION", "devel")
            .assign("LICENSE", license)
            .assign(
                "LIC_FILES_CHKSUM",
                format!(
                    "file://package.xml;beginline={license_line};endline={license_line};md5={license_md5}"
                ),
            )
            .blank()
            .assign("ROS_CN", &self.component)
            .assign("ROS_BPN", &self.name)
            .blank();

        text.multiline("ROS_BUILD_DEPENDS", &deps.build)
            .blank()
            .multiline("ROS_BUILDTOOL_DEPENDS", &deps.buildtool)
            .blank()
            .multiline("ROS_EXPORT_DEPENDS", &deps.export)
            .blank()
            .multiline("ROS_BUILDTOOL_EXPORT_DEPENDS", &deps.buildtool_export)
            .blank()
            .multiline("ROS_EXEC_DEPENDS", &deps.exec)
            .blank()
            .comment("Currently informational only -- see http://www.ros.org/reps/rep-0149.html#dependency-tags.")
            .multiline("ROS_TEST_DEPENDS", &deps.test)
            .blank()
            .assign("DEPENDS", "${ROS_BUILD_DEPENDS} ${ROS_BUILDTOOL_DEPENDS}")
            .comment(
                "Bitbake doesn't support the \"export\" concept, so build them as if we needed them to build this package (even though we actually",
            )
            .comment(
                "don't) so that they're guaranteed to have been staged should this package appear in another's DEPENDS.",
            )
            .append("DEPENDS", "${ROS_EXPORT_DEPENDS} ${ROS_BUILDTOOL_EXPORT_DEPENDS}")
            .blank()
            .append("RDEPENDS_${PN}", "${ROS_EXEC_DEPENDS}")
            .blank();

        text.assign(
            "SRC_URI",
            format!("{};downloadfilename=${{ROS_SP}}.tar.gz", self.src_uri),
        )
        .assign("SRC_URI[md5sum]", &self.checksums.md5)
        .assign("SRC_URI[sha256sum]", &self.checksums.sha256)
        .assign("S", format!("${{WORKDIR}}/{src_location}"))
        .blank()
        .assign(
            "ROS_COMPONENT_TYPE",
            format!("${{@ros_distro__get_component_type('{oe_component}', d)}}"),
        )
        .assign("ROS_BUILD_TYPE", &self.build_type)
        .blank()
        .comment("Allow the above settings to be overridden.")
        .raw(format!(
            "ROS_INCLUDES_TREE := \"${{@ros_superflore_generated__get_includes_tree('{oe_component}', d)}}\"\n"
        ));

        let inc = "include ${ROS_LAYERDIR}/${ROS_INCLUDES_TREE}";
        text.raw(format!(
            "{inc}/{oe_component}/{oe_component}_common.inc\n\
             {inc}/{oe_component}/{oe_component}-${{PV}}_common.inc\n\
             {inc}/{oe_component}/${{BPN}}.inc\n\
             {inc}/{oe_component}/${{BPN}}-${{PV}}.inc\n"
        ))
        .blank()
        .raw("inherit ${ROS_COMPONENT_TYPE}_component\ninherit ros_${ROS_BUILD_TYPE}\n");

        Some(text)
    }
}
