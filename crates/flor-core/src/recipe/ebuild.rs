//! Gentoo ebuilds for ros-overlay.

use super::RecipeText;
use crate::util::sanitize_string;
use quick_xml::escape::escape;
use std::collections::BTreeSet;

const KEYWORDS: &str = "~x86 ~amd64 ~arm ~arm64";

#[derive(Debug, Clone, Default)]
pub struct Ebuild {
    pub distro: String,
    pub ros_version: u32,
    /// ROS package name.
    pub name: String,
    pub description: String,
    pub homepage: Option<String>,
    pub src_uri: String,
    /// Gentoo license names.
    pub licenses: Vec<String>,
    pub build_type: String,
    pub maintainer_name: String,
    pub maintainer_email: String,
    /// Runtime atoms (`RDEPEND`).
    pub rdepend: BTreeSet<String>,
    /// Build-only atoms, added to `DEPEND` after `${RDEPEND}`.
    pub depend: BTreeSet<String>,
    /// Test atoms, under `test? ( ... )`.
    pub tdepend: BTreeSet<String>,
}

fn eclass(build_type: &str) -> &'static str {
    match build_type {
        "ament_cmake" => "ament-cmake",
        "ament_python" => "ament-python",
        "cmake" => "cmake-utils",
        _ => "ros-cmake",
    }
}

fn atoms(out: &mut String, items: &BTreeSet<String>, indent: &str) {
    for item in items {
        out.push_str(&format!("{indent}{item}\n"));
    }
}

impl Ebuild {
    fn python_compat(&self) -> &'static str {
        if self.ros_version == 1 {
            "python{2_7,3_5,3_6}"
        } else {
            "python3_{8,9,10,11}"
        }
    }

    /// Lay out the ebuild.
    pub fn sections(&self, distributor: &str, year: i32) -> RecipeText {
        let mut text = RecipeText::new();
        text.raw(format!(
            "# Copyright {year} {distributor}\n# Distributed under the terms of the BSD license\n\n"
        ))
        .raw("EAPI=6\n")
        .raw(format!("PYTHON_COMPAT=( {} )\n\n", self.python_compat()))
        .raw(format!("inherit {}\n\n", eclass(&self.build_type)));

        let description = sanitize_string(&self.description.replace('\n', " "), "`$");
        text.raw(format!("DESCRIPTION=\"{description}\"\n"));
        if let Some(homepage) = &self.homepage {
            text.raw(format!("HOMEPAGE=\"{homepage}\"\n"));
        }
        text.raw(format!(
            "SRC_URI=\"{} -> ${{PN}}-{}-release-${{PV}}.tar.gz\"\n\n",
            self.src_uri, self.distro
        ))
        .raw(format!("LICENSE=\"{}\"\n\n", self.licenses.join(" ")))
        .raw("SLOT=\"0\"\n")
        .raw(format!("KEYWORDS=\"{KEYWORDS}\"\n"));
        if !self.tdepend.is_empty() {
            text.raw("IUSE=\"test\"\n");
        }
        text.blank();

        let mut rdepend = String::from("RDEPEND=\"\n");
        atoms(&mut rdepend, &self.rdepend, "\t");
        rdepend.push_str("\"\n");
        text.raw(rdepend);

        let mut depend = String::from("DEPEND=\"${RDEPEND}\n");
        atoms(&mut depend, &self.depend, "\t");
        if !self.tdepend.is_empty() {
            depend.push_str("\ttest? (\n");
            atoms(&mut depend, &self.tdepend, "\t\t");
            depend.push_str("\t)\n");
        }
        depend.push_str("\"\n\n");
        text.raw(depend);

        text.raw(format!("ROS_DISTRO=\"{}\"\n", self.distro))
            .raw("ROS_PREFIX=\"opt/ros/${ROS_DISTRO}\"\n");
        text
    }

    /// The `metadata.xml` beside the ebuild.
    pub fn metadata_xml(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <!DOCTYPE pkgmetadata SYSTEM \"http://www.gentoo.org/dtd/metadata.dtd\">\n\
             <pkgmetadata>\n  \
             <longdescription>{}</longdescription>\n  \
             <maintainer type=\"person\">\n    \
             <name>{}</name>\n    \
             <email>{}</email>\n  \
             </maintainer>\n\
             </pkgmetadata>\n",
            escape(self.description.as_str()),
            escape(self.maintainer_name.as_str()),
            escape(self.maintainer_email.as_str()),
        )
    }
}
