//! Recipe text emission.
//!
//! Recipes are assembled from an ordered list of typed sections and only
//! turned into text at the end, so every section can be checked on its own.

pub mod ebuild;
pub mod yocto;

pub use ebuild::Ebuild;
pub use yocto::{ResolvedDeps, YoctoRecipe};

const INDENT: &str = "    ";

/// Name written into generated-file banners.
pub const GENERATOR_NAME: &str = "flor";

/// Ordering of the items of a multi-line variable.
#[derive(Debug, Clone, Copy, Default)]
pub enum SortOrder {
    /// Plain string order.
    #[default]
    Lexicographic,
    /// Order by a derived key; ties keep string order.
    ByKey(fn(&str) -> String),
    /// Keep the caller's order.
    Preserve,
}

/// Render `NAME = "..."` with one item per continued line.
///
/// An empty container renders as `NAME = ""`.
pub fn multiline_variable<I, S>(name: &str, items: I, order: SortOrder) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut items: Vec<String> = items.into_iter().map(|s| s.as_ref().to_string()).collect();
    match order {
        SortOrder::Lexicographic => items.sort(),
        SortOrder::ByKey(key) => {
            items.sort();
            items.sort_by_cached_key(|s| key(s));
        }
        SortOrder::Preserve => {}
    }
    let mut out = format!("{name} = \"");
    if items.is_empty() {
        out.push_str("\"\n");
        return out;
    }
    out.push_str(" \\");
    for item in &items {
        out.push_str(&format!("\n{INDENT}{item} \\"));
    }
    out.push_str("\n\"\n");
    out
}

/// One piece of a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    /// Text emitted verbatim.
    Raw(String),
    /// `# text`
    Comment(String),
    /// `NAME = "value"`
    Assign { name: String, value: String },
    /// `NAME += "value"`
    Append { name: String, value: String },
    /// A multi-line variable block.
    Multiline {
        name: String,
        items: Vec<String>,
        order: SortOrder,
    },
    /// An empty line.
    Blank,
}

impl PartialEq for SortOrder {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::Lexicographic, Self::Lexicographic)
                | (Self::ByKey(_), Self::ByKey(_))
                | (Self::Preserve, Self::Preserve)
        )
    }
}

impl Eq for SortOrder {}

impl Section {
    fn render_into(&self, out: &mut String) {
        match self {
            Self::Raw(text) => out.push_str(text),
            Self::Comment(text) => out.push_str(&format!("# {text}\n")),
            Self::Assign { name, value } => out.push_str(&format!("{name} = \"{value}\"\n")),
            Self::Append { name, value } => out.push_str(&format!("{name} += \"{value}\"\n")),
            Self::Multiline { name, items, order } => {
                out.push_str(&multiline_variable(name, items, *order));
            }
            Self::Blank => out.push('\n'),
        }
    }
}

/// Ordered recipe sections.
#[derive(Debug, Clone, Default)]
pub struct RecipeText {
    sections: Vec<Section>,
}

impl RecipeText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&mut self, text: impl Into<String>) -> &mut Self {
        self.sections.push(Section::Raw(text.into()));
        self
    }

    pub fn comment(&mut self, text: impl Into<String>) -> &mut Self {
        self.sections.push(Section::Comment(text.into()));
        self
    }

    pub fn assign(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.sections.push(Section::Assign {
            name: name.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn append(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.sections.push(Section::Append {
            name: name.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn multiline<I, S>(&mut self, name: &str, items: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.multiline_sorted(name, items, SortOrder::Lexicographic)
    }

    pub fn multiline_sorted<I, S>(&mut self, name: &str, items: I, order: SortOrder) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.sections.push(Section::Multiline {
            name: name.to_string(),
            items: items.into_iter().map(|s| s.as_ref().to_string()).collect(),
            order,
        });
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.sections.push(Section::Blank);
        self
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// The first multi-line block named `name`, rendered.
    pub fn render_variable(&self, name: &str) -> Option<String> {
        self.sections.iter().find_map(|s| match s {
            Section::Multiline { name: n, .. } if n == name => {
                let mut out = String::new();
                s.render_into(&mut out);
                Some(out)
            }
            _ => None,
        })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            section.render_into(&mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiline_empty() {
        assert_eq!(
            multiline_variable("ROS_BUILD_DEPENDS", Vec::<String>::new(), SortOrder::default()),
            "ROS_BUILD_DEPENDS = \"\"\n"
        );
    }

    #[test]
    fn test_multiline_sorted() {
        let text = multiline_variable("DEPS", ["rcutils", "ament-cmake"], SortOrder::Lexicographic);
        assert_eq!(text, "DEPS = \" \\\n    ament-cmake \\\n    rcutils \\\n\"\n");
    }

    #[test]
    fn test_multiline_stable_under_input_order() {
        let a = multiline_variable("X", ["c", "a", "b"], SortOrder::Lexicographic);
        let b = multiline_variable("X", ["b", "c", "a"], SortOrder::Lexicographic);
        assert_eq!(a, b);
    }

    #[test]
    fn test_multiline_custom_key() {
        fn after_slash(s: &str) -> String {
            s.split('/').nth(1).unwrap_or_default().to_string()
        }
        let text = multiline_variable("X", ["a/zeta", "b/alpha"], SortOrder::ByKey(after_slash));
        assert_eq!(text, "X = \" \\\n    b/alpha \\\n    a/zeta \\\n\"\n");

        let kept = multiline_variable("X", ["b", "a"], SortOrder::Preserve);
        assert_eq!(kept, "X = \" \\\n    b \\\n    a \\\n\"\n");
    }

    #[test]
    fn test_builder_render() {
        let mut text = RecipeText::new();
        text.comment("header")
            .blank()
            .assign("SECTION", "devel")
            .append("DEPENDS", "${ROS_BUILD_DEPENDS}")
            .multiline("EMPTY", Vec::<&str>::new());
        assert_eq!(
            text.render(),
            "# header\n\nSECTION = \"devel\"\nDEPENDS += \"${ROS_BUILD_DEPENDS}\"\nEMPTY = \"\"\n"
        );
        assert_eq!(text.render_variable("EMPTY").as_deref(), Some("EMPTY = \"\"\n"));
        assert_eq!(text.sections().len(), 5);
    }
}
