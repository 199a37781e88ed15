//! `package.xml` metadata.

use crate::util::sanitize_string;
use flor_schema::DependencyCategory;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::BTreeMap;

/// Values for `$VAR` references in `condition` attributes.
#[derive(Debug, Clone, Default)]
pub struct ConditionEnv {
    vars: BTreeMap<String, String>,
}

impl ConditionEnv {
    /// The variables rosdistro defines for a distro.
    pub fn for_distro(distro: &str, ros_version: u32) -> Self {
        let python = if ros_version == 1 { "2" } else { "3" };
        let mut vars = BTreeMap::new();
        vars.insert("ROS_DISTRO".to_string(), distro.to_string());
        vars.insert("ROS_VERSION".to_string(), ros_version.to_string());
        vars.insert("ROS_PYTHON_VERSION".to_string(), python.to_string());
        Self { vars }
    }

    fn value<'a>(&'a self, token: &'a str) -> &'a str {
        match token.strip_prefix('$') {
            Some(var) => self.vars.get(var).map_or("", String::as_str),
            None => token.trim_matches(|c| c == '"' || c == '\''),
        }
    }

    fn term(&self, term: &str) -> bool {
        let parts: Vec<&str> = term.split_whitespace().collect();
        match parts.as_slice() {
            [lhs, "==", rhs] => self.value(lhs) == self.value(rhs),
            [lhs, "!=", rhs] => self.value(lhs) != self.value(rhs),
            [lhs, "<", rhs] => self.value(lhs) < self.value(rhs),
            [lhs, ">", rhs] => self.value(lhs) > self.value(rhs),
            [lhs, "<=", rhs] => self.value(lhs) <= self.value(rhs),
            [lhs, ">=", rhs] => self.value(lhs) >= self.value(rhs),
            _ => {
                tracing::debug!("unsupported condition term '{term}', assuming true");
                true
            }
        }
    }

    /// Evaluate a condition such as `$ROS_VERSION == 2 and $ROS_DISTRO != foxy`.
    ///
    /// Parentheses are not supported; `and` binds tighter than `or`.
    pub fn evaluate(&self, condition: &str) -> bool {
        let condition = condition.trim();
        if condition.is_empty() {
            return true;
        }
        condition
            .split(" or ")
            .any(|clause| clause.split(" and ").all(|t| self.term(t)))
    }
}

/// Fields of a `package.xml` that recipes are built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub maintainer_name: String,
    pub maintainer_email: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub licenses: Vec<String>,
    pub homepage: Option<String>,
    pub build_type: String,
    pub dependencies: Vec<(DependencyCategory, String)>,
}

struct Frame {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
}

impl Frame {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn categories(tag: &str) -> &'static [DependencyCategory] {
    use DependencyCategory::{Build, BuildTool, BuildToolExport, Export, Run, Test};
    match tag {
        "build_depend" => &[Build],
        "buildtool_depend" => &[BuildTool],
        "build_export_depend" => &[Export],
        "buildtool_export_depend" => &[BuildToolExport],
        "exec_depend" => &[Run],
        "run_depend" => &[Export, Run],
        "depend" => &[Build, Export, Run],
        "test_depend" => &[Test],
        _ => &[],
    }
}

fn open_frame(e: &BytesStart<'_>) -> Result<Frame, quick_xml::Error> {
    let mut attrs = Vec::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        attrs.push((key, attr.unescape_value()?.into_owned()));
    }
    Ok(Frame {
        name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        attrs,
        text: String::new(),
    })
}

impl PackageMetadata {
    /// Parse `xml`, keeping only dependencies whose condition holds in `env`.
    ///
    /// # Errors
    ///
    /// Returns the XML error for malformed documents.
    pub fn parse(xml: &str, env: &ConditionEnv) -> Result<Self, quick_xml::Error> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut meta = Self::default();
        let mut urls: Vec<(Option<String>, String)> = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(open_frame(&e)?),
                Event::Empty(e) => {
                    let frame = open_frame(&e)?;
                    meta.close(&frame, stack.last(), env, &mut urls);
                }
                Event::Text(t) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&t.unescape()?);
                    }
                }
                Event::CData(t) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&t));
                    }
                }
                Event::End(_) => {
                    if let Some(frame) = stack.pop() {
                        meta.close(&frame, stack.last(), env, &mut urls);
                        // markup inside <description> still contributes its text
                        if let Some(parent) = stack.last_mut() {
                            if parent.name == "description" {
                                parent.text.push(' ');
                                parent.text.push_str(&frame.text);
                            }
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        meta.homepage = urls
            .iter()
            .find(|(kind, _)| kind.as_deref() == Some("website"))
            .or_else(|| urls.first())
            .map(|(_, url)| url.clone());
        if meta.build_type.is_empty() {
            meta.build_type = "catkin".to_string();
        }
        Ok(meta)
    }

    fn close(
        &mut self,
        frame: &Frame,
        parent: Option<&Frame>,
        env: &ConditionEnv,
        urls: &mut Vec<(Option<String>, String)>,
    ) {
        let text = frame.text.trim();
        let parent = parent.map_or("", |p| p.name.as_str());
        if parent == "export" {
            if frame.name == "build_type"
                && self.build_type.is_empty()
                && env.evaluate(frame.attr("condition").unwrap_or_default())
            {
                self.build_type = text.to_string();
            }
            return;
        }
        if parent != "package" {
            return;
        }
        match frame.name.as_str() {
            "name" => self.name = text.to_string(),
            "version" => self.version = text.to_string(),
            "description" => {
                let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
                self.description = sanitize_string(&collapsed, "\"");
            }
            "maintainer" if self.maintainer_name.is_empty() => {
                self.maintainer_name = text.to_string();
                self.maintainer_email = frame.attr("email").unwrap_or_default().to_string();
            }
            "author" if self.author_name.is_none() => {
                self.author_name = Some(text.to_string());
                self.author_email = frame.attr("email").map(ToString::to_string);
            }
            "license" => self.licenses.push(text.to_string()),
            "url" => urls.push((frame.attr("type").map(ToString::to_string), text.to_string())),
            tag => {
                let cats = categories(tag);
                if cats.is_empty() || text.is_empty() {
                    return;
                }
                if !env.evaluate(frame.attr("condition").unwrap_or_default()) {
                    tracing::debug!("skipping {tag} {text}: condition not met");
                    return;
                }
                for cat in cats {
                    self.dependencies.push((*cat, text.to_string()));
                }
            }
        }
    }

    /// `Name <email>` of the maintainer.
    pub fn maintainer(&self) -> String {
        format!("{} <{}>", self.maintainer_name, self.maintainer_email)
    }

    /// `Name <email>` of the first author, if any author is listed.
    pub fn author(&self) -> Option<String> {
        let name = self.author_name.as_deref().unwrap_or_default();
        match self.author_email.as_deref() {
            Some(email) if !email.is_empty() => Some(format!("{name} <{email}>")),
            _ if !name.is_empty() => Some(name.to_string()),
            _ => None,
        }
    }
}
