//! License-string normalisation.
//!
//! Free-text `<license>` values are mapped to short identifiers by an
//! ordered rule list. Order matters: LGPL text also matches the GPL rule,
//! and the specific Creative Commons variants also match the generic one.

use regex::Regex;
use std::sync::LazyLock;

/// How the canonical identifier is built from a match.
#[derive(Debug, Clone, Copy)]
enum Version {
    /// No version: always the fixed identifier.
    None,
    /// Version taken from a capture group; `default` when absent.
    Group {
        group: usize,
        prefix: &'static str,
        default: &'static str,
    },
    /// Like `Group`, but the version is taken from the last group.
    LastGroup {
        prefix: &'static str,
        default: &'static str,
    },
    /// Apache prints the version as a float with one decimal.
    Float {
        group: usize,
        prefix: &'static str,
        default: &'static str,
    },
}

struct Rule {
    pattern: Regex,
    canonical: &'static str,
    version: Version,
}

fn rule(pattern: &str, canonical: &'static str, version: Version) -> Rule {
    Rule {
        // Patterns are constants and covered by tests
        pattern: Regex::new(&format!("(?i){pattern}")).unwrap_or_else(|e| {
            panic!("invalid license pattern {pattern}: {e}");
        }),
        canonical,
        version,
    }
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(
            r"^(Apache)((.)*(1\.0|1\.1|2\.0|2))?",
            "",
            Version::Float {
                group: 4,
                prefix: "Apache-",
                default: "Apache-1.0",
            },
        ),
        rule(
            r"^(BSD)((.)*([124]))?",
            "",
            Version::Group {
                group: 4,
                prefix: "BSD-",
                default: "BSD",
            },
        ),
        rule(
            r"(((LGPL)([^0-9]*))|(GNU(.)*Lesser(.)*Public(.)*License([^0-9])*))([0-9]?\.[0-9])?",
            "",
            Version::LastGroup {
                prefix: "LGPL-",
                default: "LGPL-2",
            },
        ),
        rule(
            r"((([^L])*(GPL)([^0-9]*))|(GNU(.)*GENERAL(.)*PUBLIC(.)*LICENSE([^0-9])*))([0-9])?",
            "",
            Version::LastGroup {
                prefix: "GPL-",
                default: "GPL-1",
            },
        ),
        rule(
            r"^(Mozilla)((.)*(1\.1))?",
            "",
            Version::Group {
                group: 4,
                prefix: "MPL-",
                default: "MPL-2.0",
            },
        ),
        rule(r"^MIT", "MIT", Version::None),
        rule(
            r"^((Creative(.)?Commons)|CC)((.)*)((Non(.)?Commercial)|NC)((.)*)((No(.)?Derivatives)|ND)",
            "CC-BY-NC-ND-4.0",
            Version::None,
        ),
        rule(r"^(CC(.)?BY(.)?NC(.)?SA(.)?)", "CC-BY-NC-SA-4.0", Version::None),
        rule(r"^(Creative(.)?Commons)((.)*)", "CC-BY-SA-3.0", Version::None),
        rule(r"^(Boost)((.)*([1]))?", "Boost-1.0", Version::None),
        rule(r"^(Public(.)?Domain)", "public_domain", Version::None),
    ]
});

/// Canonical identifier for `license`, or `None` when no rule matches.
pub fn classify(license: &str) -> Option<String> {
    RULES.iter().find_map(|rule| {
        let caps = rule.pattern.captures(license)?;
        let id = match rule.version {
            Version::None => rule.canonical.to_string(),
            Version::Group {
                group,
                prefix,
                default,
            } => caps
                .get(group)
                .map_or_else(|| default.to_string(), |m| format!("{prefix}{}", m.as_str())),
            Version::LastGroup { prefix, default } => caps
                .get(caps.len() - 1)
                .map_or_else(|| default.to_string(), |m| format!("{prefix}{}", m.as_str())),
            Version::Float {
                group,
                prefix,
                default,
            } => match caps.get(group).and_then(|m| m.as_str().parse::<f64>().ok()) {
                Some(v) => format!("{prefix}{v:.1}"),
                None => default.to_string(),
            },
        };
        Some(id)
    })
}

/// Canonical identifier for `license`. Unrecognised strings pass through
/// unchanged with a warning.
pub fn normalize(license: &str) -> String {
    classify(license).unwrap_or_else(|| {
        tracing::warn!("Could not match license \"{license}\". Passing it through...");
        license.to_string()
    })
}

static MULTI_HYPHEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("-{2,}").unwrap_or_else(|e| panic!("{e}")));

/// Make a license identifier safe for a bitbake `LICENSE` value.
pub fn translate_for_bitbake(license: &str) -> String {
    let replaced: String = license
        .chars()
        .map(|c| if " /:+()".contains(c) { '-' } else { c })
        .collect();
    MULTI_HYPHEN.replace_all(&replaced, "-").into_owned()
}

/// Whether `license` can be used verbatim as a Gentoo license name.
pub fn is_gentoo_token(license: &str) -> bool {
    !license.is_empty()
        && license
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._+-".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_licenses() {
        let cases = [
            ("Apache License 2.0", "Apache-2.0"),
            ("Apache 2", "Apache-2.0"),
            ("Apache License, Version 1.1", "Apache-1.1"),
            ("Apache", "Apache-1.0"),
            ("BSD", "BSD"),
            ("BSD-3", "BSD"),
            ("BSD 2-Clause", "BSD-2"),
            ("GNU GPLv3", "GPL-3"),
            ("GPL", "GPL-1"),
            ("GNU General Public License v2", "GPL-2"),
            ("LGPL", "LGPL-2"),
            ("LGPLv2.1", "LGPL-2.1"),
            ("GNU Lesser Public License 2.1", "LGPL-2.1"),
            ("Mozilla Public License 1.1", "MPL-1.1"),
            ("Mozilla", "MPL-2.0"),
            ("MIT", "MIT"),
            ("mit license", "MIT"),
            ("Creative Commons Non-Commercial No Derivatives", "CC-BY-NC-ND-4.0"),
            ("CC-BY-NC-SA", "CC-BY-NC-SA-4.0"),
            ("Creative Commons", "CC-BY-SA-3.0"),
            ("Boost Software License 1.0", "Boost-1.0"),
            ("Public Domain", "public_domain"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize(input), expected, "normalize({input:?})");
        }
    }

    #[test]
    fn test_unknown_passes_through() {
        assert_eq!(classify("Proprietary"), None);
        assert_eq!(normalize("Proprietary"), "Proprietary");
    }

    #[test]
    fn test_idempotent() {
        for input in [
            "Apache License 2.0",
            "BSD-3",
            "GNU GPLv3",
            "GNU Lesser Public License 2.1",
            "Public Domain",
            "MIT",
            "Boost",
            "Mozilla",
            "CC-BY-NC-SA",
        ] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn test_translate_for_bitbake() {
        assert_eq!(translate_for_bitbake("Apache-2.0"), "Apache-2.0");
        assert_eq!(translate_for_bitbake("GPL (v2+)"), "GPL-v2-");
        assert_eq!(translate_for_bitbake("a / b:c"), "a-b-c");
    }

    #[test]
    fn test_gentoo_token() {
        assert!(is_gentoo_token("BSD-2"));
        assert!(is_gentoo_token("public_domain"));
        assert!(is_gentoo_token("LGPL-2.1+"));
        assert!(!is_gentoo_token("Some License"));
        assert!(!is_gentoo_token(""));
    }
}
