// src/rules/versions.rs

//! Package version tables
//!
//! A raw version assignment has the form
//!
//! ```text
//! [5.0,6);Export-Package=5.0.1;Import-Package=[5.0,7)
//! ```
//!
//! The first segment is the global version range for the package; every
//! further segment scopes a range to one manifest attribute. `;` separates
//! segments, `=` assigns, and `\` escapes the next character.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap};

/// Final package -> version range
pub type VersionTable = BTreeMap<String, String>;

/// Attribute name -> (final package -> version range)
pub type SpecificVersionTable = BTreeMap<String, BTreeMap<String, String>>;

/// Global and attribute-scoped version tables
#[derive(Debug, Clone, Default)]
pub struct PackageVersions {
    global: VersionTable,
    specific: SpecificVersionTable,
}

/// Parsed form of one raw version assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionAssignment {
    pub version: String,
    pub specific: Vec<(String, String)>,
}

impl PackageVersions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw assignment for `package`, e.g. `[5.0,6);Export-Package=5.0`
    pub fn assign(&mut self, package: &str, raw: &str) -> Result<()> {
        let parsed = parse_version_assignment(package, raw)?;
        self.global.insert(package.to_string(), parsed.version);
        for (attribute, version) in parsed.specific {
            self.specific
                .entry(attribute)
                .or_default()
                .insert(package.to_string(), version);
        }
        Ok(())
    }

    /// Set the global range for a package
    pub fn set(&mut self, package: impl Into<String>, version: impl Into<String>) {
        self.global.insert(package.into(), version.into());
    }

    /// Set an attribute-scoped range for a package
    pub fn set_specific(
        &mut self,
        attribute: impl Into<String>,
        package: impl Into<String>,
        version: impl Into<String>,
    ) {
        self.specific
            .entry(attribute.into())
            .or_default()
            .insert(package.into(), version.into());
    }

    /// Layer `overrides` on top of these tables
    pub fn merge(&mut self, overrides: &PackageVersions) {
        self.global
            .extend(overrides.global.iter().map(|(k, v)| (k.clone(), v.clone())));
        for (attribute, table) in &overrides.specific {
            self.specific
                .entry(attribute.clone())
                .or_default()
                .extend(table.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    /// Attribute-scoped range first, then the global one
    pub fn version_for(&self, attribute: &str, package: &str) -> Option<&str> {
        self.specific
            .get(attribute)
            .and_then(|t| t.get(package))
            .or_else(|| self.global.get(package))
            .map(String::as_str)
    }

    pub fn global(&self) -> &VersionTable {
        &self.global
    }

    pub fn specific(&self) -> &SpecificVersionTable {
        &self.specific
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.specific.is_empty()
    }

    /// Every package with a version, with the attribute it is scoped to (if any)
    pub fn packages(&self) -> impl Iterator<Item = (Option<&str>, &str)> {
        self.global.keys().map(|p| (None, p.as_str())).chain(
            self.specific
                .iter()
                .flat_map(|(a, t)| t.keys().map(move |p| (Some(a.as_str()), p.as_str()))),
        )
    }
}

/// Parse `version[;attribute=version]*`
pub fn parse_version_assignment(package: &str, raw: &str) -> Result<VersionAssignment> {
    let segments = split_unescaped(raw, ';');
    let mut segments = segments.into_iter();

    let first = segments.next().unwrap_or_default();
    let (version, assignment) = split_assignment(&first);
    if assignment.is_some() {
        return Err(Error::config(format!(
            "version for package '{}' has an unexpected '=' in '{}'",
            package, raw
        )));
    }
    let version = version.trim().to_string();
    if version.is_empty() {
        return Err(Error::config(format!(
            "version for package '{}' is empty in '{}'",
            package, raw
        )));
    }

    let mut specific = Vec::new();
    for segment in segments {
        let (attribute, value) = split_assignment(&segment);
        let Some(value) = value else {
            return Err(Error::config(format!(
                "version for package '{}' has segment '{}' without an attribute assignment",
                package,
                attribute.trim()
            )));
        };
        let (value, extra) = split_assignment(&value);
        if extra.is_some() {
            return Err(Error::config(format!(
                "version for package '{}' has an extra '=' in segment '{}'",
                package,
                segment.text.trim()
            )));
        }

        let attribute = attribute.trim();
        let value = value.trim();
        if attribute.is_empty() || value.is_empty() {
            return Err(Error::config(format!(
                "version for package '{}' has an empty attribute or version in '{}'",
                package, raw
            )));
        }
        specific.push((attribute.to_string(), value.to_string()));
    }

    Ok(VersionAssignment { version, specific })
}

/// One segment with its escape marks preserved so nested splits stay correct
#[derive(Debug, Default, Clone)]
struct Segment {
    text: String,
    escaped: Vec<bool>,
}

impl std::ops::Deref for Segment {
    type Target = str;
    fn deref(&self) -> &str {
        &self.text
    }
}

fn split_unescaped(raw: &str, delimiter: char) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = Segment::default();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                current.text.push(next);
                current.escaped.push(true);
            }
        } else if c == delimiter {
            segments.push(std::mem::take(&mut current));
        } else {
            current.text.push(c);
            current.escaped.push(false);
        }
    }
    segments.push(current);
    segments
}

/// Split on the first unescaped `=`
fn split_assignment(segment: &Segment) -> (String, Option<Segment>) {
    let chars: Vec<char> = segment.text.chars().collect();
    let split = chars
        .iter()
        .zip(&segment.escaped)
        .position(|(c, escaped)| *c == '=' && !escaped);

    match split {
        None => (segment.text.clone(), None),
        Some(at) => {
            let head: String = chars[..at].iter().collect();
            let tail = Segment {
                text: chars[at + 1..].iter().collect(),
                escaped: segment.escaped[at + 1..].to_vec(),
            };
            (head, Some(tail))
        }
    }
}

/// Check that every version key names a package the renames can produce
pub fn validate_versions(
    versions: &PackageVersions,
    is_known_final: impl Fn(&str) -> bool,
) -> Result<()> {
    let mut unknown: HashMap<&str, Vec<&str>> = HashMap::new();
    for (attribute, package) in versions.packages() {
        if !is_known_final(package) {
            unknown
                .entry(package)
                .or_default()
                .push(attribute.unwrap_or("<global>"));
        }
    }

    if let Some((package, attributes)) = unknown.into_iter().min_by_key(|(p, _)| *p) {
        return Err(Error::config(format!(
            "version update for package '{}' ({}) does not match any renamed package",
            package,
            attributes.join(", ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_version() {
        let parsed = parse_version_assignment("jakarta.servlet", "[5.0,6)").unwrap();
        assert_eq!(parsed.version, "[5.0,6)");
        assert!(parsed.specific.is_empty());
    }

    #[test]
    fn test_attribute_scoped_versions() {
        let parsed = parse_version_assignment(
            "jakarta.servlet",
            "[5.0,6);Export-Package=5.0.1;Import-Package=[5.0,7)",
        )
        .unwrap();
        assert_eq!(parsed.version, "[5.0,6)");
        assert_eq!(
            parsed.specific,
            vec![
                ("Export-Package".to_string(), "5.0.1".to_string()),
                ("Import-Package".to_string(), "[5.0,7)".to_string()),
            ]
        );
    }

    #[test]
    fn test_escaped_separators_are_literal() {
        let parsed = parse_version_assignment("p", r"1.0\;x;A=b\=c").unwrap();
        assert_eq!(parsed.version, "1.0;x");
        assert_eq!(parsed.specific, vec![("A".to_string(), "b=c".to_string())]);
    }

    #[test]
    fn test_malformed_assignments_are_errors() {
        assert!(parse_version_assignment("p", "").is_err());
        assert!(parse_version_assignment("p", ";A=1").is_err());
        assert!(parse_version_assignment("p", "1=2").is_err());
        assert!(parse_version_assignment("p", "1;A=2=3").is_err());
        assert!(parse_version_assignment("p", "1;A").is_err());
        assert!(parse_version_assignment("p", "1;A=").is_err());

        let err = parse_version_assignment("jakarta.bad", "1;A=2=3").unwrap_err();
        assert!(err.to_string().contains("jakarta.bad"));
    }

    #[test]
    fn test_specific_overrides_global_for_that_attribute_only() {
        let mut versions = PackageVersions::new();
        versions
            .assign("jakarta.servlet", "[5.0,6);Export-Package=5.0")
            .unwrap();
        assert_eq!(
            versions.version_for("Export-Package", "jakarta.servlet"),
            Some("5.0")
        );
        assert_eq!(
            versions.version_for("Import-Package", "jakarta.servlet"),
            Some("[5.0,6)")
        );
        assert_eq!(versions.version_for("Import-Package", "jakarta.other"), None);
    }

    #[test]
    fn test_validate_names_unknown_package() {
        let mut versions = PackageVersions::new();
        versions.set("jakarta.servlet", "[5,6)");
        assert!(validate_versions(&versions, |p| p == "jakarta.servlet").is_ok());

        versions.set_specific("Import-Package", "jakarta.other", "[1,2)");
        let err = validate_versions(&versions, |p| p == "jakarta.servlet").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("jakarta.other"), "{}", msg);
        assert!(msg.contains("Import-Package"), "{}", msg);
    }
}
