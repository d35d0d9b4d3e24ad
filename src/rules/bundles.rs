// src/rules/bundles.rs

//! Bundle identity updates
//!
//! A bundle update replaces the identity headers of an OSGi bundle manifest.
//! The raw form is four comma separated fields:
//!
//! ```text
//! symbolicName,version,name,description
//! *,[5.0,6),+" Jakarta",+" (Jakarta)"
//! ```
//!
//! A symbolic name of `*` keeps the bundle's own name. A leading `+` on the
//! name or description appends to the existing value instead of replacing it.
//! Commas inside double quotes, brackets or parentheses do not split fields.

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Key matching every bundle
pub const ANY_BUNDLE: &str = "*";

/// Marker for additive text updates in raw configuration
pub const ADDITIVE_MARKER: char = '+';

/// How a name or description header is updated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextUpdate {
    /// Replace the whole value
    Replace(String),
    /// Append a suffix to the existing value
    Append(String),
}

impl TextUpdate {
    /// Parse a raw field, honoring the additive marker and optional quotes
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.strip_prefix(ADDITIVE_MARKER) {
            Some(suffix) => Some(Self::Append(unquote(suffix.trim_start()))),
            None => Some(Self::Replace(unquote(raw))),
        }
    }

    /// Apply to an existing header value (absent counts as empty)
    pub fn apply(&self, current: Option<&str>) -> String {
        match self {
            Self::Replace(value) => value.clone(),
            Self::Append(suffix) => format!("{}{}", current.unwrap_or_default(), suffix),
        }
    }
}

/// Replacement identity for one bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleUpdate {
    /// New symbolic name, or `*` to keep the original
    pub symbolic_name: String,
    /// New `Bundle-Version`
    pub version: Option<String>,
    /// `Bundle-Name` update
    pub name: Option<TextUpdate>,
    /// `Bundle-Description` update
    pub description: Option<TextUpdate>,
}

impl BundleUpdate {
    /// Parse `symbolicName,version,name,description`; trailing fields are optional
    pub fn parse(raw: &str) -> Result<Self> {
        let fields = split_fields(raw);
        if fields.len() > 4 {
            return Err(Error::config(format!(
                "bundle update '{}' has {} fields, expected at most 4",
                raw,
                fields.len()
            )));
        }

        let symbolic_name = unquote(fields.first().map(String::as_str).unwrap_or_default());
        if symbolic_name.is_empty() {
            return Err(Error::config(format!(
                "bundle update '{}' has no symbolic name",
                raw
            )));
        }

        let version = fields
            .get(1)
            .map(|v| unquote(v))
            .filter(|v| !v.is_empty());

        Ok(Self {
            symbolic_name,
            version,
            name: fields.get(2).and_then(|f| TextUpdate::parse(f)),
            description: fields.get(3).and_then(|f| TextUpdate::parse(f)),
        })
    }

    /// Resolve the symbolic name for a bundle currently called `current`
    pub fn symbolic_name_for<'a>(&'a self, current: &'a str) -> &'a str {
        if self.symbolic_name == ANY_BUNDLE {
            current
        } else {
            &self.symbolic_name
        }
    }
}

/// Symbolic name (or `*`) -> update
#[derive(Debug, Clone, Default)]
pub struct BundleTable {
    updates: BTreeMap<String, BundleUpdate>,
}

impl BundleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, update: BundleUpdate) {
        self.updates.insert(key.into(), update);
    }

    /// Parse and insert a raw update
    pub fn insert_raw(&mut self, key: &str, raw: &str) -> Result<()> {
        let update = BundleUpdate::parse(raw)
            .map_err(|e| Error::config(format!("bundle '{}': {}", key, e)))?;
        self.insert(key.trim(), update);
        Ok(())
    }

    pub fn merge(&mut self, overrides: &BundleTable) {
        self.updates.extend(
            overrides
                .updates
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }

    /// Exact symbolic name first, then the match-all entry
    pub fn lookup(&self, symbolic_name: &str) -> Option<&BundleUpdate> {
        self.updates
            .get(symbolic_name)
            .or_else(|| self.updates.get(ANY_BUNDLE))
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }
}

fn split_fields(raw: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quoted = false;

    for c in raw.chars() {
        match c {
            '"' => quoted = !quoted,
            '[' | '(' if !quoted => depth += 1,
            ']' | ')' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                fields.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    fields.push(current);
    fields
}

fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_update() {
        let update = BundleUpdate::parse(r#"*,[5.0,6),+" Jakarta","Rewritten bundle""#).unwrap();
        assert_eq!(update.symbolic_name, "*");
        assert_eq!(update.version.as_deref(), Some("[5.0,6)"));
        assert_eq!(update.name, Some(TextUpdate::Append(" Jakarta".to_string())));
        assert_eq!(
            update.description,
            Some(TextUpdate::Replace("Rewritten bundle".to_string()))
        );
    }

    #[test]
    fn test_parse_symbolic_name_only() {
        let update = BundleUpdate::parse("com.acme.jakarta").unwrap();
        assert_eq!(update.symbolic_name, "com.acme.jakarta");
        assert_eq!(update.version, None);
        assert_eq!(update.name, None);
        assert_eq!(update.symbolic_name_for("com.acme"), "com.acme.jakarta");
    }

    #[test]
    fn test_parse_rejects_bad_updates() {
        assert!(BundleUpdate::parse("").is_err());
        assert!(BundleUpdate::parse("a,b,c,d,e").is_err());
    }

    #[test]
    fn test_text_update_apply() {
        let append = TextUpdate::Append(" Jakarta".to_string());
        assert_eq!(append.apply(Some("Servlet API")), "Servlet API Jakarta");
        assert_eq!(append.apply(None), " Jakarta");
        let replace = TextUpdate::Replace("New".to_string());
        assert_eq!(replace.apply(Some("Old")), "New");
    }

    #[test]
    fn test_lookup_falls_back_to_wildcard() {
        let mut table = BundleTable::new();
        table.insert_raw("*", "*,5.0").unwrap();
        table.insert_raw("com.acme", "com.acme.jakarta,6.0").unwrap();

        assert_eq!(table.lookup("com.acme").unwrap().symbolic_name, "com.acme.jakarta");
        let fallback = table.lookup("org.other").unwrap();
        assert_eq!(fallback.symbolic_name_for("org.other"), "org.other");
        assert_eq!(fallback.version.as_deref(), Some("5.0"));
    }
}
