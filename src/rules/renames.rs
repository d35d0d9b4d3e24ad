// src/rules/renames.rs

//! Package rename table
//!
//! Each entry maps an initial package to a final package and is kept in two
//! forms: dotted (`javax.servlet`) for source-level text and slashed
//! (`javax/servlet`) for binary names. A key written as `javax.servlet.*`
//! also matches every subpackage, carrying the subpackage tail across.

use crate::error::{Error, Result};
use std::collections::{BTreeSet, HashMap};

/// Wildcard marker that makes a key match subpackages
pub const WILDCARD_SUFFIX: &str = ".*";

/// Package separator flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    /// `javax.servlet`
    Dotted,
    /// `javax/servlet`
    Binary,
}

impl Form {
    pub fn separator(self) -> char {
        match self {
            Self::Dotted => '.',
            Self::Binary => '/',
        }
    }
}

/// A single rename entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameEntry {
    /// Initial package, dotted, without the wildcard marker
    pub initial: String,
    /// Final package, dotted
    pub target: String,
    /// Whether subpackages of `initial` also match
    pub subpackages: bool,
    binary_initial: String,
    binary_target: String,
}

impl RenameEntry {
    fn new(initial: &str, target: &str, subpackages: bool) -> Self {
        Self {
            initial: initial.to_string(),
            target: target.to_string(),
            subpackages,
            binary_initial: initial.replace('.', "/"),
            binary_target: target.replace('.', "/"),
        }
    }

    /// The key in its raw configured spelling
    pub fn raw_key(&self) -> String {
        if self.subpackages {
            format!("{}{}", self.initial, WILDCARD_SUFFIX)
        } else {
            self.initial.clone()
        }
    }

    /// Initial package in the requested form
    pub fn key(&self, form: Form) -> &str {
        match form {
            Form::Dotted => &self.initial,
            Form::Binary => &self.binary_initial,
        }
    }

    /// Final package in the requested form
    pub fn value(&self, form: Form) -> &str {
        match form {
            Form::Dotted => &self.target,
            Form::Binary => &self.binary_target,
        }
    }
}

/// Insertion-ordered package rename table with orphan tracking
#[derive(Debug, Clone, Default)]
pub struct RenameTable {
    entries: Vec<RenameEntry>,
    index: HashMap<String, usize>,
    orphans: BTreeSet<String>,
}

impl RenameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(initial, final)` pairs, later pairs overriding earlier ones
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut table = Self::new();
        for (initial, target) in pairs {
            table.insert(initial.as_ref(), target.as_ref())?;
        }
        Ok(table)
    }

    /// Add or override a rename
    ///
    /// When an override displaces a final package that no other entry still
    /// targets, the displaced package is recorded as orphaned.
    pub fn insert(&mut self, raw_initial: &str, target: &str) -> Result<()> {
        let raw_initial = raw_initial.trim();
        let target = target.trim();

        let (initial, subpackages) = match raw_initial.strip_suffix(WILDCARD_SUFFIX) {
            Some(stem) => (stem, true),
            None => (raw_initial, false),
        };

        validate_package(initial)
            .map_err(|why| Error::config(format!("rename key '{}' {}", raw_initial, why)))?;
        validate_package(target).map_err(|why| {
            Error::config(format!("rename target '{}' for '{}' {}", target, raw_initial, why))
        })?;

        let entry = RenameEntry::new(initial, target, subpackages);
        let key = entry.raw_key();

        if let Some(&slot) = self.index.get(&key) {
            let displaced = std::mem::replace(&mut self.entries[slot], entry);
            if displaced.target != target && !self.targets(&displaced.target) {
                tracing::debug!(
                    "Rename of {} now targets {}; {} is orphaned",
                    key,
                    target,
                    displaced.target
                );
                self.orphans.insert(displaced.target);
            }
        } else {
            self.index.insert(key, self.entries.len());
            self.entries.push(entry);
        }

        self.orphans.remove(target);
        Ok(())
    }

    /// Layer `overrides` on top of this table
    pub fn merge(&mut self, overrides: &RenameTable) -> Result<()> {
        for entry in &overrides.entries {
            self.insert(&entry.raw_key(), &entry.target)?;
        }
        for orphan in &overrides.orphans {
            if !self.targets(orphan) {
                self.orphans.insert(orphan.clone());
            }
        }
        Ok(())
    }

    /// Reverse every rename (final -> initial)
    ///
    /// Orphans name final packages of this table and no rule maps to them
    /// any more, so they have nothing to invert to and are dropped. The
    /// inverted table records its own orphans when two renames share a
    /// final package.
    pub fn invert(&self) -> Result<Self> {
        let mut inverted = Self::new();
        for entry in &self.entries {
            let key = if entry.subpackages {
                format!("{}{}", entry.target, WILDCARD_SUFFIX)
            } else {
                entry.target.clone()
            };
            inverted.insert(&key, &entry.initial)?;
        }
        Ok(inverted)
    }

    pub fn entries(&self) -> &[RenameEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Final packages displaced by overrides
    pub fn orphans(&self) -> &BTreeSet<String> {
        &self.orphans
    }

    /// Whether some entry renames into `package` (dotted)
    pub fn targets(&self, package: &str) -> bool {
        self.entries.iter().any(|e| e.target == package)
    }

    /// Whether `package` may carry version metadata
    pub fn is_known_final(&self, package: &str) -> bool {
        self.targets(package) || self.orphans.contains(package)
    }

    /// Exact lookup of a whole package name
    ///
    /// Non-wildcard keys win over wildcard keys; among wildcard keys the
    /// longest matching prefix wins.
    pub fn lookup(&self, package: &str, form: Form) -> Option<String> {
        if let Some(&slot) = self.index.get(&dotted(package, form)) {
            return Some(self.entries[slot].value(form).to_string());
        }

        let sep = form.separator();
        self.entries
            .iter()
            .filter(|e| e.subpackages)
            .filter_map(|e| {
                let key = e.key(form);
                let tail = package.strip_prefix(key)?;
                (tail.is_empty() || tail.starts_with(sep)).then(|| (key.len(), e, tail))
            })
            .max_by_key(|(len, _, _)| *len)
            .map(|(_, e, tail)| format!("{}{}", e.value(form), tail))
    }
}

/// Raw key spelling used by the index for an exact (non-wildcard) lookup
fn dotted(package: &str, form: Form) -> String {
    match form {
        Form::Dotted => package.to_string(),
        Form::Binary => package.replace('/', "."),
    }
}

fn validate_package(package: &str) -> std::result::Result<(), &'static str> {
    if package.is_empty() {
        return Err("is empty");
    }
    if package.contains('/') || package.contains(char::is_whitespace) {
        return Err("must be a dotted package name");
    }
    if package.split('.').any(str::is_empty) {
        return Err("has an empty segment");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_both_forms() {
        let table = RenameTable::from_pairs([("javax.servlet", "jakarta.servlet")]).unwrap();
        assert_eq!(
            table.lookup("javax.servlet", Form::Dotted).as_deref(),
            Some("jakarta.servlet")
        );
        assert_eq!(
            table.lookup("javax/servlet", Form::Binary).as_deref(),
            Some("jakarta/servlet")
        );
        assert_eq!(table.lookup("javax.servlet.http", Form::Dotted), None);
    }

    #[test]
    fn test_wildcard_carries_subpackage_tail() {
        let table = RenameTable::from_pairs([("com.ibm.test.*", "com.ibm.prod")]).unwrap();
        assert_eq!(
            table.lookup("com.ibm.test.sub", Form::Dotted).as_deref(),
            Some("com.ibm.prod.sub")
        );
        assert_eq!(
            table.lookup("com/ibm/test", Form::Binary).as_deref(),
            Some("com/ibm/prod")
        );
        assert_eq!(table.lookup("com.ibm.testing", Form::Dotted), None);
    }

    #[test]
    fn test_exact_key_beats_wildcard() {
        let table = RenameTable::from_pairs([
            ("javax.*", "jakarta"),
            ("javax.annotation", "jakarta.annotation.legacy"),
        ])
        .unwrap();
        assert_eq!(
            table.lookup("javax.annotation", Form::Dotted).as_deref(),
            Some("jakarta.annotation.legacy")
        );
        assert_eq!(
            table.lookup("javax.ejb", Form::Dotted).as_deref(),
            Some("jakarta.ejb")
        );
    }

    #[test]
    fn test_override_orphans_displaced_target() {
        let mut table = RenameTable::from_pairs([("javax.servlet", "jakarta.servlet")]).unwrap();
        let overrides = RenameTable::from_pairs([("javax.servlet", "jakarta.web")]).unwrap();
        table.merge(&overrides).unwrap();

        assert_eq!(table.len(), 1);
        assert!(table.orphans().contains("jakarta.servlet"));
        assert!(table.is_known_final("jakarta.servlet"));
        assert!(table.is_known_final("jakarta.web"));
        assert!(!table.is_known_final("jakarta.other"));
    }

    #[test]
    fn test_shared_target_is_not_orphaned() {
        let mut table = RenameTable::from_pairs([
            ("javax.servlet", "jakarta.servlet"),
            ("old.servlet", "jakarta.servlet"),
        ])
        .unwrap();
        table.insert("javax.servlet", "jakarta.web").unwrap();
        assert!(table.orphans().is_empty());
    }

    #[test]
    fn test_invert() {
        let table = RenameTable::from_pairs([("javax.servlet.*", "jakarta.servlet")]).unwrap();
        let inverted = table.invert().unwrap();
        assert_eq!(
            inverted.lookup("jakarta.servlet.http", Form::Dotted).as_deref(),
            Some("javax.servlet.http")
        );
    }

    #[test]
    fn test_invert_drops_orphans_and_tracks_its_own() {
        let mut table = RenameTable::from_pairs([
            ("javax.servlet", "jakarta.servlet"),
            ("old.servlet", "jakarta.servlet"),
            ("javax.ejb", "jakarta.ejb"),
        ])
        .unwrap();
        table.insert("javax.ejb", "jakarta.beans").unwrap();
        assert!(table.orphans().contains("jakarta.ejb"));

        let inverted = table.invert().unwrap();
        assert!(!inverted.orphans().contains("jakarta.ejb"));
        assert!(!inverted.is_known_final("jakarta.ejb"));
        // jakarta.servlet maps back to old.servlet, the later of the two
        assert_eq!(
            inverted.lookup("jakarta.servlet", Form::Dotted).as_deref(),
            Some("old.servlet")
        );
        assert!(inverted.orphans().contains("javax.servlet"));
    }

    #[test]
    fn test_rejects_malformed_keys() {
        assert!(RenameTable::from_pairs([("", "x")]).is_err());
        assert!(RenameTable::from_pairs([("a..b", "x")]).is_err());
        assert!(RenameTable::from_pairs([("a/b", "x")]).is_err());
        assert!(RenameTable::from_pairs([("a.b", "")]).is_err());
    }
}
