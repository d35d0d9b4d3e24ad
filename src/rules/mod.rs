// src/rules/mod.rs

//! Rule tables driving a transformation
//!
//! The tables are built once (usually by [`crate::config`]) and are read-only
//! for the duration of a run. [`RuleTables::validate`] performs the
//! cross-table checks that must pass before any I/O starts.
//!
//! | Table | Key | Value |
//! |-------|-----|-------|
//! | renames | initial package | final package |
//! | versions | final package | version range (optionally per attribute) |
//! | bundles | symbolic name or `*` | identity update |
//! | text | file name or glob | ordered literal replacements |
//! | direct strings | literal | replacement |
//! | per-class strings | class resource | literal replacements |

mod bundles;
mod renames;
mod text;
mod versions;

pub use bundles::{ADDITIVE_MARKER, ANY_BUNDLE, BundleTable, BundleUpdate, TextUpdate};
pub use renames::{Form, RenameEntry, RenameTable, WILDCARD_SUFFIX};
pub use text::{
    CLASS_EXTENSION, DirectStringTable, PerClassStringTable, Substitutions,
    TextSubstitutionTable, normalize_class_resource,
};
pub use versions::{
    PackageVersions, SpecificVersionTable, VersionAssignment, VersionTable,
    parse_version_assignment, validate_versions,
};

use crate::error::Result;

/// Every table a run consults
#[derive(Debug, Clone, Default)]
pub struct RuleTables {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub renames: RenameTable,
    pub versions: PackageVersions,
    pub bundles: BundleTable,
    pub text: TextSubstitutionTable,
    pub direct_strings: DirectStringTable,
    pub per_class_strings: PerClassStringTable,
}

impl RuleTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer `overrides` on top of these tables
    ///
    /// Selection patterns accumulate; every keyed table takes the override's
    /// value for a repeated key.
    pub fn merge(&mut self, overrides: &RuleTables) -> Result<()> {
        self.includes.extend(overrides.includes.iter().cloned());
        self.excludes.extend(overrides.excludes.iter().cloned());
        self.renames.merge(&overrides.renames)?;
        self.versions.merge(&overrides.versions);
        self.bundles.merge(&overrides.bundles);
        self.text.merge(&overrides.text)?;
        self.direct_strings.extend(
            overrides
                .direct_strings
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        self.per_class_strings.merge(&overrides.per_class_strings);
        Ok(())
    }

    /// Replace the renames with their inverse
    pub fn invert(&mut self) -> Result<()> {
        self.renames = self.renames.invert()?;
        Ok(())
    }

    /// Cross-table consistency checks
    pub fn validate(&self) -> Result<()> {
        validate_versions(&self.versions, |p| self.renames.is_known_final(p))
    }

    /// Whether any table would rewrite something
    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
            && self.versions.is_empty()
            && self.bundles.is_empty()
            && self.text.is_empty()
            && self.direct_strings.is_empty()
            && self.per_class_strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn servlet_rules() -> RuleTables {
        RuleTables {
            renames: RenameTable::from_pairs([("javax.servlet", "jakarta.servlet")]).unwrap(),
            ..RuleTables::default()
        }
    }

    #[test]
    fn test_version_for_renamed_package_validates() {
        let mut rules = servlet_rules();
        rules.versions.set("jakarta.servlet", "[5.0,6)");
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn test_version_for_unknown_package_fails() {
        let mut rules = servlet_rules();
        rules.versions.set("jakarta.other", "[1.0,2)");
        let err = rules.validate().unwrap_err();
        assert!(err.to_string().contains("jakarta.other"));
    }

    #[test]
    fn test_orphaned_target_may_keep_its_version() {
        let mut rules = servlet_rules();
        rules.versions.set("jakarta.servlet", "[5.0,6)");

        let overrides = RuleTables {
            renames: RenameTable::from_pairs([("javax.servlet", "jakarta.web")]).unwrap(),
            ..RuleTables::default()
        };
        rules.merge(&overrides).unwrap();
        assert!(rules.validate().is_ok());
    }
}
