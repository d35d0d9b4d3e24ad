// src/config.rs

//! TOML rule files
//!
//! A rule file describes every table of a run:
//!
//! ```toml
//! invert = false
//!
//! [selection]
//! include = ["*.class", "META-INF/*"]
//! exclude = ["com/acme/legacy/*"]
//!
//! [renames]
//! "javax.servlet" = "jakarta.servlet"
//! "javax.servlet.*" = "jakarta.servlet"
//!
//! [versions]
//! "jakarta.servlet" = "[5.0,6);Export-Package=5.0.0"
//!
//! [bundles]
//! "*" = "*,5.0.0,+\" (Jakarta)\",+\" (Jakarta)\""
//!
//! [[text]]
//! selector = "web.xml"
//! replacements = [["javax.servlet", "jakarta.servlet"]]
//!
//! [strings]
//! "javax.servlet.legacy" = "jakarta.servlet.legacy"
//!
//! [per_class_strings."com/acme/Boot.class"]
//! "javax.servlet.Init" = "jakarta.servlet.Init"
//! ```
//!
//! Several files may be layered; a later file overrides earlier ones key by
//! key (see [`RuleTables::merge`]).

use crate::error::{Error, Result};
use crate::rules::{DirectStringTable, RuleTables, Substitutions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// `[selection]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectionSection {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// One `[[text]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextSection {
    /// File name or glob over the file name
    pub selector: String,
    /// Ordered `[from, to]` pairs
    #[serde(default)]
    pub replacements: Vec<(String, String)>,
}

/// Deserialized rule file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesFile {
    /// Reverse the renames of the merged tables
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub selection: SelectionSection,
    /// Initial package (optionally `.*`) -> final package
    #[serde(default)]
    pub renames: BTreeMap<String, String>,
    /// Final package -> raw version assignment
    #[serde(default)]
    pub versions: BTreeMap<String, String>,
    /// Symbolic name or `*` -> raw bundle update
    #[serde(default)]
    pub bundles: BTreeMap<String, String>,
    #[serde(default)]
    pub text: Vec<TextSection>,
    #[serde(default)]
    pub strings: BTreeMap<String, String>,
    #[serde(default)]
    pub per_class_strings: BTreeMap<String, BTreeMap<String, String>>,
}

impl RulesFile {
    /// Parse a rule file from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("invalid rule file: {}", e)))
    }

    /// Read and parse a rule file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        toml::from_str(&content)
            .map_err(|e| Error::config(format!("invalid rule file {}: {}", path.display(), e)))
    }

    /// Convert into rule tables, validating every raw entry
    pub fn to_tables(&self) -> Result<RuleTables> {
        let mut tables = RuleTables::new();
        tables.includes = self.selection.include.clone();
        tables.excludes = self.selection.exclude.clone();

        for (initial, target) in &self.renames {
            tables.renames.insert(initial, target)?;
        }
        for (package, raw) in &self.versions {
            tables.versions.assign(package, raw)?;
        }
        for (key, raw) in &self.bundles {
            tables.bundles.insert_raw(key, raw)?;
        }
        for section in &self.text {
            let subs: Substitutions = section
                .replacements
                .iter()
                .map(|(from, to)| (from.as_str(), to.as_str()))
                .collect();
            tables.text.insert(&section.selector, subs)?;
        }
        tables.direct_strings = self
            .strings
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (resource, strings) in &self.per_class_strings {
            let table: DirectStringTable =
                strings.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            tables.per_class_strings.insert(resource, table);
        }

        Ok(tables)
    }
}

/// Tables layered from one or more rule files
#[derive(Debug, Clone, Default)]
pub struct LoadedRules {
    pub tables: RuleTables,
    /// Set when any file asks for inversion
    pub invert: bool,
    pub sources: Vec<PathBuf>,
}

/// Load and layer rule files in order
pub fn load_rules<P: AsRef<Path>>(paths: &[P]) -> Result<LoadedRules> {
    if paths.is_empty() {
        return Err(Error::config("no rule files given"));
    }

    let mut loaded = LoadedRules::default();
    for path in paths {
        let path = path.as_ref();
        let file = RulesFile::load(path)?;
        let tables = file.to_tables()?;
        debug!(
            "Rule file {}: {} renames, {} text sets",
            path.display(),
            tables.renames.len(),
            file.text.len()
        );

        loaded.tables.merge(&tables)?;
        loaded.invert |= file.invert;
        loaded.sources.push(path.to_path_buf());
    }

    info!(
        "Loaded {} rule file(s): {} renames",
        loaded.sources.len(),
        loaded.tables.renames.len()
    );
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Form;
    use tempfile::TempDir;

    const SERVLET: &str = r#"
[selection]
include = ["*.class"]

[renames]
"javax.servlet" = "jakarta.servlet"
"javax.servlet.*" = "jakarta.servlet"

[versions]
"jakarta.servlet" = "[5.0,6);Export-Package=5.0.0"

[bundles]
"com.acme.web" = "com.acme.web.jakarta,2.0.0"

[[text]]
selector = "web.xml"
replacements = [["javax.servlet", "jakarta.servlet"]]

[strings]
"javax.servlet.legacy" = "jakarta.servlet.legacy"

[per_class_strings."com/acme/Boot.java"]
"javax.servlet.Init" = "jakarta.servlet.Init"
"#;

    #[test]
    fn test_parse_full_file() {
        let file = RulesFile::parse(SERVLET).unwrap();
        let tables = file.to_tables().unwrap();

        assert_eq!(tables.includes, vec!["*.class"]);
        assert_eq!(
            tables.renames.lookup("javax.servlet", Form::Dotted).as_deref(),
            Some("jakarta.servlet")
        );
        assert_eq!(
            tables.versions.version_for("Export-Package", "jakarta.servlet"),
            Some("5.0.0")
        );
        assert_eq!(
            tables.versions.version_for("Import-Package", "jakarta.servlet"),
            Some("[5.0,6)")
        );
        assert!(tables.bundles.lookup("com.acme.web").is_some());
        assert!(tables.text.lookup("WEB-INF/web.xml").is_some());
        assert_eq!(tables.direct_strings.len(), 1);
        assert!(tables.per_class_strings.get("com/acme/Boot.class").is_some());
        assert!(tables.validate().is_ok());
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let err = RulesFile::parse("[renamez]\na = \"b\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_bad_rename_is_config_error() {
        let file = RulesFile::parse("[renames]\n\"javax..servlet\" = \"jakarta.servlet\"\n").unwrap();
        assert!(matches!(file.to_tables(), Err(Error::Config(_))));
    }

    #[test]
    fn test_later_files_override() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("base.toml");
        let over = dir.path().join("over.toml");
        std::fs::write(&base, SERVLET).unwrap();
        std::fs::write(
            &over,
            "invert = true\n[renames]\n\"javax.servlet\" = \"jakarta.web\"\n",
        )
        .unwrap();

        let loaded = load_rules(&[&base, &over]).unwrap();
        assert!(loaded.invert);
        assert_eq!(loaded.sources.len(), 2);
        assert_eq!(
            loaded.tables.renames.lookup("javax.servlet", Form::Dotted).as_deref(),
            Some("jakarta.web")
        );
        // jakarta.servlet is still targeted by the wildcard entry
        assert!(loaded.tables.validate().is_ok());
    }

    #[test]
    fn test_missing_file_and_empty_list() {
        let dir = TempDir::new().unwrap();
        let err = load_rules(&[dir.path().join("absent.toml")]).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(matches!(load_rules::<PathBuf>(&[]), Err(Error::Config(_))));
    }
}
