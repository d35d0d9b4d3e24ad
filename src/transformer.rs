// src/transformer.rs

//! Orchestrator
//!
//! [`Transformer`] owns the run: it installs validated rule tables, resolves
//! the top-level action for an input, drives one apply over the action tree
//! and keeps the resulting change record.

use crate::action::{
    ActionKind, AppliedChanges, Changes, ContainerChanges, Engine, Probe, RunState, Topology, apply_archive,
    apply_directory, apply_element,
};
use crate::error::{Error, Result};
use crate::rules::RuleTables;
use crate::selection::SelectionRule;
use crate::signature::SignatureRule;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Run-wide switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformOptions {
    /// Jar-in-jar and zip-in-any nesting
    pub widen: bool,
    /// Process directory entries with rayon
    pub parallel: bool,
    /// Write over an existing output
    pub overwrite: bool,
    /// Reverse the renames when rules are installed
    pub invert: bool,
}

pub struct Transformer {
    options: TransformOptions,
    engine: Engine,
    state: RunState,
    last_changes: Option<AppliedChanges>,
}

impl Transformer {
    /// Create a transformer with empty rule tables
    pub fn new(options: TransformOptions) -> Self {
        Self {
            options,
            engine: Engine {
                selection: SelectionRule::all(),
                topology: Topology::new(options.widen),
                parallel: options.parallel,
            },
            state: RunState::new(SignatureRule::new(Arc::new(RuleTables::default()))),
            last_changes: None,
        }
    }

    pub fn options(&self) -> TransformOptions {
        self.options
    }

    /// Install rule tables
    ///
    /// Inverts the renames when asked to, then runs the cross-table checks.
    /// Nothing is installed if validation fails.
    pub fn set_rules(&mut self, mut tables: RuleTables) -> Result<()> {
        if self.options.invert {
            tables.invert()?;
        }
        tables.validate()?;

        info!(
            "Installed rules: {} renames, {} includes, {} excludes",
            tables.renames.len(),
            tables.includes.len(),
            tables.excludes.len()
        );

        self.engine.selection = SelectionRule::new(&tables.includes, &tables.excludes);
        self.state = RunState::new(SignatureRule::new(Arc::new(tables)));
        Ok(())
    }

    /// The installed rule tables
    pub fn rules(&self) -> &RuleTables {
        self.state.rule.tables()
    }

    /// Top-level action for a resource
    pub fn accept_action(&self, name: &str, probe: Probe) -> Result<ActionKind> {
        self.engine
            .topology
            .accept_top_level(name, probe, &self.state.rule)
    }

    /// Change record of the most recent successful apply
    pub fn last_changes(&self) -> Option<&AppliedChanges> {
        self.last_changes.as_ref()
    }

    /// Transform `input` (file, archive or directory) into `output`
    ///
    /// `input_name` is the name the action tree and the report see; it picks
    /// the top-level action by extension.
    pub fn apply(&mut self, input_name: &str, input: &Path, output: &Path) -> Result<AppliedChanges> {
        if input == output {
            return Err(Error::config(format!(
                "input and output are the same path: {}",
                input.display()
            )));
        }
        if output.exists() && !self.options.overwrite {
            return Err(Error::io(
                output,
                std::io::Error::new(ErrorKind::AlreadyExists, "output exists (use overwrite)"),
            ));
        }

        let probe = if input.is_dir() {
            Probe::Directory
        } else {
            Probe::File
        };
        let kind = self.accept_action(input_name, probe)?;
        info!("Transforming {} as {}", input_name, kind);

        let changes = if kind == ActionKind::Directory {
            fs::create_dir_all(output).map_err(|e| Error::io(output, e))?;
            let changes =
                apply_directory(&self.engine, &mut self.state, input_name, input, output)?;
            AppliedChanges::Container(changes)
        } else if !self.engine.selection.select(input_name) {
            debug!("{} is not selected; copying", input_name);
            fs::copy(input, output).map_err(|e| Error::io(output, e))?;
            AppliedChanges::Element(Changes::new(input_name))
        } else if kind.is_archive() {
            AppliedChanges::Container(self.apply_top_archive(kind, input_name, input, output)?)
        } else {
            AppliedChanges::Element(self.apply_top_element(kind, input_name, input, output)?)
        };

        let stats = self.state.rule.cache_stats();
        debug!(
            "Cache: {}/{} binary type hits, {}/{} descriptor hits",
            stats.binary_type_hits,
            stats.binary_type_hits + stats.binary_type_misses,
            stats.descriptor_hits,
            stats.descriptor_hits + stats.descriptor_misses
        );

        self.last_changes = Some(changes.clone());
        Ok(changes)
    }

    fn apply_top_archive(
        &mut self,
        kind: ActionKind,
        input_name: &str,
        input: &Path,
        output: &Path,
    ) -> Result<ContainerChanges> {
        let reader = File::open(input)
            .map(BufReader::new)
            .map_err(|e| Error::io(input, e))?;
        let writer = File::create(output)
            .map(BufWriter::new)
            .map_err(|e| Error::io(output, e))?;

        let (changes, writer) =
            apply_archive(&self.engine, &mut self.state, kind, input_name, reader, writer)?;
        writer
            .into_inner()
            .map_err(|e| Error::io(output, e.into_error()))?;
        Ok(changes)
    }

    fn apply_top_element(
        &mut self,
        kind: ActionKind,
        input_name: &str,
        input: &Path,
        output: &Path,
    ) -> Result<Changes> {
        let data = fs::read(input).map_err(|e| Error::io(input, e))?;
        let out = apply_element(kind, &mut self.state.rule, input_name, &data)?;
        fs::write(output, out.bytes.as_deref().unwrap_or(data.as_slice()))
            .map_err(|e| Error::io(output, e))?;
        Ok(out.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RenameTable;
    use tempfile::TempDir;

    fn servlet() -> RuleTables {
        RuleTables {
            renames: RenameTable::from_pairs([("javax.servlet", "jakarta.servlet")]).unwrap(),
            ..RuleTables::default()
        }
    }

    #[test]
    fn test_set_rules_validates_versions() {
        let mut t = Transformer::new(TransformOptions::default());
        let mut tables = servlet();
        tables.versions.set("jakarta.other", "[1.0,2)");
        let err = t.set_rules(tables).unwrap_err();
        assert!(err.to_string().contains("jakarta.other"));
        assert!(t.rules().renames.is_empty());
    }

    #[test]
    fn test_set_rules_inverts() {
        let mut t = Transformer::new(TransformOptions {
            invert: true,
            ..TransformOptions::default()
        });
        t.set_rules(servlet()).unwrap();
        assert_eq!(
            t.rules()
                .renames
                .lookup("jakarta.servlet", crate::rules::Form::Dotted)
                .as_deref(),
            Some("javax.servlet")
        );
    }

    #[test]
    fn test_accept_action() {
        let t = Transformer::new(TransformOptions::default());
        assert_eq!(t.accept_action("app.war", Probe::File).unwrap(), ActionKind::War);
        assert!(matches!(
            t.accept_action("notes.bin", Probe::File),
            Err(Error::NoAction(_))
        ));
    }

    #[test]
    fn test_apply_single_element() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("Foo.java");
        let output = dir.path().join("out.java");
        fs::write(&input, "import javax.servlet.Filter;\n").unwrap();

        let mut t = Transformer::new(TransformOptions::default());
        t.set_rules(servlet()).unwrap();
        let changes = t.apply("Foo.java", &input, &output).unwrap();

        assert_eq!(changes.changes().replacements, 1);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "import jakarta.servlet.Filter;\n"
        );
        assert_eq!(t.last_changes(), Some(&changes));
    }

    #[test]
    fn test_existing_output_needs_overwrite() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("Foo.java");
        let output = dir.path().join("out.java");
        fs::write(&input, "x").unwrap();
        fs::write(&output, "y").unwrap();

        let mut t = Transformer::new(TransformOptions::default());
        assert!(matches!(t.apply("Foo.java", &input, &output), Err(Error::Io { .. })));
        assert!(t.last_changes().is_none());

        let mut t = Transformer::new(TransformOptions {
            overwrite: true,
            ..TransformOptions::default()
        });
        assert!(t.apply("Foo.java", &input, &output).is_ok());
    }
}
