// src/action/mod.rs

//! Action tree
//!
//! Every resource is handled by one [`ActionKind`]. Element kinds rewrite a
//! single resource's bytes; container kinds enumerate their entries, pick a
//! child action for each from their candidate list ([`Topology`]) and roll
//! the results up into [`ContainerChanges`].
//!
//! | Kind | Accepts | Container |
//! |------|---------|-----------|
//! | Directory | a directory | yes |
//! | Jar / War / Rar / Ear / Zip | `*.jar` / `*.war` / `*.rar` / `*.ear` / `*.zip` | yes |
//! | Class | `*.class` | no |
//! | Manifest | `META-INF/MANIFEST.MF` | no |
//! | Feature | other `*.mf` | no |
//! | ServiceConfig | `META-INF/services/<name>` | no |
//! | Properties | `*.properties` | no |
//! | Text | names with a text substitution set | no |
//! | Plain | `*.java` | no |
//! | PassThrough | anything | no |

pub mod changes;
pub mod container;
pub mod element;
pub mod topology;

pub use changes::{AppliedChanges, Changes, ContainerChanges, Tally};
pub use container::{apply_archive, apply_directory};
pub use element::{ElementOutput, apply_element};
pub use topology::Topology;

use crate::error::{Error, Result};
use crate::selection::SelectionRule;
use crate::signature::SignatureRule;
use std::io::Cursor;
use strum_macros::{Display, EnumIter, IntoStaticStr};
use tracing::debug;

/// Standard location of the bundle manifest
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Directory holding service provider descriptors
pub const SERVICES_DIR: &str = "META-INF/services";

/// What the caller knows about a resource before opening it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    File,
    Directory,
}

/// Every action the tree can dispatch to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, IntoStaticStr, EnumIter)]
pub enum ActionKind {
    Directory,
    Jar,
    War,
    Rar,
    Ear,
    Zip,
    Class,
    Manifest,
    Feature,
    ServiceConfig,
    Properties,
    Text,
    Plain,
    PassThrough,
}

impl ActionKind {
    /// Name used in change tallies and reports
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn is_container(self) -> bool {
        matches!(
            self,
            Self::Directory | Self::Jar | Self::War | Self::Rar | Self::Ear | Self::Zip
        )
    }

    /// ZIP-structured containers
    pub fn is_archive(self) -> bool {
        self.is_container() && self != Self::Directory
    }

    /// File extension of an archive kind
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::Jar => Some("jar"),
            Self::War => Some("war"),
            Self::Rar => Some("rar"),
            Self::Ear => Some("ear"),
            Self::Zip => Some("zip"),
            Self::Class => Some("class"),
            Self::Properties => Some("properties"),
            Self::Plain => Some("java"),
            _ => None,
        }
    }

    /// Accept predicate
    pub fn accepts(self, name: &str, probe: Probe, rule: &SignatureRule) -> bool {
        match (self, probe) {
            (Self::PassThrough, _) => true,
            (Self::Directory, probe) => probe == Probe::Directory,
            (_, Probe::Directory) => false,
            (Self::Manifest, _) => is_manifest(name),
            (Self::Feature, _) => has_extension(name, "mf") && !is_manifest(name),
            (Self::ServiceConfig, _) => is_service_config(name),
            (Self::Text, _) => rule.text_substitutions(name).is_some(),
            (kind, _) => kind.extension().is_some_and(|ext| has_extension(name, ext)),
        }
    }
}

/// Case-insensitive extension check
pub fn has_extension(name: &str, ext: &str) -> bool {
    let file = name.rsplit('/').next().unwrap_or(name);
    file.rsplit_once('.')
        .is_some_and(|(stem, e)| !stem.is_empty() && e.eq_ignore_ascii_case(ext))
}

/// `META-INF/MANIFEST.MF`, case-insensitive, at the container root
pub fn is_manifest(name: &str) -> bool {
    name.eq_ignore_ascii_case(MANIFEST_PATH)
}

/// `.../META-INF/services/<name>`
pub fn is_service_config(name: &str) -> bool {
    name.rsplit_once('/').is_some_and(|(dir, file)| {
        !file.is_empty() && (dir == SERVICES_DIR || dir.ends_with(&format!("/{}", SERVICES_DIR)))
    })
}

/// Run-wide, read-only context shared by every task
#[derive(Debug)]
pub struct Engine {
    pub selection: SelectionRule,
    pub topology: Topology,
    pub parallel: bool,
}

/// Mutable per-task state
#[derive(Debug)]
pub struct RunState {
    pub rule: SignatureRule,
    /// Reusable read buffer for leaf resources
    pub buffer: Vec<u8>,
}

impl RunState {
    pub fn new(rule: SignatureRule) -> Self {
        Self {
            rule,
            buffer: Vec::new(),
        }
    }

    /// Independent state for a parallel task: shared tables, fresh cache and buffer
    pub fn fork(&self) -> Self {
        Self::new(self.rule.fork())
    }
}

/// Outcome of applying an action to one in-memory resource
#[derive(Debug)]
pub struct ChildOutput {
    pub changes: AppliedChanges,
    /// New bytes; `None` means copy the input unchanged
    pub bytes: Option<Vec<u8>>,
}

impl ChildOutput {
    pub fn output_name(&self) -> &str {
        &self.changes.changes().output_name
    }
}

/// Apply `kind` to the bytes of a resource found inside a container
pub fn apply_child(
    engine: &Engine,
    state: &mut RunState,
    kind: ActionKind,
    name: &str,
    data: &[u8],
) -> Result<ChildOutput> {
    if kind.is_archive() {
        let (changes, out) = apply_archive(
            engine,
            state,
            kind,
            name,
            Cursor::new(data),
            Cursor::new(Vec::with_capacity(data.len())),
        )?;
        let changed = changes.has_changes();
        debug!("Nested {} {} changed: {}", kind, name, changed);
        return Ok(ChildOutput {
            changes: AppliedChanges::Container(changes),
            bytes: changed.then(|| out.into_inner()),
        });
    }

    if kind == ActionKind::Directory {
        return Err(Error::transform(name, "directories cannot be nested in archives"));
    }

    let ElementOutput { changes, bytes } = apply_element(kind, &mut state.rule, name, data)?;
    Ok(ChildOutput {
        changes: AppliedChanges::Element(changes),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{RuleTables, Substitutions};
    use std::sync::Arc;

    fn rule() -> SignatureRule {
        let mut tables = RuleTables::default();
        let subs: Substitutions = [("a", "b")].into_iter().collect();
        tables.text.insert("*.xml", subs).unwrap();
        SignatureRule::new(Arc::new(tables))
    }

    #[test]
    fn test_accept_predicates() {
        let rule = rule();
        let f = Probe::File;
        assert!(ActionKind::Class.accepts("a/B.class", f, &rule));
        assert!(ActionKind::Class.accepts("a/B.CLASS", f, &rule));
        assert!(!ActionKind::Class.accepts("a/B.class", Probe::Directory, &rule));
        assert!(ActionKind::Manifest.accepts("meta-inf/manifest.mf", f, &rule));
        assert!(!ActionKind::Feature.accepts("META-INF/MANIFEST.MF", f, &rule));
        assert!(ActionKind::Feature.accepts("lib/features/web-1.0.mf", f, &rule));
        assert!(ActionKind::ServiceConfig.accepts("META-INF/services/a.B", f, &rule));
        assert!(ActionKind::ServiceConfig.accepts(
            "WEB-INF/classes/META-INF/services/a.B",
            f,
            &rule
        ));
        assert!(!ActionKind::ServiceConfig.accepts("META-INF/services/", f, &rule));
        assert!(ActionKind::Text.accepts("WEB-INF/web.xml", f, &rule));
        assert!(!ActionKind::Text.accepts("README.md", f, &rule));
        assert!(ActionKind::War.accepts("app.war", f, &rule));
        assert!(!ActionKind::Jar.accepts(".jar", f, &rule));
        assert!(ActionKind::Directory.accepts("out", Probe::Directory, &rule));
        assert!(ActionKind::PassThrough.accepts("anything", Probe::Directory, &rule));
    }

    #[test]
    fn test_names() {
        assert_eq!(ActionKind::ServiceConfig.name(), "ServiceConfig");
        assert_eq!(ActionKind::PassThrough.to_string(), "PassThrough");
        assert!(ActionKind::Ear.is_archive());
        assert!(!ActionKind::Directory.is_archive());
        assert!(ActionKind::Directory.is_container());
    }
}
