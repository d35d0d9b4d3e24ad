// src/action/changes.rs

//! Change accounting
//!
//! Every apply produces a [`Changes`] record. Containers additionally keep a
//! [`Tally`] per child action name, once for their immediate children and
//! once for everything nested below those children.

use serde::Serialize;
use std::collections::BTreeMap;

/// Per-resource change record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Changes {
    pub input_name: String,
    pub output_name: String,
    pub replacements: usize,
}

impl Changes {
    /// Unchanged record for a resource
    pub fn new(input_name: impl Into<String>) -> Self {
        let input_name = input_name.into();
        Self {
            output_name: input_name.clone(),
            input_name,
            replacements: 0,
        }
    }

    pub fn is_renamed(&self) -> bool {
        self.input_name != self.output_name
    }

    pub fn is_content_changed(&self) -> bool {
        self.replacements > 0
    }

    pub fn is_changed(&self) -> bool {
        self.is_renamed() || self.is_content_changed()
    }
}

/// Counters for one child action name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub unselected: usize,
    pub unaccepted: usize,
    pub unchanged: usize,
    pub changed: usize,
    pub renamed: usize,
    pub content_changed: usize,
    pub failed: usize,
    pub duplicated: usize,
}

impl Tally {
    pub fn merge(&mut self, other: &Tally) {
        self.unselected += other.unselected;
        self.unaccepted += other.unaccepted;
        self.unchanged += other.unchanged;
        self.changed += other.changed;
        self.renamed += other.renamed;
        self.content_changed += other.content_changed;
        self.failed += other.failed;
        self.duplicated += other.duplicated;
    }

    /// Resources seen; renamed and content-changed refine `changed`
    pub fn resources(&self) -> usize {
        self.unselected + self.unaccepted + self.unchanged + self.changed + self.failed
    }
}

fn merge_tallies(into: &mut BTreeMap<String, Tally>, from: &BTreeMap<String, Tally>) {
    for (action, tally) in from {
        into.entry(action.clone()).or_default().merge(tally);
    }
}

fn sum(tallies: &BTreeMap<String, Tally>) -> Tally {
    tallies.values().fold(Tally::default(), |mut acc, t| {
        acc.merge(t);
        acc
    })
}

/// Change record of a container and its children
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerChanges {
    pub changes: Changes,
    /// Immediate children, keyed by the action that handled them
    pub immediate: BTreeMap<String, Tally>,
    /// Everything below the immediate children
    pub nested: BTreeMap<String, Tally>,
}

impl ContainerChanges {
    pub fn new(input_name: impl Into<String>) -> Self {
        Self {
            changes: Changes::new(input_name),
            ..Self::default()
        }
    }

    fn tally(&mut self, action: &str) -> &mut Tally {
        self.immediate.entry(action.to_string()).or_default()
    }

    pub fn record_unselected(&mut self, action: &str) {
        self.tally(action).unselected += 1;
    }

    pub fn record_unaccepted(&mut self, action: &str) {
        self.tally(action).unaccepted += 1;
    }

    pub fn record_failed(&mut self, action: &str) {
        self.tally(action).failed += 1;
    }

    pub fn record_duplicated(&mut self, action: &str) {
        self.tally(action).duplicated += 1;
    }

    /// Record an applied child by its own change record
    pub fn record_applied(&mut self, action: &str, child: &Changes) {
        let tally = self.tally(action);
        if child.is_changed() {
            tally.changed += 1;
            if child.is_renamed() {
                tally.renamed += 1;
            }
            if child.is_content_changed() {
                tally.content_changed += 1;
            }
        } else {
            tally.unchanged += 1;
        }
        self.changes.replacements += child.replacements;
    }

    /// Record an applied child of either shape
    ///
    /// A nested container counts as content-changed when any of its own
    /// children changed, even if it carries no replacements itself.
    pub fn record_child(&mut self, action: &str, child: &AppliedChanges) {
        match child {
            AppliedChanges::Element(c) => self.record_applied(action, c),
            AppliedChanges::Container(c) => {
                let tally = self.tally(action);
                if c.has_changes() {
                    tally.changed += 1;
                    tally.content_changed += 1;
                    if c.changes.is_renamed() {
                        tally.renamed += 1;
                    }
                } else {
                    tally.unchanged += 1;
                }
                self.changes.replacements += c.changes.replacements;
                self.add_nested(c);
            }
        }
    }

    /// Fold a nested container's tallies into the descendant roll-up
    pub fn add_nested(&mut self, child: &ContainerChanges) {
        merge_tallies(&mut self.nested, &child.immediate);
        merge_tallies(&mut self.nested, &child.nested);
    }

    /// Additive merge of a partial result for the same container
    pub fn merge(&mut self, other: &ContainerChanges) {
        self.changes.replacements += other.changes.replacements;
        merge_tallies(&mut self.immediate, &other.immediate);
        merge_tallies(&mut self.nested, &other.nested);
    }

    /// Totals over the immediate children
    pub fn immediate_totals(&self) -> Tally {
        sum(&self.immediate)
    }

    /// Totals over the nested descendants
    pub fn nested_totals(&self) -> Tally {
        sum(&self.nested)
    }

    /// Whether any immediate child changed
    pub fn has_changes(&self) -> bool {
        self.changes.is_changed() || self.immediate.values().any(|t| t.changed > 0)
    }
}

/// Result of one apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppliedChanges {
    Element(Changes),
    Container(ContainerChanges),
}

impl AppliedChanges {
    pub fn changes(&self) -> &Changes {
        match self {
            Self::Element(c) => c,
            Self::Container(c) => &c.changes,
        }
    }

    pub fn is_changed(&self) -> bool {
        match self {
            Self::Element(c) => c.is_changed(),
            Self::Container(c) => c.has_changes(),
        }
    }

    pub fn as_container(&self) -> Option<&ContainerChanges> {
        match self {
            Self::Element(_) => None,
            Self::Container(c) => Some(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed(input: &str, output: &str, replacements: usize) -> Changes {
        Changes {
            input_name: input.to_string(),
            output_name: output.to_string(),
            replacements,
        }
    }

    #[test]
    fn test_is_changed() {
        assert!(!Changes::new("a").is_changed());
        assert!(changed("a", "b", 0).is_changed());
        assert!(changed("a", "a", 2).is_changed());
    }

    #[test]
    fn test_record_applied_refines_changed() {
        let mut c = ContainerChanges::new("app.jar");
        c.record_applied("Class", &changed("a/B.class", "c/B.class", 3));
        c.record_applied("Class", &Changes::new("a/C.class"));
        c.record_unselected("Class");

        let t = c.immediate["Class"];
        assert_eq!((t.changed, t.renamed, t.content_changed), (1, 1, 1));
        assert_eq!((t.unchanged, t.unselected), (1, 1));
        assert_eq!(t.resources(), 3);
        assert_eq!(c.changes.replacements, 3);
        assert!(c.has_changes());
    }

    #[test]
    fn test_nested_rollup_and_merge() {
        let mut jar = ContainerChanges::new("lib/a.jar");
        jar.record_applied("Class", &changed("x/Y.class", "x/Y.class", 1));

        let mut zip = ContainerChanges::new("dist.zip");
        zip.record_child("Jar", &AppliedChanges::Container(jar));
        assert_eq!(zip.nested["Class"].changed, 1);
        assert_eq!(zip.immediate["Jar"].content_changed, 1);

        let mut other = ContainerChanges::new("dist.zip");
        other.record_failed("Jar");
        zip.merge(&other);
        assert_eq!(zip.immediate["Jar"].failed, 1);
        assert_eq!(zip.immediate_totals().resources(), 2);
        assert_eq!(zip.nested_totals().changed, 1);
    }

    #[test]
    fn test_container_with_only_renames_counts_as_changed() {
        let mut jar = ContainerChanges::new("lib/a.jar");
        jar.record_applied("Properties", &changed("a/x.properties", "b/x.properties", 0));
        assert_eq!(jar.changes.replacements, 0);

        let mut zip = ContainerChanges::new("dist.zip");
        zip.record_child("Jar", &AppliedChanges::Container(jar));
        assert_eq!(zip.immediate["Jar"].content_changed, 1);
        assert_eq!(zip.nested["Properties"].renamed, 1);
        assert!(zip.has_changes());
    }
}
