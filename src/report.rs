// src/report.rs

//! Change reports
//!
//! The text report prints one aligned row per child action name, once for the
//! immediate children of the top-level container and once for everything
//! nested below them. The JSON report is the serialized [`AppliedChanges`].

use crate::action::{AppliedChanges, ContainerChanges, Tally};
use std::collections::BTreeMap;
use std::fmt::Write;

const HEADER: [&str; 9] = [
    "UNSELECTED",
    "UNACCEPTED",
    "UNCHANGED",
    "CHANGED",
    "RENAMED",
    "CONTENT",
    "FAILED",
    "DUPLICATED",
    "TOTAL",
];

fn row(tally: &Tally) -> [usize; 9] {
    [
        tally.unselected,
        tally.unaccepted,
        tally.unchanged,
        tally.changed,
        tally.renamed,
        tally.content_changed,
        tally.failed,
        tally.duplicated,
        tally.resources(),
    ]
}

fn render_table(out: &mut String, title: &str, tallies: &BTreeMap<String, Tally>, total: Tally) {
    let width = tallies
        .keys()
        .map(String::len)
        .chain(["ACTION".len(), "[total]".len()])
        .max()
        .unwrap_or(0);

    let _ = writeln!(out, "{}", title);
    let _ = write!(out, "  {:<width$}", "ACTION", width = width);
    for h in HEADER {
        let _ = write!(out, " {:>10}", h);
    }
    out.push('\n');

    let rows = tallies
        .iter()
        .map(|(name, t)| (name.as_str(), *t))
        .chain(std::iter::once(("[total]", total)));
    for (name, tally) in rows {
        let _ = write!(out, "  {:<width$}", name, width = width);
        for value in row(&tally) {
            let _ = write!(out, " {:>10}", value);
        }
        out.push('\n');
    }
}

/// Aligned text summary of one apply
pub fn render_text(changes: &AppliedChanges) -> String {
    let mut out = String::new();
    let record = changes.changes();
    let _ = writeln!(out, "Input:        {}", record.input_name);
    let _ = writeln!(out, "Output:       {}", record.output_name);
    let _ = writeln!(out, "Replacements: {}", record.replacements);

    match changes {
        AppliedChanges::Element(c) => {
            let state = if c.is_changed() { "changed" } else { "unchanged" };
            let _ = writeln!(out, "Resource:     {}", state);
        }
        AppliedChanges::Container(c) => render_container(&mut out, c),
    }
    out
}

fn render_container(out: &mut String, changes: &ContainerChanges) {
    out.push('\n');
    render_table(out, "Immediate resources:", &changes.immediate, changes.immediate_totals());
    if !changes.nested.is_empty() {
        out.push('\n');
        render_table(out, "Nested resources:", &changes.nested, changes.nested_totals());
    }
}

/// Pretty-printed JSON of one apply
pub fn render_json(changes: &AppliedChanges) -> serde_json::Result<String> {
    serde_json::to_string_pretty(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Changes;

    fn sample() -> AppliedChanges {
        let mut jar = ContainerChanges::new("lib/a.jar");
        jar.record_applied(
            "Class",
            &Changes {
                input_name: "javax/servlet/A.class".into(),
                output_name: "jakarta/servlet/A.class".into(),
                replacements: 4,
            },
        );
        let mut zip = ContainerChanges::new("dist.zip");
        zip.record_child("Jar", &AppliedChanges::Container(jar));
        zip.record_applied("PassThrough", &Changes::new("README"));
        AppliedChanges::Container(zip)
    }

    #[test]
    fn test_text_report_lists_both_levels() {
        let text = render_text(&sample());
        assert!(text.contains("Input:        dist.zip"));
        assert!(text.contains("Replacements: 4"));
        assert!(text.contains("Immediate resources:"));
        assert!(text.contains("Nested resources:"));

        let class_row = text
            .lines()
            .find(|l| l.trim_start().starts_with("Class"))
            .unwrap();
        let cells: Vec<&str> = class_row.split_whitespace().collect();
        // ACTION, then UNSELECTED UNACCEPTED UNCHANGED CHANGED RENAMED ...
        assert_eq!(&cells[1..6], &["0", "0", "0", "1", "1"]);
    }

    #[test]
    fn test_element_report() {
        let text = render_text(&AppliedChanges::Element(Changes::new("Foo.java")));
        assert!(text.contains("Resource:     unchanged"));
        assert!(!text.contains("Immediate"));
    }

    #[test]
    fn test_json_report() {
        let json = render_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["kind"], "container");
        assert_eq!(value["changes"]["replacements"], 4);
        assert_eq!(value["immediate"]["Jar"]["content_changed"], 1);
        assert_eq!(value["nested"]["Class"]["renamed"], 1);
    }
}
