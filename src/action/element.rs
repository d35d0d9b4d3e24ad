// src/action/element.rs

//! Element actions: rewrite one resource's bytes

use super::{ActionKind, Changes};
use crate::classfile::rewrite_class;
use crate::error::{Error, Result};
use crate::manifest::{Manifest, ManifestKind, rewrite_manifest};
use crate::signature::SignatureRule;
use tracing::{debug, trace};

/// Result of an element action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementOutput {
    pub changes: Changes,
    /// New content; `None` when the content is unchanged
    pub bytes: Option<Vec<u8>>,
}

impl ElementOutput {
    fn unchanged(name: &str) -> Self {
        Self {
            changes: Changes::new(name),
            bytes: None,
        }
    }

    fn renamed(name: &str, output_name: Option<String>) -> Self {
        let mut out = Self::unchanged(name);
        if let Some(output_name) = output_name {
            out.changes.output_name = output_name;
        }
        out
    }
}

/// Apply an element action to `data`
pub fn apply_element(
    kind: ActionKind,
    rule: &mut SignatureRule,
    name: &str,
    data: &[u8],
) -> Result<ElementOutput> {
    let out = match kind {
        ActionKind::Class => class(rule, name, data)?,
        ActionKind::Manifest => manifest(rule, name, data, ManifestKind::Bundle)?,
        ActionKind::Feature => manifest(rule, name, data, ManifestKind::Feature)?,
        ActionKind::ServiceConfig => service_config(rule, name, data)?,
        ActionKind::Properties => ElementOutput::renamed(name, rule.relocate_resource(name)),
        ActionKind::Text => text(rule, name, data)?,
        ActionKind::Plain => plain(rule, name, data)?,
        ActionKind::PassThrough => ElementOutput::unchanged(name),
        container => {
            return Err(Error::transform(
                name,
                format!("{} is not an element action", container),
            ));
        }
    };

    if out.changes.is_changed() {
        debug!(
            "{} {} -> {} ({} replacements)",
            kind, name, out.changes.output_name, out.changes.replacements
        );
    }
    Ok(out)
}

fn utf8<'a>(name: &str, data: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(data).map_err(|e| Error::transform(name, format!("not UTF-8: {}", e)))
}

fn class(rule: &mut SignatureRule, name: &str, data: &[u8]) -> Result<ElementOutput> {
    let rewrite = rewrite_class(rule, name, data).map_err(|e| Error::transform(name, e))?;

    let output_name = rewrite
        .renamed_to
        .as_deref()
        .and_then(|to| rule.relocate_class(name, &rewrite.class_name, to).path().map(str::to_string));

    let mut out = ElementOutput::renamed(name, output_name);
    out.changes.replacements = rewrite.replacements;
    out.bytes = rewrite.bytes;
    Ok(out)
}

fn manifest(
    rule: &mut SignatureRule,
    name: &str,
    data: &[u8],
    kind: ManifestKind,
) -> Result<ElementOutput> {
    let mut manifest = Manifest::parse_bytes(data).map_err(|e| Error::transform(name, e))?;
    let replacements = rewrite_manifest(&mut manifest, rule, kind);

    let mut out = ElementOutput::unchanged(name);
    if replacements > 0 {
        out.changes.replacements = replacements;
        out.bytes = Some(manifest.to_text().into_bytes());
    }
    Ok(out)
}

/// Rename the provider type named by a service descriptor line
///
/// Comments (`#` to end of line) and surrounding whitespace are kept.
fn service_line(rule: &SignatureRule, line: &str) -> Option<String> {
    let (content, comment) = match line.find('#') {
        Some(i) => line.split_at(i),
        None => (line, ""),
    };
    let provider = content.trim();
    let renamed = rename_type(rule, provider)?;
    let start = content.find(provider)?;
    Some(format!(
        "{}{}{}{}",
        &content[..start],
        renamed,
        &content[start + provider.len()..],
        comment
    ))
}

/// Rename the package of a dotted type name
fn rename_type(rule: &SignatureRule, type_name: &str) -> Option<String> {
    let (package, simple) = type_name.rsplit_once('.')?;
    rule.replace_package(package)
        .map(|renamed| format!("{}.{}", renamed, simple))
}

fn service_config(rule: &mut SignatureRule, name: &str, data: &[u8]) -> Result<ElementOutput> {
    let (dir, file) = name.rsplit_once('/').unwrap_or(("", name));
    let output_name = rename_type(rule, file).map(|renamed| {
        if dir.is_empty() {
            renamed
        } else {
            format!("{}/{}", dir, renamed)
        }
    });

    let text = utf8(name, data)?;
    let mut replacements = 0;
    let mut rewritten = String::with_capacity(text.len() + 16);
    for line in text.split_inclusive('\n') {
        let (body, ending) = match line.strip_suffix("\r\n") {
            Some(body) => (body, "\r\n"),
            None => match line.strip_suffix('\n') {
                Some(body) => (body, "\n"),
                None => (line, ""),
            },
        };
        match service_line(rule, body) {
            Some(new) => {
                trace!("{}: provider {} -> {}", name, body.trim(), new.trim());
                rewritten.push_str(&new);
                replacements += 1;
            }
            None => rewritten.push_str(body),
        }
        rewritten.push_str(ending);
    }

    let mut out = ElementOutput::renamed(name, output_name);
    if replacements > 0 {
        out.changes.replacements = replacements;
        out.bytes = Some(rewritten.into_bytes());
    }
    Ok(out)
}

fn text(rule: &mut SignatureRule, name: &str, data: &[u8]) -> Result<ElementOutput> {
    let substitutions = rule.text_substitutions(name).ok_or_else(|| {
        Error::Consistency(format!("{} was selected for text substitution but no set matches it", name))
    })?;
    let text = utf8(name, data)?;

    let mut out = ElementOutput::unchanged(name);
    if let Some((new, count)) = substitutions.apply(text) {
        out.changes.replacements = count;
        out.bytes = Some(new.into_bytes());
    }
    Ok(out)
}

fn plain(rule: &mut SignatureRule, name: &str, data: &[u8]) -> Result<ElementOutput> {
    let text = utf8(name, data)?;
    let mut out = ElementOutput::renamed(name, rule.relocate_resource(name));
    if let Some((new, count)) = rule.replace_packages(text) {
        out.changes.replacements = count;
        out.bytes = Some(new.into_bytes());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{RenameTable, RuleTables, Substitutions};
    use std::sync::Arc;

    fn servlet() -> SignatureRule {
        let mut tables = RuleTables {
            renames: RenameTable::from_pairs([("javax.servlet", "jakarta.servlet")]).unwrap(),
            ..RuleTables::default()
        };
        let subs: Substitutions = [("javax.servlet", "jakarta.servlet")].into_iter().collect();
        tables.text.insert("web.xml", subs).unwrap();
        SignatureRule::new(Arc::new(tables))
    }

    #[test]
    fn test_service_config_renames_file_and_providers() {
        let mut rule = servlet();
        let data = b"# providers\njavax.servlet.impl.Init  # legacy\r\ncom.acme.Other\n";
        let out = apply_element(
            ActionKind::ServiceConfig,
            &mut rule,
            "META-INF/services/javax.servlet.ServletContainerInitializer",
            data,
        )
        .unwrap();

        assert_eq!(
            out.changes.output_name,
            "META-INF/services/jakarta.servlet.ServletContainerInitializer"
        );
        // javax.servlet.impl is a different package
        assert_eq!(out.changes.replacements, 0);
        assert!(out.bytes.is_none());

        let data = b"# providers\njavax.servlet.Init  # legacy\r\ncom.acme.Other\n";
        let out = apply_element(
            ActionKind::ServiceConfig,
            &mut rule,
            "META-INF/services/javax.servlet.ServletContainerInitializer",
            data,
        )
        .unwrap();
        assert_eq!(out.changes.replacements, 1);
        assert_eq!(
            out.bytes.unwrap(),
            b"# providers\njakarta.servlet.Init  # legacy\r\ncom.acme.Other\n"
        );
    }

    #[test]
    fn test_text_and_consistency_error() {
        let mut rule = servlet();
        let out = apply_element(
            ActionKind::Text,
            &mut rule,
            "WEB-INF/web.xml",
            b"<servlet-class>javax.servlet.X</servlet-class>",
        )
        .unwrap();
        assert_eq!(out.changes.replacements, 1);

        let err = apply_element(ActionKind::Text, &mut rule, "other.txt", b"x").unwrap_err();
        assert!(matches!(err, Error::Consistency(_)));
    }

    #[test]
    fn test_plain_relocates_and_rewrites() {
        let mut rule = servlet();
        let out = apply_element(
            ActionKind::Plain,
            &mut rule,
            "javax/servlet/Foo.java",
            b"package javax.servlet;\nimport javax.servlet.http.Part;\n",
        )
        .unwrap();
        assert_eq!(out.changes.output_name, "jakarta/servlet/Foo.java");
        assert_eq!(out.changes.replacements, 1);
        assert_eq!(
            out.bytes.unwrap(),
            b"package jakarta.servlet;\nimport javax.servlet.http.Part;\n"
        );
    }

    #[test]
    fn test_properties_only_move() {
        let mut rule = servlet();
        let out = apply_element(
            ActionKind::Properties,
            &mut rule,
            "javax/servlet/LocalStrings.properties",
            b"key=javax.servlet.Foo",
        )
        .unwrap();
        assert_eq!(out.changes.output_name, "jakarta/servlet/LocalStrings.properties");
        assert_eq!(out.changes.replacements, 0);
        assert!(out.bytes.is_none());
    }

    #[test]
    fn test_pass_through_and_bad_input() {
        let mut rule = servlet();
        let out = apply_element(ActionKind::PassThrough, &mut rule, "x.bin", &[0xFF]).unwrap();
        assert!(!out.changes.is_changed());

        let err = apply_element(ActionKind::Class, &mut rule, "a/B.class", b"nope").unwrap_err();
        assert!(err.is_entry_recoverable());
        let err = apply_element(ActionKind::Jar, &mut rule, "a.jar", b"").unwrap_err();
        assert!(matches!(err, Error::Transform { .. }));
    }
}
