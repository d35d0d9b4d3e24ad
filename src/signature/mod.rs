// src/signature/mod.rs

//! Signature rewrite engine
//!
//! [`SignatureRule`] applies the shared [`RuleTables`] to the names, strings
//! and type signatures found inside resources. The tables are immutable and
//! shared through an `Arc`; each rule owns a private [`SignatureCache`], so a
//! parallel task works on a [`SignatureRule::fork`] of its parent.
//!
//! | Operation | Input | Unit |
//! |-----------|-------|------|
//! | `replace_package` | `javax.servlet` | whole dotted package |
//! | `replace_binary_package` | `javax/servlet` | whole slashed package |
//! | `replace_packages` | free text | every dotted package reference |
//! | `replace_binary_packages` | free text | every slashed package reference |
//! | `transform_binary_type` | `javax/servlet/Filter`, `[Ljavax/servlet/Filter;` | class name |
//! | `transform_descriptor` | `(Ljavax/servlet/Filter;)V` | descriptor |
//! | `transform_*_signature` | generic signatures | signature tree |
//! | `relocate_class` / `relocate_resource` | archive paths | storage path |

mod cache;
mod descriptor;
mod generic;
mod packages;

pub use cache::{CacheStats, Memo, SignatureCache};
pub use descriptor::{BASE_TYPES, Descriptor, FieldType};
pub use generic::{
    ClassSignature, ClassType, JavaType, MethodSignature, ReferenceType, SimpleClassType,
    TypeArgument, TypeParameter, Variance, parse_field_signature,
};
pub use packages::{is_identifier_char, is_true_package_match, replace_packages};

use crate::rules::{BundleUpdate, CLASS_EXTENSION, Form, RuleTables, Substitutions};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Storage prefix of classes inside a web archive
pub const WEB_INF_CLASSES: &str = "WEB-INF/classes/";

/// Storage prefix of multi-release class overlays, followed by `<digits>/`
pub const META_INF_VERSIONS: &str = "META-INF/versions/";

/// A descriptor or signature that does not follow its grammar
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed {kind} '{input}' at offset {pos}: {reason}")]
pub struct SignatureError {
    pub kind: &'static str,
    pub input: String,
    pub pos: usize,
    pub reason: String,
}

impl SignatureError {
    pub fn new(kind: &'static str, input: &str, pos: usize, reason: &str) -> Self {
        Self {
            kind,
            input: input.to_string(),
            pos,
            reason: reason.to_string(),
        }
    }
}

/// Rewrite each item; `None` when every item came back unchanged
pub(crate) fn rewrite_all<T: Clone>(
    items: &[T],
    mut f: impl FnMut(&T) -> Option<T>,
) -> Option<Vec<T>> {
    let mut rebuilt: Option<Vec<T>> = None;
    for (i, item) in items.iter().enumerate() {
        if let Some(new) = f(item) {
            rebuilt
                .get_or_insert_with(|| items[..i].to_vec())
                .push(new);
        } else if let Some(out) = rebuilt.as_mut() {
            out.push(item.clone());
        }
    }
    rebuilt
}

/// Outcome of re-homing a class resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relocation {
    /// The storage path stays as it is
    Unchanged,
    /// The path tail matched the class name exactly
    Exact(String),
    /// The path did not match the class name; best-effort new path
    Approximate(String),
}

impl Relocation {
    /// The new path, if the resource moves
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Unchanged => None,
            Self::Exact(p) | Self::Approximate(p) => Some(p),
        }
    }

    pub fn is_approximate(&self) -> bool {
        matches!(self, Self::Approximate(_))
    }
}

/// Split a resource path into its storage prefix and the package-relative tail
///
/// Recognized prefixes are `WEB-INF/classes/`, `META-INF/versions/<digits>/`
/// and the bare root (empty prefix).
pub fn split_storage_prefix(path: &str) -> (&str, &str) {
    if path.starts_with(WEB_INF_CLASSES) {
        return path.split_at(WEB_INF_CLASSES.len());
    }
    if let Some(rest) = path.strip_prefix(META_INF_VERSIONS)
        && let Some(slash) = rest.find('/')
        && slash > 0
        && rest[..slash].bytes().all(|b| b.is_ascii_digit())
    {
        return path.split_at(META_INF_VERSIONS.len() + slash + 1);
    }
    ("", path)
}

/// The rewrite engine over one set of rule tables
#[derive(Debug, Clone)]
pub struct SignatureRule {
    tables: Arc<RuleTables>,
    cache: SignatureCache,
}

impl SignatureRule {
    pub fn new(tables: Arc<RuleTables>) -> Self {
        Self {
            tables,
            cache: SignatureCache::default(),
        }
    }

    /// Same tables, fresh cache
    pub fn fork(&self) -> Self {
        Self::new(Arc::clone(&self.tables))
    }

    pub fn tables(&self) -> &RuleTables {
        &self.tables
    }

    pub fn shared_tables(&self) -> Arc<RuleTables> {
        Arc::clone(&self.tables)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    // -----------------------------------------------------------------------
    // Package renames
    // -----------------------------------------------------------------------

    /// Exact lookup of a dotted package
    pub fn replace_package(&self, package: &str) -> Option<String> {
        self.tables.renames.lookup(package, Form::Dotted)
    }

    /// Exact lookup of a slashed package
    pub fn replace_binary_package(&self, package: &str) -> Option<String> {
        self.tables.renames.lookup(package, Form::Binary)
    }

    /// Replace every dotted package reference in `text`
    pub fn replace_packages(&self, text: &str) -> Option<(String, usize)> {
        packages::replace_packages(&self.tables.renames, text, Form::Dotted)
    }

    /// Replace every slashed package reference in `text`
    pub fn replace_binary_packages(&self, text: &str) -> Option<(String, usize)> {
        packages::replace_packages(&self.tables.renames, text, Form::Binary)
    }

    /// Dotted references first, then slashed ones
    pub fn replace_all_packages(&self, text: &str) -> Option<(String, usize)> {
        let dotted = self.replace_packages(text);
        let current = dotted.as_ref().map_or(text, |(t, _)| t.as_str());
        match (self.replace_binary_packages(current), dotted) {
            (Some((out, b)), Some((_, d))) => Some((out, d + b)),
            (Some(binary), None) => Some(binary),
            (None, dotted) => dotted,
        }
    }

    /// Rename the package of a binary class name, e.g. `javax/servlet/Filter`
    pub fn rename_class(&self, binary_name: &str) -> Option<String> {
        rename_class(&self.tables, binary_name)
    }

    // -----------------------------------------------------------------------
    // Metadata lookups
    // -----------------------------------------------------------------------

    /// Version range for a final package within a manifest attribute
    pub fn version_for(&self, attribute: &str, package: &str) -> Option<&str> {
        self.tables.versions.version_for(attribute, package)
    }

    pub fn has_versions(&self) -> bool {
        !self.tables.versions.is_empty()
    }

    pub fn bundle_update(&self, symbolic_name: &str) -> Option<&BundleUpdate> {
        self.tables.bundles.lookup(symbolic_name)
    }

    /// Substitution set selected for a resource, if any
    pub fn text_substitutions(&self, resource: &str) -> Option<&Substitutions> {
        self.tables.text.lookup(resource)
    }

    /// Replacement for a class constant literal: per-class table first, then global
    pub fn direct_string(&self, resource: &str, literal: &str) -> Option<&str> {
        if let Some(table) = self.tables.per_class_strings.get(resource)
            && let Some(value) = table.get(literal)
        {
            return Some(value);
        }
        self.tables.direct_strings.get(literal).map(String::as_str)
    }

    /// Rewrite a string constant of a class
    ///
    /// A direct string replacement wins outright; otherwise dotted and then
    /// slashed package references are replaced.
    pub fn transform_string(&self, resource: &str, literal: &str) -> Option<(String, usize)> {
        if let Some(value) = self.direct_string(resource, literal) {
            return (value != literal).then(|| (value.to_string(), 1));
        }
        self.replace_all_packages(literal)
    }

    // -----------------------------------------------------------------------
    // Structural transforms
    // -----------------------------------------------------------------------

    /// Rewrite a binary type name or array descriptor as found in a `Class` constant
    pub fn transform_binary_type(&mut self, name: &str) -> Result<Option<String>, SignatureError> {
        if let Some(memo) = self.cache.binary_types.get(name) {
            return Ok(memo.map(str::to_string));
        }

        let tables = &self.tables;
        let result = if name.starts_with('[') {
            Descriptor::parse(name)?
                .rewrite(&mut |n| rename_class(tables, n))
                .map(|d| d.to_string())
        } else if name.is_empty() {
            return Err(SignatureError::new("binary type", name, 0, "empty name"));
        } else {
            rename_class(tables, name)
        };

        self.cache.binary_types.record(name, result.as_deref());
        Ok(result)
    }

    /// Rewrite a field or method descriptor
    pub fn transform_descriptor(&mut self, input: &str) -> Result<Option<String>, SignatureError> {
        if let Some(memo) = self.cache.descriptors.get(input) {
            return Ok(memo.map(str::to_string));
        }

        let tables = &self.tables;
        let result = Descriptor::parse(input)?
            .rewrite(&mut |n| rename_class(tables, n))
            .map(|d| d.to_string());

        self.cache.descriptors.record(input, result.as_deref());
        Ok(result)
    }

    pub fn transform_class_signature(&self, input: &str) -> Result<Option<String>, SignatureError> {
        let tables = &self.tables;
        Ok(ClassSignature::parse(input)?
            .rewrite(&mut |n| rename_class(tables, n))
            .map(|s| s.to_string()))
    }

    pub fn transform_method_signature(&self, input: &str) -> Result<Option<String>, SignatureError> {
        let tables = &self.tables;
        Ok(MethodSignature::parse(input)?
            .rewrite(&mut |n| rename_class(tables, n))
            .map(|s| s.to_string()))
    }

    pub fn transform_field_signature(&self, input: &str) -> Result<Option<String>, SignatureError> {
        let tables = &self.tables;
        Ok(parse_field_signature(input)?
            .rewrite(&mut |n| rename_class(tables, n))
            .map(|s| s.to_string()))
    }

    // -----------------------------------------------------------------------
    // Relocation
    // -----------------------------------------------------------------------

    /// Re-home a class resource after its binary name changed from `from` to `to`
    pub fn relocate_class(&self, path: &str, from: &str, to: &str) -> Relocation {
        if from == to {
            return Relocation::Unchanged;
        }

        let (prefix, tail) = split_storage_prefix(path);
        let expected = format!("{}{}", from, CLASS_EXTENSION);
        if tail == expected {
            return Relocation::Exact(format!("{}{}{}", prefix, to, CLASS_EXTENSION));
        }

        let head = path.strip_suffix(expected.as_str()).unwrap_or(prefix);
        let approximate = format!("{}{}{}", head, to, CLASS_EXTENSION);
        warn!(
            "Approximate relocation of class {} at {}: expected {}{}, relocating to {}",
            from, path, prefix, expected, approximate
        );
        Relocation::Approximate(approximate)
    }

    /// Re-home a non-class resource by renaming the package its directory forms
    pub fn relocate_resource(&self, path: &str) -> Option<String> {
        let (prefix, tail) = split_storage_prefix(path);
        let (directory, file) = tail.rsplit_once('/')?;
        let renamed = self.replace_binary_package(directory)?;
        debug!("Relocating resource {} under {}", path, renamed);
        Some(format!("{}{}/{}", prefix, renamed, file))
    }
}

/// Rename the package part of a binary class name
fn rename_class(tables: &RuleTables, binary_name: &str) -> Option<String> {
    let (package, simple) = binary_name.rsplit_once('/')?;
    tables
        .renames
        .lookup(package, Form::Binary)
        .map(|renamed| format!("{}/{}", renamed, simple))
}
