// src/rules/text.rs

//! Text substitution and direct string tables

use crate::error::{Error, Result};
use glob::Pattern;
use std::collections::HashMap;

/// Ordered literal -> replacement pairs applied to one text resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    pairs: Vec<(String, String)>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair; an existing literal keeps its position but takes the new replacement
    pub fn push(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let from = from.into();
        let to = to.into();
        match self.pairs.iter_mut().find(|(f, _)| *f == from) {
            Some(pair) => pair.1 = to,
            None => self.pairs.push((from, to)),
        }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Apply every pair in order; returns the new text and the number of replacements
    pub fn apply(&self, text: &str) -> Option<(String, usize)> {
        let mut current = std::borrow::Cow::Borrowed(text);
        let mut count = 0;

        for (from, to) in &self.pairs {
            if from.is_empty() {
                continue;
            }
            let hits = current.matches(from.as_str()).count();
            if hits > 0 {
                count += hits;
                current = std::borrow::Cow::Owned(current.replace(from.as_str(), to));
            }
        }

        (count > 0).then(|| (current.into_owned(), count))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Substitutions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut subs = Self::new();
        for (from, to) in iter {
            subs.push(from, to);
        }
        subs
    }
}

fn is_glob(selector: &str) -> bool {
    selector.contains(['*', '?', '['])
}

/// Selector -> substitutions, literal selectors before globs
#[derive(Debug, Clone, Default)]
pub struct TextSubstitutionTable {
    literal: HashMap<String, usize>,
    globs: Vec<(Pattern, usize)>,
    sets: Vec<(String, Substitutions)>,
}

impl TextSubstitutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a selector; a repeated selector replaces its substitutions in place
    pub fn insert(&mut self, selector: &str, substitutions: Substitutions) -> Result<()> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(Error::config("text substitution selector is empty"));
        }

        if let Some(slot) = self.sets.iter().position(|(s, _)| s == selector) {
            self.sets[slot].1 = substitutions;
            return Ok(());
        }

        let slot = self.sets.len();
        if is_glob(selector) {
            let pattern = Pattern::new(selector).map_err(|e| {
                Error::config(format!("invalid text selector '{}': {}", selector, e))
            })?;
            self.globs.push((pattern, slot));
        } else {
            self.literal.insert(selector.to_string(), slot);
        }
        self.sets.push((selector.to_string(), substitutions));
        Ok(())
    }

    pub fn merge(&mut self, overrides: &TextSubstitutionTable) -> Result<()> {
        for (selector, subs) in &overrides.sets {
            self.insert(selector, subs.clone())?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Selectors in declaration order
    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.sets.iter().map(|(s, _)| s.as_str())
    }

    /// Find the substitutions for a resource
    ///
    /// Selectors are matched against the resource's file name: literal
    /// selectors first, then globs in declaration order.
    pub fn lookup(&self, resource: &str) -> Option<&Substitutions> {
        let file_name = resource.rsplit('/').next().unwrap_or(resource);

        let slot = self
            .literal
            .get(file_name)
            .or_else(|| self.literal.get(resource))
            .copied()
            .or_else(|| {
                self.globs
                    .iter()
                    .find(|(p, _)| p.matches(file_name))
                    .map(|(_, slot)| *slot)
            })?;

        Some(&self.sets[slot].1)
    }
}

/// Literal string -> replacement for class constants
pub type DirectStringTable = HashMap<String, String>;

/// Extension every per-class key is normalized to
pub const CLASS_EXTENSION: &str = ".class";

/// Resource name -> literal replacements for that class only
#[derive(Debug, Clone, Default)]
pub struct PerClassStringTable {
    by_class: HashMap<String, DirectStringTable>,
}

impl PerClassStringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource: &str, strings: DirectStringTable) {
        self.by_class
            .entry(normalize_class_resource(resource))
            .or_default()
            .extend(strings);
    }

    pub fn merge(&mut self, overrides: &PerClassStringTable) {
        for (resource, strings) in &overrides.by_class {
            self.insert(resource, strings.clone());
        }
    }

    pub fn get(&self, resource: &str) -> Option<&DirectStringTable> {
        self.by_class.get(&normalize_class_resource(resource))
    }

    pub fn is_empty(&self) -> bool {
        self.by_class.is_empty()
    }
}

/// `com/acme/Widget.java` -> `com/acme/Widget.class`
pub fn normalize_class_resource(resource: &str) -> String {
    let resource = resource.trim();
    let file_start = resource.rfind('/').map_or(0, |i| i + 1);
    match resource[file_start..].rfind('.') {
        Some(dot) => format!("{}{}", &resource[..file_start + dot], CLASS_EXTENSION),
        None => format!("{}{}", resource, CLASS_EXTENSION),
    }
}
