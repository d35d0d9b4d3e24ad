// src/selection.rs

//! Include/exclude selection of resource paths
//!
//! Selection decides whether a resource participates in the transformation at
//! all. It is independent of whether any rule would actually change it: an
//! unselected resource is copied through and tallied as "unselected".
//!
//! # Pattern Format
//!
//! | Pattern | Bucket | Matches |
//! |---------|--------|---------|
//! | `a/B.class` | exact | exactly `a/B.class` |
//! | `*.class` | suffix | any path ending in `.class` |
//! | `META-INF/*` | prefix | any path starting with `META-INF/` |
//! | `*servlet*` | substring | any path containing `servlet` |
//! | `*` | suffix (empty) | everything |

use std::collections::HashSet;

/// Patterns partitioned by how they match
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    exact: HashSet<String>,
    prefixes: Vec<String>,
    suffixes: Vec<String>,
    substrings: Vec<String>,
}

impl PatternSet {
    /// Partition patterns into their match buckets
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for pattern in patterns {
            set.add(pattern.as_ref());
        }
        set
    }

    /// Classify and add a single pattern
    pub fn add(&mut self, pattern: &str) {
        let leading = pattern.starts_with('*');
        let trailing = pattern.len() > 1 && pattern.ends_with('*');

        match (leading, trailing) {
            (true, true) => self
                .substrings
                .push(pattern[1..pattern.len() - 1].to_string()),
            (true, false) => self.suffixes.push(pattern[1..].to_string()),
            (false, true) => self
                .prefixes
                .push(pattern[..pattern.len() - 1].to_string()),
            (false, false) => {
                self.exact.insert(pattern.to_string());
            }
        }
    }

    /// Number of patterns across all buckets
    pub fn len(&self) -> usize {
        self.exact.len() + self.prefixes.len() + self.suffixes.len() + self.substrings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check a path against every bucket
    pub fn matches(&self, path: &str) -> bool {
        self.exact.contains(path)
            || self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
            || self.suffixes.iter().any(|s| path.ends_with(s.as_str()))
            || self.substrings.iter().any(|s| path.contains(s.as_str()))
    }
}

/// Include/exclude rule applied to every resource path
#[derive(Debug, Clone, Default)]
pub struct SelectionRule {
    includes: PatternSet,
    excludes: PatternSet,
}

impl SelectionRule {
    /// Build a rule from raw include and exclude patterns
    pub fn new<I, E, S, T>(includes: I, excludes: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            includes: PatternSet::new(includes),
            excludes: PatternSet::new(excludes),
        }
    }

    /// A rule that selects everything
    pub fn all() -> Self {
        Self::default()
    }

    /// An empty include set includes everything
    pub fn included(&self, path: &str) -> bool {
        self.includes.is_empty() || self.includes.matches(path)
    }

    pub fn excluded(&self, path: &str) -> bool {
        !self.excludes.is_empty() && self.excludes.matches(path)
    }

    /// `included(path) && !excluded(path)`
    pub fn select(&self, path: &str) -> bool {
        self.included(path) && !self.excluded(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rule_selects_everything() {
        let rule = SelectionRule::all();
        assert!(rule.select("a/B.class"));
        assert!(rule.select(""));
    }

    #[test]
    fn test_exact_include_and_exclude() {
        let rule = SelectionRule::new(["a/B.class"], Vec::<&str>::new());
        assert!(rule.select("a/B.class"));
        assert!(!rule.select("a/C.class"));

        let rule = SelectionRule::new(["a/B.class"], ["a/B.class"]);
        assert!(!rule.select("a/B.class"));
    }

    #[test]
    fn test_pattern_buckets() {
        let set = PatternSet::new(["*.class", "META-INF/*", "*servlet*", "exact.txt"]);
        assert!(set.matches("x/Y.class"));
        assert!(set.matches("META-INF/MANIFEST.MF"));
        assert!(set.matches("javax/servlet/Foo.txt"));
        assert!(set.matches("exact.txt"));
        assert!(!set.matches("other/exact.txt"));
        assert!(!set.matches("x/Y.java"));
    }

    #[test]
    fn test_lone_star_matches_everything() {
        let set = PatternSet::new(["*"]);
        assert!(set.matches("anything/at/all"));
        assert!(set.matches(""));
    }

    #[test]
    fn test_exclude_suffix_overrides_include_prefix() {
        let rule = SelectionRule::new(["com/*"], ["*Test.class"]);
        assert!(rule.select("com/acme/Widget.class"));
        assert!(!rule.select("com/acme/WidgetTest.class"));
        assert!(!rule.select("org/acme/Widget.class"));
    }
}
