// src/signature/cache.rs

//! Memoization of structural transforms
//!
//! Each original string lives in exactly one of the two collections: the
//! unchanged set (a miss) or the changed map (a hit).

use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Hit/miss memo for one transform
#[derive(Debug, Default, Clone)]
pub struct Memo {
    unchanged: HashSet<String>,
    changed: HashMap<String, String>,
}

impl Memo {
    /// `Some(None)` for a memoized miss, `Some(Some(_))` for a memoized hit
    pub fn get(&self, original: &str) -> Option<Option<&str>> {
        if self.unchanged.contains(original) {
            return Some(None);
        }
        self.changed.get(original).map(|v| Some(v.as_str()))
    }

    pub fn record(&mut self, original: &str, result: Option<&str>) {
        match result {
            Some(changed) => {
                self.unchanged.remove(original);
                self.changed.insert(original.to_string(), changed.to_string());
            }
            None => {
                self.changed.remove(original);
                self.unchanged.insert(original.to_string());
            }
        }
    }

    pub fn hits(&self) -> usize {
        self.changed.len()
    }

    pub fn misses(&self) -> usize {
        self.unchanged.len()
    }

    pub fn clear(&mut self) {
        self.unchanged.clear();
        self.changed.clear();
    }
}

/// Per-run caches owned by one signature rule
#[derive(Debug, Default, Clone)]
pub struct SignatureCache {
    pub binary_types: Memo,
    pub descriptors: Memo,
}

/// Cache sizes for reporting
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub binary_type_hits: usize,
    pub binary_type_misses: usize,
    pub descriptor_hits: usize,
    pub descriptor_misses: usize,
}

impl SignatureCache {
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            binary_type_hits: self.binary_types.hits(),
            binary_type_misses: self.binary_types.misses(),
            descriptor_hits: self.descriptors.hits(),
            descriptor_misses: self.descriptors.misses(),
        }
    }

    pub fn clear(&mut self) {
        self.binary_types.clear();
        self.descriptors.clear();
    }
}
