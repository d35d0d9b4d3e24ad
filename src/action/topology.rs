// src/action/topology.rs

//! Containment rules
//!
//! Each container kind owns an ordered candidate list; the first candidate
//! that accepts an entry handles it, and `PassThrough` closes every list.
//!
//! ```text
//! Ear        Manifest Jar War Rar Text
//! War, Rar   Class Plain ServiceConfig Manifest Feature Jar Text
//! Jar        Class Plain ServiceConfig Manifest Feature Text Properties
//! Zip        union of the above, then Jar War Rar Ear Zip
//! Directory  every element and archive kind
//! ```
//!
//! Widened nesting also lets a Jar hold Jars and every archive hold Zips.

use super::{ActionKind, Probe};
use crate::error::{Error, Result};
use crate::signature::SignatureRule;
use std::collections::HashMap;

use ActionKind::*;

const EAR: &[ActionKind] = &[Manifest, Jar, War, Rar, Text];
const WAR: &[ActionKind] = &[Class, Plain, ServiceConfig, Manifest, Feature, Jar, Text];
const JAR: &[ActionKind] = &[Class, Plain, ServiceConfig, Manifest, Feature, Text, Properties];
const ARCHIVES: &[ActionKind] = &[Jar, War, Rar, Ear, Zip];

/// Candidates for a top-level resource
const TOP_LEVEL: &[ActionKind] = &[
    Directory, Class, Plain, ServiceConfig, Manifest, Feature, Jar, War, Rar, Ear, Zip, Text,
    Properties,
];

/// Candidate lists for every container kind
#[derive(Debug, Clone)]
pub struct Topology {
    widened: bool,
    lists: HashMap<ActionKind, Vec<ActionKind>>,
}

impl Topology {
    pub fn new(widened: bool) -> Self {
        let mut lists = HashMap::new();

        let mut jar = JAR.to_vec();
        if widened {
            insert_before_text(&mut jar, Jar);
        }
        lists.insert(Jar, jar);
        lists.insert(War, WAR.to_vec());
        lists.insert(Rar, WAR.to_vec());
        lists.insert(Ear, EAR.to_vec());

        let mut zip = Vec::new();
        for kind in JAR.iter().chain(WAR).chain(EAR) {
            if !zip.contains(kind) && !ARCHIVES.contains(kind) && *kind != Text {
                zip.push(*kind);
            }
        }
        zip.extend_from_slice(ARCHIVES);
        zip.push(Text);
        lists.insert(Zip, zip.clone());
        lists.insert(Directory, zip);

        for (kind, list) in lists.iter_mut() {
            if widened && *kind != Directory && !list.contains(&Zip) {
                insert_before_text(list, Zip);
            }
            list.push(PassThrough);
        }

        Self { widened, lists }
    }

    pub fn is_widened(&self) -> bool {
        self.widened
    }

    /// Ordered candidates for a container; empty for element kinds
    pub fn candidates(&self, container: ActionKind) -> &[ActionKind] {
        self.lists.get(&container).map(Vec::as_slice).unwrap_or_default()
    }

    /// First candidate of `container` accepting the entry
    pub fn accept(
        &self,
        container: ActionKind,
        name: &str,
        probe: Probe,
        rule: &SignatureRule,
    ) -> ActionKind {
        self.candidates(container)
            .iter()
            .copied()
            .find(|kind| kind.accepts(name, probe, rule))
            .unwrap_or(PassThrough)
    }

    /// First top-level kind accepting a resource; none is an error
    pub fn accept_top_level(&self, name: &str, probe: Probe, rule: &SignatureRule) -> Result<ActionKind> {
        TOP_LEVEL
            .iter()
            .copied()
            .find(|kind| kind.accepts(name, probe, rule))
            .ok_or_else(|| Error::NoAction(name.to_string()))
    }
}

fn insert_before_text(list: &mut Vec<ActionKind>, kind: ActionKind) {
    let at = list.iter().position(|k| *k == Text).unwrap_or(list.len());
    list.insert(at, kind);
}
