// src/lib.rs

//! nsrewrite
//!
//! Rule-driven namespace migration (for example `javax.servlet` to
//! `jakarta.servlet`) across compiled classes, manifests, service
//! descriptors, text resources and nested archives, without recompiling.
//!
//! # Architecture
//!
//! - Rule tables (`rules`, loaded by `config`) are validated once and shared
//!   read-only through an `Arc`
//! - `signature` rewrites binary names, descriptors and generic signatures
//!   with package-boundary-aware matching and per-run memoization
//! - `classfile` and `manifest` read and rebuild the two structured formats
//! - `action` is the action tree: containers pick a child action per entry,
//!   elements rewrite bytes, and every apply returns its change record
//! - `transformer` drives one top-level apply

pub mod action;
pub mod classfile;
pub mod cli;
pub mod config;
mod error;
pub mod manifest;
pub mod report;
pub mod rules;
pub mod selection;
pub mod signature;
pub mod transformer;

pub use action::{ActionKind, AppliedChanges, Changes, ContainerChanges, Probe, Tally};
pub use config::{LoadedRules, RulesFile, load_rules};
pub use error::{Error, Result};
pub use rules::RuleTables;
pub use selection::SelectionRule;
pub use signature::{Relocation, SignatureRule};
pub use transformer::{TransformOptions, Transformer};
