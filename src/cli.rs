// src/cli.rs
//! CLI definitions for nsrewrite
//!
//! Kept in step with the flat mirror in `build.rs`, which renders the man page.

use crate::transformer::TransformOptions;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nsrewrite")]
#[command(author = "nsrewrite Contributors")]
#[command(version)]
#[command(about = "Rewrite package namespaces across class files, manifests and archives", long_about = None)]
pub struct Cli {
    /// Input file, archive or directory
    pub input: PathBuf,

    /// Output file, archive or directory
    pub output: PathBuf,

    /// TOML rule file (repeatable, later files override earlier ones)
    #[arg(short, long = "rules", value_name = "FILE", required = true)]
    pub rules: Vec<PathBuf>,

    /// Reverse the package renames
    #[arg(long)]
    pub invert: bool,

    /// Allow jar-in-jar and zip-in-any nesting
    #[arg(long)]
    pub widen: bool,

    /// Process directory entries in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Replace an existing output
    #[arg(long)]
    pub overwrite: bool,

    /// Write the change report as JSON
    #[arg(long, value_name = "FILE")]
    pub report_json: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Switches for the transformer; `invert_from_rules` comes from the rule files
    pub fn options(&self, invert_from_rules: bool) -> TransformOptions {
        TransformOptions {
            widen: self.widen,
            parallel: self.parallel,
            overwrite: self.overwrite,
            invert: self.invert || invert_from_rules,
        }
    }

    /// Name the action tree sees for the input: its file name
    pub fn input_name(&self) -> String {
        self.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.to_string_lossy().into_owned())
    }
}
