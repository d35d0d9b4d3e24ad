// src/manifest.rs

//! Manifest-format files
//!
//! Covers `META-INF/MANIFEST.MF` and feature manifests (`*.mf`): a main
//! section followed by named sections, separated by blank lines. Headers are
//! `Name: value`; a line starting with a single space continues the previous
//! header. Output lines are wrapped at 72 bytes and use the line terminator
//! found in the input.
//!
//! OSGi package headers are lists of clauses:
//!
//! ```text
//! Import-Package: javax.servlet;version="[4.0,5)",javax.servlet.http;resolution:=optional
//! ```
//!
//! Clauses split on `,`, their parts on `;`, both outside double quotes. The
//! split keeps every character, so joining the parts back reproduces the
//! original text.

use crate::signature::SignatureRule;
use thiserror::Error;
use tracing::debug;

/// Maximum line length in bytes, excluding the terminator
pub const LINE_LIMIT: usize = 72;

/// Headers whose clauses carry package versions
pub const PACKAGE_HEADERS: &[&str] = &[
    "Import-Package",
    "DynamicImport-Package",
    "Export-Package",
    "IBM-API-Package",
    "IBM-SPI-Package",
];

/// Additional versioned header of feature manifests
pub const SUBSYSTEM_CONTENT: &str = "Subsystem-Content";

pub const BUNDLE_SYMBOLIC_NAME: &str = "Bundle-SymbolicName";
pub const BUNDLE_VERSION: &str = "Bundle-Version";
pub const BUNDLE_NAME: &str = "Bundle-Name";
pub const BUNDLE_DESCRIPTION: &str = "Bundle-Description";

/// Header naming a section
pub const SECTION_NAME: &str = "Name";

/// Errors while reading a manifest
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("manifest is not valid UTF-8")]
    NotUtf8,

    #[error("line {line}: continuation without a header")]
    OrphanContinuation { line: usize },

    #[error("line {line}: invalid header '{text}'")]
    BadHeader { line: usize, text: String },
}

/// Line terminator style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    CrLf,
    Lf,
    Cr,
}

impl LineEnding {
    /// The terminator of the first line in `text`
    pub fn detect(text: &str) -> Self {
        match text.find(['\r', '\n']) {
            Some(i) if text[i..].starts_with("\r\n") => Self::CrLf,
            Some(i) if text[i..].starts_with('\r') => Self::Cr,
            Some(_) => Self::Lf,
            None => Self::default(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CrLf => "\r\n",
            Self::Lf => "\n",
            Self::Cr => "\r",
        }
    }
}

/// Ordered headers of one section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    headers: Vec<(String, String)>,
}

impl Section {
    /// Header names compare case-insensitively
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace an existing header in place or append a new one
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut [(String, String)] {
        &mut self.headers
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// A parsed manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub main: Section,
    pub sections: Vec<Section>,
    pub line_ending: LineEnding,
}

impl Manifest {
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, ManifestError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ManifestError::NotUtf8)?;
        Self::parse(text)
    }

    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let line_ending = LineEnding::detect(text);
        let mut sections: Vec<Section> = Vec::new();
        let mut current = Section::default();

        for (n, line) in split_lines(text).enumerate() {
            let line_no = n + 1;

            if line.is_empty() {
                if !current.is_empty() {
                    sections.push(std::mem::take(&mut current));
                }
                continue;
            }

            if let Some(continued) = line.strip_prefix(' ') {
                let (_, value) = current
                    .headers
                    .last_mut()
                    .ok_or(ManifestError::OrphanContinuation { line: line_no })?;
                value.push_str(continued);
                continue;
            }

            let (name, value) = line
                .split_once(':')
                .filter(|(name, _)| is_header_name(name))
                .ok_or_else(|| ManifestError::BadHeader {
                    line: line_no,
                    text: line.to_string(),
                })?;
            let value = value.strip_prefix(' ').unwrap_or(value);
            current.headers.push((name.to_string(), value.to_string()));
        }

        if !current.is_empty() || sections.is_empty() {
            sections.push(current);
        }
        let main = sections.remove(0);
        Ok(Self {
            main,
            sections,
            line_ending,
        })
    }

    /// Serialize with 72-byte wrapping
    pub fn to_text(&self) -> String {
        let eol = self.line_ending.as_str();
        let mut out = String::new();
        for (name, value) in &self.main.headers {
            write_header(&mut out, name, value, eol);
        }
        out.push_str(eol);
        for section in &self.sections {
            for (name, value) in &section.headers {
                write_header(&mut out, name, value, eol);
            }
            out.push_str(eol);
        }
        out
    }

    /// Every section, main first
    pub fn sections_mut(&mut self) -> impl Iterator<Item = &mut Section> {
        std::iter::once(&mut self.main).chain(self.sections.iter_mut())
    }
}

fn is_header_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        match rest.find(['\r', '\n']) {
            Some(i) => {
                let line = &rest[..i];
                let skip = if rest[i..].starts_with("\r\n") { 2 } else { 1 };
                rest = &rest[i + skip..];
                Some(line)
            }
            None => {
                let line = rest;
                rest = "";
                Some(line)
            }
        }
    })
}

fn write_header(out: &mut String, name: &str, value: &str, eol: &str) {
    let line = format!("{}: {}", name, value);
    let mut rest = line.as_str();
    let mut limit = LINE_LIMIT;
    loop {
        if rest.len() <= limit {
            out.push_str(rest);
            out.push_str(eol);
            return;
        }
        let mut cut = limit;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        out.push_str(&rest[..cut]);
        out.push_str(eol);
        out.push(' ');
        rest = &rest[cut..];
        limit = LINE_LIMIT - 1;
    }
}

/// Split on `sep` outside double quotes, keeping every character
pub fn split_outside_quotes(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (i, c) in text.char_indices() {
        if c == '"' {
            quoted = !quoted;
        } else if c == sep && !quoted {
            parts.push(&text[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Which manifest flavor a rewrite targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// `META-INF/MANIFEST.MF`: package versions and bundle identity
    Bundle,
    /// Feature manifests: package versions including `Subsystem-Content`
    Feature,
}

impl ManifestKind {
    fn versioned(self, header: &str) -> bool {
        PACKAGE_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(header))
            || (self == Self::Feature && header.eq_ignore_ascii_case(SUBSYSTEM_CONTENT))
    }
}

/// Apply the rule to a manifest; returns the number of replacements
pub fn rewrite_manifest(manifest: &mut Manifest, rule: &SignatureRule, kind: ManifestKind) -> usize {
    let mut count = 0;

    for section in manifest.sections_mut() {
        for (name, value) in section.headers_mut() {
            let replaced = if name.eq_ignore_ascii_case(SECTION_NAME) {
                rule.replace_binary_packages(value)
            } else {
                rule.replace_packages(value)
            };
            if let Some((text, n)) = replaced {
                *value = text;
                count += n;
            }
        }
    }

    if rule.has_versions() {
        for (name, value) in manifest.main.headers_mut() {
            if !kind.versioned(name) {
                continue;
            }
            if let Some((text, n)) = update_versions(name, value, rule) {
                *value = text;
                count += n;
            }
        }
    }

    if kind == ManifestKind::Bundle {
        count += update_bundle_identity(&mut manifest.main, rule);
    }

    count
}

/// Replace the `version` attribute of every clause naming a versioned package
fn update_versions(header: &str, value: &str, rule: &SignatureRule) -> Option<(String, usize)> {
    let mut count = 0;
    let clauses: Vec<String> = split_outside_quotes(value, ',')
        .into_iter()
        .map(|clause| {
            let mut parts: Vec<String> = split_outside_quotes(clause, ';')
                .into_iter()
                .map(str::to_string)
                .collect();

            let version = parts
                .iter()
                .take_while(|p| !p.contains('='))
                .find_map(|package| rule.version_for(header, package.trim()));

            if let Some(version) = version
                && let Some(part) = parts.iter_mut().find(|p| is_version_attribute(p))
            {
                let (key, _) = part.split_once('=').unwrap_or((part.as_str(), ""));
                let updated = format!("{}=\"{}\"", key, version);
                if *part != updated {
                    *part = updated;
                    count += 1;
                }
            }
            parts.join(";")
        })
        .collect();

    (count > 0).then(|| (clauses.join(","), count))
}

fn is_version_attribute(part: &str) -> bool {
    part.split_once('=')
        .is_some_and(|(key, _)| !key.ends_with(':') && key.trim() == "version")
}

/// Update the identity headers from the bundle table
fn update_bundle_identity(main: &mut Section, rule: &SignatureRule) -> usize {
    let Some(symbolic) = main.get(BUNDLE_SYMBOLIC_NAME).map(str::to_string) else {
        return 0;
    };
    let (current, directives) = match symbolic.split_once(';') {
        Some((name, rest)) => (name.trim(), Some(rest)),
        None => (symbolic.trim(), None),
    };
    let Some(update) = rule.bundle_update(current) else {
        return 0;
    };

    let mut count = 0;
    let new_name = update.symbolic_name_for(current);
    if new_name != current {
        let value = match directives {
            Some(rest) => format!("{};{}", new_name, rest),
            None => new_name.to_string(),
        };
        debug!("Bundle {} renamed to {}", current, new_name);
        main.set(BUNDLE_SYMBOLIC_NAME, value);
        count += 1;
    }

    if let Some(version) = &update.version
        && main.get(BUNDLE_VERSION) != Some(version.as_str())
    {
        main.set(BUNDLE_VERSION, version.clone());
        count += 1;
    }

    for (header, text_update) in [
        (BUNDLE_NAME, &update.name),
        (BUNDLE_DESCRIPTION, &update.description),
    ] {
        if let Some(text_update) = text_update {
            let value = text_update.apply(main.get(header));
            if main.get(header) != Some(value.as_str()) {
                main.set(header, value);
                count += 1;
            }
        }
    }

    count
}
