// src/signature/packages.rs

//! Package-boundary-aware substitution inside free text
//!
//! A key only matches where it forms a whole package reference:
//!
//! - the character before the match is not part of an identifier, not `.`,
//!   and not the separator of the form being scanned;
//! - the character after the match is not part of an identifier;
//! - for a non-wildcard key followed by `.` or `/`, the next character
//!   decides: lower case or a digit continues a longer package name (no
//!   match), anything else (a type name) is a match.

use crate::rules::{Form, RenameTable};

/// Java identifier part: letters, digits, `_` and `$`
pub fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Boundary check for a key found at `start..end` in `text`
pub fn is_true_package_match(
    text: &str,
    start: usize,
    end: usize,
    form: Form,
    subpackages: bool,
) -> bool {
    if let Some(before) = text[..start].chars().next_back()
        && (is_identifier_char(before) || before == '.' || before == form.separator())
    {
        return false;
    }

    let mut after = text[end..].chars();
    match after.next() {
        None => true,
        Some(c) if is_identifier_char(c) => false,
        Some('.') | Some('/') if !subpackages => match after.next() {
            Some(next) => !(next.is_lowercase() || next.is_ascii_digit()),
            None => true,
        },
        Some(_) => true,
    }
}

#[derive(Debug)]
struct Hit<'t> {
    start: usize,
    end: usize,
    value: &'t str,
}

/// Replace every true package match; returns the new text and the match count
///
/// Matches are collected against the original text and applied in a single
/// rebuild, so replaced text is never scanned again. Where matches overlap
/// the earliest wins, and at the same position the longest key wins.
pub fn replace_packages(table: &RenameTable, text: &str, form: Form) -> Option<(String, usize)> {
    let mut hits: Vec<Hit<'_>> = Vec::new();

    for entry in table.entries() {
        let key = entry.key(form);
        if key.is_empty() {
            continue;
        }
        for (start, _) in text.match_indices(key) {
            let end = start + key.len();
            if is_true_package_match(text, start, end, form, entry.subpackages) {
                hits.push(Hit {
                    start,
                    end,
                    value: entry.value(form),
                });
            }
        }
    }

    if hits.is_empty() {
        return None;
    }

    hits.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut out = String::with_capacity(text.len() + 16);
    let mut cursor = 0;
    let mut count = 0;
    for hit in hits {
        if hit.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..hit.start]);
        out.push_str(hit.value);
        cursor = hit.end;
        count += 1;
    }
    out.push_str(&text[cursor..]);

    (out != text).then_some((out, count))
}
