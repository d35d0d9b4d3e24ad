// src/action/container.rs

//! Container actions
//!
//! Archives (jar, war, rar, ear, zip) are read with [`ZipArchive`] and
//! rewritten entry by entry into a [`ZipWriter`]. Directories are walked with
//! `walkdir` and mirrored into the output directory, optionally with one
//! rayon task per file.
//!
//! Per entry: resolve the child action, check selection, apply, write. A
//! failing entry is tallied as failed and copied through unchanged. An entry
//! that cannot be decompressed (unsupported method, bad CRC) is copied with
//! its stored bytes. Failing to open or write the container itself ends the
//! container.

use super::{ActionKind, ChildOutput, ContainerChanges, Engine, Probe, RunState, apply_child};
use crate::error::{Error, Result};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Apply an archive container, writing the rewritten archive to `writer`
pub fn apply_archive<R, W>(
    engine: &Engine,
    state: &mut RunState,
    kind: ActionKind,
    input_name: &str,
    reader: R,
    writer: W,
) -> Result<(ContainerChanges, W)>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut archive = ZipArchive::new(reader)?;
    let mut zip = ZipWriter::new(writer);
    let mut changes = ContainerChanges::new(input_name);
    let mut written: HashSet<String> = HashSet::new();

    debug!("Opened {} {} ({} entries)", kind, input_name, archive.len());

    for index in 0..archive.len() {
        let (opened, open_err) = match archive.by_index(index) {
            Ok(entry) => (Some(entry), None),
            Err(e) => (None, Some(e)),
        };
        let mut entry = match open_err {
            None => opened.expect("entry opened without error"),
            Some(e) => {
                drop(opened);
                let (name, copied) = copy_raw(&mut archive, &mut zip, index, &mut written)?;
                warn!("Cannot open {} in {}: {}", name, input_name, e);
                let action = engine.topology.accept(kind, &name, Probe::File, &state.rule);
                record_unreadable(&mut changes, action, copied);
                continue;
            }
        };
        let name = entry.name().to_string();

        if entry.is_dir() {
            if written.insert(name.clone()) {
                zip.add_directory(name, SimpleFileOptions::default())?;
            }
            continue;
        }

        let options = SimpleFileOptions::default()
            .compression_method(match entry.compression() {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            })
            .unix_permissions(entry.unix_mode().unwrap_or(0o644));

        let action = engine
            .topology
            .accept(kind, &name, Probe::File, &state.rule);

        let mut data = std::mem::take(&mut state.buffer);
        data.clear();
        if let Err(e) = entry.read_to_end(&mut data) {
            drop(entry);
            warn!("Cannot read {} in {}: {}", name, input_name, e);
            let (_, copied) = copy_raw(&mut archive, &mut zip, index, &mut written)?;
            record_unreadable(&mut changes, action, copied);
            state.buffer = data;
            continue;
        }
        drop(entry);

        let outcome = process_entry(engine, state, &mut changes, action, &name, &data)?;
        let (output_name, bytes) = match &outcome {
            Some(child) => (child.output_name(), child.bytes.as_deref().unwrap_or(data.as_slice())),
            None => (name.as_str(), data.as_slice()),
        };

        if written.insert(output_name.to_string()) {
            zip.start_file(output_name, options)?;
            zip.write_all(bytes)?;
        } else {
            warn!("Duplicate entry {} in {}; keeping the first", output_name, input_name);
            changes.record_duplicated(action.name());
        }

        state.buffer = data;
    }

    let writer = zip.finish()?;
    Ok((changes, writer))
}

/// Copy an entry that cannot be decoded with its stored bytes untouched
///
/// Returns the entry name and whether it was written (false for a duplicate).
fn copy_raw<R, W>(
    archive: &mut ZipArchive<R>,
    zip: &mut ZipWriter<W>,
    index: usize,
    written: &mut HashSet<String>,
) -> Result<(String, bool)>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let raw = archive.by_index_raw(index)?;
    let name = raw.name().to_string();
    if !written.insert(name.clone()) {
        return Ok((name, false));
    }
    zip.raw_copy_file(raw)?;
    Ok((name, true))
}

fn record_unreadable(changes: &mut ContainerChanges, action: ActionKind, copied: bool) {
    changes.record_failed(action.name());
    if !copied {
        changes.record_duplicated(action.name());
    }
}

/// Select, apply and tally one entry
///
/// `Ok(None)` means the entry is copied through under its own name.
fn process_entry(
    engine: &Engine,
    state: &mut RunState,
    changes: &mut ContainerChanges,
    action: ActionKind,
    name: &str,
    data: &[u8],
) -> Result<Option<ChildOutput>> {
    if !engine.selection.select(name) {
        changes.record_unselected(action.name());
        return Ok(None);
    }

    match apply_child(engine, state, action, name, data) {
        Ok(child) => {
            changes.record_child(action.name(), &child.changes);
            Ok(Some(child))
        }
        Err(e) if e.is_entry_recoverable() => {
            warn!("{}", e);
            changes.record_failed(action.name());
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Apply the directory container, mirroring `input` into `output`
pub fn apply_directory(
    engine: &Engine,
    state: &mut RunState,
    input_name: &str,
    input: &Path,
    output: &Path,
) -> Result<ContainerChanges> {
    let mut changes = ContainerChanges::new(input_name);
    let mut files: Vec<(String, PathBuf)> = Vec::new();

    let nested = nested_output(input, output);
    if let Some(path) = &nested {
        debug!("Output {} is inside the input; not walking it", path.display());
    }

    let walker = WalkDir::new(input)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| nested.as_deref() != Some(e.path()));
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| input.to_path_buf());
            Error::io(path, e.into())
        })?;
        let relative = relative_name(input, entry.path());

        if entry.file_type().is_dir() {
            let target = output.join(&relative);
            fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
        } else if entry.file_type().is_file() {
            files.push((relative, entry.into_path()));
        } else {
            let action = engine
                .topology
                .accept(ActionKind::Directory, &relative, Probe::File, &state.rule);
            warn!("Skipping {}: not a regular file", entry.path().display());
            changes.record_unaccepted(action.name());
        }
    }

    info!("Transforming {} files under {}", files.len(), input.display());

    let written = Mutex::new(HashSet::new());
    if engine.parallel {
        let base: &RunState = state;
        let partial = files
            .par_iter()
            .map(|(relative, path)| -> Result<ContainerChanges> {
                let mut task = base.fork();
                let mut part = ContainerChanges::new(input_name);
                apply_file(engine, &mut task, &mut part, relative, path, output, &written)?;
                Ok(part)
            })
            .try_reduce(
                || ContainerChanges::new(input_name),
                |mut a, b| {
                    a.merge(&b);
                    Ok(a)
                },
            )?;
        changes.merge(&partial);
    } else {
        for (relative, path) in &files {
            apply_file(engine, state, &mut changes, relative, path, output, &written)?;
        }
    }

    Ok(changes)
}

fn apply_file(
    engine: &Engine,
    state: &mut RunState,
    changes: &mut ContainerChanges,
    relative: &str,
    path: &Path,
    output: &Path,
    written: &Mutex<HashSet<String>>,
) -> Result<()> {
    let action = engine
        .topology
        .accept(ActionKind::Directory, relative, Probe::File, &state.rule);

    let mut data = std::mem::take(&mut state.buffer);
    data.clear();
    fs::File::open(path)
        .and_then(|mut f| f.read_to_end(&mut data))
        .map_err(|e| Error::io(path, e))?;

    let outcome = process_entry(engine, state, changes, action, relative, &data)?;
    let (output_name, bytes) = match &outcome {
        Some(child) => (child.output_name(), child.bytes.as_deref().unwrap_or(data.as_slice())),
        None => (relative, data.as_slice()),
    };

    let first = written
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(output_name.to_string());
    if first {
        let target = output.join(output_name);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(&target, bytes).map_err(|e| Error::io(&target, e))?;
    } else {
        warn!("Duplicate output {}; keeping the first", output_name);
        changes.record_duplicated(action.name());
    }

    state.buffer = data;
    Ok(())
}

/// The output directory as the input walk would reach it, if it lies inside the input
fn nested_output(input: &Path, output: &Path) -> Option<PathBuf> {
    let input_real = input.canonicalize().ok()?;
    let output_real = output.canonicalize().ok()?;
    let below = output_real.strip_prefix(&input_real).ok()?;
    if below.as_os_str().is_empty() {
        return None;
    }
    Some(input.join(below))
}

/// Path of `path` below `root`, with `/` separators
fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
