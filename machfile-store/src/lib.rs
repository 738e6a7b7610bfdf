//! File I/O for machine documents.
//!
//! Loading reads JSON, migrates it to the current schema and decodes it.
//! Saving writes a temporary file next to the target and renames it over the
//! target, so an interrupted save never leaves a truncated document behind.

use std::io::Write;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use glob::glob;
use machfile_codec::Codec;
use machfile_types::{Instance, PersistResult};
use serde_json::Value as JsonValue;
use tempfile::NamedTempFile;
use tracing::debug;

pub fn load(path: &Utf8Path) -> PersistResult<Instance> {
    load_as(path, None)
}

/// Loads a document whose root must be `expected` or one of its subtypes.
pub fn load_as(path: &Utf8Path, expected: Option<&str>) -> PersistResult<Instance> {
    let document = read_document(path)?;
    debug!(path = %path, expected = expected.unwrap_or("any"), "loading document");
    Codec::default().from_document(&document, expected)
}

/// Raw JSON of a document, neither migrated nor decoded.
pub fn read_document(path: &Utf8Path) -> PersistResult<JsonValue> {
    let text = fs::read_to_string(path).map_err(anyhow::Error::from)?;
    let document = serde_json::from_str(&text).with_context(|| format!("parse {path}"))?;
    Ok(document)
}

pub fn save(instance: &Instance, path: &Utf8Path) -> PersistResult<()> {
    let text = Codec::default().to_string_pretty(instance)?;
    write_atomic(path, text.as_bytes())?;
    debug!(path = %path, type_name = instance.type_name(), "saved document");
    Ok(())
}

/// Replaces `path` with `contents` through a temporary file in the same directory.
pub fn write_atomic(path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir).with_context(|| format!("create temporary file in {dir}"))?;
    tmp.write_all(contents)
        .with_context(|| format!("write temporary file for {path}"))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync temporary file for {path}"))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("replace {path}"))?;
    Ok(())
}

/// Copies `path` to `path` + `suffix` and returns the copy's path.
pub fn backup(path: &Utf8Path, suffix: &str) -> anyhow::Result<Utf8PathBuf> {
    let target = Utf8PathBuf::from(format!("{path}{suffix}"));
    fs::copy(path, &target)?;
    debug!(path = %path, backup = %target, "backed up document");
    Ok(target)
}

/// One `*.json` file of a directory scan with its load outcome.
#[derive(Debug)]
pub struct LoadedDocument {
    pub path: Utf8PathBuf,
    pub result: PersistResult<Instance>,
}

/// Loads every `*.json` directly inside `dir`, sorted by path.
///
/// A file that fails to load is reported in its entry; a missing directory
/// yields an empty list.
pub fn load_dir(dir: &Utf8Path, expected: Option<&str>) -> anyhow::Result<Vec<LoadedDocument>> {
    let mut out = Vec::new();
    for path in json_files(dir)? {
        let result = load_as(&path, expected);
        out.push(LoadedDocument { path, result });
    }
    Ok(out)
}

/// Paths of every `*.json` file directly inside `dir`, sorted.
pub fn json_files(dir: &Utf8Path) -> anyhow::Result<Vec<Utf8PathBuf>> {
    let pattern = dir.join("*.json");
    let pattern_str = pattern.as_str();
    debug!(pattern = %pattern_str, "scanning for documents");

    let mut paths = Vec::new();
    for entry in glob(pattern_str).with_context(|| format!("glob {pattern_str}"))? {
        let path = entry.map_err(|e| anyhow::anyhow!("glob error: {e}"))?;
        let path = Utf8PathBuf::from_path_buf(path)
            .map_err(|p| anyhow::anyhow!("non UTF-8 path: {}", p.display()))?;
        if path.is_file() {
            paths.push(path);
        }
    }

    // Deterministic order matters.
    paths.sort();
    Ok(paths)
}
