//! File-backed persistence for top-level entries.
//!
//! Layout under the config directory:
//!
//! ```text
//! <backing>.json          one document per non-hash entry
//! <backing>/<key>.json    one document per hash element
//! ```
//!
//! Loading happens once at startup and never aborts on a bad file: every
//! failure is collected into the [`LoadReport`] and logged after the pass.
//! Saving writes each dirty entry (or dirty hash element) through a
//! temporary file renamed over the destination. The dirty flag is cleared
//! whether or not the write succeeded.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tally_json::Json;
use tempfile::NamedTempFile;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::config::StoreConfig;
use crate::error::{StateError, StateResult};
use crate::handle::ValueId;
use crate::node::Variant;
use crate::state::{RootEntry, State};

/// Outcome of [`State::load_saved_configs`].
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Files applied to the state.
    pub loaded: Vec<PathBuf>,
    /// Files (or directories) that failed, with the reason.
    pub errors: Vec<(PathBuf, StateError)>,
}

impl LoadReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Outcome of [`State::save_all_needed`].
#[derive(Debug, Default)]
pub struct SaveReport {
    pub saved: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, StateError)>,
}

impl SaveReport {
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty() && self.failed.is_empty()
    }
}

fn read_json(path: &Path) -> StateResult<Json> {
    let data = std::fs::read(path).map_err(|e| StateError::io(path, e))?;
    Ok(tally_json::decode(&data)?)
}

/// Write `text` to `path` via a temporary file in the same directory.
fn write_atomic(path: &Path, text: &str) -> StateResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| StateError::io(path, io::Error::other("path has no parent directory")))?;
    std::fs::create_dir_all(dir).map_err(|e| StateError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StateError::io(dir, e))?;
    tmp.write_all(text.as_bytes())
        .and_then(|()| tmp.write_all(b"\n"))
        .map_err(|e| StateError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| StateError::io(path, e.error))?;
    Ok(())
}

/// `.json` files directly inside `dir`, sorted by name.
fn json_files(dir: &Path) -> StateResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| StateError::io(dir, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        } else {
            debug!(path = %path.display(), "skipping non-JSON file");
        }
    }
    Ok(files)
}

impl State {
    fn persisted_entries(&self) -> Vec<(String, RootEntry)> {
        self.entries()
            .filter(|(_, entry)| !entry.backing.is_empty())
            .map(|(name, entry)| (name.to_string(), entry.clone()))
            .collect()
    }

    /// Apply every backing file to its entry. Call once at startup, inside
    /// a batch, before other writers run.
    ///
    /// Hash entries load one element per file, keyed by the file stem, and
    /// skip keys already in memory. Other entries decode their single file
    /// in full. Missing files and directories are not errors.
    pub fn load_saved_configs(&mut self, config: &StoreConfig) -> LoadReport {
        let mut report = LoadReport::default();

        for (name, entry) in self.persisted_entries() {
            match self.variant(entry.value) {
                Ok(Variant::Hash) => {
                    let dir = config.backing_dir(&entry.backing);
                    self.load_hash(&name, entry.value, &dir, &mut report);
                }
                Ok(_) => {
                    let path = config.backing_file(&entry.backing);
                    if !path.exists() {
                        debug!(entry = %name, path = %path.display(), "no saved config");
                        continue;
                    }
                    info!(entry = %name, path = %path.display(), "loading saved config");
                    let result =
                        read_json(&path).and_then(|json| self.set_json(entry.value, &json));
                    // Clean on failure too; a rejected file stays as written.
                    if let Err(err) = self.mark_clean(entry.value) {
                        debug!(entry = %name, error = %err, "cannot clear save flag");
                    }
                    match result {
                        Ok(()) => report.loaded.push(path),
                        Err(err) => report.errors.push((path, err)),
                    }
                }
                Err(err) => report.errors.push((config.backing_file(&entry.backing), err)),
            }
        }

        if !report.errors.is_empty() {
            error!(count = report.errors.len(), "errors while loading configs");
            for (path, err) in &report.errors {
                error!(path = %path.display(), error = %err, "failed to load config");
            }
        }
        report
    }

    fn load_hash(&mut self, name: &str, hash: ValueId, dir: &Path, report: &mut LoadReport) {
        if !dir.exists() {
            debug!(entry = %name, dir = %dir.display(), "no saved config directory");
            return;
        }
        let files = match json_files(dir) {
            Ok(files) => files,
            Err(err) => {
                report.errors.push((dir.to_path_buf(), err));
                return;
            }
        };

        for path in files {
            let Some(key) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let result = read_json(&path).and_then(|json| {
                if self.hash_get(hash, &key)?.is_some() {
                    return Ok(false);
                }
                info!(entry = %name, key = %key, path = %path.display(), "loading into hash");
                let elem = self.hash_new_element(hash, &key, &json)?;
                self.mark_clean(elem)?;
                Ok(true)
            });
            match result {
                Ok(true) => report.loaded.push(path),
                Ok(false) => debug!(entry = %name, key = %key, "key already loaded"),
                Err(err) => report.errors.push((path, err)),
            }
        }
    }

    /// Write every dirty entry and dirty hash element to disk, then mark
    /// it clean. Failed writes are logged, reported and still marked clean.
    pub fn save_all_needed(&mut self, config: &StoreConfig) -> SaveReport {
        let mut report = SaveReport::default();

        for (name, entry) in self.persisted_entries() {
            match self.variant(entry.value) {
                Ok(Variant::Hash) => {
                    let dirty: Vec<(String, ValueId)> = self
                        .hash_keys(entry.value)
                        .unwrap_or_default()
                        .into_iter()
                        .filter_map(|key| {
                            let elem = self.hash_get(entry.value, &key).ok().flatten()?;
                            self.save_needed(elem).unwrap_or(false).then_some((key, elem))
                        })
                        .collect();
                    for (key, elem) in dirty {
                        match config.element_file(&entry.backing, &key) {
                            Ok(path) => self.flush(elem, path, config.pretty, &mut report),
                            Err(err) => {
                                error!(entry = %name, key = %key, error = %err, "cannot save hash element");
                                if let Err(err) = self.mark_clean(elem) {
                                    debug!(error = %err, "cannot clear save flag");
                                }
                                report.failed.push((config.backing_dir(&entry.backing), err));
                            }
                        }
                    }
                    if let Err(err) = self.set_save_needed(entry.value, false) {
                        debug!(entry = %name, error = %err, "cannot clear save flag");
                    }
                }
                Ok(_) => {
                    if self.save_needed(entry.value).unwrap_or(false) {
                        let path = config.backing_file(&entry.backing);
                        self.flush(entry.value, path, config.pretty, &mut report);
                    }
                }
                Err(err) => {
                    error!(entry = %name, error = %err, "cannot save entry");
                    report.failed.push((config.backing_file(&entry.backing), err));
                }
            }
        }
        report
    }

    fn flush(&mut self, id: ValueId, path: PathBuf, pretty: bool, report: &mut SaveReport) {
        let result = self
            .to_json(id, true)
            .and_then(|json| write_atomic(&path, &json.to_json(pretty)));

        // Cleared even on failure; the next change to this value re-dirties it.
        if let Err(err) = self.mark_clean(id) {
            debug!(error = %err, "cannot clear save flag");
        }

        match result {
            Ok(()) => {
                info!(path = %path.display(), "saved config file");
                report.saved.push(path);
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "cannot save config file");
                report.failed.push((path, err));
            }
        }
    }
}
