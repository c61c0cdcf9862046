use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::io::vault_io::atomic_write;
use crate::model::record::NoteRecord;
use crate::model::width::Width;

/// Database file name inside the vault's data directory.
pub const DATABASE_FILENAME: &str = "noteWidthDatabase.json";

/// Collection holding the per-note width records.
pub const NOTE_WIDTHS_COLLECTION: &str = "NoteWidths";

/// How long unsaved changes may sit in memory before `maybe_autosave` writes them.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_millis(4000);

/// Error type for width database persistence
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not serialize width database: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// Per-note width lookups, as the resolver needs them.
pub trait NoteWidthStore {
    fn exists(&self, id: &str) -> bool;
    fn get(&self, id: &str) -> Option<Width>;
    /// Insert or update. Writing the value a record already holds changes nothing.
    fn upsert(&mut self, id: &str, width: Width);
}

/// On-disk layout: named collections of records.
#[derive(Debug, Default, Serialize, Deserialize)]
struct DatabaseFile {
    #[serde(default)]
    collections: IndexMap<String, Vec<NoteRecord>>,
}

/// JSON-backed width database.
///
/// Records live in memory and reach disk on `flush`, `close`, drop, or
/// `maybe_autosave` once the autosave interval has passed. A database
/// that fails to load is treated as empty and is never written back, so a
/// damaged file stays on disk for inspection.
#[derive(Debug)]
pub struct WidthStore {
    path: Option<PathBuf>,
    /// Collections other than the width records, kept for round-tripping
    other: IndexMap<String, Vec<NoteRecord>>,
    notes: IndexMap<String, Width>,
    loaded: bool,
    persist: bool,
    dirty: bool,
    autosave_interval: Duration,
    last_save: Instant,
}

impl WidthStore {
    /// A store backed by `path`. Nothing is read until `init`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        WidthStore {
            path: Some(path.into()),
            other: IndexMap::new(),
            notes: IndexMap::new(),
            loaded: false,
            persist: true,
            dirty: false,
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            last_save: Instant::now(),
        }
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        WidthStore {
            path: None,
            other: IndexMap::new(),
            notes: IndexMap::new(),
            loaded: true,
            persist: false,
            dirty: false,
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            last_save: Instant::now(),
        }
    }

    /// Open the database in `data_dir`, creating it if missing.
    pub fn open(data_dir: &Path) -> Self {
        let mut store = WidthStore::new(data_dir.join(DATABASE_FILENAME));
        store.init();
        store
    }

    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval = interval;
        self
    }

    /// Load the backing file and make sure the width collection exists.
    ///
    /// Failures are logged and leave an empty, memory-only store.
    pub fn init(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;
        let Some(path) = self.path.clone() else {
            return;
        };

        match read_database(&path) {
            Ok(Some(mut file)) => {
                let records = file
                    .collections
                    .shift_remove(NOTE_WIDTHS_COLLECTION)
                    .unwrap_or_default();
                self.notes = records.into_iter().map(|r| (r.id, r.width)).collect();
                self.other = file.collections;
                debug!(path = %path.display(), records = self.notes.len(), "loaded width database");
            }
            Ok(None) => {
                // Fresh database: create the file with an empty collection
                self.dirty = true;
                if let Err(e) = self.flush() {
                    warn!(error = %e, "could not create width database");
                }
            }
            Err(e) => {
                warn!(error = %e, "width database unavailable, continuing with an empty store");
                self.persist = false;
            }
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.persist
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Identifiers in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.notes.keys().map(String::as_str)
    }

    pub fn records(&self) -> Vec<NoteRecord> {
        self.notes
            .iter()
            .map(|(id, width)| NoteRecord {
                id: id.clone(),
                width: *width,
            })
            .collect()
    }

    /// Overwrite every record's width.
    pub fn set_all_widths(&mut self, width: Width) -> usize {
        let mut changed = 0;
        for stored in self.notes.values_mut() {
            if *stored != width {
                *stored = width;
                changed += 1;
            }
        }
        if changed > 0 {
            self.dirty = true;
        }
        changed
    }

    /// Delete a record. Only explicit maintenance calls this.
    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.notes.shift_remove(id).is_some();
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// Re-read the backing file, picking up writes made by other processes.
    ///
    /// In-memory state is replaced; call `flush` first to keep unsaved changes.
    pub fn reload(&mut self) {
        if self.path.is_none() {
            return;
        }
        if self.dirty {
            warn!("reloading width database with unsaved changes");
        }
        self.notes.clear();
        self.other.clear();
        self.loaded = false;
        self.persist = true;
        self.dirty = false;
        self.init();
    }

    /// Save if there are unsaved changes and the autosave interval has elapsed.
    pub fn maybe_autosave(&mut self, now: Instant) -> bool {
        if !self.dirty || now.duration_since(self.last_save) < self.autosave_interval {
            return false;
        }
        match self.flush() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "autosave failed");
                false
            }
        }
    }

    /// Write unsaved changes to disk.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        let Some(path) = self.path.as_ref().filter(|_| self.persist) else {
            self.dirty = false;
            return Ok(());
        };

        let mut collections = self.other.clone();
        collections.insert(NOTE_WIDTHS_COLLECTION.to_string(), self.records());
        let file = DatabaseFile { collections };
        let content = serde_json::to_string_pretty(&file)?;
        atomic_write(path, content.as_bytes()).map_err(|e| StoreError::WriteError {
            path: path.clone(),
            source: e,
        })?;

        self.dirty = false;
        self.last_save = Instant::now();
        Ok(())
    }

    /// Flush and release the store.
    pub fn close(mut self) -> Result<(), StoreError> {
        self.flush()
    }
}

impl NoteWidthStore for WidthStore {
    fn exists(&self, id: &str) -> bool {
        self.notes.contains_key(id)
    }

    fn get(&self, id: &str) -> Option<Width> {
        self.notes.get(id).copied()
    }

    fn upsert(&mut self, id: &str, width: Width) {
        match self.notes.get_mut(id) {
            Some(stored) if *stored == width => {}
            Some(stored) => {
                *stored = width;
                self.dirty = true;
            }
            None => {
                self.notes.insert(id.to_string(), width);
                self.dirty = true;
            }
        }
    }
}

impl Drop for WidthStore {
    fn drop(&mut self) {
        if self.dirty
            && let Err(e) = self.flush()
        {
            warn!(error = %e, "could not save width database on close");
        }
    }
}

/// Read the database file. `Ok(None)` means it does not exist yet.
fn read_database(path: &Path) -> Result<Option<DatabaseFile>, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StoreError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    if text.trim().is_empty() {
        return Ok(Some(DatabaseFile::default()));
    }
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| StoreError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
}
