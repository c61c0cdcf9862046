use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::io::store::{NoteWidthStore, WidthStore};
use crate::io::vault_io::{self, VaultError};
use crate::model::note::{FrontMatter, Note};
use crate::model::settings::Settings;
use crate::model::width::Width;
use crate::ops::sources::{NOTE_ID_KEY, SavedWidth, display_value};

/// Structured result from `nw check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// Something that affects which width a note resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// A `noteID` with no record; the next visit will remove it
    #[serde(rename = "dangling_note_id")]
    DanglingNoteId { note: PathBuf, id: String },
    /// Front-matter that cannot be parsed as a YAML mapping
    #[serde(rename = "invalid_front_matter")]
    InvalidFrontMatter { note: PathBuf, message: String },
    /// The width field holds something that is not a number
    #[serde(rename = "malformed_width")]
    MalformedWidth { note: PathBuf, key: String },
}

/// Harmless but untidy state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// A record no note links to
    #[serde(rename = "orphaned_record")]
    OrphanedRecord { id: String, width: Width },
    /// Several notes share one `noteID`
    #[serde(rename = "shared_note_id")]
    SharedNoteId { id: String, notes: Vec<PathBuf> },
    /// The width field lies outside 0..=100 or is not a plain integer
    #[serde(rename = "non_canonical_width")]
    NonCanonicalWidth { note: PathBuf, key: String },
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate the notes against the width database.
///
/// Read-only: nothing in the vault or the database changes.
pub fn check_vault(
    root: &Path,
    notes: &[PathBuf],
    settings: &Settings,
    store: &WidthStore,
) -> Result<CheckResult, VaultError> {
    let mut result = CheckResult::default();
    let mut linked: Vec<(String, Vec<PathBuf>)> = Vec::new();

    for rel in notes {
        let note = vault_io::read_note(root, rel)?;
        check_note(&note, settings, store, &mut result, &mut linked);
    }

    let linked_ids: HashSet<&str> = linked.iter().map(|(id, _)| id.as_str()).collect();
    for record in store.records() {
        if !linked_ids.contains(record.id.as_str()) {
            result.warnings.push(CheckWarning::OrphanedRecord {
                id: record.id,
                width: record.width,
            });
        }
    }
    for (id, notes) in linked {
        if notes.len() > 1 {
            result.warnings.push(CheckWarning::SharedNoteId { id, notes });
        }
    }

    result.valid = result.errors.is_empty();
    Ok(result)
}

fn check_note(
    note: &Note,
    settings: &Settings,
    store: &WidthStore,
    result: &mut CheckResult,
    linked: &mut Vec<(String, Vec<PathBuf>)>,
) {
    let path = note.path().to_path_buf();
    if let Err(e) = note.check_front_matter() {
        result.errors.push(CheckError::InvalidFrontMatter {
            note: path,
            message: e.to_string(),
        });
        return;
    }

    if note.has_key(NOTE_ID_KEY) {
        match SavedWidth::note_id(note) {
            Some(id) if store.exists(&id) => {
                match linked.iter_mut().find(|(known, _)| *known == id) {
                    Some((_, paths)) => paths.push(path.clone()),
                    None => linked.push((id, vec![path.clone()])),
                }
            }
            Some(id) => result.errors.push(CheckError::DanglingNoteId {
                note: path.clone(),
                id,
            }),
            None => result.errors.push(CheckError::DanglingNoteId {
                note: path.clone(),
                id: note.get(NOTE_ID_KEY).map(|v| display_value(&v)).unwrap_or_default(),
            }),
        }
    }

    let key = &settings.yaml_key;
    if let Some(value) = note.get(key) {
        match Width::from_yaml(&value) {
            Some(width) if value == width.to_yaml() => {}
            Some(_) => result.warnings.push(CheckWarning::NonCanonicalWidth {
                note: path,
                key: key.clone(),
            }),
            None => result.errors.push(CheckError::MalformedWidth {
                note: path,
                key: key.clone(),
            }),
        }
    }
}

/// Delete every record the check found orphaned. Returns how many went.
pub fn prune_orphans(store: &mut WidthStore, result: &CheckResult) -> usize {
    result
        .warnings
        .iter()
        .filter_map(|w| match w {
            CheckWarning::OrphanedRecord { id, .. } => Some(id),
            _ => None,
        })
        .filter(|id| store.remove(id))
        .count()
}
