use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{info, warn};

use crate::io::store::WidthStore;
use crate::io::vault_io::{self, VaultError};
use crate::model::note::{FrontMatter, Note};
use crate::model::settings::Settings;
use crate::model::width::Width;

/// Receives progress while a bulk operation walks the vault.
pub trait Progress {
    /// Called once per visited note with that note's share of 100%.
    fn advance(&mut self, percent: f64);
    fn finish(&mut self) {}
}

/// Discards progress.
#[derive(Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn advance(&mut self, _percent: f64) {}
}

/// Summary of a bulk operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    /// Notes in the vault when the operation started
    pub total: usize,
    /// Notes looked at before finishing or being cancelled
    pub visited: usize,
    /// Notes rewritten on disk
    pub changed: Vec<PathBuf>,
    /// Database records whose width changed
    pub records_updated: usize,
    /// Notes that could not be read or written back; the rest still ran
    pub skipped: Vec<PathBuf>,
    pub cancelled: bool,
}

/// Apply `edit` to every note, writing back those it modified.
///
/// The cancellation flag is checked before each note; work already written
/// stays written. A note that can't be read or saved is skipped.
pub fn for_each_note(
    root: &Path,
    notes: &[PathBuf],
    cancel: &AtomicBool,
    progress: &mut dyn Progress,
    mut edit: impl FnMut(&mut Note),
) -> BulkReport {
    let mut report = BulkReport {
        total: notes.len(),
        ..Default::default()
    };
    let increment = if notes.is_empty() {
        0.0
    } else {
        100.0 / notes.len() as f64
    };

    for rel in notes {
        if cancel.load(Ordering::SeqCst) {
            info!(visited = report.visited, total = report.total, "bulk operation cancelled");
            report.cancelled = true;
            break;
        }
        report.visited += 1;
        progress.advance(increment);
        match edit_note(root, rel, &mut edit) {
            Ok(true) => report.changed.push(rel.clone()),
            Ok(false) => {}
            Err(e) => {
                warn!(note = %rel.display(), error = %e, "skipping note");
                report.skipped.push(rel.clone());
            }
        }
    }

    progress.finish();
    report
}

fn edit_note(root: &Path, rel: &Path, edit: &mut impl FnMut(&mut Note)) -> Result<bool, VaultError> {
    let mut note = vault_io::read_note(root, rel)?;
    edit(&mut note);
    vault_io::save_note(root, &mut note)
}

/// Give every note the same width.
///
/// With the per-note source enabled every record is overwritten; with the
/// field source enabled every note already carrying the field is rewritten.
/// `width_percentage` becomes `width` either way; the caller persists it.
pub fn change_all_note_width(
    root: &Path,
    notes: &[PathBuf],
    settings: &mut Settings,
    store: &mut WidthStore,
    width: Width,
    cancel: &AtomicBool,
    progress: &mut dyn Progress,
) -> BulkReport {
    let records_updated = if settings.enable_save_width_individually {
        store.set_all_widths(width)
    } else {
        0
    };

    let mut report = if settings.enable_yaml_width {
        let key = settings.yaml_key.clone();
        for_each_note(root, notes, cancel, progress, |note| {
            if note.has_key(&key) {
                note.set(&key, width.to_yaml());
            }
        })
    } else {
        BulkReport::default()
    };
    report.records_updated = records_updated;

    settings.width_percentage = width;
    info!(
        %width,
        notes = report.changed.len(),
        records = records_updated,
        "changed width of all notes"
    );
    report
}

/// Move the value under `old_key` to `new_key` in every note that has it.
pub fn rename_yaml_key_in_all_notes(
    root: &Path,
    notes: &[PathBuf],
    old_key: &str,
    new_key: &str,
    cancel: &AtomicBool,
    progress: &mut dyn Progress,
) -> BulkReport {
    if old_key == new_key {
        return BulkReport {
            total: notes.len(),
            ..Default::default()
        };
    }
    let report = for_each_note(root, notes, cancel, progress, |note| {
        let Some(value) = note.get(old_key) else {
            return;
        };
        if note.has_key(new_key) {
            warn!(note = %note.path().display(), key = new_key, "overwriting existing key while renaming");
        }
        if note.set(new_key, value) {
            note.remove(old_key);
        }
    });
    info!(old_key, new_key, notes = report.changed.len(), "renamed front-matter key");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::NoteWidthStore;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    struct Recorder(Vec<f64>, bool);

    impl Progress for Recorder {
        fn advance(&mut self, percent: f64) {
            self.0.push(percent);
        }
        fn finish(&mut self) {
            self.1 = true;
        }
    }

    fn vault() -> (TempDir, Vec<PathBuf>) {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "---\ncustom-width: 20\n---\nA").unwrap();
        fs::write(tmp.path().join("b.md"), "---\ntitle: B\n---\nB").unwrap();
        fs::write(tmp.path().join("c.md"), "plain").unwrap();
        fs::write(tmp.path().join("d.md"), "---\ncustom-width: 90\nnoteID: u1\n---\nD").unwrap();
        let notes = vault_io::list_notes(tmp.path()).unwrap();
        (tmp, notes)
    }

    fn read(tmp: &TempDir, name: &str) -> String {
        fs::read_to_string(tmp.path().join(name)).unwrap()
    }

    #[test]
    fn change_all_rewrites_fields_and_records() {
        let (tmp, notes) = vault();
        let mut settings = Settings::default();
        let mut store = WidthStore::in_memory();
        store.upsert("u1", Width::clamped(10));
        store.upsert("u2", Width::clamped(60));
        let mut progress = Recorder(Vec::new(), false);

        let report = change_all_note_width(
            tmp.path(),
            &notes,
            &mut settings,
            &mut store,
            Width::clamped(60),
            &AtomicBool::new(false),
            &mut progress,
        );

        assert_eq!(report.total, 4);
        assert_eq!(report.visited, 4);
        assert_eq!(report.changed, vec![PathBuf::from("a.md"), PathBuf::from("d.md")]);
        assert_eq!(report.records_updated, 1);
        assert_eq!(store.get("u1"), Some(Width::clamped(60)));
        assert_eq!(settings.width_percentage, Width::clamped(60));
        assert_eq!(read(&tmp, "a.md"), "---\ncustom-width: 60\n---\n\nA");
        assert_eq!(read(&tmp, "b.md"), "---\ntitle: B\n---\nB");
        assert_eq!(progress.0, vec![25.0; 4]);
        assert!(progress.1);
    }

    #[test]
    fn change_all_with_field_source_disabled_leaves_notes() {
        let (tmp, notes) = vault();
        let mut settings = Settings {
            enable_yaml_width: false,
            ..Default::default()
        };
        let mut store = WidthStore::in_memory();
        let report = change_all_note_width(
            tmp.path(),
            &notes,
            &mut settings,
            &mut store,
            Width::clamped(60),
            &AtomicBool::new(false),
            &mut NoProgress,
        );
        assert!(report.changed.is_empty());
        assert_eq!(read(&tmp, "a.md"), "---\ncustom-width: 20\n---\nA");
    }

    #[test]
    fn cancellation_stops_before_next_note() {
        let (tmp, notes) = vault();
        let cancel = AtomicBool::new(false);
        let mut seen = 0;
        let report = for_each_note(tmp.path(), &notes, &cancel, &mut NoProgress, |note| {
            seen += 1;
            note.set("custom-width", Width::clamped(1).to_yaml());
            if seen == 2 {
                cancel.store(true, Ordering::SeqCst);
            }
        });
        assert!(report.cancelled);
        assert_eq!(report.visited, 2);
        assert_eq!(read(&tmp, "c.md"), "plain");
    }

    #[test]
    fn rename_moves_value_and_keeps_other_keys() {
        let (tmp, notes) = vault();
        let report = rename_yaml_key_in_all_notes(
            tmp.path(),
            &notes,
            "custom-width",
            "width",
            &AtomicBool::new(false),
            &mut NoProgress,
        );
        assert_eq!(report.changed.len(), 2);
        assert_eq!(read(&tmp, "a.md"), "---\nwidth: 20\n---\n\nA");
        assert_eq!(read(&tmp, "d.md"), "---\nnoteID: u1\nwidth: 90\n---\n\nD");
    }

    #[test]
    fn rename_to_same_key_touches_nothing() {
        let (tmp, notes) = vault();
        let report = rename_yaml_key_in_all_notes(
            tmp.path(),
            &notes,
            "custom-width",
            "custom-width",
            &AtomicBool::new(false),
            &mut NoProgress,
        );
        assert_eq!(report.visited, 0);
        assert!(report.changed.is_empty());
    }

    #[test]
    fn unreadable_note_is_skipped_and_the_rest_still_change() {
        let (tmp, notes) = vault();
        fs::write(tmp.path().join("b.md"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let mut settings = Settings::default();
        let mut store = WidthStore::in_memory();

        let report = change_all_note_width(
            tmp.path(),
            &notes,
            &mut settings,
            &mut store,
            Width::clamped(60),
            &AtomicBool::new(false),
            &mut NoProgress,
        );

        assert_eq!(report.visited, 4);
        assert_eq!(report.skipped, vec![PathBuf::from("b.md")]);
        assert_eq!(report.changed, vec![PathBuf::from("a.md"), PathBuf::from("d.md")]);
        assert_eq!(read(&tmp, "d.md"), "---\ncustom-width: 60\nnoteID: u1\n---\n\nD");
        assert_eq!(settings.width_percentage, Width::clamped(60));
    }

    #[test]
    fn rename_keeps_old_key_when_block_is_unparsable() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "---\ncustom-width: 20\n---\nA").unwrap();
        fs::write(tmp.path().join("b.md"), [0xff, 0xfe]).unwrap();
        let notes = vault_io::list_notes(tmp.path()).unwrap();
        let report = rename_yaml_key_in_all_notes(
            tmp.path(),
            &notes,
            "custom-width",
            "width",
            &AtomicBool::new(false),
            &mut NoProgress,
        );
        assert_eq!(report.skipped, vec![PathBuf::from("b.md")]);
        assert_eq!(read(&tmp, "a.md"), "---\nwidth: 20\n---\n\nA");
    }
}
