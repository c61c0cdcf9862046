use serde_yaml::Value;
use tracing::debug;

use crate::io::store::NoteWidthStore;
use crate::model::note::FrontMatter;
use crate::model::settings::{Settings, SourceKind};
use crate::model::width::Width;
use crate::ops::ident::generate_unique_id;

/// Front-matter key linking a note to its width record.
pub const NOTE_ID_KEY: &str = "noteID";

/// What a source knows about the active note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The note carries no binding for this source
    Absent,
    /// A usable width. `canonical` is false when the stored form differs
    /// from the clamped integer and should be rewritten.
    Found { width: Width, canonical: bool },
    /// A `noteID` that no record answers to
    Dangling { id: String },
    /// A field whose value is not a number at all
    Malformed,
}

/// One persistent place a per-note width can live.
///
/// The resolver walks the enabled sources in priority order; each source
/// knows how to detect, read, update and create its own binding.
pub trait WidthSource {
    fn kind(&self) -> SourceKind;

    /// True when the note carries this source's key.
    fn present(&self, note: &dyn FrontMatter) -> bool;

    fn read(&self, note: &dyn FrontMatter, store: &dyn NoteWidthStore) -> Lookup;

    /// Store `width` through an existing binding.
    fn write(&self, note: &mut dyn FrontMatter, store: &mut dyn NoteWidthStore, width: Width);

    /// Create a binding on a note that has none, holding `width`.
    ///
    /// Returns false when the note can't take the binding (unparsable
    /// front-matter); nothing is written anywhere then.
    fn bind(&self, note: &mut dyn FrontMatter, store: &mut dyn NoteWidthStore, width: Width) -> bool;

    /// Whether a user edit creates a binding when this is the only enabled source.
    fn binds_on_edit(&self) -> bool;
}

/// Width held in the database, linked by the note's `noteID`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SavedWidth;

impl SavedWidth {
    /// The note's identifier, when it is a string.
    pub fn note_id(note: &dyn FrontMatter) -> Option<String> {
        match note.get(NOTE_ID_KEY)? {
            Value::String(id) => Some(id),
            _ => None,
        }
    }
}

impl WidthSource for SavedWidth {
    fn kind(&self) -> SourceKind {
        SourceKind::SavedNoteWidth
    }

    fn present(&self, note: &dyn FrontMatter) -> bool {
        note.has_key(NOTE_ID_KEY)
    }

    fn read(&self, note: &dyn FrontMatter, store: &dyn NoteWidthStore) -> Lookup {
        let Some(value) = note.get(NOTE_ID_KEY) else {
            return Lookup::Absent;
        };
        let id = match value {
            Value::String(id) => id,
            // A non-string id can never match a record
            other => {
                return Lookup::Dangling {
                    id: display_value(&other),
                };
            }
        };
        match store.get(&id) {
            Some(width) => Lookup::Found {
                width,
                canonical: true,
            },
            None => Lookup::Dangling { id },
        }
    }

    fn write(&self, note: &mut dyn FrontMatter, store: &mut dyn NoteWidthStore, width: Width) {
        match SavedWidth::note_id(note) {
            Some(id) => store.upsert(&id, width),
            None => {
                self.bind(note, store, width);
            }
        }
    }

    fn bind(&self, note: &mut dyn FrontMatter, store: &mut dyn NoteWidthStore, width: Width) -> bool {
        let id = generate_unique_id(store);
        if !note.set(NOTE_ID_KEY, Value::String(id.clone())) {
            return false;
        }
        debug!(%id, %width, "bound note to new width record");
        store.upsert(&id, width);
        true
    }

    fn binds_on_edit(&self) -> bool {
        true
    }
}

/// Width written directly into the note's front-matter.
#[derive(Debug, Clone)]
pub struct YamlWidth {
    pub key: String,
}

impl YamlWidth {
    pub fn new(key: impl Into<String>) -> Self {
        YamlWidth { key: key.into() }
    }
}

impl WidthSource for YamlWidth {
    fn kind(&self) -> SourceKind {
        SourceKind::YamlNoteWidth
    }

    fn present(&self, note: &dyn FrontMatter) -> bool {
        note.has_key(&self.key)
    }

    fn read(&self, note: &dyn FrontMatter, _store: &dyn NoteWidthStore) -> Lookup {
        let Some(value) = note.get(&self.key) else {
            return Lookup::Absent;
        };
        match Width::from_yaml(&value) {
            Some(width) => Lookup::Found {
                width,
                canonical: value == width.to_yaml(),
            },
            None => Lookup::Malformed,
        }
    }

    fn write(&self, note: &mut dyn FrontMatter, _store: &mut dyn NoteWidthStore, width: Width) {
        note.set(&self.key, width.to_yaml());
    }

    fn bind(&self, note: &mut dyn FrontMatter, _store: &mut dyn NoteWidthStore, width: Width) -> bool {
        note.set(&self.key, width.to_yaml())
    }

    fn binds_on_edit(&self) -> bool {
        false
    }
}

/// The enabled sources for `settings`, highest priority first.
pub fn enabled_sources(settings: &Settings) -> Vec<Box<dyn WidthSource>> {
    settings
        .enabled_sources()
        .into_iter()
        .map(|kind| source_for(kind, settings))
        .collect()
}

pub fn source_for(kind: SourceKind, settings: &Settings) -> Box<dyn WidthSource> {
    match kind {
        SourceKind::SavedNoteWidth => Box::new(SavedWidth),
        SourceKind::YamlNoteWidth => Box::new(YamlWidth::new(settings.yaml_key.clone())),
    }
}

/// A YAML value as it would appear in the file.
pub fn display_value(value: &Value) -> String {
    match serde_yaml::to_string(value) {
        Ok(text) => text.trim().to_string(),
        Err(_) => String::from("?"),
    }
}
