use serde::Serialize;
use tracing::{debug, info};

use crate::io::store::NoteWidthStore;
use crate::model::note::FrontMatter;
use crate::model::settings::{Settings, SourceKind};
use crate::model::width::Width;
use crate::ops::sources::{self, Lookup, NOTE_ID_KEY, WidthSource};

/// What started a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The active note changed or was reloaded
    Navigation,
    /// The user changed the width through a control
    UserEdit,
}

/// Where the applied width came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// The vault-wide `width_percentage`, no per-note source enabled
    Ambient,
    /// `default_note_width`, the note has no usable binding
    Default,
    Saved,
    Yaml,
    /// The width the user just set
    Live,
}

impl From<SourceKind> for Origin {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::SavedNoteWidth => Origin::Saved,
            SourceKind::YamlNoteWidth => Origin::Yaml,
        }
    }
}

/// A write performed while resolving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Dangling `noteID` was the only key, so the whole block went
    RemovedFrontMatter { id: String },
    /// Dangling `noteID` removed, other keys kept
    RemovedNoteId { id: String },
    /// A new binding was created for the source
    Bound { source: SourceKind },
    /// An existing binding was updated
    Updated { source: SourceKind },
    /// A stored value was rewritten in canonical form
    Normalized { source: SourceKind },
}

/// Outcome of one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub trigger: Trigger,
    pub width: Width,
    pub origin: Origin,
    pub actions: Vec<Action>,
}

/// Receives the width to display.
pub trait WidthSink {
    fn apply(&mut self, width: Width);
}

impl<F: FnMut(Width)> WidthSink for F {
    fn apply(&mut self, width: Width) {
        self(width)
    }
}

/// Decides which width a note shows and keeps the sources in sync.
pub struct Resolver {
    width_percentage: Width,
    default_note_width: Width,
    sources: Vec<Box<dyn WidthSource>>,
}

impl Resolver {
    pub fn new(settings: &Settings) -> Self {
        Resolver {
            width_percentage: settings.width_percentage,
            default_note_width: settings.default_note_width,
            sources: sources::enabled_sources(settings),
        }
    }

    /// Resolve the width for the active note and apply it to `sink`.
    ///
    /// Returns `None` without touching anything when there is no active note.
    pub fn resolve(
        &self,
        trigger: Trigger,
        note: Option<&mut dyn FrontMatter>,
        store: &mut dyn NoteWidthStore,
        sink: &mut dyn WidthSink,
    ) -> Option<Resolution> {
        let note = note?;
        let resolution = match trigger {
            Trigger::Navigation => self.navigate(note, store),
            Trigger::UserEdit => self.user_edit(note, store),
        };
        debug!(
            trigger = ?resolution.trigger,
            width = %resolution.width,
            origin = ?resolution.origin,
            "resolved note width"
        );
        sink.apply(resolution.width);
        Some(resolution)
    }

    fn navigate(&self, note: &mut dyn FrontMatter, store: &mut dyn NoteWidthStore) -> Resolution {
        let mut actions = Vec::new();

        if self.sources.is_empty() {
            return self.resolution(Trigger::Navigation, self.width_percentage, Origin::Ambient, actions);
        }
        if !note.has_front_matter() {
            return self.default_width(Trigger::Navigation, actions);
        }

        for source in &self.sources {
            match source.read(note, store) {
                Lookup::Absent => continue,
                Lookup::Found { width, canonical } => {
                    if !canonical {
                        source.write(note, store, width);
                        actions.push(Action::Normalized {
                            source: source.kind(),
                        });
                    }
                    return self.resolution(Trigger::Navigation, width, source.kind().into(), actions);
                }
                Lookup::Dangling { id } => {
                    actions.push(detach_note_id(note, id));
                    return self.default_width(Trigger::Navigation, actions);
                }
                Lookup::Malformed => {
                    info!(source = %source.kind(), "replacing malformed width with default");
                    source.write(note, store, self.default_note_width);
                    actions.push(Action::Normalized {
                        source: source.kind(),
                    });
                    return self.default_width(Trigger::Navigation, actions);
                }
            }
        }

        self.default_width(Trigger::Navigation, actions)
    }

    fn user_edit(&self, note: &mut dyn FrontMatter, store: &mut dyn NoteWidthStore) -> Resolution {
        let current = self.width_percentage;
        let mut actions = Vec::new();

        match self.sources.as_slice() {
            [] => {}
            [only] => {
                if only.present(note) {
                    only.write(note, store, current);
                    actions.push(Action::Updated {
                        source: only.kind(),
                    });
                } else if only.binds_on_edit() && only.bind(note, store, current) {
                    actions.push(Action::Bound {
                        source: only.kind(),
                    });
                }
            }
            [first, ..] => {
                let bound: Vec<&dyn WidthSource> = self
                    .sources
                    .iter()
                    .map(|s| s.as_ref())
                    .filter(|s| s.present(note))
                    .collect();
                if !note.has_front_matter() || bound.is_empty() {
                    if first.bind(note, store, current) {
                        actions.push(Action::Bound {
                            source: first.kind(),
                        });
                    }
                } else {
                    for source in bound {
                        source.write(note, store, current);
                        actions.push(Action::Updated {
                            source: source.kind(),
                        });
                    }
                }
            }
        }

        let origin = if self.sources.is_empty() {
            Origin::Ambient
        } else {
            Origin::Live
        };
        self.resolution(Trigger::UserEdit, current, origin, actions)
    }

    fn default_width(&self, trigger: Trigger, actions: Vec<Action>) -> Resolution {
        self.resolution(trigger, self.default_note_width, Origin::Default, actions)
    }

    fn resolution(&self, trigger: Trigger, width: Width, origin: Origin, actions: Vec<Action>) -> Resolution {
        Resolution {
            trigger,
            width,
            origin,
            actions,
        }
    }
}

/// Drop a `noteID` with no record behind it.
fn detach_note_id(note: &mut dyn FrontMatter, id: String) -> Action {
    if note.is_only_key(NOTE_ID_KEY) {
        info!(%id, "removing front-matter holding only a dangling noteID");
        note.remove_all();
        Action::RemovedFrontMatter { id }
    } else {
        info!(%id, "removing dangling noteID");
        note.remove(NOTE_ID_KEY);
        Action::RemovedNoteId { id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::WidthStore;
    use crate::model::note::Note;
    use crate::model::settings::PriorityList;
    use pretty_assertions::assert_eq;

    fn run(
        settings: &Settings,
        trigger: Trigger,
        note: &mut Note,
        store: &mut WidthStore,
    ) -> (Resolution, Vec<Width>) {
        let mut applied = Vec::new();
        let mut sink = |w: Width| applied.push(w);
        let resolution = Resolver::new(settings)
            .resolve(trigger, Some(note as &mut dyn FrontMatter), store, &mut sink)
            .unwrap();
        (resolution, applied)
    }

    fn only(kind: SourceKind) -> Settings {
        Settings {
            enable_save_width_individually: kind == SourceKind::SavedNoteWidth,
            enable_yaml_width: kind == SourceKind::YamlNoteWidth,
            ..Default::default()
        }
    }

    #[test]
    fn no_active_note_is_a_noop() {
        let mut store = WidthStore::in_memory();
        let mut called = false;
        let mut sink = |_: Width| called = true;
        let result = Resolver::new(&Settings::default()).resolve(
            Trigger::Navigation,
            None,
            &mut store,
            &mut sink,
        );
        assert!(result.is_none());
        assert!(!called);
    }

    #[test]
    fn navigation_without_sources_applies_ambient_width() {
        let settings = Settings {
            width_percentage: Width::clamped(61),
            enable_save_width_individually: false,
            enable_yaml_width: false,
            ..Default::default()
        };
        let mut store = WidthStore::in_memory();
        let mut note = Note::new("a.md", "---\ncustom-width: 80\n---\n");
        let (res, applied) = run(&settings, Trigger::Navigation, &mut note, &mut store);
        assert_eq!(res.width, Width::clamped(61));
        assert_eq!(res.origin, Origin::Ambient);
        assert_eq!(applied, vec![Width::clamped(61)]);
        assert!(!note.is_modified());
    }

    #[test]
    fn navigation_without_front_matter_applies_default() {
        let mut store = WidthStore::in_memory();
        let mut note = Note::new("a.md", "# Plain\n");
        let (res, _) = run(&Settings::default(), Trigger::Navigation, &mut note, &mut store);
        assert_eq!(res.width, Width::clamped(36));
        assert_eq!(res.origin, Origin::Default);
    }

    #[test]
    fn navigation_normalizes_out_of_range_field() {
        let mut store = WidthStore::in_memory();
        let mut note = Note::new("a.md", "---\ncustom-width: 250\n---\nBody");
        let (res, _) = run(&only(SourceKind::YamlNoteWidth), Trigger::Navigation, &mut note, &mut store);
        assert_eq!(res.width, Width::MAX);
        assert_eq!(
            res.actions,
            vec![Action::Normalized {
                source: SourceKind::YamlNoteWidth
            }]
        );
        assert_eq!(note.content(), "---\ncustom-width: 100\n---\n\nBody");
    }

    #[test]
    fn navigation_leaves_canonical_field_untouched() {
        let mut store = WidthStore::in_memory();
        let mut note = Note::new("a.md", "---\ncustom-width: 55\n---\nBody");
        let (res, _) = run(&only(SourceKind::YamlNoteWidth), Trigger::Navigation, &mut note, &mut store);
        assert_eq!(res.width, Width::clamped(55));
        assert!(res.actions.is_empty());
        assert!(!note.is_modified());
    }

    #[test]
    fn navigation_replaces_malformed_field_with_default() {
        let mut store = WidthStore::in_memory();
        let mut note = Note::new("a.md", "---\ncustom-width: wide\n---\nBody");
        let (res, _) = run(&only(SourceKind::YamlNoteWidth), Trigger::Navigation, &mut note, &mut store);
        assert_eq!(res.width, Width::clamped(36));
        assert_eq!(res.origin, Origin::Default);
        assert_eq!(note.get("custom-width"), Some(Width::clamped(36).to_yaml()));
    }

    #[test]
    fn dangling_id_with_other_keys_keeps_block() {
        let mut store = WidthStore::in_memory();
        let mut note = Note::new("a.md", "---\nnoteID: gone\ntitle: Keep\n---\nBody");
        let (res, _) = run(&only(SourceKind::SavedNoteWidth), Trigger::Navigation, &mut note, &mut store);
        assert_eq!(res.actions, vec![Action::RemovedNoteId { id: "gone".into() }]);
        assert_eq!(note.content(), "---\ntitle: Keep\n---\n\nBody");
    }

    #[test]
    fn absent_sources_fall_through_to_default() {
        let mut store = WidthStore::in_memory();
        let mut note = Note::new("a.md", "---\ntitle: Hi\n---\nBody");
        let (res, _) = run(&Settings::default(), Trigger::Navigation, &mut note, &mut store);
        assert_eq!(res.origin, Origin::Default);
        assert!(res.actions.is_empty());
    }

    #[test]
    fn navigation_falls_through_to_second_source() {
        let mut store = WidthStore::in_memory();
        let mut note = Note::new("a.md", "---\ncustom-width: 80\n---\nBody");
        let (res, applied) = run(&Settings::default(), Trigger::Navigation, &mut note, &mut store);
        assert_eq!(res.width, Width::clamped(80));
        assert_eq!(res.origin, Origin::Yaml);
        assert_eq!(applied, vec![Width::clamped(80)]);
    }

    #[test]
    fn dangling_id_stops_before_lower_priority_field() {
        let mut store = WidthStore::in_memory();
        let mut note = Note::new("a.md", "---\nnoteID: gone\ncustom-width: 80\n---\nBody");
        let (res, _) = run(&Settings::default(), Trigger::Navigation, &mut note, &mut store);
        assert_eq!(res.width, Width::clamped(36));
        assert_eq!(res.origin, Origin::Default);
        assert_eq!(res.actions, vec![Action::RemovedNoteId { id: "gone".into() }]);
        assert_eq!(note.content(), "---\ncustom-width: 80\n---\n\nBody");
    }

    #[test]
    fn user_edit_saved_only_creates_binding() {
        let settings = Settings {
            width_percentage: Width::clamped(72),
            ..only(SourceKind::SavedNoteWidth)
        };
        let mut store = WidthStore::in_memory();
        let mut note = Note::new("a.md", "# Plain\n");
        let (res, applied) = run(&settings, Trigger::UserEdit, &mut note, &mut store);
        assert_eq!(res.origin, Origin::Live);
        assert_eq!(applied, vec![Width::clamped(72)]);
        let id = crate::ops::sources::SavedWidth::note_id(&note).unwrap();
        assert_eq!(store.get(&id), Some(Width::clamped(72)));
    }

    #[test]
    fn user_edit_saved_only_updates_existing_record() {
        let settings = Settings {
            width_percentage: Width::clamped(20),
            ..only(SourceKind::SavedNoteWidth)
        };
        let mut store = WidthStore::in_memory();
        store.upsert("u1", Width::clamped(90));
        let mut note = Note::new("a.md", "---\nnoteID: u1\n---\n");
        let (res, _) = run(&settings, Trigger::UserEdit, &mut note, &mut store);
        assert_eq!(
            res.actions,
            vec![Action::Updated {
                source: SourceKind::SavedNoteWidth
            }]
        );
        assert_eq!(store.get("u1"), Some(Width::clamped(20)));
        assert!(!note.is_modified());
    }

    #[test]
    fn user_edit_both_enabled_binds_first_priority() {
        let settings = Settings {
            width_percentage: Width::clamped(44),
            priority_list: PriorityList::new(SourceKind::YamlNoteWidth),
            ..Default::default()
        };
        let mut store = WidthStore::in_memory();
        let mut note = Note::new("a.md", "# Plain\n");
        let (res, _) = run(&settings, Trigger::UserEdit, &mut note, &mut store);
        assert_eq!(
            res.actions,
            vec![Action::Bound {
                source: SourceKind::YamlNoteWidth
            }]
        );
        assert_eq!(note.get("custom-width"), Some(Width::clamped(44).to_yaml()));
        assert!(store.is_empty());
    }

    #[test]
    fn user_edit_both_enabled_binds_first_when_block_has_neither_key() {
        let settings = Settings {
            width_percentage: Width::clamped(44),
            ..Default::default()
        };
        let mut store = WidthStore::in_memory();
        let mut note = Note::new("a.md", "---\ntitle: T\n---\nBody");
        let (res, _) = run(&settings, Trigger::UserEdit, &mut note, &mut store);
        assert_eq!(
            res.actions,
            vec![Action::Bound {
                source: SourceKind::SavedNoteWidth
            }]
        );
        assert!(note.has_key("title"));
        assert!(!note.has_key("custom-width"));
        let id = crate::ops::sources::SavedWidth::note_id(&note).unwrap();
        assert_eq!(store.get(&id), Some(Width::clamped(44)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn user_edit_on_unparsable_front_matter_binds_nothing() {
        let settings = Settings {
            width_percentage: Width::clamped(44),
            ..Default::default()
        };
        let mut store = WidthStore::in_memory();
        let mut note = Note::new("a.md", "---\ntitle: [broken\n---\nBody");
        for _ in 0..3 {
            let (res, applied) = run(&settings, Trigger::UserEdit, &mut note, &mut store);
            assert!(res.actions.is_empty());
            assert_eq!(applied, vec![Width::clamped(44)]);
        }
        assert!(store.is_empty());
        assert!(!note.is_modified());
    }

    #[test]
    fn user_edit_both_enabled_updates_every_binding() {
        let settings = Settings {
            width_percentage: Width::clamped(30),
            ..Default::default()
        };
        let mut store = WidthStore::in_memory();
        store.upsert("u1", Width::clamped(50));
        let mut note = Note::new("a.md", "---\nnoteID: u1\ncustom-width: 80\n---\n");
        let (res, _) = run(&settings, Trigger::UserEdit, &mut note, &mut store);
        assert_eq!(res.actions.len(), 2);
        assert_eq!(store.get("u1"), Some(Width::clamped(30)));
        assert_eq!(note.get("custom-width"), Some(Width::clamped(30).to_yaml()));
    }

    #[test]
    fn user_edit_without_sources_reapplies_current() {
        let settings = Settings {
            width_percentage: Width::clamped(12),
            enable_save_width_individually: false,
            enable_yaml_width: false,
            ..Default::default()
        };
        let mut store = WidthStore::in_memory();
        let mut note = Note::new("a.md", "# Plain\n");
        let (res, applied) = run(&settings, Trigger::UserEdit, &mut note, &mut store);
        assert_eq!(res.origin, Origin::Ambient);
        assert_eq!(applied, vec![Width::clamped(12)]);
        assert!(res.actions.is_empty());
        assert!(!note.is_modified());
    }
}
