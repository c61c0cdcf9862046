use tracing::info;

use crate::io::store::NoteWidthStore;
use crate::model::note::FrontMatter;
use crate::model::settings::Settings;
use crate::model::width::Width;
use crate::ops::resolver::{Resolution, Resolver, Trigger, WidthSink};

/// Error type for user-facing width commands
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(
        "changing the default note width needs enable_change_default_note_width and enable_save_width_individually"
    )]
    DefaultWidthDisabled,
    #[error("no active note (run `nw open <note>` first)")]
    NoActiveNote,
}

/// Resolve the width of the note that just became active.
pub fn open_note(
    settings: &Settings,
    note: Option<&mut dyn FrontMatter>,
    store: &mut dyn NoteWidthStore,
    sink: &mut dyn WidthSink,
) -> Option<Resolution> {
    Resolver::new(settings).resolve(Trigger::Navigation, note, store, sink)
}

/// Give the active note a new width.
///
/// `width_percentage` takes the clamped value, then the user-edit path
/// writes it to whichever sources the note uses. The caller persists the
/// settings.
pub fn change_note_width(
    settings: &mut Settings,
    width: Width,
    note: Option<&mut dyn FrontMatter>,
    store: &mut dyn NoteWidthStore,
    sink: &mut dyn WidthSink,
) -> Result<Resolution, CommandError> {
    let note = note.ok_or(CommandError::NoActiveNote)?;
    settings.width_percentage = width;
    let resolution = Resolver::new(settings)
        .resolve(Trigger::UserEdit, Some(note), store, sink)
        .ok_or(CommandError::NoActiveNote)?;
    info!(%width, actions = resolution.actions.len(), "changed note width");
    Ok(resolution)
}

/// Set the width notes get when nothing else applies.
pub fn change_default_note_width(settings: &mut Settings, width: Width) -> Result<Width, CommandError> {
    if !settings.can_change_default_note_width() {
        return Err(CommandError::DefaultWidthDisabled);
    }
    settings.default_note_width = width;
    info!(%width, "changed default note width");
    Ok(width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::WidthStore;
    use crate::model::note::Note;
    use crate::ops::resolver::Origin;

    #[test]
    fn change_note_width_updates_setting_and_note() {
        let mut settings = Settings::default();
        let mut store = WidthStore::in_memory();
        let mut note = Note::new("a.md", "---\ncustom-width: 10\n---\nBody");
        let mut applied = None;
        let mut sink = |w: Width| applied = Some(w);

        let res = change_note_width(
            &mut settings,
            Width::clamped(66),
            Some(&mut note as &mut dyn FrontMatter),
            &mut store,
            &mut sink,
        )
        .unwrap();
        assert_eq!(res.origin, Origin::Live);
        assert_eq!(applied, Some(Width::clamped(66)));
        assert_eq!(settings.width_percentage, Width::clamped(66));
        assert_eq!(note.get("custom-width"), Some(Width::clamped(66).to_yaml()));
    }

    #[test]
    fn change_note_width_needs_an_active_note() {
        let mut settings = Settings::default();
        let mut store = WidthStore::in_memory();
        let mut sink = |_: Width| {};
        let result = change_note_width(&mut settings, Width::clamped(50), None, &mut store, &mut sink);
        assert!(matches!(result, Err(CommandError::NoActiveNote)));
        assert_eq!(settings.width_percentage, Settings::default().width_percentage);
    }

    #[test]
    fn default_width_change_is_gated() {
        let mut settings = Settings::default();
        assert!(change_default_note_width(&mut settings, Width::clamped(50)).is_err());

        settings.enable_change_default_note_width = true;
        assert_eq!(
            change_default_note_width(&mut settings, Width::clamped(50)).unwrap(),
            Width::clamped(50)
        );
        assert_eq!(settings.default_note_width, Width::clamped(50));

        settings.enable_save_width_individually = false;
        assert!(change_default_note_width(&mut settings, Width::clamped(60)).is_err());
    }

    #[test]
    fn open_note_resolves_navigation() {
        let settings = Settings::default();
        let mut store = WidthStore::in_memory();
        store.upsert("u1", Width::clamped(50));
        let mut note = Note::new("a.md", "---\nnoteID: u1\n---\n");
        let mut sink = |_: Width| {};
        let res = open_note(&settings, Some(&mut note as &mut dyn FrontMatter), &mut store, &mut sink).unwrap();
        assert_eq!(res.width, Width::clamped(50));
        assert_eq!(res.trigger, Trigger::Navigation);
    }
}
