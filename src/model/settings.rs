use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::width::Width;

/// Front-matter key the embedded width lives under unless configured otherwise.
pub const DEFAULT_YAML_KEY: &str = "custom-width";

/// The two persistent places a per-note width can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    /// A record in the width database, linked through the note's `noteID`
    SavedNoteWidth,
    /// A width written directly into the note's front-matter
    YamlNoteWidth,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::SavedNoteWidth, SourceKind::YamlNoteWidth];

    /// Human-readable description, as shown in the priority listing.
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::SavedNoteWidth => "Check for saved note width",
            SourceKind::YamlNoteWidth => "Check for YAML front-matter width",
        }
    }

    /// Accepts the serialized tag or the short names `saved` / `yaml`.
    pub fn parse_source(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "saved" | "saved_note_width" | "database" | "db" => Some(SourceKind::SavedNoteWidth),
            "yaml" | "yaml_note_width" | "frontmatter" | "front-matter" => {
                Some(SourceKind::YamlNoteWidth)
            }
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            SourceKind::SavedNoteWidth => "SAVED_NOTE_WIDTH",
            SourceKind::YamlNoteWidth => "YAML_NOTE_WIDTH",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("priority list must name SAVED_NOTE_WIDTH and YAML_NOTE_WIDTH exactly once each, got {0:?}")]
pub struct PriorityListError(pub Vec<SourceKind>);

/// Precedence between the two persistent sources. The first entry wins.
///
/// Always holds both sources exactly once; only the order changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SourceKind>", into = "Vec<SourceKind>")]
pub struct PriorityList([SourceKind; 2]);

impl PriorityList {
    pub fn new(first: SourceKind) -> Self {
        match first {
            SourceKind::SavedNoteWidth => {
                PriorityList([SourceKind::SavedNoteWidth, SourceKind::YamlNoteWidth])
            }
            SourceKind::YamlNoteWidth => {
                PriorityList([SourceKind::YamlNoteWidth, SourceKind::SavedNoteWidth])
            }
        }
    }

    pub fn first(&self) -> SourceKind {
        self.0[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = SourceKind> + '_ {
        self.0.iter().copied()
    }

    pub fn position(&self, kind: SourceKind) -> usize {
        if self.0[0] == kind { 0 } else { 1 }
    }

    /// Move `kind` one step towards the front. Returns false if already first.
    pub fn move_up(&mut self, kind: SourceKind) -> bool {
        if self.position(kind) == 0 {
            return false;
        }
        self.0.swap(0, 1);
        true
    }

    /// Move `kind` one step towards the back. Returns false if already last.
    pub fn move_down(&mut self, kind: SourceKind) -> bool {
        if self.position(kind) == 1 {
            return false;
        }
        self.0.swap(0, 1);
        true
    }
}

impl Default for PriorityList {
    fn default() -> Self {
        PriorityList::new(SourceKind::SavedNoteWidth)
    }
}

impl TryFrom<Vec<SourceKind>> for PriorityList {
    type Error = PriorityListError;

    fn try_from(list: Vec<SourceKind>) -> Result<Self, Self::Error> {
        match list.as_slice() {
            [a, b] if a != b => Ok(PriorityList([*a, *b])),
            _ => Err(PriorityListError(list)),
        }
    }
}

impl From<PriorityList> for Vec<SourceKind> {
    fn from(list: PriorityList) -> Self {
        list.0.to_vec()
    }
}

/// Vault-wide settings, read from `.notewidth/settings.toml`.
///
/// Missing keys fall back to the defaults below, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Last applied width, also the width used when no per-note source is enabled
    pub width_percentage: Width,
    /// Width for notes without a per-note override
    pub default_note_width: Width,
    /// Front-matter key holding an embedded width
    pub yaml_key: String,
    pub enable_save_width_individually: bool,
    pub enable_yaml_width: bool,
    pub priority_list: PriorityList,
    /// Slider length in pixels (display only)
    pub slider_width: u32,
    pub enable_slider: bool,
    pub enable_text_input: bool,
    pub enable_change_default_note_width: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            width_percentage: Width::clamped(36),
            default_note_width: Width::clamped(36),
            yaml_key: DEFAULT_YAML_KEY.to_string(),
            enable_save_width_individually: true,
            enable_yaml_width: true,
            priority_list: PriorityList::default(),
            slider_width: 85,
            enable_slider: true,
            enable_text_input: true,
            enable_change_default_note_width: false,
        }
    }
}

impl Settings {
    pub fn is_enabled(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::SavedNoteWidth => self.enable_save_width_individually,
            SourceKind::YamlNoteWidth => self.enable_yaml_width,
        }
    }

    /// Enabled sources, highest priority first.
    pub fn enabled_sources(&self) -> Vec<SourceKind> {
        self.priority_list
            .iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }

    pub fn any_source_enabled(&self) -> bool {
        self.enable_save_width_individually || self.enable_yaml_width
    }

    /// Changing the default width only makes sense when notes can carry their own.
    pub fn can_change_default_note_width(&self) -> bool {
        self.enable_change_default_note_width && self.enable_save_width_individually
    }
}
