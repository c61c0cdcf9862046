use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::width::Width;

/// Session state file name inside the data directory.
pub const STATE_FILE: &str = ".state.json";

/// Persisted session state (written to .state.json)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionState {
    /// Vault-relative path of the active note
    #[serde(default)]
    pub active_note: Option<String>,
    /// When the active note was last activated
    #[serde(default)]
    pub activated_at: Option<DateTime<Utc>>,
    /// Width most recently applied to the active note
    #[serde(default)]
    pub last_width: Option<Width>,
}

impl SessionState {
    /// Record `note` as the active note.
    pub fn activate(&mut self, note: &str, now: DateTime<Utc>) {
        self.active_note = Some(note.to_string());
        self.activated_at = Some(now);
        self.last_width = None;
    }

    pub fn clear(&mut self) {
        *self = SessionState::default();
    }
}

/// Read .state.json from the data directory
pub fn read_session_state(data_dir: &Path) -> Option<SessionState> {
    let path = data_dir.join(STATE_FILE);
    let content = fs::read_to_string(&path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Write .state.json to the data directory
pub fn write_session_state(data_dir: &Path, state: &SessionState) -> Result<(), std::io::Error> {
    let path = data_dir.join(STATE_FILE);
    let content = serde_json::to_string_pretty(state)?;
    fs::write(&path, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn write_and_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut state = SessionState::default();
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap();
        state.activate("daily/2025-03-14.md", at);
        state.last_width = Some(Width::clamped(64));

        write_session_state(dir.path(), &state).unwrap();
        let loaded = read_session_state(dir.path()).unwrap();

        assert_eq!(loaded.active_note.as_deref(), Some("daily/2025-03-14.md"));
        assert_eq!(loaded.activated_at, Some(at));
        assert_eq!(loaded.last_width, Some(Width::clamped(64)));
    }

    #[test]
    fn activate_resets_last_width() {
        let mut state = SessionState {
            last_width: Some(Width::clamped(10)),
            ..Default::default()
        };
        state.activate("a.md", Utc::now());
        assert!(state.last_width.is_none());
        state.clear();
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn read_missing_file_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_session_state(dir.path()).is_none());
    }

    #[test]
    fn read_malformed_json_returns_none() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(STATE_FILE), "not json {{{").unwrap();
        assert!(read_session_state(dir.path()).is_none());
    }

    #[test]
    fn serde_defaults_on_empty_object() {
        let state: SessionState = serde_json::from_str("{}").unwrap();
        assert!(state.active_note.is_none());
        assert!(state.activated_at.is_none());
    }
}
