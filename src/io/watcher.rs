use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::io::state::STATE_FILE;
use crate::io::vault_io::DATA_DIR;

/// Events sent from the file watcher to the `watch` loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEvent {
    /// Session state changed: another command may have switched the active note.
    SessionChanged,
    /// Settings changed on disk.
    SettingsChanged,
    /// One or more notes changed, vault-relative.
    NotesChanged(Vec<PathBuf>),
}

/// A file system watcher over a whole vault.
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<VaultEvent>,
}

impl VaultWatcher {
    /// Start watching the vault rooted at `root`.
    pub fn start(root: &Path) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let root_owned = root.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let Ok(event) = result else {
                    return;
                };
                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                    _ => return,
                }
                for vault_event in classify(&root_owned, event.paths) {
                    let _ = tx.send(vault_event);
                }
            },
            Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok(VaultWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Non-blocking poll for pending events.
    pub fn poll(&self) -> Vec<VaultEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }

    /// Wait up to `timeout` for the next event.
    pub fn wait(&self, timeout: Duration) -> Option<VaultEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Sort raw paths into vault events. The width database and the lock file
/// are written by this tool itself and never produce events.
fn classify(root: &Path, paths: Vec<PathBuf>) -> Vec<VaultEvent> {
    let data_dir = root.join(DATA_DIR);
    let mut events = Vec::new();
    let mut notes = Vec::new();

    for path in paths {
        if path.starts_with(&data_dir) {
            let event = match path.file_name().and_then(|n| n.to_str()) {
                Some(STATE_FILE) => VaultEvent::SessionChanged,
                Some("settings.toml") => VaultEvent::SettingsChanged,
                _ => continue,
            };
            if !events.contains(&event) {
                events.push(event);
            }
            continue;
        }
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        let hidden = rel.components().any(|c| {
            c.as_os_str()
                .to_str()
                .is_some_and(|name| name.starts_with('.'))
        });
        let markdown = rel.extension().and_then(|e| e.to_str()) == Some("md");
        if markdown && !hidden && !notes.contains(&rel.to_path_buf()) {
            notes.push(rel.to_path_buf());
        }
    }

    if !notes.is_empty() {
        events.push(VaultEvent::NotesChanged(notes));
    }
    events
}
