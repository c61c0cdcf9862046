use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use crate::io::settings_io;
use crate::model::note::Note;
use crate::model::vault::Vault;

/// Name of the per-vault data directory.
pub const DATA_DIR: &str = ".notewidth";

/// Error type for vault I/O operations
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("not a notewidth vault: no .notewidth/ directory found (run `nw init`)")]
    NotAVault,
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse settings.toml: {0}")]
    SettingsParseError(#[from] toml::de::Error),
    #[error("could not edit settings.toml: {0}")]
    SettingsEditError(#[from] toml_edit::TomlError),
    #[error("unknown setting: {0}")]
    UnknownSetting(String),
    #[error("invalid value for {key}: {value}")]
    InvalidSettingValue { key: String, value: String },
    #[error("{0} is not a markdown note inside the vault")]
    NotANote(PathBuf),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Discover the vault by walking up from the given directory, looking for a
/// `.notewidth/` subdirectory.
pub fn discover_vault(start: &Path) -> Result<PathBuf, VaultError> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(DATA_DIR).is_dir() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(VaultError::NotAVault);
        }
    }
}

/// Load the vault rooted at `root`.
pub fn load_vault(root: &Path) -> Result<Vault, VaultError> {
    let data_dir = root.join(DATA_DIR);
    if !data_dir.is_dir() {
        return Err(VaultError::NotAVault);
    }
    let (settings, _doc) = settings_io::read_settings(&data_dir)?;
    Ok(Vault {
        root: root.to_path_buf(),
        data_dir,
        settings,
    })
}

/// All markdown notes under `root`, relative to it, sorted.
///
/// Hidden directories (the data directory, `.git`, editor config) are skipped.
pub fn list_notes(root: &Path) -> Result<Vec<PathBuf>, VaultError> {
    let mut notes = Vec::new();
    collect_notes(root, root, &mut notes)?;
    notes.sort();
    Ok(notes)
}

fn collect_notes(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), VaultError> {
    let entries = fs::read_dir(dir).map_err(|e| VaultError::ReadError {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let hidden = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'));
        if hidden {
            continue;
        }
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_notes(root, &path, out)?;
        } else if is_markdown(&path)
            && let Ok(rel) = path.strip_prefix(root)
        {
            out.push(rel.to_path_buf());
        }
    }
    Ok(())
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

/// Turn a user-supplied note path into a path relative to the vault root.
///
/// Accepts absolute paths, paths relative to `cwd`, and paths relative to
/// the vault root. The note must be a `.md` file inside the vault.
pub fn resolve_note_path(root: &Path, cwd: &Path, arg: &str) -> Result<PathBuf, VaultError> {
    let given = Path::new(arg);
    let candidates = if given.is_absolute() {
        vec![given.to_path_buf()]
    } else {
        vec![cwd.join(given), root.join(given)]
    };

    for candidate in candidates {
        let normalized = normalize(&candidate);
        if let Ok(rel) = normalized.strip_prefix(root)
            && is_markdown(rel)
            && normalized.is_file()
        {
            return Ok(rel.to_path_buf());
        }
    }
    Err(VaultError::NotANote(given.to_path_buf()))
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Read a note by its vault-relative path.
pub fn read_note(root: &Path, rel: &Path) -> Result<Note, VaultError> {
    let path = root.join(rel);
    let content = fs::read_to_string(&path).map_err(|e| VaultError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    Ok(Note::new(rel, content))
}

/// Write a note back if its front-matter changed. Returns whether it wrote.
pub fn save_note(root: &Path, note: &mut Note) -> Result<bool, VaultError> {
    if !note.is_modified() {
        return Ok(false);
    }
    let path = root.join(note.path());
    atomic_write(&path, note.content().as_bytes()).map_err(|e| VaultError::WriteError {
        path: path.clone(),
        source: e,
    })?;
    note.mark_saved();
    Ok(true)
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
