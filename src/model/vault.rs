use std::path::{Path, PathBuf};

use super::settings::Settings;

/// A loaded vault: the note tree plus its `.notewidth/` data directory
#[derive(Debug)]
pub struct Vault {
    /// Root directory of the vault (parent of `.notewidth/`)
    pub root: PathBuf,
    /// Path to the `.notewidth/` directory
    pub data_dir: PathBuf,
    /// Parsed settings.toml, merged with defaults
    pub settings: Settings,
}

impl Vault {
    /// Path of a note given relative to the vault root
    pub fn note_path(&self, rel: &Path) -> PathBuf {
        self.root.join(rel)
    }
}
