use std::fs;
use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::settings_io::{self, SETTINGS_FILE};
use crate::io::store::{DATABASE_FILENAME, WidthStore};
use crate::io::vault_io::DATA_DIR;

const SETTINGS_TEMPLATE: &str = r##"# --- Widths ---
# Percent of the editor the text column fills (0-100).
# width_percentage is the width last applied; default_note_width is used for
# notes that carry no width of their own.
width_percentage = 36
default_note_width = 36

# --- Sources ---
# A note can keep its width in the width database (linked by a noteID in its
# front-matter) and/or directly in a front-matter field.
enable_save_width_individually = true
enable_yaml_width = true

# Front-matter key holding an embedded width. Changing it with
# `nw config set yaml_key <new>` renames the key in every note.
yaml_key = "custom-width"

# Which source wins when a note has both. Reorder with `nw priority`.
priority_list = ["SAVED_NOTE_WIDTH", "YAML_NOTE_WIDTH"]

# --- Controls ---
enable_change_default_note_width = false
# enable_slider = true
# enable_text_input = true
# slider_width = 85
"##;

pub fn cmd_init(args: InitArgs, root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data_dir = root.join(DATA_DIR);

    if data_dir.exists() && !args.force {
        return Err(format!(
            "{}/ already exists (use --force to rewrite {})",
            DATA_DIR, SETTINGS_FILE
        )
        .into());
    }

    fs::create_dir_all(&data_dir)?;
    fs::write(data_dir.join(SETTINGS_FILE), SETTINGS_TEMPLATE)?;

    // Creates an empty database unless one is already there
    let store = WidthStore::open(&data_dir);
    store.close()?;

    // Catch a broken template before the user does
    settings_io::read_settings(&data_dir)?;

    println!(
        "initialized {}/ ({}, {})",
        DATA_DIR, SETTINGS_FILE, DATABASE_FILENAME
    );
    Ok(())
}
