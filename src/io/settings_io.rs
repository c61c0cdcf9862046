use std::fs;
use std::path::Path;

use toml_edit::{DocumentMut, Item, value};

use crate::io::vault_io::VaultError;
use crate::model::settings::{PriorityList, Settings, SourceKind};
use crate::model::width::Width;

/// Settings file name inside the data directory.
pub const SETTINGS_FILE: &str = "settings.toml";

/// Read the settings, returning both the parsed settings and the raw
/// toml_edit document for round-trip-safe editing.
///
/// A missing file yields the defaults and an empty document.
pub fn read_settings(data_dir: &Path) -> Result<(Settings, DocumentMut), VaultError> {
    let path = data_dir.join(SETTINGS_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(VaultError::ReadError { path, source: e }),
    };
    let settings: Settings = toml::from_str(&text)?;
    let doc: DocumentMut = text.parse()?;
    Ok((settings, doc))
}

/// Write the settings document back to disk, preserving formatting.
pub fn write_settings(data_dir: &Path, doc: &DocumentMut) -> Result<(), VaultError> {
    let path = data_dir.join(SETTINGS_FILE);
    fs::write(&path, doc.to_string()).map_err(|e| VaultError::WriteError { path, source: e })
}

pub fn set_width_percentage(doc: &mut DocumentMut, width: Width) {
    doc["width_percentage"] = value(i64::from(width));
}

pub fn set_default_note_width(doc: &mut DocumentMut, width: Width) {
    doc["default_note_width"] = value(i64::from(width));
}

pub fn set_yaml_key(doc: &mut DocumentMut, key: &str) {
    doc["yaml_key"] = value(key);
}

pub fn set_priority_list(doc: &mut DocumentMut, list: &PriorityList) {
    let mut array = toml_edit::Array::new();
    for kind in list.iter() {
        array.push(kind.tag());
    }
    doc["priority_list"] = value(array);
}

/// Current value of a setting, rendered as TOML.
pub fn get_setting(settings: &Settings, key: &str) -> Result<String, VaultError> {
    let table = toml::Table::try_from(settings)
        .map_err(|_| VaultError::UnknownSetting(key.to_string()))?;
    table
        .get(key)
        .map(|v| v.to_string())
        .ok_or_else(|| VaultError::UnknownSetting(key.to_string()))
}

/// Set one setting from command-line text.
///
/// The value is typed after the setting's default (integer, bool, string, or
/// the priority list as comma-separated source names). The edited document
/// must still parse as valid settings; the parsed result is returned.
pub fn set_setting(doc: &mut DocumentMut, key: &str, raw: &str) -> Result<Settings, VaultError> {
    let defaults = toml::Table::try_from(Settings::default())
        .map_err(|_| VaultError::UnknownSetting(key.to_string()))?;
    let invalid = || VaultError::InvalidSettingValue {
        key: key.to_string(),
        value: raw.to_string(),
    };

    let item: Item = match defaults.get(key) {
        None => return Err(VaultError::UnknownSetting(key.to_string())),
        Some(toml::Value::Integer(_)) => value(raw.trim().parse::<i64>().map_err(|_| invalid())?),
        Some(toml::Value::Boolean(_)) => value(parse_bool(raw).ok_or_else(invalid)?),
        Some(toml::Value::String(_)) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(invalid());
            }
            value(trimmed)
        }
        Some(toml::Value::Array(_)) => {
            let kinds: Vec<SourceKind> = raw
                .split(',')
                .map(SourceKind::parse_source)
                .collect::<Option<_>>()
                .ok_or_else(invalid)?;
            let list = PriorityList::try_from(kinds).map_err(|_| invalid())?;
            set_priority_list(doc, &list);
            return toml::from_str(&doc.to_string()).map_err(VaultError::from);
        }
        Some(_) => return Err(invalid()),
    };

    doc[key] = item;
    toml::from_str(&doc.to_string()).map_err(VaultError::from)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}
