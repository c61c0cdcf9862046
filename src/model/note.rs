use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::parse::frontmatter::{self, FrontMatterError};

/// Key-value access to a note's front-matter block.
///
/// Lookups never fail: a missing or unreadable block simply has no keys.
pub trait FrontMatter {
    /// True when the note starts with a non-empty front-matter block.
    fn has_front_matter(&self) -> bool;
    fn has_key(&self, key: &str) -> bool;
    fn get(&self, key: &str) -> Option<Value>;
    /// Insert or overwrite a key, creating the block if needed.
    ///
    /// Returns false when an existing block can't be parsed; the note is
    /// left untouched then.
    fn set(&mut self, key: &str, value: Value) -> bool;
    fn remove(&mut self, key: &str);
    /// Drop the whole block.
    fn remove_all(&mut self);
    /// True when `key` is present and is the block's only key.
    fn is_only_key(&self, key: &str) -> bool;
}

/// A markdown note held in memory while it is being resolved or edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    /// Path relative to the vault root
    path: PathBuf,
    content: String,
    modified: bool,
}

impl Note {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Note {
            path: path.into(),
            content: content.into(),
            modified: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether any front-matter write changed the content since loading.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    fn mapping(&self) -> Option<Mapping> {
        let block = frontmatter::split(&self.content)?;
        frontmatter::parse_mapping(block.yaml).ok()
    }

    /// Apply `edit` to the mapping and re-render the note.
    ///
    /// Unparsable front-matter is left untouched rather than overwritten.
    /// Returns whether the edit was applied.
    fn edit_mapping(&mut self, edit: impl FnOnce(&mut Mapping)) -> bool {
        let (mut mapping, body) = match frontmatter::split(&self.content) {
            Some(block) => match frontmatter::parse_mapping(block.yaml) {
                Ok(mapping) => (mapping, block.body),
                Err(e) => {
                    warn!(note = %self.path.display(), error = %e, "refusing to rewrite front-matter");
                    return false;
                }
            },
            None => (Mapping::new(), self.content.as_str()),
        };
        edit(&mut mapping);
        match frontmatter::render(&mapping, body) {
            Ok(rendered) => {
                self.replace_content(rendered);
                true
            }
            Err(e) => {
                warn!(note = %self.path.display(), error = %e, "could not render front-matter");
                false
            }
        }
    }

    fn replace_content(&mut self, content: String) {
        if content != self.content {
            self.content = content;
            self.modified = true;
        }
    }

    /// Validate the block without changing anything.
    pub fn check_front_matter(&self) -> Result<(), FrontMatterError> {
        match frontmatter::split(&self.content) {
            Some(block) => frontmatter::parse_mapping(block.yaml).map(|_| ()),
            None => Ok(()),
        }
    }
}

impl FrontMatter for Note {
    fn has_front_matter(&self) -> bool {
        frontmatter::split(&self.content).is_some_and(|block| !block.yaml.trim().is_empty())
    }

    fn has_key(&self, key: &str) -> bool {
        self.mapping().is_some_and(|m| m.contains_key(key))
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.mapping()?.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> bool {
        self.edit_mapping(|m| {
            m.insert(Value::String(key.to_string()), value);
        })
    }

    fn remove(&mut self, key: &str) {
        if !self.has_key(key) {
            return;
        }
        self.edit_mapping(|m| {
            m.shift_remove(key);
        });
    }

    fn remove_all(&mut self) {
        if frontmatter::split(&self.content).is_none() {
            return;
        }
        let stripped = frontmatter::strip(&self.content);
        self.replace_content(stripped);
    }

    fn is_only_key(&self, key: &str) -> bool {
        self.mapping()
            .is_some_and(|m| m.len() == 1 && m.contains_key(key))
    }
}
