use serde::{Deserialize, Serialize};

use super::width::Width;

/// One row of the width database: a note identifier and its stored width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: String,
    pub width: Width,
}
