use serde::Serialize;

use crate::model::settings::{Settings, SourceKind};
use crate::model::width::Width;
use crate::ops::bulk::BulkReport;
use crate::ops::check::{CheckError, CheckResult, CheckWarning};
use crate::ops::resolver::{Action, Origin, Resolution};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ResolutionJson<'a> {
    pub note: String,
    #[serde(flatten)]
    pub resolution: &'a Resolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

#[derive(Serialize)]
pub struct SourceJson {
    pub source: SourceKind,
    pub priority: usize,
    pub enabled: bool,
    pub label: &'static str,
}

#[derive(Serialize)]
pub struct StatusJson {
    pub active_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_width: Option<Width>,
    pub width_percentage: Width,
    pub default_note_width: Width,
    pub yaml_key: String,
    pub sources: Vec<SourceJson>,
    pub records: usize,
    pub database_writable: bool,
}

#[derive(Serialize)]
pub struct WidthJson {
    pub width: Width,
}

#[derive(Serialize)]
pub struct PruneJson<'a> {
    #[serde(flatten)]
    pub check: &'a CheckResult,
    pub pruned: usize,
}

pub fn source_list(settings: &Settings) -> Vec<SourceJson> {
    settings
        .priority_list
        .iter()
        .enumerate()
        .map(|(i, kind)| SourceJson {
            source: kind,
            priority: i + 1,
            enabled: settings.is_enabled(kind),
            label: kind.label(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

fn origin_text(origin: Origin) -> &'static str {
    match origin {
        Origin::Ambient => "global width",
        Origin::Default => "default note width",
        Origin::Saved => "saved note width",
        Origin::Yaml => "front-matter width",
        Origin::Live => "set by you",
    }
}

pub fn format_action(action: &Action) -> String {
    match action {
        Action::RemovedFrontMatter { id } => {
            format!("removed front-matter holding dangling noteID {}", id)
        }
        Action::RemovedNoteId { id } => format!("removed dangling noteID {}", id),
        Action::Bound { source } => format!("created {}", source_noun(*source)),
        Action::Updated { source } => format!("updated {}", source_noun(*source)),
        Action::Normalized { source } => format!("normalized {}", source_noun(*source)),
    }
}

fn source_noun(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::SavedNoteWidth => "saved width record",
        SourceKind::YamlNoteWidth => "front-matter width",
    }
}

pub fn format_resolution(note: &str, resolution: &Resolution, style: Option<&str>) -> String {
    let mut lines = vec![format!(
        "{}: {}% ({})",
        note,
        resolution.width,
        origin_text(resolution.origin)
    )];
    for action in &resolution.actions {
        lines.push(format!("  {}", format_action(action)));
    }
    if let Some(rule) = style {
        lines.push(rule.to_string());
    }
    lines.join("\n")
}

pub fn format_status(status: &StatusJson) -> String {
    let mut lines = Vec::new();
    match &status.active_note {
        Some(note) => match status.last_width {
            Some(width) => lines.push(format!("active note: {} ({}%)", note, width)),
            None => lines.push(format!("active note: {}", note)),
        },
        None => lines.push("active note: none".to_string()),
    }
    lines.push(format!("width: {}%", status.width_percentage));
    lines.push(format!("default note width: {}%", status.default_note_width));
    lines.push(format!("front-matter key: {}", status.yaml_key));
    lines.push("sources:".to_string());
    for source in &status.sources {
        lines.push(format!(
            "  {}. {} [{}]",
            source.priority,
            source.label,
            if source.enabled { "on" } else { "off" }
        ));
    }
    let db = if status.database_writable {
        String::new()
    } else {
        " (read-only: database could not be loaded)".to_string()
    };
    lines.push(format!("saved widths: {}{}", status.records, db));
    lines.join("\n")
}

pub fn format_bulk(report: &BulkReport, width: Width) -> String {
    let mut text = format!(
        "set {} note(s) and {} record(s) to {}%",
        report.changed.len(),
        report.records_updated,
        width
    );
    if report.cancelled {
        text.push_str(&format!(
            " (cancelled after {} of {} notes)",
            report.visited, report.total
        ));
    }
    for note in &report.skipped {
        text.push_str(&format!("\n  skipped {} (could not read or write it)", note.display()));
    }
    text
}

pub fn format_check(result: &CheckResult) -> String {
    let mut lines = Vec::new();
    for error in &result.errors {
        let line = match error {
            CheckError::DanglingNoteId { note, id } => {
                format!("error: {}: noteID {} has no saved width", note.display(), id)
            }
            CheckError::InvalidFrontMatter { note, message } => {
                format!("error: {}: {}", note.display(), message)
            }
            CheckError::MalformedWidth { note, key } => {
                format!("error: {}: {} is not a number", note.display(), key)
            }
        };
        lines.push(line);
    }
    for warning in &result.warnings {
        let line = match warning {
            CheckWarning::OrphanedRecord { id, width } => {
                format!("warning: record {} ({}%) is not linked from any note", id, width)
            }
            CheckWarning::SharedNoteId { id, notes } => {
                let names: Vec<String> = notes.iter().map(|n| n.display().to_string()).collect();
                format!("warning: noteID {} is shared by {}", id, names.join(", "))
            }
            CheckWarning::NonCanonicalWidth { note, key } => {
                format!("warning: {}: {} will be rewritten as a whole percent", note.display(), key)
            }
        };
        lines.push(line);
    }
    if result.valid {
        lines.push("✓ vault is valid".to_string());
    } else {
        lines.push("✗ vault has errors".to_string());
    }
    lines.join("\n")
}
