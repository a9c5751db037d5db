//! The persisted document format.
//!
//! A saved file is a gzipped tar archive with two members: `todo.data`, the
//! JSON-encoded document body, and `version.data`, a bare schema version
//! string checked before the body is parsed. Task timestamps travel as
//! human-readable strings; due dates in particular carry either a full
//! date-time or a bare date depending on the task's `due_has_time` flag,
//! and the decoder accepts both forms and reconstructs the flag from
//! whichever parses.
//!
//! [`Document`] is the boundary type: [`crate::workspace::Workspace`]
//! produces and consumes it, this module gets it on and off disk.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Task, TaskRecord};
use crate::tree::TreePath;
use crate::{Error, Result};

/// Schema version written to (and required in) `version.data`.
pub const SCHEMA_VERSION: &str = "1.0";

const BODY_MEMBER: &str = "todo.data";
const VERSION_MEMBER: &str = "version.data";

/// Wire format for timestamps other than due dates.
const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Due date with a time of day.
const DUE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";
/// Due date without one.
const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// One list column's persisted visibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPref {
    /// Stable column identifier.
    pub id: String,
    pub visible: bool,
}

/// Persisted window layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub maximized: bool,
    /// Divider position between the task list and the notes pane.
    pub pane_position: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            width: 1100,
            height: 700,
            maximized: false,
            pane_position: 500,
        }
    }
}

/// The presentation half of a document: what the caller restores into its
/// view after a load. The selected path lives on the document itself since
/// it resolves against the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    /// Paths of rows that were expanded.
    pub expanded: Vec<TreePath>,
    pub columns: Vec<ColumnPref>,
    pub geometry: Geometry,
}

/// Everything one saved file contains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Schema version this document was written with.
    pub version: String,
    pub assigners: Vec<String>,
    pub assignees: Vec<String>,
    pub statuses: Vec<String>,
    /// Root task subtrees in display order.
    pub tasks: Vec<TaskRecord>,
    /// Display paths of expanded rows, as strings.
    pub expanded: Vec<String>,
    /// Display path of the selected row, if any.
    pub selected: Option<String>,
    pub columns: Vec<ColumnPref>,
    pub geometry: Geometry,
}

impl Document {
    /// Write the document as a gzipped tar stream.
    pub fn encode_to<W: Write>(&self, writer: W) -> Result<()> {
        let body = serde_json::to_vec_pretty(&RawDocument::from_document(self))?;

        let encoder = GzEncoder::new(writer, Compression::default());
        let mut archive = tar::Builder::new(encoder);
        append_member(&mut archive, BODY_MEMBER, &body)?;
        append_member(&mut archive, VERSION_MEMBER, SCHEMA_VERSION.as_bytes())?;
        archive.into_inner()?.finish()?;
        Ok(())
    }

    /// Read a document from a gzipped tar stream, checking the schema
    /// version before parsing the body.
    pub fn decode_from<R: Read>(reader: R) -> Result<Document> {
        let mut archive = tar::Archive::new(GzDecoder::new(reader));

        let mut body: Option<Vec<u8>> = None;
        let mut version: Option<String> = None;
        for entry in archive.entries()? {
            let mut entry = entry?;
            let name = entry
                .path()?
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match name.as_str() {
                BODY_MEMBER => {
                    let mut bytes = Vec::new();
                    entry.read_to_end(&mut bytes)?;
                    body = Some(bytes);
                }
                VERSION_MEMBER => {
                    let mut text = String::new();
                    entry.read_to_string(&mut text)?;
                    version = Some(text.trim().to_string());
                }
                other => debug!(member = other, "ignoring unknown archive member"),
            }
        }

        let version =
            version.ok_or_else(|| Error::Format(format!("missing {VERSION_MEMBER} member")))?;
        if version_exceeds(&version, SCHEMA_VERSION)? {
            return Err(Error::UnsupportedVersion {
                found: version,
                supported: SCHEMA_VERSION.to_string(),
            });
        }
        let body = body.ok_or_else(|| Error::Format(format!("missing {BODY_MEMBER} member")))?;

        let raw: RawDocument = serde_json::from_slice(&body)?;
        raw.into_document(version)
    }

    /// Save to a file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "saving document");
        self.encode_to(File::create(path)?)
    }

    /// Load from a file path.
    pub fn load(path: &Path) -> Result<Document> {
        debug!(path = %path.display(), "loading document");
        Self::decode_from(File::open(path)?)
    }
}

/// Whether `found` is a strictly newer dotted version than `supported`.
/// Older documents still decode (absent fields take their defaults); only
/// a version from a future writer is refused.
fn version_exceeds(found: &str, supported: &str) -> Result<bool> {
    let parse = |v: &str| -> Result<Vec<u64>> {
        v.split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| Error::Format(format!("bad version string {v:?}")))
            })
            .collect()
    };
    Ok(parse(found)? > parse(supported)?)
}

fn append_member<W: Write>(
    archive: &mut tar::Builder<W>,
    name: &str,
    bytes: &[u8],
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    archive.append_data(&mut header, name, bytes)?;
    Ok(())
}

// ----- wire structs ---------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct RawDocument {
    #[serde(default)]
    assigners: Vec<String>,
    #[serde(default)]
    assignees: Vec<String>,
    #[serde(default)]
    statuses: Vec<String>,
    #[serde(default)]
    tasks: Vec<RawTask>,
    #[serde(default)]
    expanded: Vec<String>,
    #[serde(default)]
    selected: Option<String>,
    #[serde(default)]
    columns: Vec<ColumnPref>,
    #[serde(default)]
    geometry: Geometry,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawTask {
    priority: u8,
    percent_complete: u8,
    estimated_seconds: u64,
    spent_seconds: u64,
    #[serde(default)]
    est_begin: Option<String>,
    #[serde(default)]
    est_complete: Option<String>,
    #[serde(default)]
    actual_begin: Option<String>,
    #[serde(default)]
    completed_at: Option<String>,
    #[serde(default)]
    due: Option<String>,
    #[serde(default)]
    assigner: String,
    #[serde(default)]
    assignee: String,
    #[serde(default)]
    status: String,
    title: String,
    #[serde(default)]
    notes: String,
    done: bool,
    #[serde(default)]
    children: Vec<RawTask>,
}

impl RawDocument {
    fn from_document(doc: &Document) -> Self {
        Self {
            assigners: doc.assigners.clone(),
            assignees: doc.assignees.clone(),
            statuses: doc.statuses.clone(),
            tasks: doc.tasks.iter().map(RawTask::from_record).collect(),
            expanded: doc.expanded.clone(),
            selected: doc.selected.clone(),
            columns: doc.columns.clone(),
            geometry: doc.geometry.clone(),
        }
    }

    fn into_document(self, version: String) -> Result<Document> {
        Ok(Document {
            version,
            assigners: self.assigners,
            assignees: self.assignees,
            statuses: self.statuses,
            tasks: self
                .tasks
                .iter()
                .map(RawTask::to_record)
                .collect::<Result<_>>()?,
            expanded: self.expanded,
            selected: self.selected,
            columns: self.columns,
            geometry: self.geometry,
        })
    }
}

impl RawTask {
    fn from_record(record: &TaskRecord) -> Self {
        let task = &record.task;
        Self {
            priority: task.priority,
            percent_complete: task.percent_complete,
            estimated_seconds: task.estimated_seconds,
            spent_seconds: task.spent_seconds,
            est_begin: task.est_begin.map(format_stamp),
            est_complete: task.est_complete.map(format_stamp),
            actual_begin: task.actual_begin.map(format_stamp),
            completed_at: task.completed_at.map(format_stamp),
            due: task.due_at.map(|d| format_due(d, task.due_has_time)),
            assigner: task.assigner.clone(),
            assignee: task.assignee.clone(),
            status: task.status.clone(),
            title: task.title.clone(),
            notes: task.notes.clone(),
            done: task.done,
            children: record.children.iter().map(Self::from_record).collect(),
        }
    }

    fn to_record(&self) -> Result<TaskRecord> {
        let (due_at, due_has_time) = match self.due.as_deref() {
            Some(s) => {
                let (at, has_time) = parse_due(s)?;
                (Some(at), has_time)
            }
            None => (None, false),
        };
        let task = Task {
            priority: self.priority,
            percent_complete: self.percent_complete,
            estimated_seconds: self.estimated_seconds,
            spent_seconds: self.spent_seconds,
            est_begin: parse_opt_stamp(self.est_begin.as_deref())?,
            est_complete: parse_opt_stamp(self.est_complete.as_deref())?,
            actual_begin: parse_opt_stamp(self.actual_begin.as_deref())?,
            completed_at: parse_opt_stamp(self.completed_at.as_deref())?,
            due_at,
            due_has_time,
            assigner: self.assigner.clone(),
            assignee: self.assignee.clone(),
            status: self.status.clone(),
            title: self.title.clone(),
            notes: self.notes.clone(),
            done: self.done,
            tracking_active: false,
        };
        Ok(TaskRecord {
            task,
            children: self
                .children
                .iter()
                .map(Self::to_record)
                .collect::<Result<_>>()?,
        })
    }
}

// ----- timestamp wire helpers -----------------------------------------------

fn format_stamp(at: DateTime<Utc>) -> String {
    at.format(STAMP_FORMAT).to_string()
}

fn parse_opt_stamp(text: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match text {
        Some(s) => {
            let naive = NaiveDateTime::parse_from_str(s, STAMP_FORMAT)
                .map_err(|e| Error::Format(format!("bad timestamp {s:?}: {e}")))?;
            Ok(Some(naive.and_utc()))
        }
        None => Ok(None),
    }
}

/// Format a due date per its time-of-day flag.
fn format_due(at: DateTime<Utc>, has_time: bool) -> String {
    let format = if has_time { DUE_TIME_FORMAT } else { DUE_DATE_FORMAT };
    at.format(format).to_string()
}

/// Parse a due date, reconstructing the time-of-day flag from whichever
/// form the string carries. Date-only values land at midnight.
fn parse_due(text: &str) -> Result<(DateTime<Utc>, bool)> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, DUE_TIME_FORMAT) {
        return Ok((naive.and_utc(), true));
    }
    let date = NaiveDate::parse_from_str(text, DUE_DATE_FORMAT)
        .map_err(|e| Error::Format(format!("bad due date {text:?}: {e}")))?;
    Ok((date.and_time(NaiveTime::MIN).and_utc(), false))
}
