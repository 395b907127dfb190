//! Classification of the lines grive prints during a sync run
//!
//! Two independent extractors: [`parse_entity`] picks the item a line talks
//! about, [`parse_status`] maps the trailing status phrase onto a change.
//! Lines that match neither are simply not interesting.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Whether grive reported a file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    File,
    Folder,
}

/// What happened to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Created => "Created",
            ChangeKind::Modified => "Modified",
            ChangeKind::Deleted => "Deleted",
        };
        f.write_str(s)
    }
}

/// An item named by a `file "…"`, `folder "…"` or `sync "…"` line.
///
/// `sync` lines do not say whether the item is a file or a folder, so
/// `kind` is `None` for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub kind: Option<EntityKind>,
    pub path: String,
}

/// Outcome of a recognised status phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    InSync,
    Changed(ChangeKind),
}

impl SyncStatus {
    /// The change carried by this status, `None` when already in sync
    pub fn change(self) -> Option<ChangeKind> {
        match self {
            SyncStatus::InSync => None,
            SyncStatus::Changed(change) => Some(change),
        }
    }
}

/// The closed set of phrases grive uses to report per-item status
pub const STATUS_PHRASES: [(&str, SyncStatus); 7] = [
    ("already in sync", SyncStatus::InSync),
    (
        "doesn't exist in server, uploading",
        SyncStatus::Changed(ChangeKind::Created),
    ),
    (
        "created in remote. creating local",
        SyncStatus::Changed(ChangeKind::Created),
    ),
    (
        "changed in local. uploading",
        SyncStatus::Changed(ChangeKind::Modified),
    ),
    (
        "changed in remote. downloading",
        SyncStatus::Changed(ChangeKind::Modified),
    ),
    (
        "deleted in remote. deleting local",
        SyncStatus::Changed(ChangeKind::Deleted),
    ),
    (
        "deleted in local. deleting remote",
        SyncStatus::Changed(ChangeKind::Deleted),
    ),
];

const ENTITY_PATTERN: &str =
    r#"(?P<kind>f(?:ile|older)) "(?:\./)?(?P<path>.+)"|sync "(?:\./)?(?P<local>.+)""#;

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(ENTITY_PATTERN).expect("entity pattern is valid"))
}

/// Extract the entity declared on a line, if any
pub fn parse_entity(line: &str) -> Option<Entity> {
    let caps = entity_pattern().captures(line)?;

    if let Some(path) = caps.name("path") {
        let kind = match caps.name("kind").map(|m| m.as_str()) {
            Some("folder") => EntityKind::Folder,
            _ => EntityKind::File,
        };
        return Some(Entity {
            kind: Some(kind),
            path: path.as_str().to_string(),
        });
    }

    caps.name("local").map(|local| Entity {
        kind: None,
        path: local.as_str().to_string(),
    })
}

/// Match the status phrase a line ends with, if any
pub fn parse_status(line: &str) -> Option<SyncStatus> {
    let line = line.trim_end();
    STATUS_PHRASES
        .iter()
        .find(|(phrase, _)| line.ends_with(phrase))
        .map(|(_, status)| *status)
}

/// Change reported by a line; `None` both for "already in sync" and for
/// lines carrying no status at all
pub fn change_kind(line: &str) -> Option<ChangeKind> {
    parse_status(line).and_then(SyncStatus::change)
}

/// One change reported during a sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncEvent {
    pub kind: Option<EntityKind>,
    pub path: String,
    pub change: ChangeKind,
}

impl SyncEvent {
    /// Build an event from a single line carrying both an entity and a
    /// change. Nothing is carried over from earlier lines.
    pub fn from_line(line: &str) -> Option<Self> {
        let change = change_kind(line)?;
        let entity = parse_entity(line)?;
        Some(Self {
            kind: entity.kind,
            path: entity.path,
            change,
        })
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Some(EntityKind::Folder) => write!(f, "{}: {}/", self.change, self.path),
            _ => write!(f, "{}: {}", self.change, self.path),
        }
    }
}
