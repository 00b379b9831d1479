//! Content-hash based change detection.
//!
//! A detection pass classifies every path that is on disk now, or that has a
//! recorded hash from the previous build, as exactly one [`FileChange`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::error::{FrontendError, Result};
use crate::hash::ContentHash;
use crate::hash_state::HashState;
use crate::scan::{scan, ScanError, ScannedFile};

/// A source file's content and digest at one instant of a detection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSnapshot {
    pub path: String,
    pub content: String,
    pub hash: ContentHash,
}

impl SourceSnapshot {
    /// Hash the raw bytes; the content handed to the engine is decoded lossily.
    pub fn capture(file: ScannedFile) -> Self {
        let hash = ContentHash::compute(&file.bytes);
        let content = match String::from_utf8(file.bytes) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        SourceSnapshot {
            path: file.path,
            content,
            hash,
        }
    }
}

/// How one path changed relative to the recorded hash state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// On disk, no prior hash.
    Insert { content: String, hash: ContentHash },
    /// On disk, prior hash differs.
    Update { content: String, hash: ContentHash },
    /// On disk, prior hash matches.
    NoChange { content: String, hash: ContentHash },
    /// Prior hash recorded, no longer on disk.
    Delete,
}

impl FileChange {
    fn classify(snapshot: SourceSnapshot, prior: Option<&ContentHash>) -> Self {
        let SourceSnapshot { content, hash, .. } = snapshot;
        match prior {
            None => FileChange::Insert { content, hash },
            Some(p) if *p == hash => FileChange::NoChange { content, hash },
            Some(_) => FileChange::Update { content, hash },
        }
    }

    /// Current digest; `None` for deletions.
    pub fn hash(&self) -> Option<&ContentHash> {
        match self {
            FileChange::Insert { hash, .. }
            | FileChange::Update { hash, .. }
            | FileChange::NoChange { hash, .. } => Some(hash),
            FileChange::Delete => None,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            FileChange::Insert { content, .. }
            | FileChange::Update { content, .. }
            | FileChange::NoChange { content, .. } => Some(content),
            FileChange::Delete => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FileChange::Insert { .. } => "Insert",
            FileChange::Update { .. } => "Update",
            FileChange::NoChange { .. } => "NoChange",
            FileChange::Delete => "Delete",
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, FileChange::NoChange { .. })
    }
}

/// Per-kind counts of a change set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

impl ChangeSummary {
    pub fn has_any_change(&self) -> bool {
        self.inserted + self.updated + self.deleted > 0
    }

    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted + self.unchanged
    }
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inserted, {} updated, {} deleted, {} unchanged",
            self.inserted, self.updated, self.deleted, self.unchanged
        )
    }
}

/// Which entries [`ChangeSet::to_snapshot_map`] includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotScope {
    /// Inserted and updated files only.
    ChangedOnly,
    /// Every file currently on disk.
    FullTree,
}

/// Wire form of one incremental change.
///
/// Serializes as `["Insert", content]`, `["Update", content]` or `["Delete"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileDelta {
    Insert(String),
    Update(String),
    Delete,
}

impl Serialize for FileDelta {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FileDelta::Insert(content) | FileDelta::Update(content) => {
                let tag = if matches!(self, FileDelta::Insert(_)) {
                    "Insert"
                } else {
                    "Update"
                };
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(tag)?;
                seq.serialize_element(content)?;
                seq.end()
            }
            FileDelta::Delete => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element("Delete")?;
                seq.end()
            }
        }
    }
}

/// Result of one detection pass, keyed by root-relative path.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub changes: BTreeMap<String, FileChange>,
    /// Paths that exist but could not be read. Never inferred as deletions.
    pub unreadable: Vec<ScanError>,
}

impl ChangeSet {
    pub fn get(&self, path: &str) -> Option<&FileChange> {
        self.changes.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileChange)> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// The hash state to persist after a successful build.
    pub fn to_content_hashes(&self) -> HashState {
        self.changes
            .iter()
            .filter_map(|(path, change)| change.hash().map(|h| (path.clone(), h.clone())))
            .collect()
    }

    pub fn summary(&self) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        for change in self.changes.values() {
            match change {
                FileChange::Insert { .. } => summary.inserted += 1,
                FileChange::Update { .. } => summary.updated += 1,
                FileChange::NoChange { .. } => summary.unchanged += 1,
                FileChange::Delete => summary.deleted += 1,
            }
        }
        summary
    }

    pub fn has_any_change(&self) -> bool {
        self.changes.values().any(FileChange::is_change)
    }

    /// `{path: content}` for files on disk, as sent with a from-scratch build.
    pub fn to_snapshot_map(&self, scope: SnapshotScope) -> BTreeMap<String, String> {
        self.changes
            .iter()
            .filter_map(|(path, change)| match change {
                FileChange::Insert { content, .. } | FileChange::Update { content, .. } => {
                    Some((path.clone(), content.clone()))
                }
                FileChange::NoChange { content, .. } if scope == SnapshotScope::FullTree => {
                    Some((path.clone(), content.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Every non-`NoChange` entry in wire form, as sent with an incremental build.
    pub fn to_delta_map(&self) -> BTreeMap<String, FileDelta> {
        self.changes
            .iter()
            .filter_map(|(path, change)| {
                let delta = match change {
                    FileChange::Insert { content, .. } => FileDelta::Insert(content.clone()),
                    FileChange::Update { content, .. } => FileDelta::Update(content.clone()),
                    FileChange::Delete => FileDelta::Delete,
                    FileChange::NoChange { .. } => return None,
                };
                Some((path.clone(), delta))
            })
            .collect()
    }

    pub fn unreadable_paths(&self) -> Vec<String> {
        self.unreadable.iter().map(|e| e.path.clone()).collect()
    }
}

/// Classify every source file under `root` against `prior`.
///
/// A missing root means every recorded path was deleted. Nothing is written.
pub async fn detect(prior: &HashState, root: &Path) -> Result<ChangeSet> {
    let root_exists = tokio::fs::try_exists(root)
        .await
        .map_err(|source| FrontendError::io(root, source))?;

    let mut set = ChangeSet::default();
    if root_exists {
        let output = scan(root).await?;
        for file in output.files {
            let snapshot = SourceSnapshot::capture(file);
            let path = snapshot.path.clone();
            let change = FileChange::classify(snapshot, prior.get(&path));
            set.changes.insert(path, change);
        }
        set.unreadable = output.errors;
    } else {
        debug!(root = %root.display(), "source root missing");
    }

    for path in prior.paths() {
        if set.changes.contains_key(path) || set.unreadable.iter().any(|e| e.covers(path)) {
            continue;
        }
        set.changes.insert(path.clone(), FileChange::Delete);
    }

    Ok(set)
}
