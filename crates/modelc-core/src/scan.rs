//! Recursive source-tree scanning.
//!
//! Paths are reported relative to the scanned root with `/` separators.
//! Sibling files are read and subdirectories walked concurrently. Symlinked
//! files are read through; symlinked directories are skipped so a link cycle
//! cannot recurse forever.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;

use crate::error::{FrontendError, Result};

/// A regular file found under the root.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: String,
    pub bytes: Vec<u8>,
}

/// A file or directory under the root that could not be read.
#[derive(Debug)]
pub struct ScanError {
    pub path: String,
    pub source: io::Error,
}

impl ScanError {
    /// Whether `path` is this entry or lies beneath it.
    pub fn covers(&self, path: &str) -> bool {
        path == self.path
            || path
                .strip_prefix(self.path.as_str())
                .map(|rest| rest.starts_with('/'))
                .unwrap_or(false)
    }
}

#[derive(Debug, Default)]
pub struct ScanOutput {
    pub files: Vec<ScannedFile>,
    pub errors: Vec<ScanError>,
}

impl ScanOutput {
    fn merge(&mut self, other: ScanOutput) {
        self.files.extend(other.files);
        self.errors.extend(other.errors);
    }
}

enum EntryKind {
    File,
    Dir,
    Other,
}

/// Scan every regular file under `root`.
///
/// Fails only when `root` itself cannot be listed; anything below it that
/// cannot be read is reported in [`ScanOutput::errors`].
pub async fn scan(root: &Path) -> Result<ScanOutput> {
    let entries = list_dir(root)
        .await
        .map_err(|source| FrontendError::io(root, source))?;
    Ok(scan_entries(String::new(), entries).await)
}

fn scan_dir(dir: PathBuf, rel_dir: String) -> BoxFuture<'static, ScanOutput> {
    async move {
        match list_dir(&dir).await {
            Ok(entries) => scan_entries(rel_dir, entries).await,
            Err(source) => ScanOutput {
                files: Vec::new(),
                errors: vec![ScanError {
                    path: rel_dir,
                    source,
                }],
            },
        }
    }
    .boxed()
}

/// Keys are lossy UTF-8; all I/O goes through the entry's real path.
async fn scan_entries(rel_dir: String, entries: Vec<tokio::fs::DirEntry>) -> ScanOutput {
    let mut output = ScanOutput::default();
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    let mut dirs = Vec::new();

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel = if rel_dir.is_empty() {
            name
        } else {
            format!("{rel_dir}/{name}")
        };
        if !seen.insert(rel.clone()) {
            output.errors.push(ScanError {
                source: io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{:?} maps to the same path key as another entry", entry.path()),
                ),
                path: rel,
            });
            continue;
        }
        match entry_kind(&entry).await {
            Ok(EntryKind::File) => files.push((rel, entry.path())),
            Ok(EntryKind::Dir) => dirs.push((rel, entry.path())),
            Ok(EntryKind::Other) => {}
            Err(source) => output.errors.push(ScanError { path: rel, source }),
        }
    }

    let reads = join_all(files.into_iter().map(|(rel, path)| async move {
        let result = tokio::fs::read(&path).await;
        (rel, result)
    }));
    let nested = join_all(dirs.into_iter().map(|(rel, path)| scan_dir(path, rel)));
    let (reads, nested) = futures::join!(reads, nested);

    for (path, result) in reads {
        match result {
            Ok(bytes) => output.files.push(ScannedFile { path, bytes }),
            Err(source) => output.errors.push(ScanError { path, source }),
        }
    }
    for sub in nested {
        output.merge(sub);
    }
    output
}

async fn list_dir(dir: &Path) -> io::Result<Vec<tokio::fs::DirEntry>> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        entries.push(entry);
    }
    Ok(entries)
}

async fn entry_kind(entry: &tokio::fs::DirEntry) -> io::Result<EntryKind> {
    let file_type = entry.file_type().await?;
    if file_type.is_file() {
        return Ok(EntryKind::File);
    }
    if file_type.is_dir() {
        return Ok(EntryKind::Dir);
    }
    if file_type.is_symlink() {
        return match tokio::fs::metadata(entry.path()).await {
            Ok(meta) if meta.is_file() => Ok(EntryKind::File),
            Ok(_) => Ok(EntryKind::Other),
            // dangling link
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(EntryKind::Other),
            Err(e) => Err(e),
        };
    }
    Ok(EntryKind::Other)
}
