//! Atomic file replacement for build artifacts.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{FrontendError, Result};

/// Replace `path` with `data`: write a temp file in the same directory, then rename.
///
/// Missing parent directories are created. Readers never observe a partial file.
pub async fn write_atomic(path: &Path, data: Vec<u8>) -> Result<()> {
    let path = path.to_path_buf();
    let target = path.clone();
    tokio::task::spawn_blocking(move || persist(&target, &data))
        .await
        .map_err(|e| FrontendError::io(&path, std::io::Error::other(e)))?
        .map_err(|source| FrontendError::io(&path, source))
}

/// Serialize `value` as JSON (4-space indented when `pretty`) and write it atomically.
pub async fn write_representation<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    pretty: bool,
) -> Result<()> {
    let data = if pretty {
        to_indented_json(value)
    } else {
        serde_json::to_vec(value)
    }
    .map_err(|e| FrontendError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    write_atomic(path, data).await
}

fn to_indented_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    Ok(out)
}

fn persist(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
