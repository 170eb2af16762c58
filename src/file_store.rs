//! Raw filesystem primitive backing the disk tier.
//!
//! Freshness needs creation time; LRU eviction needs last-access time.
//! `std::fs` does not expose creation time portably, so we freeze the
//! insertion instant into the file's mtime at write time and never
//! touch it again. Live access order is tracked separately in a
//! per-file `.atime` sidecar, written synchronously alongside the
//! entry it tracks.

use crate::error::Result;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub(crate) struct FileInfo {
    pub path: PathBuf,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
}

pub(crate) struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes via a temp file and rename so a crash mid-write never
    /// leaves a half-written entry visible under its final name.
    pub fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        self.touch_atime(path)?;
        Ok(())
    }

    pub fn read(&self, path: &Path) -> Result<Bytes> {
        Ok(Bytes::from(fs::read(path)?))
    }

    pub fn delete(&self, path: &Path) -> Result<()> {
        let _ = fs::remove_file(self.atime_path(path));
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn stat(&self, path: &Path) -> Result<Option<FileInfo>> {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let created_at: DateTime<Utc> = meta.modified()?.into();
        let accessed_at = self.read_atime(path).unwrap_or(created_at);
        Ok(Some(FileInfo {
            path: path.to_path_buf(),
            size: meta.len(),
            created_at,
            accessed_at,
        }))
    }

    pub fn touch_atime(&self, path: &Path) -> Result<()> {
        fs::write(self.atime_path(path), Utc::now().to_rfc3339())?;
        Ok(())
    }

    fn read_atime(&self, path: &Path) -> Option<DateTime<Utc>> {
        let raw = fs::read_to_string(self.atime_path(path)).ok()?;
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn atime_path(&self, path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        path.with_file_name(format!(".{name}.atime"))
    }

    /// Lists every stored entry, skipping sidecar and temp files.
    pub fn enumerate(&self) -> Result<Vec<FileInfo>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with('.') || name.ends_with(".tmp") {
                continue;
            }
            if let Some(info) = self.stat(&path)? {
                out.push(info);
            }
        }
        Ok(out)
    }

    pub fn clear(&self) -> Result<()> {
        fs::remove_dir_all(&self.root)?;
        fs::create_dir_all(&self.root)?;
        Ok(())
    }
}
