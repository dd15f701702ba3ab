//! Filesystem-backed object store: `<root>/<bucket>/<key>`.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{IngestError, Result};

use super::ObjectStore;

/// Stores each object as a file under a root directory, one directory per
/// bucket. Keys may contain `/`, which maps to subdirectories.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a bucket and key onto a path, rejecting anything that could
    /// escape the bucket directory.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        check_segment(bucket, bucket)?;
        if bucket.contains('/') {
            return Err(IngestError::InvalidKey {
                key: bucket.to_string(),
                reason: "slash in bucket name".to_string(),
            });
        }
        let mut path = self.root.join(bucket);
        for segment in key.split('/') {
            check_segment(key, segment)?;
            path.push(segment);
        }
        Ok(path)
    }
}

fn check_segment(key: &str, segment: &str) -> Result<()> {
    let reason = if segment.is_empty() {
        "empty path segment"
    } else if segment == "." || segment == ".." {
        "relative path segment"
    } else if segment.contains(['\\', '\0']) {
        "backslash or NUL in key"
    } else {
        return Ok(());
    };
    Err(IngestError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    })
}

impl ObjectStore for FsObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        debug!(path = %path.display(), "Reading object");
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IngestError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                IngestError::io(&path, e)
            }
        })
    }

    fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        write_atomic(&path, data)?;
        debug!(path = %path.display(), size = data.len(), "Wrote object");
        Ok(())
    }
}

/// Write `data` to a temp file next to `path`, sync it and rename it into
/// place. Readers see the old content or the new, never a partial file.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| IngestError::InvalidKey {
        key: path.display().to_string(),
        reason: "no parent directory".to_string(),
    })?;
    std::fs::create_dir_all(parent).map_err(|e| IngestError::io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| IngestError::io(parent, e))?;
    tmp.write_all(data)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| IngestError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| IngestError::io(path, e.error))?;
    Ok(())
}
