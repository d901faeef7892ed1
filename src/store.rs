//! GPX file store.
//!
//! Files are written with create-new semantics: an existing file with the
//! same name is left untouched and reported as skipped.

use log::debug;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{DownloaderError, Result};

pub const DEFAULT_OUTPUT_DIR: &str = "./gpx_files";

/// Result of a single write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(PathBuf),
    /// A file with that name already existed
    Skipped(PathBuf),
}

/// Output directory for GPX files.
#[derive(Debug, Clone)]
pub struct GpxStore {
    dir: PathBuf,
}

impl GpxStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Write `data` to `file_name`, creating the directory if needed.
    pub fn write(&self, file_name: &str, data: &[u8]) -> Result<WriteOutcome> {
        fs::create_dir_all(&self.dir).map_err(|source| DownloaderError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(file_name);
        debug!("[GpxStore] Writing file {}", path.display());

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("[GpxStore] File {} already exists, skipping it", path.display());
                return Ok(WriteOutcome::Skipped(path));
            }
            Err(source) => return Err(DownloaderError::Io { path, source }),
        };

        file.write_all(data)
            .map_err(|source| DownloaderError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(WriteOutcome::Written(path))
    }
}

impl Default for GpxStore {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = GpxStore::new(tmp.path().join("nested/gpx"));

        let outcome = store.write("a.gpx", b"<gpx/>").unwrap();
        let path = store.path_for("a.gpx");
        assert_eq!(outcome, WriteOutcome::Written(path.clone()));
        assert_eq!(fs::read(path).unwrap(), b"<gpx/>");
    }

    #[test]
    fn test_existing_file_is_skipped_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let store = GpxStore::new(tmp.path());
        store.write("a.gpx", b"first").unwrap();

        let outcome = store.write("a.gpx", b"second").unwrap();
        assert!(matches!(outcome, WriteOutcome::Skipped(_)));
        assert_eq!(fs::read(store.path_for("a.gpx")).unwrap(), b"first");
    }
}
