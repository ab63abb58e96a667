//! JsonFileStore - the whole job set as one JSON file.
//!
//! Writes go to a temp file in the target directory which is then renamed
//! over the canonical path, so a reader sees either the old file or the new
//! one, never a torn write.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::domain::Job;
use crate::error::StoreError;
use crate::ports::DurableStore;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

impl DurableStore for JsonFileStore {
    fn load_all(&self) -> Result<Vec<Job>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save_all(&self, jobs: &[Job]) -> Result<(), StoreError> {
        let dir = self.dir();
        fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;

        let tmp = NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, jobs).map_err(StoreError::Encode)?;
            writer.flush().map_err(|e| self.io_error(e))?;
        }
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.io_error(e.error))?;
        Ok(())
    }
}
