//! Per-machine persisted state.
//!
//! Each machine exclusively owns a data directory that outlives the
//! process. The core stores the provider-assigned machine ID there as a
//! single-line file and recognizes a well-known credential file that
//! overrides every other credential source.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// File under the data directory holding the persisted machine ID.
const ID_FILE: &str = "id";

/// Well-known credential file under the data directory.
const PRIVATE_KEY_FILE: &str = "private_key";

/// Handle to a machine's data directory.
#[derive(Debug, Clone)]
pub struct MachineData {
    dir: PathBuf,
}

impl MachineData {
    /// Wraps a data directory. The directory is created lazily on first
    /// write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The data directory path.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads the persisted machine ID.
    ///
    /// An empty or missing file means no ID.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the file exists but cannot be read.
    pub fn read_id(&self) -> Result<Option<String>> {
        let path = self.dir.join(ID_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => {
                let id = content.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CoreError::Persistence { path, source }),
        }
    }

    /// Writes the persisted machine ID.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the directory or file cannot be
    /// written; the caller must not treat a failed write as success.
    pub fn write_id(&self, id: &str) -> Result<()> {
        let path = self.dir.join(ID_FILE);
        fs::create_dir_all(&self.dir).map_err(|source| CoreError::Persistence {
            path: self.dir.clone(),
            source,
        })?;
        fs::write(&path, id).map_err(|source| CoreError::Persistence { path: path.clone(), source })?;
        tracing::debug!(path = %path.display(), "persisted machine id");
        Ok(())
    }

    /// Clears the persisted machine ID.
    ///
    /// Clearing an already-absent ID is not an error.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the file exists but cannot be
    /// removed.
    pub fn clear_id(&self) -> Result<()> {
        let path = self.dir.join(ID_FILE);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "cleared machine id");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CoreError::Persistence { path, source }),
        }
    }

    /// Path of the credential override file, when present.
    #[must_use]
    pub fn private_key_override(&self) -> Option<PathBuf> {
        let path = self.dir.join(PRIVATE_KEY_FILE);
        path.is_file().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn id_round_trips() {
        let temp = TempDir::new().unwrap();
        let data = MachineData::new(temp.path());

        assert_eq!(data.read_id().unwrap(), None);
        data.write_id("i-0123").unwrap();
        assert_eq!(data.read_id().unwrap(), Some("i-0123".to_string()));
    }

    #[test]
    fn empty_file_means_no_id() {
        let temp = TempDir::new().unwrap();
        let data = MachineData::new(temp.path());

        fs::write(temp.path().join("id"), "\n").unwrap();
        assert_eq!(data.read_id().unwrap(), None);
    }

    #[test]
    fn clear_removes_the_id() {
        let temp = TempDir::new().unwrap();
        let data = MachineData::new(temp.path());

        data.write_id("i-0123").unwrap();
        data.clear_id().unwrap();
        assert_eq!(data.read_id().unwrap(), None);

        // Clearing twice is fine.
        data.clear_id().unwrap();
    }

    #[test]
    fn write_creates_missing_directory() {
        let temp = TempDir::new().unwrap();
        let data = MachineData::new(temp.path().join("machines").join("web"));

        data.write_id("i-0123").unwrap();
        assert_eq!(data.read_id().unwrap(), Some("i-0123".to_string()));
    }

    #[test]
    fn detects_credential_override() {
        let temp = TempDir::new().unwrap();
        let data = MachineData::new(temp.path());

        assert_eq!(data.private_key_override(), None);
        fs::write(temp.path().join("private_key"), "key material").unwrap();
        assert_eq!(
            data.private_key_override(),
            Some(temp.path().join("private_key"))
        );
    }
}
