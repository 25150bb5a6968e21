//! File access for scans and rule loading.
//!
//! Engines never touch the file system; everything path-based goes through
//! [`FileStore`], which turns paths into bytes or rule text and reports
//! missing, unreadable or oversized files as typed errors.

use crate::core::config::ScanConfig;
use crate::core::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Path-to-bytes collaborator with existence, permission and size checks.
#[derive(Debug, Clone)]
pub struct FileStore {
    max_file_size: u64,
    follow_symlinks: bool,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

impl FileStore {
    /// Create a file store with a size limit in bytes.
    pub fn new(max_file_size: u64) -> Self {
        Self {
            max_file_size,
            follow_symlinks: false,
        }
    }

    /// Create a file store from scan settings.
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            max_file_size: config.max_file_size_bytes(),
            follow_symlinks: config.follow_symlinks,
        }
    }

    /// Size limit in bytes.
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    fn exceeds_size_limit(&self, size: u64) -> bool {
        size > self.max_file_size
    }

    /// Check that `path` is an existing regular file within the size limit.
    fn check(&self, path: &Path) -> Result<u64> {
        let metadata = fs::metadata(path).map_err(|e| Error::file_read(path, e))?;

        if metadata.is_dir() {
            return Err(Error::NotSupported(format!(
                "{} is a directory",
                path.display()
            )));
        }

        let size = metadata.len();
        if self.exceeds_size_limit(size) {
            return Err(Error::FileTooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.max_file_size,
            });
        }

        Ok(size)
    }

    /// Read a file's bytes for scanning.
    pub fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let size = self.check(path)?;
        let data = fs::read(path).map_err(|e| Error::file_read(path, e))?;
        log::debug!("Read {} ({} bytes)", path.display(), size);
        Ok(data)
    }

    /// Read a rule file as text.
    pub fn read_rules(&self, path: &Path) -> Result<String> {
        self.check(path)?;
        fs::read_to_string(path).map_err(|e| Error::file_read(path, e))
    }

    /// Expand a path into the regular files beneath it.
    ///
    /// A file path yields itself. Entries that cannot be read while walking
    /// a directory are logged and skipped.
    pub fn collect_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if !path.exists() {
            return Err(Error::PathNotFound(path.to_path_buf()));
        }
        if !path.is_dir() {
            return Ok(vec![path.to_path_buf()]);
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(path)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Skipping unreadable entry under {}: {}", path.display(), e);
                    continue;
                }
            };

            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_read_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"sample bytes").unwrap();

        let store = FileStore::default();
        assert_eq!(store.read(file.path()).unwrap(), b"sample bytes".to_vec());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::default();
        let err = store.read(&dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, Error::PathNotFound(_)));
    }

    #[test]
    fn test_size_limit() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 64]).unwrap();

        let store = FileStore::new(32);
        let err = store.read(file.path()).unwrap_err();
        assert!(matches!(
            err,
            Error::FileTooLarge {
                size: 64,
                limit: 32,
                ..
            }
        ));

        assert!(FileStore::new(64).read(file.path()).is_ok());
    }

    #[test]
    fn test_directory_rejected() {
        let dir = tempdir().unwrap();
        let err = FileStore::default().read(dir.path()).unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }

    #[test]
    fn test_read_rules() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"rule A { condition: $a }").unwrap();
        let text = FileStore::default().read_rules(file.path()).unwrap();
        assert!(text.starts_with("rule A"));
    }

    #[test]
    fn test_collect_files() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("nested").join("a.txt"), b"a").unwrap();

        let store = FileStore::default();
        let files = store.collect_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.is_file()));

        let single = dir.path().join("b.txt");
        assert_eq!(store.collect_files(&single).unwrap(), vec![single.clone()]);

        assert!(matches!(
            store.collect_files(&dir.path().join("missing")),
            Err(Error::PathNotFound(_))
        ));
    }
}
