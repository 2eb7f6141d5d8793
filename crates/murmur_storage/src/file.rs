//! File-based storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A journal file on local disk.
///
/// - `flush()` pushes data to the OS
/// - `sync()` calls `File::sync_all()` so data survives power loss
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    inner: Mutex<FileState>,
}

#[derive(Debug)]
struct FileState {
    file: File,
    size: u64,
}

impl FileBackend {
    /// Opens or creates the file at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] if the location cannot be
    /// created or opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::unavailable(parent, e.to_string()))?;
        }
        Self::open_with(path, true)
    }

    /// Opens an existing file without creating anything.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] if the file does not exist.
    pub fn open_existing(path: &Path) -> StorageResult<Self> {
        Self::open_with(path, false)
    }

    fn open_with(path: &Path, create: bool) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .truncate(false)
            .open(path)
            .map_err(|e| StorageError::unavailable(path, e.to_string()))?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(FileState { file, size }),
        })
    }

    /// Returns the path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut state = self.inner.lock();
        let size = state.size;
        let end = offset.saturating_add(len as u64);
        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        state.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        state.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let state = self.inner.get_mut();
        let offset = state.size;
        if data.is_empty() {
            return Ok(offset);
        }

        state.file.seek(SeekFrom::End(0))?;
        state.file.write_all(data)?;
        state.size += data.len() as u64;
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.inner.get_mut().file.flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.inner.lock().size)
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.inner.get_mut().file.sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let state = self.inner.get_mut();
        if new_size > state.size {
            return Err(StorageError::InvalidTruncate {
                requested: new_size,
                size: state.size,
            });
        }
        state.file.set_len(new_size)?;
        state.file.sync_all()?;
        state.size = new_size;
        Ok(())
    }

    /// Writes `data` to a sibling temp file, syncs it and renames it over
    /// the journal.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let temp_path = self.path.with_extension("compact");
        {
            let mut temp = File::create(&temp_path)?;
            temp.write_all(data)?;
            temp.sync_all()?;
        }
        std::fs::rename(&temp_path, &self.path)?;
        sync_parent(&self.path)?;

        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let state = self.inner.get_mut();
        state.size = file.metadata()?.len();
        state.file = file;
        Ok(())
    }
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> StorageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

// NTFS journals metadata itself; directories cannot be opened for sync.
#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> StorageResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_nested_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("node").join("journal.log");
        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
        assert_eq!(backend.path(), path);
    }

    #[test]
    fn open_existing_requires_file() {
        let dir = tempdir().unwrap();
        let result = FileBackend::open_existing(&dir.path().join("missing.log"));
        assert!(matches!(result, Err(StorageError::Unavailable { .. })));
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal.log");
        {
            let mut backend = FileBackend::open(&path).unwrap();
            assert_eq!(backend.append(b"persistent").unwrap(), 0);
            assert_eq!(backend.append(b" data").unwrap(), 10);
            backend.sync().unwrap();
        }

        let backend = FileBackend::open_existing(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 15);
        assert_eq!(backend.read_all().unwrap(), b"persistent data");
        assert_eq!(backend.read_at(11, 4).unwrap(), b"data");
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("j.log")).unwrap();
        backend.append(b"hello").unwrap();
        assert!(matches!(
            backend.read_at(10, 5),
            Err(StorageError::ReadPastEnd { .. })
        ));
        assert!(backend.read_at(2, 0).unwrap().is_empty());
    }

    #[test]
    fn replace_rewrites_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("j.log");
        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"a long history of writes").unwrap();
        backend.replace(b"snapshot").unwrap();

        assert_eq!(backend.size().unwrap(), 8);
        assert_eq!(backend.append(b"+").unwrap(), 8);
        assert_eq!(std::fs::read(&path).unwrap(), b"snapshot+");
        assert!(!path.with_extension("compact").exists());
    }

    #[test]
    fn truncate_cuts_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("j.log");
        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"good|torn").unwrap();
        backend.truncate(4).unwrap();
        assert_eq!(backend.read_all().unwrap(), b"good");
        assert_eq!(backend.append(b"!").unwrap(), 4);
        assert!(backend.truncate(50).is_err());
    }
}
