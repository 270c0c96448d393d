//! Exclusively locked container-file handles.

use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An exclusively held handle to one table's container file.
///
/// Opening acquires an advisory exclusive lock (non-blocking) that is
/// held for the handle's entire lifetime and released on drop, on every
/// exit path. While a `TableFile` exists, any other attempt to open the
/// same path fails with [`StorageError::Locked`].
///
/// The handle is deliberately dumb: it reads whole files, writes at
/// positions, and overwrites from the start **without truncating** —
/// shrinking rewrites leave the old tail bytes in place. The layers
/// above own the format and account for that dead space.
///
/// # Thread Safety
///
/// All methods take `&self`; internal locking keeps reads and writes
/// consistent across threads.
#[derive(Debug)]
pub struct TableFile {
    path: PathBuf,
    file: RwLock<File>,
    len: RwLock<u64>,
}

impl TableFile {
    /// Opens or creates the container file and locks it exclusively.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another handle (in this or
    /// any other process) holds the lock, or an I/O error if the file
    /// cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked {
                path: path.to_path_buf(),
            });
        }

        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            len: RwLock::new(len),
        })
    }

    /// Returns the path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current file length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        *self.len.read()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads the entire file into memory.
    pub fn read_all(&self) -> StorageResult<Vec<u8>> {
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(0))?;

        let mut buffer = Vec::with_capacity(*self.len.read() as usize);
        file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    /// Writes `data` at the given byte offset.
    ///
    /// Writing past the current end extends the file.
    pub fn write_at(&self, offset: u64, data: &[u8]) -> StorageResult<()> {
        let mut file = self.file.write();
        let mut len = self.len.write();

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;

        let end = offset + data.len() as u64;
        if end > *len {
            *len = end;
        }

        Ok(())
    }

    /// Overwrites the file contents from offset zero without truncating.
    ///
    /// If `data` is shorter than the file, the old tail bytes remain.
    pub fn overwrite(&self, data: &[u8]) -> StorageResult<()> {
        self.write_at(0, data)
    }

    /// Syncs file contents and metadata to disk.
    pub fn sync(&self) -> StorageResult<()> {
        let file = self.file.write();
        file.sync_all()?;
        Ok(())
    }
}

// The advisory lock is released when the File closes on drop.

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.dat");

        let file = TableFile::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(file.len(), 0);
        assert!(file.is_empty());
    }

    #[test]
    fn second_open_fails_while_locked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.dat");

        let _file = TableFile::open(&path).unwrap();

        let result = TableFile::open(&path);
        assert!(matches!(result, Err(StorageError::Locked { .. })));
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.dat");

        {
            let _file = TableFile::open(&path).unwrap();
        }

        let _reopened = TableFile::open(&path).unwrap();
    }

    #[test]
    fn write_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.dat");

        let file = TableFile::open(&path).unwrap();
        file.overwrite(b"hello container").unwrap();
        file.sync().unwrap();

        assert_eq!(file.len(), 15);
        assert_eq!(file.read_all().unwrap(), b"hello container");
    }

    #[test]
    fn positioned_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.dat");

        let file = TableFile::open(&path).unwrap();
        file.overwrite(b"0123456789").unwrap();
        file.write_at(4, b"XY").unwrap();

        assert_eq!(file.read_all().unwrap(), b"0123XY6789");
        assert_eq!(file.len(), 10);
    }

    #[test]
    fn shrinking_overwrite_keeps_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.dat");

        let file = TableFile::open(&path).unwrap();
        file.overwrite(b"aaaaaaaaaa").unwrap();
        file.overwrite(b"bbb").unwrap();

        assert_eq!(file.len(), 10);
        assert_eq!(file.read_all().unwrap(), b"bbbaaaaaaa");
    }

    #[test]
    fn contents_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.dat");

        {
            let file = TableFile::open(&path).unwrap();
            file.overwrite(b"persisted").unwrap();
            file.sync().unwrap();
        }

        let file = TableFile::open(&path).unwrap();
        assert_eq!(file.len(), 9);
        assert_eq!(file.read_all().unwrap(), b"persisted");
    }
}
