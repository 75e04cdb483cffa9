//! File-backed disk manager.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use keel_common::constants::PAGE_SIZE;
use keel_common::types::PageId;
use parking_lot::Mutex;

use super::error::{IoError, IoResult};
use super::{check_page_args, DiskManager};

/// Disk manager backed by a single data file.
///
/// Pages live at offset `page_id * PAGE_SIZE`. The underlying file is
/// wrapped in a mutex; each operation seeks and then transfers one page.
/// Reads past the current end of file zero-fill the remainder of the
/// buffer, so a freshly allocated page reads back as zeroes before its
/// first write-back.
pub struct FileDiskManager {
    /// The underlying file, wrapped in a mutex for thread-safe access.
    file: Mutex<File>,
    /// The data file path.
    path: PathBuf,
}

impl FileDiskManager {
    /// Opens the data file at `path`, creating it if necessary.
    pub fn open(path: impl AsRef<Path>) -> IoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| IoError::from_io_with_path(e, &path))?;

        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    /// Returns the data file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Syncs all buffered writes to disk.
    pub fn sync(&self) -> IoResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    #[inline]
    fn offset_of(page_id: PageId) -> u64 {
        page_id.as_u64() * PAGE_SIZE as u64
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> IoResult<()> {
        check_page_args(page_id, buf.len())?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(Self::offset_of(page_id)))?;

        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled < buf.len() {
            // Page has never been written; the tail of the file is implicit zeroes.
            tracing::trace!(page_id = %page_id, filled, "short page read, zero-filling");
            buf[filled..].fill(0);
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> IoResult<()> {
        check_page_args(page_id, buf.len())?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(Self::offset_of(page_id)))?;
        file.write_all(buf)?;
        file.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for FileDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDiskManager")
            .field("path", &self.path)
            .finish()
    }
}
