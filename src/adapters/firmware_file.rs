//! Firmware image file on the SD card.
//!
//! ESP-IDF exposes the mounted FAT volume through the VFS layer, so plain
//! `std::fs` works on both the device and the host.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::app::ports::{FirmwareStore, StorageError};

/// Default location of the downloaded image.
pub const FIRMWARE_FILE: &str = "/sdcard/firmware.bin";

/// Append-only [`FirmwareStore`] backed by a single file.
pub struct FirmwareFile {
    path: PathBuf,
    file: Option<File>,
}

impl FirmwareFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file once it has been flashed.
    pub fn remove(&mut self) -> Result<(), StorageError> {
        self.file = None;
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(storage_error(&e)),
            _ => Ok(()),
        }
    }

    fn open(&mut self) -> Result<&mut File, StorageError> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .read(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| storage_error(&e))?;
            self.file = Some(file);
        }
        self.file.as_mut().ok_or(StorageError::IoError)
    }
}

fn storage_error(e: &io::Error) -> StorageError {
    match e.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound,
        io::ErrorKind::StorageFull => StorageError::Full,
        _ => StorageError::IoError,
    }
}

impl FirmwareStore for FirmwareFile {
    fn create(&mut self) -> Result<(), StorageError> {
        self.file = None;
        File::create(&self.path).map_err(|e| {
            warn!("Cannot create {}: {}", self.path.display(), e);
            storage_error(&e)
        })?;
        debug!("Created {}", self.path.display());
        Ok(())
    }

    fn append(&mut self, data: &[u8]) -> Result<(), StorageError> {
        let file = self.open()?;
        file.write_all(data).map_err(|e| storage_error(&e))?;
        file.flush().map_err(|e| storage_error(&e))
    }

    fn len(&self) -> Result<u32, StorageError> {
        let meta = std::fs::metadata(&self.path).map_err(|e| storage_error(&e))?;
        u32::try_from(meta.len()).map_err(|_| StorageError::Full)
    }

    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, StorageError> {
        let file = self.open()?;
        file.seek(SeekFrom::Start(u64::from(offset)))
            .map_err(|e| storage_error(&e))?;
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(storage_error(&e)),
            }
        }
        Ok(filled)
    }
}
