//! `PrimaryStore`: the append-only data file described by §4.1 — a fixed
//! header, an append-only region of framed records, and a metadata trailer
//! that the header points at.
//!
//! Grounded on the teacher's `recovery/wasp/` file-backed page store (open,
//! extend, checksum-verified read) generalized from fixed 16KiB pages to
//! variable-length framed records, since documents are not page-sized.

use crate::errors::{DbError, DbResult};
use crate::record::{Record, decode_record_body, encode_record};
use crate::store::header::{FileHeader, HEADER_SIZE};
use crate::store::trailer::{CollectionDescriptor, decode_trailer, encode_trailer};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// The primary store file: header + append-only record region + trailer.
pub struct PrimaryStore {
    file: File,
    path: PathBuf,
    header: FileHeader,
    /// Offset one past the last byte of the last record written (or past the
    /// header, if empty); new records are appended here.
    tail: u64,
}

impl PrimaryStore {
    /// Opens an existing store file, or creates one with a fresh header if
    /// it doesn't exist. Takes an advisory exclusive lock on the file so a
    /// second process opening the same path fails with `AlreadyOpen` (§5).
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).create(true).open(&path)?;
        file.try_lock_exclusive().map_err(|_| DbError::AlreadyOpen(path.display().to_string()))?;
        Self::from_file(path, file)
    }

    /// Opens a store file without taking the advisory lock — used for the
    /// compactor's scratch destination file, which lives only for the
    /// duration of one compaction pass already serialized by the caller
    /// holding the real primary store's lock.
    pub(crate) fn open_scratch(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(&path)?;
        Self::from_file(path, file)
    }

    fn from_file(path: PathBuf, file: File) -> DbResult<Self> {
        let existed = file.metadata()?.len() >= HEADER_SIZE as u64;

        if !existed {
            let header = FileHeader::new();
            let mut store = Self { file, path, header, tail: HEADER_SIZE as u64 };
            store.write_header()?;
            store.file.set_len(HEADER_SIZE as u64)?;
            return Ok(store);
        }

        let mut file = file;
        file.seek(SeekFrom::Start(0))?;
        let mut hbuf = [0u8; HEADER_SIZE];
        file.read_exact(&mut hbuf)?;
        let header = FileHeader::decode(&hbuf)?;

        // The trailer is never overwritten in place (see `write_trailer`): it
        // always sits at the old tail, and the tail only ever moves forward
        // past it. Reopening must resume appends at the physical end of the
        // file, not at `metadata_offset` — rewinding there would let the next
        // append clobber a trailer the on-disk header still points at.
        let file_len = file.metadata()?.len();
        let tail = file_len.max(HEADER_SIZE as u64);
        Ok(Self { file, path, header, tail })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut FileHeader {
        &mut self.header
    }

    #[must_use]
    pub fn tail(&self) -> u64 {
        self.tail
    }

    pub fn write_header(&mut self) -> DbResult<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.encode())?;
        Ok(())
    }

    /// Appends a framed record at the current tail and returns its starting
    /// offset. Does not fsync; callers durability-gate via the WAL / a
    /// subsequent `sync`.
    pub fn append_record(&mut self, record: &Record) -> DbResult<u64> {
        let offset = self.tail;
        let bytes = encode_record(record)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&bytes)?;
        self.tail = offset + bytes.len() as u64;
        Ok(offset)
    }

    /// Reads the framed record starting at `offset`.
    pub fn read_record_at(&mut self, offset: u64) -> DbResult<Record> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut len_buf = [0u8; 4];
        self.file.read_exact(&mut len_buf)?;
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        self.file.read_exact(&mut body)?;
        decode_record_body(&body)
    }

    /// Scans the data region from just past the header up to `limit`
    /// (typically the pre-crash tail or the trailer offset), yielding
    /// `(offset, Record)` pairs. Stops at the first torn/corrupt frame
    /// without erroring — callers fall back to the trailer-declared catalog
    /// for anything the scan couldn't reach (§4.1 recovery note).
    pub fn scan_data_region(&mut self, limit: u64) -> DbResult<Vec<(u64, Record)>> {
        let mut out = Vec::new();
        let mut offset = HEADER_SIZE as u64;
        while offset + 4 <= limit {
            self.file.seek(SeekFrom::Start(offset))?;
            let mut len_buf = [0u8; 4];
            if self.file.read_exact(&mut len_buf).is_err() {
                break;
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            if offset + 4 + len as u64 > limit {
                break;
            }
            let mut body = vec![0u8; len];
            if self.file.read_exact(&mut body).is_err() {
                break;
            }
            match decode_record_body(&body) {
                Ok(record) => out.push((offset, record)),
                Err(_) => break,
            }
            offset += 4 + len as u64;
        }
        Ok(out)
    }

    /// Writes a fresh trailer past the current tail and repoints the header
    /// at it. The old trailer bytes are left in place (never overwritten in
    /// place) so a crash mid-write still leaves the previous header/trailer
    /// pair self-consistent.
    pub fn write_trailer(&mut self, descriptors: &[CollectionDescriptor]) -> DbResult<()> {
        let bytes = encode_trailer(descriptors)?;
        let offset = self.tail;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&bytes)?;
        self.file.sync_data()?;

        self.header.metadata_offset = offset;
        self.header.metadata_size = bytes.len() as u64;
        self.header.collection_count = crate::utils::num::usize_to_u32_saturating(descriptors.len());
        self.write_header()?;
        self.file.sync_data()?;

        self.tail = offset + bytes.len() as u64;
        Ok(())
    }

    pub fn read_trailer(&mut self) -> DbResult<Vec<CollectionDescriptor>> {
        if self.header.metadata_size == 0 {
            return Ok(Vec::new());
        }
        self.file.seek(SeekFrom::Start(self.header.metadata_offset))?;
        let mut buf = vec![0u8; self.header.metadata_size as usize];
        self.file.read_exact(&mut buf)?;
        decode_trailer(&buf)
    }

    pub fn sync(&self) -> DbResult<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Truncates the file to just past the header, discarding the data
    /// region and trailer (used by the compactor to rebuild in place after
    /// an atomic rename-over, §7).
    pub fn reset(&mut self) -> DbResult<()> {
        self.file.set_len(HEADER_SIZE as u64)?;
        self.tail = HEADER_SIZE as u64;
        self.header = FileHeader::new();
        self.write_header()
    }
}

impl Drop for PrimaryStore {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
