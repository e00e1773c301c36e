//! Fixed 256-byte primary store header (§4.1).

use crate::errors::{DbError, DbResult};

pub const MAGIC: &[u8; 8] = b"IRONBASE";
pub const HEADER_SIZE: usize = 256;
pub const DEFAULT_PAGE_SIZE: u32 = 4096;
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u32,
    pub page_size: u32,
    pub collection_count: u32,
    pub free_list_head: u64,
    pub index_section_offset: u64,
    pub metadata_offset: u64,
    pub metadata_size: u64,
}

impl FileHeader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            page_size: DEFAULT_PAGE_SIZE,
            collection_count: 0,
            free_list_head: 0,
            index_section_offset: 0,
            metadata_offset: 0,
            metadata_size: 0,
        }
    }

    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(MAGIC);
        buf[8..12].copy_from_slice(&self.version.to_le_bytes());
        buf[12..16].copy_from_slice(&self.page_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.collection_count.to_le_bytes());
        buf[20..28].copy_from_slice(&self.free_list_head.to_le_bytes());
        buf[28..36].copy_from_slice(&self.index_section_offset.to_le_bytes());
        buf[36..44].copy_from_slice(&self.metadata_offset.to_le_bytes());
        buf[44..52].copy_from_slice(&self.metadata_size.to_le_bytes());
        buf
    }

    /// # Errors
    /// Returns `CorruptHeader` if the magic is wrong or the buffer is too
    /// short (a torn header write, §4.1 failure modes).
    pub fn decode(buf: &[u8]) -> DbResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(DbError::CorruptHeader(format!(
                "header truncated: {} bytes, need {HEADER_SIZE}",
                buf.len()
            )));
        }
        if &buf[0..8] != MAGIC {
            return Err(DbError::CorruptHeader("bad magic".into()));
        }
        let u32_at = |off: usize| u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        let u64_at = |off: usize| u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
        Ok(Self {
            version: u32_at(8),
            page_size: u32_at(12),
            collection_count: u32_at(16),
            free_list_head: u64_at(20),
            index_section_offset: u64_at(28),
            metadata_offset: u64_at(36),
            metadata_size: u64_at(44),
        })
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}
