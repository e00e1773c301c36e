//! Metadata trailer (§4.1): `u32 collection_count` followed by, per
//! collection, `u32 length` + JSON-serialized [`CollectionDescriptor`].

use crate::errors::{DbError, DbResult};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub name: String,
    pub key_path: String,
    pub unique: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    pub name: String,
    pub last_id: i64,
    pub document_count: u64,
    pub document_catalog: Vec<(Value, u64)>,
    pub indexes: Vec<IndexMeta>,
}

/// Serializes the trailer body (without the outer collection count, which
/// the caller writes as part of locating it) — actually includes the count
/// as its own leading `u32`, matching §4.1 exactly.
pub fn encode_trailer(descriptors: &[CollectionDescriptor]) -> DbResult<Vec<u8>> {
    let mut out = Vec::new();
    let count = crate::utils::num::usize_to_u32_saturating(descriptors.len());
    out.extend_from_slice(&count.to_le_bytes());
    for d in descriptors {
        let json = serde_json::to_vec(d)?;
        let len = crate::utils::num::usize_to_u32_saturating(json.len());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&json);
    }
    Ok(out)
}

pub fn decode_trailer(bytes: &[u8]) -> DbResult<Vec<CollectionDescriptor>> {
    let mut cur = bytes;
    let count = read_u32(&mut cur)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = read_u32(&mut cur)? as usize;
        if cur.len() < len {
            return Err(DbError::CorruptHeader("trailer entry truncated".into()));
        }
        let (entry, rest) = cur.split_at(len);
        let descriptor: CollectionDescriptor = serde_json::from_slice(entry)?;
        out.push(descriptor);
        cur = rest;
    }
    Ok(out)
}

fn read_u32(cur: &mut &[u8]) -> DbResult<u32> {
    if cur.len() < 4 {
        return Err(DbError::CorruptHeader("trailer truncated".into()));
    }
    let (head, rest) = cur.split_at(4);
    *cur = rest;
    Ok(u32::from_le_bytes(head.try_into().unwrap()))
}

/// Writes `bytes` at `offset` in `file` (used to append the trailer past the
/// current data tail, per §4.1: the old trailer stays intact until the
/// header is updated to point at the new one).
pub fn write_at<W: Write + std::io::Seek>(file: &mut W, offset: u64, bytes: &[u8]) -> DbResult<()> {
    file.seek(std::io::SeekFrom::Start(offset))?;
    file.write_all(bytes)?;
    Ok(())
}

pub fn read_at<R: Read + std::io::Seek>(file: &mut R, offset: u64, size: u64) -> DbResult<Vec<u8>> {
    file.seek(std::io::SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; size as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}
