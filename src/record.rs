//! Document record framing (§3, §4.1): the on-disk form of a document is a
//! 4-byte little-endian length header followed by a serialized mapping, with
//! a live/tombstone marker byte ahead of the payload.
//!
//! Grounded on the teacher's `SerializableBsonDocument` (`types.rs`), which
//! serializes by round-tripping through a byte codec (`bson::to_vec`); this
//! crate uses `bincode` (the teacher's other serialization dependency, used
//! for its own WAL/page framing in `recovery/wasp/*`) as the payload codec
//! instead, since §1 scopes the codec as crate-owned rather than re-exporting
//! an external document-database format.

use crate::errors::{DbError, DbResult};
use crate::value::{Document, Value};
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};

const FLAG_LIVE: u8 = 0;
const FLAG_TOMBSTONE: u8 = 1;

/// A decoded record: either a live document or a tombstone carrying only the
/// `_id` of the document it replaces (§3: "tombstones carry the original
/// `_id` and nothing else material").
#[derive(Debug, Clone)]
pub enum Record {
    Live(Document),
    Tombstone(Value),
}

/// Encodes a record body into its on-disk framed form:
/// `u32 length | u8 flag | payload`, where `length` counts the flag byte and
/// payload together.
pub fn encode_record(record: &Record) -> DbResult<Vec<u8>> {
    let (flag, payload) = match record {
        Record::Live(doc) => (FLAG_LIVE, encode_to_vec(doc, standard())?),
        Record::Tombstone(id) => (FLAG_TOMBSTONE, encode_to_vec(id, standard())?),
    };
    let mut out = Vec::with_capacity(4 + 1 + payload.len());
    let len = crate::utils::num::usize_to_u32_saturating(1 + payload.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.push(flag);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decodes a record body from `length + flag + payload` bytes already read
/// into memory (the length prefix itself is not part of `body`).
pub fn decode_record_body(body: &[u8]) -> DbResult<Record> {
    let (&flag, payload) =
        body.split_first().ok_or_else(|| DbError::CorruptRecord("empty record body".into()))?;
    match flag {
        FLAG_LIVE => {
            let (doc, _) = decode_from_slice::<Document, _>(payload, standard())
                .map_err(|e| DbError::CorruptRecord(format!("document decode failed: {e}")))?;
            Ok(Record::Live(doc))
        }
        FLAG_TOMBSTONE => {
            let (id, _) = decode_from_slice::<Value, _>(payload, standard())
                .map_err(|e| DbError::CorruptRecord(format!("tombstone decode failed: {e}")))?;
            Ok(Record::Tombstone(id))
        }
        other => Err(DbError::CorruptRecord(format!("unknown record flag {other}"))),
    }
}
