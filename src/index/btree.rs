//! The on-disk B+Tree (§4.4): insert/remove/lookup/range_scan over an
//! ordered key space, persisted as a chain of 4 KiB leaf pages behind a
//! directory page, committed via a two-phase rename protocol.
//!
//! Grounded on the teacher's `recovery/wasp/tree.rs` (`CowTree`/`CowNode`
//! split-on-overflow logic) and `recovery/wasp/wasp_engine.rs`
//! (tmp-file-then-rename durability), generalized from the teacher's
//! single-file copy-on-write page store to the named `.idx` /
//! `.idx.tmp.prepare` / `.idx.tmp` file trio spec.md's two-phase commit asks
//! for. Runtime operations work against an in-memory ordered map — the
//! authoritative state between commits — which is flushed to the paged
//! on-disk format as a whole on `commit`; this trades the teacher's
//! per-node copy-on-write granularity for a simpler whole-tree durability
//! boundary, appropriate since index files here are rebuilt wholesale from
//! the catalog on any detected corruption rather than repaired node by node.

use crate::errors::{DbError, DbResult};
use crate::id::DocId;
use crate::index::page::{BODY_CAPACITY, Page};
use crate::value::{Value, encode_key};
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An in-memory-resident, disk-backed B+Tree mapping encoded key bytes to
/// the set of document ids stored under that key (non-unique indexes may
/// map one key to several documents).
pub struct BTree {
    path: PathBuf,
    unique: bool,
    entries: BTreeMap<Vec<u8>, Vec<DocId>>,
}

impl BTree {
    #[must_use]
    pub fn new_empty(path: impl AsRef<Path>, unique: bool) -> Self {
        Self { path: path.as_ref().to_path_buf(), unique, entries: BTreeMap::new() }
    }

    /// Opens an index file, completing any interrupted two-phase commit
    /// first (§4.4 recovery): if `.idx.tmp` exists the prior commit got as
    /// far as the rename-to-tmp step and just needs the final rename; a
    /// lone `.idx.tmp.prepare` is a commit that never got that far and is
    /// discarded.
    pub fn open(path: impl AsRef<Path>, unique: bool) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let tmp = tmp_path(&path);
        let prepare = prepare_path(&path);

        if tmp.exists() {
            fs::rename(&tmp, &path)?;
        }
        if prepare.exists() {
            let _ = fs::remove_file(&prepare);
        }

        if !path.exists() {
            return Ok(Self::new_empty(path, unique));
        }

        let entries = load_pages(&path)?;
        Ok(Self { path, unique, entries })
    }

    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn lookup(&self, key: &Value) -> &[DocId] {
        self.entries.get(&encode_key(key)).map_or(&[], Vec::as_slice)
    }

    /// # Errors
    /// Returns `DuplicateKey` if this is a unique index and `key` is already
    /// mapped to a different document.
    pub fn insert(&mut self, index_name: &str, key: &Value, id: DocId) -> DbResult<()> {
        let encoded = encode_key(key);
        let bucket = self.entries.entry(encoded).or_default();
        if self.unique && !bucket.is_empty() && !bucket.iter().any(|existing| existing == &id) {
            return Err(DbError::DuplicateKey { index: index_name.to_string(), key: format!("{key:?}") });
        }
        if !bucket.iter().any(|existing| existing == &id) {
            bucket.push(id);
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &Value, id: &DocId) {
        let encoded = encode_key(key);
        if let Some(bucket) = self.entries.get_mut(&encoded) {
            bucket.retain(|existing| existing != id);
            if bucket.is_empty() {
                self.entries.remove(&encoded);
            }
        }
    }

    /// Returns every `(key, ids)` pair in key order (ascending); reversed by
    /// the caller when a descending sort is requested.
    pub fn range_scan(&self) -> impl Iterator<Item = (&Vec<u8>, &Vec<DocId>)> {
        self.entries.iter()
    }

    /// Rebuilds the tree's entries from a full collection scan (used on
    /// `create_index` and when recovery detects a corrupt index file).
    pub fn rebuild<'a>(
        &mut self,
        index_name: &str,
        docs: impl Iterator<Item = (DocId, &'a crate::value::Document)>,
        key_path: &str,
    ) -> DbResult<()> {
        self.entries.clear();
        for (id, doc) in docs {
            for key in crate::value::index_key_values(doc, key_path) {
                self.insert(index_name, &key, id.clone())?;
            }
        }
        Ok(())
    }

    /// Commits the current in-memory state to disk via prepare -> tmp ->
    /// final rename, fsyncing after each write so a crash at any point
    /// leaves either the old or the new `.idx` file intact, never a partial
    /// one (§4.4 two-phase commit).
    pub fn commit(&self) -> DbResult<()> {
        let prepare = prepare_path(&self.path);
        let tmp = tmp_path(&self.path);

        write_pages(&prepare, &self.entries)?;
        fs::rename(&prepare, &tmp)?;
        sync_parent_dir(&tmp)?;
        fs::rename(&tmp, &self.path)?;
        sync_parent_dir(&self.path)?;
        Ok(())
    }
}

fn prepare_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".tmp.prepare");
    PathBuf::from(s)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".tmp");
    PathBuf::from(s)
}

fn sync_parent_dir(path: &Path) -> DbResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

struct PackedEntry {
    key: Vec<u8>,
    payload: Vec<u8>,
}

fn pack_entries(entries: &BTreeMap<Vec<u8>, Vec<DocId>>) -> DbResult<Vec<PackedEntry>> {
    entries
        .iter()
        .map(|(key, ids)| {
            let values: Vec<&Value> = ids.iter().map(DocId::value).collect();
            let payload = encode_to_vec(&values, standard())?;
            Ok(PackedEntry { key: key.clone(), payload })
        })
        .collect()
}

fn encode_entry(entry: &PackedEntry, out: &mut Vec<u8>) {
    let key_len = crate::utils::num::usize_to_u32_saturating(entry.key.len());
    let payload_len = crate::utils::num::usize_to_u32_saturating(entry.payload.len());
    out.extend_from_slice(&key_len.to_le_bytes());
    out.extend_from_slice(&entry.key);
    out.extend_from_slice(&payload_len.to_le_bytes());
    out.extend_from_slice(&entry.payload);
}

fn entry_encoded_len(entry: &PackedEntry) -> usize {
    4 + entry.key.len() + 4 + entry.payload.len()
}

/// Writes `entries` as a chain of leaf pages preceded by a directory page
/// (page 0) listing each leaf's first key and page id.
fn write_pages(path: &Path, entries: &BTreeMap<Vec<u8>, Vec<DocId>>) -> DbResult<()> {
    let packed = pack_entries(entries)?;

    let mut leaves: Vec<Vec<u8>> = Vec::new();
    let mut leaf_first_keys: Vec<Vec<u8>> = Vec::new();
    let mut current = Vec::new();
    let mut current_first_key: Option<Vec<u8>> = None;

    for entry in &packed {
        let needed = entry_encoded_len(entry);
        if !current.is_empty() && current.len() + needed > BODY_CAPACITY {
            leaves.push(std::mem::take(&mut current));
            leaf_first_keys.push(current_first_key.take().unwrap());
        }
        if current_first_key.is_none() {
            current_first_key = Some(entry.key.clone());
        }
        encode_entry(entry, &mut current);
    }
    if !current.is_empty() || leaves.is_empty() {
        leaves.push(current);
        leaf_first_keys.push(current_first_key.unwrap_or_default());
    }

    let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;

    // Leaf pages start at page_id 1; page 0 is the directory.
    for (i, body) in leaves.iter().enumerate() {
        let page_id = crate::utils::num::usize_to_u64(i + 1);
        let next_leaf = if i + 1 < leaves.len() { crate::utils::num::usize_to_u64(i + 2) } else { 0 };
        let key_count = crate::utils::num::usize_to_u32_saturating(count_entries_in_leaf(body));
        let page = Page::new(page_id, true, key_count, next_leaf, body.clone());
        write_page_at(&mut file, page_id, &page)?;
    }

    let mut dir_body = Vec::new();
    for (i, first_key) in leaf_first_keys.iter().enumerate() {
        let page_id = crate::utils::num::usize_to_u64(i + 1);
        let key_len = crate::utils::num::usize_to_u32_saturating(first_key.len());
        dir_body.extend_from_slice(&key_len.to_le_bytes());
        dir_body.extend_from_slice(first_key);
        dir_body.extend_from_slice(&page_id.to_le_bytes());
    }
    if dir_body.len() > BODY_CAPACITY {
        return Err(DbError::CorruptIndex("directory page overflowed a single page; index too wide".into()));
    }
    let dir_count = crate::utils::num::usize_to_u32_saturating(leaf_first_keys.len());
    let dir_page = Page::new(0, false, dir_count, 0, dir_body);
    write_page_at(&mut file, 0, &dir_page)?;

    file.sync_data()?;
    Ok(())
}

fn count_entries_in_leaf(body: &[u8]) -> usize {
    let mut count = 0;
    let mut cur = body;
    while cur.len() >= 4 {
        let key_len = u32::from_le_bytes(cur[0..4].try_into().unwrap()) as usize;
        if cur.len() < 4 + key_len + 4 {
            break;
        }
        let payload_len = u32::from_le_bytes(cur[4 + key_len..8 + key_len].try_into().unwrap()) as usize;
        let total = 4 + key_len + 4 + payload_len;
        if cur.len() < total {
            break;
        }
        cur = &cur[total..];
        count += 1;
    }
    count
}

fn write_page_at(file: &mut File, page_id: u64, page: &Page) -> DbResult<()> {
    let offset = page_id * crate::index::page::PAGE_SIZE as u64;
    let bytes = page.encode()?;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&bytes)?;
    Ok(())
}

fn read_page_at(file: &mut File, page_id: u64) -> DbResult<Page> {
    let offset = page_id * crate::index::page::PAGE_SIZE as u64;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = [0u8; crate::index::page::PAGE_SIZE];
    file.read_exact(&mut buf)?;
    Page::decode(&buf)
}

fn load_pages(path: &Path) -> DbResult<BTreeMap<Vec<u8>, Vec<DocId>>> {
    let mut file = OpenOptions::new().read(true).open(path)?;
    let dir = read_page_at(&mut file, 0)?;

    let mut leaf_ids = Vec::new();
    let mut cur = dir.body.as_slice();
    while cur.len() >= 4 {
        let key_len = u32::from_le_bytes(cur[0..4].try_into().unwrap()) as usize;
        if cur.len() < 4 + key_len + 8 {
            break;
        }
        let page_id = u64::from_le_bytes(cur[4 + key_len..4 + key_len + 8].try_into().unwrap());
        leaf_ids.push(page_id);
        cur = &cur[4 + key_len + 8..];
    }

    let mut entries = BTreeMap::new();
    for page_id in leaf_ids {
        let page = read_page_at(&mut file, page_id)?;
        let mut body = page.body.as_slice();
        while body.len() >= 4 {
            let key_len = u32::from_le_bytes(body[0..4].try_into().unwrap()) as usize;
            if body.len() < 4 + key_len + 4 {
                break;
            }
            let key = body[4..4 + key_len].to_vec();
            let payload_len = u32::from_le_bytes(body[4 + key_len..8 + key_len].try_into().unwrap()) as usize;
            let payload_start = 8 + key_len;
            if body.len() < payload_start + payload_len {
                break;
            }
            let payload = &body[payload_start..payload_start + payload_len];
            let (values, _): (Vec<Value>, usize) = decode_from_slice(payload, standard())
                .map_err(|e| DbError::CorruptIndex(format!("leaf payload decode failed: {e}")))?;
            entries.insert(key, values.into_iter().map(DocId).collect());
            body = &body[payload_start + payload_len..];
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn insert_lookup_remove_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("email.idx");
        let mut tree = BTree::new_empty(&path, true);
        tree.insert("email_idx", &Value::Str("a@example.com".into()), DocId::int(1)).unwrap();
        tree.insert("email_idx", &Value::Str("b@example.com".into()), DocId::int(2)).unwrap();
        assert_eq!(tree.lookup(&Value::Str("a@example.com".into())), &[DocId::int(1)]);
        tree.remove(&Value::Str("a@example.com".into()), &DocId::int(1));
        assert!(tree.lookup(&Value::Str("a@example.com".into())).is_empty());
    }

    #[test]
    fn unique_index_rejects_duplicate_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("email.idx");
        let mut tree = BTree::new_empty(&path, true);
        tree.insert("email_idx", &Value::Str("a@example.com".into()), DocId::int(1)).unwrap();
        let err = tree.insert("email_idx", &Value::Str("a@example.com".into()), DocId::int(2));
        assert!(matches!(err, Err(DbError::DuplicateKey { .. })));
    }

    #[test]
    fn commit_and_reopen_persists_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("age.idx");
        let mut tree = BTree::new_empty(&path, false);
        for i in 0..500i64 {
            tree.insert("age_idx", &Value::Int(i % 50), DocId::int(i)).unwrap();
        }
        tree.commit().unwrap();

        let reopened = BTree::open(&path, false).unwrap();
        assert_eq!(reopened.lookup(&Value::Int(3)).len(), 10);
    }

    #[test]
    fn interrupted_commit_tmp_is_finished_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.idx");
        let mut tree = BTree::new_empty(&path, false);
        tree.insert("x_idx", &Value::Int(1), DocId::int(1)).unwrap();
        write_pages(&tmp_path(&path), &tree.entries).unwrap();

        let reopened = BTree::open(&path, false).unwrap();
        assert_eq!(reopened.lookup(&Value::Int(1)), &[DocId::int(1)]);
        assert!(path.exists());
        assert!(!tmp_path(&path).exists());
    }
}
