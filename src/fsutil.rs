//! Path conventions for a database's on-disk files (§4.1, §4.2, §4.4): the
//! primary store at the path the caller names, its WAL alongside it, and
//! one index file per declared index in the same directory.

use std::path::{Path, PathBuf};

#[must_use]
pub fn wal_path(primary_path: &Path) -> PathBuf {
    let mut s = primary_path.as_os_str().to_os_string();
    s.push(".wal");
    PathBuf::from(s)
}

#[must_use]
pub fn index_dir(primary_path: &Path) -> PathBuf {
    primary_path.parent().map(Path::to_path_buf).unwrap_or_default()
}

#[must_use]
pub fn collection_label(primary_path: &Path, collection: &str) -> String {
    let stem = primary_path.file_stem().and_then(|s| s.to_str()).unwrap_or("db");
    format!("{stem}_{collection}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wal_path_appends_suffix() {
        let p = Path::new("/tmp/db.ironbase");
        assert_eq!(wal_path(p), PathBuf::from("/tmp/db.ironbase.wal"));
    }

    #[test]
    fn collection_label_combines_stem_and_name() {
        let p = Path::new("/tmp/mydb.ironbase");
        assert_eq!(collection_label(p, "users"), "mydb_users");
    }
}
