//! File-backed announce cache.
//!
//! One file per cache key under a single directory. Writes go to `<key>.tmp`
//! and are renamed into place, so a crash leaves either the old record or the
//! new one. Sizes are tracked in memory from a directory scan at open, which
//! keeps `size`/`available` free of I/O.
//!
//! # Note
//! All operations are blocking `std::fs` calls. Records are a few hundred
//! bytes and only announces from the backbone are cached, so they run inline
//! on the router loop.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use boundary_transport::{CacheStore, CacheStoreError};

const TMP_SUFFIX: &str = "tmp";

/// Longest accepted key: a hex-encoded full hash.
const MAX_KEY_LEN: usize = 64;

pub struct FileCacheStore {
    dir: PathBuf,
    max_bytes: usize,
    max_entries: usize,
    sizes: HashMap<String, usize>,
    used: usize,
}

impl FileCacheStore {
    /// Open (creating if needed) a store rooted at `dir`. Leftover temporary
    /// files from an interrupted write are removed.
    pub fn open(
        dir: impl Into<PathBuf>,
        max_bytes: usize,
        max_entries: usize,
    ) -> Result<Self, CacheStoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut sizes = HashMap::new();
        let mut used = 0usize;
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == TMP_SUFFIX) {
                tracing::debug!(path = %path.display(), "removing interrupted cache write");
                std::fs::remove_file(&path)?;
                continue;
            }
            let Some(key) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if validate_key(key).is_err() || !entry.file_type()?.is_file() {
                continue;
            }
            let len = usize::try_from(entry.metadata()?.len()).unwrap_or(usize::MAX);
            used = used.saturating_add(len);
            sizes.insert(key.to_string(), len);
        }
        if used > max_bytes {
            tracing::warn!(used, max_bytes, "announce cache directory exceeds its capacity");
        }

        Ok(Self {
            dir,
            max_bytes,
            max_entries: max_entries.max(1),
            sizes,
            used,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

/// Keys become file names, so only lowercase hex is accepted.
fn validate_key(key: &str) -> Result<(), CacheStoreError> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    if valid {
        Ok(())
    } else {
        Err(CacheStoreError::InvalidKey(key.to_string()))
    }
}

impl CacheStore for FileCacheStore {
    fn exists(&self, key: &str) -> bool {
        self.sizes.contains_key(key)
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CacheStoreError> {
        validate_key(key)?;
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, data: &[u8]) -> Result<(), CacheStoreError> {
        validate_key(key)?;
        let replaced = self.sizes.get(key).copied();
        let available = self
            .max_bytes
            .saturating_sub(self.used - replaced.unwrap_or(0));
        if data.len() > available || (replaced.is_none() && self.sizes.len() >= self.max_entries)
        {
            return Err(CacheStoreError::Full {
                needed: data.len(),
                available,
            });
        }

        let path = self.path_for(key);
        let tmp = path.with_extension(TMP_SUFFIX);
        std::fs::write(&tmp, data)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        self.used = self.used - replaced.unwrap_or(0) + data.len();
        self.sizes.insert(key.to_string(), data.len());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, CacheStoreError> {
        validate_key(key)?;
        let removed = match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        if let Some(len) = self.sizes.remove(key) {
            self.used -= len;
        }
        Ok(removed)
    }

    fn list(&self) -> Result<Vec<String>, CacheStoreError> {
        let mut keys: Vec<String> = self.sizes.keys().cloned().collect();
        keys.sort_unstable();
        Ok(keys)
    }

    fn size(&self) -> usize {
        self.used
    }

    fn available(&self) -> usize {
        self.max_bytes.saturating_sub(self.used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a";
    const KEY_B: &str = "0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b";

    #[test]
    fn write_read_remove() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let mut store = FileCacheStore::open(dir.path(), 1024, 8).expect("open failed");

        assert!(!store.exists(KEY_A));
        store.write(KEY_A, b"announce").expect("write failed");
        assert!(store.exists(KEY_A));
        assert_eq!(store.read(KEY_A).expect("read failed"), Some(b"announce".to_vec()));
        assert_eq!(store.size(), 8);
        assert_eq!(store.available(), 1016);

        assert!(store.remove(KEY_A).expect("remove failed"));
        assert!(!store.remove(KEY_A).expect("second remove failed"));
        assert_eq!(store.read(KEY_A).expect("read failed"), None);
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn replace_accounts_for_old_size() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let mut store = FileCacheStore::open(dir.path(), 16, 8).expect("open failed");
        store.write(KEY_A, &[1; 12]).expect("write failed");
        // replacing a 12-byte record with a 16-byte one fits exactly
        store.write(KEY_A, &[2; 16]).expect("replace failed");
        assert_eq!(store.size(), 16);
        assert_eq!(store.len(), 1);
        assert_eq!(store.read(KEY_A).expect("read failed"), Some(vec![2; 16]));
    }

    #[test]
    fn full_by_bytes_and_by_entries() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let mut store = FileCacheStore::open(dir.path(), 10, 1).expect("open failed");

        let err = store.write(KEY_A, &[0; 11]).expect_err("oversized write accepted");
        assert!(matches!(err, CacheStoreError::Full { needed: 11, available: 10 }));

        store.write(KEY_A, &[0; 4]).expect("write failed");
        let err = store.write(KEY_B, &[0; 1]).expect_err("entry cap ignored");
        assert!(matches!(err, CacheStoreError::Full { .. }));
        assert!(!dir.path().join(KEY_B).exists());
    }

    #[test]
    fn keys_must_be_hex() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let mut store = FileCacheStore::open(dir.path(), 1024, 8).expect("open failed");
        let long = "a".repeat(65);
        for key in ["", "../etc", "ABCD", "zz", long.as_str()] {
            let err = store.write(key, b"x").expect_err("bad key accepted");
            assert!(matches!(err, CacheStoreError::InvalidKey(_)), "{key:?}");
        }
        assert!(store.list().expect("list failed").is_empty());
    }

    #[test]
    fn reopen_recovers_sizes_and_drops_tmp_files() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        {
            let mut store = FileCacheStore::open(dir.path(), 1024, 8).expect("open failed");
            store.write(KEY_A, &[7; 20]).expect("write failed");
            store.write(KEY_B, &[8; 30]).expect("write failed");
        }
        std::fs::write(dir.path().join(format!("{KEY_A}.tmp")), b"half").expect("tmp write failed");
        std::fs::write(dir.path().join("README"), b"not a key").expect("stray write failed");

        let store = FileCacheStore::open(dir.path(), 1024, 8).expect("reopen failed");
        assert_eq!(store.list().expect("list failed"), vec![KEY_A.to_string(), KEY_B.to_string()]);
        assert_eq!(store.size(), 50);
        assert!(!dir.path().join(format!("{KEY_A}.tmp")).exists());
        assert!(dir.path().join("README").exists());
    }

    #[test]
    fn open_creates_nested_directory() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let nested = dir.path().join("a").join("b");
        let store = FileCacheStore::open(&nested, 64, 2).expect("open failed");
        assert!(nested.is_dir());
        assert_eq!(store.dir(), nested.as_path());
        assert!(store.is_empty());
    }

    #[test]
    fn no_tmp_file_left_after_write() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let mut store = FileCacheStore::open(dir.path(), 1024, 8).expect("open failed");
        store.write(KEY_A, b"record").expect("write failed");
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read_dir failed")
            .map(|e| e.expect("entry failed").file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(KEY_A)]);
    }
}
