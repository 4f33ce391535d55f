//! On-disk cache store for materialized resources
//!
//! A filesystem side cache, distinct from the archive, used so that large
//! streamed resources (long audio clips in practice) decoded once from a Box
//! do not have to be re-decoded on every run. It is purely an optimization
//! layer; the archive remains the source of truth and a lost cache entry is
//! simply re-materialized.
//!
//! Each entry is a pair of files keyed by resource name: the payload and a
//! `.hash` sidecar holding the 8-byte content hash. The pair is only valid
//! together; a missing sidecar means the whole entry is absent, and an
//! orphaned payload is never served.

use crate::error::{BoxError, Result};
use crate::hash::NO_HASH;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const HASH_EXT: &str = "hash";

/// Filesystem-backed cache of materialized resource payloads.
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at the application's cache directory.
    ///
    /// The directory itself is created lazily on the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CacheStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entry names are plain file names; anything path-shaped would escape
    /// the cache root when joined.
    fn valid_name(name: &str) -> bool {
        !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
    }

    fn payload_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn hash_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{HASH_EXT}"))
    }

    /// Begin writing a cache entry: drop any stale pair, write the hash
    /// sidecar, and open the payload file for writing.
    pub fn create(&self, name: &str, hash: u64) -> Result<File> {
        if !Self::valid_name(name) {
            return Err(BoxError::AssetSource {
                path: name.to_string(),
                reason: "cache entry names must be plain file names".to_string(),
            });
        }
        fs::create_dir_all(&self.root)?;

        let payload = self.payload_path(name);
        let sidecar = self.hash_path(name);
        // Remove a stale pair so a failed write can never leave a payload
        // validated by an old sidecar.
        let _ = fs::remove_file(&payload);
        let _ = fs::remove_file(&sidecar);

        let mut hash_file = File::create(&sidecar)?;
        hash_file.write_all(&hash.to_le_bytes())?;
        hash_file.sync_all()?;

        debug!(name, hash, "cache entry created");
        Ok(File::create(&payload)?)
    }

    /// Whether a valid entry exists for `name`.
    ///
    /// Valid means both files exist and the sidecar matches `expected_hash`;
    /// passing [`NO_HASH`] skips the hash check (used when the caller does
    /// not yet know the expected hash).
    pub fn contains(&self, name: &str, expected_hash: u64) -> bool {
        if !Self::valid_name(name) {
            return false;
        }
        if !self.payload_path(name).is_file() || !self.hash_path(name).is_file() {
            return false;
        }
        expected_hash == NO_HASH || self.stored_hash(name) == expected_hash
    }

    /// Read the stored hash sidecar; [`NO_HASH`] if absent or unreadable.
    pub fn stored_hash(&self, name: &str) -> u64 {
        if !Self::valid_name(name) {
            return NO_HASH;
        }
        let mut buf = [0u8; 8];
        match File::open(self.hash_path(name)).and_then(|mut f| f.read_exact(&mut buf)) {
            Ok(()) => u64::from_le_bytes(buf),
            Err(_) => NO_HASH,
        }
    }

    /// Open a cache entry's payload for reading, iff the entry is valid.
    pub fn open(&self, name: &str, expected_hash: u64) -> Option<File> {
        if !self.contains(name, expected_hash) {
            return None;
        }
        match File::open(self.payload_path(name)) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(name, "cache payload vanished between check and open: {e}");
                None
            }
        }
    }

    /// Path of a valid entry's payload, iff the entry is valid.
    ///
    /// Used by streamed resources that hold the path and reopen on demand.
    pub fn payload_path_if_valid(&self, name: &str, expected_hash: u64) -> Option<PathBuf> {
        self.contains(name, expected_hash)
            .then(|| self.payload_path(name))
    }

    /// Remove an entry pair if present.
    pub fn remove(&self, name: &str) {
        if !Self::valid_name(name) {
            return;
        }
        let _ = fs::remove_file(self.payload_path(name));
        let _ = fs::remove_file(self.hash_path(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_store_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));
        assert!(!store.contains("clip", NO_HASH));
        assert_eq!(store.stored_hash("clip"), NO_HASH);
        assert!(store.open("clip", NO_HASH).is_none());
    }

    #[test]
    fn test_create_then_validate() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));

        let mut file = store.create("clip", 0xABCD).unwrap();
        file.write_all(b"pcm data").unwrap();
        file.sync_all().unwrap();
        drop(file);

        assert!(store.contains("clip", 0xABCD));
        assert!(!store.contains("clip", 0x1234));
        // Hash 0 skips the check as long as both files exist.
        assert!(store.contains("clip", NO_HASH));
        assert_eq!(store.stored_hash("clip"), 0xABCD);

        let mut payload = String::new();
        store
            .open("clip", 0xABCD)
            .unwrap()
            .read_to_string(&mut payload)
            .unwrap();
        assert_eq!(payload, "pcm data");
    }

    #[test]
    fn test_orphaned_payload_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));

        let mut file = store.create("clip", 7).unwrap();
        file.write_all(b"data").unwrap();
        drop(file);

        std::fs::remove_file(store.hash_path("clip")).unwrap();
        assert!(!store.contains("clip", 7));
        assert!(!store.contains("clip", NO_HASH));
        assert!(store.open("clip", NO_HASH).is_none());
    }

    #[test]
    fn test_recreate_replaces_stale_entry() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));

        let mut file = store.create("clip", 1).unwrap();
        file.write_all(b"old").unwrap();
        drop(file);

        let mut file = store.create("clip", 2).unwrap();
        file.write_all(b"new").unwrap();
        drop(file);

        assert!(!store.contains("clip", 1));
        assert!(store.contains("clip", 2));
    }

    #[test]
    fn test_path_shaped_names_rejected() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));

        for name in ["../evil", "a/b", "a\\b", "..", ".", ""] {
            assert!(store.create(name, 1).is_err(), "{name:?} must be rejected");
            assert!(!store.contains(name, NO_HASH));
            assert_eq!(store.stored_hash(name), NO_HASH);
            assert!(store.payload_path_if_valid(name, NO_HASH).is_none());
        }
        // Nothing escaped the cache root.
        assert!(!dir.path().join("evil.hash").exists());
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));
        drop(store.create("clip", 5).unwrap());
        store.remove("clip");
        assert!(!store.contains("clip", NO_HASH));
    }
}
