//! # Farm Storage
//!
//! Ordered key-value storage behind the farming ledger.
//!
//! ## Backends
//!
//! - `memory_db/` - `MemoryStore`, ordered in-memory map (tests, simulations)
//! - `cache_db/` - `CacheStore`, write-buffer overlay; commit yields a `WriteBatch`
//! - `rocks_db/` - `RocksStore`, persistent RocksDB store
//!
//! Every ledger operation runs against a `CacheStore` stacked on the committed
//! store. A successful operation hands its `WriteBatch` to the committed store;
//! a failed one drops the overlay.

use std::collections::BTreeMap;
use thiserror::Error;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend I/O or engine failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Store could not be opened
    #[error("Failed to open store at {path}: {reason}")]
    Open { path: String, reason: String },
}

/// Key/value pair returned by prefix scans
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Ordered key-value store
///
/// Prefix scans return entries in ascending key order.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()>;

    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// All entries whose key starts with `prefix`
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>>;

    /// Apply a batch of puts and deletes
    fn write_batch(&mut self, batch: WriteBatch) -> Result<()> {
        for (key, op) in batch.ops {
            match op {
                Some(value) => self.set(&key, value)?,
                None => self.delete(&key)?,
            }
        }
        Ok(())
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

impl<T: KvStore + ?Sized> KvStore for Box<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        (**self).delete(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>> {
        (**self).scan_prefix(prefix)
    }

    fn write_batch(&mut self, batch: WriteBatch) -> Result<()> {
        (**self).write_batch(batch)
    }
}

/// Pending puts (`Some`) and deletes (`None`), keyed and ordered by key
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: &[u8], value: Vec<u8>) {
        self.ops.insert(key.to_vec(), Some(value));
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.ops.insert(key.to_vec(), None);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], Option<&[u8]>)> {
        self.ops
            .iter()
            .map(|(k, v)| (k.as_slice(), v.as_deref()))
    }
}

fn in_prefix<'a>(
    map: &'a BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    prefix: &'a [u8],
) -> impl Iterator<Item = (&'a Vec<u8>, &'a Option<Vec<u8>>)> {
    map.range(prefix.to_vec()..)
        .take_while(move |(k, _)| k.starts_with(prefix))
}

pub mod memory_db {
    //! In-memory ordered store

    use super::{KvPair, KvStore, Result};
    use std::collections::BTreeMap;

    /// Ordered in-memory key-value store
    #[derive(Clone, Debug, Default)]
    pub struct MemoryStore {
        data: BTreeMap<Vec<u8>, Vec<u8>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn len(&self) -> usize {
            self.data.len()
        }

        pub fn is_empty(&self) -> bool {
            self.data.is_empty()
        }

        /// Full copy of the contents, for before/after comparisons
        pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
            self.data.clone()
        }
    }

    impl KvStore for MemoryStore {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            Ok(self.data.get(key).cloned())
        }

        fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
            self.data.insert(key.to_vec(), value);
            Ok(())
        }

        fn delete(&mut self, key: &[u8]) -> Result<()> {
            self.data.remove(key);
            Ok(())
        }

        fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>> {
            Ok(self
                .data
                .range(prefix.to_vec()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect())
        }
    }
}

pub mod cache_db {
    //! Write-buffer overlay
    //!
    //! Reads fall through to the parent unless the key was written in the
    //! overlay. Nothing reaches the parent until the caller applies the batch
    //! returned by `into_batch`.

    use super::{in_prefix, KvPair, KvStore, Result, WriteBatch};
    use std::collections::BTreeMap;

    /// Overlay over a read-only parent store
    pub struct CacheStore<'a> {
        parent: &'a dyn KvStore,
        writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    }

    impl<'a> CacheStore<'a> {
        pub fn new(parent: &'a dyn KvStore) -> Self {
            Self {
                parent,
                writes: BTreeMap::new(),
            }
        }

        /// Number of buffered writes
        pub fn pending(&self) -> usize {
            self.writes.len()
        }

        /// Consume the overlay, yielding its writes
        pub fn into_batch(self) -> WriteBatch {
            let mut batch = WriteBatch::new();
            for (key, op) in self.writes {
                match op {
                    Some(value) => batch.put(&key, value),
                    None => batch.delete(&key),
                }
            }
            batch
        }
    }

    impl KvStore for CacheStore<'_> {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            match self.writes.get(key) {
                Some(op) => Ok(op.clone()),
                None => self.parent.get(key),
            }
        }

        fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
            self.writes.insert(key.to_vec(), Some(value));
            Ok(())
        }

        fn delete(&mut self, key: &[u8]) -> Result<()> {
            self.writes.insert(key.to_vec(), None);
            Ok(())
        }

        fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>> {
            let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
                self.parent.scan_prefix(prefix)?.into_iter().collect();

            for (key, op) in in_prefix(&self.writes, prefix) {
                match op {
                    Some(value) => {
                        merged.insert(key.clone(), value.clone());
                    }
                    None => {
                        merged.remove(key);
                    }
                }
            }
            Ok(merged.into_iter().collect())
        }
    }
}

pub mod rocks_db {
    //! RocksDB-backed persistent store

    use super::{KvPair, KvStore, Result, StorageError, WriteBatch};
    use rocksdb::{Direction, IteratorMode, Options, DB};
    use std::path::{Path, PathBuf};

    fn backend(err: rocksdb::Error) -> StorageError {
        StorageError::Backend(err.to_string())
    }

    /// Persistent store in a single RocksDB column family
    pub struct RocksStore {
        db: DB,
        path: PathBuf,
    }

    impl RocksStore {
        /// Open (or create) a store at `path`
        pub fn open(path: impl AsRef<Path>) -> Result<Self> {
            let path = path.as_ref().to_path_buf();
            let mut opts = Options::default();
            opts.create_if_missing(true);

            let db = DB::open(&opts, &path).map_err(|e| StorageError::Open {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            tracing::debug!("Opened RocksDB store at {}", path.display());

            Ok(Self { db, path })
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl KvStore for RocksStore {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            self.db.get(key).map_err(backend)
        }

        fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
            self.db.put(key, value).map_err(backend)
        }

        fn delete(&mut self, key: &[u8]) -> Result<()> {
            self.db.delete(key).map_err(backend)
        }

        fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>> {
            let mut out = Vec::new();
            for item in self
                .db
                .iterator(IteratorMode::From(prefix, Direction::Forward))
            {
                let (key, value) = item.map_err(backend)?;
                if !key.starts_with(prefix) {
                    break;
                }
                out.push((key.to_vec(), value.to_vec()));
            }
            Ok(out)
        }

        /// Applied as one atomic RocksDB write
        fn write_batch(&mut self, batch: WriteBatch) -> Result<()> {
            let mut rocks_batch = rocksdb::WriteBatch::default();
            for (key, op) in batch.iter() {
                match op {
                    Some(value) => rocks_batch.put(key, value),
                    None => rocks_batch.delete(key),
                }
            }
            self.db.write(rocks_batch).map_err(backend)
        }
    }
}

// Re-export for convenience
pub use cache_db::CacheStore;
pub use memory_db::MemoryStore;
pub use rocks_db::RocksStore;
