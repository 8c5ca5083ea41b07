//! RocksDB-backed datastore for ipfs-lite.

use std::path::Path;
use std::string::FromUtf8Error;

use ipfs_lite_core::{Batch, Datastore, Entry, Key, Query};
use rocksdb::{DB, Direction, IteratorMode, Options, WriteBatch};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RocksError {
    #[error("RocksDB error: {0}")]
    Db(#[from] rocksdb::Error),
    #[error("stored key is not UTF-8: {0}")]
    Key(#[from] FromUtf8Error),
}

/// A persistent datastore backed by RocksDB.
pub struct RocksDatastore {
    db: DB,
}

impl RocksDatastore {
    /// Opens a RocksDB datastore at the given path.
    ///
    /// Creates the database if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RocksError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }
}

/// Writes collected into one RocksDB `WriteBatch`.
pub struct RocksBatch<'a> {
    db: &'a DB,
    batch: WriteBatch,
}

impl Batch for RocksBatch<'_> {
    type Error = RocksError;

    fn put(&mut self, key: Key, value: Vec<u8>) {
        self.batch.put(key.as_bytes(), value);
    }

    fn delete(&mut self, key: Key) {
        self.batch.delete(key.as_bytes());
    }

    fn commit(self) -> Result<(), Self::Error> {
        self.db.write(self.batch)?;
        Ok(())
    }
}

impl Datastore for RocksDatastore {
    type Error = RocksError;
    type Batch<'a> = RocksBatch<'a>;

    fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.db.get(key.as_bytes())?)
    }

    fn put(&self, key: &Key, value: &[u8]) -> Result<(), Self::Error> {
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    fn has(&self, key: &Key) -> Result<bool, Self::Error> {
        Ok(self.db.get_pinned(key.as_bytes())?.is_some())
    }

    fn delete(&self, key: &Key) -> Result<(), Self::Error> {
        self.db.delete(key.as_bytes())?;
        Ok(())
    }

    fn batch(&self) -> Self::Batch<'_> {
        RocksBatch {
            db: &self.db,
            batch: WriteBatch::default(),
        }
    }

    fn query<'a>(
        &'a self,
        query: &Query,
    ) -> Box<dyn Iterator<Item = Result<Entry, Self::Error>> + 'a> {
        let prefix = query.prefix.clone().unwrap_or_default();
        let mode = IteratorMode::From(prefix.as_bytes(), Direction::Forward);
        let scan = self
            .db
            .iterator(mode)
            .take_while(move |item| match item {
                Ok((key, _)) => key.starts_with(prefix.as_bytes()),
                Err(_) => true,
            })
            .map(|item| -> Result<Entry, RocksError> {
                let (key, value) = item?;
                let key = String::from_utf8(key.into_vec())?;
                Ok(Entry {
                    key: Key::new(key),
                    value: value.into_vec(),
                })
            });
        query.apply(scan)
    }

    fn close(&self) -> Result<(), Self::Error> {
        self.db.flush()?;
        Ok(())
    }
}
