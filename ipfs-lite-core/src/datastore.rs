use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use crate::Key;

/// A key/value pair yielded by a datastore query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub value: Vec<u8>,
}

/// Predicate applied to every entry a query visits.
pub type Filter = Arc<dyn Fn(&Entry) -> bool + Send + Sync>;

/// Parameters for a filtered scan over a datastore.
#[derive(Clone, Default)]
pub struct Query {
    pub prefix: Option<String>,
    pub filters: Vec<Filter>,
    pub offset: usize,
    pub limit: Option<usize>,
    /// Yield entries with empty values.
    pub keys_only: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn filter(mut self, f: impl Fn(&Entry) -> bool + Send + Sync + 'static) -> Self {
        self.filters.push(Arc::new(f));
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    /// Whether an entry passes the prefix and every filter.
    pub fn matches(&self, entry: &Entry) -> bool {
        let prefixed = self
            .prefix
            .as_deref()
            .is_none_or(|p| entry.key.as_str().starts_with(p));
        prefixed && self.filters.iter().all(|f| f(entry))
    }

    /// Applies filters, offset, limit and `keys_only` to a raw scan.
    ///
    /// Errors from the scan pass through untouched and do not count toward
    /// the offset or limit.
    pub fn apply<'a, E: 'a>(
        &self,
        entries: impl Iterator<Item = Result<Entry, E>> + 'a,
    ) -> Box<dyn Iterator<Item = Result<Entry, E>> + 'a> {
        let query = self.clone();
        let keys_only = self.keys_only;
        let mut skip = self.offset;
        let mut remaining = self.limit;
        Box::new(
            entries
                .filter(move |r| match r {
                    Ok(e) => query.matches(e),
                    Err(_) => true,
                })
                .filter(move |r| {
                    if r.is_ok() && skip > 0 {
                        skip -= 1;
                        return false;
                    }
                    true
                })
                .map_while(move |r| {
                    if r.is_ok() {
                        match remaining.as_mut() {
                            Some(0) => return None,
                            Some(n) => *n -= 1,
                            None => {}
                        }
                    }
                    Some(r.map(|mut e| {
                        if keys_only {
                            e.value.clear();
                        }
                        e
                    }))
                }),
        )
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("prefix", &self.prefix)
            .field("filters", &self.filters.len())
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .field("keys_only", &self.keys_only)
            .finish()
    }
}

/// Write operations buffered and applied together on `commit`.
pub trait Batch {
    type Error: std::error::Error + Send + Sync + 'static;

    fn put(&mut self, key: Key, value: Vec<u8>);

    fn delete(&mut self, key: Key);

    fn commit(self) -> Result<(), Self::Error>;
}

/// A simple key-value store for block bytes.
///
/// Datastores operate on raw bytes under string keys; mapping CIDs to keys
/// is done by the block store. All methods take `&self` to support stores
/// with internal locking (e.g., RocksDB).
pub trait Datastore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;
    type Batch<'a>: Batch<Error = Self::Error>
    where
        Self: 'a;

    /// Retrieves the bytes associated with a key, or None if not present.
    fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Stores bytes at the given key.
    fn put(&self, key: &Key, value: &[u8]) -> Result<(), Self::Error>;

    /// Checks whether a key exists in the store.
    fn has(&self, key: &Key) -> Result<bool, Self::Error>;

    /// Removes a key. Removing a missing key is not an error.
    fn delete(&self, key: &Key) -> Result<(), Self::Error>;

    fn batch(&self) -> Self::Batch<'_>;

    /// Lazily scans entries in key order.
    fn query<'a>(&'a self, query: &Query)
    -> Box<dyn Iterator<Item = Result<Entry, Self::Error>> + 'a>;

    /// Flushes and releases resources. The default does nothing.
    fn close(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// An in-memory datastore backed by an ordered map.
///
/// Useful for testing and as a reference implementation.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    data: RwLock<BTreeMap<Key, Vec<u8>>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().unwrap().is_empty()
    }

    fn entry_after(&self, last: Option<&Key>) -> Option<Entry> {
        let data = self.data.read().unwrap();
        let lower = match last {
            Some(k) => Bound::Excluded(k),
            None => Bound::Unbounded,
        };
        data.range::<Key, _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| Entry {
                key: k.clone(),
                value: v.clone(),
            })
    }
}

enum Op {
    Put(Key, Vec<u8>),
    Delete(Key),
}

/// Batch for [`MemoryDatastore`], applied under a single write lock.
pub struct MemoryBatch<'a> {
    store: &'a MemoryDatastore,
    ops: Vec<Op>,
}

impl Batch for MemoryBatch<'_> {
    type Error = Infallible;

    fn put(&mut self, key: Key, value: Vec<u8>) {
        self.ops.push(Op::Put(key, value));
    }

    fn delete(&mut self, key: Key) {
        self.ops.push(Op::Delete(key));
    }

    fn commit(self) -> Result<(), Self::Error> {
        let mut data = self.store.data.write().unwrap();
        for op in self.ops {
            match op {
                Op::Put(k, v) => {
                    data.insert(k, v);
                }
                Op::Delete(k) => {
                    data.remove(&k);
                }
            }
        }
        Ok(())
    }
}

impl Datastore for MemoryDatastore {
    type Error = Infallible;
    type Batch<'a> = MemoryBatch<'a>;

    fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.data.read().unwrap().get(key).cloned())
    }

    fn put(&self, key: &Key, value: &[u8]) -> Result<(), Self::Error> {
        self.data.write().unwrap().insert(key.clone(), value.to_vec());
        Ok(())
    }

    fn has(&self, key: &Key) -> Result<bool, Self::Error> {
        Ok(self.data.read().unwrap().contains_key(key))
    }

    fn delete(&self, key: &Key) -> Result<(), Self::Error> {
        self.data.write().unwrap().remove(key);
        Ok(())
    }

    fn batch(&self) -> Self::Batch<'_> {
        MemoryBatch {
            store: self,
            ops: Vec::new(),
        }
    }

    fn query<'a>(
        &'a self,
        query: &Query,
    ) -> Box<dyn Iterator<Item = Result<Entry, Self::Error>> + 'a> {
        // Walks by re-locking per step so writers are never blocked by a reader.
        let mut last: Option<Key> = None;
        let scan = std::iter::from_fn(move || {
            let entry = self.entry_after(last.as_ref())?;
            last = Some(entry.key.clone());
            Some(Ok(entry))
        });
        query.apply(scan)
    }
}
