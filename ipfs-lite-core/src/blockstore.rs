use cid::Cid;
use futures::Stream;
use log::debug;

use crate::datastore::{Batch, Datastore, Entry, Query};
use crate::key::{Key, cid_to_key, key_to_cid};
use crate::{Block, Error, Result};

/// Adds, removes and retrieves immutable blocks over a key-value datastore.
///
/// Every CID is normalized to version 1 before its key is derived, so a
/// block written under a v0 CID can be read back with the v1 form and the
/// other way around.
#[derive(Debug)]
pub struct BlockStore<D> {
    datastore: D,
}

impl<D: Datastore> BlockStore<D> {
    pub fn new(datastore: D) -> Self {
        Self { datastore }
    }

    /// Returns the underlying datastore.
    pub fn datastore(&self) -> &D {
        &self.datastore
    }

    pub fn cid_to_key(cid: &Cid) -> Result<Key> {
        cid_to_key(cid)
    }

    pub fn key_to_cid(key: &Key) -> Result<Cid> {
        key_to_cid(key)
    }

    /// Stores a block unless a record already exists under its key.
    pub async fn put(&self, block: &Block) -> Result<()> {
        let key = cid_to_key(block.cid())?;
        if self.datastore.has(&key).map_err(Error::datastore)? {
            return Ok(());
        }
        debug!("put block {} ({} bytes)", block.cid(), block.data().len());
        self.datastore
            .put(&key, block.data())
            .map_err(Error::datastore)
    }

    /// Stores several blocks in one datastore batch, skipping existing ones.
    pub async fn put_many(&self, blocks: impl IntoIterator<Item = Block>) -> Result<()> {
        let mut batch = self.datastore.batch();
        let mut written = 0usize;
        for block in blocks {
            let key = cid_to_key(block.cid())?;
            if self.datastore.has(&key).map_err(Error::datastore)? {
                continue;
            }
            batch.put(key, block.into_data());
            written += 1;
        }
        debug!("put_many committing {written} blocks");
        batch.commit().map_err(Error::datastore)
    }

    /// Returns the block for `cid`, tagged with the CID exactly as requested.
    pub async fn get(&self, cid: &Cid) -> Result<Block> {
        let key = cid_to_key(cid)?;
        match self.datastore.get(&key).map_err(Error::datastore)? {
            Some(data) => Ok(Block::with_cid(data, *cid)),
            None => Err(Error::NotFound(*cid)),
        }
    }

    pub async fn has(&self, cid: &Cid) -> Result<bool> {
        let key = cid_to_key(cid)?;
        self.datastore.has(&key).map_err(Error::datastore)
    }

    pub async fn delete(&self, cid: &Cid) -> Result<()> {
        let key = cid_to_key(cid)?;
        debug!("delete block {cid}");
        self.datastore.delete(&key).map_err(Error::datastore)
    }

    /// Scans the datastore, yielding raw entries rather than blocks.
    ///
    /// Each call starts a fresh scan.
    pub fn query<'a>(&'a self, query: &Query) -> impl Stream<Item = Result<Entry>> + use<'a, D> {
        let entries = self.datastore.query(query);
        futures::stream::iter(entries.map(|r| r.map_err(Error::datastore)))
    }

    pub fn close(&self) -> Result<()> {
        self.datastore.close().map_err(Error::datastore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::HashAlg;
    use crate::codec::{DAG_PB, RAW};
    use crate::datastore::MemoryDatastore;
    use futures::TryStreamExt;

    fn raw_block(data: &[u8]) -> Block {
        Block::new(RAW, HashAlg::Sha2_256, data.to_vec())
    }

    #[tokio::test]
    async fn put_get() {
        let store = BlockStore::new(MemoryDatastore::new());
        let block = raw_block(b"hello world");

        store.put(&block).await.unwrap();
        let retrieved = store.get(block.cid()).await.unwrap();

        assert_eq!(retrieved, block);
    }

    #[tokio::test]
    async fn get_missing() {
        let store = BlockStore::new(MemoryDatastore::new());
        let block = raw_block(b"nonexistent");

        let err = store.get(block.cid()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn put_is_idempotent() {
        let store = BlockStore::new(MemoryDatastore::new());
        let block = raw_block(b"once");

        store.put(&block).await.unwrap();
        store.put(&block).await.unwrap();

        assert_eq!(store.datastore().len(), 1);
    }

    #[tokio::test]
    async fn first_writer_wins() {
        let store = BlockStore::new(MemoryDatastore::new());
        let block = raw_block(b"original");
        store.put(&block).await.unwrap();

        let forged = Block::with_cid(b"forged".to_vec(), *block.cid());
        store.put(&forged).await.unwrap();

        assert_eq!(store.get(block.cid()).await.unwrap().data(), b"original");
    }

    #[tokio::test]
    async fn version_agnostic() {
        let store = BlockStore::new(MemoryDatastore::new());
        let block = Block::new(DAG_PB, HashAlg::Sha2_256, b"pb bytes".to_vec());
        let v0 = Cid::new_v0(*block.cid().hash()).unwrap();

        store.put(&block).await.unwrap();
        assert!(store.has(&v0).await.unwrap());

        let by_v0 = store.get(&v0).await.unwrap();
        assert_eq!(by_v0.cid(), &v0);
        assert_eq!(by_v0.data(), block.data());

        store.delete(&v0).await.unwrap();
        assert!(!store.has(block.cid()).await.unwrap());
    }

    #[tokio::test]
    async fn delete_then_get_fails() {
        let store = BlockStore::new(MemoryDatastore::new());
        let block = raw_block(b"short lived");
        store.put(&block).await.unwrap();
        store.delete(block.cid()).await.unwrap();

        assert!(store.get(block.cid()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn put_many_skips_existing() {
        let store = BlockStore::new(MemoryDatastore::new());
        let blocks: Vec<Block> = (0u8..3).map(|i| raw_block(&[i])).collect();
        store.put(&blocks[0]).await.unwrap();

        store.put_many(blocks.clone()).await.unwrap();

        assert_eq!(store.datastore().len(), 3);
        for block in &blocks {
            assert_eq!(&store.get(block.cid()).await.unwrap(), block);
        }
    }

    #[tokio::test]
    async fn query_yields_raw_entries() {
        let store = BlockStore::new(MemoryDatastore::new());
        let blocks: Vec<Block> = (0u8..3).map(|i| raw_block(&[i, i])).collect();
        store.put_many(blocks.clone()).await.unwrap();

        let entries: Vec<Entry> = store.query(&Query::new()).try_collect().await.unwrap();
        assert_eq!(entries.len(), 3);
        for entry in entries {
            let cid = BlockStore::<MemoryDatastore>::key_to_cid(&entry.key).unwrap();
            assert_eq!(store.get(&cid).await.unwrap().data(), entry.value.as_slice());
        }

        let limited: Vec<Entry> = store
            .query(&Query::new().limit(1).keys_only())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert!(limited[0].value.is_empty());
    }
}
