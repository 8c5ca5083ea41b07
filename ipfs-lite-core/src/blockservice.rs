use std::sync::{Arc, PoisonError, RwLock};

use cid::Cid;
use futures::StreamExt;
use futures::stream::BoxStream;
use log::debug;

use crate::blockstore::BlockStore;
use crate::datastore::Datastore;
use crate::exchange::Exchange;
use crate::{Block, Result};

/// A block store that can fall back to the network.
///
/// While an exchange is attached the service is online: reads and writes go
/// through the exchange, which checks its local cache before asking peers.
/// Detaching the exchange takes the service offline, after which every call
/// is served by the local store. The choice is made per call.
pub struct BlockService<D> {
    store: BlockStore<D>,
    exchange: RwLock<Option<Arc<dyn Exchange>>>,
}

impl<D: Datastore> BlockService<D> {
    pub fn new(store: BlockStore<D>, exchange: Option<Arc<dyn Exchange>>) -> Self {
        Self {
            store,
            exchange: RwLock::new(exchange),
        }
    }

    /// Creates a service with no exchange.
    pub fn offline(store: BlockStore<D>) -> Self {
        Self::new(store, None)
    }

    pub fn store(&self) -> &BlockStore<D> {
        &self.store
    }

    /// Returns the attached exchange, if any.
    pub fn exchange(&self) -> Option<Arc<dyn Exchange>> {
        self.exchange
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Attaches or detaches the exchange, returning the previous one.
    pub fn set_exchange(&self, exchange: Option<Arc<dyn Exchange>>) -> Option<Arc<dyn Exchange>> {
        let mut slot = self.exchange.write().unwrap_or_else(PoisonError::into_inner);
        debug!(
            "block service going {}",
            if exchange.is_some() { "online" } else { "offline" }
        );
        std::mem::replace(&mut *slot, exchange)
    }

    /// Whether an exchange is attached.
    pub fn online(&self) -> bool {
        self.exchange
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub async fn put(&self, block: Block) -> Result<()> {
        match self.exchange() {
            Some(exchange) => exchange.put(block).await,
            None => self.store.put(&block).await,
        }
    }

    pub async fn put_many(&self, blocks: Vec<Block>) -> Result<()> {
        match self.exchange() {
            Some(exchange) => exchange.put_many(blocks).await,
            None => self.store.put_many(blocks).await,
        }
    }

    /// Returns a block, asking the network if online.
    pub async fn get(&self, cid: &Cid) -> Result<Block> {
        match self.exchange() {
            Some(exchange) => exchange.get(cid).await,
            None => self.store.get(cid).await,
        }
    }

    /// Returns blocks in request order.
    ///
    /// Offline, each block is read when its element is polled, so a missing
    /// block fails only its own element.
    pub fn get_many(&self, cids: Vec<Cid>) -> BoxStream<'_, Result<Block>> {
        match self.exchange() {
            Some(exchange) => exchange.get_many(cids),
            None => futures::stream::iter(cids)
                .then(move |cid| async move { self.store.get(&cid).await })
                .boxed(),
        }
    }

    /// Checks the local store only.
    pub async fn has(&self, cid: &Cid) -> Result<bool> {
        self.store.has(cid).await
    }

    /// Removes a block from the local store. The exchange is never asked.
    pub async fn delete(&self, cid: &Cid) -> Result<()> {
        self.store.delete(cid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::block::HashAlg;
    use crate::codec::RAW;
    use crate::datastore::MemoryDatastore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Exchange that serves from its own map and counts calls.
    #[derive(Default)]
    struct CountingExchange {
        blocks: Mutex<HashMap<Cid, Vec<u8>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Exchange for CountingExchange {
        async fn get(&self, cid: &Cid) -> Result<Block> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let data = self.blocks.lock().unwrap().get(cid).cloned();
            data.map(|d| Block::with_cid(d, *cid))
                .ok_or(Error::NotFound(*cid))
        }

        async fn put(&self, block: Block) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let cid = *block.cid();
            self.blocks.lock().unwrap().insert(cid, block.into_data());
            Ok(())
        }

        async fn start(&self) -> Result<()> {
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            Ok(())
        }
    }

    fn raw_block(data: &[u8]) -> Block {
        Block::new(RAW, HashAlg::Sha2_256, data.to_vec())
    }

    #[tokio::test]
    async fn offline_routes_to_store() {
        let service = BlockService::offline(BlockStore::new(MemoryDatastore::new()));
        assert!(!service.online());

        let block = raw_block(b"local");
        service.put(block.clone()).await.unwrap();

        assert!(service.store().has(block.cid()).await.unwrap());
        assert_eq!(service.get(block.cid()).await.unwrap(), block);
    }

    #[tokio::test]
    async fn online_routes_to_exchange() {
        let exchange = Arc::new(CountingExchange::default());
        let service = BlockService::offline(BlockStore::new(MemoryDatastore::new()));

        service.set_exchange(Some(exchange.clone()));
        assert!(service.online());

        let block = raw_block(b"remote");
        service.put(block.clone()).await.unwrap();
        assert!(!service.store().has(block.cid()).await.unwrap());

        assert_eq!(service.get(block.cid()).await.unwrap(), block);
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn going_offline_mid_session() {
        let exchange = Arc::new(CountingExchange::default());
        let service = BlockService::new(
            BlockStore::new(MemoryDatastore::new()),
            Some(exchange.clone() as Arc<dyn Exchange>),
        );
        let block = raw_block(b"only remote");
        service.put(block.clone()).await.unwrap();

        let previous = service.set_exchange(None);
        assert!(previous.is_some());
        assert!(!service.online());
        assert!(service.get(block.cid()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn get_many_offline_is_lazy_per_element() {
        let service = BlockService::offline(BlockStore::new(MemoryDatastore::new()));
        let present = raw_block(b"present");
        let missing = raw_block(b"missing");
        service.put(present.clone()).await.unwrap();

        let mut stream = service.get_many(vec![*present.cid(), *missing.cid(), *present.cid()]);
        assert_eq!(stream.next().await.unwrap().unwrap(), present);
        assert!(stream.next().await.unwrap().unwrap_err().is_not_found());
        assert_eq!(stream.next().await.unwrap().unwrap(), present);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn get_many_online_uses_exchange() {
        let exchange = Arc::new(CountingExchange::default());
        let service = BlockService::new(
            BlockStore::new(MemoryDatastore::new()),
            Some(exchange.clone() as Arc<dyn Exchange>),
        );
        let blocks: Vec<Block> = (0u8..3).map(|i| raw_block(&[i])).collect();
        service.put_many(blocks.clone()).await.unwrap();

        let fetched: Vec<Block> = service
            .get_many(blocks.iter().map(|b| *b.cid()).collect())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(fetched, blocks);
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn delete_only_touches_store() {
        let exchange = Arc::new(CountingExchange::default());
        let service = BlockService::offline(BlockStore::new(MemoryDatastore::new()));
        let block = raw_block(b"both");
        service.put(block.clone()).await.unwrap();
        exchange.put(block.clone()).await.unwrap();
        service.set_exchange(Some(exchange.clone()));

        service.delete(block.cid()).await.unwrap();

        assert!(!service.has(block.cid()).await.unwrap());
        // Still retrievable from the network side
        assert_eq!(service.get(block.cid()).await.unwrap(), block);
    }
}
