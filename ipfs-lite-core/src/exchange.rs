use std::sync::Arc;

use async_trait::async_trait;
use cid::Cid;
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::{Block, Result};

/// Network-fetch capability that retrieves blocks from, and announces blocks
/// to, other peers.
///
/// An exchange keeps its own local copy of blocks it is given; the block
/// service hands it writes instead of the store while it is attached.
/// Implementations report their own failures as [`crate::Error::Exchange`]
/// and missing blocks as [`crate::Error::NotFound`]. Bounding the time spent
/// on the network is up to the exchange.
#[async_trait]
pub trait Exchange: Send + Sync + 'static {
    /// Returns a block, checking the local cache before the network.
    async fn get(&self, cid: &Cid) -> Result<Block>;

    async fn put(&self, block: Block) -> Result<()>;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Batch get - default impl calls get() for one CID at a time as the
    /// stream is polled.
    fn get_many(self: Arc<Self>, cids: Vec<Cid>) -> BoxStream<'static, Result<Block>> {
        futures::stream::iter(cids)
            .then(move |cid| {
                let exchange = Arc::clone(&self);
                async move { exchange.get(&cid).await }
            })
            .boxed()
    }

    /// Batch put - default impl calls put() in sequence.
    async fn put_many(&self, blocks: Vec<Block>) -> Result<()> {
        for block in blocks {
            self.put(block).await?;
        }
        Ok(())
    }
}
