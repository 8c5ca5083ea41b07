use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cid::Cid;
use futures::Stream;
use ipld_core::ipld::Ipld;
use log::{debug, info};

use crate::blockservice::BlockService;
use crate::blockstore::BlockStore;
use crate::codec::{CodecRef, CodecRegistry};
use crate::config::PeerConfig;
use crate::dagservice::{DagService, TreeOptions};
use crate::datastore::Datastore;
use crate::exchange::Exchange;
use crate::reader::ResolveResult;
use crate::Result;

/// A lightweight peer: a DAG service over a local block store, optionally
/// backed by an exchange.
pub struct Peer<D> {
    config: PeerConfig,
    dag: DagService<D>,
    exchange: Option<Arc<dyn Exchange>>,
    started: AtomicBool,
}

impl<D: Datastore> Peer<D> {
    /// Creates a peer with the default codecs.
    ///
    /// The exchange is attached to the block service unless the config says
    /// to stay offline. Either way it is not started.
    pub fn new(
        store: BlockStore<D>,
        exchange: Option<Arc<dyn Exchange>>,
        config: PeerConfig,
    ) -> Result<Self> {
        Self::with_codecs(store, exchange, config, Arc::new(CodecRegistry::new()))
    }

    pub fn with_codecs(
        store: BlockStore<D>,
        exchange: Option<Arc<dyn Exchange>>,
        config: PeerConfig,
        codecs: Arc<CodecRegistry>,
    ) -> Result<Self> {
        let attached = if config.offline { None } else { exchange.clone() };
        let blocks = BlockService::new(store, attached);
        let dag = DagService::new(blocks, codecs).with_options(config.dag.put_options()?);
        Ok(Self {
            config,
            dag,
            exchange,
            started: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    pub fn dag(&self) -> &DagService<D> {
        &self.dag
    }

    pub fn block_service(&self) -> &BlockService<D> {
        self.dag.block_service()
    }

    /// The exchange this peer runs, or none when configured offline.
    fn active_exchange(&self) -> Option<&Arc<dyn Exchange>> {
        if self.config.offline {
            None
        } else {
            self.exchange.as_ref()
        }
    }

    /// Starts the exchange. An offline peer leaves it idle.
    pub async fn start(&self) -> Result<()> {
        match self.active_exchange() {
            Some(exchange) => {
                exchange.start().await?;
                self.started.store(true, Ordering::SeqCst);
                info!("peer started online");
            }
            None => debug!("peer started offline, no exchange running"),
        }
        Ok(())
    }

    /// Stops the exchange if `start` ran it.
    pub async fn stop(&self) -> Result<()> {
        if let Some(exchange) = self.active_exchange() {
            self.started.store(false, Ordering::SeqCst);
            exchange.stop().await?;
            debug!("peer stopped");
        }
        Ok(())
    }

    /// Whether an exchange is attached and has been started.
    pub fn is_online(&self) -> bool {
        self.started.load(Ordering::SeqCst) && self.block_service().online()
    }

    /// Checks the local store only, never the network.
    pub async fn has_block(&self, cid: &Cid) -> Result<bool> {
        self.block_service().has(cid).await
    }

    pub async fn put<C: Into<CodecRef>>(&self, node: &Ipld, codec: C) -> Result<Cid> {
        self.dag.put(node, codec, None).await
    }

    pub async fn get(&self, cid: &Cid) -> Result<Ipld> {
        self.dag.get(cid).await
    }

    pub fn resolve<'a>(
        &'a self,
        cid: Cid,
        path: &str,
    ) -> impl Stream<Item = Result<ResolveResult>> + use<'a, D> {
        self.dag.resolve(cid, path)
    }

    pub fn tree<'a>(
        &'a self,
        cid: Cid,
        offset_path: Option<&str>,
        options: TreeOptions,
    ) -> impl Stream<Item = Result<String>> + use<'a, D> {
        self.dag.tree(cid, offset_path, options)
    }

    pub async fn remove(&self, cid: &Cid) -> Result<Cid> {
        self.dag.remove(cid).await
    }
}
