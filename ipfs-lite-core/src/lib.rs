//! Content-addressed block storage and merkle-DAG resolution for a
//! lightweight peer.
//!
//! Core concepts:
//! - **Block**: immutable bytes identified by a CID computed over them
//! - **Datastore**: the key-value engine blocks are persisted in
//! - **BlockStore**: maps CIDs to blocks over a datastore
//! - **Exchange**: fetches blocks from other peers when attached
//! - **BlockService**: routes each call to the exchange or the local store
//! - **DagService**: encodes IPLD nodes with pluggable codecs and walks paths across links
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! use futures::TryStreamExt;
//! use ipfs_lite_core::{
//!     BlockService, BlockStore, CodecRegistry, DagService, Ipld, MemoryDatastore,
//! };
//!
//! futures::executor::block_on(async {
//!     let blocks = BlockService::offline(BlockStore::new(MemoryDatastore::new()));
//!     let dag = DagService::new(blocks, Arc::new(CodecRegistry::new()));
//!
//!     let leaf = dag.put(&Ipld::String("leaf".into()), "dag-cbor", None).await?;
//!     let root = Ipld::Map(BTreeMap::from([("child".to_string(), Ipld::Link(leaf))]));
//!     let root = dag.put(&root, "dag-cbor", None).await?;
//!
//!     let hops: Vec<_> = dag.resolve(root, "child").try_collect().await?;
//!     assert_eq!(hops.len(), 2);
//!     assert_eq!(hops[1].value, Ipld::String("leaf".into()));
//!     Ok::<_, ipfs_lite_core::Error>(())
//! })
//! .unwrap();
//! ```
//!
//! # Storage keys
//!
//! Blocks are stored under `/` followed by the base32 form of their CID
//! converted to version 1, so v0 and v1 CIDs of the same content share one
//! record.

mod block;
mod blockservice;
mod blockstore;
pub mod codec;
mod config;
mod dagservice;
mod datastore;
mod error;
mod exchange;
mod key;
mod peer;
mod reader;

pub use block::{Block, HashAlg, compute_cid};
pub use blockservice::BlockService;
pub use blockstore::BlockStore;
pub use cid::{Cid, Version};
pub use codec::{Codec, CodecError, CodecRef, CodecRegistry};
pub use config::{DagConfig, PeerConfig};
pub use dagservice::{DagService, PutOptions, TreeOptions};
pub use datastore::{Batch, Datastore, Entry, Filter, MemoryBatch, MemoryDatastore, Query};
pub use error::{BoxError, Error, Result};
pub use exchange::Exchange;
pub use ipld_core::ipld::Ipld;
pub use key::{Key, cid_from_bytes, parse_cid};
pub use peer::Peer;
pub use reader::{IpldReader, NodeReader, ResolveResult};
