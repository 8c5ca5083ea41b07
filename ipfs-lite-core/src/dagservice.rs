use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use cid::{Cid, Version};
use futures::{Stream, StreamExt};
use ipld_core::ipld::Ipld;
use log::{debug, trace, warn};

use crate::block::{HashAlg, compute_cid};
use crate::blockservice::BlockService;
use crate::codec::{Codec, CodecRef, CodecRegistry, DAG_PB};
use crate::datastore::Datastore;
use crate::reader::{NodeReader, ResolveResult, segments};
use crate::{Block, Error, Result};

/// Parameters for encoding and storing a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Hash function for the CID. Defaults to the codec's choice.
    pub hash_alg: Option<HashAlg>,
    /// Compute the CID without storing the block.
    pub only_hash: bool,
    /// CID version. Defaults to 1; version 0 needs dag-pb and sha2-256.
    pub cid_version: Option<Version>,
}

impl PutOptions {
    pub fn hash_alg(mut self, alg: HashAlg) -> Self {
        self.hash_alg = Some(alg);
        self
    }

    pub fn only_hash(mut self) -> Self {
        self.only_hash = true;
        self
    }

    pub fn cid_version(mut self, version: Version) -> Self {
        self.cid_version = Some(version);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeOptions {
    /// Follow links and list the paths of linked nodes too.
    pub recursive: bool,
}

impl TreeOptions {
    pub fn recursive() -> Self {
        TreeOptions { recursive: true }
    }
}

/// Stores and retrieves IPLD nodes, and walks paths across the blocks they
/// link to.
///
/// Encoding is delegated to codecs looked up in a shared registry; bytes go
/// through the block service, so an online service transparently fetches
/// linked blocks from the network during resolution.
pub struct DagService<D> {
    blocks: BlockService<D>,
    codecs: Arc<CodecRegistry>,
    defaults: PutOptions,
}

impl<D: Datastore> DagService<D> {
    pub fn new(blocks: BlockService<D>, codecs: Arc<CodecRegistry>) -> Self {
        Self {
            blocks,
            codecs,
            defaults: PutOptions::default(),
        }
    }

    /// Replaces the options used when a call passes none.
    pub fn with_options(mut self, defaults: PutOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn default_options(&self) -> &PutOptions {
        &self.defaults
    }

    pub fn block_service(&self) -> &BlockService<D> {
        &self.blocks
    }

    pub fn codecs(&self) -> &Arc<CodecRegistry> {
        &self.codecs
    }

    /// Encodes a node and computes its CID without storing anything.
    pub fn encode(
        &self,
        node: &Ipld,
        codec: &dyn Codec,
        options: &PutOptions,
    ) -> Result<Block> {
        let data = codec.encode(node).map_err(|e| {
            Error::InvalidInput(format!("cannot encode node as {}: {e}", codec.name()))
        })?;
        let alg = options.hash_alg.unwrap_or_else(|| codec.default_hash());
        let cid = match options.cid_version.unwrap_or(Version::V1) {
            Version::V1 => compute_cid(codec.code(), alg, &data),
            Version::V0 => {
                if codec.code() != DAG_PB || alg != HashAlg::Sha2_256 {
                    return Err(Error::InvalidInput(format!(
                        "CIDv0 needs dag-pb and sha2-256, got {} and {alg}",
                        codec.name()
                    )));
                }
                Cid::new_v0(*compute_cid(DAG_PB, alg, &data).hash())?
            }
        };
        Ok(Block::with_cid(data, cid))
    }

    /// Encodes and stores a node, returning its CID.
    pub async fn put<C: Into<CodecRef>>(
        &self,
        node: &Ipld,
        codec: C,
        options: Option<&PutOptions>,
    ) -> Result<Cid> {
        let codec = self.codecs.lookup(&codec.into())?;
        let options = options.unwrap_or(&self.defaults);
        let block = self.encode(node, codec.as_ref(), options)?;
        let cid = *block.cid();
        if !options.only_hash {
            debug!("put {} node {cid}", codec.name());
            self.blocks.put(block).await?;
        }
        Ok(cid)
    }

    /// Stores nodes one by one as the stream is polled, yielding CIDs in
    /// input order.
    ///
    /// A failing node yields an error in its place; the nodes after it are
    /// still stored.
    pub fn put_many<'a, I, C>(
        &'a self,
        nodes: I,
        codec: C,
        options: Option<&PutOptions>,
    ) -> impl Stream<Item = Result<Cid>> + use<'a, D, I, C>
    where
        I: IntoIterator<Item = Ipld>,
        C: Into<CodecRef>,
    {
        let codec = codec.into();
        let options = options.unwrap_or(&self.defaults).clone();
        futures::stream::iter(nodes).then(move |node| {
            let codec = codec.clone();
            let options = options.clone();
            async move { self.put(&node, codec, Some(&options)).await }
        })
    }

    /// Fetches a block and decodes it with the codec named in its CID.
    pub async fn get(&self, cid: &Cid) -> Result<Ipld> {
        let block = self.blocks.get(cid).await?;
        let codec = self.codecs.by_code(cid.codec())?;
        codec.decode(block.data()).map_err(|e| Error::Decode {
            cid: *cid,
            message: e.0,
        })
    }

    /// Decodes nodes as the stream is polled. Each failure stays with its
    /// own element.
    pub fn get_many<'a, I>(&'a self, cids: I) -> impl Stream<Item = Result<Ipld>> + use<'a, D, I>
    where
        I: IntoIterator<Item = Cid>,
    {
        futures::stream::iter(cids).then(move |cid| async move { self.get(&cid).await })
    }

    async fn reader(&self, cid: &Cid) -> Result<Box<dyn NodeReader>> {
        let block = self.blocks.get(cid).await?;
        let codec = self.codecs.by_code(cid.codec())?;
        codec.reader(block.data()).map_err(|e| Error::Decode {
            cid: *cid,
            message: e.0,
        })
    }

    /// Resolves `path` starting at `cid`, yielding one result per block.
    ///
    /// The first result comes from the root block. Whenever a result is a
    /// link, the next one comes from the linked block, resolving what
    /// remains of the path there. The stream ends after the first result
    /// that is not a link, or after the first error.
    pub fn resolve<'a>(
        &'a self,
        cid: Cid,
        path: &str,
    ) -> impl Stream<Item = Result<ResolveResult>> + use<'a, D> {
        let start = Some((cid, path.to_string()));
        futures::stream::try_unfold(
            (start, HashSet::new()),
            move |(next, mut seen): (Option<(Cid, String)>, HashSet<(Cid, String)>)| async move {
                let Some((cid, path)) = next else {
                    return Ok(None);
                };
                if !seen.insert((cid, path.clone())) {
                    warn!("resolution of {path:?} looped back to {cid}");
                    return Err(Error::CyclicLink(cid));
                }
                trace!("resolving {path:?} in {cid}");
                let result = self.reader(&cid).await?.get(&path)?;
                let next = result
                    .link()
                    .map(|link| (*link, result.remainder_path.clone()));
                Ok(Some((result, (next, seen))))
            },
        )
    }

    /// Lists the paths reachable from `cid`.
    ///
    /// Only paths strictly below `offset_path` are yielded, relative to it.
    /// With `recursive`, each linked node is listed after the paths of the
    /// node linking to it, its paths prefixed by the link's own path. Nodes
    /// are fetched only as the stream is polled, and links that cannot lead
    /// below the offset are not fetched at all.
    pub fn tree<'a>(
        &'a self,
        cid: Cid,
        offset_path: Option<&str>,
        options: TreeOptions,
    ) -> impl Stream<Item = Result<String>> + use<'a, D> {
        let offset = offset_path
            .map(|p| segments(p).collect::<Vec<_>>().join("/"))
            .unwrap_or_default();
        let walk = TreeWalk {
            offset,
            recursive: options.recursive,
            stack: vec![Frame {
                cid,
                prefix: String::new(),
                parent: None,
            }],
            pending: VecDeque::new(),
        };
        futures::stream::try_unfold(walk, move |mut walk| async move {
            loop {
                if let Some(path) = walk.pending.pop_front() {
                    return Ok(Some((path, walk)));
                }
                let Some(frame) = walk.stack.pop() else {
                    return Ok(None);
                };
                if frame.parent.as_ref().is_some_and(|p| p.contains(&frame.cid)) {
                    warn!("tree walk found a cyclic link to {}", frame.cid);
                    return Err(Error::CyclicLink(frame.cid));
                }
                trace!("listing {} under {:?}", frame.cid, frame.prefix);
                let reader = self.reader(&frame.cid).await?;
                for path in reader.tree() {
                    let full = join(&frame.prefix, &path);
                    if let Some(relative) = walk.relative(&full) {
                        walk.pending.push_back(relative);
                    }
                }
                if walk.recursive {
                    let lineage = Arc::new(Lineage {
                        cid: frame.cid,
                        parent: frame.parent.clone(),
                    });
                    // Reversed so the first link is popped first.
                    for (path, link) in reader.links().into_iter().rev() {
                        let prefix = join(&frame.prefix, &path);
                        if !walk.reaches(&prefix) {
                            trace!("skipping {link} at {prefix:?}, outside the offset");
                            continue;
                        }
                        walk.stack.push(Frame {
                            cid: link,
                            prefix,
                            parent: Some(Arc::clone(&lineage)),
                        });
                    }
                }
            }
        })
    }

    /// Removes a node's block from the local store.
    pub async fn remove(&self, cid: &Cid) -> Result<Cid> {
        self.blocks.delete(cid).await?;
        Ok(*cid)
    }

    /// Removes nodes one by one as the stream is polled.
    ///
    /// Not atomic: the stream ends at the first failure, and every CID
    /// yielded before it has been removed.
    pub fn remove_many<'a, I>(&'a self, cids: I) -> impl Stream<Item = Result<Cid>> + use<'a, D, I>
    where
        I: IntoIterator<Item = Cid>,
    {
        futures::stream::try_unfold(cids.into_iter(), move |mut cids| async move {
            match cids.next() {
                Some(cid) => Ok(Some((self.remove(&cid).await?, cids))),
                None => Ok::<_, Error>(None),
            }
        })
    }
}

/// Pending state of a tree listing.
struct TreeWalk {
    offset: String,
    recursive: bool,
    stack: Vec<Frame>,
    pending: VecDeque<String>,
}

impl TreeWalk {
    /// Strips the offset from a path that lies strictly below it.
    fn relative(&self, full: &str) -> Option<String> {
        if self.offset.is_empty() {
            return Some(full.to_string());
        }
        full.strip_prefix(self.offset.as_str())?
            .strip_prefix('/')
            .map(str::to_string)
    }

    /// Whether a node linked at `prefix` can list anything below the offset.
    fn reaches(&self, prefix: &str) -> bool {
        let (short, long) = if prefix.len() <= self.offset.len() {
            (prefix, self.offset.as_str())
        } else {
            (self.offset.as_str(), prefix)
        };
        short.is_empty()
            || long == short
            || long
                .strip_prefix(short)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// A node still to be listed, with the path of the link that reached it.
struct Frame {
    cid: Cid,
    prefix: String,
    parent: Option<Arc<Lineage>>,
}

/// The chain of nodes a frame was reached through.
struct Lineage {
    cid: Cid,
    parent: Option<Arc<Lineage>>,
}

impl Lineage {
    fn contains(&self, cid: &Cid) -> bool {
        let mut node = Some(self);
        while let Some(n) = node {
            if n.cid == *cid {
                return true;
            }
            node = n.parent.as_deref();
        }
        false
    }
}

fn join(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{prefix}/{path}")
    }
}
