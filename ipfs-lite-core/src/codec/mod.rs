//! Codec dispatch.
//!
//! Codecs turn IPLD nodes into block bytes and back. The DAG service never
//! encodes anything itself; it looks codecs up by name in a shared
//! [`CodecRegistry`], translating legacy numeric codes to names first.

mod dag_cbor;
mod dag_pb;
mod raw;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use ipld_core::ipld::Ipld;

use crate::block::HashAlg;
use crate::reader::{IpldReader, NodeReader};
use crate::{Error, Result};

pub use dag_cbor::DagCborCodec;
pub use dag_pb::DagPbCodec;
pub use raw::RawCodec;

/// Raw binary codec code (0x55).
pub const RAW: u64 = 0x55;
/// DAG-PB codec code (0x70).
pub const DAG_PB: u64 = 0x70;
/// DAG-CBOR codec code (0x71).
pub const DAG_CBOR: u64 = 0x71;

/// Multicodec names for the codes this crate may meet in CIDs.
const MULTICODECS: &[(&str, u64)] = &[
    ("identity", 0x00),
    ("sha2-256", 0x12),
    ("sha2-512", 0x13),
    ("blake3", 0x1e),
    ("raw", RAW),
    ("dag-pb", DAG_PB),
    ("dag-cbor", DAG_CBOR),
    ("libp2p-key", 0x72),
    ("git-raw", 0x78),
    ("dag-jose", 0x85),
    ("dag-cose", 0x86),
    ("dag-json", 0x0129),
    ("json", 0x0200),
];

/// Name registered for a multicodec code.
pub fn multicodec_name(code: u64) -> Option<&'static str> {
    MULTICODECS
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| *name)
}

/// Code registered for a multicodec name.
pub fn multicodec_code(name: &str) -> Option<u64> {
    MULTICODECS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, code)| *code)
}

/// Error from a codec body.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CodecError(pub String);

impl CodecError {
    pub fn new(message: impl fmt::Display) -> Self {
        CodecError(message.to_string())
    }
}

/// An encode/decode strategy for one block format.
pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;

    /// Multicodec code stamped into CIDs of blocks this codec produces.
    fn code(&self) -> u64;

    /// Hash function used when the caller does not pick one.
    fn default_hash(&self) -> HashAlg {
        HashAlg::Sha2_256
    }

    fn encode(&self, node: &Ipld) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<Ipld, CodecError>;

    /// Builds a path reader over encoded bytes.
    fn reader(&self, bytes: &[u8]) -> Result<Box<dyn NodeReader>, CodecError> {
        Ok(Box::new(IpldReader::new(self.decode(bytes)?)))
    }
}

/// Names a codec either by multicodec name or by legacy numeric code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CodecRef {
    Name(String),
    Code(u64),
}

impl Default for CodecRef {
    fn default() -> Self {
        CodecRef::Name(DagCborCodec::NAME.to_string())
    }
}

impl From<&str> for CodecRef {
    fn from(name: &str) -> Self {
        CodecRef::Name(name.to_string())
    }
}

impl From<String> for CodecRef {
    fn from(name: String) -> Self {
        CodecRef::Name(name)
    }
}

impl From<u64> for CodecRef {
    fn from(code: u64) -> Self {
        CodecRef::Code(code)
    }
}

impl fmt::Display for CodecRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecRef::Name(name) => f.write_str(name),
            CodecRef::Code(code) => write!(f, "{code:#x}"),
        }
    }
}

/// Codecs available to a DAG service, keyed by name.
///
/// Registration goes through `&self`, so a registry shared behind an `Arc`
/// can still be extended at runtime.
pub struct CodecRegistry {
    codecs: RwLock<HashMap<String, Arc<dyn Codec>>>,
}

impl CodecRegistry {
    /// Creates a registry with no codecs.
    pub fn empty() -> Self {
        CodecRegistry {
            codecs: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry with dag-cbor, dag-pb and raw.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register(Arc::new(DagCborCodec));
        registry.register(Arc::new(DagPbCodec));
        registry.register(Arc::new(RawCodec));
        registry
    }

    /// Adds a codec, replacing any codec already registered under its name.
    pub fn register(&self, codec: Arc<dyn Codec>) -> Option<Arc<dyn Codec>> {
        let name = codec.name().to_string();
        self.codecs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, codec)
    }

    /// Looks a codec up by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Codec>> {
        self.codecs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownCodec(name.to_string()))
    }

    /// Looks a codec up by multicodec code.
    ///
    /// Known codes are translated to names first; otherwise the registered
    /// codecs are searched for one that claims the code.
    pub fn by_code(&self, code: u64) -> Result<Arc<dyn Codec>> {
        if let Some(name) = multicodec_name(code) {
            if let Ok(codec) = self.get(name) {
                return Ok(codec);
            }
        }
        self.codecs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|c| c.code() == code)
            .cloned()
            .ok_or_else(|| Error::UnknownCodec(format!("{code:#x}")))
    }

    pub fn lookup(&self, codec: &CodecRef) -> Result<Arc<dyn Codec>> {
        match codec {
            CodecRef::Name(name) => self.get(name),
            CodecRef::Code(code) => self.by_code(*code),
        }
    }

    /// Names of all registered codecs, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .codecs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("codecs", &self.names())
            .finish()
    }
}
