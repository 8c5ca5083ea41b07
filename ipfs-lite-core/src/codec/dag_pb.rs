//! DAG-PB: the protobuf node format used by UnixFS.
//!
//! Wire handling is left to `prost`; this module only maps between the
//! protobuf messages and the IPLD data model
//! `{Data?: bytes, Links: [{Hash: link, Name?: string, Tsize?: int}]}`.

use std::collections::BTreeMap;

use cid::Cid;
use ipld_core::ipld::Ipld;
use prost::Message as ProstMessage;

use super::{Codec, CodecError, DAG_PB};

/// DAG-PB codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct DagPbCodec;

#[derive(Clone, PartialEq, prost::Message)]
struct PbLink {
    #[prost(bytes = "vec", optional, tag = "1")]
    hash: Option<Vec<u8>>,
    #[prost(string, optional, tag = "2")]
    name: Option<String>,
    #[prost(uint64, optional, tag = "3")]
    tsize: Option<u64>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct PbNode {
    #[prost(bytes = "vec", optional, tag = "1")]
    data: Option<Vec<u8>>,
    #[prost(message, repeated, tag = "2")]
    links: Vec<PbLink>,
}

impl PbNode {
    /// Canonical bytes: every link, then the data.
    ///
    /// prost writes fields in tag order, so the two halves are encoded
    /// separately and concatenated.
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let links = PbNode {
            data: None,
            links: self.links.clone(),
        };
        let data = PbNode {
            data: self.data.clone(),
            links: Vec::new(),
        };
        let mut out = links.encode_to_vec();
        out.extend(data.encode_to_vec());
        out
    }

    fn from_ipld(node: &Ipld) -> Result<Self, CodecError> {
        let Ipld::Map(map) = node else {
            return Err(CodecError::new("DAG-PB node must be a map"));
        };
        if let Some(key) = map.keys().find(|k| *k != "Data" && *k != "Links") {
            return Err(CodecError(format!("unexpected DAG-PB node key {key:?}")));
        }
        let data = match map.get("Data") {
            None => None,
            Some(Ipld::Bytes(b)) => Some(b.clone()),
            Some(_) => return Err(CodecError::new("DAG-PB Data must be bytes")),
        };
        let links = match map.get("Links") {
            Some(Ipld::List(links)) => links
                .iter()
                .map(PbLink::from_ipld)
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(CodecError::new("DAG-PB Links must be a list")),
        };
        let sorted = links.windows(2).all(|w| {
            w[0].name.as_deref().unwrap_or("").as_bytes()
                <= w[1].name.as_deref().unwrap_or("").as_bytes()
        });
        if !sorted {
            return Err(CodecError::new("DAG-PB links must be sorted by Name"));
        }
        Ok(PbNode { data, links })
    }

    fn into_ipld(self) -> Result<Ipld, CodecError> {
        let mut map = BTreeMap::new();
        if let Some(data) = self.data {
            map.insert("Data".to_string(), Ipld::Bytes(data));
        }
        let links = self
            .links
            .into_iter()
            .map(PbLink::into_ipld)
            .collect::<Result<Vec<_>, _>>()?;
        map.insert("Links".to_string(), Ipld::List(links));
        Ok(Ipld::Map(map))
    }
}

impl PbLink {
    fn from_ipld(link: &Ipld) -> Result<Self, CodecError> {
        let Ipld::Map(map) = link else {
            return Err(CodecError::new("DAG-PB link must be a map"));
        };
        if let Some(key) = map
            .keys()
            .find(|k| !matches!(k.as_str(), "Hash" | "Name" | "Tsize"))
        {
            return Err(CodecError(format!("unexpected DAG-PB link key {key:?}")));
        }
        let hash = match map.get("Hash") {
            Some(Ipld::Link(cid)) => cid.to_bytes(),
            _ => return Err(CodecError::new("DAG-PB link Hash must be a link")),
        };
        let name = match map.get("Name") {
            None => None,
            Some(Ipld::String(s)) => Some(s.clone()),
            Some(_) => return Err(CodecError::new("DAG-PB link Name must be a string")),
        };
        let tsize = match map.get("Tsize") {
            None => None,
            Some(Ipld::Integer(n)) => Some(
                u64::try_from(*n).map_err(|_| CodecError::new("DAG-PB Tsize out of range"))?,
            ),
            Some(_) => return Err(CodecError::new("DAG-PB link Tsize must be an integer")),
        };
        Ok(PbLink {
            hash: Some(hash),
            name,
            tsize,
        })
    }

    fn into_ipld(self) -> Result<Ipld, CodecError> {
        let hash = self
            .hash
            .ok_or_else(|| CodecError::new("DAG-PB link without Hash"))?;
        let cid = Cid::try_from(hash.as_slice()).map_err(CodecError::new)?;
        let mut map = BTreeMap::new();
        map.insert("Hash".to_string(), Ipld::Link(cid));
        if let Some(name) = self.name {
            map.insert("Name".to_string(), Ipld::String(name));
        }
        if let Some(tsize) = self.tsize {
            map.insert("Tsize".to_string(), Ipld::Integer(tsize.into()));
        }
        Ok(Ipld::Map(map))
    }
}

impl Codec for DagPbCodec {
    fn name(&self) -> &'static str {
        "dag-pb"
    }

    fn code(&self) -> u64 {
        DAG_PB
    }

    fn encode(&self, node: &Ipld) -> Result<Vec<u8>, CodecError> {
        Ok(PbNode::from_ipld(node)?.to_canonical_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Ipld, CodecError> {
        let node = PbNode::decode(bytes).map_err(CodecError::new)?;
        // Anything prost tolerates but would not write back (reordered or
        // repeated fields, unknown fields, padded varints) changes the hash.
        if node.to_canonical_bytes() != bytes {
            return Err(CodecError::new("DAG-PB block is not in canonical form"));
        }
        node.into_ipld()
    }
}
