use ipld_core::ipld::Ipld;

use super::{Codec, CodecError, DAG_CBOR};

/// DAG-CBOR, backed by `serde_ipld_dagcbor`.
///
/// Map keys are written in canonical order and links as CBOR tag 42.
#[derive(Debug, Clone, Copy, Default)]
pub struct DagCborCodec;

impl DagCborCodec {
    pub const NAME: &'static str = "dag-cbor";
}

impl Codec for DagCborCodec {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn code(&self) -> u64 {
        DAG_CBOR
    }

    fn encode(&self, node: &Ipld) -> Result<Vec<u8>, CodecError> {
        serde_ipld_dagcbor::to_vec(node).map_err(CodecError::new)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Ipld, CodecError> {
        serde_ipld_dagcbor::from_slice(bytes).map_err(CodecError::new)
    }
}
