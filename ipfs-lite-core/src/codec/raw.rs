use ipld_core::ipld::Ipld;

use super::{Codec, CodecError, RAW};

/// Raw bytes, stored as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn code(&self) -> u64 {
        RAW
    }

    fn encode(&self, node: &Ipld) -> Result<Vec<u8>, CodecError> {
        match node {
            Ipld::Bytes(bytes) => Ok(bytes.clone()),
            other => Err(CodecError(format!(
                "raw codec only encodes bytes, got {other:?}"
            ))),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Ipld, CodecError> {
        Ok(Ipld::Bytes(bytes.to_vec()))
    }
}
