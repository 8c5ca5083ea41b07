use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Hash functions a CID can be computed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HashAlg {
    #[default]
    Sha2_256,
    Sha2_512,
    Blake3,
}

impl HashAlg {
    /// Multicodec name of the hash function.
    pub fn name(self) -> &'static str {
        match self {
            HashAlg::Sha2_256 => "sha2-256",
            HashAlg::Sha2_512 => "sha2-512",
            HashAlg::Blake3 => "blake3",
        }
    }

    /// Multicodec code of the hash function.
    pub fn code(self) -> u64 {
        match self {
            HashAlg::Sha2_256 => 0x12,
            HashAlg::Sha2_512 => 0x13,
            HashAlg::Blake3 => 0x1e,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        [HashAlg::Sha2_256, HashAlg::Sha2_512, HashAlg::Blake3]
            .into_iter()
            .find(|alg| alg.code() == code)
    }

    fn table(self) -> Code {
        match self {
            HashAlg::Sha2_256 => Code::Sha2_256,
            HashAlg::Sha2_512 => Code::Sha2_512,
            HashAlg::Blake3 => Code::Blake3_256,
        }
    }
}

impl FromStr for HashAlg {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sha2-256" => Ok(HashAlg::Sha2_256),
            "sha2-512" => Ok(HashAlg::Sha2_512),
            "blake3" => Ok(HashAlg::Blake3),
            other => Err(Error::InvalidInput(format!("unsupported hash algorithm {other:?}"))),
        }
    }
}

impl TryFrom<String> for HashAlg {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<HashAlg> for String {
    fn from(alg: HashAlg) -> Self {
        alg.name().to_string()
    }
}

impl fmt::Display for HashAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Computes a v1 CID for `data` under the given codec and hash function.
pub fn compute_cid(codec: u64, alg: HashAlg, data: &[u8]) -> Cid {
    Cid::new_v1(codec, alg.table().digest(data))
}

/// An immutable block of data referenced by its CID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    data: Vec<u8>,
    cid: Cid,
}

impl Block {
    /// Hashes `data` and builds the block for it.
    pub fn new(codec: u64, alg: HashAlg, data: Vec<u8>) -> Self {
        let cid = compute_cid(codec, alg, &data);
        Block { data, cid }
    }

    /// Pairs data with a CID the caller vouches for.
    pub fn with_cid(data: Vec<u8>, cid: Cid) -> Self {
        Block { data, cid }
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Checks that the data hashes to the digest in the CID.
    pub fn verify(&self) -> Result<bool> {
        let hash = self.cid.hash();
        let alg = HashAlg::from_code(hash.code()).ok_or_else(|| {
            Error::InvalidInput(format!("unsupported hash code {:#x}", hash.code()))
        })?;
        Ok(alg.table().digest(&self.data) == *hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DAG_CBOR, RAW};

    #[test]
    fn cid_deterministic() {
        let c1 = compute_cid(RAW, HashAlg::Sha2_256, b"hello world");
        let c2 = compute_cid(RAW, HashAlg::Sha2_256, b"hello world");
        assert_eq!(c1, c2);
        assert_eq!(c1.codec(), RAW);
        assert_eq!(c1.hash().code(), 0x12);
    }

    #[test]
    fn cid_depends_on_algorithm() {
        let sha = compute_cid(RAW, HashAlg::Sha2_256, b"x");
        let blake = compute_cid(RAW, HashAlg::Blake3, b"x");
        assert_ne!(sha, blake);
        assert_eq!(blake.hash().code(), 0x1e);
        assert_eq!(compute_cid(RAW, HashAlg::Sha2_512, b"x").hash().size(), 64);
    }

    #[test]
    fn block_verify() {
        let block = Block::new(DAG_CBOR, HashAlg::Blake3, b"payload".to_vec());
        assert!(block.verify().unwrap());

        let forged = Block::with_cid(b"other".to_vec(), *block.cid());
        assert!(!forged.verify().unwrap());
    }

    #[test]
    fn hash_alg_names() {
        for alg in [HashAlg::Sha2_256, HashAlg::Sha2_512, HashAlg::Blake3] {
            assert_eq!(alg.name().parse::<HashAlg>().unwrap(), alg);
            assert_eq!(HashAlg::from_code(alg.code()), Some(alg));
        }
        assert!("md5".parse::<HashAlg>().is_err());
    }
}
