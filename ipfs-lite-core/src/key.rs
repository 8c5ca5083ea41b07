use cid::Cid;
use std::fmt;

use crate::{Error, Result};

/// Separator that prefixes every block key.
pub const NAMESPACE: &str = "/";

/// A datastore key derived from a CID.
///
/// Keys are always built from the v1 form of a CID, so the v0 and v1
/// encodings of the same content share one record.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(String);

impl Key {
    /// Wraps a raw key string, adding the namespace separator if missing.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw.starts_with(NAMESPACE) {
            Key(raw)
        } else {
            Key(format!("{NAMESPACE}{raw}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Returns the key with its namespace separator removed.
    pub fn name(&self) -> &str {
        &self.0[NAMESPACE.len()..]
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the storage key for a CID, normalizing it to version 1 first.
pub fn cid_to_key(cid: &Cid) -> Result<Key> {
    let v1 = cid
        .into_v1()
        .map_err(|e| Error::InvalidInput(format!("cannot normalize {cid}: {e}")))?;
    Ok(Key(format!("{NAMESPACE}{v1}")))
}

/// Recovers the (version 1) CID a key was derived from.
pub fn key_to_cid(key: &Key) -> Result<Cid> {
    let raw = key
        .as_str()
        .strip_prefix(NAMESPACE)
        .ok_or_else(|| Error::InvalidInput(format!("key {key} lacks namespace")))?;
    parse_cid(raw)
}

/// Parses a CID from its string form (multibase for v1, base58 for v0).
pub fn parse_cid(s: &str) -> Result<Cid> {
    Cid::try_from(s).map_err(|e| Error::InvalidInput(format!("not a valid CID {s:?}: {e}")))
}

/// Parses a CID from its binary form.
pub fn cid_from_bytes(bytes: &[u8]) -> Result<Cid> {
    Cid::try_from(bytes).map_err(|e| Error::InvalidInput(format!("not a valid CID: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{HashAlg, compute_cid};
    use crate::codec::{DAG_CBOR, DAG_PB};

    #[test]
    fn key_versions_collapse() {
        let v1 = compute_cid(DAG_PB, HashAlg::Sha2_256, b"hello");
        let v0 = Cid::new_v0(*v1.hash()).unwrap();
        assert_ne!(v0, v1);
        assert_eq!(cid_to_key(&v0).unwrap(), cid_to_key(&v1).unwrap());
    }

    #[test]
    fn key_round_trip() {
        let cid = compute_cid(DAG_CBOR, HashAlg::Sha2_256, b"test");
        let key = cid_to_key(&cid).unwrap();
        assert!(key.as_str().starts_with('/'));
        assert_eq!(key_to_cid(&key).unwrap(), cid);
    }

    #[test]
    fn key_to_cid_of_v0_returns_v1() {
        let v1 = compute_cid(DAG_PB, HashAlg::Sha2_256, b"legacy");
        let v0 = Cid::new_v0(*v1.hash()).unwrap();
        let back = key_to_cid(&cid_to_key(&v0).unwrap()).unwrap();
        assert_eq!(back, v1);
        assert_eq!(back.hash(), v0.hash());
    }

    #[test]
    fn key_to_cid_rejects_garbage() {
        let err = key_to_cid(&Key::new("not-a-cid")).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn key_display() {
        let k = Key::new("abc");
        assert_eq!(format!("{}", k), "/abc");
        assert_eq!(k.name(), "abc");
    }
}
