use std::path::Path;

use cid::Version;
use serde::Deserialize;

use crate::block::HashAlg;
use crate::dagservice::PutOptions;
use crate::{Error, Result};

/// Peer settings, usually read from a TOML file:
///
/// ```toml
/// offline = false
///
/// [dag]
/// hash_alg = "blake3"
/// cid_version = 1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PeerConfig {
    /// Keep the exchange detached, serving everything from the local store.
    #[serde(default)]
    pub offline: bool,
    #[serde(default)]
    pub dag: DagConfig,
}

/// Defaults applied to DAG puts that pass no options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DagConfig {
    pub hash_alg: Option<HashAlg>,
    pub cid_version: Option<u64>,
    #[serde(default)]
    pub only_hash: bool,
}

impl PeerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PeerConfig = toml::from_str(content)
            .map_err(|e| Error::InvalidInput(format!("bad peer config: {e}")))?;
        // Surface a bad CID version now rather than on the first put
        config.dag.put_options()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidInput(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }
}

impl DagConfig {
    pub fn put_options(&self) -> Result<PutOptions> {
        let cid_version = self.cid_version.map(Version::try_from).transpose()?;
        Ok(PutOptions {
            hash_alg: self.hash_alg,
            only_hash: self.only_hash,
            cid_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        let config = PeerConfig::from_toml_str("").unwrap();
        assert_eq!(config, PeerConfig::default());
        assert_eq!(config.dag.put_options().unwrap(), PutOptions::default());
    }

    #[test]
    fn full_config() {
        let config = PeerConfig::from_toml_str(
            r#"
            offline = true

            [dag]
            hash_alg = "sha2-512"
            cid_version = 0
            only_hash = true
            "#,
        )
        .unwrap();

        assert!(config.offline);
        let options = config.dag.put_options().unwrap();
        assert_eq!(options.hash_alg, Some(HashAlg::Sha2_512));
        assert_eq!(options.cid_version, Some(Version::V0));
        assert!(options.only_hash);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("peer.toml");
        std::fs::write(&path, "offline = true\n\n[dag]\nhash_alg = \"blake3\"\n").unwrap();

        let config = PeerConfig::load(&path).unwrap();
        assert!(config.offline);
        assert_eq!(config.dag.hash_alg, Some(HashAlg::Blake3));

        let missing = PeerConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, Error::InvalidInput(_)));
    }

    #[test]
    fn rejects_unknown_hash() {
        let err = PeerConfig::from_toml_str("[dag]\nhash_alg = \"md5\"").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn rejects_bad_cid_version() {
        let err = PeerConfig::from_toml_str("[dag]\ncid_version = 7").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
