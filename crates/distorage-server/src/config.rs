use std::path::Path;

use distorage_p2p::TransportConfig;
use distorage_store::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Everything a node needs at construction.
///
/// ```toml
/// [storage]
/// root = "3000_network"
/// transform = "cas"
///
/// [transport]
/// listen_addr = "0.0.0.0:3000"
/// decoder = "raw"
/// handshake = "nop"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub storage: StoreConfig,
    pub transport: TransportConfig,
}

impl NodeConfig {
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distorage_p2p::{DecoderKind, HandshakeKind};
    use distorage_store::PathTransform;
    use std::path::PathBuf;

    #[test]
    fn default_config() {
        let c = NodeConfig::default();
        assert_eq!(c.storage.root, PathBuf::from(distorage_store::DEFAULT_ROOT));
        assert_eq!(c.transport.listen_addr, distorage_p2p::DEFAULT_LISTEN_ADDR);
    }

    #[test]
    fn parse_sections() {
        let c = NodeConfig::from_toml_str(
            r#"
            [storage]
            root = "3000_network"
            transform = "identity"

            [transport]
            listen_addr = ":3000"
            decoder = "structured"
            handshake = "hello"
            handshake_timeout_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(c.storage.root, PathBuf::from("3000_network"));
        assert_eq!(c.storage.transform, PathTransform::Identity);
        assert_eq!(c.transport.listen_addr, ":3000");
        assert_eq!(c.transport.decoder, DecoderKind::Structured);
        assert_eq!(c.transport.handshake, HandshakeKind::Hello);
        assert_eq!(c.transport.handshake_timeout_ms, Some(500));
    }

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(NodeConfig::from_toml_str("").unwrap(), NodeConfig::default());
    }

    #[test]
    fn rejects_unknown_decoder() {
        let err = NodeConfig::from_toml_str("[transport]\ndecoder = \"gob\"").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn toml_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        let mut config = NodeConfig::default();
        config.transport.max_connections = Some(32);
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        assert_eq!(NodeConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn load_missing_file() {
        let err = NodeConfig::load(Path::new("/nonexistent/node.toml")).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
