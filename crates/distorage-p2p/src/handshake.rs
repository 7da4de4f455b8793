use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{TransportError, TransportResult};
use crate::message::PROTOCOL_VERSION;
use crate::peer::{Peer, TcpPeer};

/// Magic bytes opening a [`HelloHandshake`].
pub const HELLO_MAGIC: [u8; 4] = *b"DSTG";

/// Negotiation run on every new connection before any message is decoded.
#[async_trait]
pub trait Handshake: Send + Sync {
    async fn handshake(&self, peer: &mut TcpPeer) -> TransportResult<()>;
}

/// Accepts every peer without exchanging anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NopHandshake;

#[async_trait]
impl Handshake for NopHandshake {
    async fn handshake(&self, _peer: &mut TcpPeer) -> TransportResult<()> {
        Ok(())
    }
}

/// Symmetric hello: each side sends `HELLO_MAGIC` followed by its protocol
/// version (u32, big-endian) and checks the other side's.
#[derive(Clone, Copy, Debug)]
pub struct HelloHandshake {
    version: u32,
}

impl HelloHandshake {
    pub fn new(version: u32) -> Self {
        Self { version }
    }

    pub fn version(&self) -> u32 {
        self.version
    }
}

impl Default for HelloHandshake {
    fn default() -> Self {
        Self::new(PROTOCOL_VERSION)
    }
}

#[async_trait]
impl Handshake for HelloHandshake {
    async fn handshake(&self, peer: &mut TcpPeer) -> TransportResult<()> {
        let mut hello = [0u8; 8];
        hello[..4].copy_from_slice(&HELLO_MAGIC);
        hello[4..].copy_from_slice(&self.version.to_be_bytes());
        peer.write_all(&hello).await?;
        peer.flush().await?;

        let mut remote = [0u8; 8];
        peer.read_exact(&mut remote).await?;
        if remote[..4] != HELLO_MAGIC {
            return Err(TransportError::Handshake(format!(
                "bad magic {:?} from {}",
                &remote[..4],
                peer.remote_addr()
            )));
        }
        let remote_version = u32::from_be_bytes([remote[4], remote[5], remote[6], remote[7]]);
        if remote_version != self.version {
            return Err(TransportError::Handshake(format!(
                "version mismatch: local {}, remote {}",
                self.version, remote_version
            )));
        }
        Ok(())
    }
}

/// Handshake selection for configuration files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandshakeKind {
    #[default]
    Nop,
    Hello,
}

impl HandshakeKind {
    pub fn build(self) -> Arc<dyn Handshake> {
        match self {
            Self::Nop => Arc::new(NopHandshake),
            Self::Hello => Arc::new(HelloHandshake::default()),
        }
    }
}

impl std::str::FromStr for HandshakeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nop" | "none" => Ok(Self::Nop),
            "hello" => Ok(Self::Hello),
            other => Err(format!("unknown handshake: {other}")),
        }
    }
}

/// Called with each peer after its handshake succeeds. Returning an error
/// drops the peer.
#[async_trait]
pub trait PeerObserver: Send + Sync {
    async fn on_peer(&self, peer: &dyn Peer) -> TransportResult<()>;
}

#[async_trait]
impl<F> PeerObserver for F
where
    F: Fn(&dyn Peer) -> TransportResult<()> + Send + Sync,
{
    async fn on_peer(&self, peer: &dyn Peer) -> TransportResult<()> {
        (self)(peer)
    }
}
