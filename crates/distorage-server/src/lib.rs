//! distorage node.
//!
//! A [`FileServer`] owns a content store and a peer transport. Starting it
//! binds the transport and runs a dispatch loop over every message peers
//! send, until [`FileServer::stop`] is called.

pub mod config;
pub mod error;
pub mod server;

pub use config::NodeConfig;
pub use error::{ServerError, ServerResult};
pub use server::{FileServer, FileServerOpts};

#[cfg(test)]
mod tests {
    use super::*;
    use distorage_p2p::{
        DecoderKind, Handshake, HandshakeKind, HelloHandshake, Message, MessageCodec, TcpPeer,
        TcpTransport, TcpTransportOpts,
    };
    use distorage_store::{ContentStore, DiskStore, PathTransform, StoreConfig};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn structured_node_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NodeConfig::default();
        config.storage = StoreConfig::new(dir.path().join("3000_network"), PathTransform::Cas);
        config.transport.listen_addr = "127.0.0.1:0".into();
        config.transport.decoder = DecoderKind::Structured;
        config.transport.handshake = HandshakeKind::Hello;

        let transport = Arc::new(TcpTransport::new(TcpTransportOpts::from_config(
            &config.transport,
        )));
        let server = Arc::new(FileServer::new(FileServerOpts {
            listen_addr: config.transport.listen_addr.clone(),
            store: Arc::new(DiskStore::new(config.storage.clone())),
            transport: transport.clone(),
        }));
        let running = tokio::spawn({
            let server = Arc::clone(&server);
            async move { server.start().await }
        });

        let addr = timeout(WAIT, async {
            loop {
                if let Some(addr) = transport.local_addr() {
                    return addr;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let mut peer = TcpPeer::connect(&addr.to_string()).await.unwrap();
        HelloHandshake::default().handshake(&mut peer).await.unwrap();
        for payload in [&b"first"[..], b"second", b"third"] {
            let frame = MessageCodec::encode(&Message::new(payload.to_vec())).unwrap();
            peer.write_all(&frame).await.unwrap();
        }

        timeout(WAIT, async {
            while server.messages_received() < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        server.store().write_bytes("bestpicture", b"oscar").await.unwrap();
        assert_eq!(server.store().read_bytes("bestpicture").await.unwrap(), b"oscar");

        server.stop();
        timeout(WAIT, running).await.unwrap().unwrap().unwrap();
    }
}
