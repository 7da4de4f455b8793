use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use distorage_p2p::{Envelope, TcpTransport, TcpTransportOpts, Transport};
use distorage_store::{ContentStore, DiskStore};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::error::ServerResult;

pub struct FileServerOpts {
    /// Listen address, used for log context.
    pub listen_addr: String,
    pub store: Arc<dyn ContentStore>,
    pub transport: Arc<dyn Transport>,
}

/// A storage node: one content store, one transport, one dispatch loop.
///
/// [`FileServer::start`] blocks until [`FileServer::stop`] is called, so a
/// caller that needs to keep going runs it in its own task.
pub struct FileServer {
    listen_addr: String,
    store: Arc<dyn ContentStore>,
    transport: Arc<dyn Transport>,
    stop: watch::Sender<bool>,
    received: AtomicU64,
}

impl FileServer {
    pub fn new(opts: FileServerOpts) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            listen_addr: opts.listen_addr,
            store: opts.store,
            transport: opts.transport,
            stop,
            received: AtomicU64::new(0),
        }
    }

    /// Build a node with a disk store and a TCP transport.
    pub fn from_config(config: &NodeConfig) -> Self {
        let transport = TcpTransport::new(TcpTransportOpts::from_config(&config.transport));
        Self::new(FileServerOpts {
            listen_addr: config.transport.listen_addr.clone(),
            store: Arc::new(DiskStore::new(config.storage.clone())),
            transport: Arc::new(transport),
        })
    }

    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Number of envelopes the dispatch loop has taken off the channel.
    pub fn messages_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Start listening, then run the dispatch loop until stopped.
    ///
    /// If the delivery channel cannot be taken the transport is closed
    /// again before the error is returned.
    pub async fn start(&self) -> ServerResult<()> {
        self.transport.listen_and_accept().await?;
        let rx = match self.transport.consume() {
            Ok(rx) => rx,
            Err(err) => {
                warn!(addr = %self.listen_addr, error = %err, "cannot take delivery channel");
                self.transport.close().await?;
                return Err(err.into());
            }
        };
        self.dispatch(rx).await
    }

    /// Ask the dispatch loop to exit. Safe to call any number of times.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    async fn dispatch(&self, mut rx: mpsc::Receiver<Envelope>) -> ServerResult<()> {
        let mut stop = self.stop.subscribe();
        loop {
            if *stop.borrow_and_update() {
                break;
            }
            tokio::select! {
                biased;
                _ = stop.changed() => {}
                envelope = rx.recv() => match envelope {
                    Some(envelope) => self.handle(envelope),
                    None => {
                        warn!(addr = %self.listen_addr, "delivery channel closed");
                        break;
                    }
                },
            }
        }

        info!(addr = %self.listen_addr, "stopping server");
        self.transport.close().await?;
        Ok(())
    }

    fn handle(&self, envelope: Envelope) {
        self.received.fetch_add(1, Ordering::Relaxed);
        info!(
            from = %envelope.from(),
            bytes = envelope.payload().len(),
            "received message"
        );
    }
}

impl std::fmt::Debug for FileServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileServer")
            .field("listen_addr", &self.listen_addr)
            .field("stopped", &self.is_stopped())
            .field("messages_received", &self.messages_received())
            .finish()
    }
}
