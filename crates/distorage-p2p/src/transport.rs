use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::TransportConfig;
use crate::decoder::{Decoder, RawDecoder};
use crate::error::{TransportError, TransportResult};
use crate::handshake::{Handshake, NopHandshake, PeerObserver};
use crate::message::Envelope;
use crate::peer::{Direction, Peer, TcpPeer};

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Anything that hands out inbound connections.
#[async_trait]
pub trait Acceptor: Send + 'static {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl Acceptor for TcpListener {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

/// Node-to-node transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Bind the listen address and start accepting in the background.
    async fn listen_and_accept(&self) -> TransportResult<()>;

    /// Take the receiving end of the delivery channel. Succeeds once.
    fn consume(&self) -> TransportResult<mpsc::Receiver<Envelope>>;

    /// Open an outbound connection and handle it like an accepted one.
    async fn dial(&self, addr: &str) -> TransportResult<()>;

    /// Stop accepting. Established connections are left running.
    async fn close(&self) -> TransportResult<()>;
}

/// Construction options for [`TcpTransport`].
#[derive(Clone)]
pub struct TcpTransportOpts {
    pub listen_addr: String,
    pub handshake: Arc<dyn Handshake>,
    pub on_peer: Option<Arc<dyn PeerObserver>>,
    pub decoder: Arc<dyn Decoder>,
    pub channel_capacity: usize,
    pub max_connections: Option<usize>,
    pub handshake_timeout: Option<Duration>,
    pub max_consecutive_decode_errors: u32,
}

impl TcpTransportOpts {
    /// Trust-everyone defaults: no-op handshake, raw decoder.
    pub fn new(listen_addr: impl Into<String>) -> Self {
        let defaults = TransportConfig::default();
        Self {
            listen_addr: listen_addr.into(),
            handshake: Arc::new(NopHandshake),
            on_peer: None,
            decoder: Arc::new(RawDecoder::new(defaults.raw_buffer_size)),
            channel_capacity: defaults.channel_capacity,
            max_connections: defaults.max_connections,
            handshake_timeout: None,
            max_consecutive_decode_errors: defaults.max_consecutive_decode_errors,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            listen_addr: config.listen_addr.clone(),
            handshake: config.handshake.build(),
            on_peer: None,
            decoder: config
                .decoder
                .build(config.raw_buffer_size, config.max_message_size),
            channel_capacity: config.channel_capacity,
            max_connections: config.max_connections,
            handshake_timeout: config.handshake_timeout_ms.map(Duration::from_millis),
            max_consecutive_decode_errors: config.max_consecutive_decode_errors,
        }
    }

    pub fn with_handshake(mut self, handshake: Arc<dyn Handshake>) -> Self {
        self.handshake = handshake;
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_on_peer(mut self, observer: Arc<dyn PeerObserver>) -> Self {
        self.on_peer = Some(observer);
        self
    }
}

impl std::fmt::Debug for TcpTransportOpts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransportOpts")
            .field("listen_addr", &self.listen_addr)
            .field("on_peer", &self.on_peer.is_some())
            .field("channel_capacity", &self.channel_capacity)
            .field("max_connections", &self.max_connections)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}

/// Per-connection state machine: handshake, observer, then decode until the
/// peer goes away.
#[derive(Clone)]
struct Pipeline {
    handshake: Arc<dyn Handshake>,
    on_peer: Option<Arc<dyn PeerObserver>>,
    decoder: Arc<dyn Decoder>,
    handshake_timeout: Option<Duration>,
    max_decode_errors: u32,
    tx: mpsc::Sender<Envelope>,
}

impl Pipeline {
    async fn run(self, mut peer: TcpPeer) {
        let addr = peer.remote_addr();
        let direction = peer.direction();

        if let Err(err) = self.handshake(&mut peer).await {
            warn!(%addr, %direction, error = %err, "handshake failed, dropping peer");
            self.drop_peer(peer).await;
            return;
        }
        if let Some(observer) = &self.on_peer {
            if let Err(err) = observer.on_peer(&peer).await {
                warn!(%addr, %direction, error = %err, "peer rejected by observer");
                self.drop_peer(peer).await;
                return;
            }
        }
        debug!(%addr, %direction, "peer ready");

        let mut failures = 0u32;
        loop {
            match self.decoder.decode(&mut peer).await {
                Ok(message) => {
                    failures = 0;
                    if self.tx.send(Envelope::new(addr, message)).await.is_err() {
                        debug!(%addr, "delivery channel closed");
                        break;
                    }
                }
                Err(err) if err.is_disconnect() => {
                    info!(%addr, reason = %err, "peer disconnected");
                    break;
                }
                Err(err) => {
                    failures += 1;
                    error!(%addr, error = %err, failures, "decode error");
                    if self.max_decode_errors != 0 && failures >= self.max_decode_errors {
                        warn!(%addr, failures, "too many consecutive decode errors");
                        break;
                    }
                }
            }
        }
        self.drop_peer(peer).await;
    }

    async fn handshake(&self, peer: &mut TcpPeer) -> TransportResult<()> {
        match self.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, self.handshake.handshake(peer))
                .await
                .map_err(|_| TransportError::Handshake(format!("timed out after {limit:?}")))?,
            None => self.handshake.handshake(peer).await,
        }
    }

    async fn drop_peer(&self, mut peer: TcpPeer) {
        if let Err(err) = peer.close().await {
            debug!(addr = %peer.remote_addr(), error = %err, "error closing peer");
        }
        debug!(addr = %peer.remote_addr(), "dropped peer connection");
    }
}

/// TCP implementation of [`Transport`].
///
/// One background task accepts connections and spawns one task per
/// connection. Every decoded message, from every connection, goes onto a
/// single channel with exactly one consumer. Messages from one connection
/// arrive in order; across connections they interleave arbitrarily.
pub struct TcpTransport {
    listen_addr: String,
    pipeline: Pipeline,
    limiter: Option<Arc<Semaphore>>,
    rx: Mutex<Option<mpsc::Receiver<Envelope>>>,
    local_addr: Mutex<Option<SocketAddr>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl TcpTransport {
    pub fn new(opts: TcpTransportOpts) -> Self {
        let (tx, rx) = mpsc::channel(opts.channel_capacity.max(1));
        let (shutdown, _) = watch::channel(false);
        Self {
            listen_addr: opts.listen_addr,
            pipeline: Pipeline {
                handshake: opts.handshake,
                on_peer: opts.on_peer,
                decoder: opts.decoder,
                handshake_timeout: opts.handshake_timeout,
                max_decode_errors: opts.max_consecutive_decode_errors,
                tx,
            },
            limiter: opts.max_connections.map(|n| Arc::new(Semaphore::new(n.max(1)))),
            rx: Mutex::new(Some(rx)),
            local_addr: Mutex::new(None),
            accept_task: Mutex::new(None),
            shutdown,
        }
    }

    /// The configured listen address.
    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    /// The bound address, once listening. Differs from the configured one
    /// when port 0 was requested.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().expect("local addr lock poisoned")
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run the accept loop over an arbitrary [`Acceptor`].
    pub fn serve<A: Acceptor>(&self, acceptor: A) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let handle = tokio::spawn(accept_loop(
            acceptor,
            self.pipeline.clone(),
            self.limiter.clone(),
            self.shutdown.subscribe(),
        ));
        if let Some(previous) = self
            .accept_task
            .lock()
            .expect("accept task lock poisoned")
            .replace(handle)
        {
            // Only one loop per transport.
            previous.abort();
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn listen_and_accept(&self) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let listener = TcpListener::bind(&self.listen_addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: self.listen_addr.clone(),
                source,
            })?;
        let local = listener.local_addr()?;
        *self.local_addr.lock().expect("local addr lock poisoned") = Some(local);

        self.serve(listener)?;
        info!(addr = %local, "TCP transport listening");
        Ok(())
    }

    fn consume(&self) -> TransportResult<mpsc::Receiver<Envelope>> {
        self.rx
            .lock()
            .expect("receiver lock poisoned")
            .take()
            .ok_or(TransportError::AlreadyConsumed)
    }

    async fn dial(&self, addr: &str) -> TransportResult<()> {
        let peer = TcpPeer::connect(addr).await?;
        info!(addr = %peer.remote_addr(), "dialed peer");
        tokio::spawn(self.pipeline.clone().run(peer));
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        self.shutdown.send_replace(true);
        let task = self.accept_task.lock().expect("accept task lock poisoned").take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "accept loop ended abnormally");
            }
            info!(addr = %self.listen_addr, "TCP transport closed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("listen_addr", &self.listen_addr)
            .field("local_addr", &self.local_addr())
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn accept_loop<A: Acceptor>(
    mut acceptor: A,
    pipeline: Pipeline,
    limiter: Option<Arc<Semaphore>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        let permit: Option<OwnedSemaphorePermit> = match &limiter {
            Some(limiter) => tokio::select! {
                permit = limiter.clone().acquire_owned() => match permit {
                    Ok(permit) => Some(permit),
                    Err(_) => break,
                },
                _ = shutdown.changed() => break,
            },
            None => None,
        };

        tokio::select! {
            accepted = acceptor.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!(%addr, "new incoming connection");
                    let peer = TcpPeer::new(stream, addr, Direction::Inbound);
                    let pipeline = pipeline.clone();
                    tokio::spawn(async move {
                        pipeline.run(peer).await;
                        drop(permit);
                    });
                }
                Err(err) => {
                    error!(error = %err, "TCP accept error");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            _ = shutdown.changed() => break,
        }
    }
    debug!("accept loop stopped");
}
