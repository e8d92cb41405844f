//! Sniffer rebroadcast server.
//!
//! Exposes captured radio packets as ZEP datagrams over TCP for a live
//! Wireshark session. At most one client is served: a new connection
//! replaces the previous one. Delivery is best-effort through a bounded
//! queue so the serial read loop never waits on the network.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use metrics::counter;
use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use cngate_telemetry::counters::{SNIFFER_DROPPED, SNIFFER_FORWARDED};
use cngate_telemetry::TelemetrySink;

/// Default rebroadcast port.
pub const DEFAULT_PORT: u16 = 30000;

/// Datagrams queued toward a slow client before drops start.
const QUEUE_DEPTH: usize = 64;

// ============================================================================
// Shared state
// ============================================================================

/// State shared between the accept loop, the client task, and the
/// synchronous send path.
struct Shared {
    /// A client is currently connected.
    connected: AtomicBool,
    /// Queue toward the current client, if any.
    slot: RwLock<Option<mpsc::Sender<Vec<u8>>>>,
    /// Id of the connection owning the slot.
    current_id: AtomicU64,
    sink: Arc<dyn TelemetrySink>,
}

impl Shared {
    fn emit_client_event(&self, value: u32) {
        let (ts_s, ts_us) = unix_now();
        self.sink.emit_event(ts_s, ts_us, value, "sniffer_client");
    }
}

// ============================================================================
// Server
// ============================================================================

/// Handle to the running rebroadcast server.
///
/// The accept loop and client writer run on a private tokio runtime;
/// [`SnifferServer::send_capture`] is callable from any thread and never
/// blocks.
pub struct SnifferServer {
    shared: Arc<Shared>,
    local_port: u16,
    _runtime: tokio::runtime::Runtime,
}

impl SnifferServer {
    /// Bind the listener and start accepting. Port 0 picks a free port.
    pub fn start(port: u16, sink: Arc<dyn TelemetrySink>) -> io::Result<SnifferServer> {
        let std_listener = std::net::TcpListener::bind(("0.0.0.0", port))?;
        std_listener.set_nonblocking(true)?;
        let local_port = std_listener.local_addr()?.port();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("sniffer-server")
            .enable_all()
            .build()?;

        let shared = Arc::new(Shared {
            connected: AtomicBool::new(false),
            slot: RwLock::new(None),
            current_id: AtomicU64::new(0),
            sink,
        });

        let task_shared = shared.clone();
        runtime.spawn(async move {
            match TcpListener::from_std(std_listener) {
                Ok(listener) => run_listener(listener, task_shared).await,
                Err(err) => error!("sniffer listener setup failed: {}", err),
            }
        });

        info!("sniffer server listening on port {}", local_port);
        Ok(SnifferServer {
            shared,
            local_port,
            _runtime: runtime,
        })
    }

    /// Port the listener actually bound.
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Whether a client is connected right now.
    pub fn has_client(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Queue one datagram toward the connected client.
    ///
    /// Never blocks: a full queue or a vanished client drops the
    /// datagram. Returns whether it was queued.
    pub fn send_capture(&self, datagram: Vec<u8>) -> bool {
        let slot = self.shared.slot.read();
        let sender = match slot.as_ref() {
            Some(sender) => sender,
            None => {
                counter!(SNIFFER_DROPPED, "reason" => "no_client").increment(1);
                return false;
            }
        };
        match sender.try_send(datagram) {
            Ok(()) => {
                counter!(SNIFFER_FORWARDED).increment(1);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                counter!(SNIFFER_DROPPED, "reason" => "queue_full").increment(1);
                debug!("sniffer queue full, dropping capture");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                counter!(SNIFFER_DROPPED, "reason" => "closed").increment(1);
                false
            }
        }
    }
}

// ============================================================================
// Listener and client tasks
// ============================================================================

async fn run_listener(listener: TcpListener, shared: Arc<Shared>) {
    let mut next_id: u64 = 0;
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                next_id += 1;
                let (sender, receiver) = mpsc::channel(QUEUE_DEPTH);
                // Publish the new connection first: the replaced task's
                // cleanup checks the id and backs off.
                shared.current_id.store(next_id, Ordering::SeqCst);
                *shared.slot.write() = Some(sender);
                if !shared.connected.swap(true, Ordering::SeqCst) {
                    shared.emit_client_event(1);
                }
                info!("sniffer client connected from {}", peer);
                tokio::spawn(handle_client(stream, receiver, next_id, shared.clone()));
            }
            Err(err) => {
                warn!("sniffer accept failed: {}", err);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Serve one client until it closes, errors, or is replaced.
async fn handle_client(
    stream: TcpStream,
    mut receiver: mpsc::Receiver<Vec<u8>>,
    id: u64,
    shared: Arc<Shared>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let mut read_buf = [0u8; 256];

    loop {
        tokio::select! {
            maybe = receiver.recv() => {
                match maybe {
                    Some(datagram) => {
                        if writer.write_all(&datagram).await.is_err() {
                            break;
                        }
                        if writer.flush().await.is_err() {
                            break;
                        }
                    }
                    // Sender replaced or server gone.
                    None => break,
                }
            }
            result = reader.read(&mut read_buf) => {
                match result {
                    Ok(0) | Err(_) => break,
                    // The client has nothing useful to say; drain it.
                    Ok(_) => {}
                }
            }
        }
    }

    // Only the connection still owning the slot may clear it.
    if shared.current_id.load(Ordering::SeqCst) == id {
        *shared.slot.write() = None;
        if shared.connected.swap(false, Ordering::SeqCst) {
            shared.emit_client_event(0);
        }
        info!("sniffer client disconnected");
    }
}

fn unix_now() -> (u32, u32) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now.as_secs() as u32, now.subsec_micros())
}
