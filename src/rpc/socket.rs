//! UDP socket layer: the fixed-record codec on a datagram socket, with
//! request/response pairing by peer address.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use lru::LruCache;
use tracing::trace;

use crate::common::{Address, Message, Opcode, MESSAGE_SIZE};
use crate::config::Config;
use crate::Result;

/// Default UDP port of the overlay.
pub const DEFAULT_PORT: u16 = 6464;
/// Default request timeout before a non-responding peer counts as a failed
/// exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(2000);

const UDP_SOCKET_BUFFER_SIZE: i32 = 2 * 1024 * 1024; // 2MB
const READ_TIMEOUT: Duration = Duration::from_millis(200);
const PORT_CACHE_SIZE: usize = 4096;

/// Blocking datagram exchange with peers, paired by address.
///
/// Both calls are synchronous. Implementations supply their own timeouts
/// and surface every failure as an opaque [io::Error]; callers treat any
/// error as a failed exchange and evict the peer.
pub trait Transport: Send + Sync {
    /// Send one message to the peer at `to`.
    fn send(&self, to: Address, message: &Message) -> io::Result<()>;

    /// Await the reply of the peer at `from`.
    fn recv(&self, from: Address) -> io::Result<Message>;
}

type Waiter = (flume::Sender<Message>, flume::Receiver<Message>);

#[derive(Debug)]
/// [Transport] over a `UdpSocket`.
///
/// A reader thread decodes incoming datagrams: a `Pong` whose source has a
/// waiter registered resolves that waiter, everything else is queued on the
/// [UdpTransport::incoming] channel for the owner of the process loop.
/// Sending a request registers the waiter before the datagram leaves, so a
/// reply can never outrun its `recv` call.
///
/// Overlay addresses carry no port. Peers are reached at the well-known
/// [Config::port], except that a port observed on traffic from an address
/// overrides it, so nodes bound elsewhere (tests, remapped peers) stay
/// reachable. At most one exchange per peer address may be in flight;
/// concurrent requests to one peer would take each other's replies.
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    /// Port peers are reached at when none was observed yet.
    port: u16,
    request_timeout: Duration,
    waiting: Arc<Mutex<HashMap<Address, Waiter>>>,
    ports: Arc<Mutex<LruCache<Address, u16>>>,
    incoming: flume::Receiver<(Address, Message)>,
    shutdown: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl UdpTransport {
    pub fn new(config: &Config) -> Result<UdpTransport> {
        let socket = match config.bind_port {
            Some(port) => UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], port)))?,
            None => UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], config.port)))
                .or_else(|_| UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], 0))))?,
        };

        // Enlarge the OS-level buffers; the defaults drop datagrams under
        // refresh bursts.
        set_socket_buffers(&socket, UDP_SOCKET_BUFFER_SIZE)?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;

        let local_addr = socket.local_addr()?;
        let waiting = Arc::new(Mutex::new(HashMap::new()));
        let ports = Arc::new(Mutex::new(LruCache::new(
            NonZeroUsize::new(PORT_CACHE_SIZE).unwrap(),
        )));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (incoming_sender, incoming) = flume::unbounded();

        let reader = thread::spawn({
            let socket = socket.try_clone()?;
            let waiting = Arc::clone(&waiting);
            let ports = Arc::clone(&ports);
            let shutdown = Arc::clone(&shutdown);
            move || read_loop(socket, waiting, ports, incoming_sender, shutdown)
        });

        Ok(UdpTransport {
            socket,
            local_addr,
            port: config.port,
            request_timeout: config.request_timeout,
            waiting,
            ports,
            incoming,
            shutdown,
            reader: Some(reader),
        })
    }

    // === Getters ===

    /// Returns the address the socket is bound to.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Messages from peers that are not replies to an exchange in flight.
    /// The overlay process loop drains this.
    pub fn incoming(&self) -> flume::Receiver<(Address, Message)> {
        self.incoming.clone()
    }

    // === Private Methods ===

    fn socket_addr(&self, address: Address) -> SocketAddr {
        let port = lock(&self.ports)
            .get(&address)
            .copied()
            .unwrap_or(self.port);
        SocketAddr::new(address.ip(), port)
    }
}

impl Transport for UdpTransport {
    fn send(&self, to: Address, message: &Message) -> io::Result<()> {
        // Requests park their waiter before the datagram leaves.
        if matches!(message.op, Opcode::Get | Opcode::Probe | Opcode::Conn) {
            lock(&self.waiting).insert(to, flume::bounded(1));
        }

        let target = self.socket_addr(to);
        if let Err(error) = self.socket.send_to(&message.to_bytes(), target) {
            lock(&self.waiting).remove(&to);
            return Err(error);
        }

        trace!(context = "socket_message_sending", ?to, op = ?message.op);
        Ok(())
    }

    fn recv(&self, from: Address) -> io::Result<Message> {
        let receiver = {
            let mut waiting = lock(&self.waiting);
            match waiting.get(&from) {
                Some((_, receiver)) => receiver.clone(),
                None => {
                    let (sender, receiver) = flume::bounded(1);
                    waiting.insert(from, (sender, receiver.clone()));
                    receiver
                }
            }
        };

        let reply = receiver.recv_timeout(self.request_timeout);
        lock(&self.waiting).remove(&from);

        reply.map_err(|_| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                "no reply within the request timeout",
            )
        })
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

fn read_loop(
    socket: UdpSocket,
    waiting: Arc<Mutex<HashMap<Address, Waiter>>>,
    ports: Arc<Mutex<LruCache<Address, u16>>>,
    incoming: flume::Sender<(Address, Message)>,
    shutdown: Arc<AtomicBool>,
) {
    let mut buf = [0u8; MESSAGE_SIZE];

    while !shutdown.load(Ordering::Relaxed) {
        let (amount, source) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                continue;
            }
            Err(error) => {
                trace!(context = "socket_error", ?error, "recv_from failed unexpectedly");
                continue;
            }
        };

        let message = match Message::from_bytes(&buf[..amount]) {
            Ok(message) => message,
            Err(error) => {
                trace!(
                    context = "socket_error",
                    ?error,
                    ?source,
                    "discarding undecodable datagram"
                );
                continue;
            }
        };

        let from = Address::from(source.ip());
        lock(&ports).put(from, source.port());
        trace!(context = "socket_message_receiving", ?from, op = ?message.op);

        if message.op == Opcode::Pong {
            let sender = lock(&waiting).get(&from).map(|(sender, _)| sender.clone());
            if let Some(sender) = sender {
                // A full mailbox means a duplicate reply; drop it.
                let _ = sender.try_send(message);
                continue;
            }
        }

        if incoming.send((from, message)).is_err() {
            // The receiving side is gone; the transport is shutting down.
            break;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(unix)]
fn set_socket_buffers(socket: &UdpSocket, size: i32) -> io::Result<()> {
    use libc::{setsockopt, socklen_t, SOL_SOCKET, SO_RCVBUF, SO_SNDBUF};
    use std::os::unix::io::AsRawFd;

    let fd = socket.as_raw_fd();

    for option in [SO_RCVBUF, SO_SNDBUF] {
        // The OS may clamp the size or reject large values depending on
        // sysctl limits.
        let rc = unsafe {
            setsockopt(
                fd,
                SOL_SOCKET,
                option,
                &size as *const _ as *const _,
                std::mem::size_of_val(&size) as socklen_t,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(())
}

#[cfg(not(unix))]
fn set_socket_buffers(_socket: &UdpSocket, _size: i32) -> io::Result<()> {
    Ok(())
}
