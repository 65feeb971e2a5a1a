//! Overlay node runtime.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::common::{Address, Id, Message};
use crate::config::Config;
use crate::rpc::socket::UdpTransport;
use crate::rpc::{ConnectError, Rpc, SearchError};
use crate::Result;

const TICK: Duration = Duration::from_millis(100);

#[derive(Debug)]
/// A running overlay node: an [Rpc] served by a background thread that
/// answers peers and keeps the routing table fresh.
///
/// Lookups run on the caller's thread and may block on the network; the
/// background thread only handles incoming messages and the periodic
/// refresh heartbeat.
pub struct Overlay {
    rpc: Arc<Rpc<UdpTransport>>,
    shutdown: flume::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Overlay {
    /// Start an overlay node with a random id.
    pub fn new(config: Config) -> Result<Overlay> {
        Self::with_id(Id::random(), config)
    }

    /// Start an overlay node with a given id.
    pub fn with_id(id: Id, config: Config) -> Result<Overlay> {
        let transport = UdpTransport::new(&config)?;
        let requests = transport.incoming();
        let rpc = Arc::new(Rpc::new(id, transport));
        let (shutdown, shutdown_signal) = flume::bounded(1);

        let handle = thread::spawn({
            let rpc = Arc::clone(&rpc);
            move || run(rpc, requests, shutdown_signal, config.refresh_interval)
        });

        Ok(Overlay {
            rpc,
            shutdown,
            handle: Some(handle),
        })
    }

    // === Getters ===

    /// Returns the id of this node.
    pub fn id(&self) -> Id {
        self.rpc.id()
    }

    /// Returns the address the underlying socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.rpc.transport().local_addr()
    }

    /// The underlying [Rpc], for direct table access and lookups.
    pub fn rpc(&self) -> &Rpc<UdpTransport> {
        &self.rpc
    }

    // === Public Methods ===

    /// Seed the routing table with one known peer address.
    pub fn connect(&self, address: Address) -> core::result::Result<(), ConnectError> {
        self.rpc.connect(address)
    }

    /// Iterative lookup, run on the calling thread.
    pub fn search(&self, target: Id) -> core::result::Result<Address, SearchError> {
        self.rpc.search(target)
    }

    /// Stop the background thread and wait for it to finish.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    rpc: Arc<Rpc<UdpTransport>>,
    requests: flume::Receiver<(Address, Message)>,
    shutdown: flume::Receiver<()>,
    refresh_interval: Duration,
) {
    debug!(id = ?rpc.id(), "overlay node running");
    let mut last_refresh = Instant::now();

    loop {
        if shutdown.try_recv().is_ok() {
            break;
        }

        match requests.recv_timeout(TICK) {
            Ok((src, message)) => rpc.process(src, &message),
            Err(flume::RecvTimeoutError::Timeout) => {}
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }

        if last_refresh.elapsed() >= refresh_interval {
            debug!(size = rpc.table().size(), "refreshing routing table");
            rpc.refresh();
            last_refresh = Instant::now();
        }
    }

    debug!(id = ?rpc.id(), "overlay node stopped");
}

#[cfg(test)]
mod test {
    use super::*;

    fn config() -> Config {
        Config {
            bind_port: Some(0),
            request_timeout: Duration::from_millis(400),
            // Keep the heartbeat out of short-lived tests.
            refresh_interval: Duration::from_secs(3600),
            ..Default::default()
        }
    }

    #[test]
    fn shutdown() {
        let overlay = Overlay::new(config()).unwrap();

        overlay.shutdown();
    }

    #[test]
    fn search_before_any_peer_is_known() {
        let overlay = Overlay::new(config()).unwrap();

        let target = Id(overlay.id().0 ^ 1);
        assert_eq!(overlay.search(target), Err(SearchError::NotFound));
        assert_eq!(overlay.search(overlay.id()), Err(SearchError::Local));

        overlay.shutdown();
    }
}
