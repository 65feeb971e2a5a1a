//! The overlay request state machine: iterative lookups, the incoming
//! message handler, and routing table maintenance.

pub mod socket;

use tracing::{debug, trace};

use crate::common::{
    Address, Id, Message, Node, Opcode, RoutingTable, Status, BUCKET_COUNT, ID_BITS,
};
use socket::Transport;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Terminal outcomes of [Rpc::search] other than an address.
pub enum SearchError {
    /// Nobody closer to the target is known, locally or remotely.
    #[error("no peer known toward the target")]
    NotFound,
    /// A peer failed mid-lookup and was evicted.
    #[error("a peer failed during the lookup")]
    Broken,
    /// The target is the local node's own id.
    #[error("the target is the local id")]
    Local,
}

impl From<SearchError> for Status {
    fn from(err: SearchError) -> Status {
        match err {
            SearchError::NotFound => Status::NotFound,
            SearchError::Broken => Status::Broken,
            SearchError::Local => Status::Local,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Failure modes of a single remote bucket query.
pub enum GetError {
    /// The peer answered, but knows nothing closer in that direction.
    #[error("the peer knows no closer peer")]
    NotFound,
    /// The exchange failed, or the answer violated the progress invariant.
    #[error("the peer did not answer like a well-behaved peer")]
    Broken,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Failure modes of the handshake with a bootstrap address.
pub enum ConnectError {
    /// The exchange failed.
    #[error("the peer is unreachable")]
    Unreachable,
    /// The peer replied with a non-Ok status or an unusable id.
    #[error("the peer declined the handshake")]
    Rejected,
}

#[derive(Debug)]
/// A routing table bound to a transport: drives iterative lookups outward
/// and answers incoming peers.
///
/// Every method takes `&self`. Any number of threads may search, process
/// and mutate the table concurrently while one maintenance loop calls
/// [Rpc::refresh]; no bucket lock is ever held across transport I/O.
pub struct Rpc<T> {
    table: RoutingTable,
    transport: T,
}

impl<T: Transport> Rpc<T> {
    pub fn new(id: Id, transport: T) -> Rpc<T> {
        Rpc {
            table: RoutingTable::new(id),
            transport,
        }
    }

    // === Getters ===

    /// Returns the id of this node.
    pub fn id(&self) -> Id {
        self.table.id()
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // === Public Methods ===

    /// Attempts to add a peer to the routing table, and returns `true` if
    /// it did.
    pub fn insert(&self, id: Id, address: Address) -> bool {
        self.table.insert(id, address)
    }

    /// Evict a peer, if it is the front of its bucket.
    pub fn remove(&self, id: Id, address: Address) -> bool {
        let removed = self.table.remove(id, address);
        if removed {
            debug!(?id, "evicted peer");
        }
        removed
    }

    /// Iterative lookup: resolve `target` to the address of the closest
    /// peer our network knowledge can reach, ideally `target` itself.
    ///
    /// Starting from the front of the target's bucket, each hop asks the
    /// current candidate for the front of the candidate's own bucket for
    /// the target. Every successful hop must strictly lengthen the prefix
    /// the candidate shares with the target, so the walk takes at most 64
    /// hops. A peer that fails or answers out of its bucket is evicted and
    /// the lookup aborts.
    pub fn search(&self, target: Id) -> Result<Address, SearchError> {
        let Some(bucket) = self.table.bucket(target) else {
            return Err(SearchError::Local);
        };
        let Some(mut candidate) = bucket.front() else {
            return Err(SearchError::NotFound);
        };

        while candidate.id != target {
            match self.get_closer(&candidate, candidate.id.prefix(target)) {
                Ok(closer) => {
                    self.insert(closer.id, closer.address);
                    trace!(?target, from = ?candidate.id, to = ?closer.id, "lookup hop");
                    candidate = closer;
                }
                // The candidate knows nothing closer; it is the best the
                // overlay can do for this target.
                Err(GetError::NotFound) => break,
                Err(GetError::Broken) => {
                    self.remove(candidate.id, candidate.address);
                    return Err(SearchError::Broken);
                }
            }
        }

        Ok(candidate.address)
    }

    /// Ask `peer` for the front of its bucket `n`.
    ///
    /// A failed exchange is Broken. So is a reply whose key does not share
    /// exactly `n` leading bits with the asked peer's key: such a key
    /// cannot come from that bucket, and trusting it would stall the
    /// lookup's progress.
    pub fn get_closer(&self, peer: &Node, n: u32) -> Result<Node, GetError> {
        let request = Message::new(Opcode::Get, n as u8, self.id(), Address::default());
        if self.transport.send(peer.address, &request).is_err() {
            return Err(GetError::Broken);
        }
        let Ok(reply) = self.transport.recv(peer.address) else {
            return Err(GetError::Broken);
        };

        if reply.n != Status::Ok as u8 {
            return Err(GetError::NotFound);
        }
        if peer.id.prefix(reply.key) != n {
            return Err(GetError::Broken);
        }
        Ok(Node::new(reply.key, reply.value))
    }

    /// Handshake with a bootstrap address and record the node behind it.
    pub fn connect(&self, address: Address) -> Result<(), ConnectError> {
        let request = Message::new(Opcode::Conn, Status::Ok as u8, self.id(), Address::default());
        self.transport
            .send(address, &request)
            .map_err(|_| ConnectError::Unreachable)?;
        let reply = self
            .transport
            .recv(address)
            .map_err(|_| ConnectError::Unreachable)?;

        if reply.n != Status::Ok as u8 || reply.key == self.id() {
            return Err(ConnectError::Rejected);
        }
        self.insert(reply.key, address);
        Ok(())
    }

    /// Handle one incoming message from `src`.
    ///
    /// Replies are best effort; a failed send is dropped, and the sender
    /// is only recorded in the table when its reply went out.
    pub fn process(&self, src: Address, msg: &Message) {
        trace!(?src, op = ?msg.op, n = msg.n, "processing message");

        match msg.op {
            Opcode::Conn => match self.search(msg.key) {
                // An unknown peer announced itself: welcome it with our id.
                Err(SearchError::NotFound) => {
                    let reply =
                        Message::new(Opcode::Pong, Status::Ok as u8, self.id(), Address::default());
                    if self.transport.send(src, &reply).is_ok() {
                        self.insert(msg.key, src);
                    }
                }
                // Already known; acknowledge without re-announcing our id.
                Ok(_) => {
                    let reply =
                        Message::new(Opcode::Pong, Status::Ok as u8, Id(0), Address::default());
                    let _ = self.transport.send(src, &reply);
                }
                Err(err) => {
                    let reply = Message::new(
                        Opcode::Pong,
                        Status::from(err) as u8,
                        Id(0),
                        Address::default(),
                    );
                    let _ = self.transport.send(src, &reply);
                }
            },
            Opcode::Get => {
                if (msg.n as usize) < BUCKET_COUNT {
                    let reply = match self.table.buckets()[msg.n as usize].front() {
                        Some(node) => {
                            Message::new(Opcode::Pong, Status::Ok as u8, node.id, node.address)
                        }
                        None => Message::new(
                            Opcode::Pong,
                            Status::NotFound as u8,
                            Id(0),
                            Address::default(),
                        ),
                    };
                    if self.transport.send(src, &reply).is_ok() {
                        self.insert(msg.key, src);
                    }
                } else {
                    let reply =
                        Message::new(Opcode::Pong, Status::Broken as u8, Id(0), Address::default());
                    let _ = self.transport.send(src, &reply);
                }
            }
            Opcode::Probe => {
                let reply =
                    Message::new(Opcode::Pong, Status::Ok as u8, self.id(), Address::default());
                let _ = self.transport.send(src, &reply);
            }
            // Replies are consumed by the exchange that elicited them; a
            // stray one means the requester already gave up.
            Opcode::Pong => {}
            Opcode::Close => {
                self.remove(msg.key, src);
            }
        }
    }

    /// Verify the front of bucket `index`, evicting unresponsive fronts
    /// until one answers or the bucket drains.
    pub fn probe(&self, index: usize) {
        let Some(bucket) = self.table.buckets().get(index) else {
            return;
        };

        while let Some(peer) = bucket.front() {
            let request =
                Message::new(Opcode::Probe, Status::Ok as u8, self.id(), Address::default());
            if self.transport.send(peer.address, &request).is_ok()
                && self.transport.recv(peer.address).is_ok()
            {
                return;
            }
            debug!(id = ?peer.id, bucket = index, "unresponsive front, evicting");
            bucket.remove(peer.id, Some(peer.address));
        }
    }

    /// Rebuild empty buckets by chaining queries through known peers.
    ///
    /// Every peer that still fronts a bucket is a seed. For each empty
    /// bucket, each seed is asked for the peer it knows nearest to the
    /// bucket's ideal key; answers join both the table and the seed set,
    /// broken seeds are dropped from both. Scanning repeats until a full
    /// pass leaves the table unchanged.
    pub fn bootstrap(&self) {
        let mut known: Vec<Node> = self
            .table
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.front())
            .collect();
        if known.is_empty() {
            return;
        }

        loop {
            let mut changed = false;

            for index in 0..BUCKET_COUNT {
                let bucket = &self.table.buckets()[index];
                if bucket.front().is_some() {
                    continue;
                }
                let ideal = bucket.ideal();

                let mut seed = 0;
                while seed < known.len() {
                    let peer = known[seed];
                    let n = peer.id.prefix(ideal);
                    if n == ID_BITS {
                        // The seed is the ideal key itself; it cannot point
                        // past itself.
                        seed += 1;
                        continue;
                    }
                    match self.get_closer(&peer, n) {
                        Ok(found) => {
                            // Only a peer we have not seen this round moves
                            // the scan forward; re-answers change nothing.
                            if !known.iter().any(|p| p.id == found.id) {
                                if self.insert(found.id, found.address) {
                                    changed = true;
                                }
                                known.push(found);
                            }
                            if bucket.front().is_some() {
                                break;
                            }
                            seed += 1;
                        }
                        Err(GetError::NotFound) => {
                            seed += 1;
                        }
                        Err(GetError::Broken) => {
                            if self.remove(peer.id, peer.address) {
                                changed = true;
                            }
                            known.swap_remove(seed);
                        }
                    }
                }
            }

            if !changed {
                break;
            }
        }
    }

    /// Periodic self-healing round: verify every bucket front, rebuild
    /// empty buckets, then pull fresh peers toward every prefix class.
    /// Best effort; errors never surface.
    pub fn refresh(&self) {
        for index in 0..BUCKET_COUNT {
            self.probe(index);
        }
        self.bootstrap();
        for bucket in self.table.buckets() {
            let _ = self.search(bucket.ideal());
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;

    use super::*;

    type Script = Box<dyn Fn(&Message) -> Option<Message> + Send + Sync>;

    /// An in-memory transport acting out peers from closures: `recv`
    /// applies the scripted peer to the request last sent to it, and an
    /// unscripted peer (or a `None` from the script) times out.
    struct ScriptedTransport {
        scripts: Mutex<HashMap<Address, Script>>,
        pending: Mutex<HashMap<Address, Message>>,
        sent: Mutex<Vec<(Address, Message)>>,
    }

    impl ScriptedTransport {
        fn new() -> ScriptedTransport {
            ScriptedTransport {
                scripts: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn script<F>(&self, peer: Address, behavior: F)
        where
            F: Fn(&Message) -> Option<Message> + Send + Sync + 'static,
        {
            self.scripts.lock().unwrap().insert(peer, Box::new(behavior));
        }

        fn sent(&self) -> Vec<(Address, Message)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, to: Address, message: &Message) -> io::Result<()> {
            self.sent.lock().unwrap().push((to, *message));
            self.pending.lock().unwrap().insert(to, *message);
            Ok(())
        }

        fn recv(&self, from: Address) -> io::Result<Message> {
            let request = self.pending.lock().unwrap().remove(&from);
            let reply = request.and_then(|request| {
                self.scripts
                    .lock()
                    .unwrap()
                    .get(&from)
                    .and_then(|script| script(&request))
            });
            reply.ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "unscripted peer"))
        }
    }

    fn addr(last: u8) -> Address {
        Address::V4([10, 0, 0, last].into())
    }

    fn pong(n: Status, key: Id, value: Address) -> Message {
        Message::new(Opcode::Pong, n as u8, key, value)
    }

    fn rpc(id: Id) -> Rpc<ScriptedTransport> {
        Rpc::new(id, ScriptedTransport::new())
    }

    const LOCAL: Id = Id(0x8000_0000_0000_0000);

    #[test]
    fn search_for_the_local_id() {
        let rpc = rpc(LOCAL);

        assert_eq!(rpc.search(LOCAL), Err(SearchError::Local));
        assert!(rpc.transport().sent().is_empty());
    }

    #[test]
    fn search_with_an_empty_bucket_sends_nothing() {
        let rpc = rpc(LOCAL);

        assert_eq!(rpc.search(Id(1)), Err(SearchError::NotFound));
        assert!(rpc.transport().sent().is_empty());
    }

    #[test]
    fn search_hits_the_table_without_messages() {
        let rpc = rpc(LOCAL);
        let target = Id(0x4000_0000_0000_0000);

        rpc.insert(target, addr(1));

        assert_eq!(rpc.search(target), Ok(addr(1)));
        assert!(rpc.transport().sent().is_empty());
    }

    #[test]
    fn search_walks_closer_peers() {
        let rpc = rpc(LOCAL);
        let target = Id(0x0123_4567_89ab_cdef);

        // A peer in the target's bucket, sharing no bits with the target
        // beyond the bucket index.
        let first = Id(0x7000_0000_0000_0000);
        rpc.insert(first, addr(1));

        // The first peer points at one closer, which knows the target.
        let second = Id(0x0100_0000_0000_0000);
        assert_eq!(first.prefix(second), first.prefix(target));
        rpc.transport().script(addr(1), move |request| {
            assert_eq!(request.op, Opcode::Get);
            assert_eq!(u32::from(request.n), first.prefix(target));
            Some(pong(Status::Ok, second, addr(2)))
        });
        rpc.transport().script(addr(2), move |request| {
            assert_eq!(u32::from(request.n), second.prefix(target));
            Some(pong(Status::Ok, target, addr(3)))
        });

        assert_eq!(rpc.search(target), Ok(addr(3)));

        // Both discovered peers were recorded on the way; the target now
        // fronts its bucket.
        assert_eq!(rpc.table().size(), 3);
        assert_eq!(rpc.table().bucket(target).unwrap().front().unwrap().id, target);
    }

    #[test]
    fn search_returns_the_best_candidate_on_not_found() {
        let rpc = rpc(LOCAL);
        let target = Id(0x0123_4567_89ab_cdef);
        let peer = Id(0x7000_0000_0000_0000);

        rpc.insert(peer, addr(1));
        rpc.transport()
            .script(addr(1), |_| Some(pong(Status::NotFound, Id(0), Address::default())));

        assert_eq!(rpc.search(target), Ok(addr(1)));
    }

    #[test]
    fn search_evicts_a_peer_that_answers_out_of_its_bucket() {
        let rpc = rpc(LOCAL);
        let target = Id(0x0123_4567_89ab_cdef);
        let peer = Id(0x7000_0000_0000_0000);

        rpc.insert(peer, addr(1));
        // The reply key shares more than `n` bits with the asked peer, so
        // it cannot come from the requested bucket.
        rpc.transport()
            .script(addr(1), move |_| Some(pong(Status::Ok, Id(0x7f00_0000_0000_0000), addr(9))));

        assert_eq!(rpc.search(target), Err(SearchError::Broken));
        assert!(rpc.table().bucket(peer).unwrap().is_empty());
    }

    #[test]
    fn search_evicts_an_unresponsive_peer() {
        let rpc = rpc(LOCAL);
        let peer = Id(0x7000_0000_0000_0000);

        rpc.insert(peer, addr(1));

        assert_eq!(rpc.search(Id(0x0123_4567_89ab_cdef)), Err(SearchError::Broken));
        assert!(rpc.table().bucket(peer).unwrap().is_empty());
    }

    #[test]
    fn get_closer_maps_statuses() {
        let rpc = rpc(LOCAL);
        let peer = Node::new(Id(0x7000_0000_0000_0000), addr(1));

        rpc.transport()
            .script(addr(1), |_| Some(pong(Status::NotFound, Id(0), Address::default())));
        assert_eq!(rpc.get_closer(&peer, 1), Err(GetError::NotFound));

        rpc.transport()
            .script(addr(1), |_| Some(pong(Status::Broken, Id(0), Address::default())));
        assert_eq!(rpc.get_closer(&peer, 1), Err(GetError::NotFound));

        let answer = Id(0x3000_0000_0000_0000);
        rpc.transport()
            .script(addr(1), move |_| Some(pong(Status::Ok, answer, addr(2))));
        assert_eq!(
            rpc.get_closer(&peer, peer.id.prefix(answer)),
            Ok(Node::new(answer, addr(2)))
        );
    }

    #[test]
    fn connect_records_the_responder() {
        let rpc = rpc(LOCAL);
        let responder = Id(0x4000_0000_0000_0000);

        rpc.transport().script(addr(1), move |request| {
            assert_eq!(request.op, Opcode::Conn);
            assert_eq!(request.key, LOCAL);
            Some(pong(Status::Ok, responder, Address::default()))
        });

        assert_eq!(rpc.connect(addr(1)), Ok(()));
        assert_eq!(
            rpc.table().bucket(responder).unwrap().front().unwrap(),
            Node::new(responder, addr(1))
        );
    }

    #[test]
    fn connect_rejects_bad_handshakes() {
        let rpc = rpc(LOCAL);

        assert_eq!(rpc.connect(addr(1)), Err(ConnectError::Unreachable));

        rpc.transport()
            .script(addr(1), |_| Some(pong(Status::NotFound, Id(1), Address::default())));
        assert_eq!(rpc.connect(addr(1)), Err(ConnectError::Rejected));

        // A peer claiming our own id is unusable.
        rpc.transport()
            .script(addr(1), |_| Some(pong(Status::Ok, LOCAL, Address::default())));
        assert_eq!(rpc.connect(addr(1)), Err(ConnectError::Rejected));

        assert!(rpc.table().is_empty());
    }

    #[test]
    fn process_conn_from_an_unknown_peer() {
        let rpc = rpc(LOCAL);
        let key = Id(0x4000_0000_0000_0000);

        rpc.process(addr(1), &Message::new(Opcode::Conn, 0, key, Address::default()));

        let sent = rpc.transport().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, addr(1));
        assert_eq!(sent[0].1, pong(Status::Ok, LOCAL, Address::default()));
        assert_eq!(
            rpc.table().bucket(key).unwrap().front().unwrap(),
            Node::new(key, addr(1))
        );
    }

    #[test]
    fn process_conn_from_a_known_peer() {
        let rpc = rpc(LOCAL);
        let key = Id(0x4000_0000_0000_0000);

        rpc.insert(key, addr(1));
        rpc.process(addr(1), &Message::new(Opcode::Conn, 0, key, Address::default()));

        let sent = rpc.transport().sent();
        assert_eq!(sent.len(), 1);
        // Acknowledged, but our id is not repeated.
        assert_eq!(sent[0].1, pong(Status::Ok, Id(0), Address::default()));
        assert_eq!(rpc.table().size(), 1);
    }

    #[test]
    fn process_conn_claiming_the_local_id() {
        let rpc = rpc(LOCAL);

        rpc.process(addr(1), &Message::new(Opcode::Conn, 0, LOCAL, Address::default()));

        let sent = rpc.transport().sent();
        assert_eq!(sent[0].1.n, Status::Local as u8);
        assert!(rpc.table().is_empty());
    }

    #[test]
    fn process_get_returns_the_bucket_front() {
        let rpc = rpc(LOCAL);
        let stored = Id(0x4000_0000_0000_0000);
        let caller = Id(0x4000_0000_0000_0001);

        rpc.insert(stored, addr(2));
        rpc.process(addr(1), &Message::new(Opcode::Get, 0, caller, Address::default()));

        let sent = rpc.transport().sent();
        assert_eq!(sent[0].1, pong(Status::Ok, stored, addr(2)));
        // The caller was recorded after the reply went out.
        assert_eq!(rpc.table().bucket(caller).unwrap().front().unwrap().id, caller);
    }

    #[test]
    fn process_get_on_an_empty_bucket() {
        let rpc = rpc(LOCAL);

        rpc.process(addr(1), &Message::new(Opcode::Get, 63, Id(1), Address::default()));

        let sent = rpc.transport().sent();
        assert_eq!(sent[0].1, pong(Status::NotFound, Id(0), Address::default()));
    }

    #[test]
    fn process_get_out_of_range() {
        let rpc = rpc(LOCAL);

        rpc.process(addr(1), &Message::new(Opcode::Get, 64, Id(1), Address::default()));

        let sent = rpc.transport().sent();
        assert_eq!(sent[0].1, pong(Status::Broken, Id(0), Address::default()));
        // An out-of-range request does not earn the caller a table entry.
        assert!(rpc.table().is_empty());
    }

    #[test]
    fn process_probe_answers_with_our_id() {
        let rpc = rpc(LOCAL);

        rpc.process(addr(1), &Message::new(Opcode::Probe, 0, Id(1), Address::default()));

        let sent = rpc.transport().sent();
        assert_eq!(sent[0].1, pong(Status::Ok, LOCAL, Address::default()));
    }

    #[test]
    fn process_pong_is_ignored() {
        let rpc = rpc(LOCAL);

        rpc.process(addr(1), &pong(Status::Ok, Id(1), Address::default()));

        assert!(rpc.transport().sent().is_empty());
        assert!(rpc.table().is_empty());
    }

    #[test]
    fn process_close_pops_the_peer() {
        let rpc = rpc(LOCAL);
        let key = Id(0x4000_0000_0000_0000);

        rpc.insert(key, addr(1));

        // A departure notice from the wrong address is ignored.
        rpc.process(addr(9), &Message::new(Opcode::Close, 0, key, Address::default()));
        assert_eq!(rpc.table().size(), 1);

        rpc.process(addr(1), &Message::new(Opcode::Close, 0, key, Address::default()));
        assert!(rpc.table().is_empty());
        assert!(rpc.transport().sent().is_empty());
    }

    #[test]
    fn probe_keeps_a_responsive_front() {
        let rpc = rpc(LOCAL);
        let peer = Id(0x4000_0000_0000_0000);

        rpc.insert(peer, addr(1));
        rpc.transport()
            .script(addr(1), |_| Some(pong(Status::Ok, Id(1), Address::default())));

        rpc.probe(0);

        assert_eq!(rpc.table().buckets()[0].front().unwrap().id, peer);
    }

    #[test]
    fn probe_evicts_until_someone_answers() {
        let rpc = rpc(LOCAL);
        let dead = Id(0x4000_0000_0000_0001);
        let alive = Id(0x4000_0000_0000_0000);

        rpc.insert(alive, addr(1));
        rpc.insert(dead, addr(2));
        rpc.transport()
            .script(addr(1), |_| Some(pong(Status::Ok, Id(1), Address::default())));

        rpc.probe(0);

        // The unresponsive front fell, its backup answered and stayed.
        assert_eq!(rpc.table().buckets()[0].front().unwrap().id, alive);
    }

    #[test]
    fn probe_drains_a_dead_bucket() {
        let rpc = rpc(LOCAL);

        rpc.insert(Id(0x4000_0000_0000_0000), addr(1));
        rpc.insert(Id(0x4000_0000_0000_0001), addr(2));

        rpc.probe(0);

        assert!(rpc.table().buckets()[0].is_empty());
    }

    #[test]
    fn bootstrap_rebuilds_empty_buckets() {
        let rpc = rpc(Id(0));
        // One seed in bucket 0.
        let seed = Id(0xc000_0000_0000_0000);
        // A peer for bucket 1, reachable through the seed.
        let found = Id(0x4abc_0000_0000_0000);
        let ideal = rpc.table().buckets()[1].ideal();
        let expected_n = seed.prefix(ideal);

        rpc.insert(seed, addr(1));
        rpc.transport().script(addr(1), move |request| {
            if request.op == Opcode::Get && u32::from(request.n) == expected_n {
                Some(pong(Status::Ok, found, addr(2)))
            } else {
                Some(pong(Status::NotFound, Id(0), Address::default()))
            }
        });
        rpc.transport()
            .script(addr(2), |_| Some(pong(Status::NotFound, Id(0), Address::default())));

        rpc.bootstrap();

        assert_eq!(rpc.table().buckets()[1].front().unwrap(), Node::new(found, addr(2)));
        // The seed survived.
        assert_eq!(rpc.table().buckets()[0].front().unwrap().id, seed);
    }

    #[test]
    fn bootstrap_drops_broken_seeds() {
        let rpc = rpc(Id(0));
        let seed = Id(0xc000_0000_0000_0000);

        rpc.insert(seed, addr(1));

        rpc.bootstrap();

        assert!(rpc.table().is_empty());
    }

    #[test]
    fn refresh_is_quiet_on_an_empty_table() {
        let rpc = rpc(LOCAL);

        rpc.refresh();

        assert!(rpc.transport().sent().is_empty());
        assert!(rpc.table().is_empty());
    }
}
