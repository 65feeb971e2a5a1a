//! XOR-prefix routing table and its concurrent buckets.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::common::{Address, Id, Node, ID_BITS};

/// Number of buckets in a routing table: one per possible prefix length of
/// a non-local key.
pub const BUCKET_COUNT: usize = 64;

/// Leading slots of every bucket that admit peers permissively, keeping
/// stand-ins around in case the front peer fails.
pub const BACKUP_SLOTS: usize = 3;

/// Total slots across all buckets: 64 + 63 + ... + 1.
pub const TABLE_CAPACITY: usize = BUCKET_COUNT * (BUCKET_COUNT + 1) / 2;

/// Capacity of the bucket at `index`. The deeper the shared prefix, the
/// fewer keys exist in its class, down to a single possible key at index 63.
pub const fn bucket_capacity(index: usize) -> usize {
    BUCKET_COUNT - index
}

#[derive(Debug)]
/// A bounded slot array holding the known peers of one prefix class, in
/// arrival order.
///
/// Writers serialize on the bucket mutex; observers run lock-free against
/// two atomics. `len` is the single publishing atomic: a reader that
/// acquires it observes the keys of all `len` occupied slots, because every
/// insertion stores its key before the release store that publishes it.
/// Addresses are read and written only under the mutex.
pub struct KBucket {
    /// The nearest possible key of this bucket's prefix class, used to rank
    /// candidates.
    ideal: Id,
    /// Occupied slot count; 0 means empty. Slots `[0, len)` hold peers in
    /// insertion order, and the slot at `len - 1` is the front.
    len: AtomicUsize,
    keys: Box<[AtomicU64]>,
    addresses: Mutex<Box<[Address]>>,
}

impl KBucket {
    pub fn new(ideal: Id, capacity: usize) -> KBucket {
        KBucket {
            ideal,
            len: AtomicUsize::new(0),
            keys: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            addresses: Mutex::new(vec![Address::default(); capacity].into_boxed_slice()),
        }
    }

    // === Getters ===

    /// The nearest possible key in this bucket's prefix class.
    pub fn ideal(&self) -> Id {
        self.ideal
    }

    pub fn capacity(&self) -> usize {
        self.keys.len()
    }

    /// Occupied slots at this instant; a snapshot under concurrent writers.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // === Public Methods ===

    /// Admit a peer behind the current front.
    ///
    /// Once the bucket has filled past the backup reserve, a candidate the
    /// current front outranks is refused without taking the mutex. The
    /// stale read this allows can admit an entry a newer front would have
    /// refused; probe and search evict such entries later.
    pub fn insert(&self, id: Id, address: Address) -> bool {
        let len = self.len.load(Ordering::Acquire);
        if len > BACKUP_SLOTS + 1 {
            let front = Id(self.keys[len - 1].load(Ordering::Acquire));
            if self.outranks(front, id) {
                return false;
            }
        }

        let mut addresses = self.lock();
        let len = self.len.load(Ordering::Relaxed);
        if len == 0 {
            self.keys[0].store(id.0, Ordering::Relaxed);
            addresses[0] = address;
            self.len.store(1, Ordering::Release);
            return true;
        }
        let front = Id(self.keys[len - 1].load(Ordering::Relaxed));
        if self.outranks(front, id) {
            return false;
        }
        if len == self.capacity() {
            return false;
        }
        self.keys[len].store(id.0, Ordering::Relaxed);
        addresses[len] = address;
        self.len.store(len + 1, Ordering::Release);
        true
    }

    /// Pop the front peer if it matches `id`, and `address` when one is
    /// given. Only the front is deletable; anything else is a no-op.
    pub fn remove(&self, id: Id, address: Option<Address>) -> bool {
        let len = self.len.load(Ordering::Acquire);
        if len == 0 || self.keys[len - 1].load(Ordering::Acquire) != id.0 {
            return false;
        }

        let addresses = self.lock();
        let len = self.len.load(Ordering::Relaxed);
        if len == 0 || self.keys[len - 1].load(Ordering::Relaxed) != id.0 {
            return false;
        }
        if let Some(address) = address {
            if addresses[len - 1] != address {
                return false;
            }
        }
        self.len.store(len - 1, Ordering::Release);
        true
    }

    /// The latest peer still present, or None while the bucket is empty.
    ///
    /// The lock-free emptiness check is confirmed under the mutex, so the
    /// returned key/address pair is always one that was published together.
    pub fn front(&self) -> Option<Node> {
        if self.len.load(Ordering::Acquire) == 0 {
            return None;
        }

        let addresses = self.lock();
        let len = self.len.load(Ordering::Relaxed);
        if len == 0 {
            return None;
        }
        Some(Node {
            id: Id(self.keys[len - 1].load(Ordering::Relaxed)),
            address: addresses[len - 1],
        })
    }

    // === Private Methods ===

    /// True when `f` shares strictly more leading bits with the bucket's
    /// ideal key than `s` does. Ties favor the incumbent.
    fn outranks(&self, f: Id, s: Id) -> bool {
        self.ideal.prefix(f) > self.ideal.prefix(s)
    }

    /// Every critical section leaves the bucket consistent, so a poisoned
    /// mutex is still safe to enter.
    fn lock(&self) -> MutexGuard<'_, Box<[Address]>> {
        self.addresses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
/// The local node's knowledge of the overlay: 64 buckets indexed by the
/// prefix length their keys share with the local id.
///
/// All methods take `&self`; concurrency is handled per bucket.
pub struct RoutingTable {
    id: Id,
    buckets: Box<[KBucket]>,
}

impl RoutingTable {
    /// Create a routing table for a given local id. All 2080 peer slots are
    /// allocated here, once.
    pub fn new(id: Id) -> RoutingTable {
        RoutingTable {
            id,
            buckets: (0..BUCKET_COUNT)
                .map(|index| {
                    let ideal = Id(id.0 ^ (1u64 << (63 - index)));
                    KBucket::new(ideal, bucket_capacity(index))
                })
                .collect(),
        }
    }

    // === Getters ===

    /// Returns the id of this node, where the distance is measured from.
    pub fn id(&self) -> Id {
        self.id
    }

    pub fn buckets(&self) -> &[KBucket] {
        &self.buckets
    }

    /// Bucket index for `key`: the prefix length it shares with the local
    /// id. None for the local id itself, which is never stored.
    pub fn line(&self, key: Id) -> Option<usize> {
        let prefix = self.id.prefix(key);
        if prefix == ID_BITS {
            return None;
        }
        Some(prefix as usize)
    }

    /// The bucket `key` belongs to, or None for the local id.
    pub fn bucket(&self, key: Id) -> Option<&KBucket> {
        self.line(key).map(|index| &self.buckets[index])
    }

    /// Returns `true` if this routing table is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|bucket| bucket.is_empty())
    }

    /// Number of peers currently stored.
    pub fn size(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.len()).sum()
    }

    // === Public Methods ===

    /// Attempts to add a peer to this routing table, and returns `true` if
    /// it did.
    pub fn insert(&self, id: Id, address: Address) -> bool {
        match self.bucket(id) {
            Some(bucket) => bucket.insert(id, address),
            None => false,
        }
    }

    /// Pop a peer if it is the front of its bucket and the address matches.
    pub fn remove(&self, id: Id, address: Address) -> bool {
        match self.bucket(id) {
            Some(bucket) => bucket.remove(id, Some(address)),
            None => false,
        }
    }

    /// Record the requesting peer, then peek the front of bucket `what`.
    pub fn request(&self, who: &Node, what: usize) -> Option<Node> {
        if who.id == self.id {
            return None;
        }
        self.insert(who.id, who.address);
        self.buckets.get(what)?.front()
    }
}
