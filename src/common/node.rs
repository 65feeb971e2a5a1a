//! Struct and implementation of the Node entry in the routing table.
use std::fmt::{self, Debug, Formatter};

use crate::common::{Address, Id};

#[derive(Clone, Copy, PartialEq, Eq)]
/// A known peer: its id and where to reach it.
pub struct Node {
    pub id: Id,
    pub address: Address,
}

impl Node {
    /// Creates a new Node from an id and a network address.
    pub fn new(id: Id, address: Address) -> Node {
        Node { id, address }
    }

    /// Creates a node with a random id for testing purposes.
    pub fn random() -> Node {
        Node {
            id: Id::random(),
            address: Address::default(),
        }
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("address", &self.address)
            .finish()
    }
}
