//! Tagged network address of a peer.
use std::fmt::{self, Debug, Formatter};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Serialized size of an [Address] on the wire.
pub const ADDRESS_SIZE: usize = 17;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
/// Network address (v4 or v6) of a peer.
///
/// Addresses carry no port; an overlay operates on one well-known UDP port.
/// A v4 address never equals a v6 address, even when their meaningful bytes
/// coincide.
pub enum Address {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
}

impl Address {
    /// Encode into the fixed 17-byte wire form: a family tag byte, then the
    /// address body, zero padded.
    pub fn to_bytes(&self) -> [u8; ADDRESS_SIZE] {
        let mut bytes = [0u8; ADDRESS_SIZE];

        match self {
            Address::V4(ip) => bytes[1..5].copy_from_slice(&ip.octets()),
            Address::V6(ip) => {
                bytes[0] = 1;
                bytes[1..17].copy_from_slice(&ip.octets());
            }
        }

        bytes
    }

    /// Decode from the fixed 17-byte wire form. Any nonzero family tag is
    /// read as v6.
    pub fn from_bytes(bytes: &[u8; ADDRESS_SIZE]) -> Address {
        if bytes[0] == 0 {
            let mut octets = [0u8; 4];
            octets.copy_from_slice(&bytes[1..5]);

            Address::V4(octets.into())
        } else {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&bytes[1..17]);

            Address::V6(octets.into())
        }
    }

    /// The bare IP address.
    pub fn ip(&self) -> IpAddr {
        match self {
            Address::V4(ip) => IpAddr::V4(*ip),
            Address::V6(ip) => IpAddr::V6(*ip),
        }
    }
}

impl Default for Address {
    /// The unspecified v4 address, used as the empty value slot of messages
    /// that carry none.
    fn default() -> Self {
        Address::V4(Ipv4Addr::UNSPECIFIED)
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Address {
        match ip {
            IpAddr::V4(ip) => Address::V4(ip),
            IpAddr::V6(ip) => Address::V6(ip),
        }
    }
}

impl From<SocketAddr> for Address {
    /// Keeps the IP only; the port is dropped.
    fn from(addr: SocketAddr) -> Address {
        addr.ip().into()
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Address::V4(ip) => write!(f, "Address({ip})"),
            Address::V6(ip) => write!(f, "Address({ip})"),
        }
    }
}
