//! Node id or a lookup target, compared by XOR-prefix distance.
use rand::Rng;
use std::fmt::{self, Debug, Display, Formatter};

/// The size of node ids in bits.
pub const ID_BITS: u32 = 64;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Node id or a lookup target.
pub struct Id(pub u64);

impl Id {
    /// Generate a random Id.
    pub fn random() -> Id {
        let mut rng = rand::thread_rng();

        Id(rng.gen())
    }

    /// Number of equal leading bits of `self` and `other`, counted from the
    /// most significant. Returns [ID_BITS] iff the ids are equal.
    ///
    /// This is the XOR distance metric turned upside down: the longer the
    /// shared prefix, the closer the ids.
    pub fn prefix(&self, other: Id) -> u32 {
        (self.0 ^ other.0).leading_zeros()
    }

    /// Number of equal trailing bits of `self` and `other`, counted from the
    /// least significant. Returns [ID_BITS] iff the ids are equal.
    pub fn suffix(&self, other: Id) -> u32 {
        (self.0 ^ other.0).trailing_zeros()
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({:#018x})", self.0)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for Id {
    fn from(value: u64) -> Id {
        Id(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prefix_of_equal_ids_is_full() {
        let id = Id(0xdead_beef_cafe_f00d);

        assert_eq!(id.prefix(id), 64);
        assert_eq!(id.suffix(id), 64);
    }

    #[test]
    fn prefix_of_complement_is_zero() {
        let id = Id(0xdead_beef_cafe_f00d);
        let complement = Id(!id.0);

        assert_eq!(id.prefix(complement), 0);
        assert_eq!(id.suffix(complement), 0);
    }

    #[test]
    fn prefix_counts_leading_agreement() {
        let id = Id(0x8000_0000_0000_0000);

        // Differs only in the last bit.
        assert_eq!(id.prefix(Id(0x8000_0000_0000_0001)), 63);
        // Differs in the top bit.
        assert_eq!(id.prefix(Id(0)), 0);

        assert_eq!(Id(0b1110_1000 << 56).prefix(Id(0b1101_0010 << 56)), 2);
    }

    #[test]
    fn prefix_is_symmetric() {
        let a = Id::random();
        let b = Id::random();

        assert_eq!(a.prefix(b), b.prefix(a));
    }

    #[test]
    fn suffix_counts_trailing_agreement() {
        assert_eq!(Id(0b1010_1001).suffix(Id(0b1001_0001)), 3);
        assert_eq!(Id(1).suffix(Id(0)), 0);
    }

    #[test]
    fn random_ids_differ() {
        assert_ne!(Id::random(), Id::random());
    }
}
