//! Address, offset, and byte-order primitives shared by every node kind.

use uuid::Uuid;

/// An address in the binary's address space.
///
/// Addresses are plain unsigned 64-bit values with no pointer semantics;
/// arithmetic wraps the way the underlying hardware would.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Addr(pub u64);

impl Addr {
    /// Offsets this address by `n` bytes.
    pub fn offset(self, n: u64) -> Addr {
        Addr(self.0.wrapping_add(n))
    }

    /// Byte distance from `other` to `self`.
    pub fn distance(self, other: Addr) -> u64 {
        self.0.wrapping_sub(other.0)
    }
}

impl From<u64> for Addr {
    fn from(v: u64) -> Self {
        Addr(v)
    }
}

impl std::ops::Add<u64> for Addr {
    type Output = Addr;
    fn add(self, rhs: u64) -> Addr {
        self.offset(rhs)
    }
}

impl std::fmt::Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A location inside a specific node: the node's UUID plus a byte
/// displacement from the node's start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Offset {
    pub element_id: Uuid,
    pub displacement: u64,
}

impl Offset {
    pub fn new(element_id: Uuid, displacement: u64) -> Self {
        Self { element_id, displacement }
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+{:#x}", self.element_id, self.displacement)
    }
}

/// Endianness tag carried on modules and byte intervals.
///
/// `Undefined` means the producer did not record an order; typed byte views
/// treat it as the wire default (little).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ByteOrder {
    #[default]
    Undefined,
    Little,
    Big,
}

impl ByteOrder {
    pub(crate) fn wire_tag(self) -> u64 {
        match self {
            ByteOrder::Undefined => 0,
            ByteOrder::Big => 1,
            ByteOrder::Little => 2,
        }
    }

    pub(crate) fn from_wire_tag(tag: u64) -> Option<ByteOrder> {
        match tag {
            0 => Some(ByteOrder::Undefined),
            1 => Some(ByteOrder::Big),
            2 => Some(ByteOrder::Little),
            _ => None,
        }
    }
}
