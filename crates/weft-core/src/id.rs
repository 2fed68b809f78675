//! Scratch address newtype.

use std::fmt;

/// A cell address in the flat scratch space.
///
/// Scratch is a contiguous range `[0, scratch_size)` of `u32` cells owned
/// by the emitter; the scheduler treats addresses as opaque dependency
/// keys. Vector operands name the base of a `vlen`-wide contiguous range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Addr(pub u32);

impl Addr {
    /// The address `n` cells past this one.
    pub fn offset(self, n: u32) -> Addr {
        Addr(self.0 + n)
    }

    /// This address as a dense array index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Addr {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
