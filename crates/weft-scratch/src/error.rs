//! Scratch allocation errors.

use std::error::Error;
use std::fmt;

/// Errors from [`ScratchAlloc`](crate::ScratchAlloc).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScratchError {
    /// An allocation would exceed the scratch capacity. Fatal at emit time.
    Exhausted {
        /// Length of the failed allocation request.
        requested: usize,
        /// Cells already allocated when the request was made.
        used: usize,
        /// Total scratch capacity.
        capacity: usize,
    },
}

impl fmt::Display for ScratchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted {
                requested,
                used,
                capacity,
            } => write!(
                f,
                "scratch exhausted: requested {requested} cells with {used}/{capacity} in use"
            ),
        }
    }
}

impl Error for ScratchError {}
