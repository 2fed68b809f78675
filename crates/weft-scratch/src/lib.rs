//! Scratch-space allocation and constant interning.
//!
//! The emitter owns a flat, zero-initialised scratch address space.
//! [`ScratchAlloc`] bump-allocates fixed-length regions from it and keeps a
//! debug name table; [`ConstPool`] interns scalar and broadcast-vector
//! constants so each unique value is materialised exactly once.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod alloc;
pub mod consts;
pub mod error;

pub use alloc::{Region, ScratchAlloc};
pub use consts::{ConstPool, ConstSynth};
pub use error::ScratchError;
