//! Kernel emission and the end-to-end compile pipeline.
//!
//! [`KernelEmitter`] lowers the multi-round gather-hash-branch loop over a
//! batch of independent lanes into the operation IR, specialising by tree
//! depth and interleaving lane groups so the scheduler sees wide, mutually
//! independent chains. [`compile`] runs the whole pipeline: validate,
//! emit, prune, build dependency graphs, schedule each segment, and
//! concatenate the bundle stream.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
mod emitter;
mod hash;
pub mod pipeline;
mod tail;

pub use config::{
    ConfigError, Depth2SelectMode, Depth4Mode, IdxBranchMode, KernelConfig, KernelParams,
};
pub use emitter::{EmittedKernel, KernelEmitter};
pub use pipeline::{compile, CompileError, CompiledKernel};
