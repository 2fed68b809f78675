//! Weft: a VLIW code generator and instruction scheduler for a fixed
//! gather-hash-branch kernel.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Weft sub-crates. For most users, adding `weft` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use weft::prelude::*;
//!
//! let spec = MachineSpec::default();
//! let config = KernelConfig::default();
//! let params = KernelParams {
//!     tree_height: 4,
//!     n_nodes: 31,
//!     batch_size: 64,
//!     rounds: 8,
//! };
//! let compiled = compile(&spec, &config, params).unwrap();
//! assert!(compiled.cycles() > 0);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the
//! prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `weft-core` | Machine description, engines, slots, operations, bundles |
//! | [`scratch`] | `weft-scratch` | Scratch allocation and constant interning |
//! | [`graph`] | `weft-graph` | Dead-slot pruning and dependency graphs |
//! | [`scheduler`] | `weft-scheduler` | List scheduling and segment statistics |
//! | [`kernel`] | `weft-kernel` | Kernel emission and the compile pipeline |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Machine description, slot payloads, and the operation IR (`weft-core`).
pub use weft_core as types;

/// Scratch-space allocation and constant interning (`weft-scratch`).
pub use weft_scratch as scratch;

/// Dead-slot pruning and dependency graph construction (`weft-graph`).
pub use weft_graph as graph;

/// List scheduling, multi-start, and diagnostics (`weft-scheduler`).
pub use weft_scheduler as scheduler;

/// Kernel emission and the end-to-end compile pipeline (`weft-kernel`).
pub use weft_kernel as kernel;

/// Common imports for typical Weft usage.
///
/// ```rust
/// use weft::prelude::*;
/// ```
pub mod prelude {
    // Machine model and IR.
    pub use weft_core::{
        Addr, Bundle, Engine, EngineMap, HashStage, MachineSpec, Operation, SlotKind,
    };

    // Scratch and constants.
    pub use weft_scratch::{ConstPool, ConstSynth, ScratchAlloc, ScratchError};

    // Analysis and scheduling.
    pub use weft_graph::{prune_dead_slots, DepGraph};
    pub use weft_scheduler::{ScheduleError, SchedulerConfig, SegmentStats};

    // Kernel compilation.
    pub use weft_kernel::{
        compile, CompileError, CompiledKernel, ConfigError, Depth2SelectMode, Depth4Mode,
        IdxBranchMode, KernelConfig, KernelParams,
    };
}
