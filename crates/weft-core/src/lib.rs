//! Machine model and operation IR for the Weft VLIW kernel compiler.
//!
//! This is the leaf crate with zero internal Weft dependencies. It defines
//! the target machine description ([`MachineSpec`]), the closed set of
//! execution [`Engine`]s, the per-engine slot payload types, and the
//! [`Operation`]/[`Bundle`] IR that the emitter produces and the scheduler
//! packs into cycles.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bundle;
pub mod engine;
pub mod id;
pub mod machine;
pub mod op;
pub mod slot;

// Re-export core types at crate root for convenience.
pub use bundle::Bundle;
pub use engine::{Engine, EngineMap};
pub use id::Addr;
pub use machine::{HashStage, MachineSpec};
pub use op::Operation;
pub use slot::{
    AluOp, AluSlot, DebugSlot, FlowSlot, LoadSlot, SlotKind, StoreSlot, TraceKey, TraceStage,
    ValuSlot,
};
