//! Slot payload types, one closed sum per engine.
//!
//! A slot is one operation occupying one engine slot in one cycle. Payloads
//! declare their scratch reads and writes through the visitor methods on
//! [`SlotKind`]; the dependency graph and the pruner are built entirely from
//! those sets, so the variants here are the single source of truth for
//! ordering semantics.

use crate::engine::Engine;
use crate::id::Addr;

/// Scalar binary opcode, shared by the ALU and VALU engines.
///
/// All arithmetic wraps at 32 bits; shifts mask their count to the word
/// width; [`Lt`](AluOp::Lt) yields `0` or `1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AluOp {
    /// Wrapping addition.
    Add,
    /// Wrapping subtraction.
    Sub,
    /// Wrapping multiplication.
    Mul,
    /// Bitwise exclusive or.
    Xor,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Left shift (count masked to the word width).
    Shl,
    /// Logical right shift (count masked to the word width).
    Shr,
    /// Unsigned less-than, producing `0` or `1`.
    Lt,
}

impl AluOp {
    /// Evaluate `a op b` with the machine's wrapping semantics.
    pub fn apply(self, a: u32, b: u32) -> u32 {
        match self {
            AluOp::Add => a.wrapping_add(b),
            AluOp::Sub => a.wrapping_sub(b),
            AluOp::Mul => a.wrapping_mul(b),
            AluOp::Xor => a ^ b,
            AluOp::And => a & b,
            AluOp::Or => a | b,
            AluOp::Shl => a.wrapping_shl(b),
            AluOp::Shr => a.wrapping_shr(b),
            AluOp::Lt => u32::from(a < b),
        }
    }
}

/// A scalar ALU slot: `dest = a op b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AluSlot {
    /// Opcode.
    pub op: AluOp,
    /// Destination cell.
    pub dest: Addr,
    /// First source cell.
    pub a: Addr,
    /// Second source cell.
    pub b: Addr,
}

/// A vector ALU slot operating on `vlen`-wide contiguous ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValuSlot {
    /// Replicate the scalar at `src` into every lane of `dest`.
    Broadcast {
        /// Destination vector base.
        dest: Addr,
        /// Source scalar cell.
        src: Addr,
    },
    /// Lane-wise fused multiply-add: `dest = a * b + c`.
    MultiplyAdd {
        /// Destination vector base.
        dest: Addr,
        /// Multiplicand vector base.
        a: Addr,
        /// Multiplier vector base.
        b: Addr,
        /// Addend vector base.
        c: Addr,
    },
    /// Lane-wise binary op: `dest = a op b`.
    Binary {
        /// Opcode applied per lane.
        op: AluOp,
        /// Destination vector base.
        dest: Addr,
        /// First source vector base.
        a: Addr,
        /// Second source vector base.
        b: Addr,
    },
}

/// A load-engine slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadSlot {
    /// Write the immediate `value` into `dest`.
    Const {
        /// Destination cell.
        dest: Addr,
        /// Immediate value.
        value: u32,
    },
    /// Indirect scalar load: `dest = mem[scratch[addr]]`.
    Load {
        /// Destination cell.
        dest: Addr,
        /// Cell holding the memory address.
        addr: Addr,
    },
    /// Single-lane indirect load: `dest+offset = mem[scratch[addr+offset]]`.
    ///
    /// Reads and writes exactly one cell each, so `vlen` of these with
    /// offsets `0..vlen` gather into adjacent lanes of one destination
    /// vector without ordering against each other.
    LoadOffset {
        /// Destination vector base.
        dest: Addr,
        /// Base of the vector of memory addresses.
        addr: Addr,
        /// Lane offset within both vectors.
        offset: u32,
    },
    /// Vector load: `dest..dest+vlen = mem[scratch[addr]..]`.
    VLoad {
        /// Destination vector base.
        dest: Addr,
        /// Cell holding the memory base address.
        addr: Addr,
    },
}

/// A store-engine slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreSlot {
    /// Scalar store: `mem[scratch[addr]] = scratch[src]`.
    Store {
        /// Cell holding the memory address.
        addr: Addr,
        /// Source cell.
        src: Addr,
    },
    /// Vector store: `mem[scratch[addr]..] = scratch[src..src+vlen]`.
    VStore {
        /// Cell holding the memory base address.
        addr: Addr,
        /// Source vector base.
        src: Addr,
    },
}

/// A flow-engine slot.
///
/// `Halt`, `Pause`, `Jump`, and `CondJump` are barriers: they delimit
/// scheduling segments and are emitted as single-slot bundles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowSlot {
    /// Scalar select: `dest = if scratch[cond] != 0 { a } else { b }`.
    Select {
        /// Destination cell.
        dest: Addr,
        /// Condition cell.
        cond: Addr,
        /// Value when the condition is non-zero.
        a: Addr,
        /// Value when the condition is zero.
        b: Addr,
    },
    /// Lane-wise select over `vlen`-wide ranges.
    VSelect {
        /// Destination vector base.
        dest: Addr,
        /// Condition vector base.
        cond: Addr,
        /// Vector chosen where the condition lane is non-zero.
        a: Addr,
        /// Vector chosen where the condition lane is zero.
        b: Addr,
    },
    /// Add-immediate: `dest = scratch[src] + imm`.
    ///
    /// Reading a never-written cell yields 0, so this doubles as constant
    /// synthesis on otherwise idle flow bandwidth.
    AddImm {
        /// Destination cell.
        dest: Addr,
        /// Source cell.
        src: Addr,
        /// Immediate addend.
        imm: u32,
    },
    /// Stop execution entirely.
    Halt,
    /// Yield to the host; execution resumes at the next bundle.
    Pause,
    /// Unconditional jump to an absolute bundle index.
    Jump {
        /// Target bundle index.
        target: u32,
    },
    /// Jump to `target` when `scratch[cond]` is non-zero.
    CondJump {
        /// Condition cell.
        cond: Addr,
        /// Target bundle index.
        target: u32,
    },
}

/// Kernel stage a debug comparison refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TraceStage {
    /// Tree index at round start.
    Idx,
    /// Accumulator at round start.
    Val,
    /// Node value fetched this round.
    NodeVal,
    /// Accumulator after the given hash stage.
    HashStage(u8),
    /// Accumulator after the full hash.
    HashedVal,
    /// Child index before the wrap check.
    NextIdx,
    /// Child index after the wrap check.
    WrappedIdx,
}

/// Key into the reference kernel's value trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TraceKey {
    /// Kernel round.
    pub round: u32,
    /// Lane within the batch.
    pub lane: u32,
    /// Stage within the round.
    pub stage: TraceStage,
}

/// A debug-engine slot. Ignored by the submission machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DebugSlot {
    /// Assert that `scratch[addr]` matches the traced value for `key`.
    Compare {
        /// Cell under test.
        addr: Addr,
        /// Trace key of the expected value.
        key: TraceKey,
    },
    /// Assert a `vlen`-wide range against one traced value per lane.
    VCompare {
        /// Vector base under test.
        base: Addr,
        /// Trace key per lane, in lane order.
        keys: Vec<TraceKey>,
    },
    /// Free-form annotation.
    Comment {
        /// Annotation text.
        text: String,
    },
}

/// A slot payload tagged with its engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotKind {
    /// Scalar ALU payload.
    Alu(AluSlot),
    /// Vector ALU payload.
    Valu(ValuSlot),
    /// Load payload.
    Load(LoadSlot),
    /// Store payload.
    Store(StoreSlot),
    /// Flow payload.
    Flow(FlowSlot),
    /// Debug payload.
    Debug(DebugSlot),
}

impl SlotKind {
    /// The engine this payload executes on.
    pub fn engine(&self) -> Engine {
        match self {
            SlotKind::Alu(_) => Engine::Alu,
            SlotKind::Valu(_) => Engine::Valu,
            SlotKind::Load(_) => Engine::Load,
            SlotKind::Store(_) => Engine::Store,
            SlotKind::Flow(_) => Engine::Flow,
            SlotKind::Debug(_) => Engine::Debug,
        }
    }

    /// Whether this slot delimits a scheduling segment.
    pub fn is_barrier(&self) -> bool {
        matches!(
            self,
            SlotKind::Flow(
                FlowSlot::Halt | FlowSlot::Pause | FlowSlot::Jump { .. } | FlowSlot::CondJump { .. }
            )
        )
    }

    /// Whether this slot must survive pruning regardless of liveness.
    ///
    /// Stores and flow ops always do; debug ops only while debug output is
    /// live (`debug_live`).
    pub fn has_side_effect(&self, debug_live: bool) -> bool {
        match self {
            SlotKind::Store(_) | SlotKind::Flow(_) => true,
            SlotKind::Debug(_) => debug_live,
            _ => false,
        }
    }

    /// Visit every scratch cell this slot reads.
    pub fn visit_reads(&self, vlen: usize, mut f: impl FnMut(Addr)) {
        let vlen = vlen as u32;
        let mut range = |base: Addr, len: u32, f: &mut dyn FnMut(Addr)| {
            for i in 0..len {
                f(base.offset(i));
            }
        };
        match self {
            SlotKind::Alu(AluSlot { a, b, .. }) => {
                f(*a);
                f(*b);
            }
            SlotKind::Valu(ValuSlot::Broadcast { src, .. }) => f(*src),
            SlotKind::Valu(ValuSlot::MultiplyAdd { a, b, c, .. }) => {
                range(*a, vlen, &mut f);
                range(*b, vlen, &mut f);
                range(*c, vlen, &mut f);
            }
            SlotKind::Valu(ValuSlot::Binary { a, b, .. }) => {
                range(*a, vlen, &mut f);
                range(*b, vlen, &mut f);
            }
            SlotKind::Load(LoadSlot::Const { .. }) => {}
            SlotKind::Load(LoadSlot::Load { addr, .. }) => f(*addr),
            SlotKind::Load(LoadSlot::LoadOffset { addr, offset, .. }) => f(addr.offset(*offset)),
            SlotKind::Load(LoadSlot::VLoad { addr, .. }) => f(*addr),
            SlotKind::Store(StoreSlot::Store { addr, src }) => {
                f(*addr);
                f(*src);
            }
            SlotKind::Store(StoreSlot::VStore { addr, src }) => {
                f(*addr);
                range(*src, vlen, &mut f);
            }
            SlotKind::Flow(FlowSlot::Select { cond, a, b, .. }) => {
                f(*cond);
                f(*a);
                f(*b);
            }
            SlotKind::Flow(FlowSlot::VSelect { cond, a, b, .. }) => {
                range(*cond, vlen, &mut f);
                range(*a, vlen, &mut f);
                range(*b, vlen, &mut f);
            }
            SlotKind::Flow(FlowSlot::AddImm { src, .. }) => f(*src),
            SlotKind::Flow(FlowSlot::Halt | FlowSlot::Pause | FlowSlot::Jump { .. }) => {}
            SlotKind::Flow(FlowSlot::CondJump { cond, .. }) => f(*cond),
            SlotKind::Debug(DebugSlot::Compare { addr, .. }) => f(*addr),
            SlotKind::Debug(DebugSlot::VCompare { base, keys }) => {
                range(*base, keys.len() as u32, &mut f);
            }
            SlotKind::Debug(DebugSlot::Comment { .. }) => {}
        }
    }

    /// Visit every scratch cell this slot writes.
    pub fn visit_writes(&self, vlen: usize, mut f: impl FnMut(Addr)) {
        let vlen = vlen as u32;
        let mut range = |base: Addr, f: &mut dyn FnMut(Addr)| {
            for i in 0..vlen {
                f(base.offset(i));
            }
        };
        match self {
            SlotKind::Alu(AluSlot { dest, .. }) => f(*dest),
            SlotKind::Valu(
                ValuSlot::Broadcast { dest, .. }
                | ValuSlot::MultiplyAdd { dest, .. }
                | ValuSlot::Binary { dest, .. },
            ) => range(*dest, &mut f),
            SlotKind::Load(LoadSlot::Const { dest, .. } | LoadSlot::Load { dest, .. }) => f(*dest),
            SlotKind::Load(LoadSlot::LoadOffset { dest, offset, .. }) => f(dest.offset(*offset)),
            SlotKind::Load(LoadSlot::VLoad { dest, .. }) => range(*dest, &mut f),
            SlotKind::Store(_) => {}
            SlotKind::Flow(FlowSlot::Select { dest, .. } | FlowSlot::AddImm { dest, .. }) => {
                f(*dest)
            }
            SlotKind::Flow(FlowSlot::VSelect { dest, .. }) => range(*dest, &mut f),
            SlotKind::Flow(
                FlowSlot::Halt | FlowSlot::Pause | FlowSlot::Jump { .. } | FlowSlot::CondJump { .. },
            ) => {}
            SlotKind::Debug(_) => {}
        }
    }
}
