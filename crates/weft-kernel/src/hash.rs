//! Lowering of the fixed hash stages onto the VALU and scalar ALU.
//!
//! Every stage has the shape `a' = (a op1 c1) op2 (a op3 c3)`. On the
//! VALU, two rewrites compress the general three-op form:
//!
//! - `op2 = add, op3 = shl`: `a' = a·(1<<c3) + (a op1 c1)`, one pre-op
//!   plus one multiply-add;
//! - additionally `op1 = add`: `a·(1<<c3) + (a + c1) = a·((1<<c3)+1) + c1`,
//!   a single multiply-add.
//!
//! Both identities hold exactly under wrapping 32-bit arithmetic. The
//! scalar ALU has no multiply-add, so the tail always uses the general
//! form. General-form pre-op pairs are emitted fused (one dual-slot
//! payload) or split (`split_hash_pairs`); fused saves nothing in slot
//! count but anchors both pre-ops to one cycle, while split leaves the
//! scheduler free to stagger them.

use weft_core::{
    Addr, AluOp, AluSlot, DebugSlot, Operation, SlotKind, TraceKey, TraceStage, ValuSlot,
};
use weft_scratch::{ConstPool, ScratchAlloc, ScratchError};

/// One hash stage lowered for the VALU, constants interned.
#[derive(Clone, Copy, Debug)]
pub(crate) enum VecStagePlan {
    /// `val = val * mul + c1`, the fully collapsed stage.
    Collapsed {
        /// Broadcast of `(1 << c3) + 1`.
        mul: Addr,
        /// Broadcast of `c1`.
        c1: Addr,
    },
    /// `t1 = val op1 c1; val = val * mul + t1`.
    MulAdd {
        /// First pre-op opcode.
        op1: AluOp,
        /// Broadcast of `c1`.
        c1: Addr,
        /// Broadcast of `1 << c3`.
        mul: Addr,
    },
    /// `t1 = val op1 c1; t2 = val op3 c3; val = t1 op2 t2`.
    General {
        /// First pre-op opcode.
        op1: AluOp,
        /// Broadcast of `c1`.
        c1: Addr,
        /// Combining opcode.
        op2: AluOp,
        /// Second pre-op opcode.
        op3: AluOp,
        /// Broadcast of `c3`.
        c3: Addr,
    },
}

/// One hash stage with scalar constants interned, for the tail path.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ScalarStagePlan {
    pub op1: AluOp,
    pub c1: Addr,
    pub op2: AluOp,
    pub op3: AluOp,
    pub c3: Addr,
}

/// Intern every vector constant the hash needs and fix each stage's form.
pub(crate) fn plan_hash_vec(
    stages: &[weft_core::HashStage],
    consts: &mut ConstPool,
    alloc: &mut ScratchAlloc,
    ops: &mut Vec<Operation>,
) -> Result<Vec<VecStagePlan>, ScratchError> {
    stages
        .iter()
        .map(|stage| {
            if stage.op2 == AluOp::Add && stage.op3 == AluOp::Shl {
                let mul = 1u32.wrapping_shl(stage.c3);
                if stage.op1 == AluOp::Add {
                    Ok(VecStagePlan::Collapsed {
                        mul: consts.broadcast(mul.wrapping_add(1), alloc, ops)?,
                        c1: consts.broadcast(stage.c1, alloc, ops)?,
                    })
                } else {
                    Ok(VecStagePlan::MulAdd {
                        op1: stage.op1,
                        c1: consts.broadcast(stage.c1, alloc, ops)?,
                        mul: consts.broadcast(mul, alloc, ops)?,
                    })
                }
            } else {
                Ok(VecStagePlan::General {
                    op1: stage.op1,
                    c1: consts.broadcast(stage.c1, alloc, ops)?,
                    op2: stage.op2,
                    op3: stage.op3,
                    c3: consts.broadcast(stage.c3, alloc, ops)?,
                })
            }
        })
        .collect()
}

/// Intern the scalar constants for the tail's general-form hash.
pub(crate) fn plan_hash_scalar(
    stages: &[weft_core::HashStage],
    consts: &mut ConstPool,
    alloc: &mut ScratchAlloc,
    ops: &mut Vec<Operation>,
) -> Result<Vec<ScalarStagePlan>, ScratchError> {
    stages
        .iter()
        .map(|stage| {
            Ok(ScalarStagePlan {
                op1: stage.op1,
                c1: consts.scalar(stage.c1, alloc, ops)?,
                op2: stage.op2,
                op3: stage.op3,
                c3: consts.scalar(stage.c3, alloc, ops)?,
            })
        })
        .collect()
}

/// Per-lane debug keys for one vector's worth of lanes.
fn vec_keys(round: u32, lane_base: u32, vlen: usize, stage: TraceStage) -> Vec<TraceKey> {
    (0..vlen as u32)
        .map(|vi| TraceKey {
            round,
            lane: lane_base + vi,
            stage,
        })
        .collect()
}

/// Emit the full vector hash over the accumulator register `val`.
///
/// `t1`/`t2` are per-group scratch vectors. With `debug` set, a vcompare
/// against the stage boundary value follows every stage.
#[allow(clippy::too_many_arguments)]
pub(crate) fn emit_hash_vec(
    ops: &mut Vec<Operation>,
    plans: &[VecStagePlan],
    val: Addr,
    t1: Addr,
    t2: Addr,
    split_pairs: bool,
    vlen: usize,
    debug: Option<(u32, u32)>,
) {
    for (hi, plan) in plans.iter().enumerate() {
        match *plan {
            VecStagePlan::Collapsed { mul, c1 } => {
                ops.push(Operation::single(SlotKind::Valu(ValuSlot::MultiplyAdd {
                    dest: val,
                    a: val,
                    b: mul,
                    c: c1,
                })));
            }
            VecStagePlan::MulAdd { op1, c1, mul } => {
                ops.push(Operation::single(SlotKind::Valu(ValuSlot::Binary {
                    op: op1,
                    dest: t1,
                    a: val,
                    b: c1,
                })));
                ops.push(Operation::single(SlotKind::Valu(ValuSlot::MultiplyAdd {
                    dest: val,
                    a: val,
                    b: mul,
                    c: t1,
                })));
            }
            VecStagePlan::General {
                op1,
                c1,
                op2,
                op3,
                c3,
            } => {
                let pre1 = SlotKind::Valu(ValuSlot::Binary {
                    op: op1,
                    dest: t1,
                    a: val,
                    b: c1,
                });
                let pre2 = SlotKind::Valu(ValuSlot::Binary {
                    op: op3,
                    dest: t2,
                    a: val,
                    b: c3,
                });
                if split_pairs {
                    ops.push(Operation::single(pre1));
                    ops.push(Operation::single(pre2));
                } else {
                    ops.push(Operation::fused([pre1, pre2]));
                }
                ops.push(Operation::single(SlotKind::Valu(ValuSlot::Binary {
                    op: op2,
                    dest: val,
                    a: t1,
                    b: t2,
                })));
            }
        }
        if let Some((round, lane_base)) = debug {
            ops.push(Operation::single(SlotKind::Debug(DebugSlot::VCompare {
                base: val,
                keys: vec_keys(round, lane_base, vlen, TraceStage::HashStage(hi as u8)),
            })));
        }
    }
}

/// Emit the full scalar hash over the tail accumulator cell `val`.
pub(crate) fn emit_hash_scalar(
    ops: &mut Vec<Operation>,
    plans: &[ScalarStagePlan],
    val: Addr,
    t1: Addr,
    t2: Addr,
    split_pairs: bool,
    debug: Option<(u32, u32)>,
) {
    for (hi, plan) in plans.iter().enumerate() {
        let pre1 = SlotKind::Alu(AluSlot {
            op: plan.op1,
            dest: t1,
            a: val,
            b: plan.c1,
        });
        let pre2 = SlotKind::Alu(AluSlot {
            op: plan.op3,
            dest: t2,
            a: val,
            b: plan.c3,
        });
        if split_pairs {
            ops.push(Operation::single(pre1));
            ops.push(Operation::single(pre2));
        } else {
            ops.push(Operation::fused([pre1, pre2]));
        }
        ops.push(Operation::single(SlotKind::Alu(AluSlot {
            op: plan.op2,
            dest: val,
            a: t1,
            b: t2,
        })));
        if let Some((round, lane)) = debug {
            ops.push(Operation::single(SlotKind::Debug(DebugSlot::Compare {
                addr: val,
                key: TraceKey {
                    round,
                    lane,
                    stage: TraceStage::HashStage(hi as u8),
                },
            })));
        }
    }
}
