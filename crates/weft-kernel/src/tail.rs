//! Scalar fallback for lanes past the last full vector group.
//!
//! When the batch size is not a multiple of the vector width, the
//! remaining lanes run the generic per-lane kernel on the scalar ALU:
//! indirect node load, scalar hash in general form (no multiply-add on
//! this engine), arithmetic branch, and an explicit wrap check. Each lane
//! owns its cells, so tail lanes stay mutually independent and free to
//! interleave with the vector groups.

use weft_core::{AluOp, LoadSlot, SlotKind, TraceStage};
use weft_scratch::ScratchError;

use crate::emitter::KernelEmitter;
use crate::hash;

impl KernelEmitter<'_> {
    /// Tail pointer setup and initial accumulator loads.
    ///
    /// Index cells are deliberately never initialised: scratch reads 0
    /// until first write, and every lane starts at the root.
    pub(crate) fn emit_tail_header(&mut self) -> Result<(), ScratchError> {
        for k in 0..self.tail.lanes.len() {
            let lane = self.tail.lanes[k];
            let offset = self.sconst(lane)?;
            let val_addr = self.tail.val_addr[k];
            let val_p = self.val_p;
            self.alu(AluOp::Add, val_addr, val_p, offset);
            let dest = self.tail.val[k];
            self.push(SlotKind::Load(LoadSlot::Load {
                dest,
                addr: val_addr,
            }));
            if self.config.emit_debug {
                let idx_addr = self.tail.idx_addr[k];
                let idx_p = self.idx_p;
                self.alu(AluOp::Add, idx_addr, idx_p, offset);
            }
        }
        Ok(())
    }

    /// One round of the generic scalar kernel for every tail lane.
    pub(crate) fn emit_tail_round(&mut self, round: u32, last: bool) {
        for k in 0..self.tail.lanes.len() {
            let lane = self.tail.lanes[k];
            let val = self.tail.val[k];
            let idx = self.tail.idx[k];
            let t1 = self.tail.t1[k];
            let t2 = self.tail.t2[k];
            let node = self.tail.node[k];
            let taddr = self.tail.taddr[k];

            self.compare(idx, round, lane, TraceStage::Idx);
            self.compare(val, round, lane, TraceStage::Val);

            // node = mem[forest_values_p + idx]
            let forest_p = self.forest_p;
            self.alu(AluOp::Add, taddr, forest_p, idx);
            self.push(SlotKind::Load(LoadSlot::Load {
                dest: node,
                addr: taddr,
            }));
            self.compare(node, round, lane, TraceStage::NodeVal);

            // val = hash(val ^ node)
            self.alu(AluOp::Xor, val, val, node);
            hash::emit_hash_scalar(
                &mut self.ops,
                &self.scalar_plans,
                val,
                t1,
                t2,
                self.config.split_hash_pairs,
                Some((round, lane)),
            );
            self.compare(val, round, lane, TraceStage::HashedVal);

            // The last round's index feeds nothing in submission mode.
            if !self.config.emit_debug && last {
                continue;
            }

            // idx = 2*idx + 1 + (val & 1), wrapping to the root past the
            // leaves.
            let one = self.one_scalar;
            let two = self.two_scalar;
            self.alu(AluOp::And, t1, val, one);
            self.alu(AluOp::Add, t2, t1, one);
            self.alu(AluOp::Mul, idx, idx, two);
            self.alu(AluOp::Add, idx, idx, t2);
            self.compare(idx, round, lane, TraceStage::NextIdx);
            let n_nodes = self.n_nodes_cell;
            self.alu(AluOp::Lt, t1, idx, n_nodes);
            self.alu(AluOp::Mul, idx, idx, t1);
            self.compare(idx, round, lane, TraceStage::WrappedIdx);
        }
    }
}
