//! Value-keyed interning of scalar and broadcast constants.

use indexmap::IndexMap;

use weft_core::{Addr, FlowSlot, LoadSlot, Operation, SlotKind, ValuSlot};

use crate::alloc::ScratchAlloc;
use crate::error::ScratchError;

/// How scalar constants are materialised.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstSynth {
    /// A `const` load slot. Readable in debug traces; costs load bandwidth.
    Load,
    /// A flow-engine add-immediate from a cell that is never written and
    /// therefore reads 0. Spends otherwise idle flow slots instead of load
    /// slots. Only sensible when the pruner will drop every debug op.
    AddImm,
}

/// Interning pool for scalar and broadcast-vector constants.
///
/// Keyed by value: the first request for a value allocates its cell (or
/// `vlen` region) and appends the materialising operation to the caller's
/// op sink; later requests return the same address and append nothing.
/// Backed by `IndexMap` so allocation order, and therefore the emitted
/// op stream, is identical across runs.
#[derive(Clone, Debug)]
pub struct ConstPool {
    synth: ConstSynth,
    vlen: usize,
    zero_cell: Option<Addr>,
    scalars: IndexMap<u32, Addr>,
    vectors: IndexMap<u32, Addr>,
}

impl ConstPool {
    /// Create a pool for a machine with the given vector width.
    pub fn new(synth: ConstSynth, vlen: usize) -> Self {
        Self {
            synth,
            vlen,
            zero_cell: None,
            scalars: IndexMap::new(),
            vectors: IndexMap::new(),
        }
    }

    /// Address of a cell holding `value`, interning on first use.
    pub fn scalar(
        &mut self,
        value: u32,
        alloc: &mut ScratchAlloc,
        ops: &mut Vec<Operation>,
    ) -> Result<Addr, ScratchError> {
        if let Some(&addr) = self.scalars.get(&value) {
            return Ok(addr);
        }
        let dest = alloc.alloc_named(format!("const_{value:#x}"), 1)?;
        let slot = match self.synth {
            ConstSynth::Load => SlotKind::Load(LoadSlot::Const { dest, value }),
            ConstSynth::AddImm => {
                let zero = match self.zero_cell {
                    Some(zero) => zero,
                    None => {
                        let zero = alloc.alloc_named("always_zero", 1)?;
                        self.zero_cell = Some(zero);
                        zero
                    }
                };
                SlotKind::Flow(FlowSlot::AddImm {
                    dest,
                    src: zero,
                    imm: value,
                })
            }
        };
        ops.push(Operation::single(slot));
        self.scalars.insert(value, dest);
        Ok(dest)
    }

    /// Base of a `vlen` region broadcast-filled with `value`, interning on
    /// first use. The backing scalar constant is interned too.
    pub fn broadcast(
        &mut self,
        value: u32,
        alloc: &mut ScratchAlloc,
        ops: &mut Vec<Operation>,
    ) -> Result<Addr, ScratchError> {
        if let Some(&addr) = self.vectors.get(&value) {
            return Ok(addr);
        }
        let src = self.scalar(value, alloc, ops)?;
        let dest = alloc.alloc_named(format!("vconst_{value:#x}"), self.vlen)?;
        ops.push(Operation::single(SlotKind::Valu(ValuSlot::Broadcast {
            dest,
            src,
        })));
        self.vectors.insert(value, dest);
        Ok(dest)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_fixture(synth: ConstSynth) -> (ConstPool, ScratchAlloc, Vec<Operation>) {
        (ConstPool::new(synth, 4), ScratchAlloc::new(256), Vec::new())
    }

    #[test]
    fn scalar_interning_returns_same_addr_without_reemitting() {
        let (mut pool, mut alloc, mut ops) = pool_fixture(ConstSynth::Load);
        let a = pool.scalar(42, &mut alloc, &mut ops).unwrap();
        let b = pool.scalar(42, &mut alloc, &mut ops).unwrap();
        assert_eq!(a, b);
        assert_eq!(ops.len(), 1);
        assert_eq!(alloc.used(), 1);
    }

    #[test]
    fn distinct_values_get_distinct_cells() {
        let (mut pool, mut alloc, mut ops) = pool_fixture(ConstSynth::Load);
        let a = pool.scalar(1, &mut alloc, &mut ops).unwrap();
        let b = pool.scalar(2, &mut alloc, &mut ops).unwrap();
        assert_ne!(a, b);
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn add_imm_mode_synthesises_from_shared_zero_cell() {
        let (mut pool, mut alloc, mut ops) = pool_fixture(ConstSynth::AddImm);
        pool.scalar(7, &mut alloc, &mut ops).unwrap();
        pool.scalar(9, &mut alloc, &mut ops).unwrap();
        // One zero cell plus two constant cells.
        assert_eq!(alloc.used(), 3);
        let zeros: Vec<_> = ops
            .iter()
            .map(|op| match &op.slots[0] {
                SlotKind::Flow(FlowSlot::AddImm { src, .. }) => *src,
                other => panic!("expected add_imm, got {other:?}"),
            })
            .collect();
        assert_eq!(zeros[0], zeros[1]);
    }

    #[test]
    fn broadcast_interns_scalar_and_region() {
        let (mut pool, mut alloc, mut ops) = pool_fixture(ConstSynth::Load);
        let v = pool.broadcast(5, &mut alloc, &mut ops).unwrap();
        let again = pool.broadcast(5, &mut alloc, &mut ops).unwrap();
        assert_eq!(v, again);
        // const load + vbroadcast, emitted once.
        assert_eq!(ops.len(), 2);
        // 1 scalar cell + 4-lane vector region.
        assert_eq!(alloc.used(), 5);
    }
}
