//! Engine-tagged operations, the unit the scheduler places.

use smallvec::SmallVec;

use crate::engine::Engine;
use crate::id::Addr;
use crate::slot::SlotKind;

/// One schedulable operation: a single slot payload, or a short fused list
/// of payloads sharing one engine.
///
/// A fused operation occupies `slot_count()` slots of its engine in a
/// single cycle, atomically. Its read and write sets are the unions of its
/// sub-slots' sets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    /// Engine all payload slots execute on.
    pub engine: Engine,
    /// Payload slots; length is the engine slot count.
    pub slots: SmallVec<[SlotKind; 2]>,
}

impl Operation {
    /// Wrap a single slot payload.
    pub fn single(slot: SlotKind) -> Self {
        Self {
            engine: slot.engine(),
            slots: SmallVec::from_elem(slot, 1),
        }
    }

    /// Fuse several payloads of the same engine into one operation.
    ///
    /// Panics in debug builds if the payloads disagree on engine or the
    /// list is empty.
    pub fn fused(slots: impl IntoIterator<Item = SlotKind>) -> Self {
        let slots: SmallVec<[SlotKind; 2]> = slots.into_iter().collect();
        debug_assert!(!slots.is_empty());
        let engine = slots[0].engine();
        debug_assert!(slots.iter().all(|s| s.engine() == engine));
        Self { engine, slots }
    }

    /// Number of engine slots this operation occupies.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether this operation delimits a scheduling segment.
    ///
    /// Barriers are always emitted as single-slot operations.
    pub fn is_barrier(&self) -> bool {
        self.slots.len() == 1 && self.slots[0].is_barrier()
    }

    /// Visit every scratch cell any sub-slot reads.
    pub fn visit_reads(&self, vlen: usize, mut f: impl FnMut(Addr)) {
        for slot in &self.slots {
            slot.visit_reads(vlen, &mut f);
        }
    }

    /// Visit every scratch cell any sub-slot writes.
    pub fn visit_writes(&self, vlen: usize, mut f: impl FnMut(Addr)) {
        for slot in &self.slots {
            slot.visit_writes(vlen, &mut f);
        }
    }
}

impl From<SlotKind> for Operation {
    fn from(slot: SlotKind) -> Self {
        Operation::single(slot)
    }
}
