//! Backward dead-slot elimination.

use weft_core::{MachineSpec, Operation};

/// Remove operations whose writes nothing reads and whose side effects are
/// absent.
///
/// Single backward pass over `ops` with a dense live-address set. In
/// reverse order, a slot is kept when it has an unconditional side effect
/// (store, flow, or debug while `debug_live`) or when one of its writes is
/// in the live set; a kept slot removes its writes from the live set and
/// adds its reads. Fused payloads are filtered sub-slot by sub-slot and
/// dropped entirely once empty. Output preserves the original order.
///
/// The pass must run backwards: a forward sweep would drop producers whose
/// consumers appear later in the list.
pub fn prune_dead_slots(
    ops: Vec<Operation>,
    spec: &MachineSpec,
    debug_live: bool,
) -> Vec<Operation> {
    let mut live = vec![false; spec.scratch_size];
    let mut kept: Vec<Operation> = Vec::with_capacity(ops.len());

    for op in ops.into_iter().rev() {
        let engine = op.engine;
        let mut slots = op.slots;
        slots.retain(|slot| {
            if slot.has_side_effect(debug_live) {
                return true;
            }
            let mut writes_live = false;
            slot.visit_writes(spec.vlen, |addr| writes_live |= live[addr.index()]);
            writes_live
        });
        if slots.is_empty() {
            continue;
        }
        let op = Operation { engine, slots };
        op.visit_writes(spec.vlen, |addr| live[addr.index()] = false);
        op.visit_reads(spec.vlen, |addr| live[addr.index()] = true);
        kept.push(op);
    }

    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::{
        Addr, AluOp, AluSlot, DebugSlot, FlowSlot, LoadSlot, SlotKind, StoreSlot, TraceKey,
        TraceStage,
    };

    fn spec() -> MachineSpec {
        MachineSpec::default()
    }

    fn const_load(dest: u32, value: u32) -> Operation {
        Operation::single(SlotKind::Load(LoadSlot::Const {
            dest: Addr(dest),
            value,
        }))
    }

    fn alu_add(dest: u32, a: u32, b: u32) -> SlotKind {
        SlotKind::Alu(AluSlot {
            op: AluOp::Add,
            dest: Addr(dest),
            a: Addr(a),
            b: Addr(b),
        })
    }

    fn store(addr: u32, src: u32) -> Operation {
        Operation::single(SlotKind::Store(StoreSlot::Store {
            addr: Addr(addr),
            src: Addr(src),
        }))
    }

    fn compare(addr: u32) -> Operation {
        Operation::single(SlotKind::Debug(DebugSlot::Compare {
            addr: Addr(addr),
            key: TraceKey {
                round: 0,
                lane: 0,
                stage: TraceStage::Val,
            },
        }))
    }

    #[test]
    fn unread_writes_are_dropped() {
        let ops = vec![const_load(10, 1), const_load(11, 2), store(0, 10)];
        let kept = prune_dead_slots(ops, &spec(), false);
        // The load into 11 feeds nothing.
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], const_load(10, 1));
        assert_eq!(kept[1], store(0, 10));
    }

    #[test]
    fn producer_chains_survive_through_consumers() {
        let ops = vec![
            const_load(10, 1),
            const_load(11, 2),
            Operation::single(alu_add(12, 10, 11)),
            store(0, 12),
        ];
        let kept = prune_dead_slots(ops, &spec(), false);
        assert_eq!(kept.len(), 4);
    }

    #[test]
    fn debug_ops_keep_their_inputs_only_when_debug_is_live() {
        let ops = vec![const_load(10, 1), compare(10)];
        let kept = prune_dead_slots(ops.clone(), &spec(), true);
        assert_eq!(kept.len(), 2);
        let kept = prune_dead_slots(ops, &spec(), false);
        assert!(kept.is_empty());
    }

    #[test]
    fn fused_payloads_prune_per_subslot() {
        let ops = vec![
            const_load(1, 7),
            const_load(2, 8),
            Operation::fused([alu_add(10, 1, 1), alu_add(11, 2, 2)]),
            store(0, 10),
        ];
        let kept = prune_dead_slots(ops, &spec(), false);
        // The fused pair loses its dead half; the load feeding it goes too.
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[1].slots.len(), 1);
        assert_eq!(kept[1].slots[0], alu_add(10, 1, 1));
    }

    #[test]
    fn overwritten_value_does_not_keep_earlier_producer() {
        let ops = vec![
            const_load(10, 1), // dead: overwritten before any read
            const_load(10, 2),
            store(0, 10),
        ];
        let kept = prune_dead_slots(ops, &spec(), false);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], const_load(10, 2));
    }

    #[test]
    fn flow_and_store_are_unconditional() {
        let ops = vec![
            Operation::single(SlotKind::Flow(FlowSlot::AddImm {
                dest: Addr(20),
                src: Addr(21),
                imm: 3,
            })),
            Operation::single(SlotKind::Flow(FlowSlot::Pause)),
            store(0, 5),
        ];
        let kept = prune_dead_slots(ops, &spec(), false);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn self_referencing_update_keeps_its_input_live() {
        // acc = acc + acc feeding a store: the producer of acc must survive.
        let ops = vec![
            const_load(10, 3),
            Operation::single(alu_add(10, 10, 10)),
            store(0, 10),
        ];
        let kept = prune_dead_slots(ops, &spec(), false);
        assert_eq!(kept.len(), 3);
    }
}
