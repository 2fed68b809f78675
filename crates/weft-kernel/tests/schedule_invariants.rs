//! Edge and slot-limit invariants checked on real kernel segments.

use weft_core::{Engine, MachineSpec, Operation};
use weft_graph::{prune_dead_slots, DepGraph};
use weft_kernel::{KernelConfig, KernelEmitter, KernelParams};
use weft_scheduler::{schedule_segment, SchedulerConfig};

fn params(height: u32, batch: u32, rounds: u32) -> KernelParams {
    KernelParams {
        tree_height: height,
        n_nodes: (1 << (height + 1)) - 1,
        batch_size: batch,
        rounds,
    }
}

/// Emit, prune, and split the kernel into its barrier-free segments.
fn kernel_segments(spec: &MachineSpec, config: &KernelConfig, p: KernelParams) -> Vec<Vec<Operation>> {
    let emitted = KernelEmitter::emit(spec, config, p).unwrap();
    let ops = prune_dead_slots(emitted.ops, spec, config.emit_debug);
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for op in ops {
        if op.is_barrier() {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
        } else {
            current.push(op);
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

#[test]
fn every_segment_schedule_respects_edge_gaps_and_limits() {
    let spec = MachineSpec::default();
    let config = KernelConfig::default();
    let p = params(5, 48, 6);

    for segment in kernel_segments(&spec, &config, p) {
        let graph = DepGraph::build(&segment, &spec);
        let schedule =
            schedule_segment(&segment, &graph, &spec, &SchedulerConfig::default(), Some(4))
                .unwrap();

        for i in 0..segment.len() {
            for &s in graph.strict_succs(i) {
                assert!(
                    schedule.op_cycle[s as usize] > schedule.op_cycle[i],
                    "strict edge {i} -> {s} violated"
                );
            }
            for &s in graph.weak_succs(i) {
                assert!(
                    schedule.op_cycle[s as usize] >= schedule.op_cycle[i],
                    "weak edge {i} -> {s} violated"
                );
            }
        }
        for bundle in &schedule.bundles {
            for &engine in &Engine::ALL {
                assert!(bundle.slot_count(engine) <= spec.slot_limits[engine]);
            }
        }
    }
}

#[test]
fn pruning_keeps_every_store_and_barrier() {
    let spec = MachineSpec::default();
    let config = KernelConfig::default();
    let p = params(4, 32, 5);

    let emitted = KernelEmitter::emit(&spec, &config, p).unwrap();
    let count = |ops: &[Operation], engine: Engine| {
        ops.iter()
            .filter(|op| op.engine == engine)
            .map(Operation::slot_count)
            .sum::<usize>()
    };
    let stores_before = count(&emitted.ops, Engine::Store);
    let barriers_before = emitted.ops.iter().filter(|op| op.is_barrier()).count();

    let pruned = prune_dead_slots(emitted.ops, &spec, config.emit_debug);
    assert_eq!(count(&pruned, Engine::Store), stores_before);
    assert_eq!(
        pruned.iter().filter(|op| op.is_barrier()).count(),
        barriers_before
    );
    // Submission mode strips every debug slot.
    assert_eq!(count(&pruned, Engine::Debug), 0);
}

#[test]
fn debug_mode_pruning_keeps_debug_slots() {
    let spec = MachineSpec::default();
    let config = KernelConfig {
        emit_debug: true,
        ..KernelConfig::default()
    };
    let p = params(3, 16, 2);
    let emitted = KernelEmitter::emit(&spec, &config, p).unwrap();
    let debug_before = emitted
        .ops
        .iter()
        .filter(|op| op.engine == Engine::Debug)
        .count();
    let pruned = prune_dead_slots(emitted.ops, &spec, true);
    let debug_after = pruned
        .iter()
        .filter(|op| op.engine == Engine::Debug)
        .count();
    assert_eq!(debug_before, debug_after);
    assert!(debug_after > 0);
}
