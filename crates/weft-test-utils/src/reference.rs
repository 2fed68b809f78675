//! The reference kernel: the semantics compiled streams are checked
//! against.

use std::collections::HashMap;

use weft_core::machine::header;
use weft_core::{MachineSpec, TraceKey, TraceStage};

/// Every intermediate value of the reference kernel, keyed by
/// `(round, lane, stage)`. Debug compare slots assert against this.
pub type ValueTrace = HashMap<TraceKey, u32>;

/// Execute one round of the reference kernel over the memory image.
///
/// Each lane reads its tree index and accumulator, fetches the node at
/// that index, xor-mixes, hashes, branches on the new value's low bit,
/// and wraps to the root past the leaves. With `trace` set, every
/// intermediate value is recorded.
pub fn reference_round(
    mem: &mut [u32],
    spec: &MachineSpec,
    round: u32,
    mut trace: Option<&mut ValueTrace>,
) {
    let n_nodes = mem[header::N_NODES as usize];
    let batch = mem[header::BATCH_SIZE as usize];
    let forest_p = mem[header::FOREST_VALUES_P as usize] as usize;
    let idx_p = mem[header::INP_INDICES_P as usize] as usize;
    let val_p = mem[header::INP_VALUES_P as usize] as usize;

    for lane in 0..batch {
        let mut record = |stage: TraceStage, value: u32| {
            if let Some(trace) = trace.as_deref_mut() {
                trace.insert(TraceKey { round, lane, stage }, value);
            }
        };

        let idx = mem[idx_p + lane as usize];
        let val = mem[val_p + lane as usize];
        record(TraceStage::Idx, idx);
        record(TraceStage::Val, val);

        let node = mem[forest_p + idx as usize];
        record(TraceStage::NodeVal, node);

        let mut acc = val ^ node;
        for (hi, stage) in spec.hash_stages.iter().enumerate() {
            acc = stage.apply(acc);
            record(TraceStage::HashStage(hi as u8), acc);
        }
        record(TraceStage::HashedVal, acc);

        let next = idx
            .wrapping_mul(2)
            .wrapping_add(1)
            .wrapping_add(acc & 1);
        record(TraceStage::NextIdx, next);
        let wrapped = if next < n_nodes { next } else { 0 };
        record(TraceStage::WrappedIdx, wrapped);

        mem[idx_p + lane as usize] = wrapped;
        mem[val_p + lane as usize] = acc;
    }
}

/// Run every round recorded in the image header.
pub fn run_reference(mem: &mut [u32], spec: &MachineSpec, mut trace: Option<&mut ValueTrace>) {
    let rounds = mem[header::ROUNDS as usize];
    for round in 0..rounds {
        reference_round(mem, spec, round, trace.as_deref_mut());
    }
}
