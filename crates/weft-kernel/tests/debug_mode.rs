//! Debug-mode streams: barrier alignment, per-round memory, and trace
//! compares.

use weft_core::machine::header;
use weft_core::MachineSpec;
use weft_kernel::{compile, KernelConfig, KernelParams};
use weft_test_utils::{reference_round, run_reference, seeded_image, RunExit, Simulator, ValueTrace};

fn params(height: u32, batch: u32, rounds: u32) -> KernelParams {
    KernelParams {
        tree_height: height,
        n_nodes: (1 << (height + 1)) - 1,
        batch_size: batch,
        rounds,
    }
}

fn debug_config() -> KernelConfig {
    KernelConfig {
        emit_debug: true,
        ..KernelConfig::default()
    }
}

#[test]
fn barriers_align_with_reference_yield_points() {
    let spec = MachineSpec::default();
    let p = params(3, 32, 4);
    let compiled = compile(&spec, &debug_config(), p).unwrap();

    let barriers: usize = compiled
        .bundles
        .iter()
        .filter(|b| b.iter().any(|(_, slots)| slots.iter().any(|s| s.is_barrier())))
        .count();
    // The reference yields once before round 0 and once per round; the
    // stream answers with the header pause, a pause per inner round, and
    // the final halt.
    assert_eq!(barriers, p.rounds as usize + 1);
}

#[test]
fn per_round_memory_matches_reference_at_every_yield() {
    let spec = MachineSpec::default();
    let p = params(3, 37, 4); // vector groups plus a scalar tail
    let seed = 1234;

    let mem = seeded_image(p.tree_height, p.batch_size, p.rounds, seed);
    let mut ref_mem = mem.clone();

    // Record the full value trace up front; compares key by round.
    let mut trace = ValueTrace::new();
    {
        let mut trace_mem = mem.clone();
        run_reference(&mut trace_mem, &spec, Some(&mut trace));
    }

    let compiled = compile(&spec, &debug_config(), p).unwrap();
    let mut sim = Simulator::new(&spec, &compiled.bundles, mem).with_trace(&trace);

    // Header yield: memory untouched.
    assert_eq!(sim.run().unwrap(), RunExit::Paused);
    assert_eq!(sim.mem, ref_mem);

    let idx_p = ref_mem[header::INP_INDICES_P as usize] as usize;
    let val_p = ref_mem[header::INP_VALUES_P as usize] as usize;
    let batch = p.batch_size as usize;

    for round in 0..p.rounds {
        reference_round(&mut ref_mem, &spec, round, None);
        let exit = sim.run().unwrap();
        if round + 1 == p.rounds {
            assert_eq!(exit, RunExit::Halted);
        } else {
            assert_eq!(exit, RunExit::Paused);
        }
        assert_eq!(
            &sim.mem[val_p..val_p + batch],
            &ref_mem[val_p..val_p + batch],
            "values diverge after round {round}"
        );
        assert_eq!(
            &sim.mem[idx_p..idx_p + batch],
            &ref_mem[idx_p..idx_p + batch],
            "indices diverge after round {round}"
        );
    }
}

#[test]
fn debug_stream_keeps_compare_slots() {
    let spec = MachineSpec::default();
    let p = params(2, 16, 2);
    let compiled = compile(&spec, &debug_config(), p).unwrap();
    let debug_slots: usize = compiled
        .bundles
        .iter()
        .map(|b| b.slot_count(weft_core::Engine::Debug))
        .sum();
    assert!(debug_slots > 0);
    assert!(compiled.stats.is_some());
}

#[test]
fn debug_and_submission_agree_on_final_values() {
    let spec = MachineSpec::default();
    let p = params(4, 33, 6);
    let seed = 9;
    let mut results = Vec::new();
    for config in [debug_config(), KernelConfig::default()] {
        let mem = seeded_image(p.tree_height, p.batch_size, p.rounds, seed);
        let compiled = compile(&spec, &config, p).unwrap();
        let mut sim = Simulator::new(&spec, &compiled.bundles, mem);
        while sim.run().unwrap() == RunExit::Paused {}
        let val_p = sim.mem[header::INP_VALUES_P as usize] as usize;
        results.push(sim.mem[val_p..val_p + p.batch_size as usize].to_vec());
    }
    assert_eq!(results[0], results[1]);
}
