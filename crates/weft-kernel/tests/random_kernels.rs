//! Property sweep: random kernel instances against the reference.

use proptest::prelude::*;

use weft_core::machine::header;
use weft_core::MachineSpec;
use weft_kernel::{compile, KernelConfig, KernelParams};
use weft_test_utils::{run_reference, seeded_image, RunExit, Simulator};

fn final_values_match(height: u32, batch: u32, rounds: u32, seed: u64) {
    let spec = MachineSpec::default();
    let p = KernelParams {
        tree_height: height,
        n_nodes: (1 << (height + 1)) - 1,
        batch_size: batch,
        rounds,
    };
    let mem = seeded_image(height, batch, rounds, seed);

    let mut ref_mem = mem.clone();
    run_reference(&mut ref_mem, &spec, None);

    let compiled = compile(&spec, &KernelConfig::default(), p).unwrap();
    let mut sim = Simulator::new(&spec, &compiled.bundles, mem);
    while sim.run().unwrap() == RunExit::Paused {}

    let val_p = ref_mem[header::INP_VALUES_P as usize] as usize;
    assert_eq!(
        &sim.mem[val_p..val_p + batch as usize],
        &ref_mem[val_p..val_p + batch as usize]
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn compiled_streams_match_reference(
        height in 2u32..=10,
        batch_choice in 0usize..4,
        rounds in 1u32..=20,
        seed in 0u64..1000,
    ) {
        let vlen = MachineSpec::default().vlen as u32;
        let batch = [vlen, 2 * vlen, 17, 256][batch_choice];
        final_values_match(height, batch, rounds, seed);
    }
}
