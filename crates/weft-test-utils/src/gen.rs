//! Seeded generators for trees, inputs, and memory images.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use weft_core::machine::header;

/// A full binary tree of node values, level by level.
#[derive(Clone, Debug)]
pub struct Tree {
    pub height: u32,
    pub values: Vec<u32>,
}

impl Tree {
    /// Generate a full tree of height `height` with random node values.
    pub fn generate(height: u32, rng: &mut impl Rng) -> Self {
        let n = (1usize << (height + 1)) - 1;
        Self {
            height,
            values: (0..n).map(|_| rng.random()).collect(),
        }
    }

    pub fn n_nodes(&self) -> u32 {
        self.values.len() as u32
    }
}

/// A batch of lanes: per-lane tree indices and accumulator values.
///
/// Indices start at the root for every lane; this is what makes each
/// lane's depth a pure function of the round number.
#[derive(Clone, Debug)]
pub struct Input {
    pub indices: Vec<u32>,
    pub values: Vec<u32>,
}

impl Input {
    /// Generate a batch with zeroed indices and random accumulators.
    pub fn generate(batch_size: u32, rng: &mut impl Rng) -> Self {
        Self {
            indices: vec![0; batch_size as usize],
            values: (0..batch_size).map(|_| rng.random()).collect(),
        }
    }
}

/// Build the memory image the machine starts from.
///
/// Cells `0..8` hold the header (counts and region base pointers), then
/// the forest values, the lane indices, and the lane accumulators.
pub fn build_mem_image(tree: &Tree, input: &Input, rounds: u32) -> Vec<u32> {
    let forest_p = header::SIZE;
    let idx_p = forest_p + tree.n_nodes();
    let val_p = idx_p + input.indices.len() as u32;

    let mut mem = vec![0u32; (val_p as usize) + input.values.len()];
    mem[header::TREE_HEIGHT as usize] = tree.height;
    mem[header::N_NODES as usize] = tree.n_nodes();
    mem[header::BATCH_SIZE as usize] = input.indices.len() as u32;
    mem[header::ROUNDS as usize] = rounds;
    mem[header::FOREST_VALUES_P as usize] = forest_p;
    mem[header::INP_INDICES_P as usize] = idx_p;
    mem[header::INP_VALUES_P as usize] = val_p;

    mem[forest_p as usize..idx_p as usize].copy_from_slice(&tree.values);
    mem[idx_p as usize..val_p as usize].copy_from_slice(&input.indices);
    mem[val_p as usize..].copy_from_slice(&input.values);
    mem
}

/// One-call seeded image for a kernel instance.
pub fn seeded_image(height: u32, batch_size: u32, rounds: u32, seed: u64) -> Vec<u32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let tree = Tree::generate(height, &mut rng);
    let input = Input::generate(batch_size, &mut rng);
    build_mem_image(&tree, &input, rounds)
}
