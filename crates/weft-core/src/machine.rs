//! Target machine description.

use crate::engine::{Engine, EngineMap};
use crate::slot::AluOp;

/// Fixed layout of the memory image header.
///
/// The external image builder populates cells `0..SIZE` of main memory
/// with the kernel instance's counts and region base pointers; the emitter
/// reads the cells it needs at the top of the header phase.
pub mod header {
    /// Tree height.
    pub const TREE_HEIGHT: u32 = 0;
    /// Node count of the forest.
    pub const N_NODES: u32 = 1;
    /// Batch size (lane count).
    pub const BATCH_SIZE: u32 = 2;
    /// Round count.
    pub const ROUNDS: u32 = 3;
    /// Base of the forest node values.
    pub const FOREST_VALUES_P: u32 = 4;
    /// Base of the per-lane tree indices.
    pub const INP_INDICES_P: u32 = 5;
    /// Base of the per-lane accumulator values.
    pub const INP_VALUES_P: u32 = 6;
    /// Header length in cells (cell 7 is reserved).
    pub const SIZE: u32 = 8;
}

/// One stage of the fixed accumulator hash.
///
/// A stage computes `a' = (a op1 c1) op2 (a op3 c3)` over the machine's
/// wrapping 32-bit arithmetic. The emitter rewrites stages whose shape
/// allows it (see the kernel crate); this record is the semantic ground
/// truth both the reference kernel and the rewrites are checked against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashStage {
    /// Opcode of the first pre-op.
    pub op1: AluOp,
    /// Constant of the first pre-op.
    pub c1: u32,
    /// Combining opcode.
    pub op2: AluOp,
    /// Opcode of the second pre-op.
    pub op3: AluOp,
    /// Constant of the second pre-op.
    pub c3: u32,
}

impl HashStage {
    /// Evaluate this stage on an accumulator value.
    pub fn apply(&self, a: u32) -> u32 {
        self.op2
            .apply(self.op1.apply(a, self.c1), self.op3.apply(a, self.c3))
    }
}

/// Description of the target machine.
///
/// Everything the compiler knows about the hardware: scratch capacity,
/// vector width, per-engine slot limits, and the hash stage table. Treated
/// as an opaque input: the compiler never assumes particular constants
/// beyond what the stage shapes expose.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachineSpec {
    /// Number of scratch cells. Cells are zero-initialised; a cell that is
    /// never written reads 0.
    pub scratch_size: usize,
    /// Vector width of the VALU, in lanes.
    pub vlen: usize,
    /// Per-cycle slot limit for each engine.
    pub slot_limits: EngineMap<usize>,
    /// The fixed multi-stage accumulator hash.
    pub hash_stages: Vec<HashStage>,
}

impl MachineSpec {
    /// Run the full hash over an accumulator value.
    pub fn hash(&self, mut a: u32) -> u32 {
        for stage in &self.hash_stages {
            a = stage.apply(a);
        }
        a
    }
}

impl Default for MachineSpec {
    /// The reference machine: 4096 scratch cells, 16-lane VALU, a wide
    /// VALU and narrow load/store/flow units, and the six-stage 32-bit
    /// integer mixing table.
    fn default() -> Self {
        let mut slot_limits = EngineMap::default();
        slot_limits[Engine::Alu] = 12;
        slot_limits[Engine::Valu] = 6;
        slot_limits[Engine::Load] = 2;
        slot_limits[Engine::Store] = 2;
        slot_limits[Engine::Flow] = 1;
        slot_limits[Engine::Debug] = 64;
        Self {
            scratch_size: 4096,
            vlen: 16,
            slot_limits,
            hash_stages: vec![
                HashStage {
                    op1: AluOp::Add,
                    c1: 0x7ED5_5D16,
                    op2: AluOp::Add,
                    op3: AluOp::Shl,
                    c3: 12,
                },
                HashStage {
                    op1: AluOp::Xor,
                    c1: 0xC761_C23C,
                    op2: AluOp::Xor,
                    op3: AluOp::Shr,
                    c3: 19,
                },
                HashStage {
                    op1: AluOp::Add,
                    c1: 0x1656_67B1,
                    op2: AluOp::Add,
                    op3: AluOp::Shl,
                    c3: 5,
                },
                HashStage {
                    op1: AluOp::Add,
                    c1: 0xD3A2_646C,
                    op2: AluOp::Xor,
                    op3: AluOp::Shl,
                    c3: 9,
                },
                HashStage {
                    op1: AluOp::Add,
                    c1: 0xFD70_46C5,
                    op2: AluOp::Add,
                    op3: AluOp::Shl,
                    c3: 3,
                },
                HashStage {
                    op1: AluOp::Xor,
                    c1: 0xB55A_4F09,
                    op2: AluOp::Xor,
                    op3: AluOp::Shr,
                    c3: 16,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_are_sane() {
        let spec = MachineSpec::default();
        assert!(spec.slot_limits[Engine::Valu] > spec.slot_limits[Engine::Flow]);
        assert_eq!(spec.slot_limits[Engine::Flow], 1);
        assert_eq!(spec.hash_stages.len(), 6);
        assert!(spec.vlen.is_power_of_two());
    }

    #[test]
    fn hash_differs_from_identity_and_is_deterministic() {
        let spec = MachineSpec::default();
        let h = spec.hash(0xDEAD_BEEF);
        assert_ne!(h, 0xDEAD_BEEF);
        assert_eq!(h, spec.hash(0xDEAD_BEEF));
    }

    #[test]
    fn stage_matches_manual_evaluation() {
        let stage = HashStage {
            op1: AluOp::Add,
            c1: 7,
            op2: AluOp::Add,
            op3: AluOp::Shl,
            c3: 2,
        };
        // (a + 7) + (a << 2)
        assert_eq!(stage.apply(3), (3 + 7) + (3 << 2));
    }
}
