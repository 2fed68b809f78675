//! Lowering of the gather-hash-branch kernel into operation IR.

use weft_core::machine::header;
use weft_core::{
    Addr, AluOp, AluSlot, DebugSlot, FlowSlot, LoadSlot, MachineSpec, Operation, SlotKind,
    StoreSlot, TraceKey, TraceStage, ValuSlot,
};
use weft_scratch::{ConstPool, ConstSynth, ScratchAlloc, ScratchError};

use crate::config::{Depth2SelectMode, Depth4Mode, IdxBranchMode, KernelConfig, KernelParams};
use crate::hash::{self, ScalarStagePlan, VecStagePlan};

/// Output of kernel emission: the straight-line op stream and the
/// allocator whose name table describes the scratch layout.
#[derive(Debug)]
pub struct EmittedKernel {
    /// Emitted operations in program order, barriers included.
    pub ops: Vec<Operation>,
    /// The scratch allocator, retained for its debug name table.
    pub alloc: ScratchAlloc,
}

/// Temp vector registers shared by the groups of one interleave block.
///
/// Reusing a set across blocks serialises the blocks through weak
/// write-after-read edges; the interleave count trades that serialisation
/// against scratch footprint.
#[derive(Clone, Debug)]
struct TempSet {
    t1: Addr,
    t2: Addr,
    node: Addr,
    aux: Addr,
    /// Extra blend registers for the deterministic depth-3/4 modes.
    ex: Vec<Addr>,
}

/// Preloaded node vectors for the specialised depths.
#[derive(Debug, Default)]
struct NodePlan {
    /// Broadcast root value (depth 0).
    root: Option<Addr>,
    /// Depth 1: broadcast left child and left-to-right difference.
    l1: Option<(Addr, Addr)>,
    /// Depth 2: `(f3, f4-f3, f5, f6-f5)` broadcasts.
    l2: Option<(Addr, Addr, Addr, Addr)>,
    /// Depth 3: pair bases and differences, four of each.
    l3: Option<(Vec<Addr>, Vec<Addr>)>,
    /// Depth 4: pair bases and differences, eight of each.
    l4: Option<(Vec<Addr>, Vec<Addr>)>,
    /// Broadcast forest base pointer for gather depths.
    forest_base: Option<Addr>,
}

/// Per-lane scalar cells for the tail (lanes past the last full vector
/// group).
#[derive(Debug, Default)]
pub(crate) struct TailRegs {
    pub(crate) lanes: Vec<u32>,
    pub(crate) val: Vec<Addr>,
    pub(crate) idx: Vec<Addr>,
    pub(crate) t1: Vec<Addr>,
    pub(crate) t2: Vec<Addr>,
    pub(crate) node: Vec<Addr>,
    pub(crate) taddr: Vec<Addr>,
    pub(crate) val_addr: Vec<Addr>,
    pub(crate) idx_addr: Vec<Addr>,
}

/// Emits the kernel as one straight-line op stream.
///
/// Accumulator and index vectors stay resident in scratch across rounds:
/// the header loads every lane's value once, the rounds compute in
/// registers, and the epilogue stores the final values. Only debug builds
/// touch memory (and emit a barrier) per round.
pub struct KernelEmitter<'a> {
    pub(crate) spec: &'a MachineSpec,
    pub(crate) config: &'a KernelConfig,
    params: KernelParams,
    pub(crate) alloc: ScratchAlloc,
    consts: ConstPool,
    pub(crate) ops: Vec<Operation>,

    // Header-loaded scalars.
    pub(crate) n_nodes_cell: Addr,
    pub(crate) forest_p: Addr,
    pub(crate) idx_p: Addr,
    pub(crate) val_p: Addr,

    // Lane groups.
    groups: usize,
    early_groups: usize,
    late_groups: usize,
    group_val: Vec<Addr>,
    group_idx: Vec<Addr>,
    group_val_ptr: Vec<Addr>,
    group_idx_ptr: Vec<Addr>,
    sets: Vec<TempSet>,

    use_d3: bool,
    use_d4: bool,
    nodes: NodePlan,
    hash_plans: Vec<VecStagePlan>,
    pub(crate) scalar_plans: Vec<ScalarStagePlan>,

    // Interned vector constants.
    vc_one: Addr,
    vc_two: Addr,
    vc_three: Addr,
    vc_seven: Addr,
    vc_fifteen: Addr,
    zero_scalar: Addr,
    pub(crate) one_scalar: Addr,
    pub(crate) two_scalar: Addr,

    pub(crate) tail: TailRegs,
}

impl<'a> KernelEmitter<'a> {
    /// Emit the complete kernel for `params` under `config`.
    pub fn emit(
        spec: &'a MachineSpec,
        config: &'a KernelConfig,
        params: KernelParams,
    ) -> Result<EmittedKernel, ScratchError> {
        let mut emitter = Self::new(spec, config, params)?;
        emitter.emit_header()?;
        for round in 0..params.rounds {
            emitter.emit_round(round);
        }
        emitter.emit_epilogue();
        Ok(EmittedKernel {
            ops: emitter.ops,
            alloc: emitter.alloc,
        })
    }

    fn new(
        spec: &'a MachineSpec,
        config: &'a KernelConfig,
        params: KernelParams,
    ) -> Result<Self, ScratchError> {
        let vlen = spec.vlen;
        let groups = params.batch_size as usize / vlen;
        let height = params.tree_height;
        let use_d3 = config.depth3_deterministic && height >= 3;
        let use_d4 = config.depth4_mode == Depth4Mode::Deterministic16 && height >= 4;
        let (early_groups, late_groups) =
            plan_interleave(spec, config, params, groups, use_d3, use_d4);

        let mut alloc = ScratchAlloc::new(spec.scratch_size);
        let synth = if config.emit_debug {
            ConstSynth::Load
        } else {
            ConstSynth::AddImm
        };
        let consts = ConstPool::new(synth, vlen);

        let n_nodes_cell = alloc.alloc_named("n_nodes", 1)?;
        let forest_p = alloc.alloc_named("forest_values_p", 1)?;
        let idx_p = alloc.alloc_named("inp_indices_p", 1)?;
        let val_p = alloc.alloc_named("inp_values_p", 1)?;

        let mut group_val = Vec::with_capacity(groups);
        let mut group_idx = Vec::with_capacity(groups);
        let mut group_val_ptr = Vec::with_capacity(groups);
        let mut group_idx_ptr = Vec::new();
        for g in 0..groups {
            group_val.push(alloc.alloc_named(format!("vec_val_g{g}"), vlen)?);
            group_idx.push(alloc.alloc_named(format!("vec_idx_g{g}"), vlen)?);
            group_val_ptr.push(alloc.alloc_named(format!("val_ptr_g{g}"), 1)?);
            if config.emit_debug {
                group_idx_ptr.push(alloc.alloc_named(format!("idx_ptr_g{g}"), 1)?);
            }
        }

        let n_sets = if groups == 0 {
            0
        } else {
            early_groups.max(late_groups)
        };
        let ex_count = if use_d4 {
            6
        } else if use_d3 {
            2
        } else {
            0
        };
        let mut sets = Vec::with_capacity(n_sets);
        for s in 0..n_sets {
            let mut ex = Vec::with_capacity(ex_count);
            for x in 0..ex_count {
                ex.push(alloc.alloc_named(format!("set{s}_ex{x}"), vlen)?);
            }
            sets.push(TempSet {
                t1: alloc.alloc_named(format!("set{s}_t1"), vlen)?,
                t2: alloc.alloc_named(format!("set{s}_t2"), vlen)?,
                node: alloc.alloc_named(format!("set{s}_node"), vlen)?,
                aux: alloc.alloc_named(format!("set{s}_aux"), vlen)?,
                ex,
            });
        }

        let mut tail = TailRegs::default();
        for lane in (groups * vlen) as u32..params.batch_size {
            tail.lanes.push(lane);
            tail.val.push(alloc.alloc_named(format!("tail_val_{lane}"), 1)?);
            tail.idx.push(alloc.alloc_named(format!("tail_idx_{lane}"), 1)?);
            tail.t1.push(alloc.alloc(1)?);
            tail.t2.push(alloc.alloc(1)?);
            tail.node.push(alloc.alloc(1)?);
            tail.taddr.push(alloc.alloc(1)?);
            tail.val_addr.push(alloc.alloc_named(format!("tail_val_ptr_{lane}"), 1)?);
            if config.emit_debug {
                tail.idx_addr
                    .push(alloc.alloc_named(format!("tail_idx_ptr_{lane}"), 1)?);
            }
        }

        Ok(Self {
            spec,
            config,
            params,
            alloc,
            consts,
            ops: Vec::new(),
            n_nodes_cell,
            forest_p,
            idx_p,
            val_p,
            groups,
            early_groups,
            late_groups,
            group_val,
            group_idx,
            group_val_ptr,
            group_idx_ptr,
            sets,
            use_d3,
            use_d4,
            nodes: NodePlan::default(),
            hash_plans: Vec::new(),
            scalar_plans: Vec::new(),
            vc_one: Addr(0),
            vc_two: Addr(0),
            vc_three: Addr(0),
            vc_seven: Addr(0),
            vc_fifteen: Addr(0),
            zero_scalar: Addr(0),
            one_scalar: Addr(0),
            two_scalar: Addr(0),
            tail,
        })
    }

    // ── Small emission helpers ──────────────────────────────────────

    pub(crate) fn push(&mut self, slot: SlotKind) {
        self.ops.push(Operation::single(slot));
    }

    pub(crate) fn alu(&mut self, op: AluOp, dest: Addr, a: Addr, b: Addr) {
        self.push(SlotKind::Alu(AluSlot { op, dest, a, b }));
    }

    fn vop(&mut self, op: AluOp, dest: Addr, a: Addr, b: Addr) {
        self.push(SlotKind::Valu(ValuSlot::Binary { op, dest, a, b }));
    }

    fn fma(&mut self, dest: Addr, a: Addr, b: Addr, c: Addr) {
        self.push(SlotKind::Valu(ValuSlot::MultiplyAdd { dest, a, b, c }));
    }

    pub(crate) fn sconst(&mut self, value: u32) -> Result<Addr, ScratchError> {
        self.consts.scalar(value, &mut self.alloc, &mut self.ops)
    }

    fn vconst(&mut self, value: u32) -> Result<Addr, ScratchError> {
        self.consts.broadcast(value, &mut self.alloc, &mut self.ops)
    }

    // Debug compares are emitted unconditionally; in submission mode the
    // pruner strips every debug op before scheduling.
    fn vcompare(&mut self, base: Addr, round: u32, lane_base: u32, stage: TraceStage) {
        let keys = (0..self.spec.vlen as u32)
            .map(|vi| TraceKey {
                round,
                lane: lane_base + vi,
                stage,
            })
            .collect();
        self.push(SlotKind::Debug(DebugSlot::VCompare { base, keys }));
    }

    pub(crate) fn compare(&mut self, addr: Addr, round: u32, lane: u32, stage: TraceStage) {
        self.push(SlotKind::Debug(DebugSlot::Compare {
            addr,
            key: TraceKey { round, lane, stage },
        }));
    }

    // ── Header ──────────────────────────────────────────────────────

    fn emit_header(&mut self) -> Result<(), ScratchError> {
        // Header pointer loads.
        for (cell, index) in [
            (self.n_nodes_cell, header::N_NODES),
            (self.forest_p, header::FOREST_VALUES_P),
            (self.idx_p, header::INP_INDICES_P),
            (self.val_p, header::INP_VALUES_P),
        ] {
            let addr = self.sconst(index)?;
            self.push(SlotKind::Load(LoadSlot::Load { dest: cell, addr }));
        }

        // Vector constants for the branch, the blend bit extraction, and
        // the level-base subtractions.
        let height = self.params.tree_height;
        self.vc_one = self.vconst(1)?;
        self.vc_two = self.vconst(2)?;
        if height >= 2 || self.use_d4 {
            self.vc_three = self.vconst(3)?;
        }
        if self.use_d3 {
            self.vc_seven = self.vconst(7)?;
        }
        if self.use_d4 {
            self.vc_fifteen = self.vconst(15)?;
        }
        if self.config.emit_debug {
            self.zero_scalar = self.sconst(0)?;
        }
        if !self.tail.lanes.is_empty() {
            self.one_scalar = self.sconst(1)?;
            self.two_scalar = self.sconst(2)?;
        }

        // Hash constants and per-stage forms.
        self.hash_plans = hash::plan_hash_vec(
            &self.spec.hash_stages,
            &mut self.consts,
            &mut self.alloc,
            &mut self.ops,
        )?;
        if !self.tail.lanes.is_empty() {
            self.scalar_plans = hash::plan_hash_scalar(
                &self.spec.hash_stages,
                &mut self.consts,
                &mut self.alloc,
                &mut self.ops,
            )?;
        }

        if self.has_gather() {
            let base = self.alloc.alloc_named("vec_forest_base", self.spec.vlen)?;
            let src = self.forest_p;
            self.push(SlotKind::Valu(ValuSlot::Broadcast { dest: base, src }));
            self.nodes.forest_base = Some(base);
        }

        self.preload_nodes()?;

        // Group pointers and the initial accumulator loads.
        for g in 0..self.groups {
            let offset = self.sconst((g * self.spec.vlen) as u32)?;
            let val_ptr = self.group_val_ptr[g];
            let val_p = self.val_p;
            self.alu(AluOp::Add, val_ptr, val_p, offset);
            let dest = self.group_val[g];
            self.push(SlotKind::Load(LoadSlot::VLoad {
                dest,
                addr: val_ptr,
            }));
            if self.config.emit_debug {
                let idx_ptr = self.group_idx_ptr[g];
                let idx_p = self.idx_p;
                self.alu(AluOp::Add, idx_ptr, idx_p, offset);
            }
        }

        self.emit_tail_header()?;

        if self.config.emit_debug {
            self.push(SlotKind::Flow(FlowSlot::Pause));
        }
        Ok(())
    }

    fn has_gather(&self) -> bool {
        (3..=self.params.tree_height)
            .any(|d| !(d == 3 && self.use_d3) && !(d == 4 && self.use_d4))
    }

    /// Load one forest node into a scalar cell via an address cell.
    fn preload_node(&mut self, j: u32) -> Result<Addr, ScratchError> {
        let offset = self.sconst(j)?;
        let addr_cell = self.alloc.alloc(1)?;
        let forest_p = self.forest_p;
        self.alu(AluOp::Add, addr_cell, forest_p, offset);
        let node = self.alloc.alloc_named(format!("node_{j}"), 1)?;
        self.push(SlotKind::Load(LoadSlot::Load {
            dest: node,
            addr: addr_cell,
        }));
        Ok(node)
    }

    fn broadcast_cell(&mut self, name: String, src: Addr) -> Result<Addr, ScratchError> {
        let dest = self.alloc.alloc_named(name, self.spec.vlen)?;
        self.push(SlotKind::Valu(ValuSlot::Broadcast { dest, src }));
        Ok(dest)
    }

    /// Preload, difference, and broadcast one level's node pairs.
    ///
    /// Level `d` holds nodes `2^d - 1 .. 2^(d+1) - 2`; consecutive pairs
    /// are blended from `(left, right - left)`.
    fn preload_pairs(&mut self, level: u32) -> Result<(Vec<Addr>, Vec<Addr>), ScratchError> {
        let first = (1u32 << level) - 1;
        let count = 1usize << (level - 1);
        let mut bases = Vec::with_capacity(count);
        let mut diffs = Vec::with_capacity(count);
        for p in 0..count as u32 {
            let lo = self.preload_node(first + 2 * p)?;
            let hi = self.preload_node(first + 2 * p + 1)?;
            let diff = self.alloc.alloc(1)?;
            self.alu(AluOp::Sub, diff, hi, lo);
            bases.push(self.broadcast_cell(format!("vec_l{level}_base{p}"), lo)?);
            diffs.push(self.broadcast_cell(format!("vec_l{level}_diff{p}"), diff)?);
        }
        Ok((bases, diffs))
    }

    fn preload_nodes(&mut self) -> Result<(), ScratchError> {
        let height = self.params.tree_height;
        let root = self.preload_node(0)?;
        self.nodes.root = Some(self.broadcast_cell("vec_root".into(), root)?);
        if height >= 1 {
            let (bases, diffs) = self.preload_pairs(1)?;
            self.nodes.l1 = Some((bases[0], diffs[0]));
        }
        if height >= 2 {
            let (bases, diffs) = self.preload_pairs(2)?;
            self.nodes.l2 = Some((bases[0], diffs[0], bases[1], diffs[1]));
        }
        if self.use_d3 {
            self.nodes.l3 = Some(self.preload_pairs(3)?);
        }
        if self.use_d4 {
            self.nodes.l4 = Some(self.preload_pairs(4)?);
        }
        Ok(())
    }

    // ── Rounds ──────────────────────────────────────────────────────

    fn emit_round(&mut self, round: u32) {
        let depth = round % (self.params.tree_height + 1);
        let last = round + 1 == self.params.rounds;
        let block = if depth <= 2 {
            self.early_groups
        } else {
            self.late_groups
        };

        if self.groups > 0 {
            let mut start = 0;
            while start < self.groups {
                let end = (start + block).min(self.groups);
                for g in start..end {
                    self.emit_group(round, depth, last, g, g - start);
                }
                start = end;
            }
        }

        self.emit_tail_round(round, last);

        if self.config.emit_debug {
            for g in 0..self.groups {
                self.push(SlotKind::Store(StoreSlot::VStore {
                    addr: self.group_idx_ptr[g],
                    src: self.group_idx[g],
                }));
                self.push(SlotKind::Store(StoreSlot::VStore {
                    addr: self.group_val_ptr[g],
                    src: self.group_val[g],
                }));
            }
            for k in 0..self.tail.lanes.len() {
                self.push(SlotKind::Store(StoreSlot::Store {
                    addr: self.tail.idx_addr[k],
                    src: self.tail.idx[k],
                }));
                self.push(SlotKind::Store(StoreSlot::Store {
                    addr: self.tail.val_addr[k],
                    src: self.tail.val[k],
                }));
            }
            if !last {
                self.push(SlotKind::Flow(FlowSlot::Pause));
            }
        }
    }

    /// One vector group's worth of one round.
    fn emit_group(&mut self, round: u32, depth: u32, last: bool, g: usize, set_i: usize) {
        let set = self.sets[set_i].clone();
        let val = self.group_val[g];
        let idx = self.group_idx[g];
        let lane_base = (g * self.spec.vlen) as u32;
        let height = self.params.tree_height;

        let node_vec = self.emit_node(depth, idx, &set);
        self.vcompare(node_vec, round, lane_base, TraceStage::NodeVal);

        self.vop(AluOp::Xor, val, val, node_vec);
        let debug = Some((round, lane_base));
        hash::emit_hash_vec(
            &mut self.ops,
            &self.hash_plans,
            val,
            set.t1,
            set.t2,
            self.config.split_hash_pairs,
            self.spec.vlen,
            debug,
        );
        self.vcompare(val, round, lane_base, TraceStage::HashedVal);

        // Index update. At the deepest level every lane wraps back to the
        // root, which the next depth-0 round assumes without reading the
        // register; the last round's update has no consumer at all.
        if !self.config.emit_debug && (last || depth == height) {
            return;
        }
        if depth == height {
            let zero = self.zero_scalar;
            self.push(SlotKind::Valu(ValuSlot::Broadcast { dest: idx, src: zero }));
        } else {
            self.vop(AluOp::And, set.t1, val, self.vc_one);
            if depth == 0 {
                // idx is 0 in every lane: the child index is just bit + 1.
                self.vop(AluOp::Add, idx, set.t1, self.vc_one);
            } else {
                match self.config.idx_branch_mode {
                    IdxBranchMode::AluBranch => {
                        self.vop(AluOp::Add, set.t2, set.t1, self.vc_one);
                        self.fma(idx, idx, self.vc_two, set.t2);
                    }
                    IdxBranchMode::Vselect => {
                        self.fma(set.aux, idx, self.vc_two, self.vc_one);
                        self.vop(AluOp::Add, set.t2, set.aux, self.vc_one);
                        self.push(SlotKind::Flow(FlowSlot::VSelect {
                            dest: idx,
                            cond: set.t1,
                            a: set.t2,
                            b: set.aux,
                        }));
                    }
                }
            }
        }
        self.vcompare(idx, round, lane_base, TraceStage::WrappedIdx);
    }

    /// Materialise the node values for one group at the given depth,
    /// returning the vector the accumulators xor against.
    fn emit_node(&mut self, depth: u32, idx: Addr, set: &TempSet) -> Addr {
        match depth {
            0 => self.nodes.root.expect("root is always preloaded"),
            1 => {
                let (f1, d) = self.nodes.l1.expect("level 1 preloaded for height >= 1");
                self.vop(AluOp::Sub, set.t1, idx, self.vc_one);
                self.fma(set.node, set.t1, d, f1);
                set.node
            }
            2 => {
                let (f3, d43, f5, d65) = self.nodes.l2.expect("level 2 preloaded");
                self.vop(AluOp::Sub, set.t1, idx, self.vc_three);
                self.vop(AluOp::Shr, set.t2, set.t1, self.vc_one);
                self.vop(AluOp::And, set.t1, set.t1, self.vc_one);
                self.fma(set.node, set.t1, d43, f3);
                self.fma(set.aux, set.t1, d65, f5);
                match self.config.depth2_select_mode {
                    Depth2SelectMode::AluBlend => {
                        self.vop(AluOp::Sub, set.aux, set.aux, set.node);
                        self.fma(set.node, set.t2, set.aux, set.node);
                    }
                    Depth2SelectMode::Vselect => {
                        self.push(SlotKind::Flow(FlowSlot::VSelect {
                            dest: set.node,
                            cond: set.t2,
                            a: set.aux,
                            b: set.node,
                        }));
                    }
                }
                set.node
            }
            3 if self.use_d3 => {
                let (bases, diffs) = self.nodes.l3.clone().expect("level 3 preloaded");
                let m = [set.node, set.aux, set.ex[0], set.ex[1]];
                self.vop(AluOp::Sub, set.t1, idx, self.vc_seven);
                self.blend_tree(set, &m, &bases, &diffs);
                set.node
            }
            4 if self.use_d4 => {
                let (bases, diffs) = self.nodes.l4.clone().expect("level 4 preloaded");
                let m = [
                    set.node, set.aux, set.ex[0], set.ex[1], set.ex[2], set.ex[3], set.ex[4],
                    set.ex[5],
                ];
                self.vop(AluOp::Sub, set.t1, idx, self.vc_fifteen);
                self.blend_tree(set, &m, &bases, &diffs);
                set.node
            }
            _ => {
                let base = self.nodes.forest_base.expect("gather base preloaded");
                self.vop(AluOp::Add, set.aux, base, idx);
                for offset in 0..self.spec.vlen as u32 {
                    self.push(SlotKind::Load(LoadSlot::LoadOffset {
                        dest: set.node,
                        addr: set.aux,
                        offset,
                    }));
                }
                set.node
            }
        }
    }

    /// Reduce `2n` preloaded candidates to one vector by bit-keyed blends.
    ///
    /// `set.t1` holds the lane's offset within the level; bit `k` selects
    /// within pairs at blend level `k`. Results collapse in place over the
    /// `m` registers, finishing in `m[0]` (= `set.node`).
    fn blend_tree(&mut self, set: &TempSet, m: &[Addr], bases: &[Addr], diffs: &[Addr]) {
        // Level 0: bit 0 picks within each preloaded pair.
        self.vop(AluOp::And, set.t2, set.t1, self.vc_one);
        for (k, (&base, &diff)) in bases.iter().zip(diffs).enumerate() {
            self.fma(m[k], set.t2, diff, base);
        }
        // Higher levels: shift the offset, mask the bit, blend pairs of
        // intermediate registers at stride 2^level.
        let mut width = bases.len();
        let mut level = 1u32;
        while width > 1 {
            let shift = match level {
                1 => self.vc_one,
                2 => self.vc_two,
                _ => self.vc_three,
            };
            self.vop(AluOp::Shr, set.t2, set.t1, shift);
            self.vop(AluOp::And, set.t2, set.t2, self.vc_one);
            let stride = 1 << level;
            let mut k = 0;
            while k < bases.len() {
                let lo = m[k];
                let hi = m[k + stride / 2];
                self.vop(AluOp::Sub, hi, hi, lo);
                self.fma(lo, set.t2, hi, lo);
                k += stride;
            }
            width /= 2;
            level += 1;
        }
    }

    // ── Epilogue ────────────────────────────────────────────────────

    fn emit_epilogue(&mut self) {
        if !self.config.emit_debug {
            for g in 0..self.groups {
                self.push(SlotKind::Store(StoreSlot::VStore {
                    addr: self.group_val_ptr[g],
                    src: self.group_val[g],
                }));
            }
            for k in 0..self.tail.lanes.len() {
                self.push(SlotKind::Store(StoreSlot::Store {
                    addr: self.tail.val_addr[k],
                    src: self.tail.val[k],
                }));
            }
        }
        self.push(SlotKind::Flow(FlowSlot::Halt));
    }
}

/// Clamp and adapt the interleave counts to the scratch budget.
///
/// The estimate errs high: it charges the worst-case constant pool and
/// preload footprint so a passing plan cannot fail at allocation time for
/// interleave reasons. Early decrements first, then late, floor 8 (or the
/// group count when smaller).
fn plan_interleave(
    spec: &MachineSpec,
    config: &KernelConfig,
    params: KernelParams,
    groups: usize,
    use_d3: bool,
    use_d4: bool,
) -> (usize, usize) {
    if groups == 0 {
        return (1, 1);
    }
    let mut early = config.interleave_groups_early.min(groups);
    let mut late = config.interleave_groups.min(groups);
    let floor = 8.min(groups);

    let vlen = spec.vlen;
    let ex_count = if use_d4 {
        6
    } else if use_d3 {
        2
    } else {
        0
    };
    let set_cells = (4 + ex_count) * vlen;
    let tail_count = params.batch_size as usize - groups * vlen;

    let demand = |early: usize, late: usize| {
        let resident = groups * 2 * vlen;
        let pointers = groups * 2 + tail_count * 8;
        // Constants, preloaded nodes and differences, header scalars.
        let fixed = 64
            + (8 + 2 * spec.hash_stages.len()) * vlen
            + 32 * (2 + vlen)
            + spec.hash_stages.len() * 2;
        resident + pointers + fixed + early.max(late) * set_cells
    };

    while demand(early, late) > spec.scratch_size {
        if early > floor {
            early -= 1;
        } else if late > floor {
            late -= 1;
        } else {
            break;
        }
    }
    (early.max(1), late.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::Engine;

    fn params(height: u32, batch: u32, rounds: u32) -> KernelParams {
        KernelParams {
            tree_height: height,
            n_nodes: (1 << (height + 1)) - 1,
            batch_size: batch,
            rounds,
        }
    }

    #[test]
    fn emission_ends_with_halt() {
        let spec = MachineSpec::default();
        let config = KernelConfig::default();
        let emitted = KernelEmitter::emit(&spec, &config, params(3, 32, 4)).unwrap();
        let last = emitted.ops.last().unwrap();
        assert!(last.is_barrier());
        assert_eq!(last.slots[0], SlotKind::Flow(FlowSlot::Halt));
    }

    #[test]
    fn debug_compares_are_emitted_even_in_submission_mode() {
        // The pruner, not the emitter, is responsible for stripping them.
        let spec = MachineSpec::default();
        let config = KernelConfig {
            emit_debug: false,
            ..KernelConfig::default()
        };
        let emitted = KernelEmitter::emit(&spec, &config, params(3, 32, 2)).unwrap();
        assert!(emitted.ops.iter().any(|op| op.engine == Engine::Debug));
    }

    #[test]
    fn debug_mode_emits_one_barrier_per_round_plus_header() {
        let spec = MachineSpec::default();
        let config = KernelConfig {
            emit_debug: true,
            ..KernelConfig::default()
        };
        let rounds = 5;
        let emitted = KernelEmitter::emit(&spec, &config, params(3, 32, rounds)).unwrap();
        let barriers = emitted.ops.iter().filter(|op| op.is_barrier()).count();
        // Header pause + a pause after every round but the last + halt.
        assert_eq!(barriers, rounds as usize + 1);
    }

    #[test]
    fn scalar_tail_lanes_get_their_own_cells() {
        let spec = MachineSpec::default();
        let config = KernelConfig::default();
        let mut emitter = KernelEmitter::new(&spec, &config, params(3, 17, 2)).unwrap();
        assert_eq!(emitter.groups, 1);
        assert_eq!(emitter.tail.lanes, vec![16]);
        emitter.emit_header().unwrap();
    }

    #[test]
    fn interleave_adapts_down_under_scratch_pressure() {
        let mut spec = MachineSpec::default();
        spec.scratch_size = 2048;
        let config = KernelConfig {
            interleave_groups: 16,
            interleave_groups_early: 16,
            ..KernelConfig::default()
        };
        let p = params(10, 256, 16);
        let groups = p.batch_size as usize / spec.vlen;
        let (early, late) = plan_interleave(&spec, &config, p, groups, true, false);
        assert!(early < 16 || late < 16);
        assert!(early >= 8 && late >= 8);
    }

    #[test]
    fn gather_presence_tracks_specialisation_flags() {
        let spec = MachineSpec::default();
        let config = KernelConfig {
            depth3_deterministic: true,
            depth4_mode: Depth4Mode::Deterministic16,
            ..KernelConfig::default()
        };
        let emitter = KernelEmitter::new(&spec, &config, params(4, 32, 2)).unwrap();
        // Heights 3 and 4 are both deterministic: nothing left to gather.
        assert!(!emitter.has_gather());

        let emitter = KernelEmitter::new(&spec, &config, params(5, 32, 2)).unwrap();
        assert!(emitter.has_gather());
    }
}
