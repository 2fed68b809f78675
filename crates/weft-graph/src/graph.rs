//! Dependency graph construction and critical-path analysis.

use weft_core::{MachineSpec, Operation};

/// Data-dependency graph over one scheduling segment.
///
/// Nodes are operation indices into the segment's op list. Edges come in
/// two strengths:
///
/// - **strict**: the successor must execute on a strictly later cycle
///   (read-after-write and write-after-write);
/// - **weak**: the successor may share the cycle but not precede it
///   (write-after-read: bundle engines commit writes after all reads).
///
/// The graph is immutable once built; the scheduler clones the predecessor
/// counts into per-run state and never mutates the structure itself.
#[derive(Clone, Debug)]
pub struct DepGraph {
    strict_succs: Vec<Vec<u32>>,
    weak_succs: Vec<Vec<u32>>,
    strict_pred_count: Vec<u32>,
    weak_pred_count: Vec<u32>,
}

impl DepGraph {
    /// Build the graph for `ops` in program order.
    ///
    /// Linear pass tracking, per scratch cell, the latest writer and every
    /// reader since that write. Tracking all readers (not merely the most
    /// recent) matters: the scheduler reorders, so a subsequent writer must
    /// wait for every reader that might land late.
    pub fn build(ops: &[Operation], spec: &MachineSpec) -> Self {
        let n = ops.len();
        let mut graph = Self {
            strict_succs: vec![Vec::new(); n],
            weak_succs: vec![Vec::new(); n],
            strict_pred_count: vec![0; n],
            weak_pred_count: vec![0; n],
        };

        let mut last_writer: Vec<Option<u32>> = vec![None; spec.scratch_size];
        let mut readers_since_write: Vec<Vec<u32>> = vec![Vec::new(); spec.scratch_size];

        // Per-op address de-duplication stamps: reads/writes are sets.
        let mut read_stamp = vec![0u32; spec.scratch_size];
        let mut write_stamp = vec![0u32; spec.scratch_size];

        for (i, op) in ops.iter().enumerate() {
            let i = i as u32;
            let stamp = i + 1;

            op.visit_reads(spec.vlen, |addr| {
                let cell = addr.index();
                if read_stamp[cell] == stamp {
                    return;
                }
                read_stamp[cell] = stamp;
                if let Some(w) = last_writer[cell] {
                    graph.add_strict(w, i);
                }
                readers_since_write[cell].push(i);
            });

            op.visit_writes(spec.vlen, |addr| {
                let cell = addr.index();
                if write_stamp[cell] == stamp {
                    return;
                }
                write_stamp[cell] = stamp;
                if let Some(w) = last_writer[cell] {
                    graph.add_strict(w, i);
                }
                for &r in &readers_since_write[cell] {
                    if r != i {
                        graph.add_weak(r, i);
                    }
                }
                readers_since_write[cell].clear();
                last_writer[cell] = Some(i);
            });
        }

        graph
    }

    // Edges to `i` are only appended while visiting `i`, so checking the
    // tail of the successor list deduplicates.
    fn add_strict(&mut self, from: u32, to: u32) {
        let succs = &mut self.strict_succs[from as usize];
        if succs.last() == Some(&to) {
            return;
        }
        succs.push(to);
        self.strict_pred_count[to as usize] += 1;
    }

    fn add_weak(&mut self, from: u32, to: u32) {
        let succs = &mut self.weak_succs[from as usize];
        if succs.last() == Some(&to) {
            return;
        }
        succs.push(to);
        self.weak_pred_count[to as usize] += 1;
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.strict_succs.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.strict_succs.is_empty()
    }

    /// Strict successors of `i`.
    pub fn strict_succs(&self, i: usize) -> &[u32] {
        &self.strict_succs[i]
    }

    /// Weak successors of `i`.
    pub fn weak_succs(&self, i: usize) -> &[u32] {
        &self.weak_succs[i]
    }

    /// Strict predecessor count of `i`.
    pub fn strict_pred_count(&self, i: usize) -> u32 {
        self.strict_pred_count[i]
    }

    /// Weak predecessor count of `i`.
    pub fn weak_pred_count(&self, i: usize) -> u32 {
        self.weak_pred_count[i]
    }

    /// Copies of the predecessor count arrays, for per-run scheduler state.
    pub fn pred_counts(&self) -> (Vec<u32>, Vec<u32>) {
        (self.strict_pred_count.clone(), self.weak_pred_count.clone())
    }

    /// Total successor count (strict + weak) of `i`.
    pub fn succ_count(&self, i: usize) -> usize {
        self.strict_succs[i].len() + self.weak_succs[i].len()
    }

    /// Total edge counts `(strict, weak)`.
    pub fn edge_counts(&self) -> (usize, usize) {
        (
            self.strict_succs.iter().map(Vec::len).sum(),
            self.weak_succs.iter().map(Vec::len).sum(),
        )
    }

    /// Critical-path length of every node.
    ///
    /// Right-to-left sweep: `crit(i) = 1 + max(crit(s))` over all strict
    /// and weak successors; a leaf has `crit = 1`. Edges always point
    /// forward in program order, so one reverse pass suffices.
    pub fn critical_path(&self) -> Vec<u32> {
        let n = self.len();
        let mut crit = vec![1u32; n];
        for i in (0..n).rev() {
            let mut best = 0;
            for &s in &self.strict_succs[i] {
                best = best.max(crit[s as usize]);
            }
            for &s in &self.weak_succs[i] {
                best = best.max(crit[s as usize]);
            }
            crit[i] = 1 + best;
        }
        crit
    }
}
