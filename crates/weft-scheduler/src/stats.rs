//! Per-segment scheduling diagnostics.
//!
//! Statistics are computed from the finished [`Schedule`] and the
//! immutable [`DepGraph`] after the fact; collecting them can never change
//! which schedule is produced.

use weft_core::{Engine, EngineMap, MachineSpec, Operation};
use weft_graph::DepGraph;

use crate::schedule::Schedule;

/// Slot occupancy of one engine across a segment.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EngineStats {
    /// Slots issued over the whole segment.
    pub total: usize,
    /// Fewest slots issued in any cycle.
    pub min: usize,
    /// Most slots issued in any cycle.
    pub max: usize,
    /// The engine's per-cycle slot limit.
    pub limit: usize,
    /// Mean slots per cycle.
    pub avg: f64,
    /// Mean occupancy as a percentage of the limit.
    pub util_pct: f64,
}

/// Dependency and occupancy statistics for one scheduled segment.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentStats {
    /// Operations in the segment after pruning.
    pub n_ops: usize,
    /// Strict edge count.
    pub strict_edges: usize,
    /// Weak edge count.
    pub weak_edges: usize,
    /// Longest critical path in the segment.
    pub critical_path: u32,
    /// Cycles the schedule takes.
    pub cycles: usize,
    /// Per-engine occupancy.
    pub engines: EngineMap<EngineStats>,
}

/// Summarise a scheduled segment.
pub fn segment_stats(
    ops: &[Operation],
    graph: &DepGraph,
    schedule: &Schedule,
    spec: &MachineSpec,
) -> SegmentStats {
    let (strict_edges, weak_edges) = graph.edge_counts();
    let cycles = schedule.cycles();

    let mut engines: EngineMap<EngineStats> = EngineMap::from_fn(|e| EngineStats {
        limit: spec.slot_limits[e],
        min: usize::MAX,
        ..EngineStats::default()
    });
    for bundle in &schedule.bundles {
        for &engine in &Engine::ALL {
            let count = bundle.slot_count(engine);
            let entry = &mut engines[engine];
            entry.total += count;
            entry.min = entry.min.min(count);
            entry.max = entry.max.max(count);
        }
    }
    for &engine in &Engine::ALL {
        let entry = &mut engines[engine];
        if cycles == 0 {
            entry.min = 0;
            continue;
        }
        entry.avg = entry.total as f64 / cycles as f64;
        if entry.limit > 0 {
            entry.util_pct = entry.avg / entry.limit as f64 * 100.0;
        }
    }

    SegmentStats {
        n_ops: ops.len(),
        strict_edges,
        weak_edges,
        critical_path: graph.critical_path().iter().copied().max().unwrap_or(0),
        cycles,
        engines,
    }
}
