//! The end-to-end compile pipeline.
//!
//! `validate → emit → prune → segment → schedule → concatenate`. Segments
//! are the maximal barrier-free runs of the pruned op stream; each is
//! graphed and scheduled independently (multi-start when configured), and
//! barriers land between them as single-slot bundles.

use std::error::Error;
use std::fmt;

use weft_core::{Bundle, MachineSpec, Operation};
use weft_graph::{prune_dead_slots, DepGraph};
use weft_scheduler::{schedule_segment_best, segment_stats, ScheduleError, SegmentStats};
use weft_scratch::{Region, ScratchError};

use crate::config::{ConfigError, KernelConfig, KernelParams};
use crate::emitter::KernelEmitter;

/// A fully compiled kernel: the bundle stream plus optional diagnostics.
#[derive(Debug)]
pub struct CompiledKernel {
    /// VLIW bundles in execution order, one per cycle.
    pub bundles: Vec<Bundle>,
    /// Per-segment statistics, collected only in debug mode.
    pub stats: Option<Vec<SegmentStats>>,
    /// Named scratch regions, for diagnostics and trace rendering.
    pub regions: Vec<Region>,
}

impl CompiledKernel {
    /// Total cycle count of the compiled stream.
    pub fn cycles(&self) -> usize {
        self.bundles.len()
    }
}

/// Errors from [`compile`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompileError {
    /// An option was rejected before emission began.
    Config(ConfigError),
    /// Scratch space ran out during emission.
    Scratch(ScratchError),
    /// A segment could not be scheduled.
    Schedule(ScheduleError),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid config: {e}"),
            Self::Scratch(e) => write!(f, "{e}"),
            Self::Schedule(e) => write!(f, "{e}"),
        }
    }
}

impl Error for CompileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Scratch(e) => Some(e),
            Self::Schedule(e) => Some(e),
        }
    }
}

impl From<ConfigError> for CompileError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<ScratchError> for CompileError {
    fn from(e: ScratchError) -> Self {
        Self::Scratch(e)
    }
}

impl From<ScheduleError> for CompileError {
    fn from(e: ScheduleError) -> Self {
        Self::Schedule(e)
    }
}

/// Compile one kernel instance to a VLIW bundle stream.
///
/// All errors are fatal to the compile; there is no partial output.
pub fn compile(
    spec: &MachineSpec,
    config: &KernelConfig,
    params: KernelParams,
) -> Result<CompiledKernel, CompileError> {
    config.validate(&params)?;

    let emitted = KernelEmitter::emit(spec, config, params)?;
    let regions = emitted.alloc.regions().to_vec();
    let ops = prune_dead_slots(emitted.ops, spec, config.emit_debug);

    let mut bundles = Vec::new();
    let mut stats = config.emit_debug.then(Vec::new);
    let mut segment: Vec<Operation> = Vec::new();

    for op in ops {
        if op.is_barrier() {
            flush_segment(&mut segment, spec, config, &mut bundles, &mut stats)?;
            let mut barrier = Bundle::new();
            barrier.push(op.slots[0].clone());
            bundles.push(barrier);
        } else {
            segment.push(op);
        }
    }
    flush_segment(&mut segment, spec, config, &mut bundles, &mut stats)?;

    Ok(CompiledKernel {
        bundles,
        stats,
        regions,
    })
}

/// Schedule the pending segment, append its bundles, and reset it.
fn flush_segment(
    segment: &mut Vec<Operation>,
    spec: &MachineSpec,
    config: &KernelConfig,
    bundles: &mut Vec<Bundle>,
    stats: &mut Option<Vec<SegmentStats>>,
) -> Result<(), CompileError> {
    if segment.is_empty() {
        return Ok(());
    }
    let graph = DepGraph::build(segment, spec);
    let schedule = schedule_segment_best(segment, &graph, spec, &config.scheduler)?;
    if let Some(stats) = stats {
        stats.push(segment_stats(segment, &graph, &schedule, spec));
    }
    bundles.extend(schedule.bundles);
    segment.clear();
    Ok(())
}
