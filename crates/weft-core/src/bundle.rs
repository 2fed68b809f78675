//! VLIW instruction bundles.

use crate::engine::{Engine, EngineMap};
use crate::slot::SlotKind;

/// One VLIW instruction: the slots every engine executes in one cycle.
///
/// The machine consumes bundles cycle by cycle. Within a bundle every
/// engine reads its sources before any engine's writes commit, which is
/// what makes same-cycle write-after-read legal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bundle {
    lanes: EngineMap<Vec<SlotKind>>,
}

impl Bundle {
    /// An empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slot to its engine's lane.
    pub fn push(&mut self, slot: SlotKind) {
        self.lanes[slot.engine()].push(slot);
    }

    /// Slots queued on `engine` this cycle.
    pub fn slots(&self, engine: Engine) -> &[SlotKind] {
        &self.lanes[engine]
    }

    /// Number of slots occupied on `engine`.
    pub fn slot_count(&self, engine: Engine) -> usize {
        self.lanes[engine].len()
    }

    /// Whether no engine has any slot queued.
    pub fn is_empty(&self) -> bool {
        Engine::ALL.iter().all(|&e| self.lanes[e].is_empty())
    }

    /// Iterate `(engine, slots)` pairs for engines with at least one slot.
    pub fn iter(&self) -> impl Iterator<Item = (Engine, &[SlotKind])> {
        self.lanes
            .iter()
            .filter(|(_, slots)| !slots.is_empty())
            .map(|(e, slots)| (e, slots.as_slice()))
    }
}
