//! Execution engine classes and dense per-engine storage.

use std::fmt;
use std::ops::{Index, IndexMut};

/// An execution unit class of the target machine.
///
/// Each engine executes some number of slots per cycle, bounded by the
/// machine's [`slot_limits`](crate::MachineSpec::slot_limits). The set is
/// closed: every slot payload belongs to exactly one engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Engine {
    /// Scalar arithmetic/logic unit.
    Alu,
    /// Vector arithmetic/logic unit operating on `vlen`-wide ranges.
    Valu,
    /// Memory load unit (also materialises immediate constants).
    Load,
    /// Memory store unit.
    Store,
    /// Control flow and select unit. Barrier slots live here.
    Flow,
    /// Debug unit. Slots are ignored by the submission machine.
    Debug,
}

impl Engine {
    /// All engines, in dense index order.
    pub const ALL: [Engine; 6] = [
        Engine::Alu,
        Engine::Valu,
        Engine::Load,
        Engine::Store,
        Engine::Flow,
        Engine::Debug,
    ];

    /// Number of engine classes.
    pub const COUNT: usize = 6;

    /// Dense index of this engine in `[0, COUNT)`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Lower-case engine name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Engine::Alu => "alu",
            Engine::Valu => "valu",
            Engine::Load => "load",
            Engine::Store => "store",
            Engine::Flow => "flow",
            Engine::Debug => "debug",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dense map from [`Engine`] to `T`.
///
/// Engines are a small closed set, so per-engine state (slot limits,
/// priority biases, bundle lanes) is stored as a fixed array indexed by
/// [`Engine::index`] rather than a hash map. Indexing is infallible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineMap<T>([T; Engine::COUNT]);

impl<T> EngineMap<T> {
    /// Build a map by evaluating `f` for every engine in index order.
    pub fn from_fn(mut f: impl FnMut(Engine) -> T) -> Self {
        Self(Engine::ALL.map(&mut f))
    }

    /// Iterate `(engine, value)` pairs in dense index order.
    pub fn iter(&self) -> impl Iterator<Item = (Engine, &T)> {
        Engine::ALL.iter().copied().zip(self.0.iter())
    }
}

impl<T: Default> Default for EngineMap<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<Engine> for EngineMap<T> {
    type Output = T;

    fn index(&self, engine: Engine) -> &T {
        &self.0[engine.index()]
    }
}

impl<T> IndexMut<Engine> for EngineMap<T> {
    fn index_mut(&mut self, engine: Engine) -> &mut T {
        &mut self.0[engine.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_dense_and_stable() {
        for (i, engine) in Engine::ALL.iter().enumerate() {
            assert_eq!(engine.index(), i);
        }
    }

    #[test]
    fn map_from_fn_round_trips() {
        let map = EngineMap::from_fn(|e| e.name().len());
        assert_eq!(map[Engine::Alu], 3);
        assert_eq!(map[Engine::Store], 5);
        assert_eq!(map.iter().count(), Engine::COUNT);
    }
}
