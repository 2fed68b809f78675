//! Kernel instance description, emitter options, and validation.

use std::error::Error;
use std::fmt;

use weft_scheduler::SchedulerConfig;

/// Description of one kernel instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelParams {
    /// Height of the (full) tree; the root is level 0.
    pub tree_height: u32,
    /// Node count, `2^(tree_height+1) - 1` for a full tree.
    pub n_nodes: u32,
    /// Number of independent lanes.
    pub batch_size: u32,
    /// Number of rounds.
    pub rounds: u32,
}

/// How depth-2 node values are materialised.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Depth2SelectMode {
    /// Arithmetic blends on the VALU only.
    #[default]
    AluBlend,
    /// A flow-engine vector select for the final blend.
    Vselect,
}

/// Whether depth 4 uses compare-select over sixteen preloaded nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Depth4Mode {
    /// Gather depth-4 nodes like any deep level.
    #[default]
    Off,
    /// Blend over the sixteen preloaded depth-4 nodes.
    Deterministic16,
}

/// How the child-index branch is computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdxBranchMode {
    /// Pure VALU arithmetic: `idx = idx*2 + (bit + 1)`.
    #[default]
    AluBranch,
    /// Flow-engine vector select between the two child indices.
    Vselect,
}

/// Emitter and scheduler options for one compile.
///
/// Everything is optional with tuned defaults; [`validate`](Self::validate)
/// rejects out-of-range settings before emission begins.
#[derive(Clone, Debug)]
pub struct KernelConfig {
    /// Keep debug compare ops and round-boundary barriers.
    pub emit_debug: bool,
    /// Lane-group interleave at gather depths.
    pub interleave_groups: usize,
    /// Lane-group interleave at depths 0–2.
    pub interleave_groups_early: usize,
    /// Depth-2 node materialisation form.
    pub depth2_select_mode: Depth2SelectMode,
    /// Materialise depth-3 nodes by compare-select instead of gathering.
    pub depth3_deterministic: bool,
    /// Depth-4 materialisation form.
    pub depth4_mode: Depth4Mode,
    /// Child-index branch form.
    pub idx_branch_mode: IdxBranchMode,
    /// Emit hash pre-op pairs as two independent slots instead of one
    /// fused dual-slot payload.
    pub split_hash_pairs: bool,
    /// List scheduler tuning.
    pub scheduler: SchedulerConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            emit_debug: false,
            interleave_groups: 12,
            interleave_groups_early: 16,
            depth2_select_mode: Depth2SelectMode::default(),
            depth3_deterministic: true,
            depth4_mode: Depth4Mode::default(),
            idx_branch_mode: IdxBranchMode::default(),
            split_hash_pairs: true,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl KernelConfig {
    /// Check this configuration against a kernel instance.
    ///
    /// All checks run before any operation is emitted; a failure aborts
    /// the compile with no partial output.
    pub fn validate(&self, params: &KernelParams) -> Result<(), ConfigError> {
        if self.interleave_groups == 0 {
            return Err(ConfigError::ZeroInterleave {
                which: "interleave_groups",
            });
        }
        if self.interleave_groups_early == 0 {
            return Err(ConfigError::ZeroInterleave {
                which: "interleave_groups_early",
            });
        }
        if self.scheduler.beam_width == 0 {
            return Err(ConfigError::ZeroBeamWidth);
        }
        if self.scheduler.crit_weight < 1 {
            return Err(ConfigError::NonPositiveWeight {
                which: "scheduler_crit_weight",
            });
        }
        if self.scheduler.succ_weight < 1 {
            return Err(ConfigError::NonPositiveWeight {
                which: "scheduler_succ_weight",
            });
        }
        if params.batch_size == 0 {
            return Err(ConfigError::EmptyBatch);
        }
        let expected = (1u64 << (params.tree_height + 1)) - 1;
        if u64::from(params.n_nodes) != expected {
            return Err(ConfigError::TreeNotFull {
                tree_height: params.tree_height,
                n_nodes: params.n_nodes,
            });
        }
        Ok(())
    }
}

/// Errors detected by [`KernelConfig::validate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// An interleave count is zero.
    ZeroInterleave {
        /// Name of the offending option.
        which: &'static str,
    },
    /// The scheduler beam width is zero.
    ZeroBeamWidth,
    /// A scheduler priority weight is not a positive integer.
    NonPositiveWeight {
        /// Name of the offending option.
        which: &'static str,
    },
    /// The batch has no lanes.
    EmptyBatch,
    /// The node count does not describe a full tree of the given height.
    TreeNotFull {
        /// Configured tree height.
        tree_height: u32,
        /// Configured node count.
        n_nodes: u32,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroInterleave { which } => write!(f, "{which} must be at least 1"),
            Self::ZeroBeamWidth => write!(f, "scheduler_beam_width must be at least 1"),
            Self::NonPositiveWeight { which } => {
                write!(f, "{which} must be a positive integer")
            }
            Self::EmptyBatch => write!(f, "batch_size must be at least 1"),
            Self::TreeNotFull {
                tree_height,
                n_nodes,
            } => write!(
                f,
                "n_nodes {n_nodes} is not a full tree of height {tree_height}"
            ),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> KernelParams {
        KernelParams {
            tree_height: 4,
            n_nodes: 31,
            batch_size: 64,
            rounds: 8,
        }
    }

    #[test]
    fn default_config_validates() {
        assert_eq!(KernelConfig::default().validate(&params()), Ok(()));
    }

    #[test]
    fn zero_interleave_is_rejected() {
        let config = KernelConfig {
            interleave_groups: 0,
            ..KernelConfig::default()
        };
        assert_eq!(
            config.validate(&params()),
            Err(ConfigError::ZeroInterleave {
                which: "interleave_groups"
            })
        );
    }

    #[test]
    fn zero_beam_width_is_rejected() {
        let mut config = KernelConfig::default();
        config.scheduler.beam_width = 0;
        assert_eq!(config.validate(&params()), Err(ConfigError::ZeroBeamWidth));
    }

    #[test]
    fn partial_tree_is_rejected() {
        let bad = KernelParams {
            n_nodes: 30,
            ..params()
        };
        assert!(matches!(
            KernelConfig::default().validate(&bad),
            Err(ConfigError::TreeNotFull { .. })
        ));
    }

    #[test]
    fn empty_batch_is_rejected() {
        let bad = KernelParams {
            batch_size: 0,
            ..params()
        };
        assert_eq!(
            KernelConfig::default().validate(&bad),
            Err(ConfigError::EmptyBatch)
        );
    }
}
