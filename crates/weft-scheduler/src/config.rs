//! Scheduler tuning knobs.

use weft_core::EngineMap;

/// Tunable parameters of the list scheduler.
///
/// The defaults are the reference operating point; sweeps adjust the
/// weights, seeds, and beam width per workload. All fields only influence
/// which legal schedule is chosen, never legality itself.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Weight of a node's critical-path length in its priority.
    pub crit_weight: i64,
    /// Weight of a node's successor count in its priority.
    pub succ_weight: i64,
    /// Additive per-engine priority offset.
    pub engine_bias: EngineMap<i64>,
    /// Seed for random priority perturbation; `None` disables perturbation.
    pub random_seed: Option<u64>,
    /// Additional restart seeds for multi-start scheduling.
    pub multi_start_seeds: Vec<u64>,
    /// Number of ready candidates examined per placement decision.
    pub beam_width: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            crit_weight: 1024,
            succ_weight: 512,
            engine_bias: EngineMap::default(),
            random_seed: None,
            multi_start_seeds: Vec::new(),
            beam_width: 1,
        }
    }
}

impl SchedulerConfig {
    /// The seeds the multi-start driver will run, in rank order.
    ///
    /// `None` entries mean an unperturbed run; an empty configuration
    /// yields a single unperturbed run.
    pub fn seed_plan(&self) -> Vec<Option<u64>> {
        if self.random_seed.is_none() && self.multi_start_seeds.is_empty() {
            return vec![None];
        }
        self.random_seed
            .map(Some)
            .into_iter()
            .chain(self.multi_start_seeds.iter().map(|&s| Some(s)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_seed_plan_is_one_unperturbed_run() {
        assert_eq!(SchedulerConfig::default().seed_plan(), vec![None]);
    }

    #[test]
    fn seed_plan_orders_primary_seed_first() {
        let config = SchedulerConfig {
            random_seed: Some(7),
            multi_start_seeds: vec![1, 2],
            ..SchedulerConfig::default()
        };
        assert_eq!(config.seed_plan(), vec![Some(7), Some(1), Some(2)]);
    }

    #[test]
    fn multi_start_without_primary_runs_only_the_list() {
        let config = SchedulerConfig {
            multi_start_seeds: vec![3],
            ..SchedulerConfig::default()
        };
        assert_eq!(config.seed_plan(), vec![Some(3)]);
    }
}
