//! Engine tuning parameters supplied at session creation.

/// Knobs for the marginal dispatcher and the sampling backends.
///
/// Out-of-range values are clamped into their working ranges when a
/// session adopts the config, so a default-derived struct can be tweaked
/// freely without a validation ceremony.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Exact enumeration runs while the workload bound stays at or below
    /// this many visited configurations.
    pub exact_workload_cap: u64,
    /// Pilot attempts used to probe the rejection acceptance rate.
    pub pilot_samples: usize,
    /// Minimum pilot acceptance rate for the rejection backend; below it
    /// the swap chain takes over.
    pub acceptance_floor: f64,
    /// Accepted samples either Monte Carlo backend aims for.
    pub target_samples: usize,
    /// Proposals a swap chain discards before recording.
    pub burn_in: usize,
    /// Master seed; every worker generator derives from it.
    pub seed: u64,
    /// Sampling worker threads; 0 lets the thread pool decide.
    pub workers: usize,
    /// Marginal bundles memoized per session.
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exact_workload_cap: 1_000_000,
            pilot_samples: 1_000,
            acceptance_floor: 0.01,
            target_samples: 10_000,
            burn_in: 1_000,
            seed: 0,
            workers: 0,
            cache_capacity: 8,
        }
    }
}

impl EngineConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub(crate) fn normalized(self) -> Self {
        Self {
            exact_workload_cap: self.exact_workload_cap.max(1),
            pilot_samples: self.pilot_samples.clamp(1, 1_000_000),
            acceptance_floor: if self.acceptance_floor.is_finite() {
                self.acceptance_floor.clamp(1e-6, 1.0)
            } else {
                0.01
            },
            target_samples: self.target_samples.clamp(1, 100_000_000),
            burn_in: self.burn_in.min(100_000_000),
            seed: self.seed,
            workers: self.workers.min(1_024),
            cache_capacity: self.cache_capacity.min(1_024),
        }
    }
}
