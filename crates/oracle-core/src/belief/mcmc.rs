//! Swap-chain sampling for states where rejection acceptance collapses.
//!
//! Starting from one feasible configuration, the chain repeatedly proposes
//! exchanging a random tile between two random seats and accepts whenever
//! both destinations are candidate-legal. The proposal is symmetric and,
//! with three seats, irreducible over the feasible space, so the stationary
//! distribution is uniform and long-run tile frequencies are the marginals.

use super::constraints::{ConstraintStore, Inconsistency};
use super::sampler::{constrained_assignment, worker_rng, SampleReport};
use super::table::{ConfigCounts, MarginalTable};
use crate::error::EngineError;
use crate::model::tileset::TileSet;
use rand::rngs::SmallRng;
use rand::Rng;
use rayon::prelude::*;
use std::time::Instant;

/// Constrained-generation retries allowed while seeding a chain.
const INIT_RETRIES: usize = 4_096;

/// Deadline polling stride, in recorded samples.
const DEADLINE_STRIDE: usize = 64;

/// Estimates marginals with independent swap chains, one per worker.
///
/// Each chain discards `burn_in` proposals, then records one sample per
/// sweep of |U| proposals until its share of `target` is collected or the
/// deadline expires. Partial results are returned as long as any chain
/// recorded anything.
pub fn swap_chain_marginals(
    store: &ConstraintStore,
    target: usize,
    burn_in: usize,
    seed: u64,
    workers: usize,
    deadline: Option<Instant>,
) -> Result<(MarginalTable, SampleReport), EngineError> {
    let unknown = store.unknown();
    let candidates = store.candidate_array();
    let remaining = store.remaining_array();
    let workers = if workers == 0 {
        rayon::current_num_threads().max(1)
    } else {
        workers
    };
    let share = target.div_ceil(workers);
    let sweep = unknown.len().max(1);

    let (counts, mut report) = (0..workers as u64)
        .into_par_iter()
        .map(|worker| {
            let mut rng = worker_rng(seed, worker.wrapping_add(0x5a11));
            let mut counts = ConfigCounts::new();
            let mut report = SampleReport::default();
            let Some(mut hands) = seed_chain(&candidates, &remaining, unknown, &mut rng) else {
                return (counts, report);
            };
            for _ in 0..burn_in {
                propose_swap(&mut hands, &candidates, &mut rng);
                report.attempts += 1;
            }
            while report.accepted < share {
                if report.accepted % DEADLINE_STRIDE == 0 && deadline_expired(deadline) {
                    break;
                }
                for _ in 0..sweep {
                    propose_swap(&mut hands, &candidates, &mut rng);
                    report.attempts += 1;
                }
                counts.record(&hands);
                report.accepted += 1;
            }
            (counts, report)
        })
        .reduce(
            || (ConfigCounts::new(), SampleReport::default()),
            |left, right| (left.0.merge(right.0), left.1.merge(right.1)),
        );

    if report.accepted == 0 {
        return Err(if deadline_expired(deadline) {
            EngineError::Timeout
        } else {
            EngineError::Inconsistent(Inconsistency::EmptyConfigurationSpace)
        });
    }
    report.effective_samples = report.accepted as f64;
    let table = MarginalTable::from_counts(unknown, &counts).map_err(EngineError::Inconsistent)?;
    Ok((table, report))
}

/// Finds one feasible configuration to start a chain from.
fn seed_chain(
    candidates: &[TileSet; 3],
    remaining: &[u8; 3],
    unknown: TileSet,
    rng: &mut SmallRng,
) -> Option<[TileSet; 3]> {
    for _ in 0..INIT_RETRIES {
        if let Some((hands, _)) = constrained_assignment(candidates, remaining, unknown, rng) {
            return Some(hands);
        }
    }
    None
}

/// One symmetric proposal: exchange a random tile between two seats.
fn propose_swap(hands: &mut [TileSet; 3], candidates: &[TileSet; 3], rng: &mut SmallRng) {
    let first = rng.gen_range(0..3);
    let second = (first + 1 + rng.gen_range(0..2)) % 3;
    let Some(ours) = hands[first].choose(rng) else {
        return;
    };
    let Some(theirs) = hands[second].choose(rng) else {
        return;
    };
    if candidates[second].contains(ours) && candidates[first].contains(theirs) {
        hands[first].remove(ours);
        hands[first].insert(theirs);
        hands[second].remove(theirs);
        hands[second].insert(ours);
    }
}

fn deadline_expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|limit| Instant::now() >= limit)
}
