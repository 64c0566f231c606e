//! Exhaustive enumeration of the feasible configuration space.
//!
//! Visits every partition of the unknown tiles into candidate-legal hands,
//! counting per-(seat, tile) occurrences. Exact but only affordable while
//! the workload bound stays small; the dispatcher guards the entry.

use super::constraints::ConstraintStore;
use super::table::{ConfigCounts, MarginalTable};
use crate::error::EngineError;
use crate::model::tile::Tile;
use crate::model::tileset::TileSet;
use std::time::Instant;

/// Completed enumeration: the table plus the size of the feasible space.
#[derive(Debug, Clone)]
pub struct ExactMarginals {
    pub table: MarginalTable,
    pub configurations: u64,
}

/// Enumerates the full space, assigning seats in workload order.
///
/// Partial counts are inadmissible, so a deadline expiry discards
/// everything and reports [`EngineError::Timeout`].
pub fn enumerate_marginals(
    store: &ConstraintStore,
    deadline: Option<Instant>,
) -> Result<ExactMarginals, EngineError> {
    enumerate_with_order(store, enumeration_order(store), deadline)
}

pub(crate) fn enumerate_with_order(
    store: &ConstraintStore,
    order: [usize; 3],
    deadline: Option<Instant>,
) -> Result<ExactMarginals, EngineError> {
    let unknown = store.unknown();
    let candidates = store.candidate_array();
    let remaining = store.remaining_array();
    let [p1, p2, p3] = order;

    let mut counts = ConfigCounts::new();
    let mut ticks = 0u32;
    let pool1 = candidates[p1].to_vec();
    let mut hand1 = TileSet::EMPTY;

    each_subset(&pool1, remaining[p1] as usize, 0, &mut hand1, &mut |first| {
        tick(deadline, &mut ticks)?;
        let rest = unknown - first;
        // Both remaining seats must still be able to fill their slots.
        if (candidates[p2] & rest).len() < remaining[p2] as usize {
            return Ok(());
        }
        if (candidates[p3] & rest).len() < remaining[p3] as usize {
            return Ok(());
        }
        let pool2 = (candidates[p2] & rest).to_vec();
        let mut hand2 = TileSet::EMPTY;
        each_subset(&pool2, remaining[p2] as usize, 0, &mut hand2, &mut |second| {
            tick(deadline, &mut ticks)?;
            let third = rest - second;
            if third.is_subset_of(candidates[p3]) {
                let mut hands = [TileSet::EMPTY; 3];
                hands[p1] = first;
                hands[p2] = second;
                hands[p3] = third;
                counts.record(&hands);
            }
            Ok(())
        })
    })?;

    let table = MarginalTable::from_counts(unknown, &counts).map_err(EngineError::Inconsistent)?;
    Ok(ExactMarginals {
        table,
        configurations: counts.total(),
    })
}

/// Seats ordered by smallest candidate set, tie-broken by smallest count.
pub(crate) fn enumeration_order(store: &ConstraintStore) -> [usize; 3] {
    let candidates = store.candidate_array();
    let remaining = store.remaining_array();
    let mut order = [0usize, 1, 2];
    order.sort_by_key(|&p| (candidates[p].len(), remaining[p]));
    order
}

/// Upper bound on the configurations the enumerator would visit.
///
/// The product saturates instead of overflowing, which simply routes the
/// dispatcher to the sampler.
pub fn workload_bound(store: &ConstraintStore) -> u64 {
    let candidates = store.candidate_array();
    let remaining = store.remaining_array();
    let order = enumeration_order(store);
    let first = binomial(candidates[order[0]].len(), remaining[order[0]] as usize);
    let second = binomial(candidates[order[1]].len(), remaining[order[1]] as usize);
    first.saturating_mul(second)
}

/// C(n, k) with saturation; exact for every size the tile universe allows.
pub(crate) fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc = 1u64;
    for i in 0..k {
        acc = acc.saturating_mul((n - i) as u64) / (i as u64 + 1);
    }
    acc
}

fn each_subset<F>(
    pool: &[Tile],
    k: usize,
    start: usize,
    acc: &mut TileSet,
    visit: &mut F,
) -> Result<(), EngineError>
where
    F: FnMut(TileSet) -> Result<(), EngineError>,
{
    if k == 0 {
        return visit(*acc);
    }
    if pool.len() < start + k {
        return Ok(());
    }
    for index in start..=pool.len() - k {
        acc.insert(pool[index]);
        each_subset(pool, k - 1, index + 1, acc, visit)?;
        acc.remove(pool[index]);
    }
    Ok(())
}

fn tick(deadline: Option<Instant>, ticks: &mut u32) -> Result<(), EngineError> {
    if let Some(limit) = deadline {
        *ticks = ticks.wrapping_add(1);
        if *ticks % 1024 == 0 && Instant::now() >= limit {
            return Err(EngineError::Timeout);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{binomial, enumerate_marginals, enumerate_with_order, workload_bound};
    use crate::belief::constraints::ConstraintStore;
    use crate::error::EngineError;
    use crate::model::seat::Seat;
    use crate::model::tile::Tile;
    use crate::model::tileset::TileSet;
    use std::time::{Duration, Instant};

    fn mid_game_store() -> ConstraintStore {
        // 14 unknown tiles split 5/5/4 with interlocking candidate sets.
        let unknown = TileSet::from_bits((1 << 14) - 1);
        let tiles = |ids: &[u8]| ids.iter().map(|&id| Tile::from_id(id).unwrap()).collect();
        let west: TileSet = tiles(&[0, 1, 2, 3, 4, 5, 6, 7, 8]);
        let north: TileSet = tiles(&[3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13]);
        let east: TileSet = tiles(&[0, 1, 2, 7, 8, 9, 10, 11, 12, 13]);
        ConstraintStore::from_parts(unknown, [west, north, east], [5, 5, 4]).unwrap()
    }

    #[test]
    fn binomial_known_values() {
        assert_eq!(binomial(7, 7), 1);
        assert_eq!(binomial(9, 5), 126);
        assert_eq!(binomial(11, 5), 462);
        assert_eq!(binomial(21, 7), 116_280);
        assert_eq!(binomial(5, 9), 0);
    }

    #[test]
    fn workload_bound_multiplies_the_two_smallest_seats() {
        let store = mid_game_store();
        // West (9 candidates, 5 slots) then East (10 candidates, 4 slots).
        assert_eq!(workload_bound(&store), 126 * 210);
    }

    #[test]
    fn forced_partition_has_one_configuration() {
        let unknown = TileSet::from_bits((1 << 6) - 1);
        let tiles = |ids: &[u8]| ids.iter().map(|&id| Tile::from_id(id).unwrap()).collect();
        let west: TileSet = tiles(&[0, 1]);
        let north: TileSet = tiles(&[2, 3]);
        let east: TileSet = tiles(&[4, 5]);
        let store = ConstraintStore::from_parts(unknown, [west, north, east], [2, 2, 2]).unwrap();
        let exact = enumerate_marginals(&store, None).unwrap();
        assert_eq!(exact.configurations, 1);
        for tile in west.iter() {
            assert_eq!(exact.table.probability(Seat::West, tile), Some(1.0));
            assert_eq!(exact.table.probability(Seat::North, tile), Some(0.0));
        }
    }

    #[test]
    fn enumeration_order_does_not_change_the_marginals() {
        let store = mid_game_store();
        let orders = [
            [0usize, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        let reference = enumerate_with_order(&store, orders[0], None).unwrap();
        assert!(reference.configurations > 0);
        for order in &orders[1..] {
            let other = enumerate_with_order(&store, *order, None).unwrap();
            assert_eq!(other.configurations, reference.configurations);
            for (seat, tile, prob) in reference.table.iter() {
                let alt = other.table.probability(seat, tile).unwrap();
                assert!(
                    (alt - prob).abs() < 1e-12,
                    "P({seat}, {tile}) differs: {alt} vs {prob}"
                );
            }
        }
    }

    #[test]
    fn marginals_respect_candidate_exclusions() {
        let store = mid_game_store();
        let exact = enumerate_marginals(&store, None).unwrap();
        exact.table.verify(&store).expect("invariants hold");
        for (seat, tile, prob) in exact.table.iter() {
            if !store.candidates(seat).contains(tile) {
                assert_eq!(prob, 0.0);
            }
        }
    }

    #[test]
    fn expired_deadline_reports_timeout() {
        let store = mid_game_store();
        let past = Instant::now() - Duration::from_millis(1);
        match enumerate_marginals(&store, Some(past)) {
            Err(EngineError::Timeout) => {}
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
