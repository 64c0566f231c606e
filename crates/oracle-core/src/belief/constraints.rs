//! Candidate-set tracking and the deterministic constraint propagator.
//!
//! For every unknown seat the store keeps the set of tiles that seat could
//! still hold. Plays and passes shrink those sets directly; `propagate`
//! then iterates the derived rules (saturated hands, unique holders,
//! two-seat Hall pruning) to a fixed point and reports any contradiction.

use crate::model::seat::Seat;
use crate::model::tile::Tile;
use crate::model::tileset::TileSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use thiserror::Error;
use tracing::trace;

/// A contradiction found while shrinking the feasible space.
///
/// Under a well-formed observation stream none of these can occur; seeing
/// one means the stream was corrupt or fabricated.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Inconsistency {
    #[error("{seat} has {candidates} candidate tiles for {remaining} slots")]
    Capacity {
        seat: Seat,
        candidates: usize,
        remaining: u8,
    },
    #[error("tile {tile} has no possible holder")]
    UncoveredTile { tile: Tile },
    #[error("{first} and {second} share {union} candidates for {required} slots")]
    HallViolation {
        first: Seat,
        second: Seat,
        union: usize,
        required: u8,
    },
    #[error("{capacity} hand slots cannot cover {unknown} unknown tiles")]
    CapacityTotal { capacity: u8, unknown: usize },
    #[error("no configuration satisfies the accumulated constraints")]
    EmptyConfigurationSpace,
}

/// Candidate sets C(p) for the three unknown seats, plus the bookkeeping
/// the propagator needs: remaining counts, the unknown set and a ledger of
/// tiles whose holder is already forced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintStore {
    candidates: [TileSet; 3],
    determined: [TileSet; 3],
    remaining: [u8; 3],
    unknown: TileSet,
}

impl ConstraintStore {
    /// Fresh store at the start of a round: every unknown seat may hold any
    /// of the 21 unknown tiles.
    pub fn new(unknown: TileSet) -> Self {
        Self {
            candidates: [unknown; 3],
            determined: [TileSet::EMPTY; 3],
            remaining: [7; 3],
            unknown,
        }
    }

    /// Rebuilds a store from explicit parts and propagates it once.
    ///
    /// Candidate sets are clipped to the unknown set. Used to restore
    /// snapshots and to construct mid-game states in tests.
    pub fn from_parts(
        unknown: TileSet,
        candidates: [TileSet; 3],
        remaining: [u8; 3],
    ) -> Result<Self, Inconsistency> {
        let mut store = Self {
            candidates: [
                candidates[0] & unknown,
                candidates[1] & unknown,
                candidates[2] & unknown,
            ],
            determined: [TileSet::EMPTY; 3],
            remaining,
            unknown,
        };
        store.propagate()?;
        Ok(store)
    }

    /// A played tile leaves the unknown set and every candidate set.
    pub fn remove_played(&mut self, player: Seat, tile: Tile) {
        self.unknown.remove(tile);
        for set in &mut self.candidates {
            set.remove(tile);
        }
        for set in &mut self.determined {
            set.remove(tile);
        }
        if let Some(index) = player.opponent_index() {
            self.remaining[index] = self.remaining[index].saturating_sub(1);
        }
    }

    /// A passing seat holds no tile matching either open end.
    pub fn restrict_pass(&mut self, player: Seat, ends: (u8, u8)) {
        let Some(index) = player.opponent_index() else {
            return;
        };
        self.candidates[index] = self.candidates[index] - TileSet::block(ends.0, ends.1);
    }

    /// Iterates the derived rules to a fixed point.
    ///
    /// Every pass either strictly reduces the total candidate count or
    /// exits, so the loop terminates after at most |U|·3 reductions.
    pub fn propagate(&mut self) -> Result<(), Inconsistency> {
        let mut passes = 0u32;
        loop {
            let mut changed = false;
            passes += 1;

            // Saturated hands: a seat whose candidates exactly fill its
            // slots owns all of them; nobody else may hold one.
            for p in 0..3 {
                if self.candidates[p].len() == self.remaining[p] as usize {
                    let owned = self.candidates[p];
                    self.determined[p] = owned;
                    for q in 0..3 {
                        if q == p {
                            continue;
                        }
                        let reduced = self.candidates[q] - owned;
                        if reduced != self.candidates[q] {
                            self.candidates[q] = reduced;
                            changed = true;
                        }
                    }
                }
            }

            // Two-seat Hall pruning: when a pair's candidate union exactly
            // fills their combined slots, the third seat is excluded from
            // the union. The one-seat case is the saturation rule above;
            // the three-seat case is the global capacity check below.
            for p in 0..3 {
                for q in (p + 1)..3 {
                    let union = self.candidates[p] | self.candidates[q];
                    let required = (self.remaining[p] + self.remaining[q]) as usize;
                    if union.len() == required {
                        let third = 3 - p - q;
                        let reduced = self.candidates[third] - union;
                        if reduced != self.candidates[third] {
                            self.candidates[third] = reduced;
                            changed = true;
                        }
                    }
                }
            }

            // Unique holders: a tile with a single remaining candidate seat
            // is determined for that seat. No candidate set changes; the
            // ledger feeds the saturation rule and marginal shortcuts.
            for tile in self.unknown.iter() {
                let mut holder = None;
                let mut holders = 0;
                for p in 0..3 {
                    if self.candidates[p].contains(tile) {
                        holder = Some(p);
                        holders += 1;
                    }
                }
                if holders == 1 {
                    if let Some(p) = holder {
                        self.determined[p].insert(tile);
                    }
                }
            }

            self.check()?;
            if !changed {
                trace!(passes, unknown = self.unknown.len(), "propagation fixed point");
                return Ok(());
            }
        }
    }

    fn check(&self) -> Result<(), Inconsistency> {
        let mut capacity = 0u8;
        for p in 0..3 {
            let candidates = self.candidates[p].len();
            let remaining = self.remaining[p];
            capacity += remaining;
            if candidates < remaining as usize {
                return Err(Inconsistency::Capacity {
                    seat: seat_of(p),
                    candidates,
                    remaining,
                });
            }
        }
        if capacity as usize != self.unknown.len() {
            return Err(Inconsistency::CapacityTotal {
                capacity,
                unknown: self.unknown.len(),
            });
        }
        let covered = self.candidates[0] | self.candidates[1] | self.candidates[2];
        if let Some(tile) = (self.unknown - covered).iter().next() {
            return Err(Inconsistency::UncoveredTile { tile });
        }
        for p in 0..3 {
            for q in (p + 1)..3 {
                let union = (self.candidates[p] | self.candidates[q]).len();
                let required = self.remaining[p] + self.remaining[q];
                if union < required as usize {
                    return Err(Inconsistency::HallViolation {
                        first: seat_of(p),
                        second: seat_of(q),
                        union,
                        required,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn candidates(&self, seat: Seat) -> TileSet {
        seat.opponent_index()
            .map(|index| self.candidates[index])
            .unwrap_or(TileSet::EMPTY)
    }

    pub fn remaining(&self, seat: Seat) -> u8 {
        seat.opponent_index()
            .map(|index| self.remaining[index])
            .unwrap_or(0)
    }

    pub fn unknown(&self) -> TileSet {
        self.unknown
    }

    /// Tiles already forced to `seat` by propagation.
    pub fn determined(&self, seat: Seat) -> TileSet {
        seat.opponent_index()
            .map(|index| self.determined[index])
            .unwrap_or(TileSet::EMPTY)
    }

    /// The forced holder of `tile`, if propagation pinned one down.
    pub fn owner(&self, tile: Tile) -> Option<Seat> {
        (0..3)
            .find(|&p| self.determined[p].contains(tile))
            .and_then(Seat::from_opponent_index)
    }

    /// Whether no observation has narrowed any candidate set yet. In that
    /// case the posterior has the closed hypergeometric form r(p)/|U|.
    pub fn is_unconstrained(&self) -> bool {
        self.candidates.iter().all(|set| *set == self.unknown)
    }

    /// Hash of (U, r, C); keys the per-session marginal cache.
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.unknown.bits().hash(&mut hasher);
        self.remaining.hash(&mut hasher);
        for set in &self.candidates {
            set.bits().hash(&mut hasher);
        }
        hasher.finish()
    }

    pub(crate) fn candidate_array(&self) -> [TileSet; 3] {
        self.candidates
    }

    pub(crate) fn remaining_array(&self) -> [u8; 3] {
        self.remaining
    }
}

fn seat_of(index: usize) -> Seat {
    Seat::from_opponent_index(index).expect("opponent index in range")
}
