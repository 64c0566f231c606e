//! Marginal probability tables over (seat, tile) pairs.

use super::constraints::{ConstraintStore, Inconsistency};
use crate::model::seat::Seat;
use crate::model::tile::{Tile, TILE_COUNT};
use crate::model::tileset::TileSet;

/// Tolerance for the probability invariants checked after every query.
pub const PROBABILITY_EPSILON: f64 = 1e-6;

/// Raw per-(seat, tile) configuration counts shared by the exact and
/// rejection backends. Merging is summation, so worker results combine.
#[derive(Debug, Clone)]
pub(crate) struct ConfigCounts {
    cells: [[u64; TILE_COUNT]; 3],
    total: u64,
}

impl ConfigCounts {
    pub fn new() -> Self {
        Self {
            cells: [[0; TILE_COUNT]; 3],
            total: 0,
        }
    }

    pub fn record(&mut self, hands: &[TileSet; 3]) {
        self.total += 1;
        for (seat, hand) in hands.iter().enumerate() {
            for tile in hand.iter() {
                self.cells[seat][tile.to_id() as usize] += 1;
            }
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.total += other.total;
        for (mine, theirs) in self.cells.iter_mut().zip(other.cells.iter()) {
            for (cell, value) in mine.iter_mut().zip(theirs.iter()) {
                *cell += value;
            }
        }
        self
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Importance-weighted counts for the constrained generator, where each
/// sample carries the binomial product of its drawing path.
#[derive(Debug, Clone)]
pub(crate) struct WeightedCounts {
    cells: [[f64; TILE_COUNT]; 3],
    total: f64,
    total_sq: f64,
    samples: usize,
}

impl WeightedCounts {
    pub fn new() -> Self {
        Self {
            cells: [[0.0; TILE_COUNT]; 3],
            total: 0.0,
            total_sq: 0.0,
            samples: 0,
        }
    }

    pub fn record(&mut self, hands: &[TileSet; 3], weight: f64) {
        self.total += weight;
        self.total_sq += weight * weight;
        self.samples += 1;
        for (seat, hand) in hands.iter().enumerate() {
            for tile in hand.iter() {
                self.cells[seat][tile.to_id() as usize] += weight;
            }
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.total += other.total;
        self.total_sq += other.total_sq;
        self.samples += other.samples;
        for (mine, theirs) in self.cells.iter_mut().zip(other.cells.iter()) {
            for (cell, value) in mine.iter_mut().zip(theirs.iter()) {
                *cell += value;
            }
        }
        self
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Kish effective sample size (Σw)²/Σw².
    pub fn effective_samples(&self) -> f64 {
        if self.total_sq == 0.0 {
            0.0
        } else {
            self.total * self.total / self.total_sq
        }
    }
}

/// Posterior marginals P(seat holds tile) for every unknown tile.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginalTable {
    tiles: Vec<Tile>,
    rows: Vec<[f64; 3]>,
}

impl MarginalTable {
    /// The endgame table: nothing unknown, nothing to report.
    pub(crate) fn empty() -> Self {
        Self {
            tiles: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Closed form for an unconstrained state: P(p,t) = r(p)/|U| exactly.
    pub(crate) fn uniform(unknown: TileSet, remaining: &[u8; 3]) -> Self {
        let total = unknown.len() as f64;
        let row = [
            remaining[0] as f64 / total,
            remaining[1] as f64 / total,
            remaining[2] as f64 / total,
        ];
        Self {
            tiles: unknown.to_vec(),
            rows: vec![row; unknown.len()],
        }
    }

    pub(crate) fn from_counts(
        unknown: TileSet,
        counts: &ConfigCounts,
    ) -> Result<Self, Inconsistency> {
        if counts.total == 0 {
            return Err(Inconsistency::EmptyConfigurationSpace);
        }
        let total = counts.total as f64;
        let tiles = unknown.to_vec();
        let rows = tiles
            .iter()
            .map(|tile| {
                let id = tile.to_id() as usize;
                [
                    counts.cells[0][id] as f64 / total,
                    counts.cells[1][id] as f64 / total,
                    counts.cells[2][id] as f64 / total,
                ]
            })
            .collect();
        Ok(Self { tiles, rows })
    }

    pub(crate) fn from_weighted(
        unknown: TileSet,
        counts: &WeightedCounts,
    ) -> Result<Self, Inconsistency> {
        if counts.samples == 0 || counts.total <= 0.0 {
            return Err(Inconsistency::EmptyConfigurationSpace);
        }
        let tiles = unknown.to_vec();
        let rows = tiles
            .iter()
            .map(|tile| {
                let id = tile.to_id() as usize;
                [
                    counts.cells[0][id] / counts.total,
                    counts.cells[1][id] / counts.total,
                    counts.cells[2][id] / counts.total,
                ]
            })
            .collect();
        Ok(Self { tiles, rows })
    }

    /// P(seat holds tile), or None if the tile is no longer unknown or the
    /// seat is the observer.
    pub fn probability(&self, seat: Seat, tile: Tile) -> Option<f64> {
        let column = seat.opponent_index()?;
        let row = self.tiles.iter().position(|&t| t == tile)?;
        Some(self.rows[row][column])
    }

    /// The unknown tiles the table covers, in dense-ID order.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// All (seat, tile, probability) triples covering P × U.
    pub fn iter(&self) -> impl Iterator<Item = (Seat, Tile, f64)> + '_ {
        self.tiles.iter().zip(self.rows.iter()).flat_map(|(tile, row)| {
            Seat::OPPONENTS
                .iter()
                .zip(row.iter())
                .map(move |(seat, prob)| (*seat, *tile, *prob))
        })
    }

    /// Checks the probability translations of the store invariants.
    ///
    /// Every violation message names the failing pair, so a dispatcher can
    /// surface it as an internal error without losing the diagnosis.
    pub fn verify(&self, store: &ConstraintStore) -> Result<(), String> {
        let unknown = store.unknown();
        let covered: TileSet = self.tiles.iter().copied().collect();
        if covered != unknown || self.tiles.len() != unknown.len() {
            return Err(format!(
                "table covers {covered} but the unknown set is {unknown}"
            ));
        }

        let mut seat_sums = [0.0f64; 3];
        for (tile, row) in self.tiles.iter().zip(self.rows.iter()) {
            let mut column_sum = 0.0;
            let mut holders = 0;
            for (index, seat) in Seat::OPPONENTS.into_iter().enumerate() {
                let prob = row[index];
                if !(-PROBABILITY_EPSILON..=1.0 + PROBABILITY_EPSILON).contains(&prob) {
                    return Err(format!("P({seat}, {tile}) = {prob} is out of range"));
                }
                let candidate = store.candidates(seat).contains(*tile);
                if candidate {
                    holders += 1;
                } else if prob > PROBABILITY_EPSILON {
                    return Err(format!(
                        "P({seat}, {tile}) = {prob} but the tile is not a candidate"
                    ));
                }
                column_sum += prob;
                seat_sums[index] += prob;
            }
            if (column_sum - 1.0).abs() > PROBABILITY_EPSILON {
                return Err(format!("probabilities for {tile} sum to {column_sum}"));
            }
            if holders == 1 {
                let sole = row
                    .iter()
                    .zip(Seat::OPPONENTS)
                    .find(|(_, seat)| store.candidates(*seat).contains(*tile));
                if let Some((prob, seat)) = sole {
                    if (prob - 1.0).abs() > PROBABILITY_EPSILON {
                        return Err(format!(
                            "{tile} has {seat} as its only candidate but P = {prob}"
                        ));
                    }
                }
            }
        }
        for (index, seat) in Seat::OPPONENTS.into_iter().enumerate() {
            let expected = store.remaining(seat) as f64;
            if (seat_sums[index] - expected).abs() > PROBABILITY_EPSILON {
                return Err(format!(
                    "probabilities for {seat} sum to {} instead of {expected}",
                    seat_sums[index]
                ));
            }
        }
        Ok(())
    }
}
