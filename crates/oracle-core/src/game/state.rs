//! The observer-side game ledger.
//!
//! Tracks the unknown tile set, per-seat remaining counts, the open ends of
//! the chain and the observation history. Validation is check-then-commit:
//! a rejected observation leaves the state untouched.

use crate::model::observation::{Observation, Side};
use crate::model::seat::Seat;
use crate::model::tile::Tile;
use crate::model::tileset::TileSet;
use thiserror::Error;

/// Tiles dealt to every seat at the start of a round.
pub const HAND_SIZE: usize = 7;

/// Precondition violations raised by [`GameState::apply`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ObservationError {
    #[error("a starting hand must contain exactly 7 tiles, got {got}")]
    WrongHandSize { got: usize },
    #[error("tile {tile} is not in the observer's hand")]
    NotInHand { tile: Tile },
    #[error("tile {tile} is not among the unknown tiles")]
    NotUnknown { tile: Tile },
    #[error("{seat} has no tiles left to play")]
    HandExhausted { seat: Seat },
    #[error("tile {tile} does not match the open end {end}")]
    EndMismatch { tile: Tile, end: u8 },
    #[error("side {side:?} does not apply to the current chain")]
    SideMismatch { side: Side },
    #[error("declared ends {declared:?} do not match the board ends {actual:?}")]
    EndsMismatch { declared: (u8, u8), actual: (u8, u8) },
    #[error("cannot pass before the first tile is placed")]
    PassBeforeFirstPlay,
    #[error("a pass by the observer never appears in the stream")]
    ObserverPass,
}

/// Mutable ledger of everything the observer has seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    hand_s: TileSet,
    unknown: TileSet,
    remaining: [u8; 3],
    remaining_s: u8,
    ends: Option<(u8, u8)>,
    history: Vec<Observation>,
}

impl GameState {
    /// Starts a round from the observer's dealt hand.
    pub fn new(hand_s: TileSet) -> Result<Self, ObservationError> {
        if hand_s.len() != HAND_SIZE {
            return Err(ObservationError::WrongHandSize { got: hand_s.len() });
        }
        Ok(Self {
            hand_s,
            unknown: hand_s.complement(),
            remaining: [HAND_SIZE as u8; 3],
            remaining_s: HAND_SIZE as u8,
            ends: None,
            history: Vec::new(),
        })
    }

    /// Applies one observation, or rejects it leaving the state unchanged.
    pub fn apply(&mut self, obs: Observation) -> Result<(), ObservationError> {
        match obs {
            Observation::Play { player, tile, side } => self.apply_play(player, tile, side)?,
            Observation::Pass { player, ends } => self.check_pass(player, ends)?,
        }
        self.history.push(obs);
        Ok(())
    }

    fn apply_play(&mut self, player: Seat, tile: Tile, side: Side) -> Result<(), ObservationError> {
        let new_ends = chain_after_play(self.ends, tile, side)?;
        match player.opponent_index() {
            None => {
                if !self.hand_s.contains(tile) {
                    return Err(ObservationError::NotInHand { tile });
                }
                self.hand_s.remove(tile);
                self.remaining_s -= 1;
            }
            Some(index) => {
                if !self.unknown.contains(tile) {
                    return Err(ObservationError::NotUnknown { tile });
                }
                if self.remaining[index] == 0 {
                    return Err(ObservationError::HandExhausted { seat: player });
                }
                self.unknown.remove(tile);
                self.remaining[index] -= 1;
            }
        }
        self.ends = Some(new_ends);
        Ok(())
    }

    fn check_pass(&self, player: Seat, declared: (u8, u8)) -> Result<(), ObservationError> {
        if player.is_observer() {
            return Err(ObservationError::ObserverPass);
        }
        let actual = self.ends.ok_or(ObservationError::PassBeforeFirstPlay)?;
        if !ends_equal(declared, actual) {
            return Err(ObservationError::EndsMismatch { declared, actual });
        }
        Ok(())
    }

    pub fn hand(&self) -> TileSet {
        self.hand_s
    }

    pub fn unknown(&self) -> TileSet {
        self.unknown
    }

    pub fn remaining(&self, seat: Seat) -> u8 {
        match seat.opponent_index() {
            None => self.remaining_s,
            Some(index) => self.remaining[index],
        }
    }

    pub fn ends(&self) -> Option<(u8, u8)> {
        self.ends
    }

    pub fn history(&self) -> &[Observation] {
        &self.history
    }

    /// The (seat, tile) pairs placed so far, in play order.
    pub fn played(&self) -> impl Iterator<Item = (Seat, Tile)> + '_ {
        self.history.iter().filter_map(|obs| match obs {
            Observation::Play { player, tile, .. } => Some((*player, *tile)),
            Observation::Pass { .. } => None,
        })
    }

    /// Whether the board is locked: the last four observations were passes.
    pub fn is_locked(&self) -> bool {
        self.history.len() >= 4 && self.history[self.history.len() - 4..].iter().all(|o| o.is_pass())
    }
}

fn ends_equal(declared: (u8, u8), actual: (u8, u8)) -> bool {
    declared == actual || (declared.1, declared.0) == actual
}

fn chain_after_play(
    ends: Option<(u8, u8)>,
    tile: Tile,
    side: Side,
) -> Result<(u8, u8), ObservationError> {
    match (ends, side) {
        (None, Side::Start) => Ok(tile.values()),
        (None, side) => Err(ObservationError::SideMismatch { side }),
        (Some(_), Side::Start) => Err(ObservationError::SideMismatch { side: Side::Start }),
        (Some((left, right)), Side::Left) => {
            if !tile.has_value(left) {
                return Err(ObservationError::EndMismatch { tile, end: left });
            }
            Ok((tile.other_value(left), right))
        }
        (Some((left, right)), Side::Right) => {
            if !tile.has_value(right) {
                return Err(ObservationError::EndMismatch { tile, end: right });
            }
            Ok((left, tile.other_value(right)))
        }
    }
}
