//! The typed observation stream consumed by the engine.
//!
//! Observations are the only mutating input a session accepts. The serde
//! shapes below are the interop contract: a play is
//! `{"kind":"play","player":"N","tile":[3,6],"side":"left"}` and a pass is
//! `{"kind":"pass","player":"W","ends":[3,3]}`.

use crate::model::seat::Seat;
use crate::model::tile::Tile;
use serde::{Deserialize, Serialize};

/// Which end slot of the chain a tile is placed on.
///
/// `Start` is only valid for the very first play, which opens both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Start,
}

/// A single event observed at the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Observation {
    /// `player` placed `tile` on the given end of the chain.
    Play { player: Seat, tile: Tile, side: Side },
    /// `player` could not play; `ends` are the open ends they faced.
    Pass { player: Seat, ends: (u8, u8) },
}

impl Observation {
    pub const fn player(self) -> Seat {
        match self {
            Observation::Play { player, .. } | Observation::Pass { player, .. } => player,
        }
    }

    pub const fn is_pass(self) -> bool {
        matches!(self, Observation::Pass { .. })
    }
}
