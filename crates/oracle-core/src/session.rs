//! The session façade tying the ledger, the constraint store and the
//! marginal dispatcher together.
//!
//! `apply` is the single mutator and is strictly serialized; marginal
//! queries are pure functions of the current state, memoized per state
//! hash. A detected inconsistency poisons the session permanently.

use crate::belief::{self, ConstraintStore, Inconsistency, MarginalCache, Marginals};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::game::state::GameState;
use crate::model::observation::Observation;
use crate::model::seat::Seat;
use crate::model::tileset::TileSet;
use std::time::{Duration, Instant};
use tracing::debug;

/// One observed round of play from a fixed observer seat.
#[derive(Debug)]
pub struct Session {
    game: GameState,
    store: ConstraintStore,
    config: EngineConfig,
    cache: MarginalCache,
    poisoned: Option<Inconsistency>,
}

impl Session {
    /// Opens a session from the observer's seven dealt tiles.
    pub fn new(hand_s: TileSet, config: EngineConfig) -> Result<Self, EngineError> {
        let game = GameState::new(hand_s)?;
        let store = ConstraintStore::new(game.unknown());
        let config = config.normalized();
        Ok(Self {
            game,
            store,
            cache: MarginalCache::new(config.cache_capacity),
            config,
            poisoned: None,
        })
    }

    /// Applies one observation: ledger update, constraint update, then
    /// propagation to a fixed point.
    pub fn apply(&mut self, obs: Observation) -> Result<(), EngineError> {
        self.ensure_live()?;
        self.game.apply(obs)?;
        match obs {
            Observation::Play { player, tile, .. } => self.store.remove_played(player, tile),
            Observation::Pass { player, ends } => self.store.restrict_pass(player, ends),
        }
        if let Err(contradiction) = self.store.propagate() {
            debug!(%contradiction, "session poisoned");
            self.poisoned = Some(contradiction);
            return Err(EngineError::Inconsistent(contradiction));
        }
        self.cross_check();
        Ok(())
    }

    /// The posterior marginals for the current state.
    pub fn marginals(&mut self) -> Result<Marginals, EngineError> {
        self.marginals_inner(None)
    }

    /// Marginals under a time budget. Enumeration that cannot finish in
    /// time reports [`EngineError::Timeout`]; sampling degrades to the
    /// partial estimate instead.
    pub fn marginals_with_deadline(&mut self, budget: Duration) -> Result<Marginals, EngineError> {
        self.marginals_inner(Some(Instant::now() + budget))
    }

    fn marginals_inner(&mut self, deadline: Option<Instant>) -> Result<Marginals, EngineError> {
        self.ensure_live()?;
        let key = self.store.state_hash();
        if let Some(hit) = self.cache.get(key) {
            return Ok(hit.clone());
        }
        let result = belief::marginals(&self.store, &self.config, deadline)?;
        self.cache.insert(key, result.clone());
        Ok(result)
    }

    /// Immutable bundle of everything a caller may inspect between
    /// observations. All fields are value types, so the bundle doubles as
    /// the consistent snapshot parallel queries need.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            hand_s: self.game.hand(),
            unknown: self.game.unknown(),
            remaining: [
                self.game.remaining(Seat::West),
                self.game.remaining(Seat::North),
                self.game.remaining(Seat::East),
            ],
            candidates: [
                self.store.candidates(Seat::West),
                self.store.candidates(Seat::North),
                self.store.candidates(Seat::East),
            ],
            ends: self.game.ends(),
            history: self.game.history().to_vec(),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.game
    }

    pub fn constraints(&self) -> &ConstraintStore {
        &self.store
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    fn ensure_live(&self) -> Result<(), EngineError> {
        match self.poisoned {
            Some(contradiction) => Err(EngineError::Inconsistent(contradiction)),
            None => Ok(()),
        }
    }

    // Ledger and store are updated through independent paths; they must
    // agree on the shared quantities after every observation.
    fn cross_check(&self) {
        debug_assert_eq!(self.game.unknown(), self.store.unknown());
        for seat in Seat::OPPONENTS {
            debug_assert_eq!(self.game.remaining(seat), self.store.remaining(seat));
        }
    }
}

/// The read-only state bundle returned by [`Session::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub hand_s: TileSet,
    pub unknown: TileSet,
    /// Remaining counts for West, North and East, in that order.
    pub remaining: [u8; 3],
    /// Candidate sets for West, North and East, in that order.
    pub candidates: [TileSet; 3],
    pub ends: Option<(u8, u8)>,
    pub history: Vec<Observation>,
}

#[cfg(test)]
mod tests {
    use super::Session;
    use crate::config::EngineConfig;
    use crate::error::EngineError;
    use crate::game::state::ObservationError;
    use crate::model::observation::{Observation, Side};
    use crate::model::seat::Seat;
    use crate::model::tile::Tile;
    use crate::model::tileset::TileSet;

    fn observer_hand() -> TileSet {
        [
            Tile::new(0, 1),
            Tile::new(1, 3),
            Tile::new(2, 5),
            Tile::new(3, 3),
            Tile::new(4, 6),
            Tile::new(5, 5),
            Tile::new(6, 6),
        ]
        .into_iter()
        .collect()
    }

    fn session() -> Session {
        Session::new(observer_hand(), EngineConfig::with_seed(17)).expect("valid hand")
    }

    #[test]
    fn rejected_observation_leaves_the_session_usable() {
        let mut session = session();
        let err = session.apply(Observation::Pass {
            player: Seat::West,
            ends: (0, 1),
        });
        assert_eq!(
            err,
            Err(EngineError::InvalidObservation(
                ObservationError::PassBeforeFirstPlay
            ))
        );
        assert!(!session.is_poisoned());
        assert!(session.marginals().is_ok());
    }

    #[test]
    fn snapshot_reflects_the_applied_observations() {
        let mut session = session();
        session
            .apply(Observation::Play {
                player: Seat::South,
                tile: Tile::new(3, 3),
                side: Side::Start,
            })
            .unwrap();
        session
            .apply(Observation::Pass {
                player: Seat::West,
                ends: (3, 3),
            })
            .unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.ends, Some((3, 3)));
        assert_eq!(snapshot.unknown.len(), 21);
        assert_eq!(snapshot.remaining, [7, 7, 7]);
        assert_eq!(snapshot.candidates[0].len(), 16);
        assert_eq!(snapshot.history.len(), 2);
        assert!(!snapshot.hand_s.contains(Tile::new(3, 3)));
    }

    #[test]
    fn repeated_queries_hit_the_cache() {
        let mut session = session();
        let first = session.marginals().unwrap();
        let second = session.marginals().unwrap();
        assert_eq!(first.table, second.table);
        assert_eq!(first.backend, second.backend);
    }
}
