//! The engine-level error taxonomy.

use crate::belief::Inconsistency;
use crate::game::state::ObservationError;
use thiserror::Error;

/// The four failure classes a session can surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The observation violates a precondition. Recoverable: the session
    /// is unchanged and a corrected observation may be retried.
    #[error("invalid observation: {0}")]
    InvalidObservation(#[from] ObservationError),
    /// Propagation or enumeration found a contradiction. The session is
    /// dead; only a fresh session (or an earlier snapshot) can continue.
    #[error("inconsistent constraints: {0}")]
    Inconsistent(#[from] Inconsistency),
    /// The deadline expired before the computation finished. Recoverable:
    /// retry with a larger budget or accept the sampler's precision.
    #[error("deadline expired before the computation finished")]
    Timeout,
    /// A computed table violated a probability invariant. The result is
    /// withheld but the session stays usable for further observations.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}
