//! Posterior belief over opponent tile ownership.
//!
//! This module is composed of:
//! - `constraints`: per-seat candidate sets and the fixed-point propagator.
//! - `exact`: exhaustive enumeration of the feasible configuration space.
//! - `sampler`: rejection and constrained Monte Carlo estimators.
//! - `mcmc`: swap-chain sampler for states with collapsed acceptance.
//! - `table`: marginal tables and their probability invariants.
//! - `dispatch`: backend selection gluing the pieces together.
//! - `cache`: memoized marginal bundles keyed by the store hash.

mod cache;
mod constraints;
mod dispatch;
mod exact;
mod mcmc;
mod sampler;
mod table;

pub use cache::MarginalCache;
pub use constraints::{ConstraintStore, Inconsistency};
pub use dispatch::{marginals, Backend, Marginals};
pub use exact::{enumerate_marginals, workload_bound, ExactMarginals};
pub use mcmc::swap_chain_marginals;
pub use sampler::{
    constrained_marginals, pilot_acceptance, rejection_marginals, SampleReport,
};
pub use table::{MarginalTable, PROBABILITY_EPSILON};
