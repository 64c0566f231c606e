//! Backend selection and post-computation verification.
//!
//! Policy: states with no binding constraints get the closed-form answer;
//! small workloads are enumerated exactly; everything else is sampled, by
//! rejection while the pilot acceptance rate clears the floor and by the
//! swap chain once it collapses.

use super::constraints::ConstraintStore;
use super::exact::{self, ExactMarginals};
use super::mcmc;
use super::sampler::{self, SampleReport};
use super::table::MarginalTable;
use crate::config::EngineConfig;
use crate::error::EngineError;
use std::time::Instant;
use tracing::debug;

/// Which backend produced a marginal table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Closed hypergeometric form; no enumeration or sampling needed.
    ClosedForm,
    Exact,
    Rejection,
    SwapChain,
}

/// A marginal table with the provenance a caller may want to inspect.
#[derive(Debug, Clone)]
pub struct Marginals {
    pub table: MarginalTable,
    pub backend: Backend,
    /// Size of the feasible space when it was enumerated exactly.
    pub configurations: Option<u64>,
    /// Sampling statistics when a Monte Carlo backend ran.
    pub report: Option<SampleReport>,
}

/// Computes the posterior marginals for the current constraint state and
/// verifies the probability invariants before handing them out.
pub fn marginals(
    store: &ConstraintStore,
    config: &EngineConfig,
    deadline: Option<Instant>,
) -> Result<Marginals, EngineError> {
    let outcome = select_backend(store, config, deadline)?;
    outcome.table.verify(store).map_err(EngineError::Internal)?;
    Ok(outcome)
}

fn select_backend(
    store: &ConstraintStore,
    config: &EngineConfig,
    deadline: Option<Instant>,
) -> Result<Marginals, EngineError> {
    if store.unknown().is_empty() {
        return Ok(Marginals {
            table: MarginalTable::empty(),
            backend: Backend::ClosedForm,
            configurations: Some(1),
            report: None,
        });
    }

    if store.is_unconstrained() {
        debug!(unknown = store.unknown().len(), "no binding constraints, closed form");
        return Ok(Marginals {
            table: MarginalTable::uniform(store.unknown(), &store.remaining_array()),
            backend: Backend::ClosedForm,
            configurations: None,
            report: None,
        });
    }

    let bound = exact::workload_bound(store);
    if bound <= config.exact_workload_cap {
        debug!(workload = bound, "dispatching exact enumeration");
        let ExactMarginals {
            table,
            configurations,
        } = exact::enumerate_marginals(store, deadline)?;
        return Ok(Marginals {
            table,
            backend: Backend::Exact,
            configurations: Some(configurations),
            report: None,
        });
    }

    let acceptance = sampler::pilot_acceptance(store, config.pilot_samples, config.seed);
    debug!(
        workload = bound,
        acceptance, "workload too large for enumeration"
    );
    if acceptance >= config.acceptance_floor {
        let (table, report) = sampler::rejection_marginals(
            store,
            config.target_samples,
            config.seed,
            config.workers,
            deadline,
        )?;
        debug!(accepted = report.accepted, "rejection sampling finished");
        Ok(Marginals {
            table,
            backend: Backend::Rejection,
            configurations: None,
            report: Some(report),
        })
    } else {
        let (table, report) = mcmc::swap_chain_marginals(
            store,
            config.target_samples,
            config.burn_in,
            config.seed,
            config.workers,
            deadline,
        )?;
        debug!(accepted = report.accepted, "swap chain finished");
        Ok(Marginals {
            table,
            backend: Backend::SwapChain,
            configurations: None,
            report: Some(report),
        })
    }
}
