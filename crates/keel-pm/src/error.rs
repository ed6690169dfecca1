use thiserror::Error;

use crate::resolver::ResolverError;
use crate::solver::Explanation;

/// Errors produced by the solving core.
#[derive(Error, Debug)]
pub enum SolveError {
    /// The constraint set has no solution; the payload explains why.
    #[error("unable to find a solution\n{0}")]
    Unsatisfiable(Explanation),

    #[error("resolving request: {req}")]
    Resolver {
        req: String,
        #[source]
        source: ResolverError,
    },

    /// The external solver crashed, timed out, or produced output that is
    /// neither a solution nor an unsatisfiability verdict.
    #[error("solver process failed: {0}")]
    SolverProcess(String),

    /// A broken internal invariant, e.g. during diagnostic reconstruction.
    /// This is a bug in the solver, not a property of the input.
    #[error("inconsistent solver state: {0}")]
    InconsistentState(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SolveError {
    /// The explanation carried by an unsatisfiability error, if any.
    pub fn explanation(&self) -> Option<&Explanation> {
        match self {
            SolveError::Unsatisfiable(explanation) => Some(explanation),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SolveError>;
