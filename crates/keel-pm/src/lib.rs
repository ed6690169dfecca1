//! Dependency solving core for the keel package manager.
//!
//! Given a root manifest, the solver expands its requirements into a
//! candidate universe, encodes the universe as a CUDF problem for a
//! PBO/SAT solver, and decodes the verdict into a [`Solution`] tree — or,
//! when no solution exists, an [`Explanation`] of the failing constraints.
//! Runtime and development dependencies are solved in two phases: the
//! runtime closure is computed first, then each development dependency is
//! solved incrementally against it.

pub mod config;
pub mod cudf;
pub mod error;
pub mod package;
pub mod resolver;
pub mod solution;
pub mod solver;
pub mod universe;

pub use config::SolverConfig;
pub use error::{Result, SolveError};
pub use package::{OpamMetadata, Package, PackageId, PackageSet, PackageSource, Req, Resolutions};
pub use resolver::{Resolution, Resolver, ResolverError, StaticResolver};
pub use solution::Solution;
pub use solver::{
    CudfBackend, CudfOutcome, DepChain, Explanation, InternalBackend, ProcessBackend, Reason,
    Solver, Strategy,
};
pub use universe::{CudfMapping, Universe};
