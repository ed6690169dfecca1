//! Resolver contract.
//!
//! The resolver is the solver's window onto the registry: it turns a
//! requirement into candidate resolutions and a resolution into a full
//! manifest. Implementations are expected to do network I/O; the solver
//! never assumes a call is cheap and never asks for the same
//! `(name, version)` manifest twice within one solve.

mod memory;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use keel_version::Version;

use crate::package::{Package, PackageSource, Req};

pub use memory::StaticResolver;

/// An unexpanded candidate: enough identity to ask for the full manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub name: String,
    pub version: Version,
    pub source: PackageSource,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Errors a resolver implementation may report.
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("no such package: {0}")]
    NoSuchPackage(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to parse manifest for {name}: {reason}")]
    ManifestParse { name: String, reason: String },
}

/// A source of candidate packages.
///
/// Within a single solve both operations must be referentially transparent:
/// the same requirement always yields the same candidate list, the same
/// resolution always yields the same manifest. Implementations must be safe
/// for concurrent calls; the solver fans requests out.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// All candidate resolutions satisfying `req`, newest first.
    async fn resolve(&self, req: &Req) -> Result<Vec<Resolution>, ResolverError>;

    /// Expand a candidate into its full manifest.
    async fn package(&self, resolution: &Resolution) -> Result<Package, ResolverError>;
}
