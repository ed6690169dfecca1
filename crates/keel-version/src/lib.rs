//! Version and constraint model for the keel dependency solver.
//!
//! Packages in this ecosystem carry versions from two families: registry
//! packages use semver-like versions, opam-sourced packages use opam's
//! Debian-style version strings. Both are parsed into a single totally
//! ordered [`Version`] type so the solver can renumber them uniformly.

pub mod constraint;
mod opam;
mod version;

pub use constraint::{Operator, VersionSpec};
pub use opam::OpamVersion;
pub use version::{Identifier, Semver, Version, VersionError};
