// Package model: requirements, resolution overrides, and the manifest record
// the solver works with.

mod package;
mod req;

pub use package::{OpamMetadata, Package, PackageId, PackageSet, PackageSource};
pub use req::{Req, Resolutions};
