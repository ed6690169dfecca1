//! The candidate universe.
//!
//! An append-only set of package manifests, indexed by name with versions
//! kept in descending order. The universe built during the runtime phase is
//! reused as-is by the development phase; nothing is ever removed or
//! mutated in place.

mod cudf_map;

use std::sync::Arc;

use indexmap::IndexMap;

use keel_version::Version;

use crate::package::Package;

pub use cudf_map::CudfMapping;
pub(crate) use cudf_map::demangle_name;

#[derive(Debug, Clone, Default)]
pub struct Universe {
    packages: IndexMap<String, Vec<Arc<Package>>>,
    count: usize,
}

impl Universe {
    pub fn new() -> Universe {
        Universe::default()
    }

    /// Whether a package with this identity is already present.
    pub fn mem(&self, name: &str, version: &Version) -> bool {
        self.get(name, version).is_some()
    }

    pub fn get(&self, name: &str, version: &Version) -> Option<&Arc<Package>> {
        self.packages
            .get(name)?
            .iter()
            .find(|pkg| &pkg.version == version)
    }

    /// All known versions of `name`, newest first.
    pub fn versions(&self, name: &str) -> &[Arc<Package>] {
        self.packages.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Insert a package, returning the shared handle for it.
    ///
    /// Idempotent on identity: inserting a second manifest with the same
    /// `(name, version)` returns the one already present.
    pub fn add(&mut self, package: Package) -> Arc<Package> {
        let versions = self.packages.entry(package.name.clone()).or_default();
        match versions.binary_search_by(|p| package.version.cmp(&p.version)) {
            Ok(idx) => versions[idx].clone(),
            Err(idx) => {
                let handle = Arc::new(package);
                versions.insert(idx, handle.clone());
                self.count += 1;
                handle
            }
        }
    }

    /// Number of distinct packages.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Package names in sorted order; the basis for all deterministic
    /// encodings of the universe.
    pub fn names_sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.packages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.packages.values().flatten()
    }
}
