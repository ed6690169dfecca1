//! In-memory resolver over a fixed manifest snapshot.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::package::{Package, Req};

use super::{Resolution, Resolver, ResolverError};

/// A resolver backed by a fixed set of manifests.
///
/// Useful for embedders that already hold a registry snapshot, and as the
/// workhorse of the solver's own tests. Versions are served newest first,
/// mirroring what a registry-backed resolver returns.
#[derive(Debug, Default)]
pub struct StaticResolver {
    packages: IndexMap<String, Vec<Arc<Package>>>,
}

impl StaticResolver {
    pub fn new(manifests: impl IntoIterator<Item = Package>) -> StaticResolver {
        let mut resolver = StaticResolver::default();
        for manifest in manifests {
            resolver.add(manifest);
        }
        resolver
    }

    pub fn add(&mut self, manifest: Package) {
        let versions = self.packages.entry(manifest.name.clone()).or_default();
        match versions.binary_search_by(|p| manifest.version.cmp(&p.version)) {
            // Same version registered twice: the first manifest wins.
            Ok(_) => {}
            Err(idx) => versions.insert(idx, Arc::new(manifest)),
        }
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, req: &Req) -> Result<Vec<Resolution>, ResolverError> {
        let versions = match self.packages.get(req.name()) {
            Some(versions) => versions,
            None => return Ok(Vec::new()),
        };

        Ok(versions
            .iter()
            .filter(|pkg| req.spec().matches(&pkg.version))
            .map(|pkg| Resolution {
                name: pkg.name.clone(),
                version: pkg.version.clone(),
                source: pkg.source.clone(),
            })
            .collect())
    }

    async fn package(&self, resolution: &Resolution) -> Result<Package, ResolverError> {
        self.packages
            .get(&resolution.name)
            .and_then(|versions| {
                versions
                    .iter()
                    .find(|pkg| pkg.version == resolution.version)
            })
            .map(|pkg| (**pkg).clone())
            .ok_or_else(|| ResolverError::NoSuchPackage(resolution.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_version::Version;

    fn pkg(name: &str, version: &str) -> Package {
        Package::new(name, Version::parse(version).unwrap())
    }

    #[tokio::test]
    async fn test_resolve_newest_first() {
        let resolver = StaticResolver::new([
            pkg("a", "1.0.0"),
            pkg("a", "1.1.0"),
            pkg("a", "0.9.0"),
        ]);

        let candidates = resolver.resolve(&Req::parse("a@^1.0").unwrap()).await.unwrap();
        let versions: Vec<String> = candidates.iter().map(|r| r.version.to_string()).collect();
        assert_eq!(versions, vec!["1.1.0", "1.0.0"]);
    }

    #[tokio::test]
    async fn test_resolve_unknown_name_is_empty() {
        let resolver = StaticResolver::new([]);
        let candidates = resolver.resolve(&Req::parse("ghost@^1.0").unwrap()).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_package_expands_manifest() {
        let manifest = pkg("a", "1.0.0")
            .with_dependencies(vec![Req::parse("b@^2.0").unwrap()]);
        let resolver = StaticResolver::new([manifest]);

        let resolution = resolver
            .resolve(&Req::parse("a@*").unwrap())
            .await
            .unwrap()
            .remove(0);
        let expanded = resolver.package(&resolution).await.unwrap();
        assert_eq!(expanded.dependencies.len(), 1);
    }

    #[tokio::test]
    async fn test_package_unknown_resolution() {
        let resolver = StaticResolver::new([pkg("a", "1.0.0")]);
        let bogus = Resolution {
            name: "a".to_string(),
            version: Version::parse("9.9.9").unwrap(),
            source: Default::default(),
        };
        assert!(matches!(
            resolver.package(&bogus).await,
            Err(ResolverError::NoSuchPackage(_))
        ));
    }
}
