//! Translation between the universe and its CUDF encoding.
//!
//! CUDF wants dense positive integer versions and a restricted name
//! charset. The mapping built here is the only place where that encoding
//! leaks: everything coming back from the solver is decoded through it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cudf::{CudfConstraint, CudfPackage};
use crate::package::{Package, PackageId, PackageSet};

use super::Universe;

/// Bidirectional mapping between packages and their CUDF encoding.
///
/// Holds cloned identities into the universe it was built from; it is only
/// meaningful alongside the CUDF packages returned by the same
/// [`Universe::to_cudf`] call.
#[derive(Debug, Default)]
pub struct CudfMapping {
    to_cudf: HashMap<PackageId, (String, u32)>,
    from_cudf: HashMap<(String, u32), Arc<Package>>,
}

impl CudfMapping {
    pub fn encode(&self, id: &PackageId) -> Option<(&str, u32)> {
        self.to_cudf
            .get(id)
            .map(|(name, version)| (name.as_str(), *version))
    }

    pub fn decode(&self, name: &str, version: u32) -> Option<&Arc<Package>> {
        self.from_cudf.get(&(name.to_string(), version))
    }
}

/// Encode a package name into the CUDF charset.
///
/// Anything outside `[a-zA-Z0-9-._+]` becomes `%xx`; `%` itself is escaped,
/// so the encoding is injective.
pub(crate) fn mangle_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'+' => {
                out.push(byte as char)
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{:02x}", byte));
            }
        }
    }
    out
}

/// Reverse of [`mangle_name`]. Malformed escapes pass through untouched.
pub(crate) fn demangle_name(mangled: &str) -> String {
    let bytes = mangled.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
            if let Ok(byte) = u8::from_str_radix(hex, 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

impl Universe {
    /// Encode the whole universe as CUDF package stanzas.
    ///
    /// Versions are renumbered per name to dense integers preserving the
    /// native order: the newest version of a name with N versions becomes
    /// CUDF version N, the oldest becomes 1. Stanzas are emitted in sorted
    /// name order, so the encoding is deterministic for a given universe
    /// regardless of insertion order.
    ///
    /// Packages in `installed` are flagged `installed: true` and
    /// `keep: version`, pinning them for strategies that reward leaving the
    /// installed set alone.
    pub fn to_cudf(&self, installed: &PackageSet) -> (Vec<CudfPackage>, CudfMapping) {
        let mut mapping = CudfMapping::default();
        let mut stanzas = Vec::with_capacity(self.len());

        for name in self.names_sorted() {
            let versions = self.versions(name);
            let cudf_name = mangle_name(name);
            let total = versions.len() as u32;

            // versions[] is newest-first: index 0 encodes to `total`.
            for (idx, package) in versions.iter().enumerate() {
                let cudf_version = total - idx as u32;
                mapping
                    .to_cudf
                    .insert(package.id(), (cudf_name.clone(), cudf_version));
                mapping
                    .from_cudf
                    .insert((cudf_name.clone(), cudf_version), package.clone());
            }
        }

        for name in self.names_sorted() {
            let versions = self.versions(name);
            let cudf_name = mangle_name(name);

            // Oldest first, so stanzas appear in version order 1..=N.
            for package in versions.iter().rev() {
                let (_, cudf_version) = mapping
                    .to_cudf
                    .get(&package.id())
                    .cloned()
                    .unwrap_or((cudf_name.clone(), 0));

                let mut stanza = CudfPackage::new(cudf_name.clone(), cudf_version);
                stanza.depends = package
                    .dependencies
                    .iter()
                    .map(|req| self.encode_requirement(req, &mapping))
                    .collect();
                // One version per name.
                stanza.conflicts = vec![CudfConstraint::any(cudf_name.clone())];

                if installed.contains_key(&package.id()) {
                    stanza.installed = true;
                    stanza.keep = true;
                }
                stanzas.push(stanza);
            }
        }

        (stanzas, mapping)
    }

    /// A requirement becomes a disjunction of exact literals, one per
    /// satisfying candidate. With no candidate, the unsatisfiable literal
    /// `name = 0` stands in, keeping the encoding total; the diagnostic walk
    /// reports it as missing.
    fn encode_requirement(
        &self,
        req: &crate::package::Req,
        mapping: &CudfMapping,
    ) -> Vec<CudfConstraint> {
        let literals: Vec<CudfConstraint> = self
            .versions(req.name())
            .iter()
            .filter(|pkg| req.spec().matches(&pkg.version))
            .filter_map(|pkg| {
                let (name, version) = mapping.encode(&pkg.id())?;
                Some(CudfConstraint::exact(name, version))
            })
            .collect();

        if literals.is_empty() {
            vec![CudfConstraint::exact(mangle_name(req.name()), 0)]
        } else {
            literals
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cudf::RelOp;
    use crate::package::Req;
    use keel_version::Version;

    fn pkg(name: &str, version: &str) -> Package {
        Package::new(name, Version::parse(version).unwrap())
    }

    fn universe(packages: impl IntoIterator<Item = Package>) -> Universe {
        let mut universe = Universe::new();
        for package in packages {
            universe.add(package);
        }
        universe
    }

    #[test]
    fn test_mangle_name() {
        assert_eq!(mangle_name("lwt"), "lwt");
        assert_eq!(mangle_name("@opam/lwt"), "%40opam%2flwt");
        assert_eq!(mangle_name("50%"), "50%25");
    }

    #[test]
    fn test_mangle_is_injective_on_tricky_names() {
        assert_ne!(mangle_name("a%2fb"), mangle_name("a/b"));
    }

    #[test]
    fn test_demangle_round_trip() {
        for name in ["lwt", "@opam/lwt", "50%", "a%2fb", "weird name"] {
            assert_eq!(demangle_name(&mangle_name(name)), name);
        }
    }

    #[test]
    fn test_renumbering_preserves_order() {
        let u = universe([pkg("a", "1.0.0"), pkg("a", "2.0.0"), pkg("a", "1.5.0")]);
        let (stanzas, mapping) = u.to_cudf(&PackageSet::new());

        assert_eq!(stanzas.len(), 3);
        // Highest native version gets the highest dense version.
        let encoded = |v: &str| {
            mapping
                .encode(&pkg("a", v).id())
                .map(|(_, version)| version)
                .unwrap()
        };
        assert_eq!(encoded("2.0.0"), 3);
        assert_eq!(encoded("1.5.0"), 2);
        assert_eq!(encoded("1.0.0"), 1);
    }

    #[test]
    fn test_round_trip() {
        let u = universe([
            pkg("a", "1.0.0"),
            pkg("a", "2.0.0"),
            pkg("@scope/b", "0.1.0"),
        ]);
        let (_, mapping) = u.to_cudf(&PackageSet::new());

        for package in u.iter() {
            let (name, version) = mapping.encode(&package.id()).unwrap();
            let decoded = mapping.decode(name, version).unwrap();
            assert_eq!(decoded.as_ref(), package.as_ref());
        }
    }

    #[test]
    fn test_dependency_encoding_enumerates_matches() {
        let u = universe([
            pkg("app", "1.0.0").with_dependencies(vec![Req::parse("lib@^1.0").unwrap()]),
            pkg("lib", "1.0.0"),
            pkg("lib", "1.2.0"),
            pkg("lib", "2.0.0"),
        ]);
        let (stanzas, _) = u.to_cudf(&PackageSet::new());

        let app = stanzas
            .iter()
            .find(|s| s.name == "app")
            .unwrap();
        assert_eq!(app.depends.len(), 1);
        let versions: Vec<u32> = app.depends[0]
            .iter()
            .map(|c| c.constraint.unwrap().1)
            .collect();
        // lib 1.2.0 -> 2, lib 1.0.0 -> 1; 2.0.0 (version 3) excluded.
        assert_eq!(versions, vec![2, 1]);
        assert!(app.depends[0].iter().all(|c| c.name == "lib"));
        assert!(app.depends[0]
            .iter()
            .all(|c| c.constraint.unwrap().0 == RelOp::Eq));
    }

    #[test]
    fn test_unmatched_dependency_encodes_as_version_zero() {
        let u = universe([
            pkg("app", "1.0.0").with_dependencies(vec![Req::parse("ghost@^1.0").unwrap()]),
        ]);
        let (stanzas, _) = u.to_cudf(&PackageSet::new());

        let app = stanzas.iter().find(|s| s.name == "app").unwrap();
        assert_eq!(app.depends[0], vec![CudfConstraint::exact("ghost", 0)]);
    }

    #[test]
    fn test_installed_flags() {
        let u = universe([pkg("a", "1.0.0"), pkg("b", "1.0.0")]);
        let mut installed = PackageSet::new();
        let a = u.versions("a")[0].clone();
        installed.insert(a.id(), a);

        let (stanzas, _) = u.to_cudf(&installed);
        let find = |name: &str| stanzas.iter().find(|s| s.name == name).unwrap();
        assert!(find("a").installed);
        assert!(find("a").keep);
        assert!(!find("b").installed);
        assert!(!find("b").keep);
    }

    #[test]
    fn test_every_stanza_conflicts_with_own_name() {
        let u = universe([pkg("a", "1.0.0"), pkg("a", "2.0.0")]);
        let (stanzas, _) = u.to_cudf(&PackageSet::new());
        for stanza in &stanzas {
            assert_eq!(stanza.conflicts, vec![CudfConstraint::any("a")]);
        }
    }
}
