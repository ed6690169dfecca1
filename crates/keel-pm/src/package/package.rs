use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use keel_version::Version;

use super::req::{req_table, Req};

/// Where a package's contents come from. The solver only carries this
/// through; fetching is the business of other components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PackageSource {
    Archive {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum: Option<String>,
    },
    Git {
        url: String,
        #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
    },
    Path {
        path: PathBuf,
    },
    #[default]
    NoSource,
}

/// The opam identity a package was translated from, when it came out of the
/// opam repository rather than the native registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpamMetadata {
    pub name: String,
    pub version: String,
}

/// The identity of a package: its name and version. Two manifests with the
/// same identity are the same package as far as the solver is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId {
    pub name: String,
    pub version: Version,
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A set of packages keyed by identity, with deterministic iteration order.
pub type PackageSet = BTreeMap<PackageId, Arc<Package>>;

/// A package manifest as the solver sees it.
///
/// Immutable once inserted into a universe; dependency lists are rewritten
/// through the resolution overrides before insertion, never after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: Version,

    #[serde(default)]
    pub source: PackageSource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opam: Option<OpamMetadata>,

    #[serde(default, with = "req_table", skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Req>,

    #[serde(
        default,
        rename = "buildDependencies",
        with = "req_table",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub build_dependencies: Vec<Req>,

    #[serde(
        default,
        rename = "devDependencies",
        with = "req_table",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub dev_dependencies: Vec<Req>,
}

impl Package {
    pub fn new(name: impl Into<String>, version: Version) -> Package {
        Package {
            name: name.into(),
            version,
            source: PackageSource::NoSource,
            opam: None,
            dependencies: Vec::new(),
            build_dependencies: Vec::new(),
            dev_dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<Req>) -> Package {
        self.dependencies = deps;
        self
    }

    pub fn with_dev_dependencies(mut self, deps: Vec<Req>) -> Package {
        self.dev_dependencies = deps;
        self
    }

    /// Parse a manifest from its JSON form.
    pub fn from_json(json: &str) -> Result<Package, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn id(&self) -> PackageId {
        PackageId {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }

    /// The package's declared runtime requirement for `name`, if any.
    pub fn dependency_on(&self, name: &str) -> Option<&Req> {
        self.dependencies.iter().find(|req| req.name() == name)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}
