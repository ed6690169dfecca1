//! CUDF document model.
//!
//! The external solver speaks CUDF (Common Upgradeability Description
//! Format): a text document listing package stanzas plus a request stanza.
//! This module holds the in-memory form; the text printer and the solution
//! parser live in [`format`].

mod format;

pub use format::{parse_solution, SolutionParseError};

/// Comparison operator inside a CUDF constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Neq,
    Geq,
    Gt,
    Leq,
    Lt,
}

impl RelOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelOp::Eq => "=",
            RelOp::Neq => "!=",
            RelOp::Geq => ">=",
            RelOp::Gt => ">",
            RelOp::Leq => "<=",
            RelOp::Lt => "<",
        }
    }

    pub fn matches(&self, version: u32, bound: u32) -> bool {
        match self {
            RelOp::Eq => version == bound,
            RelOp::Neq => version != bound,
            RelOp::Geq => version >= bound,
            RelOp::Gt => version > bound,
            RelOp::Leq => version <= bound,
            RelOp::Lt => version < bound,
        }
    }
}

/// A possibly versioned package reference (a CUDF "vpkg"): a bare name
/// matches every version of the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CudfConstraint {
    pub name: String,
    pub constraint: Option<(RelOp, u32)>,
}

impl CudfConstraint {
    pub fn any(name: impl Into<String>) -> CudfConstraint {
        CudfConstraint {
            name: name.into(),
            constraint: None,
        }
    }

    pub fn exact(name: impl Into<String>, version: u32) -> CudfConstraint {
        CudfConstraint {
            name: name.into(),
            constraint: Some((RelOp::Eq, version)),
        }
    }

    pub fn accepts(&self, name: &str, version: u32) -> bool {
        if self.name != name {
            return false;
        }
        match self.constraint {
            None => true,
            Some((op, bound)) => op.matches(version, bound),
        }
    }
}

/// One package stanza.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CudfPackage {
    pub name: String,
    /// Dense positive version number; 0 never exists, so an `= 0` literal
    /// in a dependency is unsatisfiable by construction.
    pub version: u32,
    /// Conjunction of disjunctions.
    pub depends: Vec<Vec<CudfConstraint>>,
    pub conflicts: Vec<CudfConstraint>,
    pub installed: bool,
    /// Whether the solver must keep this version installed.
    pub keep: bool,
}

impl CudfPackage {
    pub fn new(name: impl Into<String>, version: u32) -> CudfPackage {
        CudfPackage {
            name: name.into(),
            version,
            depends: Vec::new(),
            conflicts: Vec::new(),
            installed: false,
            keep: false,
        }
    }

    /// Whether this package conflicts with `other`. A conflict on the
    /// package's own name excludes other versions of itself, never itself.
    pub fn conflicts_with(&self, other: &CudfPackage) -> bool {
        if self.name == other.name && self.version == other.version {
            return false;
        }
        self.conflicts
            .iter()
            .any(|c| c.accepts(&other.name, other.version))
    }
}

/// The request stanza: a conjunction of installation constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CudfRequest {
    pub install: Vec<CudfConstraint>,
}

/// A complete CUDF problem.
#[derive(Debug, Clone, Default)]
pub struct CudfDocument {
    pub packages: Vec<CudfPackage>,
    pub request: CudfRequest,
}

impl CudfDocument {
    pub fn find(&self, name: &str, version: u32) -> Option<&CudfPackage> {
        self.packages
            .iter()
            .find(|p| p.name == name && p.version == version)
    }

    /// Every package satisfying a single constraint, newest version first.
    pub fn satisfiers(&self, constraint: &CudfConstraint) -> Vec<&CudfPackage> {
        let mut found: Vec<&CudfPackage> = self
            .packages
            .iter()
            .filter(|p| constraint.accepts(&p.name, p.version))
            .collect();
        found.sort_by(|a, b| b.version.cmp(&a.version));
        found
    }
}
