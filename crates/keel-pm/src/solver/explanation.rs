//! Human-readable unsatisfiability explanations.
//!
//! The diagnostics produced by [`super::checker`] speak in CUDF identities.
//! This module lifts them back into packages and requirements: it rebuilds
//! the dependency chain that put each failing constraint in scope, collapses
//! duplicates, and renders the result.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, SolveError};
use crate::package::{Package, Req};
use crate::resolver::{Resolution, Resolver};
use crate::universe::{demangle_name, CudfMapping};

use super::checker::{CudfId, Diagnostic, DUMMY_REQUEST};
use super::ROOT_NAME;

/// A requirement together with the path of packages that put it in scope:
/// `[pkg, ..., root]`, innermost first.
#[derive(Debug, Clone)]
pub struct DepChain {
    pub req: Req,
    pub path: Vec<Arc<Package>>,
}

/// One reason a solve failed.
#[derive(Debug, Clone)]
pub enum Reason {
    /// No candidate matches a requirement; `available` is the unfiltered
    /// candidate list the resolver knows for that name.
    Missing {
        chain: DepChain,
        available: Vec<Resolution>,
    },
    /// Two requirements on one name can never be satisfied together.
    Conflict { left: DepChain, right: DepChain },
}

/// An ordered, de-duplicated list of failure reasons.
#[derive(Debug, Clone, Default)]
pub struct Explanation {
    pub reasons: Vec<Reason>,
}

/// Reconstruct an explanation from checker diagnostics.
///
/// Chains follow the "reached via" edges recorded by `Dependency`
/// diagnostics, skipping the synthetic request entry; the walk guards
/// against cycles by terminating at the first repeat. Reasons are emitted
/// in diagnostic order, dropping later duplicates keyed on the requirement
/// text. For missing requirements the resolver is asked again with the
/// wildcard spec so the report can show everything that exists.
pub(crate) async fn explain(
    diagnostics: &[Diagnostic],
    mapping: &CudfMapping,
    resolver: &dyn Resolver,
) -> Result<Explanation> {
    let mut parents: HashMap<CudfId, CudfId> = HashMap::new();
    for diagnostic in diagnostics {
        if let Diagnostic::Dependency { pkg, targets, .. } = diagnostic {
            if pkg.0 == DUMMY_REQUEST {
                continue;
            }
            for target in targets {
                parents.entry(target.clone()).or_insert_with(|| pkg.clone());
            }
        }
    }

    let decode = |id: &CudfId| -> Result<Arc<Package>> {
        mapping.decode(&id.0, id.1).cloned().ok_or_else(|| {
            SolveError::InconsistentState(format!(
                "diagnostic names a package outside the universe: {} = {}",
                id.0, id.1
            ))
        })
    };

    // Path [pkg, parent, ..., requestor]; the terminal is whatever has no
    // recorded parent, normally the synthetic root.
    let path_to = |id: &CudfId| -> Result<Vec<Arc<Package>>> {
        let mut path = vec![decode(id)?];
        let mut seen: HashSet<CudfId> = HashSet::from([id.clone()]);
        let mut cursor = id.clone();
        while let Some(parent) = parents.get(&cursor) {
            if !seen.insert(parent.clone()) {
                break;
            }
            path.push(decode(parent)?);
            cursor = parent.clone();
        }
        Ok(path)
    };

    // Chain for one side of a conflict: the direct requestor's declared
    // requirement naming the package, plus the full path.
    let conflict_chain = |id: &CudfId| -> Result<DepChain> {
        let path = path_to(id)?;
        if path.len() < 2 {
            return Err(SolveError::InconsistentState(format!(
                "conflicting package {} has no requestor",
                path.first().map(|p| p.to_string()).unwrap_or_default()
            )));
        }
        let package = &path[0];
        let requestor = &path[1];
        let req = requestor.dependency_on(&package.name).cloned().ok_or_else(|| {
            SolveError::InconsistentState(format!(
                "{} does not declare a dependency on {}",
                requestor, package.name
            ))
        })?;
        Ok(DepChain { req, path })
    };

    let mut reasons = Vec::new();
    let mut conflict_keys: HashSet<(String, String)> = HashSet::new();
    let mut missing_keys: HashSet<String> = HashSet::new();

    for diagnostic in diagnostics {
        match diagnostic {
            Diagnostic::Conflict { left, right } => {
                let left = conflict_chain(left)?;
                let right = conflict_chain(right)?;
                let key = ordered_pair(left.req.to_string(), right.req.to_string());
                if conflict_keys.insert(key) {
                    reasons.push(Reason::Conflict { left, right });
                }
            }
            Diagnostic::Missing { pkg, unmet } => {
                let package = decode(pkg)?;
                let path = if package.name == ROOT_NAME {
                    vec![package.clone()]
                } else {
                    path_to(pkg)?
                };

                let mut names_seen = HashSet::new();
                for literal in unmet {
                    let name = demangle_name(&literal.name);
                    if !names_seen.insert(name.clone()) {
                        continue;
                    }
                    let req = package.dependency_on(&name).cloned().ok_or_else(|| {
                        SolveError::InconsistentState(format!(
                            "{} does not declare a dependency on {}",
                            package, name
                        ))
                    })?;
                    if !missing_keys.insert(req.to_string()) {
                        continue;
                    }

                    let available = match resolver.resolve(&Req::any(name.as_str())).await {
                        Ok(available) => available,
                        Err(err) => {
                            log::debug!("availability lookup for {} failed: {}", name, err);
                            Vec::new()
                        }
                    };
                    reasons.push(Reason::Missing {
                        chain: DepChain {
                            req,
                            path: path.clone(),
                        },
                        available,
                    });
                }
            }
            Diagnostic::Request { .. } | Diagnostic::Dependency { .. } | Diagnostic::Other(_) => {}
        }
    }

    Ok(Explanation { reasons })
}

fn ordered_pair(a: String, b: String) -> (String, String) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn fmt_package(package: &Package) -> String {
    if package.name == ROOT_NAME {
        "root".to_string()
    } else {
        package.to_string()
    }
}

/// The `required by` trail for a chain: every element from `start` on,
/// innermost first.
fn fmt_path(path: &[Arc<Package>]) -> String {
    let parts: Vec<String> = path.iter().map(|p| fmt_package(p)).collect();
    parts.join(" <- ")
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, reason) in self.reasons.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            match reason {
                Reason::Missing { chain, available } => {
                    writeln!(f, "  no packages match {}", chain.req)?;
                    writeln!(f, "    required by {}", fmt_path(&chain.path))?;
                    if available.is_empty() {
                        writeln!(f, "    no versions available")?;
                    } else {
                        let versions: Vec<String> =
                            available.iter().map(|r| r.to_string()).collect();
                        writeln!(f, "    versions available: {}", versions.join(", "))?;
                    }
                }
                Reason::Conflict { left, right } => {
                    writeln!(f, "  conflicting constraints on {}", left.req.name())?;
                    for side in [left, right] {
                        writeln!(
                            f,
                            "    {} required by {}",
                            side.req,
                            fmt_path(side.path.get(1..).unwrap_or(&[]))
                        )?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Explanation {
    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn len(&self) -> usize {
        self.reasons.len()
    }
}
