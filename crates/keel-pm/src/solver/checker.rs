//! Unsatisfiability diagnostics.
//!
//! When the external solver rejects a document, it reports nothing beyond
//! the verdict. The low-level reasons are reconstructed here by walking the
//! encoded universe from the synthetic root, in the same shape a dose-style
//! health check produces: dependency edges, unmatchable dependencies, and
//! pairs of packages that can never be installed together.

use std::collections::{BTreeSet, HashSet, VecDeque};

use crate::cudf::{CudfConstraint, CudfDocument};

/// Name of the synthetic request entry in diagnostic output. The
/// explanation engine skips dependency edges originating here.
pub const DUMMY_REQUEST: &str = "dose-dummy-request";

/// Identity of one encoded package: `(cudf name, cudf version)`.
pub type CudfId = (String, u32);

/// One low-level diagnostic. The explanation engine interprets
/// `Dependency`, `Missing` and `Conflict`; everything else is carried
/// through untouched.
#[derive(Debug, Clone)]
pub enum Diagnostic {
    /// The install request under diagnosis.
    Request { install: Vec<CudfConstraint> },
    /// `pkg` pulls `targets` into scope through the constraint list `via`.
    Dependency {
        pkg: CudfId,
        via: Vec<CudfConstraint>,
        targets: Vec<CudfId>,
    },
    /// `pkg` has a dependency clause no candidate satisfies.
    Missing {
        pkg: CudfId,
        unmet: Vec<CudfConstraint>,
    },
    /// Two reachable packages exclude each other.
    Conflict { left: CudfId, right: CudfId },
    /// Any reason the engine does not interpret.
    Other(String),
}

/// Walk the document from `root` and collect diagnostics.
///
/// Dependency edges are emitted for every reachable package, missing
/// reasons for clauses with an empty candidate set, and conflict reasons
/// for pairs of reached packages whose demands on one name are disjoint
/// (the newest candidate of each side names the pair). The walk is
/// breadth-first over the deterministic document order, so output order is
/// stable.
pub fn diagnose(doc: &CudfDocument, root: &CudfId) -> Vec<Diagnostic> {
    let mut diagnostics = vec![
        Diagnostic::Request {
            install: doc.request.install.clone(),
        },
        Diagnostic::Dependency {
            pkg: (DUMMY_REQUEST.to_string(), 1),
            via: doc.request.install.clone(),
            targets: vec![root.clone()],
        },
    ];

    // Demands: one entry per reached dependency clause whose candidates all
    // share a name; `(requestor, name, candidate versions)`.
    let mut demands: Vec<(CudfId, String, BTreeSet<u32>)> = Vec::new();

    let mut visited: HashSet<CudfId> = HashSet::new();
    let mut queue: VecDeque<CudfId> = VecDeque::new();
    visited.insert(root.clone());
    queue.push_back(root.clone());

    while let Some(id) = queue.pop_front() {
        let Some(package) = doc.find(&id.0, id.1) else {
            continue;
        };

        for clause in &package.depends {
            let mut targets: Vec<CudfId> = Vec::new();
            for literal in clause {
                for satisfier in doc.satisfiers(literal) {
                    let target = (satisfier.name.clone(), satisfier.version);
                    if !targets.contains(&target) {
                        targets.push(target);
                    }
                }
            }

            if targets.is_empty() {
                diagnostics.push(Diagnostic::Missing {
                    pkg: id.clone(),
                    unmet: clause.clone(),
                });
                continue;
            }

            let names: HashSet<&str> = targets.iter().map(|(name, _)| name.as_str()).collect();
            if names.len() == 1 {
                demands.push((
                    id.clone(),
                    targets[0].0.clone(),
                    targets.iter().map(|(_, version)| *version).collect(),
                ));
            }

            diagnostics.push(Diagnostic::Dependency {
                pkg: id.clone(),
                via: clause.clone(),
                targets: targets.clone(),
            });

            for target in targets {
                if visited.insert(target.clone()) {
                    queue.push_back(target);
                }
            }
        }
    }

    // Disjoint demands on one name cannot both be met: one version per name.
    let mut reported: HashSet<(CudfId, CudfId)> = HashSet::new();
    for i in 0..demands.len() {
        for j in (i + 1)..demands.len() {
            let (_, name_a, versions_a) = &demands[i];
            let (_, name_b, versions_b) = &demands[j];
            if name_a != name_b {
                continue;
            }
            if versions_a.intersection(versions_b).next().is_some() {
                continue;
            }
            let (Some(&best_a), Some(&best_b)) =
                (versions_a.iter().max(), versions_b.iter().max())
            else {
                continue;
            };
            let left = (name_a.clone(), best_a);
            let right = (name_b.clone(), best_b);
            let key = if left <= right {
                (left.clone(), right.clone())
            } else {
                (right.clone(), left.clone())
            };
            if reported.insert(key) {
                diagnostics.push(Diagnostic::Conflict { left, right });
            }
        }
    }

    diagnostics
}
