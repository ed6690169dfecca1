//! CUDF solving backends.
//!
//! The production backend shells out to the configured PBO/SAT solver over
//! the CUDF text interface. [`InternalBackend`] is a small exhaustive
//! search over the same document; it handles the modest universes produced
//! by demand-driven expansion and keeps the crate testable end-to-end
//! without an external executable.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::cudf::{parse_solution, CudfConstraint, CudfDocument, CudfPackage};
use crate::error::{Result, SolveError};

use super::Strategy;

/// The verdict of one CUDF solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CudfOutcome {
    /// The `(name, version)` pairs the solver decided to install.
    Solution(Vec<(String, u32)>),
    Unsat,
}

/// Something that can decide a CUDF document.
#[async_trait]
pub trait CudfBackend: Send + Sync {
    async fn solve(
        &self,
        doc: &CudfDocument,
        strategy: Strategy,
        timeout: Duration,
    ) -> Result<CudfOutcome>;
}

/// Invokes the external solver executable:
/// `<solve_cmd> --strategy=<criterion> --timeout=<seconds> <cudf-file>`.
///
/// Non-zero exit and unparseable stdout are unsatisfiability verdicts; a
/// launch failure or a hang past the timeout is a process error. The CUDF
/// document lives in a temp file scoped to the call, so it is removed on
/// every exit path, including cancellation; `kill_on_drop` does the same
/// for the child process.
#[derive(Debug)]
pub struct ProcessBackend {
    solve_cmd: PathBuf,
}

impl ProcessBackend {
    pub fn new(solve_cmd: impl Into<PathBuf>) -> ProcessBackend {
        ProcessBackend {
            solve_cmd: solve_cmd.into(),
        }
    }
}

/// Slack on top of the solver's own timeout before we kill it ourselves.
const TIMEOUT_GRACE: Duration = Duration::from_secs(10);

#[async_trait]
impl CudfBackend for ProcessBackend {
    async fn solve(
        &self,
        doc: &CudfDocument,
        strategy: Strategy,
        timeout: Duration,
    ) -> Result<CudfOutcome> {
        let file = tempfile::Builder::new()
            .prefix("keel-solve-")
            .suffix(".cudf")
            .tempfile()?;
        tokio::fs::write(file.path(), doc.to_string()).await?;

        log::debug!(
            "invoking {} on {} packages (strategy {})",
            self.solve_cmd.display(),
            doc.packages.len(),
            strategy.criterion()
        );

        let mut command = tokio::process::Command::new(&self.solve_cmd);
        command
            .arg(format!("--strategy={}", strategy.criterion()))
            .arg(format!("--timeout={}", timeout.as_secs()))
            .arg(file.path())
            .kill_on_drop(true);
        let invocation = command.output();

        let output = match tokio::time::timeout(timeout + TIMEOUT_GRACE, invocation).await {
            Err(_) => {
                return Err(SolveError::SolverProcess(format!(
                    "solver did not finish within {}s",
                    (timeout + TIMEOUT_GRACE).as_secs()
                )))
            }
            Ok(Err(err)) => {
                return Err(SolveError::SolverProcess(format!(
                    "failed to run {}: {}",
                    self.solve_cmd.display(),
                    err
                )))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            log::debug!("solver exited with {}; unsatisfiable", output.status);
            return Ok(CudfOutcome::Unsat);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_solution(&stdout) {
            Ok(installed) => Ok(CudfOutcome::Solution(installed)),
            Err(err) => {
                log::debug!("solver output is not a solution ({}); unsatisfiable", err);
                Ok(CudfOutcome::Unsat)
            }
        }
    }
}

/// Exhaustive backtracking search over a CUDF document.
///
/// Candidates are tried newest first; under
/// [`Strategy::MinimalAddition`] installed versions are tried before
/// anything newer, which keeps the installed set unchanged whenever the
/// constraints allow it. Packages marked `keep` are pinned up front.
#[derive(Debug, Default)]
pub struct InternalBackend;

impl InternalBackend {
    pub fn new() -> InternalBackend {
        InternalBackend
    }
}

#[async_trait]
impl CudfBackend for InternalBackend {
    async fn solve(
        &self,
        doc: &CudfDocument,
        strategy: Strategy,
        _timeout: Duration,
    ) -> Result<CudfOutcome> {
        let mut agenda: Vec<Vec<CudfConstraint>> = doc
            .request
            .install
            .iter()
            .map(|constraint| vec![constraint.clone()])
            .collect();
        for package in doc.packages.iter().filter(|p| p.keep) {
            agenda.push(vec![CudfConstraint::exact(
                package.name.clone(),
                package.version,
            )]);
        }

        let mut chosen = BTreeMap::new();
        if satisfy(doc, strategy, &mut chosen, &agenda) {
            Ok(CudfOutcome::Solution(chosen.into_iter().collect()))
        } else {
            Ok(CudfOutcome::Unsat)
        }
    }
}

fn ordered_candidates<'a>(
    doc: &'a CudfDocument,
    strategy: Strategy,
    disjunction: &[CudfConstraint],
) -> Vec<&'a CudfPackage> {
    let mut candidates: Vec<&CudfPackage> = Vec::new();
    for literal in disjunction {
        for package in doc.satisfiers(literal) {
            if !candidates
                .iter()
                .any(|c| c.name == package.name && c.version == package.version)
            {
                candidates.push(package);
            }
        }
    }
    candidates.sort_by(|a, b| {
        let preference = match strategy {
            // Leaving the installed set alone beats upgrading.
            Strategy::MinimalAddition => b.installed.cmp(&a.installed),
            Strategy::Trendy => std::cmp::Ordering::Equal,
        };
        preference
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| b.version.cmp(&a.version))
    });
    candidates
}

fn satisfy(
    doc: &CudfDocument,
    strategy: Strategy,
    chosen: &mut BTreeMap<String, u32>,
    agenda: &[Vec<CudfConstraint>],
) -> bool {
    let Some((disjunction, rest)) = agenda.split_first() else {
        return true;
    };

    // Already satisfied by a previous decision?
    let satisfied = disjunction.iter().any(|literal| {
        chosen
            .get(&literal.name)
            .is_some_and(|version| literal.accepts(&literal.name, *version))
    });
    if satisfied {
        return satisfy(doc, strategy, chosen, rest);
    }

    for candidate in ordered_candidates(doc, strategy, disjunction) {
        if chosen.contains_key(&candidate.name) {
            // A different version of this name is already in; the
            // one-version-per-name conflict rules this candidate out.
            continue;
        }
        let clashes = chosen.iter().any(|(name, &version)| {
            doc.find(name, version)
                .map(|other| candidate.conflicts_with(other) || other.conflicts_with(candidate))
                .unwrap_or(false)
        });
        if clashes {
            continue;
        }

        chosen.insert(candidate.name.clone(), candidate.version);
        let mut extended = rest.to_vec();
        extended.extend(candidate.depends.iter().cloned());
        if satisfy(doc, strategy, chosen, &extended) {
            return true;
        }
        chosen.remove(&candidate.name);
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cudf::CudfRequest;

    fn package(name: &str, version: u32) -> CudfPackage {
        let mut p = CudfPackage::new(name, version);
        p.conflicts = vec![CudfConstraint::any(name)];
        p
    }

    fn doc(packages: Vec<CudfPackage>, install: Vec<CudfConstraint>) -> CudfDocument {
        CudfDocument {
            packages,
            request: CudfRequest { install },
        }
    }

    async fn run(doc: &CudfDocument, strategy: Strategy) -> CudfOutcome {
        InternalBackend::new()
            .solve(doc, strategy, Duration::from_secs(1))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_internal_picks_newest() {
        let d = doc(
            vec![package("a", 1), package("a", 2)],
            vec![CudfConstraint::any("a")],
        );
        let outcome = run(&d, Strategy::Trendy).await;
        assert_eq!(outcome, CudfOutcome::Solution(vec![("a".to_string(), 2)]));
    }

    #[tokio::test]
    async fn test_internal_follows_dependencies() {
        let mut a = package("a", 1);
        a.depends = vec![vec![CudfConstraint::exact("b", 1)]];
        let d = doc(
            vec![a, package("b", 1)],
            vec![CudfConstraint::exact("a", 1)],
        );
        let outcome = run(&d, Strategy::Trendy).await;
        assert_eq!(
            outcome,
            CudfOutcome::Solution(vec![("a".to_string(), 1), ("b".to_string(), 1)])
        );
    }

    #[tokio::test]
    async fn test_internal_backtracks_over_versions() {
        // a prefers c = 2, but b forces c = 1; a = 1 is the only a that
        // tolerates c = 1.
        let mut a2 = package("a", 2);
        a2.depends = vec![vec![CudfConstraint::exact("c", 2)]];
        let mut a1 = package("a", 1);
        a1.depends = vec![vec![CudfConstraint::exact("c", 1)]];
        let mut b1 = package("b", 1);
        b1.depends = vec![vec![CudfConstraint::exact("c", 1)]];

        let d = doc(
            vec![a2, a1, b1, package("c", 1), package("c", 2)],
            vec![CudfConstraint::any("a"), CudfConstraint::any("b")],
        );
        let outcome = run(&d, Strategy::Trendy).await;
        assert_eq!(
            outcome,
            CudfOutcome::Solution(vec![
                ("a".to_string(), 1),
                ("b".to_string(), 1),
                ("c".to_string(), 1),
            ])
        );
    }

    #[tokio::test]
    async fn test_internal_reports_unsat() {
        let mut a = package("a", 1);
        a.depends = vec![vec![CudfConstraint::exact("c", 1)]];
        let mut b = package("b", 1);
        b.depends = vec![vec![CudfConstraint::exact("c", 2)]];

        let d = doc(
            vec![a, b, package("c", 1), package("c", 2)],
            vec![CudfConstraint::exact("a", 1), CudfConstraint::exact("b", 1)],
        );
        assert_eq!(run(&d, Strategy::Trendy).await, CudfOutcome::Unsat);
    }

    #[tokio::test]
    async fn test_internal_pins_kept_packages() {
        let mut b1 = package("b", 1);
        b1.installed = true;
        b1.keep = true;

        let d = doc(
            vec![package("a", 1), b1, package("b", 2)],
            vec![CudfConstraint::exact("a", 1)],
        );
        let outcome = run(&d, Strategy::MinimalAddition).await;
        assert_eq!(
            outcome,
            CudfOutcome::Solution(vec![("a".to_string(), 1), ("b".to_string(), 1)])
        );
    }

    #[tokio::test]
    async fn test_minimal_addition_prefers_installed() {
        let mut b1 = package("b", 1);
        b1.installed = true;
        let mut a = package("a", 1);
        a.depends = vec![vec![
            CudfConstraint::exact("b", 1),
            CudfConstraint::exact("b", 2),
        ]];

        let d = doc(
            vec![a, b1, package("b", 2)],
            vec![CudfConstraint::exact("a", 1)],
        );
        let outcome = run(&d, Strategy::MinimalAddition).await;
        assert_eq!(
            outcome,
            CudfOutcome::Solution(vec![("a".to_string(), 1), ("b".to_string(), 1)])
        );
    }

    #[tokio::test]
    async fn test_process_backend_launch_failure() {
        let backend = ProcessBackend::new("/definitely/not/here/keel-solve");
        let d = doc(vec![package("a", 1)], vec![CudfConstraint::exact("a", 1)]);
        let err = backend
            .solve(&d, Strategy::Trendy, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SolveError::SolverProcess(_)));
    }
}
