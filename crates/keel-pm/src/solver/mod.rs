//! Solver driver and two-phase orchestration.
//!
//! The driver expands requirements into the candidate universe, encodes it
//! as a CUDF problem, hands the problem to a backend, and decodes the
//! verdict. [`Solver::solve`] runs the whole pipeline: the runtime
//! dependencies are solved first with the upgrade-friendly strategy, then
//! every development dependency is solved separately against the frozen
//! runtime closure so the development closures can neither disturb it nor
//! conflict with each other.

mod backend;
pub mod checker;
mod explanation;


use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::try_join_all;
use futures_util::stream::{self, StreamExt};

use keel_version::{Semver, Version};

use crate::config::SolverConfig;
use crate::cudf::{CudfConstraint, CudfDocument, CudfRequest};
use crate::error::{Result, SolveError};
use crate::package::{Package, PackageSet, Req, Resolutions};
use crate::resolver::Resolver;
use crate::solution::Solution;
use crate::universe::Universe;

pub use backend::{CudfBackend, CudfOutcome, InternalBackend, ProcessBackend};
pub use explanation::{DepChain, Explanation, Reason};

/// Name of the synthetic root package added to the universe for the
/// duration of one solve. No registry accepts this name, so it cannot
/// collide with a real package.
pub(crate) const ROOT_NAME: &str = "keel.solve.root";

/// How many requirements are resolved concurrently during expansion.
const RESOLVE_CONCURRENCY: usize = 8;

/// Optimisation criterion handed to the CUDF solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Runtime phase: keep installed packages, prefer up-to-date versions,
    /// bring in as few new names as possible.
    Trendy,
    /// Development phase: prefer leaving the installed set exactly as it
    /// is, adding only what the new requirement forces.
    MinimalAddition,
}

impl Strategy {
    pub fn criterion(self) -> &'static str {
        match self {
            Strategy::Trendy => "-removed,-notuptodate,-new",
            Strategy::MinimalAddition => "-removed,-changed,-notuptodate",
        }
    }
}

/// The dependency solver.
///
/// Holds the candidate universe, which only ever grows; all configuration
/// is passed in at construction and never changes afterwards.
pub struct Solver {
    config: SolverConfig,
    resolutions: Resolutions,
    resolver: Arc<dyn Resolver>,
    backend: Arc<dyn CudfBackend>,
    universe: Universe,
    /// Requirements already expanded, keyed by display text.
    expanded: HashSet<String>,
}

impl Solver {
    /// Create a solver using the external CUDF solver from `config`.
    /// Fails right away when the executable is missing.
    pub fn new(
        config: SolverConfig,
        resolver: Arc<dyn Resolver>,
        resolutions: Resolutions,
    ) -> Result<Solver> {
        config.validate()?;
        let backend = Arc::new(ProcessBackend::new(config.solve_cmd.clone()));
        Ok(Solver::with_backend(config, resolver, resolutions, backend))
    }

    /// Create a solver with an explicit backend. The CUDF document is the
    /// contract; any backend deciding it will do.
    pub fn with_backend(
        config: SolverConfig,
        resolver: Arc<dyn Resolver>,
        resolutions: Resolutions,
        backend: Arc<dyn CudfBackend>,
    ) -> Solver {
        Solver {
            config,
            resolutions,
            resolver,
            backend,
            universe: Universe::new(),
            expanded: HashSet::new(),
        }
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Expand requirements into the universe.
    ///
    /// Applies the resolution overrides, resolves every requirement to its
    /// candidates, materialises each candidate's manifest, and recurses on
    /// the candidates' runtime dependencies (build and development
    /// dependencies of transitive packages are not expanded). Dependency
    /// lists are rewritten through the overrides before a package enters
    /// the universe.
    ///
    /// Returns the overridden requirement list. Candidates of distinct
    /// requirements are fetched concurrently; a requirement is never
    /// resolved twice.
    pub async fn add(&mut self, deps: &[Req]) -> Result<Vec<Req>> {
        let deps = self.resolutions.rewrite(deps);

        let mut frontier: Vec<Req> = Vec::new();
        for req in &deps {
            if self.expanded.insert(req.to_string()) {
                frontier.push(req.clone());
            }
        }

        while !frontier.is_empty() {
            log::debug!("expanding {} requirement(s)", frontier.len());

            let batch: Vec<Req> = frontier.drain(..).collect();
            let fetched: Vec<Result<Vec<Package>>> = stream::iter(batch.into_iter().map(|req| {
                let resolver = self.resolver.clone();
                async move { fetch_candidates(resolver.as_ref(), &req).await }
            }))
            .buffer_unordered(RESOLVE_CONCURRENCY)
            .collect()
            .await;

            // Insertions are serialised; only resolution runs concurrently.
            for result in fetched {
                for mut package in result? {
                    if self.universe.mem(&package.name, &package.version) {
                        continue;
                    }
                    package.dependencies = self.resolutions.rewrite(&package.dependencies);
                    for dep in &package.dependencies {
                        if self.expanded.insert(dep.to_string()) {
                            frontier.push(dep.clone());
                        }
                    }
                    self.universe.add(package);
                }
            }
        }

        Ok(deps)
    }

    /// One atomic solve: install `deps` on top of `installed`.
    ///
    /// Builds a synthetic root over `deps` plus exact pins for `installed`,
    /// encodes the universe, asks the backend, and decodes the verdict. On
    /// an unsatisfiable verdict the diagnostic walk and the explanation
    /// engine turn the encoded problem into an [`Explanation`], returned as
    /// [`SolveError::Unsatisfiable`].
    pub async fn solve_dependencies(
        &self,
        deps: &[Req],
        installed: &PackageSet,
        strategy: Strategy,
    ) -> Result<PackageSet> {
        let mut root_deps = deps.to_vec();
        for package in installed.values() {
            let pin = Req::from_parts(package.name.clone(), &format!("={}", package.version))
                .map_err(|err| {
                    SolveError::InconsistentState(format!(
                        "installed package {} has an unpinnable version: {}",
                        package, err
                    ))
                })?;
            root_deps.push(pin);
        }

        let mut universe = self.universe.clone();
        let root = universe.add(
            Package::new(ROOT_NAME, Version::Semver(Semver::new(0, 0, 0)))
                .with_dependencies(root_deps),
        );

        let (packages, mapping) = universe.to_cudf(installed);
        let (root_cudf_name, root_cudf_version) = {
            let (name, version) = mapping.encode(&root.id()).ok_or_else(|| {
                SolveError::InconsistentState("synthetic root missing from encoding".to_string())
            })?;
            (name.to_string(), version)
        };

        let doc = CudfDocument {
            packages,
            request: CudfRequest {
                install: vec![CudfConstraint::exact(
                    root_cudf_name.clone(),
                    root_cudf_version,
                )],
            },
        };

        log::debug!(
            "solving {} requirement(s) over {} package(s), strategy {}",
            deps.len(),
            doc.packages.len() - 1,
            strategy.criterion()
        );

        match self.backend.solve(&doc, strategy, self.config.timeout).await? {
            CudfOutcome::Solution(chosen) => {
                let mut solution = PackageSet::new();
                for (name, version) in chosen {
                    let package = mapping.decode(&name, version).ok_or_else(|| {
                        SolveError::InconsistentState(format!(
                            "solver chose a package outside the universe: {} = {}",
                            name, version
                        ))
                    })?;
                    if package.name == ROOT_NAME {
                        continue;
                    }
                    solution.insert(package.id(), package.clone());
                }
                log::info!("solved {} requirement(s): {} package(s)", deps.len(), solution.len());
                Ok(solution)
            }
            CudfOutcome::Unsat => {
                log::debug!("unsatisfiable; reconstructing an explanation");
                let root_id = (root_cudf_name, root_cudf_version);
                let diagnostics = checker::diagnose(&doc, &root_id);
                let explanation =
                    explanation::explain(&diagnostics, &mapping, self.resolver.as_ref()).await?;
                Err(SolveError::Unsatisfiable(explanation))
            }
        }
    }

    /// Solve a root manifest in two phases.
    ///
    /// The runtime dependencies form one closure; every development
    /// dependency is then solved on its own against that closure, so two
    /// development dependencies can never conflict with each other. The
    /// returned tree has one flat child per runtime package and one subtree
    /// per development dependency holding its private additions.
    pub async fn solve(&mut self, root: &Package) -> Result<Solution> {
        log::info!("solving {}", root);
        let runtime_reqs = self.add(&root.dependencies).await?;
        let dev_reqs = self.add(&root.dev_dependencies).await?;

        let runtime = self
            .solve_dependencies(&runtime_reqs, &PackageSet::new(), Strategy::Trendy)
            .await?;

        let this = &*self;
        let runtime_ref = &runtime;
        let dev_children: Vec<Solution> = try_join_all(dev_reqs.iter().map(|req| async move {
            let set = this
                .solve_dependencies(std::slice::from_ref(req), runtime_ref, Strategy::MinimalAddition)
                .await?;

            let dev_root = set
                .values()
                .find(|p| p.name == req.name())
                .cloned()
                .ok_or_else(|| {
                    SolveError::InconsistentState(format!(
                        "development dependency {} is missing from its own solution",
                        req
                    ))
                })?;

            let private: Vec<Solution> = set
                .values()
                .filter(|p| p.id() != dev_root.id() && !runtime_ref.contains_key(&p.id()))
                .map(|p| Solution::leaf(p.clone()))
                .collect();

            Ok::<Solution, SolveError>(Solution::new(dev_root, private))
        }))
        .await?;

        let mut children: Vec<Solution> = runtime
            .values()
            .map(|p| Solution::leaf(p.clone()))
            .collect();
        children.extend(dev_children);

        Ok(Solution::new(Arc::new(root.clone()), children))
    }
}

async fn fetch_candidates(resolver: &dyn Resolver, req: &Req) -> Result<Vec<Package>> {
    let resolutions = resolver.resolve(req).await.map_err(|source| SolveError::Resolver {
        req: req.to_string(),
        source,
    })?;

    let mut packages = Vec::with_capacity(resolutions.len());
    for resolution in &resolutions {
        let package = resolver
            .package(resolution)
            .await
            .map_err(|source| SolveError::Resolver {
                req: req.to_string(),
                source,
            })?;
        packages.push(package);
    }
    Ok(packages)
}
