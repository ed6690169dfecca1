use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SolveError};

/// Configuration for the solving core.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Path to the external CUDF solver executable.
    pub solve_cmd: PathBuf,
    /// Timeout handed to the external solver per invocation.
    pub timeout: Duration,
}

impl SolverConfig {
    pub fn new(solve_cmd: impl Into<PathBuf>) -> SolverConfig {
        SolverConfig {
            solve_cmd: solve_cmd.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> SolverConfig {
        self.timeout = timeout;
        self
    }

    /// Check that the configured solver executable exists.
    pub(crate) fn validate(&self) -> Result<()> {
        if !self.solve_cmd.is_file() {
            return Err(SolveError::Config(format!(
                "solver executable not found: {}",
                self.solve_cmd.display()
            )));
        }
        Ok(())
    }
}
