use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use deabook_solver::Solver;

use crate::adapter::{DEFAULT_THREAD_LIMIT, SolverAdapter, SolverBackend, Tolerance};

/// Settings for one engine instance.
///
/// Passed explicitly so that concurrent runs may use different backends and
/// tolerances.
#[derive(Clone)]
pub struct EngineConfig {
    pub tolerance: Tolerance,
    /// Upper bound on a single unit's solve; `None` waits indefinitely
    pub solve_timeout: Option<Duration>,
    /// Worker threads; 0 uses one per core
    pub threads: usize,
    /// Cap on solver threads alive at once when `solve_timeout` is set,
    /// including solves abandoned after a timeout
    pub solver_thread_limit: usize,
    pub backend: Option<Arc<dyn SolverBackend>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            solve_timeout: None,
            threads: 0,
            solver_thread_limit: DEFAULT_THREAD_LIMIT,
            backend: Some(Arc::new(Solver::new())),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: impl SolverBackend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    pub fn without_backend(mut self) -> Self {
        self.backend = None;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.solve_timeout = Some(timeout);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_solver_thread_limit(mut self, limit: usize) -> Self {
        self.solver_thread_limit = limit;
        self
    }

    pub fn adapter(&self) -> SolverAdapter {
        SolverAdapter::new(self.backend.clone(), self.tolerance, self.solve_timeout)
            .with_thread_limit(self.solver_thread_limit)
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("tolerance", &self.tolerance)
            .field("solve_timeout", &self.solve_timeout)
            .field("threads", &self.threads)
            .field("solver_thread_limit", &self.solver_thread_limit)
            .field("backend", &self.backend.as_deref().map(|b| b.name()))
            .finish()
    }
}
