//! Bridge between the engine and an LP solving backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use deabook_solver::{LpProblem, Solution, SolutionStatus, Solver};
use thiserror::Error;

use crate::error::DeaError;

/// Faults raised by a backend itself, as opposed to mathematical outcomes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("{0}")]
    Internal(String),
    #[error("solve timed out after {0:?}")]
    Timeout(Duration),
    #[error("solver thread terminated without a result")]
    Disconnected,
    #[error("{0} solver threads are still running; not starting another")]
    Saturated(usize),
}

/// Any LP solving capability the engine can drive.
///
/// Backends are shared across worker threads; implementations holding state
/// must synchronize internally.
pub trait SolverBackend: Send + Sync {
    /// Identity reported in run metadata
    fn name(&self) -> &str;

    fn solve(&self, problem: &LpProblem) -> Result<Solution, BackendError>;
}

impl SolverBackend for Solver {
    fn name(&self) -> &str {
        "simplex"
    }

    fn solve(&self, problem: &LpProblem) -> Result<Solution, BackendError> {
        Ok(Solver::solve(self, problem))
    }
}

/// Numeric thresholds applied to solver output
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Values within this distance of an integer are snapped to it
    pub value_epsilon: f64,
    /// Scores within this distance of the frontier value count as exactly efficient
    pub efficiency_epsilon: f64,
    /// Intensities above this threshold make a unit a peer
    pub peer_epsilon: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            value_epsilon: 1e-9,
            efficiency_epsilon: 1e-6,
            peer_epsilon: 1e-6,
        }
    }
}

impl Tolerance {
    pub fn snap(&self, value: f64) -> f64 {
        let rounded = value.round();
        if (value - rounded).abs() < self.value_epsilon {
            rounded + 0.0
        } else {
            value
        }
    }

    /// Snap a score onto the frontier value when it is within `efficiency_epsilon`
    pub fn snap_score(&self, score: f64, frontier: f64) -> f64 {
        if (score - frontier).abs() < self.efficiency_epsilon {
            frontier
        } else {
            score
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    NumericalError,
}

/// Normalized backend answer for one LP
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub objective: f64,
    pub primal: Vec<f64>,
    /// One dual value per constraint; empty unless optimal
    pub duals: Vec<f64>,
    pub iterations: usize,
    pub elapsed: Duration,
    /// Backend explanation for a `NumericalError`
    pub message: Option<String>,
}

/// Default cap on solver threads alive at once under a timeout
pub const DEFAULT_THREAD_LIMIT: usize = 64;

/// Submits problems to the configured backend with an optional timeout.
///
/// With a timeout each solve runs on its own thread. A solve that times out is
/// abandoned but keeps its thread until the backend returns, so the number of
/// live solver threads is capped by `thread_limit`; past the cap new solves
/// fail with `BackendError::Saturated`. Clones share the count.
#[derive(Clone)]
pub struct SolverAdapter {
    backend: Option<Arc<dyn SolverBackend>>,
    tolerance: Tolerance,
    timeout: Option<Duration>,
    thread_limit: usize,
    live_threads: Arc<AtomicUsize>,
}

impl SolverAdapter {
    pub fn new(backend: Option<Arc<dyn SolverBackend>>, tolerance: Tolerance, timeout: Option<Duration>) -> Self {
        Self {
            backend,
            tolerance,
            timeout,
            thread_limit: DEFAULT_THREAD_LIMIT,
            live_threads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_thread_limit(mut self, limit: usize) -> Self {
        self.thread_limit = limit;
        self
    }

    /// Solver threads started under a timeout that have not returned yet
    pub fn live_threads(&self) -> usize {
        self.live_threads.load(Ordering::SeqCst)
    }

    pub fn backend_name(&self) -> Option<&str> {
        self.backend.as_deref().map(|b| b.name())
    }

    pub fn tolerance(&self) -> &Tolerance {
        &self.tolerance
    }

    /// Fail with `SolverUnavailable` when no backend is configured
    pub fn ensure_available(&self) -> Result<&dyn SolverBackend, DeaError> {
        self.backend.as_deref().ok_or(DeaError::SolverUnavailable)
    }

    /// Solve one problem.
    ///
    /// Infeasible and unbounded problems are returned as outcomes; only backend
    /// faults and timeouts become `SolverFailure`.
    pub fn solve(&self, problem: &LpProblem) -> Result<SolveOutcome, DeaError> {
        let backend = self.backend.as_ref().ok_or(DeaError::SolverUnavailable)?;
        let started = Instant::now();

        let raw = match self.timeout {
            Some(timeout) => self.solve_with_timeout(Arc::clone(backend), problem, timeout),
            None => backend.solve(problem),
        };
        let elapsed = started.elapsed();

        let solution = raw.map_err(|e| {
            tracing::warn!(problem = %problem.name, error = %e, "backend fault");
            DeaError::SolverFailure {
                dmu: problem.name.clone(),
                reason: e.to_string(),
            }
        })?;

        tracing::trace!(
            problem = %problem.name,
            status = ?solution.status,
            iterations = solution.iterations,
            elapsed_us = elapsed.as_micros() as u64,
            "solved"
        );

        Ok(self.normalize(solution, elapsed))
    }

    fn normalize(&self, solution: Solution, elapsed: Duration) -> SolveOutcome {
        let status = match solution.status {
            SolutionStatus::Optimal => SolveStatus::Optimal,
            SolutionStatus::Infeasible => SolveStatus::Infeasible,
            SolutionStatus::Unbounded => SolveStatus::Unbounded,
            SolutionStatus::Error => SolveStatus::NumericalError,
        };

        if status != SolveStatus::Optimal {
            return SolveOutcome {
                status,
                objective: solution.objective_value,
                primal: Vec::new(),
                duals: Vec::new(),
                iterations: solution.iterations,
                elapsed,
                message: solution.message,
            };
        }

        let duals = solution.duals();
        let finite = solution.objective_value.is_finite()
            && solution.values.iter().all(|v| v.is_finite())
            && duals.iter().all(|v| v.is_finite());
        if !finite {
            return SolveOutcome {
                status: SolveStatus::NumericalError,
                objective: f64::NAN,
                primal: Vec::new(),
                duals: Vec::new(),
                iterations: solution.iterations,
                elapsed,
                message: Some("non-finite values in the optimal solution".to_string()),
            };
        }

        SolveOutcome {
            status,
            objective: self.tolerance.snap(solution.objective_value),
            primal: solution.values.iter().map(|&v| self.tolerance.snap(v)).collect(),
            duals: duals.iter().map(|&v| self.tolerance.snap(v)).collect(),
            iterations: solution.iterations,
            elapsed,
            message: None,
        }
    }

    /// Run the solve on a helper thread and stop waiting after `timeout`.
    /// A timed-out solve keeps running detached; its result is dropped.
    fn solve_with_timeout(
        &self,
        backend: Arc<dyn SolverBackend>,
        problem: &LpProblem,
        timeout: Duration,
    ) -> Result<Solution, BackendError> {
        let live = self.live_threads.fetch_add(1, Ordering::SeqCst);
        let slot = LiveThread(Arc::clone(&self.live_threads));
        if live >= self.thread_limit {
            return Err(BackendError::Saturated(live));
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        let owned = problem.clone();

        // Unit ids are not valid thread names in general (interior NULs)
        thread::Builder::new()
            .name("deabook-solve".to_string())
            .spawn(move || {
                let result = backend.solve(&owned);
                drop(slot);
                let _ = tx.send(result);
            })
            .map_err(|e| BackendError::Internal(format!("could not spawn solver thread: {e}")))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(problem = %problem.name, ?timeout, "solve abandoned after timeout");
                Err(BackendError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(BackendError::Disconnected),
        }
    }
}

/// Holds one slot of the live solver thread count until dropped
struct LiveThread(Arc<AtomicUsize>);

impl Drop for LiveThread {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
