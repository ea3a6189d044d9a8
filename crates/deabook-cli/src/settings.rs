use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use deabook_core::{EngineConfig, Tolerance};
use deabook_solver::Solver;
use serde::Deserialize;

/// Optional JSON settings file. Every field may be omitted; command-line flags
/// win over the file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub tolerance: Tolerance,
    pub timeout_ms: Option<u64>,
    pub threads: Option<usize>,
    /// Most solver threads left running after timeouts before further solves are refused
    pub solver_thread_limit: Option<usize>,
    pub solver: SolverSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverSettings {
    pub max_iterations: Option<usize>,
    pub pivot_tolerance: Option<f64>,
    pub feasibility_tolerance: Option<f64>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("Error reading settings {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    pub fn solver(&self) -> Solver {
        let mut solver = Solver::new();
        if let Some(max) = self.solver.max_iterations {
            solver = solver.with_max_iterations(max);
        }
        if let Some(tol) = self.solver.pivot_tolerance {
            solver = solver.with_tolerance(tol);
        }
        if let Some(tol) = self.solver.feasibility_tolerance {
            solver = solver.with_feasibility_tolerance(tol);
        }
        solver
    }

    /// Engine configuration with `timeout_ms` and `threads` overridden when given
    pub fn engine_config(&self, timeout_ms: Option<u64>, threads: Option<usize>) -> EngineConfig {
        let mut config = EngineConfig::new()
            .with_backend(self.solver())
            .with_tolerance(self.tolerance)
            .with_threads(threads.or(self.threads).unwrap_or(0));
        if let Some(ms) = timeout_ms.or(self.timeout_ms) {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        if let Some(limit) = self.solver_thread_limit {
            config = config.with_solver_thread_limit(limit);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deabook_core::DEFAULT_THREAD_LIMIT;

    #[test]
    fn test_empty_settings_are_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());

        let config = settings.engine_config(None, None);
        assert_eq!(config.threads, 0);
        assert!(config.solve_timeout.is_none());
        assert_eq!(config.tolerance, Tolerance::default());
        assert_eq!(config.solver_thread_limit, DEFAULT_THREAD_LIMIT);
    }

    #[test]
    fn test_flags_override_file() {
        let settings: Settings = serde_json::from_str(
            r#"{ "timeout_ms": 500, "threads": 4, "tolerance": { "efficiency_epsilon": 1e-4 } }"#,
        )
        .unwrap();
        assert_eq!(settings.tolerance.efficiency_epsilon, 1e-4);
        assert_eq!(settings.tolerance.value_epsilon, Tolerance::default().value_epsilon);

        let config = settings.engine_config(Some(100), None);
        assert_eq!(config.solver_thread_limit, DEFAULT_THREAD_LIMIT);
        assert_eq!(config.solve_timeout, Some(Duration::from_millis(100)));
        assert_eq!(config.threads, 4);
    }

    #[test]
    fn test_solver_settings() {
        let settings: Settings =
            serde_json::from_str(r#"{ "solver": { "max_iterations": 10, "pivot_tolerance": 1e-8 } }"#).unwrap();
        let solver = settings.solver();
        assert_eq!(solver.max_iterations(), 10);
        assert_eq!(solver.tolerance(), 1e-8);
    }

    #[test]
    fn test_solver_thread_limit() {
        let settings: Settings = serde_json::from_str(r#"{ "solver_thread_limit": 4 }"#).unwrap();
        assert_eq!(settings.engine_config(Some(50), None).solver_thread_limit, 4);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_json::from_str::<Settings>(r#"{ "thread": 2 }"#).is_err());
    }
}
