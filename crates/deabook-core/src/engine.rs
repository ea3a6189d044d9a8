//! Runs one model over every unit of a dataset.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use crate::adapter::{SolveOutcome, SolveStatus, SolverAdapter, Tolerance};
use crate::builder::{self, DeaProblem};
use crate::config::EngineConfig;
use crate::dataset::Dataset;
use crate::error::DeaError;
use crate::model::ModelSpec;
use crate::registry;
use crate::result::{
    DimensionValues, EfficiencyResult, Peer, ResultStatus, ResultTable, RunMetadata, RunReport, UnitFailure,
    UnitOutcome,
};

/// Progress of a single unit.
///
/// `Pending → Built → Solved → Interpreted` on success,
/// `Pending → Built → SolveFailed` when the backend faults.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStage {
    Pending,
    Built,
    Solved,
    Interpreted,
    SolveFailed,
}

/// Shared flag for stopping a run early
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Engine {
    config: EngineConfig,
    /// Shared by every run so the cap on abandoned solver threads holds across runs
    adapter: SolverAdapter,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let adapter = config.adapter();
        Self { config, adapter }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run(&self, dataset: &Dataset, spec: &ModelSpec) -> Result<RunReport, DeaError> {
        self.run_with_cancel(dataset, spec, &CancelToken::new())
    }

    /// Evaluate every unit, keeping completed results if `cancel` fires midway.
    ///
    /// Run-level problems (unknown model, bad direction, no backend) are
    /// reported before any unit is dispatched. Unit-level failures are recorded
    /// in the table and never abort the run.
    pub fn run_with_cancel(
        &self,
        dataset: &Dataset,
        spec: &ModelSpec,
        cancel: &CancelToken,
    ) -> Result<RunReport, DeaError> {
        registry::validate(spec, dataset)?;
        let adapter = &self.adapter;
        let backend = adapter.ensure_available()?.name().to_string();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|e| DeaError::Runtime(format!("could not build worker pool: {e}")))?;

        let span = tracing::info_span!("dea_run", model = %spec, units = dataset.len(), backend = %backend);
        let _guard = span.enter();
        tracing::info!(threads = pool.current_num_threads(), "starting run");

        let started = Instant::now();
        let outcomes: Vec<UnitOutcome> = pool.install(|| {
            (0..dataset.len())
                .into_par_iter()
                .map(|index| evaluate_unit(dataset, spec, adapter, index, cancel))
                .collect()
        });
        let elapsed = started.elapsed();

        let table = ResultTable::new(dataset, outcomes)?;
        let cancelled = table.cancelled_units().next().is_some();
        let summary = table.summary();

        if cancelled {
            tracing::warn!(
                completed = summary.total - summary.cancelled,
                cancelled = summary.cancelled,
                "run cancelled before completion"
            );
        }
        for failure in table.failures() {
            tracing::warn!(dmu = %failure.dmu, stage = ?failure.stage, error = %failure.error, "unit failed");
        }
        tracing::info!(
            solved = summary.solved,
            efficient = summary.efficient,
            unbounded = summary.unbounded,
            failed = summary.failed,
            elapsed_ms = elapsed.as_millis() as u64,
            "run finished"
        );

        Ok(RunReport {
            table,
            metadata: RunMetadata {
                model: spec.clone(),
                backend,
                tolerance: self.config.tolerance,
                solve_timeout: self.config.solve_timeout,
                threads: pool.current_num_threads(),
                elapsed,
            },
            cancelled,
        })
    }
}

fn evaluate_unit(
    dataset: &Dataset,
    spec: &ModelSpec,
    adapter: &SolverAdapter,
    index: usize,
    cancel: &CancelToken,
) -> UnitOutcome {
    let dmu = dataset.dmus()[index].id.clone();
    if cancel.is_cancelled() {
        tracing::debug!(dmu = %dmu, "skipped after cancellation");
        return UnitOutcome::Cancelled { dmu };
    }

    let problem = match builder::build(dataset, spec, index) {
        Ok(problem) => problem,
        Err(error) => {
            return UnitOutcome::Failed(UnitFailure {
                dmu,
                stage: UnitStage::Pending,
                error,
            });
        }
    };
    tracing::trace!(dmu = %dmu, stage = ?UnitStage::Built, constraints = problem.lp.num_constraints());

    let outcome = match adapter.solve(&problem.lp) {
        Ok(outcome) => outcome,
        Err(error) => {
            tracing::trace!(dmu = %dmu, stage = ?UnitStage::SolveFailed);
            return UnitOutcome::Failed(UnitFailure {
                dmu,
                stage: UnitStage::SolveFailed,
                error,
            });
        }
    };
    tracing::trace!(dmu = %dmu, stage = ?UnitStage::Solved, status = ?outcome.status);

    let refined = match outcome.status {
        SolveStatus::Optimal if spec.is_radial() => max_slack(dataset, spec, adapter, &problem, &outcome),
        _ => None,
    };

    match interpret(dataset, spec, adapter.tolerance(), &problem, &outcome, refined.as_ref()) {
        Ok(result) => {
            tracing::debug!(dmu = %dmu, stage = ?UnitStage::Interpreted, score = ?result.score());
            UnitOutcome::Solved(result)
        }
        Err(error) => {
            if matches!(error, DeaError::ModelInfeasible { .. }) {
                tracing::error!(dmu = %dmu, "own-unit comparison infeasible");
            }
            UnitOutcome::Failed(UnitFailure {
                dmu,
                stage: UnitStage::Solved,
                error,
            })
        }
    }
}

/// Solve the max-slack stage for an optimal radial score.
///
/// Returns `None` when the stage does not reach an optimum; the single-stage
/// solution is used in that case.
fn max_slack(
    dataset: &Dataset,
    spec: &ModelSpec,
    adapter: &SolverAdapter,
    problem: &DeaProblem,
    outcome: &SolveOutcome,
) -> Option<(DeaProblem, SolveOutcome)> {
    let stage = problem.max_slack_stage(dataset, spec.rts(), outcome.objective);
    match adapter.solve(&stage.lp) {
        Ok(refined) if refined.status == SolveStatus::Optimal => Some((stage, refined)),
        Ok(refined) => {
            tracing::debug!(
                dmu = %stage.lp.name,
                status = ?refined.status,
                "max-slack stage not optimal, keeping first stage"
            );
            None
        }
        Err(error) => {
            tracing::debug!(dmu = %stage.lp.name, error = %error, "max-slack stage failed, keeping first stage");
            None
        }
    }
}

fn interpret(
    dataset: &Dataset,
    spec: &ModelSpec,
    tolerance: &Tolerance,
    problem: &DeaProblem,
    outcome: &SolveOutcome,
    refined: Option<&(DeaProblem, SolveOutcome)>,
) -> Result<EfficiencyResult, DeaError> {
    let dmu = problem.lp.name.clone();
    match outcome.status {
        SolveStatus::Optimal => {}
        SolveStatus::Infeasible if spec.excludes_target() => {
            return Ok(EfficiencyResult::without_score(dmu, ResultStatus::SuperEfficientUnbounded, true));
        }
        SolveStatus::Infeasible => return Err(DeaError::ModelInfeasible { dmu }),
        SolveStatus::Unbounded => {
            return Ok(EfficiencyResult::without_score(dmu, ResultStatus::Unbounded, false));
        }
        SolveStatus::NumericalError => {
            return Err(DeaError::SolverFailure {
                dmu,
                reason: outcome.message.clone().unwrap_or_else(|| "numerical error".to_string()),
            });
        }
    }

    let score = tolerance.snap_score(outcome.objective, spec.efficient_score());
    let dmus = dataset.dmus();
    let (reference, primal) = match refined {
        Some((stage, solved)) => (stage, &solved.primal),
        None => (problem, &outcome.primal),
    };

    let peers = reference
        .intensities(primal)
        .into_iter()
        .filter(|&(_, weight)| weight > tolerance.peer_epsilon)
        .map(|(j, weight)| Peer {
            dmu: dmus[j].id.clone(),
            weight,
        })
        .collect();

    let clean = |v: f64| {
        let v = tolerance.snap(v);
        if v.abs() < tolerance.value_epsilon { 0.0 } else { v.max(0.0) }
    };
    let slacks = reference.slacks(dataset, outcome.objective, primal).map(clean);
    let multipliers = |rows: &[Option<usize>]| -> Vec<f64> {
        rows.iter()
            .map(|row| row.and_then(|r| outcome.duals.get(r)).map_or(0.0, |d| d.abs()))
            .collect()
    };
    let layout = &problem.layout;

    Ok(EfficiencyResult::optimal(
        dmu,
        score,
        spec.is_efficient(score),
        peers,
        slacks,
        DimensionValues {
            inputs: multipliers(&layout.input_rows),
            outputs: multipliers(&layout.output_rows),
            undesirables: multipliers(&layout.undesirable_rows),
        },
    ))
}
