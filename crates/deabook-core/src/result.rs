//! Per-unit results, the validated results table and run-level report.

use std::collections::HashMap;
use std::time::Duration;

use crate::adapter::Tolerance;
use crate::dataset::Dataset;
use crate::engine::UnitStage;
use crate::error::DeaError;
use crate::model::ModelSpec;

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    /// Finite optimum
    Optimal,
    /// Super-efficiency LP infeasible: no peer combination dominates the unit
    SuperEfficientUnbounded,
    /// LP unbounded: no finite score
    Unbounded,
}

/// A unit in the reference set together with its intensity
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Peer {
    pub dmu: String,
    pub weight: f64,
}

/// One value per input, output and undesirable output
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionValues {
    pub inputs: Vec<f64>,
    pub outputs: Vec<f64>,
    pub undesirables: Vec<f64>,
}

impl DimensionValues {
    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            inputs: self.inputs.into_iter().map(&f).collect(),
            outputs: self.outputs.into_iter().map(&f).collect(),
            undesirables: self.undesirables.into_iter().map(&f).collect(),
        }
    }
}

/// Interpreted result for one unit. Never modified after creation.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyResult {
    dmu: String,
    status: ResultStatus,
    score: Option<f64>,
    efficient: bool,
    peers: Vec<Peer>,
    slacks: DimensionValues,
    multipliers: DimensionValues,
}

impl EfficiencyResult {
    pub(crate) fn optimal(
        dmu: String,
        score: f64,
        efficient: bool,
        peers: Vec<Peer>,
        slacks: DimensionValues,
        multipliers: DimensionValues,
    ) -> Self {
        Self {
            dmu,
            status: ResultStatus::Optimal,
            score: Some(score),
            efficient,
            peers,
            slacks,
            multipliers,
        }
    }

    /// Result without a finite score; `super_efficient` marks the unit as lying beyond every peer
    pub(crate) fn without_score(dmu: String, status: ResultStatus, super_efficient: bool) -> Self {
        Self {
            dmu,
            status,
            score: None,
            efficient: super_efficient,
            peers: Vec::new(),
            slacks: DimensionValues::default(),
            multipliers: DimensionValues::default(),
        }
    }

    pub fn dmu(&self) -> &str {
        &self.dmu
    }

    pub fn status(&self) -> ResultStatus {
        self.status
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn is_efficient(&self) -> bool {
        self.efficient
    }

    /// Peers with non-negligible intensity, in dataset order
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn slacks(&self) -> &DimensionValues {
        &self.slacks
    }

    pub fn input_slacks(&self) -> &[f64] {
        &self.slacks.inputs
    }

    pub fn output_slacks(&self) -> &[f64] {
        &self.slacks.outputs
    }

    /// Room left on each undesirable output; always 0 under weak disposability
    pub fn undesirable_slacks(&self) -> &[f64] {
        &self.slacks.undesirables
    }

    /// Magnitudes of the dual values of each dimension row (multiplier-form weights)
    pub fn multipliers(&self) -> &DimensionValues {
        &self.multipliers
    }

    pub fn input_multipliers(&self) -> &[f64] {
        &self.multipliers.inputs
    }

    pub fn output_multipliers(&self) -> &[f64] {
        &self.multipliers.outputs
    }

    pub fn undesirable_multipliers(&self) -> &[f64] {
        &self.multipliers.undesirables
    }
}

/// A unit that could not be evaluated
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFailure {
    pub dmu: String,
    /// Last stage reached before the failure
    pub stage: UnitStage,
    pub error: DeaError,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "outcome", rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Solved(EfficiencyResult),
    Failed(UnitFailure),
    Cancelled { dmu: String },
}

impl UnitOutcome {
    pub fn dmu(&self) -> &str {
        match self {
            UnitOutcome::Solved(result) => result.dmu(),
            UnitOutcome::Failed(failure) => &failure.dmu,
            UnitOutcome::Cancelled { dmu } => dmu,
        }
    }

    pub fn result(&self) -> Option<&EfficiencyResult> {
        match self {
            UnitOutcome::Solved(result) => Some(result),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&UnitFailure> {
        match self {
            UnitOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, UnitOutcome::Cancelled { .. })
    }
}

/// One outcome per dataset unit, in dataset order
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    entries: Vec<UnitOutcome>,
    #[cfg_attr(feature = "serde", serde(skip))]
    index: HashMap<String, usize>,
}

impl ResultTable {
    /// Check that `entries` lines up one-to-one with the dataset's units
    pub fn new(dataset: &Dataset, entries: Vec<UnitOutcome>) -> Result<Self, DeaError> {
        if entries.len() != dataset.len() {
            return Err(DeaError::InconsistentResults(format!(
                "{} entries for {} units",
                entries.len(),
                dataset.len()
            )));
        }

        let mut index = HashMap::with_capacity(entries.len());
        for (position, (entry, id)) in entries.iter().zip(dataset.ids()).enumerate() {
            if index.insert(entry.dmu().to_string(), position).is_some() {
                return Err(DeaError::InconsistentResults(format!(
                    "duplicate entry for unit '{}'",
                    entry.dmu()
                )));
            }
            if entry.dmu() != id {
                return Err(DeaError::InconsistentResults(format!(
                    "entry {position} is for unit '{}' but the dataset has '{id}' there",
                    entry.dmu()
                )));
            }
        }

        Ok(Self { entries, index })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[UnitOutcome] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.entries.iter()
    }

    pub fn get(&self, dmu: &str) -> Option<&UnitOutcome> {
        self.index.get(dmu).map(|&i| &self.entries[i])
    }

    /// Score of a unit, if it was solved to a finite optimum
    pub fn score(&self, dmu: &str) -> Option<f64> {
        self.get(dmu).and_then(UnitOutcome::result).and_then(EfficiencyResult::score)
    }

    pub fn results(&self) -> impl Iterator<Item = &EfficiencyResult> {
        self.entries.iter().filter_map(UnitOutcome::result)
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitFailure> {
        self.entries.iter().filter_map(UnitOutcome::failure)
    }

    pub fn cancelled_units(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter(|e| e.is_cancelled()).map(UnitOutcome::dmu)
    }

    /// Aggregate statistics, computed fresh from the entries
    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            total: self.entries.len(),
            ..Summary::default()
        };
        let mut scores = Vec::new();

        for entry in &self.entries {
            match entry {
                UnitOutcome::Solved(result) => {
                    match result.status() {
                        ResultStatus::Optimal => summary.solved += 1,
                        ResultStatus::SuperEfficientUnbounded | ResultStatus::Unbounded => summary.unbounded += 1,
                    }
                    if result.is_efficient() {
                        summary.efficient += 1;
                    }
                    scores.extend(result.score());
                }
                UnitOutcome::Failed(_) => summary.failed += 1,
                UnitOutcome::Cancelled { .. } => summary.cancelled += 1,
            }
        }

        if !scores.is_empty() {
            summary.mean_score = Some(scores.iter().sum::<f64>() / scores.len() as f64);
            summary.min_score = scores.iter().copied().reduce(f64::min);
            summary.max_score = scores.iter().copied().reduce(f64::max);
        }
        summary
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub total: usize,
    /// Units with a finite optimal score
    pub solved: usize,
    pub efficient: usize,
    /// Units with no finite score (unbounded or super-efficient beyond every peer)
    pub unbounded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub mean_score: Option<f64>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetadata {
    pub model: ModelSpec,
    pub backend: String,
    pub tolerance: Tolerance,
    pub solve_timeout: Option<Duration>,
    pub threads: usize,
    pub elapsed: Duration,
}

/// Everything a reporting collaborator needs from one run
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub table: ResultTable,
    pub metadata: RunMetadata,
    /// Set when the run stopped before every unit was evaluated
    pub cancelled: bool,
}

impl RunReport {
    pub fn summary(&self) -> Summary {
        self.table.summary()
    }
}
