use thiserror::Error;

use crate::model::{Formulation, Orientation, ReturnsToScale};

/// Errors raised while configuring, building or running an analysis.
///
/// `UnsupportedModel`, `InvalidDirection`, `InvalidDataset` and `SolverUnavailable`
/// abort a run before any unit is dispatched. `ModelInfeasible` and
/// `SolverFailure` are recorded against a single unit and never stop the batch.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeaError {
    #[error("Unsupported model: {formulation} formulation with {orientation} orientation under {rts}")]
    UnsupportedModel {
        formulation: Formulation,
        orientation: Orientation,
        rts: ReturnsToScale,
    },
    #[error("Invalid direction vector: {0}")]
    InvalidDirection(String),
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),
    #[error("Model infeasible for unit {dmu}: its own input/output bundle should always be attainable")]
    ModelInfeasible { dmu: String },
    #[error("No solver backend configured")]
    SolverUnavailable,
    #[error("Solver failure on unit {dmu}: {reason}")]
    SolverFailure { dmu: String, reason: String },
    #[error("Inconsistent results table: {0}")]
    InconsistentResults(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_model_message() {
        let err = DeaError::UnsupportedModel {
            formulation: Formulation::Additive,
            orientation: Orientation::NonOriented,
            rts: ReturnsToScale::Variable,
        };
        assert_eq!(
            err.to_string(),
            "Unsupported model: additive formulation with non-oriented orientation under VRS"
        );
    }
}
