//! Lookup table from model variant to LP construction rule.

use crate::builder::{self, DeaProblem};
use crate::dataset::Dataset;
use crate::error::DeaError;
use crate::model::{Direction, Formulation, ModelSpec, Orientation, ReturnsToScale};

/// Pure construction rule: (dataset, model, target index) -> LP
pub type BuildRule = fn(&Dataset, &ModelSpec, usize) -> DeaProblem;

struct Registration {
    formulation: Formulation,
    orientations: &'static [Orientation],
    rule: BuildRule,
}

const ORIENTED: &[Orientation] = &[Orientation::Input, Orientation::Output];

const ALL_RTS: &[ReturnsToScale] = &[
    ReturnsToScale::Constant,
    ReturnsToScale::Variable,
    ReturnsToScale::NonIncreasing,
    ReturnsToScale::NonDecreasing,
];

const REGISTRY: &[Registration] = &[
    Registration {
        formulation: Formulation::Radial,
        orientations: ORIENTED,
        rule: builder::radial,
    },
    Registration {
        formulation: Formulation::SuperEfficiency,
        orientations: ORIENTED,
        rule: builder::radial,
    },
    Registration {
        formulation: Formulation::Additive,
        orientations: ORIENTED,
        rule: builder::additive,
    },
    Registration {
        formulation: Formulation::Directional,
        orientations: &[Orientation::NonOriented],
        rule: builder::directional,
    },
];

/// Find the construction rule for a model, or fail with `UnsupportedModel`
pub fn resolve(spec: &ModelSpec) -> Result<BuildRule, DeaError> {
    REGISTRY
        .iter()
        .find(|r| r.formulation == spec.formulation() && r.orientations.contains(&spec.orientation()))
        .filter(|_| ALL_RTS.contains(&spec.rts()))
        .map(|r| r.rule)
        .ok_or(DeaError::UnsupportedModel {
            formulation: spec.formulation(),
            orientation: spec.orientation(),
            rts: spec.rts(),
        })
}

/// Resolve a model and check its parameters against the dataset shape
pub fn validate(spec: &ModelSpec, dataset: &Dataset) -> Result<BuildRule, DeaError> {
    let rule = resolve(spec)?;
    if spec.formulation() == Formulation::Directional {
        check_direction(spec.direction(), dataset)?;
    } else if dataset.num_undesirables() > 0 {
        return Err(DeaError::InvalidDataset(format!(
            "undesirable outputs are only supported by the directional model, not {spec}"
        )));
    }
    Ok(rule)
}

/// Every registered (formulation, orientation, returns-to-scale) triple
pub fn supported() -> Vec<(Formulation, Orientation, ReturnsToScale)> {
    let mut combos = Vec::new();
    for registration in REGISTRY {
        for &orientation in registration.orientations {
            for &rts in ALL_RTS {
                combos.push((registration.formulation, orientation, rts));
            }
        }
    }
    combos
}

fn check_direction(direction: &Direction, dataset: &Dataset) -> Result<(), DeaError> {
    let Direction::Custom {
        inputs,
        outputs,
        undesirables,
    } = direction
    else {
        return Ok(());
    };
    if inputs.len() != dataset.num_inputs()
        || outputs.len() != dataset.num_outputs()
        || undesirables.len() != dataset.num_undesirables()
    {
        return Err(DeaError::InvalidDirection(format!(
            "direction has {}/{}/{} input/output/undesirable entries, dataset has {}/{}/{}",
            inputs.len(),
            outputs.len(),
            undesirables.len(),
            dataset.num_inputs(),
            dataset.num_outputs(),
            dataset.num_undesirables()
        )));
    }
    let entries = || inputs.iter().chain(outputs).chain(undesirables);
    if entries().any(|g| !g.is_finite() || *g < 0.0) {
        return Err(DeaError::InvalidDirection(
            "entries must be finite and non-negative".to_string(),
        ));
    }
    if entries().all(|g| *g == 0.0) {
        return Err(DeaError::InvalidDirection("direction is the zero vector".to_string()));
    }
    Ok(())
}
