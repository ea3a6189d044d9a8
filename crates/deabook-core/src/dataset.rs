use std::collections::HashSet;

use crate::error::DeaError;

/// A decision-making unit: one row of the input/output matrices
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Dmu {
    pub id: String,
    pub inputs: Vec<f64>,
    pub outputs: Vec<f64>,
    /// Undesirable (bad) outputs such as emissions; empty when none are modelled
    #[cfg_attr(feature = "serde", serde(default))]
    pub undesirables: Vec<f64>,
}

impl Dmu {
    pub fn new(id: impl Into<String>, inputs: Vec<f64>, outputs: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            inputs,
            outputs,
            undesirables: Vec::new(),
        }
    }

    pub fn with_undesirables(mut self, undesirables: Vec<f64>) -> Self {
        self.undesirables = undesirables;
        self
    }
}

/// Validated set of units sharing the same input and output dimensions.
///
/// Once constructed the dataset is read-only, which is what lets the engine
/// share it across worker threads without locking.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    input_names: Vec<String>,
    output_names: Vec<String>,
    undesirable_names: Vec<String>,
    dmus: Vec<Dmu>,
}

impl Dataset {
    pub fn new(input_names: Vec<String>, output_names: Vec<String>, dmus: Vec<Dmu>) -> Result<Self, DeaError> {
        Self::with_undesirables(input_names, output_names, Vec::new(), dmus)
    }

    /// Dataset whose units also carry undesirable outputs, one per name in
    /// `undesirable_names`. Undesirable values may all be zero.
    pub fn with_undesirables(
        input_names: Vec<String>,
        output_names: Vec<String>,
        undesirable_names: Vec<String>,
        dmus: Vec<Dmu>,
    ) -> Result<Self, DeaError> {
        if dmus.is_empty() {
            return Err(DeaError::InvalidDataset("dataset has no units".to_string()));
        }
        if input_names.is_empty() {
            return Err(DeaError::InvalidDataset("at least one input is required".to_string()));
        }
        if output_names.is_empty() {
            return Err(DeaError::InvalidDataset("at least one output is required".to_string()));
        }

        let mut seen = HashSet::new();
        for dmu in &dmus {
            if !seen.insert(dmu.id.as_str()) {
                return Err(DeaError::InvalidDataset(format!("duplicate unit id '{}'", dmu.id)));
            }
            if dmu.inputs.len() != input_names.len() {
                return Err(DeaError::InvalidDataset(format!(
                    "unit '{}' has {} inputs, expected {}",
                    dmu.id,
                    dmu.inputs.len(),
                    input_names.len()
                )));
            }
            if dmu.outputs.len() != output_names.len() {
                return Err(DeaError::InvalidDataset(format!(
                    "unit '{}' has {} outputs, expected {}",
                    dmu.id,
                    dmu.outputs.len(),
                    output_names.len()
                )));
            }
            if dmu.undesirables.len() != undesirable_names.len() {
                return Err(DeaError::InvalidDataset(format!(
                    "unit '{}' has {} undesirable outputs, expected {}",
                    dmu.id,
                    dmu.undesirables.len(),
                    undesirable_names.len()
                )));
            }
            check_values(&dmu.id, "input", &dmu.inputs, &input_names)?;
            check_values(&dmu.id, "output", &dmu.outputs, &output_names)?;
            check_finite(&dmu.id, "undesirable output", &dmu.undesirables, &undesirable_names)?;
        }

        Ok(Self {
            input_names,
            output_names,
            undesirable_names,
            dmus,
        })
    }

    /// Build a dataset from bare matrices, naming dimensions `x1..` and `y1..`
    pub fn from_rows(ids: Vec<String>, inputs: Vec<Vec<f64>>, outputs: Vec<Vec<f64>>) -> Result<Self, DeaError> {
        if ids.len() != inputs.len() || ids.len() != outputs.len() {
            return Err(DeaError::InvalidDataset(format!(
                "{} ids but {} input rows and {} output rows",
                ids.len(),
                inputs.len(),
                outputs.len()
            )));
        }
        let m = inputs.first().map(Vec::len).unwrap_or(0);
        let s = outputs.first().map(Vec::len).unwrap_or(0);
        let input_names = (1..=m).map(|i| format!("x{i}")).collect();
        let output_names = (1..=s).map(|r| format!("y{r}")).collect();
        let dmus = ids
            .into_iter()
            .zip(inputs)
            .zip(outputs)
            .map(|((id, x), y)| Dmu::new(id, x, y))
            .collect();
        Self::new(input_names, output_names, dmus)
    }

    pub fn len(&self) -> usize {
        self.dmus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dmus.is_empty()
    }

    pub fn num_inputs(&self) -> usize {
        self.input_names.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.output_names.len()
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    pub fn num_undesirables(&self) -> usize {
        self.undesirable_names.len()
    }

    pub fn undesirable_names(&self) -> &[String] {
        &self.undesirable_names
    }

    pub fn dmus(&self) -> &[Dmu] {
        &self.dmus
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.dmus.iter().map(|d| d.id.as_str())
    }
}

fn check_finite(id: &str, kind: &str, values: &[f64], names: &[String]) -> Result<(), DeaError> {
    for (value, name) in values.iter().zip(names) {
        if !value.is_finite() || *value < 0.0 {
            return Err(DeaError::InvalidDataset(format!(
                "unit '{id}' has invalid {kind} {name} = {value}; values must be finite and non-negative"
            )));
        }
    }
    Ok(())
}

fn check_values(id: &str, kind: &str, values: &[f64], names: &[String]) -> Result<(), DeaError> {
    check_finite(id, kind, values, names)?;
    if !values.iter().any(|v| *v > 0.0) {
        return Err(DeaError::InvalidDataset(format!(
            "unit '{id}' needs at least one strictly positive {kind}"
        )));
    }
    Ok(())
}
