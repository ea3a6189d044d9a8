use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::dataset::Dmu;

/// Family of LP formulations
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Formulation {
    /// Envelopment form with a radial factor (CCR under CRS, BCC under VRS)
    Radial,
    /// Slack-maximizing model without a radial factor
    Additive,
    /// Radial model with the evaluated unit removed from its own peer set
    SuperEfficiency,
    /// Directional distance function along (g_x, g_y)
    Directional,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Contract inputs at fixed outputs
    Input,
    /// Expand outputs at fixed inputs
    Output,
    /// Neither side is held fixed
    NonOriented,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnsToScale {
    /// No restriction on the intensity sum
    Constant,
    /// Intensities sum to one
    Variable,
    /// Intensities sum to at most one
    NonIncreasing,
    /// Intensities sum to at least one
    NonDecreasing,
}

/// Direction vector for the directional distance function
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Direction {
    /// g = (x_o, y_o): the evaluated unit's own bundle
    #[default]
    Observed,
    /// g = (1, .., 1)
    Unit,
    /// Explicit vectors, one entry per input, output and undesirable output
    Custom {
        inputs: Vec<f64>,
        outputs: Vec<f64>,
        #[cfg_attr(feature = "serde", serde(default))]
        undesirables: Vec<f64>,
    },
}

/// Direction components resolved for one unit
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionVector {
    pub inputs: Vec<f64>,
    pub outputs: Vec<f64>,
    pub undesirables: Vec<f64>,
}

impl Direction {
    pub fn custom(inputs: Vec<f64>, outputs: Vec<f64>) -> Self {
        Direction::Custom {
            inputs,
            outputs,
            undesirables: Vec::new(),
        }
    }

    /// Resolve the direction for one unit's bundle
    pub fn resolve(&self, dmu: &Dmu) -> DirectionVector {
        match self {
            Direction::Observed => DirectionVector {
                inputs: dmu.inputs.clone(),
                outputs: dmu.outputs.clone(),
                undesirables: dmu.undesirables.clone(),
            },
            Direction::Unit => DirectionVector {
                inputs: vec![1.0; dmu.inputs.len()],
                outputs: vec![1.0; dmu.outputs.len()],
                undesirables: vec![1.0; dmu.undesirables.len()],
            },
            Direction::Custom {
                inputs,
                outputs,
                undesirables,
            } => DirectionVector {
                inputs: inputs.clone(),
                outputs: outputs.clone(),
                undesirables: undesirables.clone(),
            },
        }
    }
}

/// How undesirable outputs may be disposed of in the directional model
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Disposability {
    /// Bad outputs can only be reduced together with good outputs (equality row)
    #[default]
    Weak,
    /// Bad outputs can be reduced freely (inequality row)
    Strong,
}

/// Immutable selection of the DEA model used for a whole run
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    formulation: Formulation,
    orientation: Orientation,
    rts: ReturnsToScale,
    #[cfg_attr(feature = "serde", serde(default))]
    direction: Direction,
    #[cfg_attr(feature = "serde", serde(default))]
    disposability: Disposability,
}

impl ModelSpec {
    pub fn new(formulation: Formulation, orientation: Orientation, rts: ReturnsToScale) -> Self {
        Self {
            formulation,
            orientation,
            rts,
            direction: Direction::default(),
            disposability: Disposability::default(),
        }
    }

    /// Radial model under constant returns to scale
    pub fn ccr(orientation: Orientation) -> Self {
        Self::new(Formulation::Radial, orientation, ReturnsToScale::Constant)
    }

    /// Radial model under variable returns to scale
    pub fn bcc(orientation: Orientation) -> Self {
        Self::new(Formulation::Radial, orientation, ReturnsToScale::Variable)
    }

    pub fn additive(orientation: Orientation, rts: ReturnsToScale) -> Self {
        Self::new(Formulation::Additive, orientation, rts)
    }

    pub fn super_efficiency(orientation: Orientation, rts: ReturnsToScale) -> Self {
        Self::new(Formulation::SuperEfficiency, orientation, rts)
    }

    pub fn directional(rts: ReturnsToScale, direction: Direction) -> Self {
        Self::new(Formulation::Directional, Orientation::NonOriented, rts).with_direction(direction)
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_disposability(mut self, disposability: Disposability) -> Self {
        self.disposability = disposability;
        self
    }

    pub fn formulation(&self) -> Formulation {
        self.formulation
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn rts(&self) -> ReturnsToScale {
        self.rts
    }

    pub fn direction(&self) -> &Direction {
        &self.direction
    }

    pub fn disposability(&self) -> Disposability {
        self.disposability
    }

    /// Whether the evaluated unit is left out of its own peer set
    pub fn excludes_target(&self) -> bool {
        self.formulation == Formulation::SuperEfficiency
    }

    /// Whether the score is a radial factor (followed by a max-slack stage)
    pub fn is_radial(&self) -> bool {
        matches!(self.formulation, Formulation::Radial | Formulation::SuperEfficiency)
    }

    /// Score of a unit on the frontier: 1 for radial factors, 0 for slack and step models
    pub fn efficient_score(&self) -> f64 {
        if self.is_radial() { 1.0 } else { 0.0 }
    }

    /// Classify an (already snapped) score.
    ///
    /// Super-efficiency scores beyond the frontier value (above 1 input-oriented,
    /// below 1 output-oriented) also count as efficient.
    pub fn is_efficient(&self, score: f64) -> bool {
        let benchmark = self.efficient_score();
        match (self.formulation, self.orientation) {
            (Formulation::SuperEfficiency, Orientation::Output) => score <= benchmark,
            (Formulation::SuperEfficiency, _) => score >= benchmark,
            _ => score == benchmark,
        }
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let family = match (self.formulation, self.rts) {
            (Formulation::Radial, ReturnsToScale::Constant) => "CCR".to_string(),
            (Formulation::Radial, ReturnsToScale::Variable) => "BCC".to_string(),
            (formulation, rts) => format!("{formulation} {rts}"),
        };
        match self.orientation {
            Orientation::NonOriented => write!(f, "{family}"),
            orientation => write!(f, "{family} {orientation}-oriented"),
        }
    }
}

impl fmt::Display for Formulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Formulation::Radial => "radial",
            Formulation::Additive => "additive",
            Formulation::SuperEfficiency => "super-efficiency",
            Formulation::Directional => "directional",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Orientation::Input => "input",
            Orientation::Output => "output",
            Orientation::NonOriented => "non-oriented",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Disposability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposability::Weak => f.write_str("weak"),
            Disposability::Strong => f.write_str("strong"),
        }
    }
}

impl fmt::Display for ReturnsToScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReturnsToScale::Constant => "CRS",
            ReturnsToScale::Variable => "VRS",
            ReturnsToScale::NonIncreasing => "NIRS",
            ReturnsToScale::NonDecreasing => "NDRS",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseModelError {
    #[error("Unknown formulation '{0}' (expected radial, additive, super or ddf)")]
    Formulation(String),
    #[error("Unknown orientation '{0}' (expected input, output or none)")]
    Orientation(String),
    #[error("Unknown returns to scale '{0}' (expected crs, vrs, nirs or ndrs)")]
    ReturnsToScale(String),
    #[error("Unknown disposability '{0}' (expected weak or strong)")]
    Disposability(String),
}

impl FromStr for Formulation {
    type Err = ParseModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "radial" => Ok(Formulation::Radial),
            "additive" | "add" => Ok(Formulation::Additive),
            "super" | "super-efficiency" | "superefficiency" => Ok(Formulation::SuperEfficiency),
            "ddf" | "directional" => Ok(Formulation::Directional),
            _ => Err(ParseModelError::Formulation(s.to_string())),
        }
    }
}

impl FromStr for Orientation {
    type Err = ParseModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "input" | "in" | "io" => Ok(Orientation::Input),
            "output" | "out" | "oo" => Ok(Orientation::Output),
            "none" | "non-oriented" | "nonoriented" => Ok(Orientation::NonOriented),
            _ => Err(ParseModelError::Orientation(s.to_string())),
        }
    }
}

impl FromStr for ReturnsToScale {
    type Err = ParseModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "crs" | "constant" => Ok(ReturnsToScale::Constant),
            "vrs" | "variable" => Ok(ReturnsToScale::Variable),
            "nirs" | "non-increasing" => Ok(ReturnsToScale::NonIncreasing),
            "ndrs" | "non-decreasing" => Ok(ReturnsToScale::NonDecreasing),
            _ => Err(ParseModelError::ReturnsToScale(s.to_string())),
        }
    }
}

impl FromStr for Disposability {
    type Err = ParseModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "weak" => Ok(Disposability::Weak),
            "strong" | "free" => Ok(Disposability::Strong),
            _ => Err(ParseModelError::Disposability(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names() {
        assert_eq!(ModelSpec::ccr(Orientation::Input).to_string(), "CCR input-oriented");
        assert_eq!(ModelSpec::bcc(Orientation::Output).to_string(), "BCC output-oriented");
        assert_eq!(
            ModelSpec::super_efficiency(Orientation::Input, ReturnsToScale::Constant).to_string(),
            "super-efficiency CRS input-oriented"
        );
        assert_eq!(
            ModelSpec::directional(ReturnsToScale::Variable, Direction::Unit).to_string(),
            "directional VRS"
        );
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("ddf".parse::<Formulation>(), Ok(Formulation::Directional));
        assert_eq!("Super".parse::<Formulation>(), Ok(Formulation::SuperEfficiency));
        assert_eq!("io".parse::<Orientation>(), Ok(Orientation::Input));
        assert_eq!("nirs".parse::<ReturnsToScale>(), Ok(ReturnsToScale::NonIncreasing));
        assert_eq!("strong".parse::<Disposability>(), Ok(Disposability::Strong));
        assert!("partial".parse::<Disposability>().is_err());
        assert_eq!(
            "sideways".parse::<Orientation>(),
            Err(ParseModelError::Orientation("sideways".to_string()))
        );
    }

    #[test]
    fn test_efficiency_classification() {
        let ccr = ModelSpec::ccr(Orientation::Input);
        assert!(ccr.is_efficient(1.0));
        assert!(!ccr.is_efficient(0.9));

        let super_in = ModelSpec::super_efficiency(Orientation::Input, ReturnsToScale::Constant);
        assert!(super_in.is_efficient(1.5));
        assert!(!super_in.is_efficient(0.7));

        let super_out = ModelSpec::super_efficiency(Orientation::Output, ReturnsToScale::Constant);
        assert!(super_out.is_efficient(0.8));
        assert!(!super_out.is_efficient(1.2));

        let additive = ModelSpec::additive(Orientation::Input, ReturnsToScale::Variable);
        assert_eq!(additive.efficient_score(), 0.0);
        assert!(additive.is_efficient(0.0));
    }

    #[test]
    fn test_direction_resolve() {
        let dmu = Dmu::new("a", vec![2.0, 3.0], vec![1.0]).with_undesirables(vec![4.0]);

        let g = Direction::Observed.resolve(&dmu);
        assert_eq!(g.inputs, vec![2.0, 3.0]);
        assert_eq!(g.outputs, vec![1.0]);
        assert_eq!(g.undesirables, vec![4.0]);

        let g = Direction::Unit.resolve(&dmu);
        assert_eq!(g.inputs, vec![1.0, 1.0]);
        assert_eq!(g.outputs, vec![1.0]);
        assert_eq!(g.undesirables, vec![1.0]);

        let g = Direction::custom(vec![1.0, 0.0], vec![2.0]).resolve(&dmu);
        assert_eq!(g.inputs, vec![1.0, 0.0]);
        assert!(g.undesirables.is_empty());
    }

    #[test]
    fn test_disposability_defaults_to_weak() {
        let spec = ModelSpec::directional(ReturnsToScale::Constant, Direction::Observed);
        assert_eq!(spec.disposability(), Disposability::Weak);
        let spec = spec.with_disposability(Disposability::Strong);
        assert_eq!(spec.disposability(), Disposability::Strong);
        assert_eq!(spec.to_string(), "directional CRS");
    }
}
