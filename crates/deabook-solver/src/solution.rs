/// The result of solving an LP problem
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Optimal values for each variable
    pub values: Vec<f64>,
    /// Optimal objective value
    pub objective_value: f64,
    /// Dual information at the optimum
    pub analysis: Analysis,
    /// Number of simplex pivots performed over both phases
    pub iterations: usize,
    /// Why the solver gave up, for `SolutionStatus::Error`
    pub message: Option<String>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// The problem is unbounded
    Unbounded,
    /// Solver gave up (iteration limit or numerical breakdown)
    Error,
}

/// Dual information of the optimal solution
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// Shadow prices (dual values), one per constraint in problem order.
    /// The rate at which the optimal objective changes per unit increase of the RHS.
    pub shadow_prices: Vec<ShadowPrice>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowPrice {
    /// Constraint name
    pub constraint: String,
    /// Shadow price value
    pub value: f64,
}

impl Solution {
    pub fn infeasible(iterations: usize) -> Self {
        Self {
            status: SolutionStatus::Infeasible,
            values: Vec::new(),
            objective_value: f64::INFINITY,
            analysis: Analysis::empty(),
            iterations,
            message: None,
        }
    }

    pub fn unbounded(iterations: usize) -> Self {
        Self {
            status: SolutionStatus::Unbounded,
            values: Vec::new(),
            objective_value: f64::NEG_INFINITY,
            analysis: Analysis::empty(),
            iterations,
            message: None,
        }
    }

    pub fn error(iterations: usize, message: impl Into<String>) -> Self {
        Self {
            status: SolutionStatus::Error,
            values: Vec::new(),
            objective_value: f64::NAN,
            analysis: Analysis::empty(),
            iterations,
            message: Some(message.into()),
        }
    }

    /// Dual values in constraint order
    pub fn duals(&self) -> Vec<f64> {
        self.analysis.shadow_prices.iter().map(|sp| sp.value).collect()
    }
}

impl Analysis {
    pub fn empty() -> Self {
        Self {
            shadow_prices: Vec::new(),
        }
    }
}
