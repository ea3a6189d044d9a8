use crate::problem::{ConstraintOp, LpProblem};
use crate::solution::{Analysis, ShadowPrice, Solution, SolutionStatus};

/// Dense two-phase simplex solver for linear programming problems.
///
/// Pivoting follows Bland's rule (lowest eligible index for both the entering
/// and the leaving variable). DEA problems are heavily degenerate, and Bland's
/// rule cannot cycle on them.
#[derive(Debug, Clone)]
pub struct Solver {
    /// Maximum pivots (over both phases) before giving up
    max_iterations: usize,
    /// Tolerance for pivot eligibility and reduced costs
    tolerance: f64,
    /// Largest residual artificial value still accepted as feasible
    feasibility_tolerance: f64,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            max_iterations: 50_000,
            tolerance: 1e-9,
            feasibility_tolerance: 1e-7,
        }
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_feasibility_tolerance(mut self, tol: f64) -> Self {
        self.feasibility_tolerance = tol;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Solve the LP problem using the two-phase simplex method
    pub fn solve(&self, problem: &LpProblem) -> Solution {
        if let Err(e) = problem.validate() {
            return Solution::error(0, e.to_string());
        }

        let mut tableau = self.build_tableau(problem);
        let mut iterations = 0;

        // Phase 1: Find initial basic feasible solution
        if tableau.n_artificial > 0 {
            match self.phase1(&mut tableau, &mut iterations) {
                SimplexResult::Optimal => {}
                SimplexResult::Unbounded | SimplexResult::Infeasible => {
                    return Solution::infeasible(iterations);
                }
                SimplexResult::IterationLimit => return self.iteration_limit(iterations),
            }
        }

        // Phase 2: Optimize
        match self.phase2(&mut tableau, &mut iterations) {
            SimplexResult::Optimal => {}
            SimplexResult::Unbounded => return Solution::unbounded(iterations),
            SimplexResult::Infeasible => return Solution::infeasible(iterations),
            SimplexResult::IterationLimit => return self.iteration_limit(iterations),
        }

        self.extract_solution(&tableau, problem, iterations)
    }

    fn iteration_limit(&self, iterations: usize) -> Solution {
        Solution::error(
            iterations,
            format!("iteration limit of {} reached", self.max_iterations),
        )
    }

    fn build_tableau(&self, problem: &LpProblem) -> Tableau {
        let n_vars = problem.num_variables();
        let n_constraints = problem.num_constraints();

        // Rows are rewritten so the RHS is non-negative. A `>= 0` row is negated
        // into `<= 0` so it starts with a feasible slack instead of an artificial.
        let normalized: Vec<(f64, ConstraintOp)> = problem
            .constraints
            .iter()
            .map(|c| {
                if c.rhs < 0.0 || (c.rhs == 0.0 && c.op == ConstraintOp::Ge) {
                    (-1.0, c.op.flipped())
                } else {
                    (1.0, c.op)
                }
            })
            .collect();

        // Count slack and artificial variables needed
        let mut n_slack = 0;
        let mut n_artificial = 0;
        for (_, op) in &normalized {
            match op {
                ConstraintOp::Le => n_slack += 1,
                ConstraintOp::Ge => {
                    n_slack += 1; // surplus
                    n_artificial += 1;
                }
                ConstraintOp::Eq => n_artificial += 1,
            }
        }

        let total_cols = n_vars + n_slack + n_artificial + 1; // +1 for RHS
        let total_rows = n_constraints + 1; // +1 for objective

        let mut tableau = Tableau {
            data: vec![vec![0.0; total_cols]; total_rows],
            basic_vars: vec![0; n_constraints],
            n_vars,
            n_slack,
            n_artificial,
            unit_cols: vec![0; n_constraints],
            row_signs: normalized.iter().map(|(sign, _)| *sign).collect(),
        };

        let mut slack_idx = n_vars;
        let mut artificial_idx = n_vars + n_slack;

        for (i, (c, &(sign, op))) in problem.constraints.iter().zip(&normalized).enumerate() {
            for (j, &coef) in c.coefficients.iter().enumerate() {
                tableau.data[i][j] = sign * coef;
            }
            tableau.data[i][total_cols - 1] = (sign * c.rhs).max(0.0);

            match op {
                ConstraintOp::Le => {
                    tableau.data[i][slack_idx] = 1.0;
                    tableau.basic_vars[i] = slack_idx;
                    tableau.unit_cols[i] = slack_idx;
                    slack_idx += 1;
                }
                ConstraintOp::Ge => {
                    tableau.data[i][slack_idx] = -1.0; // surplus
                    slack_idx += 1;
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    tableau.unit_cols[i] = artificial_idx;
                    artificial_idx += 1;
                }
                ConstraintOp::Eq => {
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    tableau.unit_cols[i] = artificial_idx;
                    artificial_idx += 1;
                }
            }
        }

        // Objective row (last row). The simplex maximizes, so a minimization
        // objective is stored negated.
        let obj_row = n_constraints;
        for (j, &coef) in problem.objective.coefficients.iter().enumerate() {
            tableau.data[obj_row][j] = if problem.objective.minimize { -coef } else { coef };
        }

        tableau
    }

    fn phase1(&self, tableau: &mut Tableau, iterations: &mut usize) -> SimplexResult {
        let n_constraints = tableau.data.len() - 1;
        let n_cols = tableau.data[0].len();
        let art_start = tableau.art_start();

        let orig_obj = tableau.data[n_constraints].clone();

        // Phase 1 objective: maximize -sum(artificials)
        for j in 0..n_cols {
            tableau.data[n_constraints][j] = 0.0;
        }
        for j in art_start..(art_start + tableau.n_artificial) {
            tableau.data[n_constraints][j] = -1.0;
        }

        // Price out the basic artificials
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start {
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] += tableau.data[i][j];
                }
            }
        }

        match self.iterate(tableau, n_cols - 1, iterations) {
            SimplexResult::Optimal => {}
            // Phase 1 is bounded above by zero
            SimplexResult::Unbounded | SimplexResult::Infeasible => return SimplexResult::Infeasible,
            SimplexResult::IterationLimit => return SimplexResult::IterationLimit,
        }

        let rhs_col = n_cols - 1;
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start && tableau.data[i][rhs_col].abs() > self.feasibility_tolerance {
                return SimplexResult::Infeasible;
            }
        }

        self.drive_out_artificials(tableau);

        // Restore original objective and price out the basic variables
        tableau.data[n_constraints] = orig_obj;
        for i in 0..n_constraints {
            let basic = tableau.basic_vars[i];
            let ratio = tableau.data[n_constraints][basic];
            if ratio.abs() > self.tolerance {
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] -= ratio * tableau.data[i][j];
                }
            }
        }

        SimplexResult::Optimal
    }

    /// Pivot zero-level artificials out of the basis so phase 2 cannot move them.
    /// Rows with no eligible column are redundant and keep their artificial at zero.
    fn drive_out_artificials(&self, tableau: &mut Tableau) {
        let n_constraints = tableau.data.len() - 1;
        let rhs_col = tableau.data[0].len() - 1;
        let art_start = tableau.art_start();

        for i in 0..n_constraints {
            if tableau.basic_vars[i] < art_start {
                continue;
            }
            let replacement = (0..art_start).find(|&j| tableau.data[i][j].abs() > self.tolerance);
            if let Some(col) = replacement {
                tableau.data[i][rhs_col] = 0.0;
                self.pivot(tableau, i, col);
            }
        }
    }

    fn phase2(&self, tableau: &mut Tableau, iterations: &mut usize) -> SimplexResult {
        // Artificial columns never re-enter
        let limit = tableau.art_start();
        self.iterate(tableau, limit, iterations)
    }

    fn iterate(&self, tableau: &mut Tableau, col_limit: usize, iterations: &mut usize) -> SimplexResult {
        loop {
            let Some(pivot_col) = self.find_pivot_column(tableau, col_limit) else {
                return SimplexResult::Optimal;
            };
            let Some(pivot_row) = self.find_pivot_row(tableau, pivot_col) else {
                return SimplexResult::Unbounded;
            };
            if *iterations >= self.max_iterations {
                return SimplexResult::IterationLimit;
            }
            self.pivot(tableau, pivot_row, pivot_col);
            *iterations += 1;
        }
    }

    fn find_pivot_column(&self, tableau: &Tableau, col_limit: usize) -> Option<usize> {
        let obj_row = tableau.data.len() - 1;
        // Bland: first column whose reduced cost improves the objective
        (0..col_limit).find(|&j| tableau.data[obj_row][j] > self.tolerance)
    }

    fn find_pivot_row(&self, tableau: &Tableau, col: usize) -> Option<usize> {
        let n_constraints = tableau.data.len() - 1;
        let rhs_col = tableau.data[0].len() - 1;

        let mut best: Option<(f64, usize)> = None;

        for i in 0..n_constraints {
            let val = tableau.data[i][col];
            if val <= self.tolerance {
                continue;
            }
            let ratio = tableau.data[i][rhs_col].max(0.0) / val;
            best = match best {
                None => Some((ratio, i)),
                Some((min_ratio, row)) => {
                    if ratio < min_ratio - self.tolerance {
                        Some((ratio, i))
                    } else if (ratio - min_ratio).abs() <= self.tolerance
                        && tableau.basic_vars[i] < tableau.basic_vars[row]
                    {
                        // Bland tie-break on the leaving variable index
                        Some((min_ratio.min(ratio), i))
                    } else {
                        Some((min_ratio, row))
                    }
                }
            };
        }

        best.map(|(_, row)| row)
    }

    fn pivot(&self, tableau: &mut Tableau, row: usize, col: usize) {
        let n_rows = tableau.data.len();
        let n_cols = tableau.data[0].len();

        tableau.basic_vars[row] = col;

        let pivot_val = tableau.data[row][col];
        for j in 0..n_cols {
            tableau.data[row][j] /= pivot_val;
        }

        let pivot_row = tableau.data[row].clone();
        for i in 0..n_rows {
            if i == row {
                continue;
            }
            let factor = tableau.data[i][col];
            if factor == 0.0 {
                continue;
            }
            for (cell, &p) in tableau.data[i].iter_mut().zip(&pivot_row) {
                *cell -= factor * p;
            }
        }
    }

    fn extract_solution(&self, tableau: &Tableau, problem: &LpProblem, iterations: usize) -> Solution {
        let n_vars = problem.num_variables();
        let n_constraints = problem.num_constraints();
        let rhs_col = tableau.data[0].len() - 1;

        let mut values = vec![0.0; n_vars];
        for i in 0..n_constraints {
            let basic = tableau.basic_vars[i];
            if basic < n_vars {
                values[basic] = tableau.data[i][rhs_col];
            }
        }

        let objective_value: f64 = values
            .iter()
            .zip(&problem.objective.coefficients)
            .map(|(v, c)| v * c)
            .sum();

        if !objective_value.is_finite() || values.iter().any(|v| !v.is_finite()) {
            return Solution::error(iterations, "non-finite values in the optimal basis");
        }

        let analysis = self.analyze(tableau, problem);

        Solution {
            status: SolutionStatus::Optimal,
            values,
            objective_value,
            analysis,
            iterations,
            message: None,
        }
    }

    fn analyze(&self, tableau: &Tableau, problem: &LpProblem) -> Analysis {
        let obj_row = tableau.data.len() - 1;
        let minimize = problem.objective.minimize;

        // The objective row entry of a row's identity column is minus the dual of
        // the normalized row in the internal maximization. Undo the row sign and,
        // for minimization, the negated objective.
        let shadow_prices = problem
            .constraints
            .iter()
            .enumerate()
            .map(|(i, constraint)| {
                let reduced = tableau.data[obj_row][tableau.unit_cols[i]];
                let internal = -reduced * tableau.row_signs[i];
                let value = if minimize { -internal } else { internal };
                ShadowPrice {
                    constraint: constraint.name.clone(),
                    value: value + 0.0,
                }
            })
            .collect();

        Analysis { shadow_prices }
    }
}

struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    n_vars: usize,
    n_slack: usize,
    n_artificial: usize,
    /// Column that formed the identity block for each row at construction
    unit_cols: Vec<usize>,
    /// -1.0 where the row was negated during normalization
    row_signs: Vec<f64>,
}

impl Tableau {
    fn art_start(&self) -> usize {
        self.n_vars + self.n_slack
    }
}

enum SimplexResult {
    Optimal,
    Unbounded,
    Infeasible,
    IterationLimit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::LpProblem;

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_simple_maximization() {
        // Maximize: 3x + 2y
        // Subject to:
        //   x + y <= 4
        //   x <= 3
        //   y <= 3
        // Optimal: x=3, y=1, obj=11
        let mut problem = LpProblem::new(vars(&["x", "y"]));
        problem.set_objective(vec![3.0, 2.0], false);
        problem.add_constraint("sum", vec![1.0, 1.0], ConstraintOp::Le, 4.0);
        problem.add_constraint("x_max", vec![1.0, 0.0], ConstraintOp::Le, 3.0);
        problem.add_constraint("y_max", vec![0.0, 1.0], ConstraintOp::Le, 3.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.values[0] - 3.0).abs() < 1e-6, "x = {} (expected 3)", solution.values[0]);
        assert!((solution.values[1] - 1.0).abs() < 1e-6, "y = {} (expected 1)", solution.values[1]);
        assert!((solution.objective_value - 11.0).abs() < 1e-6, "obj = {} (expected 11)", solution.objective_value);

        let duals = solution.duals();
        assert!((duals[0] - 2.0).abs() < 1e-6, "sum dual = {}", duals[0]);
        assert!((duals[1] - 1.0).abs() < 1e-6, "x_max dual = {}", duals[1]);
        assert!(duals[2].abs() < 1e-6, "y_max dual = {}", duals[2]);
    }

    #[test]
    fn test_minimization_with_ge() {
        // Minimize: 2x + 3y
        // Subject to:
        //   x + y >= 4
        //   x <= 3
        //   y <= 3
        // Optimal: x=3, y=1, obj=9
        let mut problem = LpProblem::new(vars(&["x", "y"]));
        problem.set_objective(vec![2.0, 3.0], true);
        problem.add_constraint("sum", vec![1.0, 1.0], ConstraintOp::Ge, 4.0);
        problem.add_constraint("x_max", vec![1.0, 0.0], ConstraintOp::Le, 3.0);
        problem.add_constraint("y_max", vec![0.0, 1.0], ConstraintOp::Le, 3.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.values[0] - 3.0).abs() < 1e-6, "x = {} (expected 3)", solution.values[0]);
        assert!((solution.values[1] - 1.0).abs() < 1e-6, "y = {} (expected 1)", solution.values[1]);
        assert!((solution.objective_value - 9.0).abs() < 1e-6, "obj = {} (expected 9)", solution.objective_value);

        // One more unit of demand costs 3 (filled by y); one more unit of x capacity saves 1
        let duals = solution.duals();
        assert!((duals[0] - 3.0).abs() < 1e-6, "sum dual = {}", duals[0]);
        assert!((duals[1] + 1.0).abs() < 1e-6, "x_max dual = {}", duals[1]);
    }

    #[test]
    fn test_infeasible() {
        // x >= 5
        // x <= 3
        let mut problem = LpProblem::new(vars(&["x"]));
        problem.set_objective(vec![1.0], true);
        problem.add_constraint("lower", vec![1.0], ConstraintOp::Ge, 5.0);
        problem.add_constraint("upper", vec![1.0], ConstraintOp::Le, 3.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Infeasible);
    }

    #[test]
    fn test_unbounded() {
        // Maximize x subject to x - y <= 1
        let mut problem = LpProblem::new(vars(&["x", "y"]));
        problem.set_objective(vec![1.0, 0.0], false);
        problem.add_constraint("gap", vec![1.0, -1.0], ConstraintOp::Le, 1.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Unbounded);
    }

    #[test]
    fn test_negative_rhs() {
        // Minimize y subject to x - y <= -1
        let mut problem = LpProblem::new(vars(&["x", "y"]));
        problem.set_objective(vec![0.0, 1.0], true);
        problem.add_constraint("gap", vec![1.0, -1.0], ConstraintOp::Le, -1.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.objective_value - 1.0).abs() < 1e-9);
        assert!((solution.duals()[0] + 1.0).abs() < 1e-9, "dual = {}", solution.duals()[0]);
    }

    #[test]
    fn test_equality_constraint() {
        // Minimize x + 2y subject to x + y = 3, y >= 1
        let mut problem = LpProblem::new(vars(&["x", "y"]));
        problem.set_objective(vec![1.0, 2.0], true);
        problem.add_constraint("total", vec![1.0, 1.0], ConstraintOp::Eq, 3.0);
        problem.add_constraint("y_min", vec![0.0, 1.0], ConstraintOp::Ge, 1.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.values[0] - 2.0).abs() < 1e-9);
        assert!((solution.values[1] - 1.0).abs() < 1e-9);
        assert!((solution.objective_value - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_envelopment_problem() {
        // min theta
        //   2 l1 + 3 l2 + 5 l3 - 5 theta <= 0
        //   l1 + l2 + l3 >= 1
        let mut problem = LpProblem::new(vars(&["theta", "l1", "l2", "l3"]));
        problem.set_objective(vec![1.0, 0.0, 0.0, 0.0], true);
        problem.add_constraint("input", vec![-5.0, 2.0, 3.0, 5.0], ConstraintOp::Le, 0.0);
        problem.add_constraint("output", vec![0.0, 1.0, 1.0, 1.0], ConstraintOp::Ge, 1.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.objective_value - 0.4).abs() < 1e-9, "theta = {}", solution.objective_value);
        assert!((solution.values[1] - 1.0).abs() < 1e-9);

        // Multiplier form: v = 0.2 on the input, u = 0.4 on the output
        let duals = solution.duals();
        assert!((duals[0] + 0.2).abs() < 1e-9, "input dual = {}", duals[0]);
        assert!((duals[1] - 0.4).abs() < 1e-9, "output dual = {}", duals[1]);
    }

    #[test]
    fn test_iteration_limit_reports_error() {
        let mut problem = LpProblem::new(vars(&["x", "y"]));
        problem.set_objective(vec![3.0, 2.0], false);
        problem.add_constraint("sum", vec![1.0, 1.0], ConstraintOp::Le, 4.0);
        problem.add_constraint("x_max", vec![1.0, 0.0], ConstraintOp::Le, 3.0);

        let solution = Solver::new().with_max_iterations(0).solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Error);
        assert_eq!(solution.message.as_deref(), Some("iteration limit of 0 reached"));
    }

    #[test]
    fn test_malformed_problem_reports_error() {
        let mut problem = LpProblem::new(vars(&["x"]));
        problem.set_objective(vec![1.0, 1.0], true);

        let solution = Solver::new().solve(&problem);
        assert_eq!(solution.status, SolutionStatus::Error);
        assert_eq!(
            solution.message.as_deref(),
            Some("Objective has 2 coefficients but problem has 1 variables")
        );
    }
}
