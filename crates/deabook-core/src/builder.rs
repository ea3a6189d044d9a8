//! Construction of one unit's envelopment LP.
//!
//! All rules are pure functions of (dataset, model, target index).
//!
//! Zero coordinates: the radial and super-efficiency rules skip an output row
//! when the target produces none of that output, and report zero slack for it.
//! Input rows are always kept, so a zero input bars peers that use it. The
//! additive and directional rules keep every dimension.
//!
//! Radial scores are followed by a max-slack stage ([`DeaProblem::max_slack_stage`])
//! that fixes the score and pushes the reference point onto the strongly
//! efficient part of the frontier.

use deabook_solver::{ConstraintOp, LpProblem};

use crate::dataset::Dataset;
use crate::error::DeaError;
use crate::model::{Disposability, ModelSpec, Orientation, ReturnsToScale};
use crate::registry;
use crate::result::DimensionValues;

/// LP for one unit plus the bookkeeping needed to read its solution back
#[derive(Debug, Clone, PartialEq)]
pub struct DeaProblem {
    /// Dataset index of the evaluated unit
    pub target: usize,
    pub lp: LpProblem,
    pub layout: VariableLayout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableLayout {
    /// (dataset index, LP column) of each peer intensity
    pub peers: Vec<(usize, usize)>,
    /// LP row of each input dimension; `None` when the dimension was skipped
    pub input_rows: Vec<Option<usize>>,
    pub output_rows: Vec<Option<usize>>,
    pub undesirable_rows: Vec<Option<usize>>,
    /// Frontier reference point of each input, as a function of the score
    pub input_targets: Vec<Option<Affine>>,
    pub output_targets: Vec<Option<Affine>>,
    pub undesirable_targets: Vec<Option<Affine>>,
}

/// `constant + per_score * score`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub constant: f64,
    pub per_score: f64,
}

impl Affine {
    fn fixed(constant: f64) -> Self {
        Self { constant, per_score: 0.0 }
    }

    fn scaled(per_score: f64) -> Self {
        Self { constant: 0.0, per_score }
    }

    pub fn at(&self, score: f64) -> f64 {
        self.constant + self.per_score * score
    }
}

/// Build the LP for `target` under `spec`
pub fn build(dataset: &Dataset, spec: &ModelSpec, target: usize) -> Result<DeaProblem, DeaError> {
    let rule = registry::validate(spec, dataset)?;
    if target >= dataset.len() {
        return Err(DeaError::InvalidDataset(format!(
            "unit index {target} out of range for {} units",
            dataset.len()
        )));
    }
    Ok(rule(dataset, spec, target))
}

impl DeaProblem {
    /// Intensity of every peer, in dataset order
    pub fn intensities(&self, primal: &[f64]) -> Vec<(usize, f64)> {
        self.layout
            .peers
            .iter()
            .map(|&(dmu, col)| (dmu, primal.get(col).copied().unwrap_or(0.0)))
            .collect()
    }

    /// Slacks left after the score adjustment, per dimension
    pub fn slacks(&self, dataset: &Dataset, score: f64, primal: &[f64]) -> DimensionValues {
        let intensities = self.intensities(primal);
        let dmus = dataset.dmus();
        let combined = |value: &dyn Fn(usize) -> f64| -> f64 { intensities.iter().map(|&(j, l)| l * value(j)).sum() };

        let inputs = self
            .layout
            .input_targets
            .iter()
            .enumerate()
            .map(|(i, target)| target.map_or(0.0, |point| point.at(score) - combined(&|j| dmus[j].inputs[i])))
            .collect();

        let outputs = self
            .layout
            .output_targets
            .iter()
            .enumerate()
            .map(|(r, target)| target.map_or(0.0, |point| combined(&|j| dmus[j].outputs[r]) - point.at(score)))
            .collect();

        let undesirables = self
            .layout
            .undesirable_targets
            .iter()
            .enumerate()
            .map(|(b, target)| target.map_or(0.0, |point| point.at(score) - combined(&|j| dmus[j].undesirables[b])))
            .collect();

        DimensionValues {
            inputs,
            outputs,
            undesirables,
        }
    }

    /// Second stage of a radial model.
    ///
    /// With the radial factor fixed at `score`, maximize Σs⁻ + Σs⁺ subject to
    /// Σλx + s⁻ = target_x(score) and Σλy − s⁺ = target_y(score) over the same
    /// peers and returns-to-scale row. The resulting reference set contains
    /// only units that are efficient themselves.
    pub fn max_slack_stage(&self, dataset: &Dataset, rts: ReturnsToScale, score: f64) -> DeaProblem {
        let dmus = dataset.dmus();
        let n_peers = self.layout.peers.len();
        let kept_inputs: Vec<(usize, Affine)> = kept(&self.layout.input_targets);
        let kept_outputs: Vec<(usize, Affine)> = kept(&self.layout.output_targets);

        let mut variables: Vec<String> = self
            .layout
            .peers
            .iter()
            .map(|&(_, col)| self.lp.variables[col].clone())
            .collect();
        variables.extend(kept_inputs.iter().map(|&(i, _)| format!("s-[{}]", dataset.input_names()[i])));
        variables.extend(kept_outputs.iter().map(|&(r, _)| format!("s+[{}]", dataset.output_names()[r])));
        let n_vars = variables.len();
        let peers: Vec<(usize, usize)> = self.layout.peers.iter().enumerate().map(|(k, &(j, _))| (j, k)).collect();

        let mut lp = LpProblem::new(variables).with_name(self.lp.name.clone());
        let mut objective = vec![0.0; n_vars];
        for coefficient in &mut objective[n_peers..] {
            *coefficient = 1.0;
        }
        lp.set_objective(objective, false);

        let mut input_rows = vec![None; dataset.num_inputs()];
        for (k, &(i, point)) in kept_inputs.iter().enumerate() {
            let mut row = vec![0.0; n_vars];
            for &(j, col) in &peers {
                row[col] = dmus[j].inputs[i];
            }
            row[n_peers + k] = 1.0;
            input_rows[i] = Some(lp.num_constraints());
            lp.add_constraint(format!("input[{}]", dataset.input_names()[i]), row, ConstraintOp::Eq, point.at(score));
        }

        let mut output_rows = vec![None; dataset.num_outputs()];
        for (k, &(r, point)) in kept_outputs.iter().enumerate() {
            let mut row = vec![0.0; n_vars];
            for &(j, col) in &peers {
                row[col] = dmus[j].outputs[r];
            }
            row[n_peers + kept_inputs.len() + k] = -1.0;
            output_rows[r] = Some(lp.num_constraints());
            lp.add_constraint(format!("output[{}]", dataset.output_names()[r]), row, ConstraintOp::Eq, point.at(score));
        }

        add_rts_row(&mut lp, rts, &peers, n_vars);

        DeaProblem {
            target: self.target,
            lp,
            layout: VariableLayout {
                peers,
                input_rows,
                output_rows,
                undesirable_rows: self.layout.undesirable_rows.iter().map(|_| None).collect(),
                input_targets: self.layout.input_targets.clone(),
                output_targets: self.layout.output_targets.clone(),
                undesirable_targets: self.layout.undesirable_targets.clone(),
            },
        }
    }
}

fn kept(targets: &[Option<Affine>]) -> Vec<(usize, Affine)> {
    targets
        .iter()
        .enumerate()
        .filter_map(|(i, target)| target.map(|point| (i, point)))
        .collect()
}

/// Radial envelopment model (CCR/BCC and their super-efficiency variants).
///
/// Input-oriented:  min θ  s.t. Σλx ≤ θx_o, Σλy ≥ y_o
/// Output-oriented: max φ  s.t. Σλx ≤ x_o,  Σλy ≥ φy_o
pub(crate) fn radial(dataset: &Dataset, spec: &ModelSpec, target: usize) -> DeaProblem {
    let dmus = dataset.dmus();
    let unit = &dmus[target];
    let input_oriented = spec.orientation() == Orientation::Input;

    let peer_indices: Vec<usize> = (0..dataset.len())
        .filter(|&j| !(spec.excludes_target() && j == target))
        .collect();

    let mut variables = vec![if input_oriented { "theta" } else { "phi" }.to_string()];
    variables.extend(peer_indices.iter().map(|&j| format!("lambda[{}]", dmus[j].id)));
    let n_vars = variables.len();
    let peers: Vec<(usize, usize)> = peer_indices.iter().enumerate().map(|(k, &j)| (j, k + 1)).collect();

    let mut lp = LpProblem::new(variables).with_name(unit.id.clone());
    let mut objective = vec![0.0; n_vars];
    objective[0] = 1.0;
    lp.set_objective(objective, input_oriented);

    let mut input_rows = vec![None; dataset.num_inputs()];
    let mut input_targets = vec![None; dataset.num_inputs()];
    for (i, name) in dataset.input_names().iter().enumerate() {
        let x_o = unit.inputs[i];
        let mut row = vec![0.0; n_vars];
        for &(j, col) in &peers {
            row[col] = dmus[j].inputs[i];
        }
        input_rows[i] = Some(lp.num_constraints());
        if input_oriented {
            row[0] = -x_o;
            lp.add_constraint(format!("input[{name}]"), row, ConstraintOp::Le, 0.0);
            input_targets[i] = Some(Affine::scaled(x_o));
        } else {
            lp.add_constraint(format!("input[{name}]"), row, ConstraintOp::Le, x_o);
            input_targets[i] = Some(Affine::fixed(x_o));
        }
    }

    let mut output_rows = vec![None; dataset.num_outputs()];
    let mut output_targets = vec![None; dataset.num_outputs()];
    for (r, name) in dataset.output_names().iter().enumerate() {
        let y_o = unit.outputs[r];
        if y_o <= 0.0 {
            continue;
        }
        let mut row = vec![0.0; n_vars];
        for &(j, col) in &peers {
            row[col] = dmus[j].outputs[r];
        }
        output_rows[r] = Some(lp.num_constraints());
        if input_oriented {
            lp.add_constraint(format!("output[{name}]"), row, ConstraintOp::Ge, y_o);
            output_targets[r] = Some(Affine::fixed(y_o));
        } else {
            row[0] = -y_o;
            lp.add_constraint(format!("output[{name}]"), row, ConstraintOp::Ge, 0.0);
            output_targets[r] = Some(Affine::scaled(y_o));
        }
    }

    add_rts_row(&mut lp, spec.rts(), &peers, n_vars);

    DeaProblem {
        target,
        lp,
        layout: VariableLayout {
            peers,
            input_rows,
            output_rows,
            undesirable_rows: vec![None; dataset.num_undesirables()],
            input_targets,
            output_targets,
            undesirable_targets: vec![None; dataset.num_undesirables()],
        },
    }
}

/// Oriented additive model.
///
/// Σλx + s⁻ = x_o, Σλy − s⁺ = y_o; input orientation maximizes Σs⁻,
/// output orientation maximizes Σs⁺.
pub(crate) fn additive(dataset: &Dataset, spec: &ModelSpec, target: usize) -> DeaProblem {
    let dmus = dataset.dmus();
    let unit = &dmus[target];
    let n = dataset.len();
    let m = dataset.num_inputs();
    let s = dataset.num_outputs();

    let mut variables: Vec<String> = dmus.iter().map(|d| format!("lambda[{}]", d.id)).collect();
    variables.extend(dataset.input_names().iter().map(|name| format!("s-[{name}]")));
    variables.extend(dataset.output_names().iter().map(|name| format!("s+[{name}]")));
    let n_vars = variables.len();
    let peers: Vec<(usize, usize)> = (0..n).map(|j| (j, j)).collect();

    let mut lp = LpProblem::new(variables).with_name(unit.id.clone());
    let mut objective = vec![0.0; n_vars];
    let weighted = match spec.orientation() {
        Orientation::Output => n + m..n + m + s,
        _ => n..n + m,
    };
    for col in weighted {
        objective[col] = 1.0;
    }
    lp.set_objective(objective, false);

    let mut input_rows = Vec::with_capacity(m);
    for (i, name) in dataset.input_names().iter().enumerate() {
        let mut row = vec![0.0; n_vars];
        for (j, dmu) in dmus.iter().enumerate() {
            row[j] = dmu.inputs[i];
        }
        row[n + i] = 1.0;
        input_rows.push(Some(lp.num_constraints()));
        lp.add_constraint(format!("input[{name}]"), row, ConstraintOp::Eq, unit.inputs[i]);
    }

    let mut output_rows = Vec::with_capacity(s);
    for (r, name) in dataset.output_names().iter().enumerate() {
        let mut row = vec![0.0; n_vars];
        for (j, dmu) in dmus.iter().enumerate() {
            row[j] = dmu.outputs[r];
        }
        row[n + m + r] = -1.0;
        output_rows.push(Some(lp.num_constraints()));
        lp.add_constraint(format!("output[{name}]"), row, ConstraintOp::Eq, unit.outputs[r]);
    }

    add_rts_row(&mut lp, spec.rts(), &peers, n_vars);

    DeaProblem {
        target,
        lp,
        layout: VariableLayout {
            peers,
            input_rows,
            output_rows,
            undesirable_rows: vec![None; dataset.num_undesirables()],
            input_targets: unit.inputs.iter().map(|&x| Some(Affine::fixed(x))).collect(),
            output_targets: unit.outputs.iter().map(|&y| Some(Affine::fixed(y))).collect(),
            undesirable_targets: vec![None; dataset.num_undesirables()],
        },
    }
}

/// Directional distance function.
///
/// max β  s.t. Σλx + βg_x ≤ x_o, Σλy − βg_y ≥ y_o
///
/// Undesirable outputs add Σλb + βg_b = b_o under weak disposability and
/// Σλb + βg_b ≤ b_o under strong disposability.
pub(crate) fn directional(dataset: &Dataset, spec: &ModelSpec, target: usize) -> DeaProblem {
    let dmus = dataset.dmus();
    let unit = &dmus[target];
    let g = spec.direction().resolve(unit);
    let (gx, gy, gb) = (&g.inputs, &g.outputs, &g.undesirables);

    let mut variables = vec!["beta".to_string()];
    variables.extend(dmus.iter().map(|d| format!("lambda[{}]", d.id)));
    let n_vars = variables.len();
    let peers: Vec<(usize, usize)> = (0..dataset.len()).map(|j| (j, j + 1)).collect();

    let mut lp = LpProblem::new(variables).with_name(unit.id.clone());
    let mut objective = vec![0.0; n_vars];
    objective[0] = 1.0;
    lp.set_objective(objective, false);

    let mut input_rows = Vec::with_capacity(dataset.num_inputs());
    let mut input_targets = Vec::with_capacity(dataset.num_inputs());
    for (i, name) in dataset.input_names().iter().enumerate() {
        let mut row = vec![0.0; n_vars];
        row[0] = gx[i];
        for &(j, col) in &peers {
            row[col] = dmus[j].inputs[i];
        }
        input_rows.push(Some(lp.num_constraints()));
        input_targets.push(Some(Affine {
            constant: unit.inputs[i],
            per_score: -gx[i],
        }));
        lp.add_constraint(format!("input[{name}]"), row, ConstraintOp::Le, unit.inputs[i]);
    }

    let mut output_rows = Vec::with_capacity(dataset.num_outputs());
    let mut output_targets = Vec::with_capacity(dataset.num_outputs());
    for (r, name) in dataset.output_names().iter().enumerate() {
        let mut row = vec![0.0; n_vars];
        row[0] = -gy[r];
        for &(j, col) in &peers {
            row[col] = dmus[j].outputs[r];
        }
        output_rows.push(Some(lp.num_constraints()));
        output_targets.push(Some(Affine {
            constant: unit.outputs[r],
            per_score: gy[r],
        }));
        lp.add_constraint(format!("output[{name}]"), row, ConstraintOp::Ge, unit.outputs[r]);
    }

    let bad_op = match spec.disposability() {
        Disposability::Weak => ConstraintOp::Eq,
        Disposability::Strong => ConstraintOp::Le,
    };
    let mut undesirable_rows = Vec::with_capacity(dataset.num_undesirables());
    let mut undesirable_targets = Vec::with_capacity(dataset.num_undesirables());
    for (b, name) in dataset.undesirable_names().iter().enumerate() {
        let mut row = vec![0.0; n_vars];
        row[0] = gb[b];
        for &(j, col) in &peers {
            row[col] = dmus[j].undesirables[b];
        }
        undesirable_rows.push(Some(lp.num_constraints()));
        undesirable_targets.push(Some(Affine {
            constant: unit.undesirables[b],
            per_score: -gb[b],
        }));
        lp.add_constraint(format!("undesirable[{name}]"), row, bad_op, unit.undesirables[b]);
    }

    add_rts_row(&mut lp, spec.rts(), &peers, n_vars);

    DeaProblem {
        target,
        lp,
        layout: VariableLayout {
            peers,
            input_rows,
            output_rows,
            undesirable_rows,
            input_targets,
            output_targets,
            undesirable_targets,
        },
    }
}

fn add_rts_row(lp: &mut LpProblem, rts: ReturnsToScale, peers: &[(usize, usize)], n_vars: usize) {
    let op = match rts {
        ReturnsToScale::Constant => return,
        ReturnsToScale::Variable => ConstraintOp::Eq,
        ReturnsToScale::NonIncreasing => ConstraintOp::Le,
        ReturnsToScale::NonDecreasing => ConstraintOp::Ge,
    };
    let mut row = vec![0.0; n_vars];
    for &(_, col) in peers {
        row[col] = 1.0;
    }
    lp.add_constraint("convexity", row, op, 1.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dmu;
    use crate::model::{Direction, Formulation};

    fn scenario() -> Dataset {
        Dataset::from_rows(
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            vec![vec![2.0], vec![3.0], vec![5.0]],
            vec![vec![1.0], vec![1.0], vec![1.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_ccr_input_structure() {
        let problem = build(&scenario(), &ModelSpec::ccr(Orientation::Input), 2).unwrap();

        assert_eq!(problem.lp.name, "C");
        assert_eq!(problem.lp.variables, vec!["theta", "lambda[A]", "lambda[B]", "lambda[C]"]);
        assert!(problem.lp.objective.minimize);
        assert_eq!(problem.lp.num_constraints(), 2);

        let input = &problem.lp.constraints[0];
        assert_eq!(input.coefficients, vec![-5.0, 2.0, 3.0, 5.0]);
        assert_eq!(input.op, ConstraintOp::Le);
        assert_eq!(input.rhs, 0.0);

        let output = &problem.lp.constraints[1];
        assert_eq!(output.coefficients, vec![0.0, 1.0, 1.0, 1.0]);
        assert_eq!(output.op, ConstraintOp::Ge);
        assert_eq!(output.rhs, 1.0);
    }

    #[test]
    fn test_output_oriented_structure() {
        let problem = build(&scenario(), &ModelSpec::bcc(Orientation::Output), 1).unwrap();

        assert_eq!(problem.lp.variables[0], "phi");
        assert!(!problem.lp.objective.minimize);
        assert_eq!(problem.lp.constraints[0].coefficients, vec![0.0, 2.0, 3.0, 5.0]);
        assert_eq!(problem.lp.constraints[0].rhs, 3.0);
        assert_eq!(problem.lp.constraints[1].coefficients, vec![-1.0, 1.0, 1.0, 1.0]);
        assert_eq!(problem.lp.constraints[1].rhs, 0.0);

        let convexity = &problem.lp.constraints[2];
        assert_eq!(convexity.name, "convexity");
        assert_eq!(convexity.op, ConstraintOp::Eq);
        assert_eq!(convexity.coefficients, vec![0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_rts_rows() {
        let data = scenario();
        let op_for = |rts| {
            let spec = ModelSpec::new(Formulation::Radial, Orientation::Input, rts);
            build(&data, &spec, 0).unwrap().lp.constraints.iter().find(|c| c.name == "convexity").map(|c| c.op)
        };
        assert_eq!(op_for(ReturnsToScale::Constant), None);
        assert_eq!(op_for(ReturnsToScale::Variable), Some(ConstraintOp::Eq));
        assert_eq!(op_for(ReturnsToScale::NonIncreasing), Some(ConstraintOp::Le));
        assert_eq!(op_for(ReturnsToScale::NonDecreasing), Some(ConstraintOp::Ge));
    }

    #[test]
    fn test_super_efficiency_drops_target_column() {
        let spec = ModelSpec::super_efficiency(Orientation::Input, ReturnsToScale::Constant);
        let problem = build(&scenario(), &spec, 1).unwrap();

        assert_eq!(problem.lp.variables, vec!["theta", "lambda[A]", "lambda[C]"]);
        assert_eq!(problem.layout.peers, vec![(0, 1), (2, 2)]);
        assert_eq!(problem.lp.constraints[0].coefficients, vec![-3.0, 2.0, 5.0]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let data = scenario();
        for spec in [
            ModelSpec::ccr(Orientation::Input),
            ModelSpec::additive(Orientation::Output, ReturnsToScale::Variable),
            ModelSpec::directional(ReturnsToScale::Constant, Direction::Observed),
        ] {
            for target in 0..data.len() {
                assert_eq!(build(&data, &spec, target).unwrap(), build(&data, &spec, target).unwrap());
            }
        }
    }

    #[test]
    fn test_zero_input_row_is_kept() {
        let data = Dataset::from_rows(
            vec!["A".to_string(), "B".to_string()],
            vec![vec![0.0, 2.0], vec![1.0, 1.0]],
            vec![vec![1.0], vec![1.0]],
        )
        .unwrap();

        let problem = build(&data, &ModelSpec::ccr(Orientation::Input), 0).unwrap();
        assert_eq!(problem.layout.input_rows, vec![Some(0), Some(1)]);
        // Σλx_1 ≤ 0·θ: peers using input 1 are ruled out
        let zero_row = &problem.lp.constraints[0];
        assert_eq!(zero_row.coefficients, vec![0.0, 0.0, 1.0]);
        assert_eq!(zero_row.op, ConstraintOp::Le);
        assert_eq!(zero_row.rhs, 0.0);
    }

    #[test]
    fn test_zero_output_row_is_skipped() {
        let data = Dataset::from_rows(
            vec!["A".to_string(), "B".to_string()],
            vec![vec![1.0], vec![2.0]],
            vec![vec![0.0, 1.0], vec![1.0, 1.0]],
        )
        .unwrap();

        let problem = build(&data, &ModelSpec::ccr(Orientation::Input), 0).unwrap();
        assert_eq!(problem.layout.output_rows, vec![None, Some(1)]);
        assert!(problem.layout.output_targets[0].is_none());

        let additive = build(&data, &ModelSpec::additive(Orientation::Input, ReturnsToScale::Variable), 0).unwrap();
        assert_eq!(additive.layout.output_rows, vec![Some(1), Some(2)]);
    }

    #[test]
    fn test_additive_structure() {
        let spec = ModelSpec::additive(Orientation::Input, ReturnsToScale::Variable);
        let problem = build(&scenario(), &spec, 0).unwrap();

        assert_eq!(
            problem.lp.variables,
            vec!["lambda[A]", "lambda[B]", "lambda[C]", "s-[x1]", "s+[y1]"]
        );
        assert_eq!(problem.lp.objective.coefficients, vec![0.0, 0.0, 0.0, 1.0, 0.0]);
        assert!(!problem.lp.objective.minimize);
        assert_eq!(problem.lp.constraints[0].op, ConstraintOp::Eq);
        assert_eq!(problem.lp.constraints[1].coefficients, vec![1.0, 1.0, 1.0, 0.0, -1.0]);

        let output = build(&scenario(), &ModelSpec::additive(Orientation::Output, ReturnsToScale::Variable), 0).unwrap();
        assert_eq!(output.lp.objective.coefficients, vec![0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_directional_structure() {
        let spec = ModelSpec::directional(ReturnsToScale::Constant, Direction::Observed);
        let problem = build(&scenario(), &spec, 2).unwrap();

        assert_eq!(problem.lp.variables[0], "beta");
        assert_eq!(problem.lp.constraints[0].coefficients, vec![5.0, 2.0, 3.0, 5.0]);
        assert_eq!(problem.lp.constraints[0].rhs, 5.0);
        assert_eq!(problem.lp.constraints[1].coefficients, vec![-1.0, 1.0, 1.0, 1.0]);
        assert_eq!(problem.lp.constraints[1].rhs, 1.0);
    }

    #[test]
    fn test_slacks_from_primal() {
        let problem = build(&scenario(), &ModelSpec::ccr(Orientation::Input), 2).unwrap();
        // theta = 0.5, lambda_A = 1: input slack 2.5 - 2, output slack 1 - 1
        let slacks = problem.slacks(&scenario(), 0.5, &[0.5, 1.0, 0.0, 0.0]);
        assert_eq!(slacks.inputs, vec![0.5]);
        assert_eq!(slacks.outputs, vec![0.0]);
        assert!(slacks.undesirables.is_empty());
    }

    #[test]
    fn test_max_slack_stage_structure() {
        let spec = ModelSpec::bcc(Orientation::Input);
        let first = build(&scenario(), &spec, 2).unwrap();
        let second = first.max_slack_stage(&scenario(), spec.rts(), 0.4);

        assert_eq!(second.lp.name, "C");
        assert_eq!(
            second.lp.variables,
            vec!["lambda[A]", "lambda[B]", "lambda[C]", "s-[x1]", "s+[y1]"]
        );
        assert_eq!(second.lp.objective.coefficients, vec![0.0, 0.0, 0.0, 1.0, 1.0]);
        assert!(!second.lp.objective.minimize);
        assert_eq!(second.layout.peers, vec![(0, 0), (1, 1), (2, 2)]);

        let input = &second.lp.constraints[0];
        assert_eq!(input.coefficients, vec![2.0, 3.0, 5.0, 1.0, 0.0]);
        assert_eq!(input.op, ConstraintOp::Eq);
        assert!((input.rhs - 2.0).abs() < 1e-12);

        let output = &second.lp.constraints[1];
        assert_eq!(output.coefficients, vec![1.0, 1.0, 1.0, 0.0, -1.0]);
        assert_eq!(output.rhs, 1.0);

        assert_eq!(second.lp.constraints[2].name, "convexity");
        // λ_A = 1 leaves no slack: reading it back through the same targets agrees
        let slacks = second.slacks(&scenario(), 0.4, &[1.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(slacks.inputs[0].abs() < 1e-12);
    }

    #[test]
    fn test_max_slack_stage_skips_zero_outputs_and_excluded_target() {
        let data = Dataset::from_rows(
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            vec![vec![1.0], vec![2.0], vec![3.0]],
            vec![vec![0.0, 1.0], vec![1.0, 1.0], vec![1.0, 2.0]],
        )
        .unwrap();
        let spec = ModelSpec::super_efficiency(Orientation::Input, ReturnsToScale::Constant);
        let second = build(&data, &spec, 0).unwrap().max_slack_stage(&data, spec.rts(), 1.0);

        assert_eq!(second.lp.variables, vec!["lambda[B]", "lambda[C]", "s-[x1]", "s+[y2]"]);
        assert_eq!(second.layout.peers, vec![(1, 0), (2, 1)]);
        assert_eq!(second.layout.output_rows, vec![None, Some(1)]);
    }

    fn polluting() -> Dataset {
        Dataset::with_undesirables(
            vec!["x".to_string()],
            vec!["y".to_string()],
            vec!["co2".to_string()],
            vec![
                Dmu::new("A", vec![2.0], vec![2.0]).with_undesirables(vec![1.0]),
                Dmu::new("B", vec![4.0], vec![2.0]).with_undesirables(vec![3.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_directional_undesirable_rows() {
        let spec = ModelSpec::directional(ReturnsToScale::Constant, Direction::Observed);
        let problem = build(&polluting(), &spec, 1).unwrap();

        assert_eq!(problem.layout.undesirable_rows, vec![Some(2)]);
        let bad = &problem.lp.constraints[2];
        assert_eq!(bad.name, "undesirable[co2]");
        assert_eq!(bad.coefficients, vec![3.0, 1.0, 3.0]);
        assert_eq!(bad.op, ConstraintOp::Eq);
        assert_eq!(bad.rhs, 3.0);

        let strong = build(&polluting(), &spec.with_disposability(Disposability::Strong), 1).unwrap();
        assert_eq!(strong.lp.constraints[2].op, ConstraintOp::Le);
    }

    #[test]
    fn test_undesirable_slack_reads_back() {
        let spec = ModelSpec::directional(ReturnsToScale::Constant, Direction::Observed)
            .with_disposability(Disposability::Strong);
        let problem = build(&polluting(), &spec, 1).unwrap();
        // beta = 0, lambda_A = 1: 3 - 1 of co2 left unused
        let slacks = problem.slacks(&polluting(), 0.0, &[0.0, 1.0, 0.0]);
        assert_eq!(slacks.undesirables, vec![2.0]);
    }

    #[test]
    fn test_build_rejects_bad_target_and_unsupported_model() {
        let data = scenario();
        assert!(matches!(
            build(&data, &ModelSpec::ccr(Orientation::Input), 7),
            Err(DeaError::InvalidDataset(_))
        ));
        assert!(matches!(
            build(&data, &ModelSpec::additive(Orientation::NonOriented, ReturnsToScale::Constant), 0),
            Err(DeaError::UnsupportedModel { .. })
        ));
    }
}
