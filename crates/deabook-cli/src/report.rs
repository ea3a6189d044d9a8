use anyhow::Result;
use deabook_core::{Dataset, EfficiencyResult, ResultStatus, RunReport, UnitOutcome};
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Tabled)]
struct ResultRow {
    #[tabled(rename = "DMU")]
    dmu: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Efficient")]
    efficient: String,
    #[tabled(rename = "Peers (λ)")]
    peers: String,
    #[tabled(rename = "Input slacks")]
    input_slacks: String,
    #[tabled(rename = "Output slacks")]
    output_slacks: String,
    #[tabled(rename = "Undesirable slacks")]
    undesirable_slacks: String,
}

impl ResultRow {
    fn from_outcome(outcome: &UnitOutcome) -> Self {
        match outcome {
            UnitOutcome::Solved(result) => Self::from_result(result),
            UnitOutcome::Failed(failure) => Self::blank(&failure.dmu, format!("failed: {}", failure.error)),
            UnitOutcome::Cancelled { dmu } => Self::blank(dmu, "cancelled".to_string()),
        }
    }

    fn from_result(result: &EfficiencyResult) -> Self {
        let status = match result.status() {
            ResultStatus::Optimal => "optimal",
            ResultStatus::SuperEfficientUnbounded => "super-efficient (unbounded)",
            ResultStatus::Unbounded => "unbounded",
        };
        let peers = result
            .peers()
            .iter()
            .map(|p| format!("{} ({:.4})", p.dmu, p.weight))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            dmu: result.dmu().to_string(),
            status: status.to_string(),
            score: result.score().map(|s| format!("{s:.6}")).unwrap_or_else(|| "-".to_string()),
            efficient: if result.is_efficient() { "yes" } else { "no" }.to_string(),
            peers,
            input_slacks: join_values(result.input_slacks()),
            output_slacks: join_values(result.output_slacks()),
            undesirable_slacks: join_values(result.undesirable_slacks()),
        }
    }

    fn blank(dmu: &str, status: String) -> Self {
        Self {
            dmu: dmu.to_string(),
            status,
            score: "-".to_string(),
            efficient: "-".to_string(),
            peers: String::new(),
            input_slacks: String::new(),
            output_slacks: String::new(),
            undesirable_slacks: String::new(),
        }
    }
}

fn join_values(values: &[f64]) -> String {
    values.iter().map(|v| format!("{v:.4}")).collect::<Vec<_>>().join(" ")
}

pub fn render_table(dataset: &Dataset, report: &RunReport) -> String {
    let rows: Vec<ResultRow> = report.table.iter().map(ResultRow::from_outcome).collect();
    let summary = report.summary();
    let meta = &report.metadata;

    let mut out = String::new();
    out.push_str(&format!("Model: {}\n", meta.model));
    out.push_str(&format!(
        "Units: {} ({} inputs: {}; {} outputs: {})\n",
        dataset.len(),
        dataset.num_inputs(),
        dataset.input_names().join(", "),
        dataset.num_outputs(),
        dataset.output_names().join(", "),
    ));
    if dataset.num_undesirables() > 0 {
        out.push_str(&format!(
            "Undesirable outputs: {} ({} disposability)\n",
            dataset.undesirable_names().join(", "),
            meta.model.disposability()
        ));
    }
    out.push_str(&format!("Backend: {} ({:.3}s)\n\n", meta.backend, meta.elapsed.as_secs_f64()));
    out.push_str(&Table::new(&rows).to_string());
    out.push_str("\n\n");

    out.push_str(&format!(
        "Solved: {}  Efficient: {}  Unbounded: {}  Failed: {}  Cancelled: {}\n",
        summary.solved, summary.efficient, summary.unbounded, summary.failed, summary.cancelled
    ));
    if let (Some(mean), Some(min), Some(max)) = (summary.mean_score, summary.min_score, summary.max_score) {
        out.push_str(&format!("Score mean {mean:.6}  min {min:.6}  max {max:.6}\n"));
    }
    if report.cancelled {
        out.push_str("Run cancelled before every unit was evaluated\n");
    }
    out
}

pub fn render_json(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
