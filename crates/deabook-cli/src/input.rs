use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use deabook_core::{Dataset, Dmu};

/// Which CSV columns feed the dataset
pub struct ColumnSelection<'a> {
    /// Identifier column; the first column when `None`
    pub id: Option<&'a str>,
    pub inputs: &'a [String],
    pub outputs: &'a [String],
    /// Undesirable output columns, possibly none
    pub undesirables: &'a [String],
}

pub fn load_csv(path: &Path, columns: &ColumnSelection<'_>) -> Result<Dataset> {
    let file = std::fs::File::open(path).with_context(|| format!("Error reading file {}", path.display()))?;
    read_csv(file, columns).with_context(|| format!("Error loading {}", path.display()))
}

pub fn read_csv(reader: impl Read, columns: &ColumnSelection<'_>) -> Result<Dataset> {
    if columns.inputs.is_empty() || columns.outputs.is_empty() {
        bail!("at least one --inputs and one --outputs column is required");
    }

    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = csv.headers().context("missing header row")?.clone();

    let find = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow!("column '{name}' not found (available: {})", headers.iter().collect::<Vec<_>>().join(", ")))
    };

    let id_col = match columns.id {
        Some(name) => find(name)?,
        None => 0,
    };
    let input_cols = columns.inputs.iter().map(|c| find(c)).collect::<Result<Vec<_>>>()?;
    let output_cols = columns.outputs.iter().map(|c| find(c)).collect::<Result<Vec<_>>>()?;
    let undesirable_cols = columns.undesirables.iter().map(|c| find(c)).collect::<Result<Vec<_>>>()?;

    let mut dmus = Vec::new();
    for (line, record) in csv.records().enumerate() {
        let record = record.with_context(|| format!("malformed record {}", line + 1))?;
        let field = |col: usize| -> Result<f64> {
            let raw = record.get(col).unwrap_or("");
            raw.parse::<f64>()
                .with_context(|| format!("record {}: column '{}' holds '{raw}', not a number", line + 1, &headers[col]))
        };
        let id = record.get(id_col).unwrap_or("").to_string();
        let inputs = input_cols.iter().map(|&c| field(c)).collect::<Result<Vec<_>>>()?;
        let outputs = output_cols.iter().map(|&c| field(c)).collect::<Result<Vec<_>>>()?;
        let undesirables = undesirable_cols.iter().map(|&c| field(c)).collect::<Result<Vec<_>>>()?;
        dmus.push(Dmu::new(id, inputs, outputs).with_undesirables(undesirables));
    }

    Ok(Dataset::with_undesirables(
        columns.inputs.to_vec(),
        columns.outputs.to_vec(),
        columns.undesirables.to_vec(),
        dmus,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_read_csv_selects_columns() {
        let data = "bank, staff, branches, loans\nA, 2, 1, 1\nB, 3, 1, 1\nC, 5, 2, 1\n";
        let inputs = names(&["staff"]);
        let outputs = names(&["loans"]);
        let dataset = read_csv(
            data.as_bytes(),
            &ColumnSelection { id: None, inputs: &inputs, outputs: &outputs, undesirables: &[] },
        )
        .unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.dmus()[2].inputs, vec![5.0]);
        assert_eq!(dataset.input_names(), &["staff".to_string()]);
    }

    #[test]
    fn test_read_csv_named_id_column() {
        let data = "x,name,y\n1,first,2\n2,second,2\n";
        let inputs = names(&["x"]);
        let outputs = names(&["y"]);
        let dataset = read_csv(
            data.as_bytes(),
            &ColumnSelection { id: Some("name"), inputs: &inputs, outputs: &outputs, undesirables: &[] },
        )
        .unwrap();

        assert_eq!(dataset.ids().collect::<Vec<_>>(), vec!["first", "second"]);
    }

    #[test]
    fn test_read_csv_undesirable_columns() {
        let data = "plant,coal,power,so2\nA,2,3,0\nB,4,5,1.5\n";
        let inputs = names(&["coal"]);
        let outputs = names(&["power"]);
        let undesirables = names(&["so2"]);
        let dataset = read_csv(
            data.as_bytes(),
            &ColumnSelection { id: None, inputs: &inputs, outputs: &outputs, undesirables: &undesirables },
        )
        .unwrap();

        assert_eq!(dataset.num_undesirables(), 1);
        assert_eq!(dataset.dmus()[0].undesirables, vec![0.0]);
        assert_eq!(dataset.dmus()[1].undesirables, vec![1.5]);
    }

    #[test]
    fn test_read_csv_reports_missing_column_and_bad_number() {
        let inputs = names(&["staff"]);
        let outputs = names(&["profit"]);
        let err = read_csv(
            "id,staff,loans\nA,1,1\n".as_bytes(),
            &ColumnSelection { id: None, inputs: &inputs, outputs: &outputs, undesirables: &[] },
        )
        .unwrap_err();
        assert!(err.to_string().contains("column 'profit' not found"), "{err}");

        let outputs = names(&["loans"]);
        let err = read_csv(
            "id,staff,loans\nA,lots,1\n".as_bytes(),
            &ColumnSelection { id: None, inputs: &inputs, outputs: &outputs, undesirables: &[] },
        )
        .unwrap_err();
        assert!(err.to_string().contains("not a number"), "{err}");
    }

    #[test]
    fn test_read_csv_surfaces_dataset_errors() {
        let inputs = names(&["staff"]);
        let outputs = names(&["loans"]);
        let err = read_csv(
            "id,staff,loans\nA,1,1\nA,2,1\n".as_bytes(),
            &ColumnSelection { id: None, inputs: &inputs, outputs: &outputs, undesirables: &[] },
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate unit id"), "{err}");
    }
}
