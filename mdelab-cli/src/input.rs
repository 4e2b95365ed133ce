//! Metric column loading.
//!
//! Reads one numeric column from a CSV file. Missing cells (empty, `NA`,
//! `NaN`, `null`, `None`, any case) become NaN so the distribution builder
//! drops them. Anything else that does not parse as a number is an error.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

const MISSING_TOKENS: &[&str] = &["", "na", "nan", "null", "none"];

/// Which column to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelector {
    Name(String),
    Index(usize),
}

impl ColumnSelector {
    /// Numeric strings select by zero-based index, anything else by header name.
    pub fn parse(spec: &str) -> Self {
        match spec.parse::<usize>() {
            Ok(index) => ColumnSelector::Index(index),
            Err(_) => ColumnSelector::Name(spec.to_string()),
        }
    }
}

/// Load a column as `f64`, with NaN for missing cells.
pub fn load_column(path: &Path, column: &ColumnSelector, has_headers: bool) -> Result<Vec<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let index = match column {
        ColumnSelector::Index(i) => *i,
        ColumnSelector::Name(name) => {
            if !has_headers {
                bail!("column '{name}' selected by name but the file has no header row");
            }
            let headers = reader
                .headers()
                .with_context(|| format!("failed to read header of {}", path.display()))?;
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| {
                    anyhow!(
                        "column '{name}' not found in {}; available: {}",
                        path.display(),
                        headers.iter().collect::<Vec<_>>().join(", ")
                    )
                })?
        }
    };

    let mut values = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read row {}", row + 1))?;
        let cell = record.get(index).unwrap_or("");
        let value = parse_cell(cell)
            .with_context(|| format!("row {}, column {index}: invalid number '{cell}'", row + 1))?;
        values.push(value);
    }
    Ok(values)
}

fn parse_cell(cell: &str) -> Result<f64> {
    if MISSING_TOKENS.iter().any(|t| cell.eq_ignore_ascii_case(t)) {
        return Ok(f64::NAN);
    }
    Ok(cell.parse::<f64>()?)
}
