//! Structural and semantic checks on the cleaned dataset.
//!
//! Each check is a free function over a [`Table`]; [`validate_dataset`] runs them in order and
//! stops at the first violation, [`collect_violations`] runs them all.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::info;

use crate::clean::Indexer;
use crate::config::{self, DATASET_FINAL_COLUMNS};
use crate::table::Table;

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(0[1-9]|[12][0-9]|3[01])/(0[1-9]|1[0-2])/\d{4}$").expect("valid date regex")
});
static NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d{1,2})?$").expect("valid numeric regex"));
static ALPHANUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("valid alphanumeric regex"));

const NUMERIC_COLUMNS: [&str; 2] = [config::INDICATIVE_RATE, config::PU];

/// A violated rule. `row` is the 1-based data row of the first offender.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("missing expected column: {0}")]
    MissingColumn(String),

    #[error("the '{column}' column should be in 'DD/MM/YYYY' format (row {row})")]
    DateFormat { column: String, row: usize },

    #[error("the '{column}' column should contain numbers with at most 2 decimals (row {row})")]
    NumericFormat { column: String, row: usize },

    #[error("missing or null values found in key columns: {columns} (row {row})")]
    MissingValues { columns: String, row: usize },

    #[error("duplicate rows detected (row {row} repeats row {first})")]
    Duplicate { row: usize, first: usize },

    #[error("invalid values in '{column}': must be alphanumeric (row {row})")]
    NotAlphanumeric { column: String, row: usize },

    #[error("invalid values in '{column}': must be a non-empty string (row {row})")]
    EmptyString { column: String, row: usize },

    #[error("invalid values in '{column}': expected one of {expected} (row {row})")]
    InvalidCategory {
        column: String,
        expected: String,
        row: usize,
    },

    #[error("invalid values in '{column}': all values must be greater than 0 (row {row})")]
    NotPositive { column: String, row: usize },
}

pub type CheckResult = Result<(), SchemaViolation>;

type Check = fn(&Table) -> CheckResult;

const CHECKS: [(&str, Check); 9] = [
    ("all expected columns are present", check_expected_columns),
    ("'data' column is in 'DD/MM/YYYY' format", validate_date_column),
    ("numeric columns contain valid numeric strings", validate_numeric_columns),
    ("no missing or null values in key columns", check_for_missing_values),
    ("no duplicate rows detected", check_for_duplicates),
    ("'Código' column is alphanumeric", validate_alphanumeric_column),
    ("'Nome' column contains valid strings", validate_string_column),
    ("'Indexer' column contains valid values", validate_indexer_column),
    ("numeric columns contain positive values", validate_positive_values),
];

fn column<'a>(
    df: &'a Table,
    name: &str,
) -> Result<impl Iterator<Item = (usize, Option<&'a str>)> + 'a, SchemaViolation> {
    df.column_values(name)
        .map(|values| values.enumerate().map(|(i, v)| (i + 1, v)))
        .map_err(|_| SchemaViolation::MissingColumn(name.to_string()))
}

fn key_columns(df: &Table) -> Result<Table, SchemaViolation> {
    check_expected_columns(df)?;
    df.select(&DATASET_FINAL_COLUMNS)
        .map_err(|e| SchemaViolation::MissingColumn(e.to_string()))
}

/// First row (1-based) where `ok` does not hold.
fn first_failure<'a>(
    mut values: impl Iterator<Item = (usize, Option<&'a str>)>,
    ok: impl Fn(Option<&str>) -> bool,
) -> Option<usize> {
    values.find(|(_, v)| !ok(*v)).map(|(row, _)| row)
}

pub fn check_expected_columns(df: &Table) -> CheckResult {
    match DATASET_FINAL_COLUMNS
        .iter()
        .find(|c| df.column_index(c).is_none())
    {
        Some(missing) => Err(SchemaViolation::MissingColumn(missing.to_string())),
        None => Ok(()),
    }
}

pub fn validate_date_column(df: &Table) -> CheckResult {
    let values = column(df, config::DATE)?;
    match first_failure(values, |v| v.is_some_and(|v| DATE_RE.is_match(v))) {
        Some(row) => Err(SchemaViolation::DateFormat {
            column: config::DATE.to_string(),
            row,
        }),
        None => Ok(()),
    }
}

pub fn validate_numeric_columns(df: &Table) -> CheckResult {
    for name in NUMERIC_COLUMNS {
        let values = column(df, name)?;
        if let Some(row) = first_failure(values, |v| v.is_some_and(|v| NUMERIC_RE.is_match(v))) {
            return Err(SchemaViolation::NumericFormat {
                column: name.to_string(),
                row,
            });
        }
    }
    Ok(())
}

pub fn check_for_missing_values(df: &Table) -> CheckResult {
    let key = key_columns(df)?;
    match key.rows().iter().position(|r| r.iter().any(Option::is_none)) {
        Some(index) => Err(SchemaViolation::MissingValues {
            columns: DATASET_FINAL_COLUMNS.join(", "),
            row: index + 1,
        }),
        None => Ok(()),
    }
}

pub fn check_for_duplicates(df: &Table) -> CheckResult {
    let key = key_columns(df)?;
    let mut seen = HashMap::with_capacity(key.len());
    for (index, row) in key.rows().iter().enumerate() {
        if let Some(first) = seen.insert(row, index + 1) {
            return Err(SchemaViolation::Duplicate {
                row: index + 1,
                first,
            });
        }
    }
    Ok(())
}

pub fn validate_alphanumeric_column(df: &Table) -> CheckResult {
    let values = column(df, config::CODE)?;
    match first_failure(values, |v| v.is_some_and(|v| ALPHANUMERIC_RE.is_match(v))) {
        Some(row) => Err(SchemaViolation::NotAlphanumeric {
            column: config::CODE.to_string(),
            row,
        }),
        None => Ok(()),
    }
}

pub fn validate_string_column(df: &Table) -> CheckResult {
    let values = column(df, config::NAME)?;
    match first_failure(values, |v| v.is_some_and(|v| !v.trim().is_empty())) {
        Some(row) => Err(SchemaViolation::EmptyString {
            column: config::NAME.to_string(),
            row,
        }),
        None => Ok(()),
    }
}

pub fn validate_indexer_column(df: &Table) -> CheckResult {
    let values = column(df, config::INDEXER)?;
    match first_failure(values, |v| v.and_then(Indexer::from_label).is_some()) {
        Some(row) => Err(SchemaViolation::InvalidCategory {
            column: config::INDEXER.to_string(),
            expected: Indexer::ALL.map(|i| i.label()).join(", "),
            row,
        }),
        None => Ok(()),
    }
}

pub fn validate_positive_values(df: &Table) -> CheckResult {
    for name in NUMERIC_COLUMNS {
        let values = column(df, name)?;
        let positive = |v: Option<&str>| {
            v.and_then(|v| v.trim().parse::<f64>().ok())
                .is_some_and(|n| n > 0.0)
        };
        if let Some(row) = first_failure(values, positive) {
            return Err(SchemaViolation::NotPositive {
                column: name.to_string(),
                row,
            });
        }
    }
    Ok(())
}

/// Runs every check in order, stopping at the first violation.
pub fn validate_dataset(df: &Table) -> CheckResult {
    for (description, check) in CHECKS {
        check(df)?;
        info!("✔ {description}");
    }
    info!("✔ dataset validation passed");
    Ok(())
}

/// Runs every check and reports all violations instead of the first one.
pub fn collect_violations(df: &Table) -> Vec<SchemaViolation> {
    CHECKS
        .iter()
        .filter_map(|(_, check)| check(df).err())
        .collect()
}
