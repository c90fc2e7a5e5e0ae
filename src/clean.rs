use std::fmt;

use time::{format_description::BorrowedFormatItem, macros::format_description, Date};
use tracing::{debug, warn};

use crate::config::{self, DATASET_COLUMNS_TO_SELECT, DATASET_FINAL_COLUMNS};
use crate::error::Result;
use crate::table::{Cell, Table};

static COMPACT_DATE_FMT: &[BorrowedFormatItem] = format_description!("[year][month][day]");
pub(crate) static DISPLAY_DATE_FMT: &[BorrowedFormatItem] =
    format_description!("[day]/[month]/[year]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Indexer {
    IpcaSpread,
    DiPercentual,
    DiSpread,
}

impl Indexer {
    pub const ALL: [Indexer; 3] = [Indexer::IpcaSpread, Indexer::DiPercentual, Indexer::DiSpread];

    pub fn label(&self) -> &'static str {
        match self {
            Indexer::IpcaSpread => "IPCA +",
            Indexer::DiPercentual => "% do DI",
            Indexer::DiSpread => "DI +",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.label() == label)
    }

    /// Maps a spreadsheet category to its indexer; `None` stands for "Other".
    pub fn classify(sheet_name: &str) -> Option<Self> {
        if sheet_name.contains("IPCA_SPREAD") {
            Some(Indexer::IpcaSpread)
        } else if sheet_name.contains("DI_PERCENTUAL") {
            Some(Indexer::DiPercentual)
        } else if sheet_name.contains("DI_SPREAD") {
            Some(Indexer::DiSpread)
        } else {
            None
        }
    }
}

impl fmt::Display for Indexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn parse_dataset_date(value: &str) -> Option<Date> {
    let value = value.trim();
    Date::parse(value, COMPACT_DATE_FMT)
        .or_else(|_| Date::parse(value, DISPLAY_DATE_FMT))
        .ok()
}

/// Accepts `YYYYMMDD` or `DD/MM/YYYY` and renders `DD/MM/YYYY`.
pub fn normalize_date(value: &str) -> Option<String> {
    parse_dataset_date(value).and_then(|d| d.format(DISPLAY_DATE_FMT).ok())
}

pub fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Reduces the combined raw dataset to the final six-column schema.
///
/// Rows whose category is not one of the three indexers, whose date cannot be read, or whose
/// `PU`/`Taxa Indicativa` is not a number are dropped. A missing column aborts the whole
/// cleaning with no partial output. Input that is already clean (no `sheet_name`, a valid
/// `Indexer`) comes back unchanged.
pub fn clean_dataset(df: &Table) -> Result<Table> {
    // Step 1: working columns. Already-cleaned input carries Indexer instead of sheet_name.
    let classify_from_indexer = df.column_index(config::SHEET_NAME).is_none()
        && df.column_index(config::INDEXER).is_some();
    let mut working_columns = DATASET_COLUMNS_TO_SELECT.to_vec();
    if classify_from_indexer {
        working_columns.retain(|c| *c != config::SHEET_NAME);
        working_columns.push(config::INDEXER);
    }
    let working = df.select(working_columns.as_slice())?;

    let code = working.require_column(config::CODE)?;
    let name = working.require_column(config::NAME)?;
    let pu = working.require_column(config::PU)?;
    let rate = working.require_column(config::INDICATIVE_RATE)?;
    let date = working.require_column(config::DATE)?;
    let category_col = working.require_column(if classify_from_indexer {
        config::INDEXER
    } else {
        config::SHEET_NAME
    })?;

    let mut cleaned = Table::new(&DATASET_FINAL_COLUMNS);
    let mut other_rows = 0usize;
    let mut bad_dates = 0usize;
    let mut bad_numbers = 0usize;

    for row in working.rows() {
        // Steps 2 and 3: classify, drop "Other".
        let category = row[category_col].as_deref().unwrap_or_default();
        let indexer = if classify_from_indexer {
            Indexer::from_label(category)
        } else {
            Indexer::classify(category)
        };
        let Some(indexer) = indexer else {
            other_rows += 1;
            continue;
        };

        // Step 4: dates.
        let Some(data) = row[date].as_deref().and_then(normalize_date) else {
            bad_dates += 1;
            continue;
        };

        // Steps 5 and 6: numeric coercion, drop missing.
        let number = |cell: &Cell| cell.as_deref().and_then(parse_number);
        let (Some(pu_value), Some(rate_value)) = (number(&row[pu]), number(&row[rate])) else {
            bad_numbers += 1;
            continue;
        };

        // Step 7: round and project.
        cleaned.push_row(vec![
            row[code].clone(),
            row[name].clone(),
            Some(round2(pu_value).to_string()),
            Some(round2(rate_value).to_string()),
            Some(data),
            Some(indexer.label().to_string()),
        ]);
    }

    if bad_dates > 0 {
        warn!(rows = bad_dates, "some dates could not be converted and were removed");
    }
    debug!(
        input = df.len(),
        output = cleaned.len(),
        other_rows,
        bad_numbers,
        "dataset cleaned"
    );
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn raw_table(rows: &[[&str; 6]]) -> Table {
        let mut table = Table::new(&DATASET_COLUMNS_TO_SELECT);
        for row in rows {
            table.push_row(
                row.iter()
                    .map(|v| (!v.is_empty()).then(|| v.to_string()))
                    .collect(),
            );
        }
        table
    }

    #[test]
    fn classifies_by_sheet_name() {
        assert_eq!(Indexer::classify("IPCA_SPREAD_X"), Some(Indexer::IpcaSpread));
        assert_eq!(Indexer::classify("DI_PERCENTUAL_Y"), Some(Indexer::DiPercentual));
        assert_eq!(Indexer::classify("DI_SPREAD_Z"), Some(Indexer::DiSpread));
        assert_eq!(Indexer::classify("FOO"), None);
    }

    #[test]
    fn normalizes_both_date_formats() {
        assert_eq!(normalize_date("20240919").as_deref(), Some("19/09/2024"));
        assert_eq!(normalize_date("19/09/2024").as_deref(), Some("19/09/2024"));
        assert_eq!(normalize_date("31/13/2024"), None);
        assert_eq!(normalize_date("2024-09-19"), None);
    }

    #[test]
    fn drops_other_bad_dates_and_non_numeric() {
        let raw = raw_table(&[
            ["ABCD11", "ACME", "1045.3049", "6.4951", "DI_SPREAD", "20240919"],
            ["EFGH22", "Foo", "100", "5", "FOO", "20240919"],
            ["IJKL33", "Bar", "100", "5", "IPCA_SPREAD", "31/13/2024"],
            ["MNOP44", "Baz", "N/D", "5", "DI_PERCENTUAL", "20240919"],
            ["QRST55", "Qux", "99.999", "", "DI_PERCENTUAL", "20240919"],
        ]);
        let cleaned = clean_dataset(&raw).unwrap();

        assert_eq!(cleaned.columns(), DATASET_FINAL_COLUMNS);
        assert_eq!(cleaned.len(), 1);
        let row: Vec<_> = cleaned.rows()[0].iter().map(|c| c.as_deref()).collect();
        assert_eq!(
            row,
            [
                Some("ABCD11"),
                Some("ACME"),
                Some("1045.3"),
                Some("6.5"),
                Some("19/09/2024"),
                Some("DI +")
            ]
        );
    }

    #[test]
    fn cleaning_clean_data_is_idempotent() {
        let raw = raw_table(&[
            ["ABCD11", "ACME", "1045.30", "6.49", "IPCA_SPREAD", "20240919"],
            ["EFGH22", "Foo", "98.1", "110", "DI_PERCENTUAL", "18/09/2024"],
        ]);
        let once = clean_dataset(&raw).unwrap();
        let twice = clean_dataset(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_column_aborts() {
        let table = Table::new(&["Código", "Nome"]);
        assert!(matches!(clean_dataset(&table), Err(Error::MissingColumn(_))));
    }

    #[test]
    fn rounds_to_two_places() {
        assert_eq!(round2(6.4951), 6.5);
        assert_eq!(round2(98.123).to_string(), "98.12");
        assert_eq!(round2(2.0).to_string(), "2");
    }
}
