use std::io::Cursor;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use tracing::{error, info, warn};

use crate::business_days::BusinessDay;
use crate::config;
use crate::error::{Error, Result};
use crate::table::{Cell, Table};

/// Number of rows above the data block: a title row followed by 8 rows of metadata.
pub const HEADER_ROWS: u32 = 9;

/// Turns one worksheet into a table with the canonical column names.
pub trait SheetLayout {
    fn columns(&self) -> &[String];

    fn normalize(&self, sheet: &str, range: &Range<Data>) -> Result<Table>;
}

/// Assigns names by column position after skipping a fixed header block. Upstream layout
/// changes go unnoticed as long as the sheet keeps its width.
#[derive(Debug, Clone)]
pub struct PositionalLayout {
    pub header_rows: u32,
    pub columns: Vec<String>,
}

impl Default for PositionalLayout {
    fn default() -> Self {
        Self {
            header_rows: HEADER_ROWS,
            columns: config::COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl SheetLayout for PositionalLayout {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn normalize(&self, sheet: &str, range: &Range<Data>) -> Result<Table> {
        let mut table = Table::new(self.columns.as_slice());
        let Some((last_row, last_col)) = range.end() else {
            return Ok(table);
        };
        let width = last_col as usize + 1;
        if width != self.columns.len() {
            return Err(Error::Parse {
                sheet: sheet.to_string(),
                reason: format!(
                    "expected {} columns, found {width}",
                    self.columns.len()
                ),
            });
        }
        let name_index = table.require_column(config::NAME)?;
        for row in self.header_rows..=last_row {
            let cells: Vec<Cell> = (0..=last_col)
                .map(|col| range.get_value((row, col)).and_then(cell_text))
                .collect();
            if cells[name_index].is_none() || cells.iter().all(Option::is_none) {
                continue;
            }
            table.push_row(cells);
        }
        Ok(table)
    }
}

fn cell_text(data: &Data) -> Cell {
    let text = match data {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
    };
    (!text.is_empty()).then_some(text)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedSheet {
    pub name: String,
    pub table: Table,
}

/// Parses every worksheet of a downloaded spreadsheet. A sheet that fails to parse comes back
/// empty; a workbook that cannot be opened yields no sheets at all.
pub fn process_sheets<L: SheetLayout + ?Sized>(
    file_data: &[u8],
    day: &BusinessDay,
    layout: &L,
) -> Vec<ExtractedSheet> {
    let mut workbook = match open_workbook_auto_from_rs(Cursor::new(file_data.to_vec())) {
        Ok(workbook) => workbook,
        Err(e) => {
            error!(%day, "cannot open spreadsheet: {e}");
            return Vec::new();
        }
    };

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let table = workbook
            .worksheet_range(&name)
            .map_err(|e| Error::Parse {
                sheet: name.clone(),
                reason: e.to_string(),
            })
            .and_then(|range| layout.normalize(&name, &range))
            .unwrap_or_else(|e| {
                warn!(%day, sheet = %name, "{e}");
                Table::new(layout.columns())
            });
        info!(%day, sheet = %name, rows = table.len(), "sheet extracted");
        sheets.push(ExtractedSheet { name, table });
    }
    sheets
}

pub fn source_file_name(day: &BusinessDay, sheet: &str) -> String {
    format!("{day}-{sheet}.csv")
}

/// Writes each non-empty sheet to `{day}-{sheet}.csv` under `folder`.
pub fn save_sheets<P: AsRef<Path>>(
    folder: P,
    day: &BusinessDay,
    sheets: &[ExtractedSheet],
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for sheet in sheets.iter().filter(|s| !s.table.is_empty()) {
        let file_path = folder.as_ref().join(source_file_name(day, &sheet.name));
        sheet.table.write_csv(&file_path)?;
        info!(path = %file_path.display(), "file saved");
        written.push(file_path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet_with_rows(rows: &[Vec<String>]) -> Range<Data> {
        let last_row = HEADER_ROWS + rows.len() as u32 - 1;
        let mut range = Range::new((0, 0), (last_row, 14));
        range.set_value((0, 0), Data::String("Mercado Secundário de Debêntures".into()));
        for (offset, row) in rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    range.set_value(
                        (HEADER_ROWS + offset as u32, col as u32),
                        Data::String(value.clone()),
                    );
                }
            }
        }
        range
    }

    fn row(code: &str, name: &str) -> Vec<String> {
        let mut r = vec![String::new(); 15];
        r[0] = code.to_string();
        r[1] = name.to_string();
        r[6] = "6.5".to_string();
        r[10] = "1045.3".to_string();
        r
    }

    #[test]
    fn skips_header_and_names_columns_by_position() {
        let range = sheet_with_rows(&[row("ABCD11", "ACME S.A."), row("EFGH22", "Foo")]);
        let table = PositionalLayout::default().normalize("DI_SPREAD", &range).unwrap();

        assert_eq!(table.columns()[1], "Nome");
        assert_eq!(table.len(), 2);
        let pu: Vec<_> = table.column_values("PU").unwrap().collect();
        assert_eq!(pu, [Some("1045.3"), Some("1045.3")]);
    }

    #[test]
    fn drops_rows_without_name_and_blank_rows() {
        let blank = vec![String::new(); 15];
        let range = sheet_with_rows(&[row("ABCD11", ""), blank, row("EFGH22", "Foo")]);
        let table = PositionalLayout::default().normalize("IPCA_SPREAD", &range).unwrap();
        let codes: Vec<_> = table.column_values("Código").unwrap().collect();
        assert_eq!(codes, [Some("EFGH22")]);
    }

    #[test]
    fn wrong_width_is_a_parse_error() {
        let mut range = Range::new((0, 0), (10, 3));
        range.set_value((10, 3), Data::Float(1.0));
        let err = PositionalLayout::default().normalize("X", &range).unwrap_err();
        assert!(matches!(err, Error::Parse { sheet, .. } if sheet == "X"));
    }

    fn daily_workbook() -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        {
            let sheet = workbook.add_worksheet().set_name("DI_SPREAD").unwrap();
            sheet.write_string(0, 0, "Mercado Secundário de Debêntures").unwrap();
            sheet.write_string(3, 0, "Data de Referência: 19/09/2024").unwrap();
            sheet.write_string(9, 0, "ABCD11").unwrap();
            sheet.write_string(9, 1, "ACME S.A.").unwrap();
            sheet.write_number(9, 6, 6.4951).unwrap();
            sheet.write_number(9, 10, 1045.3049).unwrap();
            sheet.write_string(9, 14, "B50").unwrap();
            // A footnote without issuer name.
            sheet.write_string(10, 0, "* Taxa calculada").unwrap();
        }
        {
            let sheet = workbook.add_worksheet().set_name("IPCA_SPREAD").unwrap();
            sheet.write_string(0, 0, "Layout changed").unwrap();
            sheet.write_number(9, 3, 1.0).unwrap();
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn reads_a_real_workbook() {
        let day = BusinessDay::parse("20240919").unwrap();
        let sheets = process_sheets(&daily_workbook(), &day, &PositionalLayout::default());

        let names: Vec<&str> = sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["DI_SPREAD", "IPCA_SPREAD"]);

        let di = &sheets[0].table;
        assert_eq!(di.len(), 1);
        let value = |column: &str| di.column_values(column).unwrap().next().unwrap();
        assert_eq!(value("Código"), Some("ABCD11"));
        assert_eq!(value("Nome"), Some("ACME S.A."));
        assert_eq!(value("Taxa Indicativa"), Some("6.4951"));
        assert_eq!(value("PU"), Some("1045.3049"));
        assert_eq!(value("Referência NTN-B"), Some("B50"));
        assert_eq!(value("Duration"), None);

        // Too narrow for the positional layout: kept, but empty.
        assert!(sheets[1].table.is_empty());
        assert_eq!(sheets[1].table.columns().len(), 15);
    }

    #[test]
    fn unreadable_bytes_yield_no_sheets() {
        let day = BusinessDay::parse("20240919").unwrap();
        let sheets = process_sheets(b"not a spreadsheet", &day, &PositionalLayout::default());
        assert!(sheets.is_empty());
    }

    #[test]
    fn empty_sheets_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let day = BusinessDay::parse("20240919").unwrap();
        let range = sheet_with_rows(&[row("ABCD11", "ACME")]);
        let sheets = vec![
            ExtractedSheet {
                name: "DI_SPREAD".into(),
                table: PositionalLayout::default().normalize("DI_SPREAD", &range).unwrap(),
            },
            ExtractedSheet {
                name: "EMPTY".into(),
                table: Table::new(&config::COLUMNS),
            },
        ];
        let written = save_sheets(dir.path(), &day, &sheets).unwrap();
        assert_eq!(written, [dir.path().join("20240919-DI_SPREAD.csv")]);
    }
}
