//! A small string-celled table, enough to carry the spreadsheet and CSV data between stages.
//!
//! Missing values are `None`. On disk a missing value is an empty CSV field, so a table
//! survives a save/load cycle unchanged.

use std::path::Path;

use crate::error::{Error, Result};

pub type Cell = Option<String>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    /// Appends a row, padding or truncating it to the table width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    /// Sets `name` to `value` on every row, adding the column if it does not exist yet.
    pub fn set_constant_column(&mut self, name: &str, value: &str) {
        let index = match self.column_index(name) {
            Some(index) => index,
            None => {
                self.columns.push(name.to_string());
                self.rows.iter_mut().for_each(|r| r.push(None));
                self.columns.len() - 1
            }
        };
        for row in &mut self.rows {
            row[index] = Some(value.to_string());
        }
    }

    pub fn column_values<'a>(
        &'a self,
        name: &str,
    ) -> Result<impl Iterator<Item = Option<&'a str>> + 'a> {
        let index = self.require_column(name)?;
        Ok(self.rows.iter().map(move |r| r[index].as_deref()))
    }

    /// Projects the table onto `names`, in that order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Table> {
        let indices = names
            .iter()
            .map(|n| self.require_column(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Table {
            columns: names.iter().map(|n| n.as_ref().to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
                .collect(),
        })
    }

    /// Stacks tables vertically. Columns are unioned by name in first-seen order; cells of
    /// columns a table does not have are left missing.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }
        let mut combined = Table {
            columns,
            rows: Vec::new(),
        };
        for table in tables {
            let positions: Vec<usize> = table
                .columns
                .iter()
                .filter_map(|c| combined.column_index(c))
                .collect();
            for row in table.rows {
                let mut out = vec![None; combined.columns.len()];
                for (cell, &position) in row.into_iter().zip(&positions) {
                    out[position] = cell;
                }
                combined.rows.push(out);
            }
        }
        combined
    }

    pub fn read_csv<P: AsRef<Path>>(file_path: P) -> Result<Table> {
        let path = file_path.as_ref();
        let mut rdr = csv::Reader::from_path(path).map_err(|e| Error::csv(path, e))?;
        let headers = rdr.headers().map_err(|e| Error::csv(path, e))?.clone();
        let names: Vec<&str> = headers.iter().collect();
        let mut table = Table::new(names.as_slice());
        for record in rdr.records() {
            let record = record.map_err(|e| Error::csv(path, e))?;
            table.push_row(
                record
                    .iter()
                    .map(|field| (!field.is_empty()).then(|| field.to_string()))
                    .collect(),
            );
        }
        Ok(table)
    }

    pub fn write_csv<P: AsRef<Path>>(&self, file_path: P) -> Result<()> {
        let path = file_path.as_ref();
        let mut wtr = csv::Writer::from_path(path).map_err(|e| Error::csv(path, e))?;
        wtr.write_record(&self.columns)
            .map_err(|e| Error::csv(path, e))?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))
                .map_err(|e| Error::csv(path, e))?;
        }
        wtr.flush().map_err(|e| Error::io(path, e))?;
        tracing::debug!(path = %path.display(), rows = self.rows.len(), "table written");
        Ok(())
    }
}
