use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use serde::Serialize;

use crate::error::DeliveryError;

/// One input row. `row` is the line number in the source sheet, header = 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub row: usize,
    pub values: Vec<(String, String)>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Like [`Record::get`], but an absent or blank value is an error.
    pub fn require(&self, column: &str) -> Result<&str, DeliveryError> {
        self.get(column)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| DeliveryError::MissingValue {
                row: self.row,
                column: column.to_string(),
            })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

impl Table {
    /// Builds a table from data rows that directly follow the header line.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let numbered = rows
            .into_iter()
            .enumerate()
            .map(|(idx, cells)| (idx + 2, cells))
            .collect();
        Self::from_numbered_rows(headers, numbered)
    }

    /// Builds a table from `(source line, cells)` pairs.
    pub fn from_numbered_rows(headers: Vec<String>, rows: Vec<(usize, Vec<String>)>) -> Self {
        let headers = headers
            .into_iter()
            .map(|header| header.trim().to_string())
            .collect::<Vec<_>>();
        let records = rows
            .into_iter()
            .filter(|(_, cells)| cells.iter().any(|cell| !cell.trim().is_empty()))
            .map(|(row, cells)| Record {
                row,
                values: headers
                    .iter()
                    .cloned()
                    .zip(cells.into_iter().chain(std::iter::repeat(String::new())))
                    .collect(),
            })
            .collect();
        Self { headers, records }
    }

    pub fn require_columns(&self, columns: &[&str]) -> Result<(), DeliveryError> {
        for column in columns {
            if !self.headers.iter().any(|header| header == column) {
                return Err(DeliveryError::MissingColumn(column.to_string()));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn read_table(path: &Path) -> Result<Table, DeliveryError> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => read_delimited(path, b','),
        "tsv" | "txt" => read_delimited(path, b'\t'),
        "xlsx" | "xlsm" | "xls" | "ods" => read_workbook(path),
        _ => Err(DeliveryError::UnsupportedInput(path.to_path_buf())),
    }
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<Table, DeliveryError> {
    let table_err = |message: String| DeliveryError::TableRead {
        path: path.to_path_buf(),
        message,
    };
    // TSV exports embed quoted list literals verbatim, so quotes carry no meaning there.
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .quoting(delimiter != b'\t')
        .flexible(true)
        .from_path(path)
        .map_err(|err| table_err(err.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|err| table_err(err.to_string()))?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').to_string())
        .collect::<Vec<_>>();

    // The reader skips blank lines, so line numbers come from the record position.
    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|err| table_err(err.to_string()))?;
        let line = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or(idx + 2);
        rows.push((line, record.iter().map(str::to_string).collect()));
    }
    Ok(Table::from_numbered_rows(headers, rows))
}

fn read_workbook(path: &Path) -> Result<Table, DeliveryError> {
    let table_err = |message: String| DeliveryError::TableRead {
        path: path.to_path_buf(),
        message,
    };
    let mut workbook = open_workbook_auto(path).map_err(|err| table_err(err.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| table_err("workbook has no sheets".to_string()))?
        .map_err(|err| table_err(err.to_string()))?;

    // The range begins at the first used cell, not necessarily at A1.
    let header_line = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Table::default());
    };
    let headers = header_row.iter().map(cell_to_string).collect();
    let rows = rows
        .enumerate()
        .map(|(idx, row)| (header_line + idx + 1, row.iter().map(cell_to_string).collect()))
        .collect();
    Ok(Table::from_numbered_rows(headers, rows))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(value) => value.clone(),
        Data::Int(value) => value.to_string(),
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", *value as i64)
        }
        other => other.to_string(),
    }
}
