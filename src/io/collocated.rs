//! Reading collocated reference / test records from .csv

use super::error::IOError;
use crate::{extract::RawColumns, ValidationError};
use log::{debug, trace};
use ndarray::Array1;
use std::path::Path;

/// Parse one cell. Empty cells are missing and read as NaN.
fn parse_cell(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        Some(f64::NAN)
    } else {
        value.parse::<f64>().ok()
    }
}

/// Read the `columns` of the collocated .csv file at `path`.
///
/// The file must have a header row. Other columns are ignored.
///
/// # Errors
///
/// Will return:
/// - [`IOError::MissingColumn`] if a requested column is not in the header.
/// - [`IOError::ParseField`] if a cell is not a number.
/// - [`IOError::Csv`] for malformed files.
pub fn read_collocated(path: &Path, columns: &[&str]) -> Result<RawColumns, ValidationError> {
    trace!("start read_collocated");
    let mut reader = csv::Reader::from_path(path).map_err(IOError::from)?;
    let headers = reader.headers().map_err(IOError::from)?.clone();

    let positions = columns
        .iter()
        .map(|&column| {
            headers
                .iter()
                .position(|h| h.trim() == column)
                .ok_or_else(|| IOError::MissingColumn {
                    path: path.to_path_buf(),
                    column: column.into(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut values: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(IOError::from)?;
        for (&pos, (&column, column_values)) in
            positions.iter().zip(columns.iter().zip(values.iter_mut()))
        {
            let raw = record.get(pos).unwrap_or("");
            let value = parse_cell(raw).ok_or_else(|| IOError::ParseField {
                path: path.to_path_buf(),
                row: row + 1,
                column: column.into(),
                value: raw.into(),
            })?;
            column_values.push(value);
        }
    }

    let len = values.first().map_or(0, Vec::len);
    debug!("read {} records from {}", len, path.display());
    let mut raw = RawColumns::new(path, len);
    for (&column, column_values) in columns.iter().zip(values) {
        raw.insert(column, Array1::from_vec(column_values))?;
    }
    trace!("end read_collocated");
    Ok(raw)
}
