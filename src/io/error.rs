//! Errors that can occur in the io module

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
#[allow(clippy::upper_case_acronyms)]
/// All the errors that can occur in file io operations
pub enum IOError {
    /// The collocation file has no column with the required name.
    #[error("Collocation file {path} is missing column {column}")]
    MissingColumn {
        /// The path of the collocation file
        path: PathBuf,
        /// The column that was expected
        column: String,
    },

    /// A cell in the collocation file could not be parsed as a number.
    #[error("{path} row {row}, column {column}: could not parse {value:?} as a number")]
    ParseField {
        /// The path of the collocation file
        path: PathBuf,
        /// The 1-based data row
        row: usize,
        /// The column name
        column: String,
        /// The raw text of the cell
        value: String,
    },

    #[error("{0}")]
    /// Error derived from [`csv::Error`]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    /// Error derived from [`serde_pickle::Error`]
    Pickle(#[from] serde_pickle::Error),

    #[error("{0}")]
    /// Error derived from [`std::io::Error`]
    StdIO(#[from] std::io::Error),
}
