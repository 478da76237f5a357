//! Errors that can occur in cloudval

use crate::io::error::IOError;
use thiserror::Error;

#[derive(Error, Debug)]
/// Errors raised while resolving the configuration of a validation run.
///
/// These are always raised before any aggregation takes place.
pub enum ConfigurationError {
    /// The dataset kind names neither of the supported test products.
    #[error("Unknown dataset kind {received}, expected one of {expected}")]
    UnknownDatasetKind {
        /// The kinds that are understood
        expected: String,
        /// The value that was given
        received: String,
    },

    /// The illumination mode is not one of ALL, DAY, NIGHT, TWILIGHT.
    #[error("Unknown illumination mode {received}, expected one of {expected}")]
    UnknownIlluminationMode {
        /// The modes that are understood
        expected: String,
        /// The value that was given
        received: String,
    },

    /// A numeric parameter is out of its valid range.
    #[error("Invalid value for {parameter}: expected {expected}, received {received}")]
    InvalidParameter {
        /// The name of the parameter
        parameter: String,
        /// A description of the valid range
        expected: String,
        /// The value that was given
        received: String,
    },
}

#[derive(Error, Debug)]
/// Errors relating to CLI invocation
pub enum CLIError {
    /// Invalid Command Line Argument
    #[error("Invalid Command Line Argument {option}. Expected {expected}. Received {received}")]
    InvalidCommandLineArgument {
        /// The argument name within the context
        option: String,
        /// Explanation of what is expected
        expected: String,
        /// String representation of what was received
        received: String,
    },
}

#[derive(Error, Debug)]
#[allow(clippy::upper_case_acronyms)]
/// All the errors that can occur in cloudval
pub enum ValidationError {
    /// Error derived from [`ConfigurationError`]
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// Error for bad array shape in provided argument
    #[error("Argument {argument} to {function} has bad shape. Expected {expected}, received {received}")]
    ShapeMismatch {
        /// The argument name within the function
        argument: String,
        /// The function name
        function: String,
        /// The expected shape
        expected: String,
        /// The shape that was received instead
        received: String,
    },

    /// Error derived from [`IOError`]
    #[error("{0}")]
    IO(#[from] IOError),

    /// Error derived from [`CLIError`]
    #[error("{0}")]
    CLIError(#[from] CLIError),

    #[cfg(feature = "cli")]
    /// Error derived from [`clap::Error`]
    #[error("{0}")]
    ClapError(#[from] clap::Error),

    /// Dry run, no work was done.
    #[error("Dry run")]
    DryRun {},
}
