#![warn(missing_docs)]
#![warn(clippy::missing_safety_doc)]
#![warn(clippy::missing_errors_doc)]

//! Cloudval is a library for validating gridded cloud products from a
//! geostationary imager (SEVIRI) against collocated lidar (CALIOP) retrievals.
//!
//! Pixels are masked by viewing and illumination geometry, classified into
//! contingency outcomes, binned onto a regular grid and reduced into per-cell
//! verification scores (cloud mask, cloud phase, cloud top height and
//! temperature).
//!
//! # Examples
//!
//! Score a handful of cloud mask pairs which all fall into a single cell.
//!
//! ```rust
//! use cloudval::{
//!     aggregate::SpatialAggregator,
//!     classify::classify_pairs,
//!     fields::CloudMask::{Clear, Cloudy},
//!     grid::CellIndex,
//!     scores::{binary_scores, BinaryTarget},
//! };
//! use ndarray::array;
//!
//! let index = CellIndex::new(array![0, 0, 0, 0], (1, 1));
//! let reference = array![Some(Cloudy), Some(Clear), Some(Clear), None];
//! let test = array![Some(Cloudy), Some(Cloudy), Some(Clear), Some(Clear)];
//!
//! // the last pixel has no reference value, so it is not counted
//! let outcomes = classify_pairs(reference.view(), test.view()).unwrap();
//! let aggregator = SpatialAggregator::new(&index, 2).unwrap();
//! let table = aggregator.contingency(outcomes.view()).unwrap();
//! assert_eq!(table.total(), 3);
//!
//! let scores = binary_scores(&table, BinaryTarget::CloudMask);
//! assert_eq!(scores.get("Hitrate").unwrap().values()[[0, 0]], 2.0 / 3.0);
//! ```
//!
//! # Details
//!
//! Collocated records are read from .csv with [`io::read_collocated`],
//! converted into [`PixelFields`] by [`extract::extract_fields`], and
//! validated once per masking combination by
//! [`pipeline::ValidationContext::validate`]. Score collections are written as
//! Python pickles by [`io::write_scores`] for an external renderer.

pub mod aggregate;
pub mod classify;
pub mod constants;
pub mod ctth;
pub mod error;
pub mod extract;
pub mod fields;
pub mod grid;
pub mod io;
pub mod masking;
pub mod pipeline;
pub mod scores;
pub mod stats;

cfg_if::cfg_if! {
    if #[cfg(feature = "cli")] {
        pub mod cli;
        pub use cli::CloudvalContext;
    }
}

#[cfg(test)]
mod test_common;

pub use ndarray;

pub use ctth::{CtthContext, CtthContextBuilder};
pub use error::ValidationError;
pub use extract::{extract_fields, DatasetKind, VfmDecoder};
pub use fields::{Geolocation, PixelFields};
pub use grid::{CellIndex, LatLonGrid, TargetGrid};
pub use masking::{IlluminationMode, MaskingContext, MaskingContextBuilder};
pub use pipeline::{ValidationContext, ValidationContextBuilder, ValidationOutput};
pub use scores::{ScoreCollection, ScoreGrid};

/// Run the statements, adding the time they took to the duration named
/// `$name` in the map `$durs`. Evaluates to the value of the statements.
#[macro_export]
macro_rules! with_increment_duration {
    ($durs:expr, $name:literal, $($s:stmt);+ $(;)?) => {
        {
            let _now = std::time::Instant::now();
            let _res = {
                $(
                    $s
                );*
            };
            *$durs
                .entry($name.into())
                .or_insert(std::time::Duration::default()) += _now.elapsed();
            _res
        }
    };
}
