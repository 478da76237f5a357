// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Useful constants.
//!
//! Angles are in degrees, heights in metres, temperatures in Kelvin.

/// Fill value CALIOP uses for missing layer heights and temperatures.
pub const CALIOP_FILL_VALUE: f64 = -9999.0;

/// Offset between degrees Celsius and Kelvin.
pub const CELSIUS_TO_KELVIN: f64 = 273.15;

/// CALIOP layer altitudes are given in kilometres.
pub const KM_TO_M: f64 = 1000.0;

/// CALIOP cloud fraction above which a footprint counts as cloudy.
pub const CALIOP_CLOUD_FRACTION_THRESHOLD: f64 = 0.5;

/// Solar zenith angle below which a pixel is in daylight.
pub const DAY_MAX_SUNZ: f64 = 80.0;

/// Solar zenith angle above which a pixel is in night.
pub const NIGHT_MIN_SUNZ: f64 = 95.0;

/// Default minimum number of contributing pixels for a stratified CTTH bias.
pub const DEFAULT_CTTH_MIN_COUNT: u64 = 10;

/// Cells with fewer observations than this are hidden when displayed.
pub const NOBS_DISPLAY_THRESHOLD: u64 = 50;

/// Default number of pixels per aggregation chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// Default target grid resolution in degrees.
pub const DEFAULT_GRID_RESOLUTION_DEG: f64 = 0.5;

/// Name of the reference instrument as it appears in score labels.
pub const REFERENCE_LABEL: &str = "CALIOP";

/// Name of the test instrument as it appears in score labels.
pub const TEST_LABEL: &str = "SEVIRI";
