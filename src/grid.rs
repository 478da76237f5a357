//! Target grids and the pixel to cell index mapping.

use crate::{
    fields::{check_len, Geolocation},
    error::ConfigurationError,
    ValidationError,
};
use log::debug;
use ndarray::prelude::*;
use rayon::prelude::*;

/// A 2-D output grid that pixels can be binned onto.
///
/// Cells are numbered in row-major order, `0..rows*cols`.
pub trait TargetGrid {
    /// `(rows, cols)` of the grid.
    fn shape(&self) -> (usize, usize);

    /// The cell containing a location, or `None` if it falls outside the grid.
    fn cell_index(&self, lon: f64, lat: f64) -> Option<usize>;

    /// Latitude [deg] of the centre of every cell, in the grid's shape.
    fn cell_latitudes(&self) -> Array2<f64>;

    /// Total number of cells.
    fn size(&self) -> usize {
        let (rows, cols) = self.shape();
        rows * cols
    }

    /// Index every pixel of `geo` onto the grid.
    ///
    /// # Errors
    ///
    /// Will return [`ValidationError::ShapeMismatch`] if lon and lat differ in length.
    fn index(&self, geo: &Geolocation) -> Result<CellIndex, ValidationError>
    where
        Self: Sync,
    {
        check_len("lat", "TargetGrid::index", geo.lon.len(), geo.lat.len())?;
        let out_size = self.size();
        let lon = geo.lon.as_slice();
        let lat = geo.lat.as_slice();
        let idxs: Vec<usize> = match (lon, lat) {
            (Some(lon), Some(lat)) => lon
                .par_iter()
                .zip(lat.par_iter())
                .map(|(&lon, &lat)| self.cell_index(lon, lat).unwrap_or(out_size))
                .collect(),
            _ => geo
                .lon
                .iter()
                .zip(geo.lat.iter())
                .map(|(&lon, &lat)| self.cell_index(lon, lat).unwrap_or(out_size))
                .collect(),
        };
        let index = CellIndex::new(Array1::from(idxs), self.shape());
        debug!(
            "indexed {} pixels onto {:?} grid, {} outside",
            index.len(),
            self.shape(),
            index.num_outside()
        );
        Ok(index)
    }
}

/// Destination cell of every pixel. Any value `>= out_size` means the pixel
/// lies outside the grid and is ignored by aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellIndex {
    /// per-pixel cell index
    pub idxs: Array1<usize>,
    /// `(rows, cols)` of the target grid
    pub shape: (usize, usize),
}

impl CellIndex {
    /// Wrap a precomputed index.
    pub fn new(idxs: Array1<usize>, shape: (usize, usize)) -> Self {
        Self { idxs, shape }
    }

    /// Number of cells in the target grid.
    pub fn out_size(&self) -> usize {
        self.shape.0 * self.shape.1
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.idxs.len()
    }

    /// Whether there are no pixels.
    pub fn is_empty(&self) -> bool {
        self.idxs.is_empty()
    }

    /// Number of pixels outside the grid.
    pub fn num_outside(&self) -> usize {
        let out_size = self.out_size();
        self.idxs.iter().filter(|&&idx| idx >= out_size).count()
    }
}

/// A global regular longitude / latitude grid (plate carrée).
///
/// Row 0 is the northernmost row, column 0 starts at -180°.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLonGrid {
    resolution_deg: f64,
    rows: usize,
    cols: usize,
}

impl LatLonGrid {
    /// Create a global grid with square cells of `resolution_deg` degrees.
    ///
    /// # Errors
    ///
    /// Will return [`ConfigurationError::InvalidParameter`] unless the
    /// resolution is positive and divides 180° into whole cells.
    pub fn new(resolution_deg: f64) -> Result<Self, ConfigurationError> {
        let rows = 180.0 / resolution_deg;
        if !resolution_deg.is_finite()
            || resolution_deg <= 0.0
            || (rows - rows.round()).abs() > 1e-9
        {
            return Err(ConfigurationError::InvalidParameter {
                parameter: "grid resolution".into(),
                expected: "a positive number of degrees dividing 180".into(),
                received: format!("{}", resolution_deg),
            });
        }
        let rows = rows.round() as usize;
        Ok(Self {
            resolution_deg,
            rows,
            cols: 2 * rows,
        })
    }

    /// Size of a cell in degrees.
    pub fn resolution_deg(&self) -> f64 {
        self.resolution_deg
    }
}

impl TargetGrid for LatLonGrid {
    fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn cell_index(&self, lon: f64, lat: f64) -> Option<usize> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        let row = (((90.0 - lat) / self.resolution_deg) as usize).min(self.rows - 1);
        let col = (((lon + 180.0) / self.resolution_deg) as usize).min(self.cols - 1);
        Some(row * self.cols + col)
    }

    fn cell_latitudes(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.rows, self.cols), |(row, _)| {
            90.0 - (row as f64 + 0.5) * self.resolution_deg
        })
    }
}
