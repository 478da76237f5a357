//! Spatial aggregation of per-pixel values onto grid cells.
//!
//! Pixels are split into fixed-size chunks which are reduced in parallel.
//! Each chunk yields a sparse list of per-cell partials; partials are then
//! merged into the dense output in chunk order, so results are identical
//! between runs with the same input and chunk size.

use crate::{
    classify::Outcome,
    error::ConfigurationError,
    fields::check_len,
    grid::CellIndex,
    ValidationError,
};
use itertools::izip;
use log::trace;
use ndarray::prelude::*;
use rayon::prelude::*;
use std::cmp::min;

/// Running sum and count of the defined values in a cell.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanAccumulator {
    /// sum of the defined values
    pub sum: f64,
    /// number of defined values
    pub count: u64,
}

impl MeanAccumulator {
    fn push(&mut self, value: Option<f64>) {
        if let Some(value) = value.filter(|v| v.is_finite()) {
            self.sum += value;
            self.count += 1;
        }
    }

    fn merge(&mut self, other: &Self) {
        self.sum += other.sum;
        self.count += other.count;
    }

    /// `sum / count`, or NaN for an empty cell.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Per-cell contingency counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContingencyTable {
    /// hits
    pub a: Array2<u64>,
    /// false alarms
    pub b: Array2<u64>,
    /// misses
    pub c: Array2<u64>,
    /// correct negatives
    pub d: Array2<u64>,
}

impl ContingencyTable {
    /// `a + b + c + d` per cell.
    pub fn n(&self) -> Array2<u64> {
        &self.a + &self.b + &self.c + &self.d
    }

    /// Total number of classified pixels that landed on the grid.
    pub fn total(&self) -> u64 {
        self.a.sum() + self.b.sum() + self.c.sum() + self.d.sum()
    }

    /// Grid shape.
    pub fn dim(&self) -> (usize, usize) {
        self.a.dim()
    }
}

/// Reduces per-pixel arrays onto the cells of a [`CellIndex`].
#[derive(Debug, Clone, Copy)]
pub struct SpatialAggregator<'a> {
    index: &'a CellIndex,
    chunk_size: usize,
}

impl<'a> SpatialAggregator<'a> {
    /// Create an aggregator over `index`, processing `chunk_size` pixels per task.
    ///
    /// # Errors
    ///
    /// Will return [`ConfigurationError::InvalidParameter`] if `chunk_size` is 0.
    pub fn new(index: &'a CellIndex, chunk_size: usize) -> Result<Self, ConfigurationError> {
        if chunk_size == 0 {
            return Err(ConfigurationError::InvalidParameter {
                parameter: "chunk size".into(),
                expected: "a positive, non-zero integer".into(),
                received: "0".into(),
            });
        }
        Ok(Self { index, chunk_size })
    }

    /// The cell index being aggregated onto.
    pub fn index(&self) -> &CellIndex {
        self.index
    }

    fn reduce<T, A, F, M>(
        &self,
        values: ArrayView1<T>,
        function: &str,
        accumulate: F,
        merge: M,
    ) -> Result<Array2<A>, ValidationError>
    where
        T: Copy + Send + Sync,
        A: Default + Clone + Send,
        F: Fn(&mut A, T) + Sync,
        M: Fn(&mut A, &A),
    {
        check_len("values", function, self.index.len(), values.len())?;
        let out_size = self.index.out_size();
        let num_pixels = values.len();
        let num_chunks = (num_pixels + self.chunk_size - 1) / self.chunk_size;
        let idxs = self.index.idxs.view();

        let partials: Vec<Vec<(usize, A)>> = (0..num_chunks)
            .into_par_iter()
            .map(|chunk_idx| {
                let start = chunk_idx * self.chunk_size;
                let end = min(start + self.chunk_size, num_pixels);
                let mut pixels: Vec<(usize, T)> = izip!(
                    idxs.slice(s![start..end]).iter(),
                    values.slice(s![start..end]).iter()
                )
                .filter(|(idx, _)| **idx < out_size)
                .map(|(&idx, &value)| (idx, value))
                .collect();
                // stable, so pixels keep their order within a cell
                pixels.sort_by_key(|&(idx, _)| idx);

                let mut cells: Vec<(usize, A)> = Vec::new();
                for (idx, value) in pixels {
                    if let Some((last, acc)) = cells.last_mut() {
                        if *last == idx {
                            accumulate(acc, value);
                            continue;
                        }
                    }
                    let mut acc = A::default();
                    accumulate(&mut acc, value);
                    cells.push((idx, acc));
                }
                cells
            })
            .collect();

        let mut out = vec![A::default(); out_size];
        for cells in &partials {
            for (idx, acc) in cells {
                merge(&mut out[*idx], acc);
            }
        }
        Array2::from_shape_vec(self.index.shape, out).map_err(|_| ValidationError::ShapeMismatch {
            argument: "index.shape".into(),
            function: function.into(),
            expected: format!("rows * cols = {}", out_size),
            received: format!("{:?}", self.index.shape),
        })
    }

    /// Number of true values per cell.
    ///
    /// # Errors
    ///
    /// Will return [`ValidationError::ShapeMismatch`] if `indicator` and the
    /// index differ in length.
    pub fn sum(&self, indicator: ArrayView1<bool>) -> Result<Array2<u64>, ValidationError> {
        trace!("start SpatialAggregator::sum");
        self.reduce(
            indicator,
            "SpatialAggregator::sum",
            |acc: &mut u64, value: bool| *acc += u64::from(value),
            |acc, other| *acc += other,
        )
    }

    /// Sum and count of the defined values per cell.
    ///
    /// # Errors
    ///
    /// Will return [`ValidationError::ShapeMismatch`] if `values` and the
    /// index differ in length.
    pub fn accumulate(
        &self,
        values: ArrayView1<Option<f64>>,
    ) -> Result<Array2<MeanAccumulator>, ValidationError> {
        self.reduce(
            values,
            "SpatialAggregator::accumulate",
            |acc: &mut MeanAccumulator, value| acc.push(value),
            MeanAccumulator::merge,
        )
    }

    /// Mean of the defined values per cell. Missing (and non-finite)
    /// values are left out of both numerator and denominator; a cell with no
    /// defined values is NaN.
    ///
    /// # Errors
    ///
    /// Will return [`ValidationError::ShapeMismatch`] if `values` and the
    /// index differ in length.
    pub fn average(&self, values: ArrayView1<Option<f64>>) -> Result<Array2<f64>, ValidationError> {
        trace!("start SpatialAggregator::average");
        Ok(self.accumulate(values)?.mapv(|acc| acc.mean()))
    }

    /// Contingency counts per cell, in a single pass.
    ///
    /// # Errors
    ///
    /// Will return [`ValidationError::ShapeMismatch`] if `outcomes` and the
    /// index differ in length.
    pub fn contingency(
        &self,
        outcomes: ArrayView1<Option<Outcome>>,
    ) -> Result<ContingencyTable, ValidationError> {
        trace!("start SpatialAggregator::contingency");
        let counts = self.reduce(
            outcomes,
            "SpatialAggregator::contingency",
            |acc: &mut [u64; 4], outcome| match outcome {
                Some(Outcome::Hit) => acc[0] += 1,
                Some(Outcome::FalseAlarm) => acc[1] += 1,
                Some(Outcome::Miss) => acc[2] += 1,
                Some(Outcome::CorrectNegative) => acc[3] += 1,
                None => {}
            },
            |acc, other| {
                for (a, o) in acc.iter_mut().zip(other.iter()) {
                    *a += o;
                }
            },
        )?;
        Ok(ContingencyTable {
            a: counts.mapv(|c| c[0]),
            b: counts.mapv(|c| c[1]),
            c: counts.mapv(|c| c[2]),
            d: counts.mapv(|c| c[3]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classify::{classify_pairs, Indicators},
        test_common::{synthetic_fields, Lcg},
    };
    use approx::assert_abs_diff_eq;

    fn random_index(n: usize, shape: (usize, usize)) -> CellIndex {
        let mut rng = Lcg::new(3);
        let out_size = shape.0 * shape.1;
        // some pixels fall outside the grid
        let idxs = (0..n).map(|_| rng.below(out_size + 3)).collect::<Vec<_>>();
        CellIndex::new(Array1::from(idxs), shape)
    }

    #[test]
    fn test_sum_simple() {
        let index = CellIndex::new(arr1(&[0, 1, 1, 3, 4, 99]), (2, 2));
        let agg = SpatialAggregator::new(&index, 2).unwrap();
        let sums = agg
            .sum(arr1(&[true, true, true, false, true, true]).view())
            .unwrap();
        assert_eq!(sums, arr2(&[[1, 2], [0, 0]]));
    }

    #[test]
    fn test_average_ignores_missing() {
        let index = CellIndex::new(arr1(&[0, 0, 0, 1, 2]), (1, 3));
        let agg = SpatialAggregator::new(&index, 2).unwrap();
        let avg = agg
            .average(arr1(&[Some(1.0), None, Some(3.0), None, Some(f64::NAN)]).view())
            .unwrap();
        assert_abs_diff_eq!(avg[[0, 0]], 2.0);
        assert!(avg[[0, 1]].is_nan());
        assert!(avg[[0, 2]].is_nan());
    }

    #[test]
    fn test_zero_chunk_size() {
        let index = CellIndex::new(arr1(&[0]), (1, 1));
        assert!(SpatialAggregator::new(&index, 0).is_err());
    }

    #[test]
    fn test_length_mismatch() {
        let index = CellIndex::new(arr1(&[0, 0]), (1, 1));
        let agg = SpatialAggregator::new(&index, 10).unwrap();
        assert!(matches!(
            agg.sum(arr1(&[true]).view()),
            Err(ValidationError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_contingency_matches_indicator_sums() {
        let n = 2_000;
        let fields = synthetic_fields(n);
        let index = random_index(n, (4, 5));
        let agg = SpatialAggregator::new(&index, 128).unwrap();
        let outcomes = classify_pairs(fields.ref_mask.view(), fields.test_mask.view()).unwrap();
        let table = agg.contingency(outcomes.view()).unwrap();
        let ind = Indicators::from_outcomes(outcomes.view());
        assert_eq!(table.a, agg.sum(ind.a.view()).unwrap());
        assert_eq!(table.b, agg.sum(ind.b.view()).unwrap());
        assert_eq!(table.c, agg.sum(ind.c.view()).unwrap());
        assert_eq!(table.d, agg.sum(ind.d.view()).unwrap());

        // n equals the number of valid pixels inside the grid
        let expected = izip!(outcomes.iter(), index.idxs.iter())
            .filter(|(o, idx)| o.is_some() && **idx < index.out_size())
            .count() as u64;
        assert_eq!(table.total(), expected);
        assert_eq!(table.n().sum(), expected);
    }

    #[test]
    fn test_chunk_size_does_not_change_counts() {
        let n = 1_000;
        let fields = synthetic_fields(n);
        let index = random_index(n, (3, 3));
        let outcomes = classify_pairs(fields.ref_phase.view(), fields.test_phase.view()).unwrap();
        let small = SpatialAggregator::new(&index, 7).unwrap();
        let large = SpatialAggregator::new(&index, 10_000).unwrap();
        assert_eq!(
            small.contingency(outcomes.view()).unwrap(),
            large.contingency(outcomes.view()).unwrap()
        );
        let a = small.average(fields.ref_height.view()).unwrap();
        let b = large.average(fields.ref_height.view()).unwrap();
        for (a, b) in a.iter().zip(b.iter()) {
            assert!((a.is_nan() && b.is_nan()) || (a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_permutation_commutativity() {
        let n = 1_500;
        let fields = synthetic_fields(n);
        let index = random_index(n, (5, 4));
        let outcomes = classify_pairs(fields.ref_mask.view(), fields.test_mask.view()).unwrap();

        // reverse pixel order, keeping pixels paired with their cells
        let rev_idxs: Array1<usize> = index.idxs.slice(s![..;-1]).to_owned();
        let rev_index = CellIndex::new(rev_idxs, index.shape);
        let rev_outcomes = outcomes.slice(s![..;-1]).to_owned();
        let rev_heights = fields.test_height.slice(s![..;-1]).to_owned();

        let agg = SpatialAggregator::new(&index, 64).unwrap();
        let rev_agg = SpatialAggregator::new(&rev_index, 64).unwrap();
        assert_eq!(
            agg.contingency(outcomes.view()).unwrap(),
            rev_agg.contingency(rev_outcomes.view()).unwrap()
        );
        let avg = agg.average(fields.test_height.view()).unwrap();
        let rev_avg = rev_agg.average(rev_heights.view()).unwrap();
        for (a, b) in avg.iter().zip(rev_avg.iter()) {
            assert!((a.is_nan() && b.is_nan()) || (a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_deterministic() {
        let n = 3_000;
        let fields = synthetic_fields(n);
        let index = random_index(n, (6, 6));
        let agg = SpatialAggregator::new(&index, 100).unwrap();
        let first = agg.average(fields.ref_temperature.view()).unwrap();
        let second = agg.average(fields.ref_temperature.view()).unwrap();
        for (a, b) in first.iter().zip(second.iter()) {
            assert!(a.to_bits() == b.to_bits());
        }
    }
}
