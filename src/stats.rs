//! Summary statistics of score grids and scatter pairs.

use itertools::izip;
use ndarray::prelude::*;
use std::fmt::{self, Display};

/// Mean of the finite values, NaN if there are none.
pub fn nanmean(values: ArrayView2<f64>) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0_f64, 0usize), |(sum, count), v| (sum + *v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Area-weighted spatial mean of a regular lon/lat grid:
/// `sum(v * |cos(lat)|) / sum(|cos(lat)|)`. Missing cells add nothing to the
/// numerator, but their weight still counts in the denominator. NaN when no
/// cell is finite.
pub fn weighted_spatial_average(values: ArrayView2<f64>, cell_latitudes: ArrayView2<f64>) -> f64 {
    let init = (0.0_f64, 0.0_f64, 0_usize);
    let (num, den, finite) = izip!(values.iter(), cell_latitudes.iter()).fold(
        init,
        |(num, den, finite), (&v, lat)| {
            let w = lat.to_radians().cos().abs();
            if v.is_finite() {
                (num + v * w, den + w, finite + 1)
            } else {
                (num, den + w, finite)
            }
        },
    );
    if finite == 0 || den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

/// Ordinary least squares fit of `y` on `x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearRegression {
    /// slope of the fit
    pub slope: f64,
    /// intercept of the fit
    pub intercept: f64,
    /// Pearson correlation coefficient
    pub r: f64,
    /// number of pairs used
    pub n: usize,
}

impl LinearRegression {
    /// Fit `y = slope * x + intercept` over the pairs where both are present.
    /// `None` with fewer than two pairs or no spread in `x`.
    pub fn fit(x: ArrayView1<Option<f64>>, y: ArrayView1<Option<f64>>) -> Option<Self> {
        let pairs: Vec<(f64, f64)> = izip!(x.iter(), y.iter())
            .filter_map(|(x, y)| match (x, y) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((*x, *y)),
                _ => None,
            })
            .collect();
        let n = pairs.len();
        if n < 2 {
            return None;
        }
        let mean_x = pairs.iter().map(|(x, _)| *x).sum::<f64>() / n as f64;
        let mean_y = pairs.iter().map(|(_, y)| *y).sum::<f64>() / n as f64;
        let init = (0.0_f64, 0.0_f64, 0.0_f64);
        let (sxx, syy, sxy) = pairs.iter().fold(init, |(sxx, syy, sxy), &(x, y)| {
            let (dx, dy) = (x - mean_x, y - mean_y);
            (sxx + dx * dx, syy + dy * dy, sxy + dx * dy)
        });
        if sxx == 0.0 {
            return None;
        }
        let slope = sxy / sxx;
        let r = if syy == 0.0 {
            f64::NAN
        } else {
            sxy / (sxx * syy).sqrt()
        };
        Some(Self {
            slope,
            intercept: mean_y - slope * mean_x,
            r,
            n,
        })
    }
}

impl Display for LinearRegression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slope={:.3} intercept={:.3} r={:.2} r**2={:.2} n={}",
            self.slope,
            self.intercept,
            self.r,
            self.r * self.r,
            self.n
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_nanmean() {
        assert_abs_diff_eq!(nanmean(arr2(&[[1.0, f64::NAN], [3.0, 5.0]]).view()), 3.0);
        assert!(nanmean(arr2(&[[f64::NAN]]).view()).is_nan());
    }

    #[test]
    fn test_weighted_spatial_average() {
        let values = arr2(&[[1.0], [3.0], [f64::NAN]]);
        let lats = arr2(&[[0.0], [60.0], [0.0]]);
        // weights 1, 0.5 and 1; the missing cell still carries its weight
        assert_abs_diff_eq!(
            weighted_spatial_average(values.view(), lats.view()),
            (1.0 + 1.5) / 2.5,
            epsilon = 1e-12
        );
        let half_missing = arr2(&[[2.0], [f64::NAN]]);
        assert_abs_diff_eq!(
            weighted_spatial_average(half_missing.view(), arr2(&[[0.0], [0.0]]).view()),
            1.0,
            epsilon = 1e-12
        );
        let empty = arr2(&[[f64::NAN]]);
        assert!(weighted_spatial_average(empty.view(), arr2(&[[0.0]]).view()).is_nan());
    }

    #[test]
    fn test_linear_regression() {
        let x = arr1(&[Some(1.0), Some(2.0), None, Some(3.0), Some(4.0)]);
        let y = arr1(&[Some(3.0), Some(5.0), Some(100.0), Some(7.0), None]);
        let reg = LinearRegression::fit(x.view(), y.view()).unwrap();
        assert_eq!(reg.n, 3);
        assert_abs_diff_eq!(reg.slope, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(reg.intercept, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(reg.r, 1.0, epsilon = 1e-12);

        let flat = arr1(&[Some(1.0), Some(1.0)]);
        assert!(LinearRegression::fit(flat.view(), flat.view()).is_none());
        assert!(LinearRegression::fit(x.slice(s![..1]), y.slice(s![..1])).is_none());
    }
}
