//! Verification scores derived from contingency tables, and the ordered
//! collections they are delivered in.
//!
//! Every score is NaN where its denominator is zero.

use crate::{
    aggregate::ContingencyTable,
    constants::{REFERENCE_LABEL, TEST_LABEL},
};
use itertools::izip;
use ndarray::{prelude::*, Zip};
use serde::Serialize;
use std::fmt::{self, Display};

/// Colour palette a renderer should use for a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Palette {
    /// general purpose
    #[serde(rename = "rainbow")]
    Rainbow,
    /// diverging, centred on zero
    #[serde(rename = "bwr")]
    Bwr,
    /// sequential
    #[serde(rename = "Reds")]
    Reds,
}

impl Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rainbow => "rainbow",
            Self::Bwr => "bwr",
            Self::Reds => "Reds",
        };
        write!(f, "{}", name)
    }
}

/// One named score: a grid of values plus display hints.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreGrid {
    values: Array2<f64>,
    vmin: Option<f64>,
    vmax: Option<f64>,
    palette: Palette,
}

impl ScoreGrid {
    /// Create a score grid. `None` display limits are unbounded.
    pub fn new(values: Array2<f64>, vmin: Option<f64>, vmax: Option<f64>, palette: Palette) -> Self {
        Self {
            values,
            vmin,
            vmax,
            palette,
        }
    }

    /// A score with a fixed display range.
    pub fn bounded(values: Array2<f64>, vmin: f64, vmax: f64, palette: Palette) -> Self {
        Self::new(values, Some(vmin), Some(vmax), palette)
    }

    /// A score with no display range.
    pub fn unbounded(values: Array2<f64>, palette: Palette) -> Self {
        Self::new(values, None, None, palette)
    }

    /// Per-cell values, NaN where missing.
    pub fn values(&self) -> ArrayView2<f64> {
        self.values.view()
    }

    /// Lower display limit.
    pub fn vmin(&self) -> Option<f64> {
        self.vmin
    }

    /// Upper display limit.
    pub fn vmax(&self) -> Option<f64> {
        self.vmax
    }

    /// Display palette.
    pub fn palette(&self) -> Palette {
        self.palette
    }

    /// A copy with cells set to NaN where `counts < threshold`.
    pub fn suppressed(&self, counts: ArrayView2<u64>, threshold: u64) -> Self {
        Self {
            values: suppress_below(self.values.view(), counts, threshold),
            ..self.clone()
        }
    }
}

/// An insertion-ordered collection of named score grids. The order is the
/// order in which a renderer lays the scores out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreCollection {
    entries: Vec<(String, ScoreGrid)>,
}

impl ScoreCollection {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a score. A later score with the same name replaces the
    /// earlier one in place.
    pub fn push(&mut self, name: impl Into<String>, grid: ScoreGrid) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = grid,
            None => self.entries.push((name, grid)),
        }
    }

    /// Look up a score by name.
    pub fn get(&self, name: &str) -> Option<&ScoreGrid> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, grid)| grid)
    }

    /// Score names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// `(name, grid)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScoreGrid)> {
        self.entries.iter().map(|(name, grid)| (name.as_str(), grid))
    }

    /// Number of scores.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no scores.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A copy where every score is suppressed below `threshold` counts.
    pub fn suppressed(&self, counts: ArrayView2<u64>, threshold: u64) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(name, grid)| (name.clone(), grid.suppressed(counts, threshold)))
                .collect(),
        }
    }

    /// A copy where every score except the count itself is suppressed in cells
    /// whose [`NOBS`] count is below `threshold`. Collections without a count
    /// are returned unchanged.
    pub fn suppressed_by_nobs(&self, threshold: u64) -> Self {
        let counts = match self.get(NOBS) {
            Some(nobs) => nobs
                .values()
                .mapv(|n| if n.is_finite() && n > 0.0 { n as u64 } else { 0 }),
            None => return self.clone(),
        };
        Self {
            entries: self
                .entries
                .iter()
                .map(|(name, grid)| {
                    if name == NOBS {
                        (name.clone(), grid.clone())
                    } else {
                        (name.clone(), grid.suppressed(counts.view(), threshold))
                    }
                })
                .collect(),
        }
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        f64::NAN
    } else {
        num as f64 / den as f64
    }
}

/// `(a + d) / n`
pub fn hitrate(a: u64, b: u64, c: u64, d: u64) -> f64 {
    ratio(a + d, a + b + c + d)
}

/// Probability of detection of the positive event, `a / (a + c)`
pub fn pod_positive(a: u64, c: u64) -> f64 {
    ratio(a, a + c)
}

/// Probability of detection of the negative event, `d / (b + d)`
pub fn pod_negative(b: u64, d: u64) -> f64 {
    ratio(d, b + d)
}

/// False alarm ratio of the positive event, `b / (a + b)`
pub fn far_positive(a: u64, b: u64) -> f64 {
    ratio(b, a + b)
}

/// False alarm ratio of the negative event, `c / (c + d)`
pub fn far_negative(c: u64, d: u64) -> f64 {
    ratio(c, c + d)
}

/// Probability of false detection of the negative event, `c / (a + c)`
pub fn pofd_positive(a: u64, c: u64) -> f64 {
    ratio(c, a + c)
}

/// Probability of false detection of the positive event, `b / (b + d)`
pub fn pofd_negative(b: u64, d: u64) -> f64 {
    ratio(b, b + d)
}

/// Heidke skill score, `2(ad - bc) / [(a + c)(c + d) + (a + b)(b + d)]`
pub fn heidke(a: u64, b: u64, c: u64, d: u64) -> f64 {
    let (a, b, c, d) = (a as f64, b as f64, c as f64, d as f64);
    let den = (a + c) * (c + d) + (a + b) * (b + d);
    if den == 0.0 {
        f64::NAN
    } else {
        2.0 * (a * d - b * c) / den
    }
}

/// Hanssen-Kuiper skill score, `a / (a + c) - b / (b + d)`
pub fn kuiper(a: u64, b: u64, c: u64, d: u64) -> f64 {
    ratio(a, a + c) - ratio(b, b + d)
}

/// Frequency bias, `(b - c) / n`
pub fn bias(a: u64, b: u64, c: u64, d: u64) -> f64 {
    let n = a + b + c + d;
    if n == 0 {
        f64::NAN
    } else {
        (b as f64 - c as f64) / n as f64
    }
}

/// Occurrence fraction of the positive event, `(x + y) / n`.
///
/// Called with `(a, c)` this is the fraction of pixels the reference calls
/// positive, with `(a, b)` the fraction the test calls positive. Despite the
/// name the renderer gives it, this is not a mean of physical values.
pub fn occurrence(x: u64, y: u64, n: u64) -> f64 {
    ratio(x + y, n)
}

/// Apply `score` to every cell of `table`.
pub fn per_cell(table: &ContingencyTable, score: impl Fn(u64, u64, u64, u64) -> f64) -> Array2<f64> {
    let mut out = Array2::from_elem(table.dim(), f64::NAN);
    for (out, &a, &b, &c, &d) in izip!(
        out.iter_mut(),
        table.a.iter(),
        table.b.iter(),
        table.c.iter(),
        table.d.iter()
    ) {
        *out = score(a, b, c, d);
    }
    out
}

/// Symmetric display limit for a diverging score: half the largest absolute
/// finite value, or `None` if no value is finite.
pub fn symmetric_range(values: ArrayView2<f64>) -> Option<f64> {
    values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| v.abs())
        .fold(None, |max: Option<f64>, v| Some(max.map_or(v, |m| m.max(v))))
        .map(|max| max / 2.0)
}

/// Values where `counts >= threshold`, NaN elsewhere.
pub fn suppress_below(values: ArrayView2<f64>, counts: ArrayView2<u64>, threshold: u64) -> Array2<f64> {
    Zip::from(&values)
        .and(&counts)
        .map_collect(|&v, &n| if n < threshold { f64::NAN } else { v })
}

/// What the two categories of a binary score are called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryTarget {
    /// cloud mask: clear (negative) / cloudy (positive)
    CloudMask,
    /// cloud phase: liquid (negative) / ice (positive)
    Phase,
}

impl BinaryTarget {
    /// `(negative, positive)` suffixes used in score names.
    pub fn labels(&self) -> (&'static str, &'static str) {
        match self {
            Self::CloudMask => ("clr", "cld"),
            Self::Phase => ("liq", "ice"),
        }
    }

    /// Short name of the variable, as used in output file names.
    pub fn var(&self) -> &'static str {
        match self {
            Self::CloudMask => "CMA",
            Self::Phase => "CPH",
        }
    }
}

/// Name of the cell count score in binary collections.
pub const NOBS: &str = "Nobs";

/// Build the full binary score collection for a contingency table.
///
/// Layout: Hitrate, POD (negative, positive), FAR (negative, positive), POFD
/// (negative, positive), Heidke, Kuiper, Bias, reference mean, test mean, Nobs.
pub fn binary_scores(table: &ContingencyTable, target: BinaryTarget) -> ScoreCollection {
    let (neg, pos) = target.labels();
    let mut scores = ScoreCollection::new();

    scores.push(
        "Hitrate",
        ScoreGrid::bounded(per_cell(table, hitrate), 0.5, 1.0, Palette::Rainbow),
    );
    scores.push(
        format!("POD{}", neg),
        ScoreGrid::bounded(
            per_cell(table, |_, b, _, d| pod_negative(b, d)),
            0.5,
            1.0,
            Palette::Rainbow,
        ),
    );
    scores.push(
        format!("POD{}", pos),
        ScoreGrid::bounded(
            per_cell(table, |a, _, c, _| pod_positive(a, c)),
            0.5,
            1.0,
            Palette::Rainbow,
        ),
    );
    scores.push(
        format!("FAR{}", neg),
        ScoreGrid::bounded(
            per_cell(table, |_, _, c, d| far_negative(c, d)),
            0.0,
            1.0,
            Palette::Rainbow,
        ),
    );
    scores.push(
        format!("FAR{}", pos),
        ScoreGrid::bounded(
            per_cell(table, |a, b, _, _| far_positive(a, b)),
            0.0,
            1.0,
            Palette::Rainbow,
        ),
    );
    scores.push(
        format!("POFD{}", neg),
        ScoreGrid::bounded(
            per_cell(table, |a, _, c, _| pofd_positive(a, c)),
            0.0,
            1.0,
            Palette::Rainbow,
        ),
    );
    scores.push(
        format!("POFD{}", pos),
        ScoreGrid::bounded(
            per_cell(table, |_, b, _, d| pofd_negative(b, d)),
            0.0,
            1.0,
            Palette::Rainbow,
        ),
    );
    scores.push(
        "Heidke",
        ScoreGrid::bounded(per_cell(table, heidke), 0.0, 1.0, Palette::Rainbow),
    );
    scores.push(
        "Kuiper",
        ScoreGrid::bounded(per_cell(table, kuiper), 0.0, 1.0, Palette::Rainbow),
    );

    let bias_values = per_cell(table, bias);
    let limit = symmetric_range(bias_values.view());
    scores.push(
        "Bias",
        ScoreGrid::new(bias_values, limit.map(|l| -l), limit, Palette::Bwr),
    );

    scores.push(
        format!("{} mean", REFERENCE_LABEL),
        ScoreGrid::unbounded(
            per_cell(table, |a, b, c, d| occurrence(a, c, a + b + c + d)),
            Palette::Rainbow,
        ),
    );
    scores.push(
        format!("{} mean", TEST_LABEL),
        ScoreGrid::unbounded(
            per_cell(table, |a, b, c, d| occurrence(a, b, a + b + c + d)),
            Palette::Rainbow,
        ),
    );
    scores.push(
        NOBS,
        ScoreGrid::unbounded(table.n().mapv(|n| n as f64), Palette::Rainbow),
    );
    scores
}
