//! Runs one validation combination: masking, classification, aggregation
//! and scoring.
use crate::{
    aggregate::SpatialAggregator,
    classify::classify_pairs,
    constants::DEFAULT_CHUNK_SIZE,
    ctth::CtthContext,
    fields::{check_len, PixelFields},
    grid::CellIndex,
    masking::{count_paired, MaskingContext},
    scores::{binary_scores, BinaryTarget, ScoreCollection},
    stats::LinearRegression,
    with_increment_duration, ValidationError,
};
use derive_builder::Builder;
use log::{debug, trace, warn};
use std::{
    collections::HashMap,
    fmt::{self, Display},
    time::Duration,
};

/// Options for validating one (zenith limit, illumination) combination
#[derive(Builder, Debug, Clone, Copy, PartialEq)]
pub struct ValidationContext {
    /// Pixel masking
    #[builder(default)]
    pub masking: MaskingContext,
    /// Height / temperature validation
    #[builder(default)]
    pub ctth: CtthContext,
    /// Number of pixels per aggregation task
    #[builder(default = "DEFAULT_CHUNK_SIZE")]
    pub chunk_size: usize,
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self {
            masking: MaskingContext::default(),
            ctth: CtthContext::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Display for ValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masking)?;
        write!(f, "{}", self.ctth)?;
        writeln!(f, "Will aggregate {} pixels per chunk.", self.chunk_size)
    }
}

/// Linear fits of test against reference values, over pixels where both are present.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScatterSummary {
    /// cloud top height
    pub height: Option<LinearRegression>,
    /// cloud top temperature
    pub temperature: Option<LinearRegression>,
}

/// Everything produced for one combination.
#[derive(Debug, Clone)]
pub struct ValidationOutput {
    /// cloud mask scores
    pub cma: ScoreCollection,
    /// cloud phase scores
    pub cph: ScoreCollection,
    /// cloud top height / temperature scores
    pub ctth: ScoreCollection,
    /// scatter fits
    pub scatter: ScatterSummary,
}

impl ValidationOutput {
    /// The collections in output order, with their variable name.
    pub fn collections(&self) -> [(&'static str, &ScoreCollection); 3] {
        [
            (BinaryTarget::CloudMask.var(), &self.cma),
            (BinaryTarget::Phase.var(), &self.cph),
            ("CTTH", &self.ctth),
        ]
    }
}

impl ValidationContext {
    /// Validate `fields`, binned with `index`.
    ///
    /// The input fields are not modified. Durations of the stages are added
    /// to `durations`.
    ///
    /// # Errors
    ///
    /// Will return:
    /// - [`ValidationError::ShapeMismatch`] if the fields are inconsistent
    ///     with each other or with the cell index.
    /// - [`ValidationError::Configuration`] if the chunk size is 0.
    pub fn validate(
        &self,
        fields: &PixelFields,
        index: &CellIndex,
        durations: &mut HashMap<String, Duration>,
    ) -> Result<ValidationOutput, ValidationError> {
        trace!("start ValidationContext::validate");
        fields.validate()?;
        check_len(
            "index",
            "ValidationContext::validate",
            fields.len(),
            index.len(),
        )?;
        let agg = SpatialAggregator::new(index, self.chunk_size)?;

        let masked = with_increment_duration!(durations, "mask", self.masking.apply(fields));
        debug!(
            "{} of {} cloud mask pairs survive masking",
            count_paired(&masked.ref_mask, &masked.test_mask),
            count_paired(&fields.ref_mask, &fields.test_mask)
        );

        let cma = with_increment_duration!(durations, "cma", {
            let outcomes = classify_pairs(masked.ref_mask.view(), masked.test_mask.view())?;
            let table = agg.contingency(outcomes.view())?;
            debug!("cloud mask: {} classified pixels on grid", table.total());
            if table.total() == 0 {
                warn!("no valid cloud mask pairs for {}", self.masking.illumination);
            }
            binary_scores(&table, BinaryTarget::CloudMask)
        });

        let cph = with_increment_duration!(durations, "cph", {
            let outcomes = classify_pairs(masked.ref_phase.view(), masked.test_phase.view())?;
            let table = agg.contingency(outcomes.view())?;
            debug!("cloud phase: {} classified pixels on grid", table.total());
            binary_scores(&table, BinaryTarget::Phase)
        });

        let ctth = with_increment_duration!(durations, "ctth", self.ctth.scores(&masked, &agg)?);

        let scatter = with_increment_duration!(
            durations,
            "scatter",
            ScatterSummary {
                height: LinearRegression::fit(masked.test_height.view(), masked.ref_height.view()),
                temperature: LinearRegression::fit(
                    masked.test_temperature.view(),
                    masked.ref_temperature.view()
                ),
            }
        );

        trace!("end ValidationContext::validate");
        Ok(ValidationOutput {
            cma,
            cph,
            ctth,
            scatter,
        })
    }
}
