//! Cloud top height / temperature validation, stratified by reference cloud
//! type.

use crate::{
    aggregate::SpatialAggregator,
    classify::{both, restrict, CloudGroup, Deltas},
    constants::{DEFAULT_CTTH_MIN_COUNT, REFERENCE_LABEL, TEST_LABEL},
    fields::PixelFields,
    scores::{suppress_below, Palette, ScoreCollection, ScoreGrid},
    ValidationError,
};
use derive_builder::Builder;
use log::{debug, trace};
use ndarray::prelude::*;
use std::fmt::{self, Display};

/// Name of the detected height count score.
pub const NUM_DETECTED_HEIGHT: &str = "Num_detected_height";

/// Options for the stratified height / temperature validation
#[derive(Builder, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtthContext {
    /// Cells with fewer contributing pixels than this are set to missing,
    /// separately for every group.
    #[builder(default = "DEFAULT_CTTH_MIN_COUNT")]
    pub min_count: u64,
    /// Also produce biases for the opaque and transparent groups.
    #[builder(default = "false")]
    pub with_opacity_groups: bool,
}

impl Default for CtthContext {
    fn default() -> Self {
        Self {
            min_count: DEFAULT_CTTH_MIN_COUNT,
            with_opacity_groups: false,
        }
    }
}

impl Display for CtthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Will suppress CTTH cells with fewer than {} detections.",
            self.min_count
        )?;
        writeln!(
            f,
            "{} report opaque / transparent biases.",
            if self.with_opacity_groups {
                "Will"
            } else {
                "Will not"
            }
        )
    }
}

/// A stratified height bias: the group, its score name and display limit.
struct GroupBias {
    group: CloudGroup,
    name: &'static str,
    limit: f64,
}

static GROUP_BIASES: [GroupBias; 5] = [
    GroupBias {
        group: CloudGroup::Low,
        name: "Bias low",
        limit: 2000.0,
    },
    GroupBias {
        group: CloudGroup::Mid,
        name: "Bias middle",
        limit: 2000.0,
    },
    GroupBias {
        group: CloudGroup::High,
        name: "Bias high",
        limit: 6000.0,
    },
    GroupBias {
        group: CloudGroup::LowOpaque,
        name: "Bias low opaque",
        limit: 2000.0,
    },
    GroupBias {
        group: CloudGroup::MidHighTransparent,
        name: "Bias mid+high transparent",
        limit: 6000.0,
    },
];

static OPACITY_BIASES: [GroupBias; 2] = [
    GroupBias {
        group: CloudGroup::Opaque,
        name: "Bias opaque",
        limit: 4000.0,
    },
    GroupBias {
        group: CloudGroup::Transparent,
        name: "Bias transparent",
        limit: 4000.0,
    },
];

impl CtthContext {
    /// Mean of `values` per cell, missing where `counts < min_count`.
    fn gated(
        &self,
        agg: &SpatialAggregator,
        values: &Array1<Option<f64>>,
        counts: &Array2<u64>,
    ) -> Result<Array2<f64>, ValidationError> {
        let mean = agg.average(values.view())?;
        Ok(suppress_below(mean.view(), counts.view(), self.min_count))
    }

    /// Compute the height / temperature score collection from masked fields.
    ///
    /// # Errors
    ///
    /// Will return [`ValidationError::ShapeMismatch`] if the fields or the
    /// aggregator's index are inconsistent.
    pub fn scores(
        &self,
        fields: &PixelFields,
        agg: &SpatialAggregator,
    ) -> Result<ScoreCollection, ValidationError> {
        trace!("start CtthContext::scores");
        let deltas = Deltas::from_fields(fields)?;
        let num_detected = agg.sum(deltas.detected_height.view())?;
        debug!(
            "{} pixels with detected height",
            deltas.detected_height.iter().filter(|&&d| d).count()
        );

        let mut scores = ScoreCollection::new();
        scores.push(
            "Bias CTH",
            ScoreGrid::bounded(
                self.gated(agg, &deltas.height_bias, &num_detected)?,
                -4000.0,
                4000.0,
                Palette::Bwr,
            ),
        );
        scores.push(
            "MAE CTH",
            ScoreGrid::bounded(
                self.gated(agg, &deltas.height_abs_error, &num_detected)?,
                0.0,
                2500.0,
                Palette::Reds,
            ),
        );

        let mut low_detected = None;
        let extra: &[GroupBias] = if self.with_opacity_groups {
            &OPACITY_BIASES
        } else {
            &[]
        };
        for group_bias in GROUP_BIASES.iter().chain(extra) {
            let member = group_bias.group.membership(fields.ref_cloud_type.view());
            let detected = both(&deltas.detected_height, &member);
            let count = agg.sum(detected.view())?;
            let values = self.gated(agg, &restrict(&deltas.height_bias, &detected), &count)?;
            scores.push(
                group_bias.name,
                ScoreGrid::bounded(values, -group_bias.limit, group_bias.limit, Palette::Bwr),
            );
            if group_bias.group == CloudGroup::Low {
                low_detected = Some((detected, count));
            }
        }

        scores.push(
            "Bias temperature",
            ScoreGrid::bounded(
                self.gated(agg, &deltas.temperature_bias, &num_detected)?,
                -30.0,
                30.0,
                Palette::Bwr,
            ),
        );
        if let Some((detected, count)) = low_detected {
            scores.push(
                "Bias temperature low",
                ScoreGrid::bounded(
                    self.gated(agg, &restrict(&deltas.temperature_bias, &detected), &count)?,
                    -10.0,
                    10.0,
                    Palette::Bwr,
                ),
            );
        }

        scores.push(
            format!("{} CTH mean", REFERENCE_LABEL),
            ScoreGrid::bounded(
                agg.average(fields.ref_height.view())?,
                1000.0,
                14000.0,
                Palette::Rainbow,
            ),
        );
        scores.push(
            format!("{} CTH mean", TEST_LABEL),
            ScoreGrid::bounded(
                agg.average(fields.test_height.view())?,
                1000.0,
                14000.0,
                Palette::Rainbow,
            ),
        );
        scores.push(
            NUM_DETECTED_HEIGHT,
            ScoreGrid::unbounded(num_detected.mapv(|n| n as f64), Palette::Rainbow),
        );
        trace!("end CtthContext::scores");
        Ok(scores)
    }
}
