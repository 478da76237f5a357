//! Pixel-level classification: contingency outcomes, cloud-type groups and
//! height / temperature deltas.

use crate::fields::{check_len, Binary, CloudType, PixelFields};
use crate::ValidationError;
use itertools::izip;
use ndarray::{prelude::*, Zip};
use std::fmt::{self, Display};

/// Outcome of comparing a reference and a test binary value.
///
/// The letters are the usual contingency table cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// `a`: reference positive, test positive
    Hit,
    /// `b`: reference negative, test positive
    FalseAlarm,
    /// `c`: reference positive, test negative
    Miss,
    /// `d`: reference negative, test negative
    CorrectNegative,
}

impl Outcome {
    /// Classify a single pair. `None` if either side is missing.
    pub fn classify<T: Binary>(reference: Option<T>, test: Option<T>) -> Option<Self> {
        let (reference, test) = (reference?, test?);
        Some(match (reference.is_positive(), test.is_positive()) {
            (true, true) => Self::Hit,
            (false, true) => Self::FalseAlarm,
            (true, false) => Self::Miss,
            (false, false) => Self::CorrectNegative,
        })
    }
}

/// Classify every pixel pair.
///
/// # Errors
///
/// Will return [`ValidationError::ShapeMismatch`] if the arrays differ in length.
pub fn classify_pairs<T: Binary>(
    reference: ArrayView1<Option<T>>,
    test: ArrayView1<Option<T>>,
) -> Result<Array1<Option<Outcome>>, ValidationError> {
    check_len("test", "classify_pairs", reference.len(), test.len())?;
    Ok(Zip::from(&reference)
        .and(&test)
        .map_collect(|&r, &t| Outcome::classify(r, t)))
}

/// The four 0/1 indicator arrays of a set of outcomes.
///
/// For every pixel at most one indicator is true; none is true where the
/// outcome is missing.
#[derive(Debug, Clone)]
pub struct Indicators {
    /// hits
    pub a: Array1<bool>,
    /// false alarms
    pub b: Array1<bool>,
    /// misses
    pub c: Array1<bool>,
    /// correct negatives
    pub d: Array1<bool>,
}

impl Indicators {
    /// Split per-pixel outcomes into indicator arrays.
    pub fn from_outcomes(outcomes: ArrayView1<Option<Outcome>>) -> Self {
        let is = |which: Outcome| outcomes.mapv(|o| o == Some(which));
        Self {
            a: is(Outcome::Hit),
            b: is(Outcome::FalseAlarm),
            c: is(Outcome::Miss),
            d: is(Outcome::CorrectNegative),
        }
    }

    /// Number of pixels with a defined outcome.
    pub fn count_valid(&self) -> usize {
        izip!(&self.a, &self.b, &self.c, &self.d)
            .filter(|(a, b, c, d)| **a || **b || **c || **d)
            .count()
    }
}

/// A named set of reference cloud types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudGroup {
    /// types 0, 1, 2, 3
    Low,
    /// types 4, 5
    Mid,
    /// types 6, 7
    High,
    /// types 1, 2, 5, 7
    Opaque,
    /// types 0, 3, 4, 6
    Transparent,
    /// types 1, 2
    LowOpaque,
    /// types 4, 6
    MidHighTransparent,
}

impl CloudGroup {
    /// The cloud type codes belonging to the group.
    pub fn codes(&self) -> &'static [u8] {
        match self {
            Self::Low => &[0, 1, 2, 3],
            Self::Mid => &[4, 5],
            Self::High => &[6, 7],
            Self::Opaque => &[1, 2, 5, 7],
            Self::Transparent => &[0, 3, 4, 6],
            Self::LowOpaque => &[1, 2],
            Self::MidHighTransparent => &[4, 6],
        }
    }

    /// Whether the cloud type belongs to the group. A missing type never does.
    pub fn contains(&self, cloud_type: Option<CloudType>) -> bool {
        cloud_type.map_or(false, |t| self.codes().contains(&t.code()))
    }

    /// Per-pixel membership.
    pub fn membership(&self, cloud_types: ArrayView1<Option<CloudType>>) -> Array1<bool> {
        cloud_types.mapv(|t| self.contains(t))
    }
}

impl Display for CloudGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Mid => "middle",
            Self::High => "high",
            Self::Opaque => "opaque",
            Self::Transparent => "transparent",
            Self::LowOpaque => "low opaque",
            Self::MidHighTransparent => "mid+high transparent",
        };
        write!(f, "{}", name)
    }
}

/// Per-pixel inputs of the height / temperature validation.
#[derive(Debug, Clone)]
pub struct Deltas {
    /// both instruments see cloud and the test height is present
    pub detected_height: Array1<bool>,
    /// both instruments see cloud and the test temperature is present
    pub detected_temperature: Array1<bool>,
    /// `test - ref` height where `detected_height`
    pub height_bias: Array1<Option<f64>>,
    /// `|test - ref|` height where `detected_height`
    pub height_abs_error: Array1<Option<f64>>,
    /// `test - ref` temperature where `detected_temperature`
    pub temperature_bias: Array1<Option<f64>>,
}

impl Deltas {
    /// Compute detection masks and deltas from (already masked) fields.
    ///
    /// A delta is also missing where the reference value is missing, while
    /// the detection mask only depends on the cloud masks and the test value.
    ///
    /// # Errors
    ///
    /// Will return [`ValidationError::ShapeMismatch`] if the fields are inconsistent.
    pub fn from_fields(fields: &PixelFields) -> Result<Self, ValidationError> {
        fields.validate()?;
        let hits = classify_pairs(fields.ref_mask.view(), fields.test_mask.view())?;
        let detected = hits.mapv(|o| o == Some(Outcome::Hit));

        let detected_height = Zip::from(&detected)
            .and(&fields.test_height)
            .map_collect(|&d, h| d && h.is_some());
        let detected_temperature = Zip::from(&detected)
            .and(&fields.test_temperature)
            .map_collect(|&d, t| d && t.is_some());

        let delta = |detected: &Array1<bool>,
                     reference: &Array1<Option<f64>>,
                     test: &Array1<Option<f64>>| {
            Zip::from(detected)
                .and(reference)
                .and(test)
                .map_collect(|&det, &r, &t| match (det, r, t) {
                    (true, Some(r), Some(t)) => Some(t - r),
                    _ => None,
                })
        };

        let height_bias = delta(&detected_height, &fields.ref_height, &fields.test_height);
        let height_abs_error = height_bias.mapv(|b| b.map(f64::abs));
        let temperature_bias = delta(
            &detected_temperature,
            &fields.ref_temperature,
            &fields.test_temperature,
        );

        Ok(Self {
            detected_height,
            detected_temperature,
            height_bias,
            height_abs_error,
            temperature_bias,
        })
    }
}

/// `values` where `keep`, missing elsewhere.
pub fn restrict(values: &Array1<Option<f64>>, keep: &Array1<bool>) -> Array1<Option<f64>> {
    Zip::from(values)
        .and(keep)
        .map_collect(|&v, &k| if k { v } else { None })
}

/// Element-wise `a && b`.
pub fn both(a: &Array1<bool>, b: &Array1<bool>) -> Array1<bool> {
    Zip::from(a).and(b).map_collect(|&a, &b| a && b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fields::{CloudMask, Phase},
        test_common::synthetic_fields,
    };
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_outcome_classify() {
        use CloudMask::*;
        assert_eq!(Outcome::classify(Some(Cloudy), Some(Cloudy)), Some(Outcome::Hit));
        assert_eq!(Outcome::classify(Some(Clear), Some(Cloudy)), Some(Outcome::FalseAlarm));
        assert_eq!(Outcome::classify(Some(Cloudy), Some(Clear)), Some(Outcome::Miss));
        assert_eq!(
            Outcome::classify(Some(Clear), Some(Clear)),
            Some(Outcome::CorrectNegative)
        );
        assert_eq!(Outcome::classify(None, Some(Clear)), None);
        assert_eq!(Outcome::classify::<CloudMask>(Some(Cloudy), None), None);
        assert_eq!(
            Outcome::classify(Some(Phase::Ice), Some(Phase::Liquid)),
            Some(Outcome::Miss)
        );
    }

    #[test]
    fn test_indicators_are_exclusive() {
        let fields = synthetic_fields(500);
        let outcomes = classify_pairs(fields.ref_mask.view(), fields.test_mask.view()).unwrap();
        let ind = Indicators::from_outcomes(outcomes.view());
        for (idx, outcome) in outcomes.iter().enumerate() {
            let set = [ind.a[idx], ind.b[idx], ind.c[idx], ind.d[idx]]
                .iter()
                .filter(|&&x| x)
                .count();
            assert_eq!(set, if outcome.is_some() { 1 } else { 0 });
        }
        let expected = izip!(&fields.ref_mask, &fields.test_mask)
            .filter(|(r, t)| r.is_some() && t.is_some())
            .count();
        assert_eq!(ind.count_valid(), expected);
    }

    #[test]
    fn test_classify_pairs_shape_mismatch() {
        let reference = arr1(&[Some(CloudMask::Clear), None]);
        let test = arr1(&[Some(CloudMask::Clear)]);
        assert!(matches!(
            classify_pairs(reference.view(), test.view()),
            Err(ValidationError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_group_codes() {
        let members = |group: CloudGroup| -> Vec<u8> {
            CloudType::ALL
                .iter()
                .filter(|t| group.contains(Some(**t)))
                .map(CloudType::code)
                .collect()
        };
        assert_eq!(members(CloudGroup::Low), vec![0, 1, 2, 3]);
        assert_eq!(members(CloudGroup::Mid), vec![4, 5]);
        assert_eq!(members(CloudGroup::High), vec![6, 7]);
        assert_eq!(members(CloudGroup::Opaque), vec![1, 2, 5, 7]);
        assert_eq!(members(CloudGroup::Transparent), vec![0, 3, 4, 6]);
        assert_eq!(members(CloudGroup::LowOpaque), vec![1, 2]);
        assert_eq!(members(CloudGroup::MidHighTransparent), vec![4, 6]);
        assert!(!CloudGroup::Low.contains(None));
    }

    #[test]
    fn test_group_membership_arrays() {
        let cloud_types: Array1<Option<CloudType>> = CloudType::ALL
            .iter()
            .map(|t| Some(*t))
            .chain(std::iter::once(None))
            .collect();
        let groups: [(CloudGroup, &[u8]); 7] = [
            (CloudGroup::Low, &[0, 1, 2, 3]),
            (CloudGroup::Mid, &[4, 5]),
            (CloudGroup::High, &[6, 7]),
            (CloudGroup::Opaque, &[1, 2, 5, 7]),
            (CloudGroup::Transparent, &[0, 3, 4, 6]),
            (CloudGroup::LowOpaque, &[1, 2]),
            (CloudGroup::MidHighTransparent, &[4, 6]),
        ];
        for (group, expected_codes) in groups {
            let membership = group.membership(cloud_types.view());
            let members: Vec<u8> = cloud_types
                .iter()
                .zip(membership.iter())
                .filter(|(_, &member)| member)
                .map(|(cloud_type, _)| cloud_type.map_or(u8::MAX, |t| t.code()))
                .collect();
            assert_eq!(members, expected_codes, "{}", group);
        }
    }

    #[test]
    fn test_deltas() {
        let mut fields = synthetic_fields(4);
        fields.ref_mask = arr1(&[
            Some(CloudMask::Cloudy),
            Some(CloudMask::Cloudy),
            Some(CloudMask::Clear),
            Some(CloudMask::Cloudy),
        ]);
        fields.test_mask = arr1(&[
            Some(CloudMask::Cloudy),
            Some(CloudMask::Cloudy),
            Some(CloudMask::Cloudy),
            Some(CloudMask::Cloudy),
        ]);
        fields.ref_height = arr1(&[Some(1000.0), None, Some(1000.0), Some(5000.0)]);
        fields.test_height = arr1(&[Some(1500.0), Some(800.0), Some(900.0), None]);
        fields.ref_temperature = arr1(&[Some(280.0), Some(270.0), None, Some(250.0)]);
        fields.test_temperature = arr1(&[Some(275.0), Some(272.0), Some(260.0), Some(240.0)]);

        let deltas = Deltas::from_fields(&fields).unwrap();
        assert_eq!(deltas.detected_height, arr1(&[true, true, false, false]));
        assert_eq!(deltas.detected_temperature, arr1(&[true, true, false, true]));
        assert_abs_diff_eq!(deltas.height_bias[0].unwrap(), 500.0);
        // detected but no reference height
        assert_eq!(deltas.height_bias[1], None);
        assert_eq!(deltas.height_bias[2], None);
        assert_abs_diff_eq!(deltas.temperature_bias[0].unwrap(), -5.0);
        assert_abs_diff_eq!(deltas.temperature_bias[3].unwrap(), -10.0);
        assert_abs_diff_eq!(deltas.height_abs_error[0].unwrap(), 500.0);
    }
}
