//! Viewing-geometry and illumination filtering of pixel fields.

use crate::{
    constants::{DAY_MAX_SUNZ, NIGHT_MIN_SUNZ},
    error::ConfigurationError,
    fields::PixelFields,
};
use derive_builder::Builder;
use itertools::izip;
use log::{debug, trace};
use ndarray::{prelude::*, Zip};
use std::{
    fmt::{self, Display},
    str::FromStr,
};

/// Which part of the day/night cycle to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IlluminationMode {
    /// keep every pixel
    #[default]
    All,
    /// keep `sunz < 80`
    Day,
    /// keep `sunz > 95`
    Night,
    /// keep `80 <= sunz <= 95`
    Twilight,
}

impl IlluminationMode {
    /// Every mode, in the order the CLI iterates them.
    pub const ALL_MODES: [Self; 4] = [Self::All, Self::Day, Self::Night, Self::Twilight];

    /// Whether a pixel with this solar zenith angle survives the filter.
    ///
    /// A non-finite angle never survives an active filter.
    pub fn keeps(&self, sunz: f64) -> bool {
        match self {
            Self::All => true,
            Self::Day => sunz < DAY_MAX_SUNZ,
            Self::Night => sunz > NIGHT_MIN_SUNZ,
            Self::Twilight => (DAY_MAX_SUNZ..=NIGHT_MIN_SUNZ).contains(&sunz),
        }
    }
}

impl FromStr for IlluminationMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ALL" => Ok(Self::All),
            "DAY" => Ok(Self::Day),
            "NIGHT" => Ok(Self::Night),
            "TWILIGHT" => Ok(Self::Twilight),
            _ => Err(ConfigurationError::UnknownIlluminationMode {
                expected: "ALL, DAY, NIGHT, TWILIGHT".into(),
                received: s.into(),
            }),
        }
    }
}

impl Display for IlluminationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::All => "ALL",
            Self::Day => "DAY",
            Self::Night => "NIGHT",
            Self::Twilight => "TWILIGHT",
        };
        write!(f, "{}", name)
    }
}

/// Options for masking pixels before classification
#[derive(Builder, Debug, Default, Clone, Copy, PartialEq)]
pub struct MaskingContext {
    /// Illumination filter
    #[builder(default)]
    pub illumination: IlluminationMode,
    /// Pixels with a satellite zenith angle above this limit [deg] are masked
    #[builder(default)]
    pub satz_limit: Option<f64>,
}

impl Display for MaskingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.satz_limit {
            Some(limit) => writeln!(f, "Will mask pixels with satz > {}.", limit)?,
            None => writeln!(f, "Will not mask on satz.")?,
        }
        match self.illumination {
            IlluminationMode::All => writeln!(f, "Will not mask on illumination."),
            mode => writeln!(f, "Will keep {} pixels only.", mode),
        }
    }
}

impl MaskingContext {
    /// Whether a pixel with these angles survives both filters.
    pub fn keeps(&self, satz: f64, sunz: f64) -> bool {
        let satz_ok = match self.satz_limit {
            Some(limit) => satz <= limit,
            None => true,
        };
        satz_ok && self.illumination.keeps(sunz)
    }

    /// The per-pixel keep mask for the given fields.
    pub fn keep_mask(&self, fields: &PixelFields) -> Array1<bool> {
        Zip::from(&fields.satz)
            .and(&fields.sunz)
            .map_collect(|&satz, &sunz| self.keeps(satz, sunz))
    }

    /// Return a copy of `fields` where the mask, phase, height and
    /// temperature of both instruments are set to missing wherever a filter
    /// rejects the pixel.
    ///
    /// Cloud type and the angles themselves are carried over unchanged.
    pub fn apply(&self, fields: &PixelFields) -> PixelFields {
        trace!("start MaskingContext::apply");
        let keep = self.keep_mask(fields);

        fn masked<T: Copy>(values: &Array1<Option<T>>, keep: &Array1<bool>) -> Array1<Option<T>> {
            Zip::from(values)
                .and(keep)
                .map_collect(|&value, &keep| if keep { value } else { None })
        }

        let result = PixelFields {
            ref_height: masked(&fields.ref_height, &keep),
            test_height: masked(&fields.test_height, &keep),
            ref_temperature: masked(&fields.ref_temperature, &keep),
            test_temperature: masked(&fields.test_temperature, &keep),
            ref_phase: masked(&fields.ref_phase, &keep),
            test_phase: masked(&fields.test_phase, &keep),
            ref_mask: masked(&fields.ref_mask, &keep),
            test_mask: masked(&fields.test_mask, &keep),
            ref_cloud_type: fields.ref_cloud_type.clone(),
            satz: fields.satz.clone(),
            sunz: fields.sunz.clone(),
        };

        debug!(
            "masking kept {} of {} pixels ({})",
            keep.iter().filter(|&&k| k).count(),
            keep.len(),
            self.illumination
        );
        trace!("end MaskingContext::apply");
        result
    }
}

/// Count pixels where both instruments report a value.
pub fn count_paired<T>(reference: &Array1<Option<T>>, test: &Array1<Option<T>>) -> usize {
    izip!(reference.iter(), test.iter())
        .filter(|(r, t)| r.is_some() && t.is_some())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fields::CloudMask, test_common::synthetic_fields};

    #[test]
    fn test_mode_from_str() {
        assert_eq!("day".parse::<IlluminationMode>().unwrap(), IlluminationMode::Day);
        assert_eq!(
            "TWILIGHT".parse::<IlluminationMode>().unwrap(),
            IlluminationMode::Twilight
        );
        assert!(matches!(
            "dusk".parse::<IlluminationMode>(),
            Err(ConfigurationError::UnknownIlluminationMode { .. })
        ));
        for mode in IlluminationMode::ALL_MODES {
            assert_eq!(mode.to_string().parse::<IlluminationMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_mode_boundaries() {
        assert!(IlluminationMode::Day.keeps(79.9));
        assert!(!IlluminationMode::Day.keeps(80.0));
        assert!(!IlluminationMode::Night.keeps(95.0));
        assert!(IlluminationMode::Night.keeps(95.1));
        assert!(IlluminationMode::Twilight.keeps(80.0));
        assert!(IlluminationMode::Twilight.keeps(95.0));
        assert!(!IlluminationMode::Twilight.keeps(79.9));
        assert!(!IlluminationMode::Day.keeps(f64::NAN));
        assert!(IlluminationMode::All.keeps(f64::NAN));
    }

    #[test]
    fn test_sunz_82_day_vs_twilight() {
        let mut fields = synthetic_fields(1);
        fields.sunz[0] = 82.0;
        fields.satz[0] = 10.0;
        fields.ref_mask[0] = Some(CloudMask::Cloudy);
        fields.test_mask[0] = Some(CloudMask::Cloudy);

        let day = MaskingContextBuilder::default()
            .illumination(IlluminationMode::Day)
            .build()
            .unwrap();
        let masked = day.apply(&fields);
        assert_eq!(masked.ref_mask[0], None);
        assert_eq!(masked.test_mask[0], None);

        let twilight = MaskingContextBuilder::default()
            .illumination(IlluminationMode::Twilight)
            .build()
            .unwrap();
        let masked = twilight.apply(&fields);
        assert_eq!(masked.ref_mask[0], Some(CloudMask::Cloudy));
        assert_eq!(masked.test_mask[0], Some(CloudMask::Cloudy));
    }

    #[test]
    fn test_satz_limit_masks_both_instruments() {
        let fields = synthetic_fields(200);
        let ctx = MaskingContext {
            satz_limit: Some(40.0),
            ..MaskingContext::default()
        };
        let masked = ctx.apply(&fields);
        for (idx, &satz) in fields.satz.iter().enumerate() {
            if satz > 40.0 {
                assert_eq!(masked.ref_mask[idx], None);
                assert_eq!(masked.test_mask[idx], None);
                assert_eq!(masked.ref_phase[idx], None);
                assert_eq!(masked.test_phase[idx], None);
                assert_eq!(masked.ref_height[idx], None);
                assert_eq!(masked.test_height[idx], None);
                assert_eq!(masked.ref_temperature[idx], None);
                assert_eq!(masked.test_temperature[idx], None);
            } else {
                assert_eq!(masked.ref_mask[idx], fields.ref_mask[idx]);
                assert_eq!(masked.test_height[idx], fields.test_height[idx]);
            }
            // never masked
            assert_eq!(masked.ref_cloud_type[idx], fields.ref_cloud_type[idx]);
        }
    }

    #[test]
    fn test_apply_is_idempotent_and_pure() {
        let fields = synthetic_fields(300);
        let before = fields.clone();
        let ctx = MaskingContext {
            illumination: IlluminationMode::Night,
            satz_limit: Some(60.0),
        };
        let once = ctx.apply(&fields);
        let twice = ctx.apply(&once);
        assert_eq!(once.ref_mask, twice.ref_mask);
        assert_eq!(once.test_height, twice.test_height);
        assert_eq!(fields.ref_mask, before.ref_mask);
        assert!(count_paired(&once.ref_mask, &once.test_mask)
            <= count_paired(&fields.ref_mask, &fields.test_mask));
    }

    #[test]
    fn test_display() {
        let ctx = MaskingContext {
            illumination: IlluminationMode::Day,
            satz_limit: None,
        };
        let display = format!("{}", ctx);
        assert!(display.contains("Will not mask on satz"));
        assert!(display.contains("Will keep DAY pixels only"));
    }
}
