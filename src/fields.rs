//! Pixel-level data model: the paired reference / test measurements of each
//! collocated pixel, held as parallel arrays.

use crate::ValidationError;
use ndarray::prelude::*;
use std::fmt::{self, Display};

/// A binary category where one value counts as the "positive" event.
///
/// For the cloud mask the positive event is cloud, for the phase it is ice.
pub trait Binary: Copy + PartialEq {
    /// Whether this value is the positive event of the category.
    fn is_positive(&self) -> bool;
}

/// Binary cloud mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudMask {
    /// No cloud detected
    Clear,
    /// Cloud detected
    Cloudy,
}

impl Binary for CloudMask {
    fn is_positive(&self) -> bool {
        matches!(self, Self::Cloudy)
    }
}

/// Thermodynamic phase of the cloud top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Liquid water
    Liquid,
    /// Ice
    Ice,
}

impl Binary for Phase {
    fn is_positive(&self) -> bool {
        matches!(self, Self::Ice)
    }
}

/// CALIOP top-layer cloud subtype, decoded from the feature classification flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudType {
    /// 0: low overcast, transparent
    LowOvercastTransparent,
    /// 1: low overcast, opaque
    LowOvercastOpaque,
    /// 2: transition stratocumulus
    TransitionStratocumulus,
    /// 3: low, broken cumulus
    LowBrokenCumulus,
    /// 4: altocumulus (transparent)
    Altocumulus,
    /// 5: altostratus (opaque)
    Altostratus,
    /// 6: cirrus (transparent)
    Cirrus,
    /// 7: deep convective (opaque)
    DeepConvective,
}

impl CloudType {
    /// All cloud types in code order.
    pub const ALL: [Self; 8] = [
        Self::LowOvercastTransparent,
        Self::LowOvercastOpaque,
        Self::TransitionStratocumulus,
        Self::LowBrokenCumulus,
        Self::Altocumulus,
        Self::Altostratus,
        Self::Cirrus,
        Self::DeepConvective,
    ];

    /// Look up a cloud type by its 3-bit code. Codes above 7 are `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// The 3-bit code of this cloud type.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl Display for CloudType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LowOvercastTransparent => "low overcast (transparent)",
            Self::LowOvercastOpaque => "low overcast (opaque)",
            Self::TransitionStratocumulus => "transition stratocumulus",
            Self::LowBrokenCumulus => "low broken cumulus",
            Self::Altocumulus => "altocumulus",
            Self::Altostratus => "altostratus",
            Self::Cirrus => "cirrus",
            Self::DeepConvective => "deep convective",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// Paired per-pixel measurements. Every array has the same length and
/// ordering; `None` marks a missing value.
#[derive(Debug, Clone)]
pub struct PixelFields {
    /// reference cloud top height [m]
    pub ref_height: Array1<Option<f64>>,
    /// test cloud top height [m]
    pub test_height: Array1<Option<f64>>,
    /// reference cloud top temperature [K]
    pub ref_temperature: Array1<Option<f64>>,
    /// test cloud top temperature [K]
    pub test_temperature: Array1<Option<f64>>,
    /// reference cloud phase
    pub ref_phase: Array1<Option<Phase>>,
    /// test cloud phase
    pub test_phase: Array1<Option<Phase>>,
    /// reference cloud mask
    pub ref_mask: Array1<Option<CloudMask>>,
    /// test cloud mask
    pub test_mask: Array1<Option<CloudMask>>,
    /// reference top-layer cloud type
    pub ref_cloud_type: Array1<Option<CloudType>>,
    /// satellite (viewing) zenith angle [deg]
    pub satz: Array1<f64>,
    /// solar zenith angle [deg]
    pub sunz: Array1<f64>,
}

impl PixelFields {
    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.satz.len()
    }

    /// Whether there are no pixels.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that every field has the same length.
    ///
    /// # Errors
    ///
    /// Will return [`ValidationError::ShapeMismatch`] naming the first field
    /// whose length differs from `satz`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let expected = self.len();
        let lengths = [
            ("ref_height", self.ref_height.len()),
            ("test_height", self.test_height.len()),
            ("ref_temperature", self.ref_temperature.len()),
            ("test_temperature", self.test_temperature.len()),
            ("ref_phase", self.ref_phase.len()),
            ("test_phase", self.test_phase.len()),
            ("ref_mask", self.ref_mask.len()),
            ("test_mask", self.test_mask.len()),
            ("ref_cloud_type", self.ref_cloud_type.len()),
            ("sunz", self.sunz.len()),
        ];
        for (argument, received) in lengths {
            check_len(argument, "PixelFields::validate", expected, received)?;
        }
        Ok(())
    }
}

/// Longitude and latitude of each pixel, in degrees.
#[derive(Debug, Clone)]
pub struct Geolocation {
    /// longitude [deg]
    pub lon: Array1<f64>,
    /// latitude [deg]
    pub lat: Array1<f64>,
}

impl Geolocation {
    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.lon.len()
    }

    /// Whether there are no pixels.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fail with [`ValidationError::ShapeMismatch`] unless `received == expected`.
///
/// # Errors
///
/// see above.
pub fn check_len(
    argument: &str,
    function: &str,
    expected: usize,
    received: usize,
) -> Result<(), ValidationError> {
    if expected == received {
        Ok(())
    } else {
        Err(ValidationError::ShapeMismatch {
            argument: argument.into(),
            function: function.into(),
            expected: format!("length {}", expected),
            received: format!("length {}", received),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_common::synthetic_fields;

    #[test]
    fn test_cloud_type_codes_round_trip() {
        for (code, cloud_type) in CloudType::ALL.iter().enumerate() {
            assert_eq!(cloud_type.code() as usize, code);
            assert_eq!(CloudType::from_code(code as u8), Some(*cloud_type));
        }
        assert_eq!(CloudType::from_code(8), None);
    }

    #[test]
    fn test_binary_positives() {
        assert!(CloudMask::Cloudy.is_positive());
        assert!(!CloudMask::Clear.is_positive());
        assert!(Phase::Ice.is_positive());
        assert!(!Phase::Liquid.is_positive());
    }

    #[test]
    fn test_validate_detects_short_field() {
        let mut fields = synthetic_fields(16);
        assert!(fields.validate().is_ok());
        fields.test_phase = fields.test_phase.slice(s![..15]).to_owned();
        match fields.validate() {
            Err(ValidationError::ShapeMismatch { argument, .. }) => {
                assert_eq!(argument, "test_phase")
            }
            other => panic!("expected ShapeMismatch, got {:?}", other),
        }
    }
}
