//! Conversion of raw collocated records into [`PixelFields`].
//!
//! Each raw product field has its own sentinel convention. These are resolved
//! here, once, into `Option` values so nothing downstream has to know about
//! fill values.

use crate::{
    constants::{CALIOP_CLOUD_FRACTION_THRESHOLD, CALIOP_FILL_VALUE, CELSIUS_TO_KELVIN, KM_TO_M},
    error::ConfigurationError,
    fields::{check_len, CloudMask, CloudType, Geolocation, Phase, PixelFields},
    io::error::IOError,
    ValidationError,
};
use log::{debug, trace};
use ndarray::prelude::*;
use std::{
    collections::HashMap,
    fmt::{self, Display},
    path::PathBuf,
    str::FromStr,
};

/// The test product being validated. Selects where the test fields live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    /// ESA Cloud_cci
    Cci,
    /// CM SAF CLAAS (processed with PPS)
    Claas,
}

impl DatasetKind {
    /// Name of the group (column prefix) holding the test fields.
    pub fn group(&self) -> &'static str {
        match self {
            Self::Cci => "cci",
            Self::Claas => "pps",
        }
    }

    /// Resolve the full set of column names for this dataset.
    pub fn field_names(&self) -> FieldNames {
        FieldNames::new(self.group())
    }
}

impl FromStr for DatasetKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CCI" => Ok(Self::Cci),
            "CLAAS" | "CLAAS3" => Ok(Self::Claas),
            _ => Err(ConfigurationError::UnknownDatasetKind {
                expected: "CCI, CLAAS".into(),
                received: s.into(),
            }),
        }
    }
}

impl Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cci => write!(f, "CCI"),
            Self::Claas => write!(f, "CLAAS"),
        }
    }
}

/// Column names of every raw field needed for a validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNames {
    /// reference layer top altitude [km]
    pub ref_top_altitude: String,
    /// reference surface elevation [m]
    pub ref_elevation: String,
    /// reference mid-layer temperature [degC]
    pub ref_midlayer_temperature: String,
    /// reference decoded phase code
    pub ref_phase: String,
    /// reference cloud fraction
    pub ref_cloud_fraction: String,
    /// reference feature classification flags
    pub ref_feature_flags: String,
    /// test cloud top height [m]
    pub test_height: String,
    /// test cloud top temperature [K]
    pub test_temperature: String,
    /// test phase code
    pub test_phase: String,
    /// test cloud mask code
    pub test_cloudmask: String,
    /// satellite zenith angle
    pub satz: String,
    /// solar zenith angle
    pub sunz: String,
    /// latitude
    pub lat: String,
    /// longitude
    pub lon: String,
}

impl FieldNames {
    fn new(group: &str) -> Self {
        let test = |name: &str| format!("{}_{}", group, name);
        Self {
            ref_top_altitude: "caliop_layer_top_altitude".into(),
            ref_elevation: "caliop_elevation".into(),
            ref_midlayer_temperature: "caliop_midlayer_temperature".into(),
            ref_phase: "caliop_phase".into(),
            ref_cloud_fraction: "caliop_cloud_fraction".into(),
            ref_feature_flags: "caliop_feature_classification_flags".into(),
            test_height: test("ctth_height"),
            test_temperature: test("ctth_temperature"),
            test_phase: test("cpp_phase"),
            test_cloudmask: test("cloudmask"),
            satz: test("satz"),
            sunz: test("sunz"),
            lat: test("latitude"),
            lon: test("longitude"),
        }
    }

    /// All column names, in a fixed order.
    pub fn all(&self) -> Vec<&str> {
        vec![
            self.ref_top_altitude.as_str(),
            self.ref_elevation.as_str(),
            self.ref_midlayer_temperature.as_str(),
            self.ref_phase.as_str(),
            self.ref_cloud_fraction.as_str(),
            self.ref_feature_flags.as_str(),
            self.test_height.as_str(),
            self.test_temperature.as_str(),
            self.test_phase.as_str(),
            self.test_cloudmask.as_str(),
            self.satz.as_str(),
            self.sunz.as_str(),
            self.lat.as_str(),
            self.lon.as_str(),
        ]
    }
}

/// Named raw columns of equal length, as read from a collocation file.
#[derive(Debug, Clone)]
pub struct RawColumns {
    /// where the columns came from, for error messages
    pub source: PathBuf,
    len: usize,
    columns: HashMap<String, Array1<f64>>,
}

impl RawColumns {
    /// Create an empty set of columns of length `len`.
    pub fn new(source: impl Into<PathBuf>, len: usize) -> Self {
        Self {
            source: source.into(),
            len,
            columns: HashMap::new(),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Add a column.
    ///
    /// # Errors
    ///
    /// Will return [`ValidationError::ShapeMismatch`] if the column length differs.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        values: Array1<f64>,
    ) -> Result<(), ValidationError> {
        let name = name.into();
        check_len(&name, "RawColumns::insert", self.len, values.len())?;
        self.columns.insert(name, values);
        Ok(())
    }

    /// Borrow a column by name.
    ///
    /// # Errors
    ///
    /// Will return [`IOError::MissingColumn`] if there is no such column.
    pub fn get(&self, name: &str) -> Result<ArrayView1<f64>, IOError> {
        self.columns
            .get(name)
            .map(Array1::view)
            .ok_or_else(|| IOError::MissingColumn {
                path: self.source.clone(),
                column: name.into(),
            })
    }
}

/// Decodes the reference cloud type from a feature classification flag word.
pub trait CloudTypeDecoder {
    /// The cloud type of the feature, or `None` if the feature is not a
    /// cloud or the flag word is invalid.
    fn decode(&self, flags: f64) -> Option<CloudType>;
}

/// Decoder for the CALIPSO vertical feature mask flag layout.
///
/// Bits 1-3 (counting from 1) hold the feature type, where 2 means cloud.
/// Bits 10-12 hold the feature subtype, which for clouds is the cloud type.
#[derive(Debug, Clone, Copy, Default)]
pub struct VfmDecoder;

impl VfmDecoder {
    const FEATURE_TYPE_CLOUD: u16 = 2;
    const SUBTYPE_SHIFT: u16 = 9;
}

impl CloudTypeDecoder for VfmDecoder {
    fn decode(&self, flags: f64) -> Option<CloudType> {
        if !flags.is_finite() || flags < 0.0 || flags > u16::MAX as f64 {
            return None;
        }
        let flags = flags as u16;
        if flags & 0b111 != Self::FEATURE_TYPE_CLOUD {
            return None;
        }
        CloudType::from_code(((flags >> Self::SUBTYPE_SHIFT) & 0b111) as u8)
    }
}

/// Reference cloud top height above the surface [m], from the layer top
/// altitude [km] and the surface elevation [m].
pub fn ref_height(top_altitude_km: f64, elevation_m: f64) -> Option<f64> {
    if top_altitude_km == CALIOP_FILL_VALUE || !top_altitude_km.is_finite() {
        return None;
    }
    let height = top_altitude_km * KM_TO_M - elevation_m;
    height.is_finite().then(|| height)
}

/// Reference cloud top temperature [K] from the mid-layer temperature [degC].
pub fn ref_temperature(midlayer_celsius: f64) -> Option<f64> {
    if midlayer_celsius == CALIOP_FILL_VALUE {
        return None;
    }
    let kelvin = midlayer_celsius + CELSIUS_TO_KELVIN;
    (kelvin.is_finite() && kelvin >= 0.0).then(|| kelvin)
}

/// Test cloud top height [m]. Negative values are fill.
pub fn test_height(raw: f64) -> Option<f64> {
    (raw.is_finite() && raw >= 0.0).then(|| raw)
}

/// Test cloud top temperature [K]. Negative values are fill.
pub fn test_temperature(raw: f64) -> Option<f64> {
    (raw.is_finite() && raw >= 0.0).then(|| raw)
}

/// Reference phase from the decoded CALIPSO phase code:
/// 0 unknown, 1 randomly oriented ice, 2 water, 3 horizontally oriented ice.
pub fn ref_phase(code: f64) -> Option<Phase> {
    if code == 2.0 {
        Some(Phase::Liquid)
    } else if code == 1.0 || code == 3.0 {
        Some(Phase::Ice)
    } else {
        None
    }
}

/// Test phase from the product phase code: 1 liquid, 2 ice.
///
/// Codes below 0, above 10 and 0 itself are fill; other codes are not a
/// phase either.
pub fn test_phase(code: f64) -> Option<Phase> {
    if !code.is_finite() || code <= 0.0 || code > 10.0 {
        return None;
    }
    if code == 1.0 {
        Some(Phase::Liquid)
    } else if code == 2.0 {
        Some(Phase::Ice)
    } else {
        None
    }
}

/// Reference cloud mask from the footprint cloud fraction.
pub fn ref_mask(cloud_fraction: f64) -> Option<CloudMask> {
    if !cloud_fraction.is_finite() {
        return None;
    }
    Some(if cloud_fraction > CALIOP_CLOUD_FRACTION_THRESHOLD {
        CloudMask::Cloudy
    } else {
        CloudMask::Clear
    })
}

/// Test cloud mask: 0 clear, any other non-negative code cloudy.
pub fn test_mask(code: f64) -> Option<CloudMask> {
    if !code.is_finite() || code < 0.0 {
        None
    } else if code == 0.0 {
        Some(CloudMask::Clear)
    } else {
        Some(CloudMask::Cloudy)
    }
}

/// Build [`PixelFields`] and [`Geolocation`] from raw columns.
///
/// # Errors
///
/// Will return [`IOError::MissingColumn`] (wrapped) if any required column is absent.
pub fn extract_fields(
    raw: &RawColumns,
    names: &FieldNames,
    decoder: &dyn CloudTypeDecoder,
) -> Result<(PixelFields, Geolocation), ValidationError> {
    trace!("start extract_fields");

    let top_altitude = raw.get(&names.ref_top_altitude)?;
    let elevation = raw.get(&names.ref_elevation)?;
    let ref_height = ndarray::Zip::from(&top_altitude)
        .and(&elevation)
        .map_collect(|&alt, &elev| ref_height(alt, elev));

    let fields = PixelFields {
        ref_height,
        test_height: raw.get(&names.test_height)?.mapv(test_height),
        ref_temperature: raw
            .get(&names.ref_midlayer_temperature)?
            .mapv(ref_temperature),
        test_temperature: raw.get(&names.test_temperature)?.mapv(test_temperature),
        ref_phase: raw.get(&names.ref_phase)?.mapv(ref_phase),
        test_phase: raw.get(&names.test_phase)?.mapv(test_phase),
        ref_mask: raw.get(&names.ref_cloud_fraction)?.mapv(ref_mask),
        test_mask: raw.get(&names.test_cloudmask)?.mapv(test_mask),
        ref_cloud_type: raw
            .get(&names.ref_feature_flags)?
            .mapv(|flags| decoder.decode(flags)),
        satz: raw.get(&names.satz)?.to_owned(),
        sunz: raw.get(&names.sunz)?.to_owned(),
    };
    let geo = Geolocation {
        lon: raw.get(&names.lon)?.to_owned(),
        lat: raw.get(&names.lat)?.to_owned(),
    };
    fields.validate()?;

    debug!(
        "extracted {} pixels, {} with reference cloud type",
        fields.len(),
        fields.ref_cloud_type.iter().filter(|t| t.is_some()).count()
    );
    trace!("end extract_fields");
    Ok((fields, geo))
}
