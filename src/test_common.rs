//! Deterministic synthetic inputs shared by the unit tests.

use crate::fields::{CloudMask, CloudType, Geolocation, Phase, PixelFields};
use ndarray::prelude::*;

/// A small linear congruential generator, so tests don't need a rng crate.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// uniform in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    pub fn below(&mut self, n: usize) -> usize {
        (self.next_f64() * n as f64) as usize % n
    }
}

/// `n` pixels with a mix of present and missing values in every field.
pub fn synthetic_fields(n: usize) -> PixelFields {
    let mut rng = Lcg::new(42);
    let mut fields = PixelFields {
        ref_height: Array1::from_elem(n, None),
        test_height: Array1::from_elem(n, None),
        ref_temperature: Array1::from_elem(n, None),
        test_temperature: Array1::from_elem(n, None),
        ref_phase: Array1::from_elem(n, None),
        test_phase: Array1::from_elem(n, None),
        ref_mask: Array1::from_elem(n, None),
        test_mask: Array1::from_elem(n, None),
        ref_cloud_type: Array1::from_elem(n, None),
        satz: Array1::zeros(n),
        sunz: Array1::zeros(n),
    };
    for idx in 0..n {
        let mask = |rng: &mut Lcg| match rng.below(5) {
            0 => None,
            1 | 2 => Some(CloudMask::Clear),
            _ => Some(CloudMask::Cloudy),
        };
        let phase = |rng: &mut Lcg| match rng.below(4) {
            0 => None,
            1 => Some(Phase::Liquid),
            _ => Some(Phase::Ice),
        };
        fields.ref_mask[idx] = mask(&mut rng);
        fields.test_mask[idx] = mask(&mut rng);
        fields.ref_phase[idx] = phase(&mut rng);
        fields.test_phase[idx] = phase(&mut rng);
        let ref_height = 500.0 + 12_000.0 * rng.next_f64();
        fields.ref_height[idx] = (rng.below(6) != 0).then(|| ref_height);
        fields.test_height[idx] =
            (rng.below(6) != 0).then(|| ref_height + 2_000.0 * (rng.next_f64() - 0.5));
        let ref_temperature = 290.0 - ref_height * 6.5e-3;
        fields.ref_temperature[idx] = (rng.below(6) != 0).then(|| ref_temperature);
        fields.test_temperature[idx] =
            (rng.below(6) != 0).then(|| ref_temperature + 10.0 * (rng.next_f64() - 0.5));
        fields.ref_cloud_type[idx] = CloudType::from_code(rng.below(10) as u8);
        fields.satz[idx] = 80.0 * rng.next_f64();
        fields.sunz[idx] = 180.0 * rng.next_f64();
    }
    fields
}

/// `n` pixels spread over the globe.
pub fn synthetic_geolocation(n: usize) -> Geolocation {
    let mut rng = Lcg::new(7);
    let mut lon = Array1::zeros(n);
    let mut lat = Array1::zeros(n);
    for idx in 0..n {
        lon[idx] = 360.0 * rng.next_f64() - 180.0;
        lat[idx] = 180.0 * rng.next_f64() - 90.0;
    }
    Geolocation { lon, lat }
}
