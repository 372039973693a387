//! Per-gate fields derived from reflectivity: signal-to-noise ratio and the
//! power ratio used to spot range-aliased echoes.

use super::beam::{GateGeometry, BAD};
use crate::config::FieldScaling;

/// Scales a physical SNR value into a byte, never producing the bad sentinel.
fn scale_snr(value: f64, scaling: FieldScaling) -> u8 {
    let mut scaled = (value - scaling.bias) / scaling.scale;
    if scaled < 0.5 {
        scaled = 1.0;
    }
    if scaled > 255.0 {
        scaled = 255.0;
    }
    (scaled + 0.5) as u8
}

/// SNR for every reflectivity gate.
///
/// `snr = dbz + 20 log10(snr_factor / r_km)`; gates with bad reflectivity or
/// a non-positive range stay bad.
pub fn compute_snr(
    dbz: &[u8],
    dbz_scaling: FieldScaling,
    geometry: GateGeometry,
    snr_factor: f64,
    snr_scaling: FieldScaling,
) -> Vec<u8> {
    dbz.iter()
        .enumerate()
        .map(|(i, &raw)| {
            let range_km = (i as f64 * geometry.gate_spacing_m + geometry.first_gate_m) * 0.001;
            if raw == BAD || range_km <= 0.0 {
                return BAD;
            }
            let dbz_value = raw as f64 * dbz_scaling.scale + dbz_scaling.bias;
            let snr = dbz_value + 20.0 * (snr_factor / range_km).log10();
            scale_snr(snr, snr_scaling)
        })
        .collect()
}

/// Power ratio of each gate against the echoes it could alias with.
///
/// Gates a whole number of unambiguous ranges apart are summed in linear
/// SNR; `pr = snr - 10 log10(sum)`. Where nothing aliases the gate gets the
/// scaled `default_db`, which also caps computed values from above.
pub fn compute_power_ratio(
    snr: &[u8],
    snr_scaling: FieldScaling,
    unambiguous_range_km: f64,
    gate_spacing_m: f64,
    pr_scaling: FieldScaling,
    default_db: f64,
) -> Vec<u8> {
    let default = ((default_db - pr_scaling.bias) / pr_scaling.scale).clamp(0.0, 255.0) as u8;
    let offset = if gate_spacing_m > 0.0 {
        (unambiguous_range_km / (gate_spacing_m * 0.001) + 0.5) as usize
    } else {
        0
    };
    let unscale = |raw: u8| raw as f64 * snr_scaling.scale + snr_scaling.bias;

    snr.iter()
        .enumerate()
        .map(|(i, &raw)| {
            if raw == BAD {
                return BAD;
            }
            let mut linear_sum = 0.0;
            if offset > 0 {
                let before = (1..=i / offset).map(|k| i - k * offset);
                let after = (1..).map(|k| i + k * offset).take_while(|&j| j < snr.len());
                for j in before.chain(after) {
                    if snr[j] != BAD {
                        linear_sum += 10f64.powf(unscale(snr[j]) / 10.0);
                    }
                }
            }
            if linear_sum == 0.0 {
                return default;
            }
            let pr = unscale(raw) - 10.0 * linear_sum.log10();
            let mut scaled = (pr - pr_scaling.bias) / pr_scaling.scale;
            if scaled < 0.5 {
                scaled = 1.0;
            }
            if scaled > default as f64 - 0.5 {
                scaled = default as f64 - 1.0;
            }
            (scaled + 0.5) as u8
        })
        .collect()
}
