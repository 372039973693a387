//! Radar echo classifier: a fuzzy combination of reflectivity texture,
//! reflectivity spin, velocity, spectrum width and velocity variability over a
//! beam x gate kernel.

use super::beam::{Beam, BAD};
use super::interest::{ClassifierContext, MISSING};
use crate::config::{FieldScaling, RecConfig};
use crate::math::{KernelStats, StatsHelper};
use log::warn;

/// Squared gate-to-gate reflectivity difference above which a warning is logged.
pub const DBZ_DIFF_SQ_MAX: f64 = 10_000.0;

/// Per-beam classifier inputs over reflectivity gates, computed once.
#[derive(Debug, Clone, PartialEq)]
pub struct RecVars {
    pub dbz_diff_sq: Vec<f64>,
    pub dbz_spin_change: Vec<f64>,
}

impl RecVars {
    pub fn compute(beam: &Beam, spin_threshold: f64) -> Self {
        let Some(refl) = beam.reflectivity.as_ref() else {
            return Self {
                dbz_diff_sq: Vec::new(),
                dbz_spin_change: Vec::new(),
            };
        };
        let n = refl.data.len();
        let mut dbz_diff_sq = vec![MISSING; n];
        let mut dbz_spin_change = vec![MISSING; n];
        let unscale = |raw: u8| raw as f64 * refl.scaling.scale + refl.scaling.bias;
        for i in 1..n {
            let (prev, cur) = (refl.data[i - 1], refl.data[i]);
            if prev == BAD || cur == BAD {
                continue;
            }
            let diff = unscale(cur) - unscale(prev);
            let diff_sq = diff * diff;
            if diff_sq > DBZ_DIFF_SQ_MAX {
                warn!(
                    "reflectivity difference squared {:.1} exceeds limit at gate {} (az {:.2})",
                    diff_sq, i, beam.azimuth
                );
            }
            dbz_diff_sq[i] = diff_sq;
            dbz_spin_change[i] = if diff >= spin_threshold { 1.0 } else { 0.0 };
        }
        Self {
            dbz_diff_sq,
            dbz_spin_change,
        }
    }
}

/// Range of window indices around `mid` usable for the kernel.
///
/// Walking backward each step may move at most `kernel_azimuth_width / 2 *
/// azimuth_tolerance` degrees and stay within `elevation_tolerance` of the
/// centre beam; walking forward the limits are `2 * azimuth_tolerance` and
/// `2 * elevation_tolerance`. Both directions stop at a gate-count change.
pub fn beam_limits(window: &[&Beam], mid: usize, config: &RecConfig) -> (usize, usize) {
    let centre = window[mid];
    let n_gates = centre.vel_geometry.num_gates;
    let mut min = mid;
    let mut max = mid;

    let backward_step = config.kernel_azimuth_width / 2.0 * config.azimuth_tolerance;
    let mut prev_az = centre.azimuth;
    for ii in (0..mid).rev() {
        let beam = window[ii];
        if beam.vel_geometry.num_gates != n_gates
            || StatsHelper::azimuth_difference(beam.azimuth, prev_az).abs() > backward_step
            || (beam.elevation - centre.elevation).abs() > config.elevation_tolerance
        {
            break;
        }
        min = ii;
        prev_az = beam.azimuth;
    }

    let mut prev_az = centre.azimuth;
    for (ii, beam) in window.iter().enumerate().skip(mid + 1) {
        if beam.vel_geometry.num_gates != n_gates
            || StatsHelper::azimuth_difference(beam.azimuth, prev_az).abs()
                > 2.0 * config.azimuth_tolerance
            || (beam.elevation - centre.elevation).abs() > 2.0 * config.elevation_tolerance
        {
            break;
        }
        max = ii;
        prev_az = beam.azimuth;
    }

    (min, max)
}

/// Odd number of velocity gates spanning `kernel_range_len_km`.
pub fn kernel_gates(kernel_range_len_km: f64, vel_gate_spacing_m: f64) -> usize {
    let n = (kernel_range_len_km / (vel_gate_spacing_m * 0.001) + 0.5) as usize;
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Whether `beam` carries everything the classifier needs.
pub fn is_ready(beam: &Beam) -> bool {
    beam.complete
        && beam.calc_rec
        && beam.spectrum_width.is_some()
        && beam.velocity.is_some()
        && beam.reflectivity.is_some()
        && beam.refl_geometry.gate_spacing_m != 0.0
        && beam.vel_geometry.gate_spacing_m != 0.0
}

/// Classifier values on the velocity gates of `window[mid]`.
///
/// Every beam of the window must already hold its [`RecVars`]; beams without
/// them contribute nothing. Returns `None` when the centre beam is not ready.
pub fn compute_rec(
    window: &[&Beam],
    mid: usize,
    ctx: &ClassifierContext,
    rec_scaling: FieldScaling,
) -> Option<Vec<u8>> {
    let centre = *window.get(mid)?;
    if !is_ready(centre) {
        return None;
    }
    let refl = centre.reflectivity.as_ref()?;
    let vel = centre.velocity.as_ref()?;
    let width = centre.spectrum_width.as_ref()?;

    let refl_spacing = centre.refl_geometry.gate_spacing_m;
    let vel_spacing = centre.vel_geometry.gate_spacing_m;
    let dop_per_refl = (refl_spacing / vel_spacing) as usize;
    if dop_per_refl == 0 {
        warn!(
            "reflectivity gate spacing {} is finer than velocity spacing {}",
            refl_spacing, vel_spacing
        );
        return None;
    }
    if dop_per_refl as f64 * vel_spacing != refl_spacing {
        warn!("reflectivity spacing is not an even multiple of doppler spacing");
    }

    let config = ctx.config();
    let (min_beam, max_beam) = beam_limits(window, mid, config);

    let n_vel = centre.vel_geometry.num_gates.min(vel.data.len());
    let half = kernel_gates(config.kernel_range_len_km, vel_spacing) / 2;

    let mut texture = vec![MISSING; n_vel];
    let mut spin = vec![MISSING; n_vel];
    let mut vel_value = vec![MISSING; n_vel];
    let mut vel_sdev = vec![MISSING; n_vel];
    let mut width_value = vec![MISSING; n_vel];

    let unscale_vel = |raw: u8| raw as f64 * vel.scaling.scale + vel.scaling.bias;

    for igate in half..n_vel.saturating_sub(half) {
        let mut texture_stats = KernelStats::default();
        let mut spin_stats = KernelStats::default();
        let mut vel_stats = KernelStats::default();

        for beam in &window[min_beam..=max_beam] {
            let vars = beam.rec_vars();
            let beam_vel = beam.velocity.as_ref().map(|m| m.data.as_slice());
            for jj in igate - half..=igate + half {
                let jj_refl = jj / dop_per_refl;
                if let Some(vars) = vars {
                    let dds = vars.dbz_diff_sq.get(jj_refl).copied().unwrap_or(MISSING);
                    if dds != MISSING {
                        texture_stats.push(dds);
                    }
                    let dsc = vars
                        .dbz_spin_change
                        .get(jj_refl)
                        .copied()
                        .unwrap_or(MISSING);
                    if dsc != MISSING {
                        spin_stats.push(dsc);
                    }
                }
                if let Some(&raw) = beam_vel.and_then(|v| v.get(jj)) {
                    if raw != BAD {
                        vel_stats.push(unscale_vel(raw));
                    }
                }
            }
        }

        if let Some(mean) = texture_stats.mean() {
            texture[igate] = mean;
        }
        if let Some(mean) = spin_stats.mean() {
            spin[igate] = mean * 100.0;
        }
        if let Some(sdev) = vel_stats.sdev() {
            vel_sdev[igate] = sdev;
        }
        if let Some(&raw) = vel.data.get(igate) {
            if raw != BAD {
                vel_value[igate] = unscale_vel(raw);
            }
        }
        if let Some(&raw) = width.data.get(igate) {
            if raw != BAD {
                width_value[igate] = raw as f64 * width.scaling.scale + width.scaling.bias;
            }
        }
    }

    let maps = ctx.maps();
    let rec = (0..n_vel)
        .map(|igate| {
            match refl.data.get(igate / dop_per_refl) {
                Some(&raw) if raw != BAD => {}
                _ => return BAD,
            }
            let (mut sum_interest, mut sum_weight) = (0.0, 0.0);
            maps.dbz_texture
                .accumulate(texture[igate], &mut sum_interest, &mut sum_weight);
            maps.dbz_spin
                .accumulate(spin[igate], &mut sum_interest, &mut sum_weight);
            maps.velocity
                .accumulate(vel_value[igate], &mut sum_interest, &mut sum_weight);
            maps.width
                .accumulate(width_value[igate], &mut sum_interest, &mut sum_weight);
            maps.velocity_sdev
                .accumulate(vel_sdev[igate], &mut sum_interest, &mut sum_weight);
            if sum_weight == 0.0 {
                return BAD;
            }
            let value = sum_interest / sum_weight;
            ((value - rec_scaling.bias) / rec_scaling.scale + 0.5) as u8
        })
        .collect();
    Some(rec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldScaling;
    use crate::processing::beam::{GateGeometry, Moment};

    const REC: FieldScaling = FieldScaling::new(0.004, -0.004);

    fn beam(azimuth: f64, refl: Vec<u8>, vel: Vec<u8>) -> Beam {
        let n_vel = vel.len();
        let mut beam = Beam::empty(azimuth, 0.5, 0.0);
        beam.refl_geometry = GateGeometry {
            num_gates: refl.len(),
            first_gate_m: 0.0,
            gate_spacing_m: 1000.0,
        };
        beam.vel_geometry = GateGeometry {
            num_gates: n_vel,
            first_gate_m: 0.0,
            gate_spacing_m: 250.0,
        };
        beam.reflectivity = Some(Moment::new(refl, FieldScaling::new(0.5, -33.0)));
        beam.velocity = Some(Moment::new(vel, FieldScaling::new(0.5, -64.5)));
        beam.spectrum_width = Some(Moment::new(vec![130; n_vel], FieldScaling::new(0.5, -64.5)));
        beam.complete = true;
        beam.calc_rec = true;
        beam
    }

    #[test]
    fn rec_vars_mark_first_and_bad_gates_missing() {
        // 86 -> 10 dBZ, 90 -> 12 dBZ, 88 -> 11 dBZ
        let b = beam(0.0, vec![86, 90, BAD, 88, 86], vec![129; 20]);
        let vars = RecVars::compute(&b, 2.0);
        assert_eq!(vars.dbz_diff_sq[0], MISSING);
        assert_eq!(vars.dbz_diff_sq[1], 4.0);
        assert_eq!(vars.dbz_spin_change[1], 1.0);
        assert_eq!(vars.dbz_diff_sq[2], MISSING);
        assert_eq!(vars.dbz_diff_sq[3], MISSING);
        assert_eq!(vars.dbz_diff_sq[4], 1.0);
        assert_eq!(vars.dbz_spin_change[4], 0.0);
    }

    #[test]
    fn kernel_is_odd() {
        assert_eq!(kernel_gates(1.0, 250.0), 5);
        assert_eq!(kernel_gates(0.5, 250.0), 3);
        assert_eq!(kernel_gates(1.0, 1000.0), 1);
    }

    #[test]
    fn window_limits_are_tighter_backward_than_forward() {
        // backward step limit: 3.0 / 2 * 1.0 = 1.5 deg; forward: 2 * 1.0 = 2.0 deg
        let config = RecConfig {
            azimuth_tolerance: 1.0,
            ..Default::default()
        };
        let beams = [
            beam(6.2, vec![86; 5], vec![129; 20]),
            beam(8.2, vec![86; 5], vec![129; 20]),
            beam(10.0, vec![86; 5], vec![129; 20]),
            beam(11.8, vec![86; 5], vec![129; 20]),
            beam(13.9, vec![86; 5], vec![129; 20]),
        ];
        let window: Vec<&Beam> = beams.iter().collect();
        // 1.8 deg back is too far, 1.8 deg forward is fine, 2.1 deg is not
        assert_eq!(beam_limits(&window, 2, &config), (2, 3));
    }

    #[test]
    fn window_stops_at_gate_count_change() {
        let config = RecConfig::default();
        let beams = [
            beam(9.0, vec![86; 5], vec![129; 16]),
            beam(10.0, vec![86; 5], vec![129; 20]),
            beam(11.0, vec![86; 5], vec![129; 20]),
        ];
        let window: Vec<&Beam> = beams.iter().collect();
        assert_eq!(beam_limits(&window, 1, &config), (1, 2));
    }

    #[test]
    fn bad_reflectivity_gives_bad_rec() {
        let ctx = ClassifierContext::new(&RecConfig::default()).unwrap();
        let mut beams: Vec<Beam> = (0..3)
            .map(|i| beam(9.0 + i as f64, vec![86, BAD, 90, 88, 86], vec![129; 20]))
            .collect();
        for b in &mut beams {
            b.ensure_rec_vars(2.0);
        }
        let window: Vec<&Beam> = beams.iter().collect();
        let rec = compute_rec(&window, 1, &ctx, REC).unwrap();
        assert_eq!(rec.len(), 20);
        // reflectivity gate 1 covers velocity gates 4..8
        assert!(rec[4..8].iter().all(|&v| v == BAD));
        // interior gates with a full kernel get a value
        assert!(rec[8..18].iter().all(|&v| v != BAD));
    }

    #[test]
    fn stationary_echo_scores_as_clutter() {
        let ctx = ClassifierContext::new(&RecConfig::default()).unwrap();
        // zero velocity, narrow width, flat reflectivity
        let mut beams: Vec<Beam> = (0..5)
            .map(|i| {
                let mut b = beam(8.0 + i as f64, vec![120; 5], vec![129; 20]);
                b.spectrum_width = Some(Moment::new(vec![130; 20], FieldScaling::new(0.5, -64.5)));
                b
            })
            .collect();
        for b in &mut beams {
            b.ensure_rec_vars(2.0);
        }
        let window: Vec<&Beam> = beams.iter().collect();
        let rec = compute_rec(&window, 2, &ctx, REC).unwrap();
        // texture 0, spin 0, velocity 0, width 0.5, sdev 0 -> interest 3/5
        let expected = ((0.6 + 0.004) / 0.004 + 0.5) as u8;
        assert_eq!(rec[10], expected);
        // edge gates lack a full kernel and have no inputs
        assert_eq!(rec[0], BAD);
        assert!(ctx.is_initialized());
    }

    #[test]
    fn incomplete_beam_is_not_classified() {
        let ctx = ClassifierContext::new(&RecConfig::default()).unwrap();
        let mut b = beam(10.0, vec![86; 5], vec![129; 20]);
        b.complete = false;
        assert!(compute_rec(&[&b], 0, &ctx, REC).is_none());
    }
}
