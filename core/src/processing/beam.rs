use super::derived::{compute_power_ratio, compute_snr};
use super::rec::RecVars;
use super::sweep::SweepData;
use crate::config::{FieldScaling, IngestConfig};
use crate::wire::legacy::{DBZ_BIAS, DBZ_SCALE, VEL_BIAS, VEL_SCALE};
use crate::wire::message::{BeamSource, MomentKind};
use crate::wire::superres::MomentBlock;
use log::{debug, error};
use serde::{Deserialize, Serialize};

/// Sentinel for below-noise and range-folded gates in every byte field.
pub const BAD: u8 = 0;
/// Sentinel for missing differential phase.
pub const PHI_MISSING: i16 = -999;
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Which moments a tilt carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanType {
    ReflOnly,
    VelOnly,
    Both,
    None,
}

impl ScanType {
    pub fn classify(source: &BeamSource<'_>) -> Self {
        let refl = source.has_moment(MomentKind::Reflectivity);
        let vel = source.has_moment(MomentKind::Velocity);
        match (refl, vel) {
            (true, true) => Self::Both,
            (true, false) => Self::ReflOnly,
            (false, true) => Self::VelOnly,
            (false, false) => Self::None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ReflOnly => "REFL_ONLY",
            Self::VelOnly => "VEL_ONLY",
            Self::Both => "BOTH",
            Self::None => "NONE",
        }
    }
}

/// Gate layout of one moment, in metres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GateGeometry {
    pub num_gates: usize,
    pub first_gate_m: f64,
    pub gate_spacing_m: f64,
}

/// Stored gate values with the scaling back to physical units.
#[derive(Debug, Clone, PartialEq)]
pub struct Moment<T> {
    pub data: Vec<T>,
    pub scaling: FieldScaling,
}

impl<T> Moment<T> {
    pub fn new(data: Vec<T>, scaling: FieldScaling) -> Self {
        Self { data, scaling }
    }
}

/// Copies byte gates, folding the wire's 0 and 1 codes into [`BAD`].
/// The result is truncated or zero-filled to `len`.
pub fn store_bytes(raw: &[u8], len: usize) -> Vec<u8> {
    let mut out: Vec<u8> = raw
        .iter()
        .take(len)
        .map(|&v| if v < 2 { BAD } else { v })
        .collect();
    out.resize(len, BAD);
    out
}

/// Copies 16-bit phase gates as offsets from 32768, mapping 0 and 1 to
/// [`PHI_MISSING`]. Truncated or padded with [`PHI_MISSING`] to `len`.
pub fn store_halfwords(raw: &[u16], len: usize) -> Vec<i16> {
    let mut out: Vec<i16> = raw
        .iter()
        .take(len)
        .map(|&v| {
            if v < 2 {
                PHI_MISSING
            } else {
                (v as i32 - 32768) as i16
            }
        })
        .collect();
    out.resize(len, PHI_MISSING);
    out
}

fn resample<T: Clone>(data: &[T], len: usize, fill: T) -> Vec<T> {
    let mut out: Vec<T> = data.iter().take(len).cloned().collect();
    out.resize(len, fill);
    out
}

/// A moment as located in the source message, before storage.
struct SourceMoment<'a> {
    geometry: GateGeometry,
    scaling: FieldScaling,
    block: Option<&'a MomentBlock<'a>>,
    data: &'a [u8],
}

fn source_moment<'a>(source: &'a BeamSource<'a>, kind: MomentKind) -> Option<SourceMoment<'a>> {
    match source {
        BeamSource::Legacy(radial) => {
            let (data, gates, first, spacing, scale, bias) = match kind {
                MomentKind::Reflectivity => (
                    radial.reflectivity?,
                    radial.ref_num_gates,
                    radial.ref_gate1,
                    radial.ref_gate_width,
                    DBZ_SCALE,
                    DBZ_BIAS,
                ),
                MomentKind::Velocity => (
                    radial.velocity?,
                    radial.vel_num_gates,
                    radial.vel_gate1,
                    radial.vel_gate_width,
                    VEL_SCALE,
                    VEL_BIAS,
                ),
                MomentKind::SpectrumWidth => (
                    radial.spectrum_width?,
                    radial.vel_num_gates,
                    radial.vel_gate1,
                    radial.vel_gate_width,
                    VEL_SCALE,
                    VEL_BIAS,
                ),
                _ => return None,
            };
            Some(SourceMoment {
                geometry: GateGeometry {
                    num_gates: gates.max(0) as usize,
                    first_gate_m: first as f64,
                    gate_spacing_m: spacing as f64,
                },
                scaling: FieldScaling::new(scale, bias),
                block: None,
                data,
            })
        }
        BeamSource::SuperRes(radial) => {
            let block = radial.moment(kind)?;
            let (scale, bias) = block.scale_bias();
            Some(SourceMoment {
                geometry: GateGeometry {
                    num_gates: block.num_gates as usize,
                    first_gate_m: block.gate1 as f64,
                    gate_spacing_m: block.gate_width as f64,
                },
                scaling: FieldScaling::new(scale, bias),
                block: Some(block),
                data: block.data,
            })
        }
    }
}

/// One radial, owned by the sweep that built it.
#[derive(Debug, Clone)]
pub struct Beam {
    pub azimuth: f64,
    pub elevation: f64,
    /// Seconds since the Unix epoch.
    pub time: f64,
    pub elev_num: i32,
    pub unambiguous_range_km: f64,
    pub nyquist_velocity: f64,
    pub prf: f64,
    pub horiz_noise: f64,
    pub vert_noise: f64,
    pub refl_geometry: GateGeometry,
    pub vel_geometry: GateGeometry,
    pub reflectivity: Option<Moment<u8>>,
    pub velocity: Option<Moment<u8>>,
    pub spectrum_width: Option<Moment<u8>>,
    pub zdr: Option<Moment<u8>>,
    pub phi: Option<Moment<i16>>,
    pub rho: Option<Moment<u8>>,
    pub snr: Option<Vec<u8>>,
    pub power_ratio: Option<Vec<u8>>,
    pub rec: Option<Vec<u8>>,
    /// No further merge is expected.
    pub complete: bool,
    /// Reflectivity was copied in from a donor beam.
    pub merged: bool,
    pub calc_rec: bool,
    /// PRF of the donor beam, for merged beams.
    pub donor_prf: Option<f64>,
    /// Legacy 1.0 m/s velocity resolution doubles the output scaling.
    pub velocity_scale_factor: f64,
    rec_vars: Option<RecVars>,
}

impl Beam {
    /// A beam with position and time only; no moments.
    pub fn empty(azimuth: f64, elevation: f64, time: f64) -> Self {
        Self {
            azimuth,
            elevation,
            time,
            elev_num: 0,
            unambiguous_range_km: 0.0,
            nyquist_velocity: 0.0,
            prf: 0.0,
            horiz_noise: -999.0,
            vert_noise: -999.0,
            refl_geometry: GateGeometry::default(),
            vel_geometry: GateGeometry::default(),
            reflectivity: None,
            velocity: None,
            spectrum_width: None,
            zdr: None,
            phi: None,
            rho: None,
            snr: None,
            power_ratio: None,
            rec: None,
            complete: false,
            merged: false,
            calc_rec: false,
            donor_prf: None,
            velocity_scale_factor: 1.0,
            rec_vars: None,
        }
    }

    /// Builds a beam from either wire layout.
    ///
    /// `previous` is the sweep a Doppler-only beam borrows reflectivity from.
    pub fn build(
        source: &BeamSource<'_>,
        scan_type: ScanType,
        config: &IngestConfig,
        previous: Option<&SweepData>,
    ) -> Self {
        let mut beam = Self::empty(source.azimuth(), source.elevation(), source.time());
        beam.elev_num = source.elev_num();
        beam.unambiguous_range_km = source.unambiguous_range_km();
        beam.prf = prf_for_range(beam.unambiguous_range_km);
        beam.nyquist_velocity = source.nyquist_velocity();
        beam.calc_rec = config.rec.is_some()
            && (scan_type == ScanType::Both || config.combine_sweeps);
        match source {
            BeamSource::Legacy(radial) => {
                beam.velocity_scale_factor = radial.velocity_scale_factor();
            }
            BeamSource::SuperRes(radial) => {
                beam.horiz_noise = radial.radial.horiz_noise as f64;
                beam.vert_noise = radial.radial.vert_noise as f64;
            }
        }

        let previous_has_beams = previous.is_some_and(|sweep| !sweep.is_empty());
        match scan_type {
            ScanType::ReflOnly => {
                beam.store_reflectivity(source);
                let n_refl = beam.refl_geometry.num_gates;
                beam.store_dual_pol(source, n_refl, config, true);
                beam.complete = !config.combine_sweeps;
            }
            ScanType::VelOnly => {
                beam.store_velocity(source);
                let n_vel = beam.vel_geometry.num_gates;
                beam.store_dual_pol(source, n_vel, config, false);
                beam.complete = true;
                if config.combine_sweeps {
                    match previous.filter(|_| previous_has_beams) {
                        Some(donor) => beam.merge_reflectivity(donor, config),
                        None => beam.complete = false,
                    }
                }
            }
            ScanType::Both => {
                beam.store_velocity(source);
                let merge_from = previous.filter(|sweep| {
                    config.combine_sweeps
                        && !sweep.is_empty()
                        && sweep.scan_type() == ScanType::ReflOnly
                });
                match merge_from {
                    Some(donor) => beam.merge_reflectivity(donor, config),
                    None => beam.store_reflectivity(source),
                }
                let n_vel = beam.vel_geometry.num_gates;
                beam.store_dual_pol(source, n_vel, config, false);
                beam.complete = true;
            }
            ScanType::None => {
                error!(
                    "could not determine scan type of beam at az {:.2} el {:.2}",
                    beam.azimuth, beam.elevation
                );
            }
        }

        if !beam.merged {
            beam.compute_derived(config);
        }
        beam
    }

    fn store_reflectivity(&mut self, source: &BeamSource<'_>) {
        if let Some(moment) = source_moment(source, MomentKind::Reflectivity) {
            let n = moment.geometry.num_gates;
            self.refl_geometry = moment.geometry;
            self.reflectivity = Some(Moment::new(store_bytes(moment.data, n), moment.scaling));
        }
    }

    fn store_velocity(&mut self, source: &BeamSource<'_>) {
        if let Some(moment) = source_moment(source, MomentKind::Velocity) {
            let n = moment.geometry.num_gates;
            self.vel_geometry = moment.geometry;
            self.velocity = Some(Moment::new(store_bytes(moment.data, n), moment.scaling));
        }
        if let Some(moment) = source_moment(source, MomentKind::SpectrumWidth) {
            if moment.geometry.num_gates != self.vel_geometry.num_gates {
                error!("spectrum width gate count does not match velocity");
            }
            if moment.geometry.first_gate_m != self.vel_geometry.first_gate_m
                || moment.geometry.gate_spacing_m != self.vel_geometry.gate_spacing_m
            {
                error!("spectrum width gate geometry does not match velocity");
            }
            let n = self.vel_geometry.num_gates;
            self.spectrum_width = Some(Moment::new(store_bytes(moment.data, n), moment.scaling));
        }
    }

    /// Stores the dual-polarisation moments resampled to `len` gates.
    ///
    /// The phase bias keeps its two historical forms: offset from 32768 on
    /// surveillance beams, plain `-(offset / scale)` elsewhere.
    fn store_dual_pol(
        &mut self,
        source: &BeamSource<'_>,
        len: usize,
        config: &IngestConfig,
        surveillance: bool,
    ) {
        if config.save_zdr {
            if let Some(moment) = source_moment(source, MomentKind::DifferentialReflectivity) {
                self.zdr = Some(Moment::new(store_bytes(moment.data, len), moment.scaling));
            }
        }
        if config.save_phi {
            if let Some(block) =
                source_moment(source, MomentKind::DifferentialPhase).and_then(|m| m.block)
            {
                let scale = block.scale as f64;
                let offset = block.offset as f64;
                let bias = if surveillance {
                    (32768.0 - offset) / scale
                } else {
                    -(offset / scale)
                };
                self.phi = Some(Moment::new(
                    store_halfwords(&block.halfwords(), len),
                    FieldScaling::new(1.0 / scale, bias),
                ));
            }
        }
        if config.save_rho {
            if let Some(moment) = source_moment(source, MomentKind::CorrelationCoefficient) {
                self.rho = Some(Moment::new(store_bytes(moment.data, len), moment.scaling));
            }
        }
    }

    /// Copies reflectivity (and missing dual-pol fields) from the closest
    /// donor beam, then recomputes SNR and power ratio.
    fn merge_reflectivity(&mut self, donor_sweep: &SweepData, config: &IngestConfig) {
        let donor = donor_sweep
            .closest_beam(self.azimuth, self.elevation, self.time, &config.merge)
            .filter(|beam| beam.reflectivity.is_some());
        let Some(donor) = donor else {
            debug!(
                "failed to merge beam at el {:.2} az {:.2}",
                self.elevation, self.azimuth
            );
            self.refl_geometry = GateGeometry::default();
            self.reflectivity = None;
            self.complete = false;
            return;
        };

        self.refl_geometry = donor.refl_geometry;
        self.reflectivity = donor.reflectivity.clone();

        let n_vel = self.vel_geometry.num_gates;
        if config.save_zdr && self.zdr.is_none() {
            if let Some(zdr) = &donor.zdr {
                self.zdr = Some(Moment::new(store_bytes(&zdr.data, n_vel), zdr.scaling));
            }
        }
        if config.save_phi && self.phi.is_none() {
            if let Some(phi) = &donor.phi {
                self.phi = Some(Moment::new(
                    resample(&phi.data, n_vel, PHI_MISSING),
                    phi.scaling,
                ));
            }
        }
        if config.save_rho && self.rho.is_none() {
            if let Some(rho) = &donor.rho {
                self.rho = Some(Moment::new(store_bytes(&rho.data, n_vel), rho.scaling));
            }
        }

        self.compute_derived(config);
        self.merged = true;
        self.complete = true;
        self.donor_prf = Some(donor.prf);
    }

    /// SNR and power ratio over the reflectivity gates, when configured.
    pub fn compute_derived(&mut self, config: &IngestConfig) {
        let Some(refl) = &self.reflectivity else {
            return;
        };
        let Some(snr_scaling) = config.snr else {
            return;
        };
        let snr = compute_snr(
            &refl.data,
            refl.scaling,
            self.refl_geometry,
            config.snr_factor,
            snr_scaling,
        );
        if let Some(pr_scaling) = config.power_ratio {
            self.power_ratio = Some(compute_power_ratio(
                &snr,
                snr_scaling,
                self.unambiguous_range_km,
                self.refl_geometry.gate_spacing_m,
                pr_scaling,
                config.power_ratio_default,
            ));
        }
        self.snr = Some(snr);
    }

    /// Caches the classifier's reflectivity inputs; later calls are no-ops.
    pub fn ensure_rec_vars(&mut self, spin_threshold: f64) {
        if self.rec_vars.is_none() {
            self.rec_vars = Some(RecVars::compute(self, spin_threshold));
        }
    }

    pub fn rec_vars(&self) -> Option<&RecVars> {
        self.rec_vars.as_ref()
    }

    pub fn has_reflectivity(&self) -> bool {
        self.reflectivity.is_some()
    }
}

/// PRF implied by an unambiguous range, Hz.
pub fn prf_for_range(unambiguous_range_km: f64) -> f64 {
    if unambiguous_range_km <= 0.0 {
        return 0.0;
    }
    SPEED_OF_LIGHT / (2.0 * unambiguous_range_km * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode::{
        legacy_radial_body, superres_radial_body, LegacyRadialSpec, MomentSpec,
        SuperResRadialSpec,
    };
    use crate::wire::legacy::LegacyRadial;
    use crate::wire::superres::SuperResRadial;

    fn config() -> IngestConfig {
        IngestConfig {
            combine_sweeps: false,
            ..Default::default()
        }
    }

    fn superres(moments: Vec<MomentSpec>) -> Vec<u8> {
        superres_radial_body(&SuperResRadialSpec {
            azimuth: 45.0,
            elevation: 0.5,
            moments,
            ..Default::default()
        })
    }

    #[test]
    fn store_folds_zero_and_one_into_bad() {
        assert_eq!(store_bytes(&[0, 1, 2, 200], 4), vec![BAD, BAD, 2, 200]);
        assert_eq!(store_bytes(&[5, 6, 7], 2), vec![5, 6]);
        assert_eq!(store_bytes(&[5], 3), vec![5, BAD, BAD]);
    }

    #[test]
    fn phase_halfwords_are_offset_from_midscale() {
        assert_eq!(
            store_halfwords(&[0, 1, 32768, 32868], 5),
            vec![PHI_MISSING, PHI_MISSING, 0, 100, PHI_MISSING]
        );
    }

    #[test]
    fn prf_from_unambiguous_range() {
        assert!((prf_for_range(466.0) - 321.66).abs() < 0.01);
        assert_eq!(prf_for_range(0.0), 0.0);
    }

    #[test]
    fn legacy_both_beam_uses_wire_constants() {
        let body = legacy_radial_body(&LegacyRadialSpec {
            azimuth: 10.0,
            elevation: 2.4,
            elev_num: 3,
            unamb_range_x10: 1170,
            ref_gate1: 1000,
            ref_gate_width: 1000,
            vel_gate1: 250,
            vel_gate_width: 250,
            reflectivity: vec![0, 1, 120, 140],
            velocity: vec![129; 16],
            spectrum_width: vec![8; 16],
            ..Default::default()
        });
        let radial = LegacyRadial::decode(&body).unwrap();
        let source = BeamSource::Legacy(radial);
        let scan = ScanType::classify(&source);
        assert_eq!(scan, ScanType::Both);
        let beam = Beam::build(&source, scan, &config(), None);
        let refl = beam.reflectivity.as_ref().unwrap();
        assert_eq!(refl.data, vec![BAD, BAD, 120, 140]);
        assert_eq!(refl.scaling, FieldScaling::new(0.5, -33.0));
        assert_eq!(beam.velocity.as_ref().unwrap().scaling.bias, -64.5);
        assert_eq!(beam.refl_geometry.gate_spacing_m, 1000.0);
        assert_eq!(beam.vel_geometry.num_gates, 16);
        assert!(beam.complete);
        assert!(beam.calc_rec);
        let snr = beam.snr.as_ref().unwrap();
        assert_eq!(snr[0], BAD);
        assert_ne!(snr[2], BAD);
        assert_eq!(beam.power_ratio.as_ref().unwrap()[1], BAD);
    }

    #[test]
    fn superres_scaling_comes_from_block() {
        let body = superres(vec![
            MomentSpec::bytes(b"REF", 2125, 250, 2.0, 66.0, vec![2, 100]),
            MomentSpec::bytes(b"VEL", 2125, 250, 2.0, 129.0, vec![129, 0]),
        ]);
        let radial = SuperResRadial::decode(&body).unwrap();
        let beam = Beam::build(&BeamSource::SuperRes(radial), ScanType::Both, &config(), None);
        let refl = beam.reflectivity.as_ref().unwrap();
        assert_eq!(refl.scaling, FieldScaling::new(0.5, -33.0));
        let vel = beam.velocity.as_ref().unwrap();
        assert_eq!(vel.scaling, FieldScaling::new(0.5, -64.5));
        assert_eq!(vel.data, vec![129, BAD]);
        assert_eq!(beam.refl_geometry.first_gate_m, 2125.0);
    }

    #[test]
    fn phase_bias_depends_on_surveillance_path() {
        let phi = MomentSpec::halfwords(b"PHI", 2125, 250, 2.8361, 2.0, &[32868; 4]);
        let refl = MomentSpec::bytes(b"REF", 2125, 250, 2.0, 66.0, vec![100; 4]);
        let vel = MomentSpec::bytes(b"VEL", 2125, 250, 2.0, 129.0, vec![129; 4]);

        let body = superres(vec![refl.clone(), phi.clone()]);
        let radial = SuperResRadial::decode(&body).unwrap();
        let surveillance = Beam::build(&BeamSource::SuperRes(radial), ScanType::ReflOnly, &config(), None);
        let p = surveillance.phi.as_ref().unwrap();
        let scale = 2.8361f32 as f64;
        assert!((p.scaling.bias - (32768.0 - 2.0) / scale).abs() < 1e-9);
        assert_eq!(p.data, vec![100; 4]);

        let body = superres(vec![refl, vel, phi]);
        let radial = SuperResRadial::decode(&body).unwrap();
        let both = Beam::build(&BeamSource::SuperRes(radial), ScanType::Both, &config(), None);
        let p = both.phi.as_ref().unwrap();
        assert!((p.scaling.bias + 2.0 / scale).abs() < 1e-9);
    }

    #[test]
    fn dual_pol_resampled_to_velocity_gates() {
        let body = superres(vec![
            MomentSpec::bytes(b"REF", 2125, 250, 2.0, 66.0, vec![100; 6]),
            MomentSpec::bytes(b"VEL", 2125, 250, 2.0, 129.0, vec![129; 4]),
            MomentSpec::bytes(b"ZDR", 2125, 250, 16.0, 128.0, vec![140; 6]),
            MomentSpec::bytes(b"RHO", 2125, 250, 300.0, -60.5, vec![250; 2]),
        ]);
        let radial = SuperResRadial::decode(&body).unwrap();
        let beam = Beam::build(&BeamSource::SuperRes(radial), ScanType::Both, &config(), None);
        assert_eq!(beam.zdr.as_ref().unwrap().data, vec![140; 4]);
        assert_eq!(beam.rho.as_ref().unwrap().data, vec![250, 250, BAD, BAD]);
    }

    #[test]
    fn disabled_dual_pol_is_not_stored() {
        let body = superres(vec![
            MomentSpec::bytes(b"REF", 2125, 250, 2.0, 66.0, vec![100; 4]),
            MomentSpec::bytes(b"ZDR", 2125, 250, 16.0, 128.0, vec![140; 4]),
        ]);
        let radial = SuperResRadial::decode(&body).unwrap();
        let cfg = IngestConfig {
            save_zdr: false,
            ..config()
        };
        let beam = Beam::build(&BeamSource::SuperRes(radial), ScanType::ReflOnly, &cfg, None);
        assert!(beam.zdr.is_none());
        assert!(beam.complete);
    }

    #[test]
    fn velocity_only_without_donor_is_incomplete_when_combining() {
        let body = superres(vec![MomentSpec::bytes(
            b"VEL",
            2125,
            250,
            2.0,
            129.0,
            vec![129; 4],
        )]);
        let radial = SuperResRadial::decode(&body).unwrap();
        let cfg = IngestConfig::default();
        let beam = Beam::build(&BeamSource::SuperRes(radial), ScanType::VelOnly, &cfg, None);
        assert!(!beam.complete);
        assert!(!beam.merged);
        assert!(beam.reflectivity.is_none());
        assert!(beam.snr.is_none());
    }

    #[test]
    fn rec_vars_are_cached() {
        let mut beam = Beam::empty(0.0, 0.5, 0.0);
        beam.reflectivity = Some(Moment::new(vec![86, 90], FieldScaling::new(0.5, -33.0)));
        beam.ensure_rec_vars(2.0);
        let first = beam.rec_vars().cloned();
        beam.reflectivity = Some(Moment::new(vec![86, 86], FieldScaling::new(0.5, -33.0)));
        beam.ensure_rec_vars(2.0);
        assert_eq!(beam.rec_vars().cloned(), first);
    }
}
