use super::beam::{Beam, ScanType};
use super::interest::ClassifierContext;
use super::rec::compute_rec;
use crate::config::{FieldScaling, IngestConfig, MergeTolerances};
use crate::math::StatsHelper;
use crate::wire::message::BeamSource;
use crate::wire::products::{
    AdaptationData, ClutterBypassMap, ClutterFilterMap, RdaStatus, VcpCut, VolumeCoveragePattern,
    Waveform,
};
use log::debug;
use serde::Serialize;
use std::collections::VecDeque;

/// Azimuth coverage below which a sweep counts as having a seam gap, deg.
pub const FULL_COVERAGE_DEG: f64 = 359.5;
/// First and last beams closer than this many mean spacings share a seam.
pub const SEAM_SPACING_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SweepState {
    Accumulating,
    Merging,
    Complete,
    Skipped,
}

/// Auxiliary products most recently received, attached at a tilt boundary.
#[derive(Debug, Clone, Default)]
pub struct AuxProducts {
    pub vcp: Option<VolumeCoveragePattern>,
    pub status: Option<RdaStatus>,
    pub adaptation: Option<AdaptationData>,
    pub clutter_map: Option<ClutterFilterMap>,
    pub bypass_map: Option<ClutterBypassMap>,
}

/// Beams of one tilt in arrival order, plus tilt metadata.
#[derive(Debug, Clone)]
pub struct SweepData {
    beams: Vec<Beam>,
    scan_type: ScanType,
    state: SweepState,
    elev_num: i32,
    vcp: Option<u16>,
    volume_number: u32,
    site: Option<String>,
    rec_queue: VecDeque<usize>,
    queue_width: usize,
    rec_scaling: Option<FieldScaling>,
    aux: AuxProducts,
    clutter_segment: Option<usize>,
    combining: bool,
}

impl SweepData {
    pub fn new(elev_num: i32, scan_type: ScanType, config: &IngestConfig) -> Self {
        Self {
            beams: Vec::new(),
            scan_type,
            state: SweepState::Accumulating,
            elev_num,
            vcp: None,
            volume_number: 0,
            site: None,
            rec_queue: VecDeque::new(),
            queue_width: config.rec_params.normalized_queue_width(),
            rec_scaling: config.rec,
            aux: AuxProducts::default(),
            clutter_segment: None,
            combining: config.combine_sweeps,
        }
    }

    /// Scan type of a tilt starting with `source`.
    ///
    /// When sweeps are combined the VCP waveform wins over the moments
    /// present: surveillance cuts are reflectivity-only and Doppler cuts
    /// with ambiguity resolution are velocity-only.
    pub fn classify(
        source: &BeamSource<'_>,
        config: &IngestConfig,
        vcp: Option<&VolumeCoveragePattern>,
    ) -> ScanType {
        let from_moments = ScanType::classify(source);
        if !config.combine_sweeps {
            return from_moments;
        }
        let waveform = usize::try_from(source.elev_num())
            .ok()
            .and_then(|n| vcp.and_then(|v| v.cut(n)))
            .map(|cut| cut.waveform);
        match (waveform, from_moments) {
            (Some(Waveform::ContiguousSurveillance), ScanType::Both) => ScanType::ReflOnly,
            (Some(Waveform::ContiguousDopplerWithAmbiguityResolution), ScanType::Both) => {
                ScanType::VelOnly
            }
            _ => from_moments,
        }
    }

    pub fn beams(&self) -> &[Beam] {
        &self.beams
    }

    pub fn len(&self) -> usize {
        self.beams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beams.is_empty()
    }

    pub fn scan_type(&self) -> ScanType {
        self.scan_type
    }

    pub fn state(&self) -> SweepState {
        self.state
    }

    pub fn elev_num(&self) -> i32 {
        self.elev_num
    }

    pub fn vcp(&self) -> Option<u16> {
        self.vcp
    }

    pub fn set_vcp(&mut self, vcp: Option<u16>) {
        self.vcp = vcp;
    }

    pub fn volume_number(&self) -> u32 {
        self.volume_number
    }

    pub fn set_volume_number(&mut self, volume_number: u32) {
        self.volume_number = volume_number;
    }

    pub fn site(&self) -> Option<&str> {
        self.site.as_deref()
    }

    pub fn set_site(&mut self, site: Option<String>) {
        self.site = site;
    }

    pub fn aux(&self) -> &AuxProducts {
        &self.aux
    }

    pub fn clutter_segment(&self) -> Option<usize> {
        self.clutter_segment
    }

    pub fn attach_aux(&mut self, aux: AuxProducts, clutter_segment: Option<usize>) {
        self.aux = aux;
        self.clutter_segment = clutter_segment;
    }

    /// VCP cut entry for this tilt, if a VCP has been attached.
    pub fn vcp_cut(&self) -> Option<&VcpCut> {
        let n = usize::try_from(self.elev_num).ok()?;
        self.aux.vcp.as_ref()?.cut(n)
    }

    /// Whether this tilt takes part in split-cut combining.
    pub fn is_combining(&self) -> bool {
        self.combining
    }

    pub fn set_combining(&mut self, combining: bool) {
        self.combining = combining;
    }

    pub fn mark_merging(&mut self) {
        if self.state == SweepState::Accumulating {
            self.state = SweepState::Merging;
        }
    }

    pub fn mark_skipped(&mut self) {
        self.state = SweepState::Skipped;
    }

    pub fn is_skipped(&self) -> bool {
        self.state == SweepState::Skipped
    }

    pub fn has_complete_beam(&self) -> bool {
        self.beams.iter().any(|beam| beam.complete)
    }

    pub fn is_merged(&self) -> bool {
        self.beams.iter().any(|beam| beam.merged)
    }

    /// Appends a beam; once the trailing queue is full the classifier runs
    /// on its middle beam.
    pub fn add_beam(&mut self, beam: Beam, ctx: &ClassifierContext) {
        let calc_rec = beam.calc_rec && self.rec_scaling.is_some();
        self.beams.push(beam);
        if calc_rec {
            self.enqueue(self.beams.len() - 1, ctx);
        }
    }

    fn enqueue(&mut self, index: usize, ctx: &ClassifierContext) {
        self.rec_queue.push_back(index);
        if self.rec_queue.len() > self.queue_width {
            self.rec_queue.pop_front();
        }
        if self.rec_queue.len() == self.queue_width {
            self.classify_queue_middle(ctx);
        }
    }

    fn classify_queue_middle(&mut self, ctx: &ClassifierContext) {
        let Some(scaling) = self.rec_scaling else {
            return;
        };
        let threshold = ctx.config().spin_dbz_threshold;
        let window: Vec<usize> = self.rec_queue.iter().copied().collect();
        for &idx in &window {
            self.beams[idx].ensure_rec_vars(threshold);
        }
        let mid = window.len() / 2;
        let rec = {
            let beams: Vec<&Beam> = window.iter().map(|&idx| &self.beams[idx]).collect();
            compute_rec(&beams, mid, ctx, scaling)
        };
        if let Some(rec) = rec {
            self.beams[window[mid]].rec = Some(rec);
        }
    }

    /// Absolute sum of wrap-corrected azimuth steps between consecutive beams.
    pub fn coverage(&self) -> f64 {
        let azimuths: Vec<f64> = self.beams.iter().map(|beam| beam.azimuth).collect();
        StatsHelper::azimuth_coverage(&azimuths)
    }

    /// Mean azimuth step between consecutive beams.
    pub fn mean_spacing(&self) -> Option<f64> {
        if self.beams.len() < 2 {
            return None;
        }
        Some(self.coverage() / (self.beams.len() - 1) as f64)
    }

    /// True when the sweep stops short of a full circle but its ends meet.
    pub fn needs_seam_fill(&self) -> bool {
        let (Some(first), Some(last), Some(spacing)) =
            (self.beams.first(), self.beams.last(), self.mean_spacing())
        else {
            return false;
        };
        self.coverage() < FULL_COVERAGE_DEG
            && StatsHelper::azimuth_difference(first.azimuth, last.azimuth).abs()
                <= SEAM_SPACING_FACTOR * spacing
    }

    /// Wraps the trailing queue onto the first beams so beams on either side
    /// of the seam get a full classifier window.
    pub fn fill_seam(&mut self, ctx: &ClassifierContext) -> bool {
        if self.rec_queue.len() < self.queue_width || !self.needs_seam_fill() {
            return false;
        }
        let wrap = (self.queue_width - 1).min(self.beams.len());
        debug!(
            "wrapping classifier queue over {} beams at seam of tilt {}",
            wrap, self.elev_num
        );
        for idx in 0..wrap {
            if self.beams[idx].calc_rec {
                self.enqueue(idx, ctx);
            }
        }
        true
    }

    /// Fills the seam and marks the sweep complete.
    pub fn finalize(&mut self, ctx: &ClassifierContext) {
        self.fill_seam(ctx);
        self.state = SweepState::Complete;
    }

    /// Closest beam in azimuth among those within every merge tolerance.
    pub fn closest_beam(
        &self,
        azimuth: f64,
        elevation: f64,
        time: f64,
        tolerances: &MergeTolerances,
    ) -> Option<&Beam> {
        self.beams
            .iter()
            .filter(|beam| {
                (beam.elevation - elevation).abs() <= tolerances.elevation
                    && (beam.time - time).abs() <= tolerances.time
            })
            .map(|beam| {
                (
                    StatsHelper::azimuth_difference(beam.azimuth, azimuth).abs(),
                    beam,
                )
            })
            .filter(|(diff, _)| *diff <= tolerances.azimuth)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, beam)| beam)
    }

    /// Pulses per beam implied by antenna rate and PRF.
    pub fn pulse_count(&self) -> Option<u32> {
        let prf = self.beams.first()?.prf;
        self.pulses_at(prf)
    }

    /// Pulse count of the surveillance scan reflectivity was borrowed from.
    pub fn surveillance_pulse_count(&self) -> Option<u32> {
        let prf = self.beams.iter().find_map(|beam| beam.donor_prf)?;
        self.pulses_at(prf)
    }

    fn pulses_at(&self, prf: f64) -> Option<u32> {
        let first = self.beams.first()?;
        let last = self.beams.last()?;
        let elapsed = last.time - first.time;
        let spacing = self.mean_spacing()?;
        if elapsed <= 0.0 || spacing <= 0.0 {
            return None;
        }
        let rate = self.coverage() / elapsed;
        let dwell = spacing / rate;
        Some((prf * dwell).round() as u32)
    }

    /// Largest velocity scale factor seen on the tilt.
    pub fn velocity_scale_factor(&self) -> f64 {
        self.beams
            .iter()
            .map(|beam| beam.velocity_scale_factor)
            .fold(1.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecConfig;
    use crate::processing::beam::{GateGeometry, Moment, BAD};

    fn config(azimuth_tolerance: f64) -> IngestConfig {
        IngestConfig {
            rec_params: RecConfig {
                azimuth_tolerance,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn rec_beam(azimuth: f64, time: f64) -> Beam {
        let mut beam = Beam::empty(azimuth, 0.5, time);
        beam.refl_geometry = GateGeometry {
            num_gates: 10,
            first_gate_m: 1000.0,
            gate_spacing_m: 1000.0,
        };
        beam.vel_geometry = GateGeometry {
            num_gates: 40,
            first_gate_m: 1000.0,
            gate_spacing_m: 250.0,
        };
        beam.reflectivity = Some(Moment::new(vec![120; 10], FieldScaling::new(0.5, -33.0)));
        beam.velocity = Some(Moment::new(vec![129; 40], FieldScaling::new(0.5, -64.5)));
        beam.spectrum_width = Some(Moment::new(vec![130; 40], FieldScaling::new(0.5, -64.5)));
        beam.complete = true;
        beam.calc_rec = true;
        beam.prf = 1000.0;
        beam
    }

    fn sweep_of(azimuths: impl Iterator<Item = f64>, cfg: &IngestConfig) -> SweepData {
        let ctx = ClassifierContext::new(&cfg.rec_params).unwrap();
        let mut sweep = SweepData::new(1, ScanType::Both, cfg);
        for (i, az) in azimuths.enumerate() {
            sweep.add_beam(rec_beam(az, i as f64 * 0.1), &ctx);
        }
        sweep
    }

    #[test]
    fn queue_classifies_middle_beam_once_full() {
        let cfg = config(1.5);
        let ctx = ClassifierContext::new(&cfg.rec_params).unwrap();
        let mut sweep = SweepData::new(1, ScanType::Both, &cfg);
        for i in 0..4 {
            sweep.add_beam(rec_beam(i as f64, 0.0), &ctx);
        }
        assert!(sweep.beams().iter().all(|b| b.rec.is_none()));
        sweep.add_beam(rec_beam(4.0, 0.0), &ctx);
        assert!(sweep.beams()[2].rec.is_some());
        assert!(sweep.beams()[1].rec.is_none());
        assert_eq!(ctx.build_count(), 1);
    }

    #[test]
    fn full_circle_has_no_seam_gap() {
        let cfg = config(1.5);
        let sweep = sweep_of((0..=720).map(|i| (i as f64 * 0.5) % 360.0), &cfg);
        assert!((sweep.coverage() - 360.0).abs() < 0.5);
        assert!(!sweep.needs_seam_fill());
    }

    #[test]
    fn seam_fill_classifies_beams_on_both_sides_of_gap() {
        // 10 deg beams from 0 to 350, so the last beam sits one spacing before the first
        let cfg = config(8.0);
        let ctx = ClassifierContext::new(&cfg.rec_params).unwrap();
        let mut sweep = SweepData::new(1, ScanType::Both, &cfg);
        for i in 0..36 {
            sweep.add_beam(rec_beam(i as f64 * 10.0, i as f64), &ctx);
        }
        assert!((sweep.coverage() - 350.0).abs() < 1e-9);
        assert!(sweep.needs_seam_fill());
        let half = cfg.rec_params.normalized_queue_width() / 2;
        let n = sweep.len();
        let lacking: Vec<usize> = (0..half).chain(n - half..n).collect();
        assert!(lacking.iter().all(|&i| sweep.beams()[i].rec.is_none()));

        sweep.finalize(&ctx);
        assert_eq!(sweep.state(), SweepState::Complete);
        for &i in &lacking {
            let rec = sweep.beams()[i].rec.as_ref().unwrap();
            assert!(rec[20] != BAD, "beam {} not classified", i);
        }
    }

    #[test]
    fn distant_ends_are_not_wrapped() {
        let cfg = config(1.5);
        let ctx = ClassifierContext::new(&cfg.rec_params).unwrap();
        let mut sweep = sweep_of((0..100).map(|i| i as f64), &cfg);
        assert!(!sweep.fill_seam(&ctx));
        assert!(sweep.beams()[0].rec.is_none());
    }

    #[test]
    fn closest_beam_respects_tolerances() {
        let cfg = IngestConfig::default();
        let ctx = ClassifierContext::new(&cfg.rec_params).unwrap();
        let mut sweep = SweepData::new(1, ScanType::ReflOnly, &cfg);
        for az in [358.0, 359.6, 1.0, 3.0] {
            sweep.add_beam(Beam::empty(az, 0.5, 100.0), &ctx);
        }
        let tol = MergeTolerances::default();
        let beam = sweep.closest_beam(0.1, 0.5, 110.0, &tol).unwrap();
        assert_eq!(beam.azimuth, 359.6);
        assert!(sweep.closest_beam(5.0, 0.5, 100.0, &tol).is_none());
        assert!(sweep.closest_beam(1.0, 1.5, 100.0, &tol).is_none());
        assert!(sweep.closest_beam(1.0, 0.5, 400.0, &tol).is_none());
    }

    #[test]
    fn pulse_count_from_rotation_rate() {
        // 1 deg spacing at 10 deg/s is a 0.1 s dwell; 1000 Hz gives 100 pulses
        let cfg = config(1.5);
        let sweep = sweep_of((0..11).map(|i| i as f64), &cfg);
        assert_eq!(sweep.pulse_count(), Some(100));
        assert_eq!(sweep.surveillance_pulse_count(), None);
    }
}
