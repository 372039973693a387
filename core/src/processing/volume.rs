//! Volume controller: routes decoded messages into tilts and decides when a
//! tilt is finished, merged, held back as a donor, or dropped.

use super::beam::{Beam, ScanType};
use super::interest::ClassifierContext;
use super::sweep::{AuxProducts, SweepData};
use crate::config::IngestConfig;
use crate::output::FinishedSweep;
use crate::prelude::{ConfigError, IngestResult, IngestStatus, RangeTable, SweepSink};
use crate::telemetry::{LogManager, MetricsRecorder};
use crate::wire::framer::MessageFramer;
use crate::wire::message::{decode_message, BeamSource, RawMessage};
use crate::wire::products::segment_for_elevation;
use log::{debug, warn};
use std::sync::Arc;

/// Radial status marking the first radial of a volume scan.
const BEGIN_VOLUME_STATUS: i32 = 3;

/// Current and previous tilt plus the auxiliary products seen so far.
///
/// The previous slot only ever lends data to the current tilt by copy, so it
/// can be replaced at any transition.
pub struct VolumeController<S: SweepSink> {
    config: IngestConfig,
    /// `config` with combining off, for tilts of a VCP outside `merge_vcps`.
    standalone: IngestConfig,
    classifier: ClassifierContext,
    sink: S,
    range_table: Option<Box<dyn RangeTable>>,
    current: Option<SweepData>,
    previous: Option<SweepData>,
    /// A merge has copied data out of `previous`.
    previous_used: bool,
    last_elev_num: Option<i32>,
    volume_number: u32,
    title_pending: bool,
    aux: AuxProducts,
    log: LogManager,
    metrics: Arc<MetricsRecorder>,
}

impl<S: SweepSink> VolumeController<S> {
    pub fn new(config: IngestConfig, sink: S) -> Result<Self, ConfigError> {
        let classifier = ClassifierContext::new(&config.rec_params)?;
        let standalone = IngestConfig {
            combine_sweeps: false,
            ..config.clone()
        };
        Ok(Self {
            config,
            standalone,
            classifier,
            sink,
            range_table: None,
            current: None,
            previous: None,
            previous_used: false,
            last_elev_num: None,
            volume_number: 0,
            title_pending: false,
            aux: AuxProducts::default(),
            log: LogManager::new(),
            metrics: Arc::new(MetricsRecorder::new()),
        })
    }

    pub fn with_range_table(mut self, table: Box<dyn RangeTable>) -> Self {
        self.range_table = Some(table);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn classifier(&self) -> &ClassifierContext {
        &self.classifier
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    pub fn volume_number(&self) -> u32 {
        self.volume_number
    }

    pub fn current(&self) -> Option<&SweepData> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&SweepData> {
        self.previous.as_ref()
    }

    /// Frames, decodes and folds one buffer of records into the sweep state.
    ///
    /// `volume_title_seen` marks the buffer as the start of a new volume.
    /// Framing and decode problems are logged and counted; only a failing
    /// sink is returned as an error.
    pub fn ingest_message(
        &mut self,
        raw: &[u8],
        volume_title_seen: bool,
    ) -> IngestResult<IngestStatus> {
        let mut status = IngestStatus::default();
        if volume_title_seen {
            self.title_pending = true;
        }

        for frame in MessageFramer::new(raw) {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => {
                    warn!("skipping record: {err}");
                    status.errors += 1;
                    continue;
                }
            };
            status.messages += 1;
            let message_type = frame.message_type();
            match decode_message(message_type, &frame.payload) {
                Ok(message) => {
                    if let Err(err) = self.handle(message, &mut status) {
                        self.metrics.record(&status);
                        return Err(err);
                    }
                }
                Err(err) => {
                    warn!(
                        "skipping type {message_type} message at offset {}: {err}",
                        frame.offset
                    );
                    status.errors += 1;
                }
            }
        }

        self.metrics.record(&status);
        Ok(status)
    }

    /// Flushes the tilt in progress and reports a donor nothing merged with.
    pub fn end_of_data(&mut self) -> IngestResult<IngestStatus> {
        let mut status = IngestStatus::default();
        let result = match self.current.take() {
            Some(outgoing) => self.close_sweep(outgoing, &mut status),
            None => Ok(()),
        };
        if result.is_ok() {
            self.replace_previous(None, &mut status);
        }
        self.metrics.record(&status);
        result.map(|_| status)
    }

    fn handle(&mut self, message: RawMessage<'_>, status: &mut IngestStatus) -> IngestResult<()> {
        match message {
            RawMessage::Beam(source) => self.handle_beam(&source, status)?,
            RawMessage::Status(rda) => self.aux.status = Some(rda),
            RawMessage::Vcp(vcp) => {
                debug!("VCP {} with {} cuts", vcp.pattern_number, vcp.cuts.len());
                self.aux.vcp = Some(vcp);
            }
            RawMessage::Adaptation(adaptation) => self.aux.adaptation = Some(adaptation),
            RawMessage::ClutterBypassMap(map) => self.aux.bypass_map = Some(map),
            RawMessage::ClutterMap(map) => self.aux.clutter_map = Some(map),
            RawMessage::Other { message_type } => {
                debug!("ignoring message type {message_type}");
            }
        }
        Ok(())
    }

    fn handle_beam(&mut self, source: &BeamSource<'_>, status: &mut IngestStatus) -> IngestResult<()> {
        let elev_num = source.elev_num();
        let decreasing = self.last_elev_num.is_some_and(|last| elev_num < last);
        let scan_start = source.radial_status() == BEGIN_VOLUME_STATUS;
        let new_volume =
            self.title_pending || scan_start || decreasing || self.last_elev_num.is_none();
        if new_volume {
            self.title_pending = false;
            self.volume_number += 1;
            self.log.volume_started(self.volume_number);
        }
        self.last_elev_num = Some(elev_num);

        let boundary = new_volume
            || self
                .current
                .as_ref()
                .map_or(true, |sweep| sweep.elev_num() != elev_num);
        if boundary {
            if let Some(outgoing) = self.current.take() {
                self.close_sweep(outgoing, status)?;
            }
            self.current = Some(self.open_sweep(source));
        }

        status.beams += 1;
        let Some(current) = self.current.as_mut() else {
            return Ok(());
        };
        if current.is_skipped() {
            return Ok(());
        }
        let config = if current.is_combining() {
            &self.config
        } else {
            &self.standalone
        };
        let beam = Beam::build(source, current.scan_type(), config, self.previous.as_ref());
        if beam.merged {
            self.previous_used = true;
        }
        current.add_beam(beam, &self.classifier);
        Ok(())
    }

    fn open_sweep(&self, source: &BeamSource<'_>) -> SweepData {
        let elev_num = source.elev_num();
        let vcp = source
            .vcp()
            .or_else(|| self.aux.vcp.as_ref().map(|vcp| vcp.pattern_number));
        let combining =
            self.config.combine_sweeps && vcp.map_or(true, |vcp| self.config.is_merge_vcp(vcp));
        let config = if combining {
            &self.config
        } else {
            &self.standalone
        };
        let scan_type = SweepData::classify(source, config, self.aux.vcp.as_ref());
        let mut sweep = SweepData::new(elev_num, scan_type, config);
        sweep.set_vcp(vcp);
        sweep.set_combining(combining);
        sweep.set_volume_number(self.volume_number);
        sweep.set_site(source.site().map(str::to_owned));

        let fixed_angle = usize::try_from(elev_num)
            .ok()
            .and_then(|n| self.aux.vcp.as_ref()?.cut(n))
            .map_or(source.elevation(), |cut| cut.elevation);
        let limits = match &self.aux.adaptation {
            Some(adaptation)
                if self.config.use_adaptation_segment_limits
                    && !adaptation.segment_limits.is_empty() =>
            {
                adaptation.segment_limits.as_slice()
            }
            _ => self.config.segment_limits.as_slice(),
        };
        let segment = segment_for_elevation(limits, fixed_angle);
        sweep.attach_aux(self.aux.clone(), Some(segment));

        if combining && scan_type == ScanType::VelOnly {
            let has_donor = self.previous.as_ref().is_some_and(|sweep| !sweep.is_empty());
            if has_donor {
                sweep.mark_merging();
            } else {
                sweep.mark_skipped();
            }
        }
        debug!(
            "volume {} tilt {elev_num}: {} at {fixed_angle:.2} deg",
            self.volume_number,
            scan_type.label()
        );
        sweep
    }

    fn close_sweep(&mut self, mut outgoing: SweepData, status: &mut IngestStatus) -> IngestResult<()> {
        let volume = outgoing.volume_number();
        let elev_num = outgoing.elev_num();

        if outgoing.is_skipped() {
            self.log.sweep_skipped(volume, elev_num);
            status.sweeps_skipped += 1;
            return Ok(());
        }

        if outgoing.has_complete_beam() {
            outgoing.finalize(&self.classifier);
            let finished = FinishedSweep::assemble(
                &outgoing,
                &self.config,
                self.range_table.as_deref(),
            );
            self.sink.write(&finished)?;
            status.sweeps_written += 1;
            self.log.sweep_written(
                volume,
                elev_num,
                finished.attributes.fixed_angle,
                finished.num_rays(),
            );
            self.replace_previous(None, status);
            return Ok(());
        }

        let held_as_donor = outgoing.is_combining()
            && outgoing.scan_type() == ScanType::ReflOnly
            && !outgoing.is_empty();
        if !held_as_donor {
            let reason = if outgoing.state() == super::sweep::SweepState::Merging {
                "no donor beam within merge tolerance"
            } else {
                "no complete beams"
            };
            self.log.sweep_lost(volume, elev_num, reason);
            status.sweeps_lost += 1;
        }
        self.replace_previous(Some(outgoing), status);
        Ok(())
    }

    /// Puts `next` in the previous slot. A surveillance tilt leaving the slot
    /// without having lent any data was never written anywhere.
    fn replace_previous(&mut self, next: Option<SweepData>, status: &mut IngestStatus) {
        if let Some(old) = self.previous.take() {
            let unused_donor = old.scan_type() == ScanType::ReflOnly
                && !old.has_complete_beam()
                && !old.is_empty()
                && !self.previous_used;
            if unused_donor && old.is_combining() {
                self.log.sweep_lost(
                    old.volume_number(),
                    old.elev_num(),
                    "surveillance tilt never merged",
                );
                status.sweeps_lost += 1;
            }
        }
        self.previous = next;
        self.previous_used = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemorySink;
    use crate::prelude::SinkError;
    use crate::wire::products::{BypassSegment, ClutterBypassMap, ClutterFilterMap, RangeZone};
    use crate::wire::encode::{
        superres_radial_body, vcp_body, write_filler, write_record, write_segmented,
        MomentSpec, SuperResRadialSpec, VcpCutSpec, WireTime,
    };

    const T0: f64 = 1_300_000_000.0;

    fn refl(value: u8) -> MomentSpec {
        MomentSpec::bytes(b"REF", 2125, 250, 2.0, 66.0, vec![value; 40])
    }

    fn vel() -> Vec<MomentSpec> {
        vec![
            MomentSpec::bytes(b"VEL", 2125, 250, 2.0, 129.0, vec![129; 60]),
            MomentSpec::bytes(b"SW ", 2125, 250, 2.0, 129.0, vec![10; 60]),
        ]
    }

    /// Appends a tilt of 36 radials, 10 deg apart, one second per radial.
    fn tilt(out: &mut Vec<u8>, elev_num: u8, elevation: f32, start: f64, moments: impl Fn(usize) -> Vec<MomentSpec>) {
        tilt_with_status(out, elev_num, elevation, start, 1, moments);
    }

    /// Like `tilt`, with `first_status` on the opening radial.
    fn tilt_with_status(
        out: &mut Vec<u8>,
        elev_num: u8,
        elevation: f32,
        start: f64,
        first_status: u8,
        moments: impl Fn(usize) -> Vec<MomentSpec>,
    ) {
        for i in 0..36 {
            let time = WireTime::from_epoch_seconds(start + i as f64);
            let spec = SuperResRadialSpec {
                time,
                radial_num: i as u16 + 1,
                azimuth: i as f32 * 10.0,
                radial_status: if i == 0 { first_status } else { 1 },
                elev_num,
                elevation,
                moments: moments(i),
                ..Default::default()
            };
            write_record(out, 31, &superres_radial_body(&spec), 1, 1, time);
        }
    }

    fn split_cut_vcp(out: &mut Vec<u8>) {
        let cut = |elevation: f64, waveform_type: u8| VcpCutSpec {
            elevation,
            waveform_type,
            surveillance_pulse_count: 15,
            doppler_pulse_count: 40,
            azimuth_rate: 20.0,
            ..Default::default()
        };
        let body = vcp_body(212, &[cut(0.5, 1), cut(0.5, 2), cut(1.5, 4)]);
        write_segmented(out, 5, &body, 1200, WireTime::from_epoch_seconds(T0));
    }

    fn controller() -> VolumeController<MemorySink> {
        VolumeController::new(IngestConfig::default(), MemorySink::default()).unwrap()
    }

    #[test]
    fn split_cut_merges_donor_reflectivity() {
        let mut raw = Vec::new();
        split_cut_vcp(&mut raw);
        tilt(&mut raw, 1, 0.5, T0, |i| vec![refl(100 + i as u8)]);
        tilt(&mut raw, 2, 0.5, T0 + 40.0, |_| vel());
        tilt(&mut raw, 3, 1.5, T0 + 80.0, |i| {
            let mut moments = vec![refl(150 + i as u8)];
            moments.extend(vel());
            moments
        });

        let mut ctl = controller();
        let mut status = ctl.ingest_message(&raw, true).unwrap();
        status.absorb(ctl.end_of_data().unwrap());

        assert_eq!(status.beams, 108);
        assert_eq!(status.sweeps_written, 2);
        assert_eq!(status.sweeps_lost, 0);
        assert_eq!(status.errors, 0);

        let sweeps = &ctl.sink().sweeps;
        assert_eq!(sweeps[0].attributes.elev_num, 2);
        assert!(sweeps[0].attributes.merged);
        let dz = sweeps[0].field("DZ").unwrap();
        assert_eq!(dz.num_gates(), 40);
        for (row, values) in dz.data.outer_iter().enumerate() {
            assert!(values.iter().all(|&v| v == 100 + row as u8), "row {row}");
        }
        assert!(sweeps[0].field("VE").is_some());

        // the combined tilt keeps its own reflectivity
        assert_eq!(sweeps[1].attributes.elev_num, 3);
        assert!(!sweeps[1].attributes.merged);
        let dz = sweeps[1].field("DZ").unwrap();
        assert_eq!(dz.data[[0, 0]], 150);
        assert_eq!(ctl.classifier().build_count(), 1);
    }

    #[test]
    fn doppler_tilt_without_donor_is_skipped() {
        let mut raw = Vec::new();
        tilt(&mut raw, 2, 0.5, T0, |_| vel());
        let mut ctl = controller();
        let mut status = ctl.ingest_message(&raw, true).unwrap();
        status.absorb(ctl.end_of_data().unwrap());
        assert_eq!(status.sweeps_skipped, 1);
        assert_eq!(status.sweeps_written, 0);
        assert!(ctl.sink().sweeps.is_empty());
    }

    #[test]
    fn uncombined_tilts_are_written_as_they_close() {
        let config = IngestConfig {
            combine_sweeps: false,
            ..Default::default()
        };
        let mut ctl = VolumeController::new(config, MemorySink::default()).unwrap();
        let mut raw = Vec::new();
        tilt(&mut raw, 1, 0.5, T0, |_| vec![refl(120)]);
        tilt(&mut raw, 2, 0.5, T0 + 40.0, |_| vel());
        let status = ctl.ingest_message(&raw, true).unwrap();
        assert_eq!(status.sweeps_written, 1);
        ctl.end_of_data().unwrap();
        assert_eq!(ctl.sink().sweeps.len(), 2);
        assert!(ctl.sink().sweeps[1].field("DZ").is_none());
    }

    #[test]
    fn volume_number_follows_title_and_elevation_reset() {
        let config = IngestConfig {
            combine_sweeps: false,
            ..Default::default()
        };
        let mut ctl = VolumeController::new(config, MemorySink::default()).unwrap();

        let mut first = Vec::new();
        tilt(&mut first, 1, 0.5, T0, |_| vec![refl(120)]);
        tilt(&mut first, 2, 1.5, T0 + 40.0, |_| vec![refl(120)]);
        ctl.ingest_message(&first, true).unwrap();
        assert_eq!(ctl.volume_number(), 1);

        // elevation number going back down starts a new volume
        let mut second = Vec::new();
        tilt(&mut second, 1, 0.5, T0 + 300.0, |_| vec![refl(120)]);
        ctl.ingest_message(&second, false).unwrap();
        assert_eq!(ctl.volume_number(), 2);

        let mut third = Vec::new();
        tilt(&mut third, 2, 1.5, T0 + 400.0, |_| vec![refl(120)]);
        ctl.ingest_message(&third, true).unwrap();
        assert_eq!(ctl.volume_number(), 3);
        ctl.end_of_data().unwrap();

        let volumes: Vec<u32> = ctl
            .sink()
            .sweeps
            .iter()
            .map(|s| s.attributes.volume_number)
            .collect();
        assert_eq!(volumes, vec![1, 1, 2, 3]);
    }

    #[test]
    fn begin_volume_status_starts_new_volume() {
        let config = IngestConfig {
            combine_sweeps: false,
            ..Default::default()
        };
        let mut raw = Vec::new();
        tilt_with_status(&mut raw, 1, 0.5, T0, 3, |_| vec![refl(120)]);
        tilt_with_status(&mut raw, 1, 0.5, T0 + 300.0, 3, |_| vec![refl(120)]);

        let mut ctl = VolumeController::new(config, MemorySink::default()).unwrap();
        ctl.ingest_message(&raw, false).unwrap();
        ctl.end_of_data().unwrap();
        assert_eq!(ctl.volume_number(), 2);
        let sweeps = &ctl.sink().sweeps;
        let rays: Vec<usize> = sweeps.iter().map(|s| s.num_rays()).collect();
        assert_eq!(rays, vec![36, 36]);
        assert_eq!(sweeps[1].attributes.volume_number, 2);
    }

    #[test]
    fn begin_volume_status_after_title_counts_once() {
        let mut raw = Vec::new();
        tilt_with_status(&mut raw, 1, 0.5, T0, 3, |_| vec![refl(120)]);
        let mut ctl = controller();
        ctl.ingest_message(&raw, true).unwrap();
        assert_eq!(ctl.volume_number(), 1);
    }

    #[test]
    fn surveillance_tilt_outside_merge_vcps_is_written_alone() {
        let config = IngestConfig {
            merge_vcps: vec![21],
            ..Default::default()
        };
        let mut raw = Vec::new();
        tilt(&mut raw, 1, 0.5, T0, |_| vec![refl(120)]);
        tilt(&mut raw, 2, 0.5, T0 + 40.0, |_| vel());

        let mut ctl = VolumeController::new(config, MemorySink::default()).unwrap();
        let mut status = ctl.ingest_message(&raw, true).unwrap();
        status.absorb(ctl.end_of_data().unwrap());
        assert_eq!(status.sweeps_written, 2);
        assert_eq!(status.sweeps_lost, 0);
        assert_eq!(status.sweeps_skipped, 0);

        let sweeps = &ctl.sink().sweeps;
        assert_eq!(sweeps[0].attributes.elev_num, 1);
        assert!(sweeps[0].field("DZ").is_some());
        assert!(!sweeps[1].attributes.merged);
        assert!(sweeps[1].field("DZ").is_none());
        assert!(sweeps[1].field("VE").is_some());
    }

    #[test]
    fn emitted_sweep_carries_map_segment_for_its_angle() {
        let config = IngestConfig {
            combine_sweeps: false,
            ..Default::default()
        };
        let zone = |end_range| RangeZone {
            op_code: 2,
            end_range,
        };
        let mut ctl = VolumeController::new(config, MemorySink::default()).unwrap();
        ctl.aux.clutter_map = Some(ClutterFilterMap {
            julian_date: 15000,
            minutes_past_midnight: 0,
            segments: (0..3u16).map(|seg| vec![vec![zone(seg + 10)]; 360]).collect(),
        });
        ctl.aux.bypass_map = Some(ClutterBypassMap {
            julian_date: 15000,
            minutes_past_midnight: 0,
            segments: (0..3u16)
                .map(|seg| BypassSegment {
                    segment_num: seg + 1,
                    words: vec![0; 360 * 32],
                })
                .collect(),
        });

        // segment limits default to 1.6, 2.5, ...
        let mut raw = Vec::new();
        tilt(&mut raw, 1, 0.5, T0, |_| vec![refl(120)]);
        tilt(&mut raw, 2, 2.0, T0 + 40.0, |_| vec![refl(120)]);
        ctl.ingest_message(&raw, true).unwrap();
        ctl.end_of_data().unwrap();

        let sweeps = &ctl.sink().sweeps;
        assert_eq!(sweeps[0].attributes.clutter_segment, Some(0));
        assert_eq!(sweeps[0].clutter_map.as_ref().unwrap()[0], vec![zone(10)]);
        assert_eq!(sweeps[1].attributes.clutter_segment, Some(1));
        assert_eq!(sweeps[1].clutter_map.as_ref().unwrap()[359], vec![zone(11)]);
        assert_eq!(sweeps[1].bypass_map.as_ref().unwrap().segment_num, 2);
    }

    #[test]
    fn malformed_radial_is_skipped_and_stream_continues() {
        let config = IngestConfig {
            combine_sweeps: false,
            ..Default::default()
        };
        let mut raw = Vec::new();
        let time = WireTime::from_epoch_seconds(T0);
        let mut body = superres_radial_body(&SuperResRadialSpec {
            time,
            moments: vec![refl(120)],
            ..Default::default()
        });
        // block count lives at byte 30 of the radial header
        body[30] = 0;
        body[31] = 12;
        write_record(&mut raw, 31, &body, 1, 1, time);
        write_filler(&mut raw);
        tilt(&mut raw, 1, 0.5, T0, |_| vec![refl(120)]);

        let mut ctl = VolumeController::new(config, MemorySink::default()).unwrap();
        let mut status = ctl.ingest_message(&raw, true).unwrap();
        status.absorb(ctl.end_of_data().unwrap());
        assert_eq!(status.errors, 1);
        assert_eq!(status.beams, 36);
        assert_eq!(ctl.sink().sweeps.len(), 1);
        assert_eq!(ctl.sink().sweeps[0].num_rays(), 36);
    }

    #[test]
    fn segmented_vcp_with_zero_first_count_still_attaches() {
        let mut raw = Vec::new();
        let time = WireTime::from_epoch_seconds(T0);
        let body = vcp_body(
            212,
            &[VcpCutSpec {
                elevation: 0.5,
                waveform_type: 4,
                surveillance_pulse_count: 15,
                doppler_pulse_count: 40,
                ..Default::default()
            }],
        );
        let (head, tail) = body.split_at(body.len() / 2);
        write_record(&mut raw, 5, head, 0, 1, time);
        write_record(&mut raw, 5, tail, 2, 2, time);
        tilt(&mut raw, 1, 0.5, T0, |_| {
            let mut moments = vec![refl(120)];
            moments.extend(vel());
            moments
        });

        let mut ctl = controller();
        ctl.ingest_message(&raw, true).unwrap();
        let current = ctl.current().unwrap();
        assert_eq!(current.aux().vcp.as_ref().map(|v| v.cuts.len()), Some(1));
        assert_eq!(current.scan_type(), ScanType::Both);
        assert_eq!(current.clutter_segment(), Some(0));
    }

    #[test]
    fn unmerged_surveillance_tilt_is_reported_lost() {
        let mut raw = Vec::new();
        tilt(&mut raw, 1, 0.5, T0, |_| vec![refl(120)]);
        let mut ctl = controller();
        let mut status = ctl.ingest_message(&raw, true).unwrap();
        status.absorb(ctl.end_of_data().unwrap());
        assert_eq!(status.sweeps_written, 0);
        assert_eq!(status.sweeps_lost, 1);
        assert_eq!(ctl.metrics().snapshot().sweeps_lost, 1);
    }

    struct FailingSink;

    impl SweepSink for FailingSink {
        fn write(&mut self, _sweep: &FinishedSweep) -> Result<(), SinkError> {
            Err(SinkError::Write("disk full".to_string()))
        }
    }

    #[test]
    fn sink_failure_is_returned() {
        let config = IngestConfig {
            combine_sweeps: false,
            ..Default::default()
        };
        let mut raw = Vec::new();
        tilt(&mut raw, 1, 0.5, T0, |_| vec![refl(120)]);
        let mut ctl = VolumeController::new(config, FailingSink).unwrap();
        ctl.ingest_message(&raw, true).unwrap();
        assert!(ctl.end_of_data().is_err());
    }
}
