//! Sweep assembly for output sinks: beams sorted by azimuth, every field laid
//! out as a rays x gates grid.

use crate::config::{FieldScaling, IngestConfig};
use crate::prelude::{RangeTable, SinkError, SweepSink};
use crate::processing::beam::{Beam, GateGeometry, Moment, ScanType, BAD, PHI_MISSING};
use crate::processing::sweep::SweepData;
use crate::wire::products::{BypassSegment, RangeZone};
use ndarray::Array2;
use serde::Serialize;

/// One output field on a common gate layout.
#[derive(Debug, Clone)]
pub struct OutputField<T> {
    pub name: &'static str,
    pub units: &'static str,
    pub scaling: FieldScaling,
    pub first_gate_m: f64,
    pub gate_spacing_m: f64,
    pub missing: T,
    pub data: Array2<T>,
}

/// Valid-gate count and physical value range of a field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSummary {
    pub valid_gates: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl<T: Copy + PartialEq + Into<f64>> OutputField<T> {
    pub fn num_gates(&self) -> usize {
        self.data.ncols()
    }

    pub fn summary(&self) -> FieldSummary {
        let mut summary = FieldSummary {
            valid_gates: 0,
            min: None,
            max: None,
        };
        for &raw in self.data.iter().filter(|&&raw| raw != self.missing) {
            let value = raw.into() * self.scaling.scale + self.scaling.bias;
            summary.valid_gates += 1;
            summary.min = Some(summary.min.map_or(value, |m| m.min(value)));
            summary.max = Some(summary.max.map_or(value, |m| m.max(value)));
        }
        summary
    }
}

/// Tilt-level attributes carried with every finished sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepAttributes {
    pub site: Option<String>,
    pub volume_number: u32,
    pub elev_num: i32,
    pub fixed_angle: f64,
    pub vcp: Option<u16>,
    pub scan_type: ScanType,
    pub merged: bool,
    /// Seconds since the Unix epoch.
    pub start_time: f64,
    pub end_time: f64,
    pub nyquist_velocity: f64,
    pub unambiguous_range_km: f64,
    pub prf: f64,
    pub pulse_count: Option<u32>,
    pub surveillance_pulse_count: Option<u32>,
    pub vcp_surveillance_pulse_count: Option<u16>,
    pub vcp_doppler_pulse_count: Option<u16>,
    pub rda_build_number: Option<u16>,
    pub velocity_scale_factor: f64,
    pub clutter_segment: Option<usize>,
}

/// What an output sink receives for one tilt.
#[derive(Debug, Clone)]
pub struct FinishedSweep {
    pub attributes: SweepAttributes,
    pub azimuth: Vec<f64>,
    pub elevation: Vec<f64>,
    pub time: Vec<f64>,
    pub horiz_noise: Vec<f64>,
    pub vert_noise: Vec<f64>,
    pub fields: Vec<OutputField<u8>>,
    pub phi: Option<OutputField<i16>>,
    /// Range zones of the selected clutter filter map segment, per azimuth.
    pub clutter_map: Option<Vec<Vec<RangeZone>>>,
    pub bypass_map: Option<BypassSegment>,
}

impl FinishedSweep {
    /// Lays out `sweep` for output. Gate counts are capped by the range table
    /// when `use_range_cutoff` is set.
    pub fn assemble(
        sweep: &SweepData,
        config: &IngestConfig,
        range_table: Option<&dyn RangeTable>,
    ) -> Self {
        let mut beams: Vec<&Beam> = sweep.beams().iter().collect();
        beams.sort_by(|a, b| a.azimuth.total_cmp(&b.azimuth));

        let fixed_angle = sweep
            .vcp_cut()
            .map(|cut| cut.elevation)
            .unwrap_or_else(|| mean_elevation(&beams));
        let max_range_km = if config.use_range_cutoff {
            range_table.and_then(|table| table.range_for_elevation(fixed_angle))
        } else {
            None
        };

        let first = beams.first().copied();
        let vel_factor = sweep.velocity_scale_factor();
        let dual_pol_on_refl = sweep.scan_type() == ScanType::ReflOnly;
        let layout = Layout {
            beams: &beams,
            max_range_km,
        };

        let mut fields = Vec::new();
        let dual_geom: fn(&Beam) -> GateGeometry = if dual_pol_on_refl {
            refl_geom
        } else {
            vel_geom
        };

        fields.extend(layout.moment("DZ", "dBZ", refl_geom, |b| b.reflectivity.as_ref(), 1.0));
        fields.extend(layout.moment("VE", "m/s", vel_geom, |b| b.velocity.as_ref(), vel_factor));
        fields.extend(layout.moment(
            "SW",
            "m/s",
            vel_geom,
            |b| b.spectrum_width.as_ref(),
            vel_factor,
        ));
        fields.extend(layout.moment("ZDR", "dB", dual_geom, |b| b.zdr.as_ref(), 1.0));
        fields.extend(layout.moment("RHO", "none", dual_geom, |b| b.rho.as_ref(), 1.0));
        if let Some(scaling) = config.snr {
            fields.extend(layout.derived("SNR", "dB", refl_geom, |b| b.snr.as_deref(), scaling));
        }
        if let Some(scaling) = config.power_ratio {
            fields.extend(layout.derived(
                "PR",
                "dB",
                refl_geom,
                |b| b.power_ratio.as_deref(),
                scaling,
            ));
        }
        if let Some(scaling) = config.rec {
            fields.extend(layout.derived("REC", "none", vel_geom, |b| b.rec.as_deref(), scaling));
        }
        let phi = layout.phi(dual_geom);

        let segment = sweep.clutter_segment();
        let aux = sweep.aux();
        let clutter_map = segment
            .and_then(|seg| aux.clutter_map.as_ref()?.segments.get(seg))
            .cloned();
        let bypass_map = segment
            .and_then(|seg| aux.bypass_map.as_ref()?.segments.get(seg))
            .cloned();

        let vcp_cut = sweep.vcp_cut();
        let attributes = SweepAttributes {
            site: sweep.site().map(str::to_string),
            volume_number: sweep.volume_number(),
            elev_num: sweep.elev_num(),
            fixed_angle,
            vcp: sweep.vcp(),
            scan_type: sweep.scan_type(),
            merged: sweep.is_merged(),
            start_time: sweep.beams().first().map_or(0.0, |b| b.time),
            end_time: sweep.beams().last().map_or(0.0, |b| b.time),
            nyquist_velocity: first.map_or(0.0, |b| b.nyquist_velocity),
            unambiguous_range_km: first.map_or(0.0, |b| b.unambiguous_range_km),
            prf: first.map_or(0.0, |b| b.prf),
            pulse_count: sweep.pulse_count(),
            surveillance_pulse_count: sweep.surveillance_pulse_count(),
            vcp_surveillance_pulse_count: vcp_cut.map(|cut| cut.surveillance_pulse_count),
            vcp_doppler_pulse_count: vcp_cut.map(|cut| cut.doppler[0].pulse_count),
            rda_build_number: sweep.aux().status.map(|status| status.rda_build_number),
            velocity_scale_factor: vel_factor,
            clutter_segment: segment,
        };

        Self {
            attributes,
            azimuth: beams.iter().map(|b| b.azimuth).collect(),
            elevation: beams.iter().map(|b| b.elevation).collect(),
            time: beams.iter().map(|b| b.time).collect(),
            horiz_noise: beams.iter().map(|b| b.horiz_noise).collect(),
            vert_noise: beams.iter().map(|b| b.vert_noise).collect(),
            fields,
            phi,
            clutter_map,
            bypass_map,
        }
    }

    pub fn num_rays(&self) -> usize {
        self.azimuth.len()
    }

    pub fn field(&self, name: &str) -> Option<&OutputField<u8>> {
        self.fields.iter().find(|field| field.name == name)
    }
}

struct Layout<'a> {
    beams: &'a [&'a Beam],
    max_range_km: Option<f64>,
}

impl Layout<'_> {
    /// Geometry of the first beam carrying the field, and the gate count
    /// covering every beam after the range cap.
    fn extent(
        &self,
        geometry: impl Fn(&Beam) -> GateGeometry,
        len: impl Fn(&Beam) -> Option<usize>,
    ) -> Option<(GateGeometry, usize)> {
        let carrier = self.beams.iter().find(|b| len(b).is_some())?;
        let geom = geometry(carrier);
        let mut gates = self.beams.iter().filter_map(|b| len(b)).max()?;
        if let Some(range_km) = self.max_range_km {
            if geom.gate_spacing_m > 0.0 {
                let cap = (range_km * 1000.0 / geom.gate_spacing_m).round() as usize;
                gates = gates.min(cap);
            }
        }
        Some((geom, gates))
    }

    fn grid<T: Copy>(&self, gates: usize, missing: T, row: impl Fn(&Beam) -> Option<&[T]>) -> Array2<T> {
        let mut grid = Array2::from_elem((self.beams.len(), gates), missing);
        for (mut out, beam) in grid.rows_mut().into_iter().zip(self.beams) {
            if let Some(data) = row(beam) {
                for (cell, &value) in out.iter_mut().zip(data) {
                    *cell = value;
                }
            }
        }
        grid
    }

    fn moment(
        &self,
        name: &'static str,
        units: &'static str,
        geometry: impl Fn(&Beam) -> GateGeometry,
        moment: impl Fn(&Beam) -> Option<&Moment<u8>>,
        factor: f64,
    ) -> Option<OutputField<u8>> {
        let (geom, gates) = self.extent(geometry, |b| moment(b).map(|m| m.data.len()))?;
        let scaling = self
            .beams
            .iter()
            .find_map(|b| moment(b).map(|m| m.scaling))?;
        Some(OutputField {
            name,
            units,
            scaling: FieldScaling::new(scaling.scale * factor, scaling.bias * factor),
            first_gate_m: geom.first_gate_m,
            gate_spacing_m: geom.gate_spacing_m,
            missing: BAD,
            data: self.grid(gates, BAD, |b| moment(b).map(|m| m.data.as_slice())),
        })
    }

    fn derived(
        &self,
        name: &'static str,
        units: &'static str,
        geometry: impl Fn(&Beam) -> GateGeometry,
        values: impl Fn(&Beam) -> Option<&[u8]>,
        scaling: FieldScaling,
    ) -> Option<OutputField<u8>> {
        let (geom, gates) = self.extent(geometry, |b| values(b).map(<[u8]>::len))?;
        Some(OutputField {
            name,
            units,
            scaling,
            first_gate_m: geom.first_gate_m,
            gate_spacing_m: geom.gate_spacing_m,
            missing: BAD,
            data: self.grid(gates, BAD, values),
        })
    }

    fn phi(&self, geometry: impl Fn(&Beam) -> GateGeometry) -> Option<OutputField<i16>> {
        let (geom, gates) = self.extent(geometry, |b| b.phi.as_ref().map(|m| m.data.len()))?;
        let scaling = self.beams.iter().find_map(|b| b.phi.as_ref().map(|m| m.scaling))?;
        Some(OutputField {
            name: "PHI",
            units: "deg",
            scaling,
            first_gate_m: geom.first_gate_m,
            gate_spacing_m: geom.gate_spacing_m,
            missing: PHI_MISSING,
            data: self.grid(gates, PHI_MISSING, |b| {
                b.phi.as_ref().map(|m| m.data.as_slice())
            }),
        })
    }
}

fn refl_geom(beam: &Beam) -> GateGeometry {
    beam.refl_geometry
}

fn vel_geom(beam: &Beam) -> GateGeometry {
    beam.vel_geometry
}

fn mean_elevation(beams: &[&Beam]) -> f64 {
    if beams.is_empty() {
        return 0.0;
    }
    beams.iter().map(|b| b.elevation).sum::<f64>() / beams.len() as f64
}

/// Keeps finished sweeps in memory.
#[derive(Default)]
pub struct MemorySink {
    pub sweeps: Vec<FinishedSweep>,
}

impl SweepSink for MemorySink {
    fn write(&mut self, sweep: &FinishedSweep) -> Result<(), SinkError> {
        self.sweeps.push(sweep.clone());
        Ok(())
    }
}
