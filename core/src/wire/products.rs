//! Auxiliary products: scan strategy, RDA status, adaptation data and the
//! clutter filter maps.

use super::{coded_angle, FieldReader};
use crate::prelude::DecodeError;
use serde::Serialize;

const VCP_HEADER_BYTES: usize = 22;
const VCP_CUT_BYTES: usize = 46;
const MAX_VCP_CUTS: u16 = 32;
const MAX_MAP_SEGMENTS: u16 = 5;
const MAP_AZIMUTHS: usize = 360;
const BYPASS_WORDS_PER_RADIAL: usize = 32;
const MAX_RANGE_ZONES: u16 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Waveform {
    ContiguousSurveillance,
    ContiguousDopplerWithAmbiguityResolution,
    ContiguousDopplerWithoutAmbiguityResolution,
    Batch,
    StaggeredPulsePair,
    Unknown(u8),
}

impl Waveform {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::ContiguousSurveillance,
            2 => Self::ContiguousDopplerWithAmbiguityResolution,
            3 => Self::ContiguousDopplerWithoutAmbiguityResolution,
            4 => Self::Batch,
            5 => Self::StaggeredPulsePair,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::ContiguousSurveillance => 1,
            Self::ContiguousDopplerWithAmbiguityResolution => 2,
            Self::ContiguousDopplerWithoutAmbiguityResolution => 3,
            Self::Batch => 4,
            Self::StaggeredPulsePair => 5,
            Self::Unknown(other) => *other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DopplerSector {
    pub edge_angle: f64,
    pub prf_number: u16,
    pub pulse_count: u16,
}

/// One elevation cut of a volume coverage pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VcpCut {
    pub elevation: f64,
    pub channel_config: u8,
    pub waveform: Waveform,
    pub super_res: u8,
    pub surveillance_prf_num: u8,
    pub surveillance_pulse_count: u16,
    /// deg/s
    pub azimuth_rate: f64,
    pub reflectivity_threshold_db: f64,
    pub velocity_threshold_db: f64,
    pub spectrum_width_threshold_db: f64,
    pub doppler: [DopplerSector; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeCoveragePattern {
    pub pattern_type: u16,
    pub pattern_number: u16,
    pub clutter_map_group: u16,
    /// 2 = 0.5 m/s, 4 = 1.0 m/s.
    pub doppler_velocity_resolution: u8,
    pub pulse_width: u8,
    pub cuts: Vec<VcpCut>,
}

impl VolumeCoveragePattern {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let reader = FieldReader::new(payload);
        let num_cuts = reader.u16_at(6)?;
        if num_cuts > MAX_VCP_CUTS {
            return Err(DecodeError::CutCount {
                count: num_cuts,
                limit: MAX_VCP_CUTS as usize,
            });
        }

        let mut cuts = Vec::with_capacity(num_cuts as usize);
        for idx in 0..num_cuts as usize {
            let cut = reader.tail(VCP_HEADER_BYTES + idx * VCP_CUT_BYTES)?;
            let sector = |base: usize| -> Result<DopplerSector, DecodeError> {
                Ok(DopplerSector {
                    edge_angle: coded_angle(cut.u16_at(base)?),
                    prf_number: cut.u16_at(base + 2)?,
                    pulse_count: cut.u16_at(base + 4)?,
                })
            };
            cuts.push(VcpCut {
                elevation: coded_angle(cut.u16_at(0)?),
                channel_config: cut.u8_at(2)?,
                waveform: Waveform::from_u8(cut.u8_at(3)?),
                super_res: cut.u8_at(4)?,
                surveillance_prf_num: cut.u8_at(5)?,
                surveillance_pulse_count: cut.u16_at(6)?,
                azimuth_rate: (cut.i16_at(8)? as f64 / 8.0) * (22.5 / 2048.0),
                reflectivity_threshold_db: cut.i16_at(10)? as f64 / 100.0,
                velocity_threshold_db: cut.i16_at(12)? as f64 / 100.0,
                spectrum_width_threshold_db: cut.i16_at(14)? as f64 / 100.0,
                doppler: [sector(22)?, sector(30)?, sector(38)?],
            });
        }

        Ok(Self {
            pattern_type: reader.u16_at(2)?,
            pattern_number: reader.u16_at(4)?,
            clutter_map_group: reader.u16_at(8)?,
            doppler_velocity_resolution: reader.u8_at(10)?,
            pulse_width: reader.u8_at(11)?,
            cuts,
        })
    }

    /// Cut for a one-based elevation number.
    pub fn cut(&self, elev_num: usize) -> Option<&VcpCut> {
        elev_num.checked_sub(1).and_then(|idx| self.cuts.get(idx))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RdaStatus {
    pub rda_status: u16,
    pub operability_status: u16,
    pub control_status: u16,
    pub aux_power_status: u16,
    pub average_tx_power: u16,
    pub reflectivity_calibration_correction: i16,
    pub data_transmission_enabled: u16,
    pub vcp: i16,
    pub control_authorization: u16,
    pub rda_build_number: u16,
    pub operational_mode: u16,
}

impl RdaStatus {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let reader = FieldReader::new(payload);
        Ok(Self {
            rda_status: reader.u16_at(0)?,
            operability_status: reader.u16_at(2)?,
            control_status: reader.u16_at(4)?,
            aux_power_status: reader.u16_at(6)?,
            average_tx_power: reader.u16_at(8)?,
            reflectivity_calibration_correction: reader.i16_at(10)?,
            data_transmission_enabled: reader.u16_at(12)?,
            vcp: reader.i16_at(14)?,
            control_authorization: reader.u16_at(16)?,
            rda_build_number: reader.u16_at(18)?,
            operational_mode: reader.u16_at(20)?,
        })
    }
}

/// The subset of RDA adaptation data the ingester uses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptationData {
    pub site_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub beamwidth: f32,
    /// Upper elevation limit of each clutter map segment but the last.
    pub segment_limits: Vec<f64>,
}

impl AdaptationData {
    pub const MIN_BYTES: usize = 8788;

    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let reader = FieldReader::new(payload);
        if reader.len() < Self::MIN_BYTES {
            return Err(DecodeError::Truncated {
                expected_length: Self::MIN_BYTES,
                buffer_length: reader.len(),
            });
        }

        let lat = reader.u32_at(1300)? as f64
            + reader.u32_at(1304)? as f64 / 60.0
            + reader.f32_at(1288)? as f64 / 3600.0;
        let lon = reader.u32_at(1308)? as f64
            + reader.u32_at(1312)? as f64 / 60.0
            + reader.f32_at(1292)? as f64 / 3600.0;
        let lat_dir = reader.text_at(1316, 4)?;
        let lon_dir = reader.text_at(1320, 4)?;

        let all_limits = [
            reader.f32_at(1284)? as f64,
            reader.f32_at(8772)? as f64,
            reader.f32_at(8776)? as f64,
            reader.f32_at(8780)? as f64,
        ];
        let n_segments = reader.u32_at(8784)?.clamp(1, MAX_MAP_SEGMENTS as u32) as usize;

        Ok(Self {
            site_name: reader.text_at(8368, 4)?,
            latitude: if lat_dir.contains('S') { -lat } else { lat },
            longitude: if lon_dir.contains('W') { -lon } else { lon },
            beamwidth: reader.f32_at(1132)?,
            segment_limits: all_limits[..n_segments - 1].to_vec(),
        })
    }
}

/// Clutter filter bypass map: one bit per range bin, 512 bins per radial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BypassSegment {
    pub segment_num: u16,
    pub words: Vec<u16>,
}

impl BypassSegment {
    /// True when clutter filtering is bypassed at this radial and bin.
    pub fn is_bypassed(&self, radial: usize, bin: usize) -> bool {
        if radial >= MAP_AZIMUTHS || bin >= BYPASS_WORDS_PER_RADIAL * 16 {
            return false;
        }
        let word = self.words[radial * BYPASS_WORDS_PER_RADIAL + bin / 16];
        word & (0x8000 >> (bin % 16)) != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClutterBypassMap {
    pub julian_date: u16,
    pub minutes_past_midnight: u16,
    pub segments: Vec<BypassSegment>,
}

impl ClutterBypassMap {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let reader = FieldReader::new(payload);
        let num_segments = reader.u16_at(4)?.min(MAX_MAP_SEGMENTS);
        let mut segments = Vec::with_capacity(num_segments as usize);
        let mut offset = 6;
        for _ in 0..num_segments {
            let segment_num = reader.u16_at(offset)?;
            let words = reader.u16_array_at(offset + 2, MAP_AZIMUTHS * BYPASS_WORDS_PER_RADIAL)?;
            offset += 2 + words.len() * 2;
            segments.push(BypassSegment { segment_num, words });
        }
        Ok(Self {
            julian_date: reader.u16_at(0)?,
            minutes_past_midnight: reader.u16_at(2)?,
            segments,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeZone {
    /// 0 = bypass filter, 1 = bypass map in control, 2 = force filter.
    pub op_code: u16,
    pub end_range: u16,
}

/// Clutter filter map: per elevation segment, 360 azimuth segments of range zones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClutterFilterMap {
    pub julian_date: u16,
    pub minutes_past_midnight: u16,
    pub segments: Vec<Vec<Vec<RangeZone>>>,
}

impl ClutterFilterMap {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let reader = FieldReader::new(payload);
        let num_segments = reader.u16_at(4)?.min(MAX_MAP_SEGMENTS);
        let mut segments = Vec::with_capacity(num_segments as usize);
        let mut offset = 6;
        for _ in 0..num_segments {
            let mut azimuths = Vec::with_capacity(MAP_AZIMUTHS);
            for _ in 0..MAP_AZIMUTHS {
                let num_zones = reader.u16_at(offset)?;
                if num_zones > MAX_RANGE_ZONES {
                    return Err(DecodeError::ZoneCount {
                        count: num_zones,
                        limit: MAX_RANGE_ZONES as usize,
                    });
                }
                offset += 2;
                let mut zones = Vec::with_capacity(num_zones as usize);
                for _ in 0..num_zones {
                    zones.push(RangeZone {
                        op_code: reader.u16_at(offset)?,
                        end_range: reader.u16_at(offset + 2)?,
                    });
                    offset += 4;
                }
                azimuths.push(zones);
            }
            segments.push(azimuths);
        }
        Ok(Self {
            julian_date: reader.u16_at(0)?,
            minutes_past_midnight: reader.u16_at(2)?,
            segments,
        })
    }
}

/// Index of the clutter map segment covering `elevation`.
pub fn segment_for_elevation(limits: &[f64], elevation: f64) -> usize {
    limits
        .iter()
        .position(|&limit| elevation < limit)
        .unwrap_or(limits.len())
}
