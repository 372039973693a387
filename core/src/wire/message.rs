use super::legacy::LegacyRadial;
use super::products::{
    AdaptationData, ClutterBypassMap, ClutterFilterMap, RdaStatus, VolumeCoveragePattern,
};
use super::superres::SuperResRadial;
use crate::prelude::DecodeError;
use serde::{Deserialize, Serialize};

/// Identity of a radar moment, resolved from its block tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MomentKind {
    Reflectivity,
    Velocity,
    SpectrumWidth,
    DifferentialReflectivity,
    DifferentialPhase,
    CorrelationCoefficient,
}

impl MomentKind {
    /// Classifies a block name by its first two characters.
    pub fn from_tag(name: &[u8]) -> Option<Self> {
        match name.get(..2)? {
            b"RE" => Some(Self::Reflectivity),
            b"VE" => Some(Self::Velocity),
            b"SW" => Some(Self::SpectrumWidth),
            b"ZD" => Some(Self::DifferentialReflectivity),
            b"PH" => Some(Self::DifferentialPhase),
            b"RH" => Some(Self::CorrelationCoefficient),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Reflectivity => "REF",
            Self::Velocity => "VEL",
            Self::SpectrumWidth => "SW",
            Self::DifferentialReflectivity => "ZDR",
            Self::DifferentialPhase => "PHI",
            Self::CorrelationCoefficient => "RHO",
        }
    }

    /// Bits per gate on the wire.
    pub fn expected_width(&self) -> u8 {
        match self {
            Self::DifferentialPhase => 16,
            _ => 8,
        }
    }
}

/// The two beam layouts, consumed by one beam builder entry point.
#[derive(Debug, Clone)]
pub enum BeamSource<'a> {
    Legacy(LegacyRadial<'a>),
    SuperRes(SuperResRadial<'a>),
}

impl BeamSource<'_> {
    pub fn azimuth(&self) -> f64 {
        match self {
            Self::Legacy(radial) => radial.azimuth,
            Self::SuperRes(radial) => radial.azimuth as f64,
        }
    }

    pub fn elevation(&self) -> f64 {
        match self {
            Self::Legacy(radial) => radial.elevation,
            Self::SuperRes(radial) => radial.elevation as f64,
        }
    }

    pub fn elev_num(&self) -> i32 {
        match self {
            Self::Legacy(radial) => radial.elev_num as i32,
            Self::SuperRes(radial) => radial.elev_num as i32,
        }
    }

    pub fn radial_status(&self) -> i32 {
        match self {
            Self::Legacy(radial) => radial.radial_status as i32,
            Self::SuperRes(radial) => radial.radial_status as i32,
        }
    }

    /// Seconds since the Unix epoch.
    pub fn time(&self) -> f64 {
        match self {
            Self::Legacy(radial) => radial.time(),
            Self::SuperRes(radial) => radial.time(),
        }
    }

    pub fn vcp(&self) -> Option<u16> {
        match self {
            Self::Legacy(radial) => u16::try_from(radial.vcp).ok(),
            Self::SuperRes(radial) => radial.volume.map(|v| v.vcp),
        }
    }

    pub fn unambiguous_range_km(&self) -> f64 {
        match self {
            Self::Legacy(radial) => radial.unambiguous_range_km(),
            Self::SuperRes(radial) => radial.unambiguous_range_km(),
        }
    }

    pub fn nyquist_velocity(&self) -> f64 {
        match self {
            Self::Legacy(radial) => radial.nyquist_velocity(),
            Self::SuperRes(radial) => radial.nyquist_velocity(),
        }
    }

    pub fn has_moment(&self, kind: MomentKind) -> bool {
        match self {
            Self::Legacy(radial) => match kind {
                MomentKind::Reflectivity => radial.reflectivity.is_some(),
                MomentKind::Velocity => radial.velocity.is_some(),
                MomentKind::SpectrumWidth => radial.spectrum_width.is_some(),
                _ => false,
            },
            Self::SuperRes(radial) => radial.moment(kind).is_some(),
        }
    }

    pub fn site(&self) -> Option<&str> {
        match self {
            Self::Legacy(_) => None,
            Self::SuperRes(radial) => Some(radial.icao.as_str()),
        }
    }
}

/// One logical message, typed and byte-order normalized.
#[derive(Debug, Clone)]
pub enum RawMessage<'a> {
    Beam(BeamSource<'a>),
    Status(RdaStatus),
    Vcp(VolumeCoveragePattern),
    Adaptation(AdaptationData),
    ClutterBypassMap(ClutterBypassMap),
    ClutterMap(ClutterFilterMap),
    Other { message_type: u8 },
}

pub fn decode_message(message_type: u8, payload: &[u8]) -> Result<RawMessage<'_>, DecodeError> {
    let message = match message_type {
        1 => RawMessage::Beam(BeamSource::Legacy(LegacyRadial::decode(payload)?)),
        31 => RawMessage::Beam(BeamSource::SuperRes(SuperResRadial::decode(payload)?)),
        2 => RawMessage::Status(RdaStatus::decode(payload)?),
        5 | 7 => RawMessage::Vcp(VolumeCoveragePattern::decode(payload)?),
        13 => RawMessage::ClutterBypassMap(ClutterBypassMap::decode(payload)?),
        15 => RawMessage::ClutterMap(ClutterFilterMap::decode(payload)?),
        18 => RawMessage::Adaptation(AdaptationData::decode(payload)?),
        other => RawMessage::Other {
            message_type: other,
        },
    };
    Ok(message)
}
