//! Level-II wire format: physical records, message headers, and the
//! decoders for each message kind the ingester consumes.

pub mod encode;
pub mod framer;
pub mod legacy;
pub mod message;
pub mod products;
pub mod reader;
pub mod superres;

pub use framer::{Frame, MessageFramer};
pub use message::{decode_message, BeamSource, RawMessage};
pub use reader::FieldReader;

use crate::prelude::DecodeError;

/// Channel terminal manager prefix ahead of every message header.
pub const CTM_BYTES: usize = 12;
pub const MESSAGE_HEADER_BYTES: usize = 16;
/// Physical record size for every message type except 31.
pub const PACKET_SIZE: usize = 2432;
/// Body bytes available in one fixed-size record.
pub const FIXED_BODY_BYTES: usize = PACKET_SIZE - CTM_BYTES - MESSAGE_HEADER_BYTES;
pub const VOLUME_TITLE_BYTES: usize = 24;
pub const MAX_MESSAGE_SEGMENTS: u16 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    DigitalRadarData,
    RdaStatus,
    PerformanceMaintenance,
    ConsoleMessageToRpg,
    RdaControl,
    VolumeCoveragePattern,
    ClutterCensorZones,
    RequestForData,
    ConsoleMessageToRda,
    LoopbackFromRda,
    LoopbackFromRpg,
    ClutterFilterBypassMap,
    EditedClutterFilterMap,
    ClutterFilterMap,
    AdaptationData,
    DigitalRadarDataGeneric,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        let kind = match value {
            1 => Self::DigitalRadarData,
            2 => Self::RdaStatus,
            3 => Self::PerformanceMaintenance,
            4 => Self::ConsoleMessageToRpg,
            5 => Self::VolumeCoveragePattern,
            6 => Self::RdaControl,
            7 => Self::VolumeCoveragePattern,
            8 => Self::ClutterCensorZones,
            9 => Self::RequestForData,
            10 => Self::ConsoleMessageToRda,
            11 => Self::LoopbackFromRda,
            12 => Self::LoopbackFromRpg,
            13 => Self::ClutterFilterBypassMap,
            14 => Self::EditedClutterFilterMap,
            15 => Self::ClutterFilterMap,
            18 => Self::AdaptationData,
            31 => Self::DigitalRadarDataGeneric,
            _ => return None,
        };
        Some(kind)
    }

    /// Type 31 records carry their own length; all others are padded to
    /// [`PACKET_SIZE`].
    pub fn is_variable_length(value: u8) -> bool {
        value == 31
    }
}

/// The 16-byte header that follows the CTM prefix in every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageHeader {
    /// Halfwords from the start of this header to the end of the message.
    pub message_len: u16,
    pub channel_id: u8,
    pub message_type: u8,
    pub sequence_num: u16,
    pub julian_date: u16,
    pub millis: u32,
    pub num_message_segs: u16,
    pub message_seg_num: u16,
}

impl MessageHeader {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let reader = FieldReader::new(bytes);
        Ok(Self {
            message_len: reader.u16_at(0)?,
            channel_id: reader.u8_at(2)?,
            message_type: reader.u8_at(3)?,
            sequence_num: reader.u16_at(4)?,
            julian_date: reader.u16_at(6)?,
            millis: reader.u32_at(8)?,
            num_message_segs: reader.u16_at(12)?,
            message_seg_num: reader.u16_at(14)?,
        })
    }

    /// Payload bytes the header declares, not counting itself.
    pub fn declared_body_len(&self) -> usize {
        (self.message_len as usize * 2).saturating_sub(MESSAGE_HEADER_BYTES)
    }

    /// Bytes occupied on the wire by the whole physical record.
    pub fn record_len(&self) -> usize {
        if MessageType::is_variable_length(self.message_type) {
            CTM_BYTES + self.message_len as usize * 2
        } else {
            PACKET_SIZE
        }
    }

    /// Bytes of body carried by this record.
    pub fn body_len(&self) -> usize {
        if MessageType::is_variable_length(self.message_type) {
            self.declared_body_len()
        } else {
            self.declared_body_len().min(FIXED_BODY_BYTES)
        }
    }

    pub fn is_filler(&self) -> bool {
        self.message_len == 0 && self.message_type == 0
    }
}

/// The 24-byte title that opens an archive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeTitle {
    pub filetype: String,
    pub volume_number: String,
    pub julian_date: i16,
    pub millis: i32,
}

impl VolumeTitle {
    /// Returns the title if `bytes` starts with one.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < VOLUME_TITLE_BYTES
            || !(bytes.starts_with(b"ARCHIVE2") || bytes.starts_with(b"AR2V"))
        {
            return None;
        }
        let reader = FieldReader::new(bytes);
        Some(Self {
            filetype: reader.text_at(0, 9).ok()?,
            volume_number: reader.text_at(9, 3).ok()?,
            julian_date: reader.i16_at(12).ok()?,
            millis: reader.i32_at(16).ok()?,
        })
    }
}

/// Angle coded as `(value / 8) * (180 / 4096)` degrees.
pub fn coded_angle(value: u16) -> f64 {
    (value as f64 / 8.0) * (180.0 / 4096.0)
}

pub fn encode_angle(degrees: f64) -> u16 {
    (degrees / (180.0 / 4096.0) * 8.0).round() as u16
}

/// Seconds since the Unix epoch from a modified Julian date (day 1 is
/// 1970-01-01) and milliseconds past midnight.
pub fn wire_time(julian_date: i64, millis: i64) -> f64 {
    (julian_date - 1) as f64 * 86_400.0 + millis as f64 / 1000.0
}
