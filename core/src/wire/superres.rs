use super::message::MomentKind;
use super::{wire_time, FieldReader};
use crate::prelude::DecodeError;
use log::{debug, warn};

const HEADER_BYTES: usize = 68;
const MAX_DATA_BLOCKS: usize = 9;
const MOMENT_HEADER_BYTES: usize = 28;

/// Site constants carried by the "VOL" block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeBlock {
    pub version_major: u8,
    pub version_minor: u8,
    pub latitude: f32,
    pub longitude: f32,
    pub height_m: i16,
    pub feedhorn_height_m: u16,
    pub dbz0: f32,
    pub horiz_power: f32,
    pub vert_power: f32,
    pub system_zdr: f32,
    pub system_phi: f32,
    pub vcp: u16,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationBlock {
    pub atmos: i16,
    pub dbz0: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialBlock {
    pub unamb_range_x10: u16,
    pub horiz_noise: f32,
    pub vert_noise: f32,
    pub nyquist_x100: u16,
}

/// One data moment of a type 31 radial, identified by its tag.
#[derive(Debug, Clone)]
pub struct MomentBlock<'a> {
    pub kind: MomentKind,
    pub name: String,
    pub num_gates: u16,
    pub gate1: i16,
    pub gate_width: u16,
    pub tover: u16,
    pub snr_threshold: i16,
    pub control_flags: u8,
    pub data_size: u8,
    pub scale: f32,
    pub offset: f32,
    pub data: &'a [u8],
}

impl MomentBlock<'_> {
    /// Stored bytes to physical value: `value = raw * scale + bias`.
    pub fn scale_bias(&self) -> (f64, f64) {
        let scale = self.scale as f64;
        let offset = self.offset as f64;
        (1.0 / scale, -(offset / scale))
    }

    /// Gate values of a 16-bit moment.
    pub fn halfwords(&self) -> Vec<u16> {
        self.data
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect()
    }
}

/// A decoded type 31 (generic digital radar data) radial.
#[derive(Debug, Clone)]
pub struct SuperResRadial<'a> {
    pub icao: String,
    pub millis: u32,
    pub julian_date: u16,
    pub radial_num: u16,
    pub azimuth: f32,
    pub compression: u8,
    pub radial_length: u16,
    /// 1 = 0.5 deg, 2 = 1.0 deg.
    pub azimuth_spacing: u8,
    pub radial_status: u8,
    pub elev_num: u8,
    pub sector_num: u8,
    pub elevation: f32,
    pub spot_blank: u8,
    pub azimuth_index: u8,
    pub volume: Option<VolumeBlock>,
    pub elevation_block: Option<ElevationBlock>,
    pub radial: RadialBlock,
    pub moments: Vec<MomentBlock<'a>>,
}

impl<'a> SuperResRadial<'a> {
    pub fn decode(payload: &'a [u8]) -> Result<Self, DecodeError> {
        let reader = FieldReader::new(payload);
        if reader.len() < HEADER_BYTES {
            return Err(DecodeError::Truncated {
                expected_length: HEADER_BYTES,
                buffer_length: reader.len(),
            });
        }

        let n_blocks = reader.u16_at(30)?;
        if !(3..=MAX_DATA_BLOCKS as u16).contains(&n_blocks) {
            return Err(DecodeError::BlockCount { count: n_blocks });
        }

        // Validate every offset before touching any block.
        let mut offsets = Vec::with_capacity(n_blocks as usize);
        for index in 0..n_blocks as usize {
            let offset = reader.u32_at(32 + index * 4)?;
            if offset == 0 {
                continue;
            }
            let start = offset as usize;
            if start < HEADER_BYTES || start + 4 > reader.len() {
                return Err(DecodeError::BlockOffset {
                    index,
                    offset,
                    length: reader.len(),
                });
            }
            offsets.push(start);
        }

        let mut volume = None;
        let mut elevation_block = None;
        let mut radial = None;
        let mut moments: Vec<MomentBlock<'a>> = Vec::new();

        for start in offsets {
            let block = reader.tail(start)?;
            let tag = block.slice(0, 4)?;
            match (tag[0], &tag[1..4]) {
                (b'R', b"VOL") => volume = Some(decode_volume(&block)?),
                (b'R', b"ELV") => elevation_block = Some(decode_elevation(&block)?),
                (b'R', b"RAD") => radial = Some(decode_radial(&block)?),
                (b'D', name) => {
                    let Some(kind) = MomentKind::from_tag(name) else {
                        debug!("skipping moment block {:?}", String::from_utf8_lossy(name));
                        continue;
                    };
                    if moments.iter().any(|m| m.kind == kind) {
                        warn!("duplicate {} block ignored", kind.label());
                        continue;
                    }
                    match decode_moment(&block, kind) {
                        Ok(moment) => moments.push(moment),
                        Err(err) => warn!("dropping {} block: {}", kind.label(), err),
                    }
                }
                _ => {
                    return Err(DecodeError::UnknownTag {
                        tag: String::from_utf8_lossy(tag).to_string(),
                    })
                }
            }
        }

        let radial = radial.ok_or(DecodeError::MissingBlock("RAD"))?;

        Ok(Self {
            icao: reader.text_at(0, 4)?,
            millis: reader.u32_at(4)?,
            julian_date: reader.u16_at(8)?,
            radial_num: reader.u16_at(10)?,
            azimuth: reader.f32_at(12)?,
            compression: reader.u8_at(16)?,
            radial_length: reader.u16_at(18)?,
            azimuth_spacing: reader.u8_at(20)?,
            radial_status: reader.u8_at(21)?,
            elev_num: reader.u8_at(22)?,
            sector_num: reader.u8_at(23)?,
            elevation: reader.f32_at(24)?,
            spot_blank: reader.u8_at(28)?,
            azimuth_index: reader.u8_at(29)?,
            volume,
            elevation_block,
            radial,
            moments,
        })
    }

    pub fn moment(&self, kind: MomentKind) -> Option<&MomentBlock<'a>> {
        self.moments.iter().find(|m| m.kind == kind)
    }

    pub fn time(&self) -> f64 {
        wire_time(self.julian_date as i64, self.millis as i64)
    }

    pub fn unambiguous_range_km(&self) -> f64 {
        self.radial.unamb_range_x10 as f64 / 10.0
    }

    pub fn nyquist_velocity(&self) -> f64 {
        self.radial.nyquist_x100 as f64 / 100.0
    }
}

fn decode_volume(block: &FieldReader<'_>) -> Result<VolumeBlock, DecodeError> {
    Ok(VolumeBlock {
        version_major: block.u8_at(6)?,
        version_minor: block.u8_at(7)?,
        latitude: block.f32_at(8)?,
        longitude: block.f32_at(12)?,
        height_m: block.i16_at(16)?,
        feedhorn_height_m: block.u16_at(18)?,
        dbz0: block.f32_at(20)?,
        horiz_power: block.f32_at(24)?,
        vert_power: block.f32_at(28)?,
        system_zdr: block.f32_at(32)?,
        system_phi: block.f32_at(36)?,
        vcp: block.u16_at(40)?,
    })
}

fn decode_elevation(block: &FieldReader<'_>) -> Result<ElevationBlock, DecodeError> {
    Ok(ElevationBlock {
        atmos: block.i16_at(6)?,
        dbz0: block.f32_at(8)?,
    })
}

fn decode_radial(block: &FieldReader<'_>) -> Result<RadialBlock, DecodeError> {
    Ok(RadialBlock {
        unamb_range_x10: block.u16_at(6)?,
        horiz_noise: block.f32_at(8)?,
        vert_noise: block.f32_at(12)?,
        nyquist_x100: block.u16_at(16)?,
    })
}

fn decode_moment<'a>(block: &FieldReader<'a>, kind: MomentKind) -> Result<MomentBlock<'a>, DecodeError> {
    let data_size = block.u8_at(19)?;
    let expected = kind.expected_width();
    if data_size != expected {
        return Err(DecodeError::DataWidth {
            moment: kind.label(),
            width: data_size,
            expected,
        });
    }
    let num_gates = block.u16_at(8)?;
    let data_len = num_gates as usize * (data_size as usize / 8);
    let data = block
        .slice(MOMENT_HEADER_BYTES, data_len)
        .map_err(|_| DecodeError::MomentOverrun {
            moment: kind.label(),
            gates: num_gates as usize,
        })?;
    let scale = block.f32_at(20)?;
    if scale == 0.0 || !scale.is_finite() {
        return Err(DecodeError::BadScale {
            moment: kind.label(),
            scale,
        });
    }

    Ok(MomentBlock {
        kind,
        name: block.text_at(1, 3)?,
        num_gates,
        gate1: block.i16_at(10)?,
        gate_width: block.u16_at(12)?,
        tover: block.u16_at(14)?,
        snr_threshold: block.i16_at(16)?,
        control_flags: block.u8_at(18)?,
        data_size,
        scale,
        offset: block.f32_at(24)?,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode::{superres_radial_body, MomentSpec, SuperResRadialSpec};

    fn radial_spec(moments: Vec<MomentSpec>) -> SuperResRadialSpec {
        SuperResRadialSpec {
            azimuth: 123.5,
            elevation: 0.48,
            elev_num: 3,
            moments,
            ..Default::default()
        }
    }

    #[test]
    fn decodes_constant_blocks_and_moments() {
        let body = superres_radial_body(&radial_spec(vec![
            MomentSpec::bytes(b"REF", 2125, 250, 2.0, 66.0, vec![2, 10, 200]),
            MomentSpec::halfwords(b"PHI", 2125, 250, 2.8361, 2.0, &[0, 1, 40000]),
        ]));
        let radial = SuperResRadial::decode(&body).unwrap();
        assert_eq!(radial.icao, "KTLX");
        assert_eq!(radial.elev_num, 3);
        assert_eq!(radial.azimuth, 123.5);
        assert_eq!(radial.unambiguous_range_km(), 466.0);
        assert_eq!(radial.volume.unwrap().vcp, 212);
        let refl = radial.moment(MomentKind::Reflectivity).unwrap();
        assert_eq!(refl.data, &[2, 10, 200]);
        assert_eq!(refl.scale_bias(), (0.5, -33.0));
        let phi = radial.moment(MomentKind::DifferentialPhase).unwrap();
        assert_eq!(phi.halfwords(), vec![0, 1, 40000]);
    }

    #[test]
    fn moments_are_identified_by_tag_not_slot() {
        // Velocity sits where reflectivity normally goes and spectrum width
        // takes the velocity slot.
        let body = superres_radial_body(&radial_spec(vec![
            MomentSpec::bytes(b"VEL", 2125, 250, 2.0, 129.0, vec![129; 8]),
            MomentSpec::bytes(b"SW ", 2125, 250, 2.0, 129.0, vec![140; 8]),
        ]));
        let radial = SuperResRadial::decode(&body).unwrap();
        assert!(radial.moment(MomentKind::Reflectivity).is_none());
        assert_eq!(radial.moment(MomentKind::Velocity).unwrap().data[0], 129);
        assert_eq!(radial.moment(MomentKind::SpectrumWidth).unwrap().data[0], 140);
    }

    #[test]
    fn unknown_moment_tags_are_skipped() {
        let body = superres_radial_body(&radial_spec(vec![
            MomentSpec::bytes(b"CFP", 2125, 250, 1.0, 8.0, vec![1; 4]),
            MomentSpec::bytes(b"REF", 2125, 250, 2.0, 66.0, vec![50; 4]),
        ]));
        let radial = SuperResRadial::decode(&body).unwrap();
        assert_eq!(radial.moments.len(), 1);
    }

    #[test]
    fn wrong_data_width_drops_only_that_block() {
        let mut phi = MomentSpec::bytes(b"PHI", 2125, 250, 2.8, 2.0, vec![1; 4]);
        phi.data_size = 8;
        let body = superres_radial_body(&radial_spec(vec![
            MomentSpec::bytes(b"REF", 2125, 250, 2.0, 66.0, vec![50; 4]),
            phi,
        ]));
        let radial = SuperResRadial::decode(&body).unwrap();
        assert!(radial.moment(MomentKind::Reflectivity).is_some());
        assert!(radial.moment(MomentKind::DifferentialPhase).is_none());
    }

    #[test]
    fn zero_scale_drops_only_that_block() {
        let body = superres_radial_body(&radial_spec(vec![
            MomentSpec::bytes(b"REF", 2125, 250, 2.0, 66.0, vec![50; 4]),
            MomentSpec::bytes(b"VEL", 2125, 250, 0.0, 129.0, vec![129; 4]),
        ]));
        let radial = SuperResRadial::decode(&body).unwrap();
        assert!(radial.moment(MomentKind::Reflectivity).is_some());
        assert!(radial.moment(MomentKind::Velocity).is_none());

        let reader = FieldReader::new(&body);
        let err = radial_blocks(&reader)
            .into_iter()
            .map(|start| reader.tail(start).unwrap())
            .filter(|block| block.slice(0, 4).unwrap() == b"DVEL")
            .map(|block| decode_moment(&block, MomentKind::Velocity))
            .next()
            .unwrap();
        assert!(matches!(
            err,
            Err(DecodeError::BadScale { moment, scale }) if moment == "VEL" && scale == 0.0
        ));
    }

    fn radial_blocks(reader: &FieldReader<'_>) -> Vec<usize> {
        let count = reader.u16_at(30).unwrap() as usize;
        (0..count)
            .map(|index| reader.u32_at(32 + index * 4).unwrap() as usize)
            .filter(|&offset| offset != 0)
            .collect()
    }

    #[test]
    fn excessive_block_count_rejects_message() {
        let mut body = superres_radial_body(&radial_spec(vec![]));
        body[30..32].copy_from_slice(&12u16.to_be_bytes());
        assert!(matches!(
            SuperResRadial::decode(&body),
            Err(DecodeError::BlockCount { count: 12 })
        ));
    }

    #[test]
    fn offset_past_payload_rejects_message() {
        let mut body = superres_radial_body(&radial_spec(vec![MomentSpec::bytes(
            b"REF",
            2125,
            250,
            2.0,
            66.0,
            vec![50; 4],
        )]));
        let len = body.len() as u32;
        body[44..48].copy_from_slice(&(len + 100).to_be_bytes());
        assert!(matches!(
            SuperResRadial::decode(&body),
            Err(DecodeError::BlockOffset { index: 3, .. })
        ));
    }

    #[test]
    fn missing_radial_block_rejects_message() {
        let mut body = superres_radial_body(&radial_spec(vec![]));
        body[40..44].copy_from_slice(&0u32.to_be_bytes());
        assert!(matches!(
            SuperResRadial::decode(&body),
            Err(DecodeError::MissingBlock("RAD"))
        ));
    }
}
