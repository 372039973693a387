//! Writers for the records the ingester reads. Used to build synthetic
//! volumes and test streams.

use super::{encode_angle, CTM_BYTES, FIXED_BODY_BYTES, MESSAGE_HEADER_BYTES, PACKET_SIZE};
use bytes::BufMut;

/// Time stamp stamped into headers and radials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WireTime {
    pub julian_date: u16,
    pub millis: u32,
}

impl WireTime {
    pub fn from_epoch_seconds(seconds: f64) -> Self {
        let whole_days = (seconds / 86_400.0).floor();
        let millis = ((seconds - whole_days * 86_400.0) * 1000.0).round() as u32;
        Self {
            julian_date: whole_days as u16 + 1,
            millis,
        }
    }
}

fn put_header(
    out: &mut Vec<u8>,
    message_type: u8,
    body_len: usize,
    num_segs: u16,
    seg_num: u16,
    time: WireTime,
) {
    out.put_bytes(0, CTM_BYTES);
    let halfwords = (MESSAGE_HEADER_BYTES + body_len).div_ceil(2);
    out.put_u16(halfwords as u16);
    out.put_u8(0);
    out.put_u8(message_type);
    out.put_u16(0);
    out.put_u16(time.julian_date);
    out.put_u32(time.millis);
    out.put_u16(num_segs);
    out.put_u16(seg_num);
}

/// Appends one physical record. Fixed-size types are padded to the packet
/// size and their body is clipped to fit; type 31 is written at its own
/// length.
pub fn write_record(
    out: &mut Vec<u8>,
    message_type: u8,
    body: &[u8],
    num_segs: u16,
    seg_num: u16,
    time: WireTime,
) {
    let start = out.len();
    if message_type == 31 {
        put_header(out, message_type, body.len(), num_segs, seg_num, time);
        out.put_slice(body);
        if body.len() % 2 == 1 {
            out.put_u8(0);
        }
    } else {
        let body = &body[..body.len().min(FIXED_BODY_BYTES)];
        put_header(out, message_type, body.len(), num_segs, seg_num, time);
        out.put_slice(body);
        out.resize(start + PACKET_SIZE, 0);
    }
}

/// Splits `payload` into segments of at most `segment_size` bytes.
pub fn write_segmented(
    out: &mut Vec<u8>,
    message_type: u8,
    payload: &[u8],
    segment_size: usize,
    time: WireTime,
) {
    let segment_size = segment_size.clamp(2, FIXED_BODY_BYTES);
    let chunks: Vec<&[u8]> = payload.chunks(segment_size).collect();
    let count = chunks.len() as u16;
    for (idx, chunk) in chunks.iter().enumerate() {
        write_record(out, message_type, chunk, count, idx as u16 + 1, time);
    }
}

/// Appends an all-zero filler record.
pub fn write_filler(out: &mut Vec<u8>) {
    out.put_bytes(0, PACKET_SIZE);
}

pub fn volume_title(filetype: &str, volume_number: u16, time: WireTime) -> Vec<u8> {
    let mut out = Vec::with_capacity(super::VOLUME_TITLE_BYTES);
    let mut name = [b' '; 9];
    for (dst, src) in name.iter_mut().zip(filetype.bytes()) {
        *dst = src;
    }
    out.put_slice(&name);
    out.put_slice(format!("{:03}", volume_number % 1000).as_bytes());
    out.put_i16(time.julian_date as i16);
    out.put_i16(0);
    out.put_i32(time.millis as i32);
    out.put_i32(0);
    out
}

/// Field values for a type 1 radial.
#[derive(Debug, Clone, Default)]
pub struct LegacyRadialSpec {
    pub time: WireTime,
    pub unamb_range_x10: i16,
    pub azimuth: f64,
    pub radial_num: i16,
    pub radial_status: i16,
    pub elevation: f64,
    pub elev_num: i16,
    pub ref_gate1: i16,
    pub vel_gate1: i16,
    pub ref_gate_width: i16,
    pub vel_gate_width: i16,
    pub velocity_resolution: i16,
    pub vcp: i16,
    pub nyquist_x100: i16,
    pub reflectivity: Vec<u8>,
    pub velocity: Vec<u8>,
    pub spectrum_width: Vec<u8>,
}

pub const LEGACY_HEADER_BYTES: usize = 100;

pub fn legacy_radial_body(spec: &LegacyRadialSpec) -> Vec<u8> {
    let nref = spec.reflectivity.len();
    let nvel = spec.velocity.len();
    let ref_ptr = if nref > 0 { LEGACY_HEADER_BYTES } else { 0 };
    let vel_ptr = if nvel > 0 { LEGACY_HEADER_BYTES + nref } else { 0 };
    let sw_ptr = if spec.spectrum_width.is_empty() {
        0
    } else {
        LEGACY_HEADER_BYTES + nref + nvel
    };

    let mut out = Vec::with_capacity(LEGACY_HEADER_BYTES + nref + 2 * nvel);
    out.put_i32(spec.time.millis as i32);
    out.put_i16(spec.time.julian_date as i16);
    out.put_i16(spec.unamb_range_x10);
    out.put_u16(encode_angle(spec.azimuth));
    out.put_i16(spec.radial_num);
    out.put_i16(spec.radial_status);
    out.put_u16(encode_angle(spec.elevation));
    out.put_i16(spec.elev_num);
    out.put_i16(spec.ref_gate1);
    out.put_i16(spec.vel_gate1);
    out.put_i16(spec.ref_gate_width);
    out.put_i16(spec.vel_gate_width);
    out.put_i16(nref as i16);
    out.put_i16(nvel as i16);
    out.put_i16(0);
    out.put_f32(0.0);
    out.put_i16(ref_ptr as i16);
    out.put_i16(vel_ptr as i16);
    out.put_i16(sw_ptr as i16);
    out.put_i16(spec.velocity_resolution);
    out.put_i16(spec.vcp);
    out.put_bytes(0, 8);
    out.put_i16(ref_ptr as i16);
    out.put_i16(vel_ptr as i16);
    out.put_i16(sw_ptr as i16);
    out.put_i16(spec.nyquist_x100);
    out.put_i16(-12);
    out.put_i16(0);
    out.put_i16(0);
    out.resize(LEGACY_HEADER_BYTES, 0);
    out.put_slice(&spec.reflectivity);
    out.put_slice(&spec.velocity);
    out.put_slice(&spec.spectrum_width);
    out
}

/// One data moment block of a type 31 radial.
#[derive(Debug, Clone)]
pub struct MomentSpec {
    pub name: [u8; 3],
    pub gate1: i16,
    pub gate_width: u16,
    pub data_size: u8,
    pub scale: f32,
    pub offset: f32,
    pub num_gates: u16,
    /// Raw gate bytes; 16-bit moments are big-endian pairs.
    pub data: Vec<u8>,
}

impl MomentSpec {
    pub fn bytes(name: &[u8; 3], gate1: i16, gate_width: u16, scale: f32, offset: f32, data: Vec<u8>) -> Self {
        Self {
            name: *name,
            gate1,
            gate_width,
            data_size: 8,
            scale,
            offset,
            num_gates: data.len() as u16,
            data,
        }
    }

    pub fn halfwords(name: &[u8; 3], gate1: i16, gate_width: u16, scale: f32, offset: f32, data: &[u16]) -> Self {
        let mut raw = Vec::with_capacity(data.len() * 2);
        for value in data {
            raw.put_u16(*value);
        }
        Self {
            name: *name,
            gate1,
            gate_width,
            data_size: 16,
            scale,
            offset,
            num_gates: data.len() as u16,
            data: raw,
        }
    }
}

/// Field values for a type 31 radial.
#[derive(Debug, Clone)]
pub struct SuperResRadialSpec {
    pub icao: [u8; 4],
    pub time: WireTime,
    pub radial_num: u16,
    pub azimuth: f32,
    pub azimuth_spacing: u8,
    pub radial_status: u8,
    pub elev_num: u8,
    pub elevation: f32,
    pub unamb_range_x10: u16,
    pub nyquist_x100: u16,
    pub horiz_noise: f32,
    pub vert_noise: f32,
    pub vcp: u16,
    pub moments: Vec<MomentSpec>,
}

impl Default for SuperResRadialSpec {
    fn default() -> Self {
        Self {
            icao: *b"KTLX",
            time: WireTime::default(),
            radial_num: 1,
            azimuth: 0.0,
            azimuth_spacing: 1,
            radial_status: 1,
            elev_num: 1,
            elevation: 0.5,
            unamb_range_x10: 4660,
            nyquist_x100: 2700,
            horiz_noise: -80.0,
            vert_noise: -80.0,
            vcp: 212,
            moments: Vec::new(),
        }
    }
}

pub const SUPERRES_HEADER_BYTES: usize = 68;
const VOLUME_BLOCK_BYTES: usize = 44;
const ELEVATION_BLOCK_BYTES: usize = 12;
const RADIAL_BLOCK_BYTES: usize = 20;
const MOMENT_HEADER_BYTES: usize = 28;

pub fn superres_radial_body(spec: &SuperResRadialSpec) -> Vec<u8> {
    let mut offsets = Vec::with_capacity(9);
    let mut cursor = SUPERRES_HEADER_BYTES;
    for len in [VOLUME_BLOCK_BYTES, ELEVATION_BLOCK_BYTES, RADIAL_BLOCK_BYTES] {
        offsets.push(cursor as u32);
        cursor += len;
    }
    for moment in spec.moments.iter().take(6) {
        offsets.push(cursor as u32);
        cursor += MOMENT_HEADER_BYTES + moment.data.len() + moment.data.len() % 2;
    }

    let mut out = Vec::with_capacity(cursor);
    out.put_slice(&spec.icao);
    out.put_u32(spec.time.millis);
    out.put_u16(spec.time.julian_date);
    out.put_u16(spec.radial_num);
    out.put_f32(spec.azimuth);
    out.put_u8(0);
    out.put_u8(0);
    out.put_u16(cursor as u16);
    out.put_u8(spec.azimuth_spacing);
    out.put_u8(spec.radial_status);
    out.put_u8(spec.elev_num);
    out.put_u8(0);
    out.put_f32(spec.elevation);
    out.put_u8(0);
    out.put_u8(0);
    out.put_u16(offsets.len() as u16);
    for idx in 0..9 {
        out.put_u32(offsets.get(idx).copied().unwrap_or(0));
    }

    out.put_slice(b"RVOL");
    out.put_u16(VOLUME_BLOCK_BYTES as u16);
    out.put_u8(1);
    out.put_u8(0);
    out.put_f32(35.333);
    out.put_f32(-97.278);
    out.put_i16(370);
    out.put_u16(20);
    out.put_f32(-44.6);
    out.put_f32(750.0);
    out.put_f32(750.0);
    out.put_f32(0.0);
    out.put_f32(60.0);
    out.put_u16(spec.vcp);
    out.put_u16(0);

    out.put_slice(b"RELV");
    out.put_u16(ELEVATION_BLOCK_BYTES as u16);
    out.put_i16(-12);
    out.put_f32(-44.6);

    out.put_slice(b"RRAD");
    out.put_u16(RADIAL_BLOCK_BYTES as u16);
    out.put_u16(spec.unamb_range_x10);
    out.put_f32(spec.horiz_noise);
    out.put_f32(spec.vert_noise);
    out.put_u16(spec.nyquist_x100);
    out.put_u16(0);

    for moment in spec.moments.iter().take(6) {
        out.put_u8(b'D');
        out.put_slice(&moment.name);
        out.put_f32(0.0);
        out.put_u16(moment.num_gates);
        out.put_i16(moment.gate1);
        out.put_u16(moment.gate_width);
        out.put_u16(0);
        out.put_i16(0);
        out.put_u8(0);
        out.put_u8(moment.data_size);
        out.put_f32(moment.scale);
        out.put_f32(moment.offset);
        out.put_slice(&moment.data);
        if moment.data.len() % 2 == 1 {
            out.put_u8(0);
        }
    }
    out
}

/// One elevation cut of a VCP message.
#[derive(Debug, Clone, Default)]
pub struct VcpCutSpec {
    pub elevation: f64,
    pub channel_config: u8,
    pub waveform_type: u8,
    pub super_res: u8,
    pub surveillance_prf_num: u8,
    pub surveillance_pulse_count: u16,
    /// deg/s
    pub azimuth_rate: f64,
    pub doppler_prf_num: u16,
    pub doppler_pulse_count: u16,
}

pub fn vcp_body(pattern_number: u16, cuts: &[VcpCutSpec]) -> Vec<u8> {
    let len_bytes = 22 + cuts.len() * 46;
    let mut out = Vec::with_capacity(len_bytes);
    out.put_u16((len_bytes / 2) as u16);
    out.put_u16(2);
    out.put_u16(pattern_number);
    out.put_u16(cuts.len() as u16);
    out.put_u16(1);
    out.put_u8(2);
    out.put_u8(2);
    out.put_bytes(0, 10);
    for cut in cuts {
        out.put_u16(encode_angle(cut.elevation));
        out.put_u8(cut.channel_config);
        out.put_u8(cut.waveform_type);
        out.put_u8(cut.super_res);
        out.put_u8(cut.surveillance_prf_num);
        out.put_u16(cut.surveillance_pulse_count);
        out.put_i16((cut.azimuth_rate / (22.5 / 2048.0) * 8.0).round() as i16);
        out.put_i16(200);
        out.put_i16(350);
        out.put_i16(350);
        out.put_bytes(0, 6);
        for sector in 0..3u16 {
            out.put_u16(encode_angle(sector as f64 * 120.0));
            out.put_u16(cut.doppler_prf_num);
            out.put_u16(cut.doppler_pulse_count);
            out.put_u16(0);
        }
    }
    out
}

pub fn rda_status_body(vcp: i16, rda_build_number: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(40);
    out.put_u16(4);
    out.put_u16(2);
    out.put_u16(2);
    out.put_u16(0);
    out.put_u16(730);
    out.put_i16(-120);
    out.put_u16(28);
    out.put_i16(vcp);
    out.put_u16(0);
    out.put_u16(rda_build_number);
    out.put_u16(4);
    out.resize(40, 0);
    out
}
