use super::message::MomentKind;
use super::{coded_angle, wire_time, FieldReader};
use crate::prelude::DecodeError;
use log::warn;

const HEADER_BYTES: usize = 100;

/// Fixed wire scaling of legacy reflectivity.
pub const DBZ_SCALE: f64 = 0.5;
pub const DBZ_BIAS: f64 = -33.0;
/// Fixed wire scaling of legacy velocity and spectrum width.
pub const VEL_SCALE: f64 = 0.5;
pub const VEL_BIAS: f64 = -64.5;

/// A decoded type 1 (digital radar data) radial.
///
/// Moment slices borrow the payload; a moment is present only when its
/// pointer and gate count are non-zero and its gates fit the payload.
#[derive(Debug, Clone)]
pub struct LegacyRadial<'a> {
    pub millis: i32,
    pub julian_date: i16,
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
    pub ref_num_gates: i16,
    pub vel_num_gates: i16,
    pub sector_num: i16,
    pub sys_gain_cal_const: f32,
    /// 2 = 0.5 m/s, 4 = 1.0 m/s.
    pub velocity_resolution: i16,
    pub vcp: i16,
    pub nyquist_x100: i16,
    pub atmos_atten_x1000: i16,
    pub threshold_param: i16,
    pub spot_blank_status: i16,
    pub reflectivity: Option<&'a [u8]>,
    pub velocity: Option<&'a [u8]>,
    pub spectrum_width: Option<&'a [u8]>,
}

impl<'a> LegacyRadial<'a> {
    pub fn decode(payload: &'a [u8]) -> Result<Self, DecodeError> {
        let reader = FieldReader::new(payload);
        if reader.len() < HEADER_BYTES {
            return Err(DecodeError::Truncated {
                expected_length: HEADER_BYTES,
                buffer_length: reader.len(),
            });
        }

        let ref_num_gates = reader.i16_at(26)?;
        let vel_num_gates = reader.i16_at(28)?;
        let ref_ptr = reader.i16_at(36)?;
        let vel_ptr = reader.i16_at(38)?;
        let sw_ptr = reader.i16_at(40)?;

        Ok(Self {
            millis: reader.i32_at(0)?,
            julian_date: reader.i16_at(4)?,
            unamb_range_x10: reader.i16_at(6)?,
            azimuth: coded_angle(reader.u16_at(8)?),
            radial_num: reader.i16_at(10)?,
            radial_status: reader.i16_at(12)?,
            elevation: coded_angle(reader.u16_at(14)?),
            elev_num: reader.i16_at(16)?,
            ref_gate1: reader.i16_at(18)?,
            vel_gate1: reader.i16_at(20)?,
            ref_gate_width: reader.i16_at(22)?,
            vel_gate_width: reader.i16_at(24)?,
            ref_num_gates,
            vel_num_gates,
            sector_num: reader.i16_at(30)?,
            sys_gain_cal_const: reader.f32_at(32)?,
            velocity_resolution: reader.i16_at(42)?,
            vcp: reader.i16_at(44)?,
            nyquist_x100: reader.i16_at(60)?,
            atmos_atten_x1000: reader.i16_at(62)?,
            threshold_param: reader.i16_at(64)?,
            spot_blank_status: reader.i16_at(66)?,
            reflectivity: locate(&reader, MomentKind::Reflectivity, ref_ptr, ref_num_gates),
            velocity: locate(&reader, MomentKind::Velocity, vel_ptr, vel_num_gates),
            spectrum_width: locate(&reader, MomentKind::SpectrumWidth, sw_ptr, vel_num_gates),
        })
    }

    pub fn time(&self) -> f64 {
        wire_time(self.julian_date as i64, self.millis as i64)
    }

    pub fn unambiguous_range_km(&self) -> f64 {
        self.unamb_range_x10 as f64 / 10.0
    }

    pub fn nyquist_velocity(&self) -> f64 {
        self.nyquist_x100 as f64 / 100.0
    }

    /// Multiplier applied to velocity scale/bias on output.
    pub fn velocity_scale_factor(&self) -> f64 {
        if self.velocity_resolution == 4 {
            2.0
        } else {
            1.0
        }
    }
}

fn locate<'a>(reader: &FieldReader<'a>, kind: MomentKind, ptr: i16, gates: i16) -> Option<&'a [u8]> {
    if ptr <= 0 || gates <= 0 {
        return None;
    }
    match reader.slice(ptr as usize, gates as usize) {
        Ok(data) => Some(data),
        Err(_) => {
            warn!(
                "{}",
                DecodeError::MomentOverrun {
                    moment: kind.label(),
                    gates: gates as usize,
                }
            );
            None
        }
    }
}
