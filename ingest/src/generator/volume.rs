use anyhow::Context;
use nexradcore::wire::encode::{
    rda_status_body, superres_radial_body, vcp_body, volume_title, write_record,
    write_segmented, MomentSpec, SuperResRadialSpec, VcpCutSpec, WireTime,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const GATE1_M: i16 = 2125;
const GATE_WIDTH_M: u16 = 250;
const DBZ_SCALE: f32 = 2.0;
const DBZ_OFFSET: f32 = 66.0;
const VEL_SCALE: f32 = 2.0;
const VEL_OFFSET: f32 = 129.0;

/// Configuration for a synthetic split-cut volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub site: String,
    pub seed: u64,
    /// Unix seconds of the first radial.
    pub start_time: f64,
    pub radials: usize,
    pub refl_gates: usize,
    pub vel_gates: usize,
    pub vcp: u16,
    /// deg/s
    pub rotation_rate: f64,
    pub azimuth_jitter: f64,
    pub noise_dbz: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            site: "KTLX".to_string(),
            seed: 0,
            start_time: 1_300_000_000.0,
            radials: 360,
            refl_gates: 460,
            vel_gates: 480,
            vcp: 212,
            rotation_rate: 20.0,
            azimuth_jitter: 0.05,
            noise_dbz: 1.5,
        }
    }
}

impl GeneratorConfig {
    fn normalized_radials(&self) -> usize {
        self.radials.max(2)
    }

    fn radial_step(&self) -> f64 {
        360.0 / self.normalized_radials() as f64
    }

    fn site_code(&self) -> [u8; 4] {
        let mut code = *b"XXXX";
        for (dst, src) in code.iter_mut().zip(self.site.bytes()) {
            *dst = src;
        }
        code
    }
}

#[derive(Debug, Clone, Copy)]
enum Cut {
    Surveillance,
    Doppler,
    Batch,
}

impl Cut {
    fn elev_num(self) -> u8 {
        match self {
            Cut::Surveillance => 1,
            Cut::Doppler => 2,
            Cut::Batch => 3,
        }
    }

    fn elevation(self) -> f32 {
        match self {
            Cut::Surveillance | Cut::Doppler => 0.5,
            Cut::Batch => 1.5,
        }
    }
}

/// Storm cell centred at 120 deg, 60 km, fading with distance.
fn storm_dbz(azimuth: f64, range_km: f64) -> f64 {
    let daz = (azimuth - 120.0) / 25.0;
    let dr = (range_km - 60.0) / 20.0;
    45.0 * (-(daz * daz) - dr * dr).exp()
}

fn reflectivity(config: &GeneratorConfig, rng: &mut StdRng, azimuth: f64) -> MomentSpec {
    let data = (0..config.refl_gates)
        .map(|gate| {
            let range_km = (GATE1_M as f64 + gate as f64 * GATE_WIDTH_M as f64) * 0.001;
            let dbz = storm_dbz(azimuth, range_km)
                + rng.gen_range(-config.noise_dbz..=config.noise_dbz);
            if dbz < 5.0 {
                0
            } else {
                (dbz * DBZ_SCALE as f64 + DBZ_OFFSET as f64).round().clamp(2.0, 255.0) as u8
            }
        })
        .collect();
    MomentSpec::bytes(b"REF", GATE1_M, GATE_WIDTH_M, DBZ_SCALE, DBZ_OFFSET, data)
}

fn doppler(config: &GeneratorConfig, rng: &mut StdRng, azimuth: f64) -> [MomentSpec; 2] {
    let radial_wind = 12.0 * azimuth.to_radians().cos();
    let velocity = (0..config.vel_gates)
        .map(|_| {
            let v = radial_wind + rng.gen_range(-0.5..=0.5);
            (v * VEL_SCALE as f64 + VEL_OFFSET as f64).round().clamp(2.0, 255.0) as u8
        })
        .collect();
    let width = (0..config.vel_gates)
        .map(|_| {
            let w: f64 = rng.gen_range(0.5..=2.5);
            (w * VEL_SCALE as f64 + VEL_OFFSET as f64).round() as u8
        })
        .collect();
    [
        MomentSpec::bytes(b"VEL", GATE1_M, GATE_WIDTH_M, VEL_SCALE, VEL_OFFSET, velocity),
        MomentSpec::bytes(b"SW ", GATE1_M, GATE_WIDTH_M, VEL_SCALE, VEL_OFFSET, width),
    ]
}

fn write_cut(out: &mut Vec<u8>, config: &GeneratorConfig, rng: &mut StdRng, cut: Cut, start: f64) {
    let step = config.radial_step();
    let dwell = step / config.rotation_rate.max(1.0);
    for radial in 0..config.normalized_radials() {
        let nominal = radial as f64 * step;
        let jitter = rng.gen_range(-config.azimuth_jitter..=config.azimuth_jitter);
        let azimuth = (nominal + jitter).rem_euclid(360.0);
        let time = WireTime::from_epoch_seconds(start + radial as f64 * dwell);

        let mut moments = Vec::with_capacity(3);
        if matches!(cut, Cut::Surveillance | Cut::Batch) {
            moments.push(reflectivity(config, rng, azimuth));
        }
        if matches!(cut, Cut::Doppler | Cut::Batch) {
            moments.extend(doppler(config, rng, azimuth));
        }

        // 3 opens the volume, 0 opens any later elevation
        let radial_status = match (radial, cut.elev_num()) {
            (0, 1) => 3,
            (0, _) => 0,
            _ => 1,
        };
        let spec = SuperResRadialSpec {
            icao: config.site_code(),
            time,
            radial_num: radial as u16 + 1,
            azimuth: azimuth as f32,
            radial_status,
            elev_num: cut.elev_num(),
            elevation: cut.elevation(),
            vcp: config.vcp,
            moments,
            ..Default::default()
        };
        write_record(out, 31, &superres_radial_body(&spec), 1, 1, time);
    }
}

/// Builds a complete archive volume: title, status, VCP, then a
/// surveillance cut, the Doppler cut at the same angle and a batch cut.
pub fn build_volume(config: &GeneratorConfig) -> anyhow::Result<Vec<u8>> {
    let radials = config.normalized_radials();
    let bytes_per_radial = 200 + config.refl_gates + 2 * config.vel_gates;
    let capacity = radials
        .checked_mul(bytes_per_radial * 3)
        .context("overflow sizing synthetic volume")?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let start = WireTime::from_epoch_seconds(config.start_time);
    let mut out = Vec::with_capacity(capacity);
    out.extend(volume_title("AR2V0006.", 1, start));

    write_record(&mut out, 2, &rda_status_body(config.vcp as i16, 1900), 1, 1, start);
    let cut = |elevation: f64, waveform_type: u8| VcpCutSpec {
        elevation,
        waveform_type,
        super_res: 1,
        surveillance_prf_num: 1,
        surveillance_pulse_count: 15,
        azimuth_rate: config.rotation_rate,
        doppler_prf_num: 5,
        doppler_pulse_count: 40,
        ..Default::default()
    };
    let vcp = vcp_body(config.vcp, &[cut(0.5, 1), cut(0.5, 2), cut(1.5, 4)]);
    write_segmented(&mut out, 5, &vcp, 1200, start);

    let sweep_seconds = 360.0 / config.rotation_rate.max(1.0) + 2.0;
    for (idx, cut) in [Cut::Surveillance, Cut::Doppler, Cut::Batch].into_iter().enumerate() {
        let cut_start = config.start_time + idx as f64 * sweep_seconds;
        write_cut(&mut out, config, &mut rng, cut, cut_start);
    }
    Ok(out)
}

pub fn write_volume<P: AsRef<Path>>(path: P, config: &GeneratorConfig) -> anyhow::Result<()> {
    let path_ref = path.as_ref();
    let volume = build_volume(config)?;
    if let Some(parent) = path_ref.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path_ref, volume)
        .with_context(|| format!("writing synthetic volume {}", path_ref.display()))?;
    Ok(())
}
