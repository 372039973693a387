use serde::{Deserialize, Serialize};

/// Scale and bias that map a stored byte back to a physical value:
/// `value = byte * scale + bias`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldScaling {
    pub scale: f64,
    pub bias: f64,
}

impl FieldScaling {
    pub const fn new(scale: f64, bias: f64) -> Self {
        Self { scale, bias }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterestPoint {
    pub value: f64,
    pub interest: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestMapConfig {
    pub points: Vec<InterestPoint>,
    pub weight: f64,
}

impl InterestMapConfig {
    fn from_pairs(pairs: &[(f64, f64)], weight: f64) -> Self {
        Self {
            points: pairs
                .iter()
                .map(|&(value, interest)| InterestPoint { value, interest })
                .collect(),
            weight,
        }
    }
}

/// Parameters of the clutter classifier window and its interest maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecConfig {
    /// Range extent of the kernel, km.
    pub kernel_range_len_km: f64,
    /// Azimuth extent of the kernel, deg.
    pub kernel_azimuth_width: f64,
    pub azimuth_tolerance: f64,
    pub elevation_tolerance: f64,
    /// Gate-to-gate dBZ rise that counts as a spin change.
    pub spin_dbz_threshold: f64,
    /// Number of beams held in the trailing queue. Forced odd.
    pub queue_width: usize,
    pub dbz_texture: InterestMapConfig,
    pub dbz_spin: InterestMapConfig,
    pub velocity: InterestMapConfig,
    pub width: InterestMapConfig,
    pub velocity_sdev: InterestMapConfig,
}

impl Default for RecConfig {
    fn default() -> Self {
        Self {
            kernel_range_len_km: 1.0,
            kernel_azimuth_width: 3.0,
            azimuth_tolerance: 1.5,
            elevation_tolerance: 0.5,
            spin_dbz_threshold: 2.0,
            queue_width: 5,
            dbz_texture: InterestMapConfig::from_pairs(&[(0.0, 0.0), (80.0, 1.0)], 1.0),
            dbz_spin: InterestMapConfig::from_pairs(&[(30.0, 0.0), (50.0, 1.0)], 1.0),
            velocity: InterestMapConfig::from_pairs(
                &[(-2.3, 0.0), (-1.3, 1.0), (1.3, 1.0), (2.3, 0.0)],
                1.0,
            ),
            width: InterestMapConfig::from_pairs(&[(0.0, 1.0), (3.2, 1.0), (3.8, 0.0)], 1.0),
            velocity_sdev: InterestMapConfig::from_pairs(
                &[(0.0, 1.0), (0.7, 1.0), (1.0, 0.0)],
                1.0,
            ),
        }
    }
}

impl RecConfig {
    pub fn normalized_queue_width(&self) -> usize {
        let width = self.queue_width.max(1);
        if width % 2 == 0 {
            width + 1
        } else {
            width
        }
    }
}

/// Limits for pairing a velocity-only beam with a donor reflectivity beam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeTolerances {
    pub azimuth: f64,
    pub elevation: f64,
    /// Seconds.
    pub time: f64,
}

impl Default for MergeTolerances {
    fn default() -> Self {
        Self {
            azimuth: 1.0,
            elevation: 0.5,
            time: 120.0,
        }
    }
}

/// Everything the volume controller needs to turn messages into sweeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Merge Doppler-only tilts with the preceding surveillance tilt.
    pub combine_sweeps: bool,
    pub save_zdr: bool,
    pub save_phi: bool,
    pub save_rho: bool,
    /// Derived fields; `None` disables the field.
    pub snr: Option<FieldScaling>,
    pub power_ratio: Option<FieldScaling>,
    pub rec: Option<FieldScaling>,
    pub snr_factor: f64,
    /// dB reported where no aliased echo exists.
    pub power_ratio_default: f64,
    pub rec_params: RecConfig,
    pub merge: MergeTolerances,
    /// VCPs that split low tilts into surveillance and Doppler cuts. Tilts
    /// of any other known VCP are written as they are, without combining.
    pub merge_vcps: Vec<u16>,
    /// Upper elevation limits of clutter map segments, deg.
    pub segment_limits: Vec<f64>,
    pub use_adaptation_segment_limits: bool,
    pub use_range_cutoff: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            combine_sweeps: true,
            save_zdr: true,
            save_phi: true,
            save_rho: true,
            snr: Some(FieldScaling::new(0.5, -32.0)),
            power_ratio: Some(FieldScaling::new(0.5, -32.0)),
            rec: Some(FieldScaling::new(0.004, -0.004)),
            snr_factor: 1.0,
            power_ratio_default: 90.0,
            rec_params: RecConfig::default(),
            merge: MergeTolerances::default(),
            merge_vcps: vec![11, 12, 21, 31, 32, 35, 121, 211, 212, 215, 221],
            segment_limits: vec![1.6, 2.5, 3.5, 4.5],
            use_adaptation_segment_limits: true,
            use_range_cutoff: false,
        }
    }
}

impl IngestConfig {
    pub fn is_merge_vcp(&self, vcp: u16) -> bool {
        self.merge_vcps.contains(&vcp)
    }
}
