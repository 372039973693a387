use log::{info, warn};

/// Tags sweep lifecycle events with the tilt and volume they belong to.
pub struct LogManager;

impl LogManager {
    pub fn new() -> Self {
        Self
    }

    pub fn record(&self, message: &str) {
        info!("{}", message);
    }

    pub fn sweep_written(&self, volume: u32, elev_num: i32, fixed_angle: f64, beams: usize) {
        self.record(&format!(
            "volume {} tilt {} ({:.2} deg): wrote sweep with {} beams",
            volume, elev_num, fixed_angle, beams
        ));
    }

    pub fn sweep_lost(&self, volume: u32, elev_num: i32, reason: &str) {
        warn!("volume {} tilt {}: sweep lost, {}", volume, elev_num, reason);
    }

    pub fn sweep_skipped(&self, volume: u32, elev_num: i32) {
        self.record(&format!(
            "volume {} tilt {}: velocity-only sweep has no donor, skipped",
            volume, elev_num
        ));
    }

    pub fn volume_started(&self, volume: u32) {
        self.record(&format!("starting volume {}", volume));
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
