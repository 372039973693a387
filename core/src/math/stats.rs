pub struct StatsHelper;

impl StatsHelper {
    /// Signed difference `az1 - az2` wrapped into [-180, 180].
    pub fn azimuth_difference(az1: f64, az2: f64) -> f64 {
        let diff = az1 - az2;
        if diff > 180.0 {
            diff - 360.0
        } else if diff < -180.0 {
            diff + 360.0
        } else {
            diff
        }
    }

    /// Sum of signed, wrap-corrected deltas between consecutive azimuths.
    pub fn azimuth_coverage(azimuths: &[f64]) -> f64 {
        azimuths
            .windows(2)
            .map(|pair| Self::azimuth_difference(pair[1], pair[0]))
            .sum::<f64>()
            .abs()
    }

    pub fn mean(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Running count, sum and sum of squares over a kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelStats {
    count: f64,
    sum: f64,
    sum_sq: f64,
}

impl KernelStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1.0;
        self.sum += value;
        self.sum_sq += value * value;
    }

    pub fn count(&self) -> f64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0.0).then(|| self.sum / self.count)
    }

    /// Population standard deviation; needs more than two samples.
    pub fn sdev(&self) -> Option<f64> {
        if self.count <= 2.0 {
            return None;
        }
        let mean = self.sum / self.count;
        let term1 = self.sum_sq / self.count;
        let term2 = mean * mean;
        (term1 >= term2).then(|| (term1 - term2).sqrt())
    }
}
