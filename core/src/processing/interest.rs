use crate::config::{InterestMapConfig, RecConfig};
use crate::prelude::ConfigError;
use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Marks a classifier input that could not be computed.
pub const MISSING: f64 = -9999.0;

/// Piecewise-linear mapping from a physical quantity to a [0, 1] interest.
///
/// Values outside the control points saturate to the nearest endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct InterestMap {
    name: String,
    points: Vec<(f64, f64)>,
    weight: f64,
}

impl InterestMap {
    pub fn new(name: &str, config: &InterestMapConfig) -> Result<Self, ConfigError> {
        validate(name, config)?;
        Ok(Self::from_validated(name, config))
    }

    fn from_validated(name: &str, config: &InterestMapConfig) -> Self {
        debug!("creating {} interest map", name);
        Self {
            name: name.to_string(),
            points: config.points.iter().map(|p| (p.value, p.interest)).collect(),
            weight: config.weight,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn interest(&self, value: f64) -> f64 {
        let (first_value, first_interest) = self.points[0];
        if value <= first_value {
            return first_interest;
        }
        for pair in self.points.windows(2) {
            let (v0, i0) = pair[0];
            let (v1, i1) = pair[1];
            if value <= v1 {
                return i0 + (value - v0) * (i1 - i0) / (v1 - v0);
            }
        }
        self.points[self.points.len() - 1].1
    }

    /// Adds `interest * weight` and `weight` to the running sums unless
    /// `value` is [`MISSING`].
    pub fn accumulate(&self, value: f64, sum_interest: &mut f64, sum_weight: &mut f64) {
        if value == MISSING {
            return;
        }
        *sum_interest += self.interest(value) * self.weight;
        *sum_weight += self.weight;
    }
}

fn validate(name: &str, config: &InterestMapConfig) -> Result<(), ConfigError> {
    if config.points.is_empty() {
        return Err(ConfigError::EmptyMap {
            name: name.to_string(),
        });
    }
    let increasing = config
        .points
        .windows(2)
        .all(|pair| pair[1].value > pair[0].value);
    if !increasing {
        return Err(ConfigError::NonMonotonic {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// The five maps feeding the clutter classifier.
#[derive(Debug, Clone)]
pub struct InterestMaps {
    pub dbz_texture: InterestMap,
    pub dbz_spin: InterestMap,
    pub velocity: InterestMap,
    pub width: InterestMap,
    pub velocity_sdev: InterestMap,
}

impl InterestMaps {
    pub fn from_config(config: &RecConfig) -> Result<Self, ConfigError> {
        for (name, map) in map_configs(config) {
            validate(name, map)?;
        }
        Ok(Self::from_validated(config))
    }

    fn from_validated(config: &RecConfig) -> Self {
        Self {
            dbz_texture: InterestMap::from_validated("reflectivity texture", &config.dbz_texture),
            dbz_spin: InterestMap::from_validated("reflectivity spin", &config.dbz_spin),
            velocity: InterestMap::from_validated("velocity", &config.velocity),
            width: InterestMap::from_validated("spectrum width", &config.width),
            velocity_sdev: InterestMap::from_validated("velocity sdev", &config.velocity_sdev),
        }
    }
}

fn map_configs(config: &RecConfig) -> [(&'static str, &InterestMapConfig); 5] {
    [
        ("reflectivity texture", &config.dbz_texture),
        ("reflectivity spin", &config.dbz_spin),
        ("velocity", &config.velocity),
        ("spectrum width", &config.width),
        ("velocity sdev", &config.velocity_sdev),
    ]
}

/// Shared, read-only classifier state. Configuration is validated up front;
/// the maps themselves are built on first use and never rebuilt.
#[derive(Debug)]
pub struct ClassifierContext {
    config: RecConfig,
    maps: OnceLock<InterestMaps>,
    builds: AtomicUsize,
}

impl ClassifierContext {
    pub fn new(config: &RecConfig) -> Result<Self, ConfigError> {
        for (name, map) in map_configs(config) {
            validate(name, map)?;
        }
        if config.kernel_range_len_km <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "kernel range length must be positive, got {}",
                config.kernel_range_len_km
            )));
        }
        Ok(Self {
            config: config.clone(),
            maps: OnceLock::new(),
            builds: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &RecConfig {
        &self.config
    }

    pub fn maps(&self) -> &InterestMaps {
        self.maps.get_or_init(|| {
            self.builds.fetch_add(1, Ordering::Relaxed);
            InterestMaps::from_validated(&self.config)
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.maps.get().is_some()
    }

    /// Times the maps have been constructed; at most one.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}
