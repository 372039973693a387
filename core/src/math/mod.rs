pub mod stats;

pub use stats::{KernelStats, StatsHelper};
