pub mod beam;
pub mod derived;
pub mod interest;
pub mod rec;
pub mod sweep;
pub mod volume;

pub use beam::{Beam, GateGeometry, Moment, ScanType};
pub use interest::{ClassifierContext, InterestMap, InterestMaps};
pub use sweep::{AuxProducts, SweepData, SweepState};
pub use volume::VolumeController;
