pub mod volume;

pub use volume::{write_volume, GeneratorConfig};
