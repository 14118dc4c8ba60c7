//! Schema module - Search space, dataset, and evolution configuration types.

mod dataset;
mod evolution;
mod params;

pub use dataset::*;
pub use evolution::*;
pub use params::*;
