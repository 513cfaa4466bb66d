pub mod analysis;
pub mod classifier;
pub mod stats;
pub mod weeks;
