pub mod analysis;
pub mod health;
pub mod mood;
pub mod records;
pub mod reports;
pub mod session;
pub mod settings;
pub mod stats;
