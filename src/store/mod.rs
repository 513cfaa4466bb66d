pub mod clock;
pub mod local;
pub mod records;
pub mod remote;
pub mod reports;
pub mod settings;
