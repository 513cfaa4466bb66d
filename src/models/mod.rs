pub mod mood_state;
pub mod record;
pub mod settings;
