pub mod pool;
pub mod records;

pub use pool::{create_pool, run_migrations};
pub use records::PgRecordCollection;
