// Persistence module: durable backing for the balance cache
pub mod memory;
pub mod postgres;
pub mod pump;
pub mod repository;

pub use memory::MemoryStore;
pub use postgres::PgSnapshotStore;
pub use pump::{WriterStats, feed_bootstrap, run_backup_writer};
pub use repository::SnapshotStore;
