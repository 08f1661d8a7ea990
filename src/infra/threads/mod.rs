pub mod in_memory;
pub mod sqlite_store;

pub use in_memory::InMemoryThreadStore;
pub use sqlite_store::SqliteThreadStore;
