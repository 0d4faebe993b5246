// The in-memory store backs the service tests; the binary always uses SQLite.
#[cfg(test)]
pub mod in_memory;
pub mod sqlite_vector_store;

#[cfg(test)]
pub use in_memory::InMemoryVectorStore;
pub use sqlite_vector_store::SqliteVectorStore;
