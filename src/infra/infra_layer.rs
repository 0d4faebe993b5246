// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "http/mod.rs"]
pub mod http;

#[path = "google_docs/mod.rs"]
pub mod google_docs;

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "vector_store/mod.rs"]
pub mod vector_store;
