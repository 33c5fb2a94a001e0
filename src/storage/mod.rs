//! Storage implementations for records and blobs

pub mod blobs;
pub mod in_memory;

pub use blobs::{FsBlobStore, InMemoryBlobStore};
pub use in_memory::InMemoryRepository;
