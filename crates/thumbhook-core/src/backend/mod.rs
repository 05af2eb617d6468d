//! Host backends implementing the [`crate::host`] traits.

pub mod directus;
pub mod memory;

pub use directus::DirectusClient;
pub use memory::MemoryBackend;
