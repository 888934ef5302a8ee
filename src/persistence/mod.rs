//! Persistence layer: index and metadata artifacts saved as a matched pair.

pub mod manager;
pub mod serialization;

pub use manager::PersistenceManager;
