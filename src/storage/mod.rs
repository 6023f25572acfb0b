//! Durable storage for the node directory

pub mod directory_storage;
pub mod json_storage;
pub mod memory_storage;

pub use directory_storage::DirectoryStorage;
pub use json_storage::JsonFileStorage;
pub use memory_storage::MemoryStorage;
