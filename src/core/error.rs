//! Error types for the mesh provisioner

use thiserror::Error;

use super::types::Address;

/// Result type for mesh backend operations
pub type MeshResult<T> = Result<T, MeshError>;

/// Result type for directory storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for node directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors related to the mesh control interface
#[derive(Error, Debug, Clone)]
pub enum MeshError {
    #[error("Mesh stack unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected by mesh stack: {0}")]
    Rejected(String),

    #[error("Mesh stack did not answer {0} in time")]
    Timeout(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid composition data: {0}")]
    Composition(#[from] CompositionError),
}

/// Errors raised while decoding composition data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositionError {
    #[error("Composition data truncated at offset {offset}, {needed} more bytes needed")]
    Truncated { offset: usize, needed: usize },

    #[error("Unsupported composition page {0}")]
    UnsupportedPage(u8),

    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),
}

/// Errors related to persisting the directory
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors related to directory invariants
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Directory has not been created")]
    NoNetwork,

    #[error("Directory was created for a different network key")]
    NetworkKeyMismatch,

    #[error("No application key in directory")]
    NoApplicationKey,

    #[error("Address {0:#06x} is not a unicast address")]
    InvalidAddress(Address),

    #[error("Address range of {0:#06x} overlaps an existing node")]
    AddressInUse(Address),

    #[error("Unknown node {0:#06x}")]
    UnknownNode(Address),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors related to core service operations
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Backend error: {0}")]
    Backend(#[from] MeshError),
}

/// Errors raised while parsing configuration values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
