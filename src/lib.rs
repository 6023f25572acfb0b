//! Mesh Provisioner
//!
//! An unattended Bluetooth mesh provisioner:
//! - Admits beaconing devices, automatically or after operator confirmation
//! - Distributes the application key and binds it to every node capability
//! - Talks to the mesh stack daemon over a Unix socket (JSON-RPC 2.0)

pub mod backend;
pub mod config;
pub mod core;
pub mod peripheral;
pub mod protocol;
pub mod storage;
pub mod transport;

pub use crate::core::{
    error::{DirectoryError, MeshError, ServiceError, StorageError},
    provisioner::{CycleOutcome, Provisioner, ProvisionerConfig},
    types::{Address, Key128, NodeRecord},
};
