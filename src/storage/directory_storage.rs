//! Directory storage trait definition

use trait_variant::make;

use crate::core::{directory::DirectorySnapshot, error::StorageResult};

/// Abstraction over the settings persistence of the host
///
/// The directory writes a full snapshot on every mutation; implementations
/// must make a successful `save` durable before returning.
#[make(Send)]
pub trait DirectoryStorage: Send + Sync + 'static {
    /// Load the last saved snapshot, `None` if nothing was ever saved
    async fn load(&self) -> StorageResult<Option<DirectorySnapshot>>;

    /// Replace the stored snapshot
    async fn save(&self, snapshot: &DirectorySnapshot) -> StorageResult<()>;
}
