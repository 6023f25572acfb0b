//! Mesh control interface trait definition

use std::sync::Arc;

use trait_variant::make;
use uuid::Uuid;

use crate::core::{
    composition::Composition,
    error::MeshResult,
    events::EventRouter,
    types::{Address, Key128, ModelId, SelfAdmission, Status},
};

/// Abstraction over the mesh stack (radio, provisioning bearer, config client)
///
/// This trait enables testing by allowing mock implementations while
/// providing the operations the provisioner needs. Asynchronous stack
/// events are delivered through the [`EventRouter`] passed to `initialize`.
#[make(Send)]
pub trait MeshBackend: Sync + 'static {
    /// Register the local composition and the event sink
    async fn initialize(&self, composition: &Composition, events: Arc<EventRouter>)
    -> MeshResult<()>;

    /// Provision the local node
    async fn admit_self(
        &self,
        net_idx: u16,
        net_key: &Key128,
        address: Address,
        device_key: &Key128,
    ) -> MeshResult<SelfAdmission>;

    /// Start admission of a beaconing device over the advertising bearer
    ///
    /// Returns once the request is accepted. Completion is reported later as
    /// an admission-complete event. No out-of-band authentication is used.
    async fn admit_remote(&self, uuid: &Uuid, net_idx: u16, attention: u8) -> MeshResult<()>;

    /// Send an application key to the configuration server at `target`
    async fn distribute_key(
        &self,
        target: Address,
        net_idx: u16,
        app_idx: u16,
        key: &Key128,
    ) -> MeshResult<Status>;

    /// Bind an application key to a model on one of `target`'s elements
    async fn bind_capability(
        &self,
        target: Address,
        element: Address,
        app_idx: u16,
        model: ModelId,
    ) -> MeshResult<Status>;

    /// Read a composition data page from `target`
    async fn get_composition(&self, target: Address, page: u8) -> MeshResult<Composition>;
}
