//! Mock mesh backend for testing

use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::backend::MeshBackend;
use crate::core::{
    composition::Composition,
    error::{MeshError, MeshResult},
    events::EventRouter,
    types::{Address, AdmittedNode, Key128, MeshEvent, ModelId, SelfAdmission, Status},
};

/// Device key handed out by the mock for every admitted node
pub const MOCK_DEVICE_KEY: Key128 = Key128::new([0x77; 16]);

/// Recorded bind request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindCall {
    pub target: Address,
    pub element: Address,
    pub app_idx: u16,
    pub model: ModelId,
}

/// Internal state for the mock backend
#[derive(Default)]
struct MockState {
    events: Option<Arc<EventRouter>>,
    local_composition: Option<Composition>,
    self_admitted: bool,
    should_fail_admit: bool,
    unavailable: bool,
    next_address: Option<(Address, u8)>,
    admissions: Vec<Uuid>,
    distributions: Vec<(Address, u16)>,
    distribute_status: Option<Status>,
    binds: Vec<BindCall>,
    bind_statuses: HashMap<(Address, ModelId), Status>,
    compositions: HashMap<Address, Composition>,
}

/// Mock mesh backend for testing
///
/// Allows configuring behavior for tests without requiring a radio.
#[derive(Clone, Default)]
pub struct MockMeshBackend {
    inner: Arc<Mutex<MockState>>,
}

impl MockMeshBackend {
    /// Create a new mock backend with default state
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure mock to reject admission requests
    pub async fn set_admit_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_admit = should_fail;
    }

    /// Configure every remote configuration call to fail at transport level
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().await.unavailable = unavailable;
    }

    /// Complete every accepted admission immediately
    ///
    /// Nodes get consecutive address ranges starting at `first`, each with
    /// `element_count` elements.
    pub async fn complete_admissions(&self, first: Address, element_count: u8) {
        self.inner.lock().await.next_address = Some((first, element_count));
    }

    /// Status returned for key distribution (success by default)
    pub async fn set_distribute_status(&self, status: Status) {
        self.inner.lock().await.distribute_status = Some(status);
    }

    /// Status returned when binding `model` on `element` (success by default)
    pub async fn set_bind_status(&self, element: Address, model: ModelId, status: Status) {
        self.inner
            .lock()
            .await
            .bind_statuses
            .insert((element, model), status);
    }

    /// Composition reported by the node at `target`
    pub async fn set_composition(&self, target: Address, composition: Composition) {
        self.inner.lock().await.compositions.insert(target, composition);
    }

    /// Deliver a stack event as if it came from the radio
    pub async fn emit(&self, event: MeshEvent) {
        let events = self.inner.lock().await.events.clone();
        if let Some(events) = events {
            events.dispatch(event);
        }
    }

    /// UUIDs of all accepted admission requests
    pub async fn admissions(&self) -> Vec<Uuid> {
        self.inner.lock().await.admissions.clone()
    }

    /// Targets and app key indices of all key distributions
    pub async fn distributions(&self) -> Vec<(Address, u16)> {
        self.inner.lock().await.distributions.clone()
    }

    /// All bind requests in order
    pub async fn binds(&self) -> Vec<BindCall> {
        self.inner.lock().await.binds.clone()
    }

    /// Composition passed to `initialize`
    pub async fn local_composition(&self) -> Option<Composition> {
        self.inner.lock().await.local_composition.clone()
    }
}

impl MeshBackend for MockMeshBackend {
    async fn initialize(
        &self,
        composition: &Composition,
        events: Arc<EventRouter>,
    ) -> MeshResult<()> {
        let mut state = self.inner.lock().await;
        state.local_composition = Some(composition.clone());
        state.events = Some(events);
        Ok(())
    }

    async fn admit_self(
        &self,
        _net_idx: u16,
        _net_key: &Key128,
        _address: Address,
        _device_key: &Key128,
    ) -> MeshResult<SelfAdmission> {
        let mut state = self.inner.lock().await;
        if state.self_admitted {
            Ok(SelfAdmission::AlreadyAdmitted)
        } else {
            state.self_admitted = true;
            Ok(SelfAdmission::Admitted)
        }
    }

    async fn admit_remote(&self, uuid: &Uuid, net_idx: u16, _attention: u8) -> MeshResult<()> {
        let mut state = self.inner.lock().await;
        if state.should_fail_admit {
            return Err(MeshError::Rejected("Mock admission failure".into()));
        }
        state.admissions.push(*uuid);

        if let Some((address, element_count)) = state.next_address {
            state.next_address = Some((address + u16::from(element_count), element_count));
            if let Some(events) = &state.events {
                events.dispatch(MeshEvent::AdmissionComplete(AdmittedNode {
                    net_idx,
                    uuid: *uuid,
                    address,
                    element_count,
                    device_key: MOCK_DEVICE_KEY,
                }));
            }
        }

        Ok(())
    }

    async fn distribute_key(
        &self,
        target: Address,
        _net_idx: u16,
        app_idx: u16,
        _key: &Key128,
    ) -> MeshResult<Status> {
        let mut state = self.inner.lock().await;
        if state.unavailable {
            return Err(MeshError::Unavailable("Mock stack unavailable".into()));
        }
        state.distributions.push((target, app_idx));
        Ok(state.distribute_status.unwrap_or(Status::SUCCESS))
    }

    async fn bind_capability(
        &self,
        target: Address,
        element: Address,
        app_idx: u16,
        model: ModelId,
    ) -> MeshResult<Status> {
        let mut state = self.inner.lock().await;
        if state.unavailable {
            return Err(MeshError::Unavailable("Mock stack unavailable".into()));
        }
        state.binds.push(BindCall {
            target,
            element,
            app_idx,
            model,
        });
        Ok(state
            .bind_statuses
            .get(&(element, model))
            .copied()
            .unwrap_or(Status::SUCCESS))
    }

    async fn get_composition(&self, target: Address, _page: u8) -> MeshResult<Composition> {
        let state = self.inner.lock().await;
        if state.unavailable {
            return Err(MeshError::Unavailable("Mock stack unavailable".into()));
        }
        state
            .compositions
            .get(&target)
            .cloned()
            .ok_or_else(|| MeshError::Timeout("get_composition".into()))
    }
}
