//! Main provisioning service facade

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    backend::MeshBackend,
    core::{
        composition::Composition,
        directory::{Attach, NodeDirectory},
        error::ServiceResult,
        events::EventRouter,
        handoff::handoff,
        input::{OperatorInput, auto_admit_flag},
        provisioner::{OrchestratorContext, Provisioner, ProvisionerConfig},
        types::{NodeRecord, SelfAdmission},
    },
    peripheral::Indicator,
    storage::DirectoryStorage,
};

/// Main provisioning service facade
///
/// Brings the mesh stack, the directory and the provisioner's own node into
/// a known state and hands out the orchestrator and the operator input.
pub struct ProvisioningService<B: MeshBackend> {
    backend: Arc<B>,
    config: ProvisionerConfig,
}

/// Components of a bootstrapped service
pub struct RunningService<B: MeshBackend, S: DirectoryStorage> {
    pub provisioner: Provisioner<B, S>,
    pub input: OperatorInput,
}

impl<B: MeshBackend> ProvisioningService<B> {
    /// Create a new provisioning service
    pub fn new(backend: Arc<B>, config: ProvisionerConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Run the bootstrap sequence
    ///
    /// Any failure here is fatal for the service.
    pub async fn start<S: DirectoryStorage>(
        &self,
        storage: S,
        indicator: Option<Arc<dyn Indicator>>,
    ) -> ServiceResult<RunningService<B, S>> {
        let config = &self.config;
        let composition = Composition::provisioner();

        let (router, inbox) = EventRouter::new();
        self.backend
            .initialize(&composition, Arc::new(router))
            .await?;
        info!("Mesh stack initialized");

        let mut directory = NodeDirectory::open(storage).await?;
        match directory
            .create_or_attach(config.net_idx, config.net_key)
            .await?
        {
            Attach::Created => info!(net_idx = config.net_idx, "Created new node directory"),
            Attach::Attached => info!(
                net_idx = config.net_idx,
                nodes = directory.nodes().count(),
                "Attached to existing node directory"
            ),
        }

        let app_key = directory
            .ensure_app_key(config.app_idx, config.app_key)
            .await?;
        if app_key.key != config.app_key || app_key.app_idx != config.app_idx {
            warn!(
                app_idx = app_key.app_idx,
                key = %app_key.key,
                "Keeping stored application key, configured key ignored"
            );
        }

        match self
            .backend
            .admit_self(
                config.net_idx,
                &config.net_key,
                config.self_address,
                &config.self_device_key,
            )
            .await?
        {
            SelfAdmission::Admitted => info!(
                address = format_args!("{:#06x}", config.self_address),
                "Provisioner node admitted"
            ),
            SelfAdmission::AlreadyAdmitted => info!(
                address = format_args!("{:#06x}", config.self_address),
                "Provisioner node already admitted"
            ),
        }

        if directory.node(config.self_address).is_none() {
            directory
                .add_node(NodeRecord {
                    uuid: config.self_uuid,
                    address: config.self_address,
                    net_idx: config.net_idx,
                    device_key: config.self_device_key,
                    element_count: u8::try_from(composition.elements.len()).unwrap_or(u8::MAX),
                    configured: false,
                })
                .await?;
        }

        let (switch, flag) = auto_admit_flag(config.auto_admit);
        let (confirm_tx, confirm_rx) = handoff();
        let input = OperatorInput::new(switch, indicator, confirm_tx);

        let context = OrchestratorContext::new(inbox, confirm_rx, flag, config.self_address);
        let provisioner = Provisioner::new(self.backend.clone(), directory, context, config);

        info!(
            auto_admit = config.auto_admit,
            "Provisioning service started"
        );

        Ok(RunningService { provisioner, input })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::MockMeshBackend,
        core::{
            error::{DirectoryError, ServiceError},
            input::tests::RecordingIndicator,
            provisioner::CycleOutcome,
            types::{Key128, ModelId},
        },
        storage::MemoryStorage,
    };
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn test_self_bootstrap() {
        let backend = Arc::new(MockMeshBackend::new());
        let storage = MemoryStorage::new();
        let service = ProvisioningService::new(backend.clone(), ProvisionerConfig::default());

        let RunningService {
            mut provisioner, ..
        } = service.start(storage.clone(), None).await.unwrap();

        assert_eq!(
            backend.local_composition().await,
            Some(Composition::provisioner())
        );
        assert!(!provisioner.directory().node(0x0001).unwrap().configured);

        assert_eq!(provisioner.run_cycle().await, CycleOutcome::NoCandidate);

        let snapshot = storage.stored().await.unwrap();
        assert!(snapshot.nodes[&0x0001].configured);
        assert_eq!(snapshot.app_key.unwrap().key, ProvisionerConfig::default().app_key);

        let binds = backend.binds().await;
        assert_eq!(binds.len(), 1);
        assert_eq!(binds[0].model, ModelId::HEALTH_CLI);
    }

    #[tokio::test]
    async fn test_restart_reuses_directory() {
        let backend = Arc::new(MockMeshBackend::new());
        let storage = MemoryStorage::new();
        let service = ProvisioningService::new(backend.clone(), ProvisionerConfig::default());

        let first = service.start(storage.clone(), None).await.unwrap();
        let stored = storage.stored().await;
        drop(first);

        // a different configured app key must not replace the stored one
        let config = ProvisionerConfig {
            app_key: Key128::new([0x55; 16]),
            ..ProvisionerConfig::default()
        };
        let service = ProvisioningService::new(backend, config);
        let second = service.start(storage.clone(), None).await.unwrap();

        assert_eq!(storage.stored().await, stored);
        assert_eq!(
            second.provisioner.directory().app_key().unwrap().key,
            ProvisionerConfig::default().app_key
        );
        assert_eq!(second.provisioner.directory().nodes().count(), 1);
    }

    #[tokio::test]
    async fn test_network_key_mismatch_is_fatal() {
        let backend = Arc::new(MockMeshBackend::new());
        let storage = MemoryStorage::new();
        ProvisioningService::new(backend.clone(), ProvisionerConfig::default())
            .start(storage.clone(), None)
            .await
            .unwrap();

        let config = ProvisionerConfig {
            net_key: Key128::new([0x01; 16]),
            ..ProvisionerConfig::default()
        };
        let result = ProvisioningService::new(backend, config)
            .start(storage, None)
            .await;

        assert!(matches!(
            result,
            Err(ServiceError::Directory(DirectoryError::NetworkKeyMismatch))
        ));
    }

    #[tokio::test]
    async fn test_indicator_follows_initial_mode() {
        let backend = Arc::new(MockMeshBackend::new());
        let indicator = Arc::new(RecordingIndicator::default());
        let config = ProvisionerConfig {
            auto_admit: true,
            ..ProvisionerConfig::default()
        };

        let running = ProvisioningService::new(backend, config)
            .start(
                MemoryStorage::new(),
                Some(indicator.clone() as Arc<dyn Indicator>),
            )
            .await
            .unwrap();

        assert_eq!(indicator.last(), Some(true));
        assert!(!running.input.on_edge());
        assert_eq!(indicator.last(), Some(false));
    }
}
