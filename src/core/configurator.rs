//! Node configuration service
//!
//! Distributes the application key to a freshly admitted node and binds it
//! to the node's capabilities. Configuration is best effort: every remote
//! status is logged, nothing is retried, and the node is marked configured
//! after one attempt.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    backend::MeshBackend,
    core::{
        composition::Composition,
        directory::NodeDirectory,
        error::{DirectoryError, MeshError, MeshResult, ServiceResult},
        types::{Address, ApplicationKeyRecord, ModelId, NodeRecord, Status},
    },
    storage::DirectoryStorage,
};

/// Outcome of binding the application key to one model
#[derive(Debug, Clone)]
pub struct BindOutcome {
    pub element: Address,
    pub model: ModelId,
    pub result: MeshResult<Status>,
}

impl BindOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.result, Ok(status) if status.is_success())
    }
}

/// Everything that happened while configuring one node
#[derive(Debug, Clone)]
pub struct ConfigurationReport {
    pub address: Address,
    pub key: MeshResult<Status>,
    /// Set when the composition could not be fetched and no binds were tried
    pub composition_error: Option<MeshError>,
    pub binds: Vec<BindOutcome>,
}

impl ConfigurationReport {
    /// Number of sub-steps that did not report success
    pub fn failures(&self) -> usize {
        let key = usize::from(!matches!(self.key, Ok(status) if status.is_success()));
        let composition = usize::from(self.composition_error.is_some());
        let binds = self.binds.iter().filter(|b| !b.succeeded()).count();
        key + composition + binds
    }
}

/// Configures nodes recorded in the directory
pub struct NodeConfigurator<B: MeshBackend> {
    backend: Arc<B>,
    self_address: Address,
}

impl<B: MeshBackend> NodeConfigurator<B> {
    pub fn new(backend: Arc<B>, self_address: Address) -> Self {
        Self {
            backend,
            self_address,
        }
    }

    /// Configure the node at `address` and mark it configured
    ///
    /// Returns `None` when the node was configured before. Fails without
    /// touching the node when the directory has no application key or does
    /// not know the address.
    pub async fn configure<S: DirectoryStorage>(
        &self,
        directory: &mut NodeDirectory<S>,
        address: Address,
    ) -> ServiceResult<Option<ConfigurationReport>> {
        let app_key = *directory
            .app_key()
            .ok_or(DirectoryError::NoApplicationKey)?;
        let node = directory
            .node(address)
            .cloned()
            .ok_or(DirectoryError::UnknownNode(address))?;

        if node.configured {
            debug!(
                address = format_args!("{:#06x}", address),
                "Node already configured"
            );
            return Ok(None);
        }

        let report = if address == self.self_address {
            self.configure_self(&app_key).await
        } else {
            self.configure_remote(&node, &app_key).await
        };

        match directory.mark_configured(address).await {
            Ok(_) => {}
            // the flag is set in memory, the next successful save carries it
            Err(DirectoryError::Storage(e)) => warn!(
                address = format_args!("{:#06x}", address),
                "Node configured, persisting failed: {}", e
            ),
            Err(e) => return Err(e.into()),
        }
        info!(
            address = format_args!("{:#06x}", address),
            binds = report.binds.len(),
            failures = report.failures(),
            "Node configured"
        );

        Ok(Some(report))
    }

    /// Configure every unconfigured node in ascending address order
    ///
    /// Nodes that cannot be configured are logged and left for a later pass.
    pub async fn configure_pending<S: DirectoryStorage>(
        &self,
        directory: &mut NodeDirectory<S>,
    ) -> Vec<ConfigurationReport> {
        let mut reports = Vec::new();

        for address in directory.unconfigured() {
            match self.configure(directory, address).await {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(e) => warn!(
                    address = format_args!("{:#06x}", address),
                    "Configuration skipped: {}", e
                ),
            }
        }

        reports
    }

    /// The provisioner itself only needs the key on its health client
    async fn configure_self(&self, app_key: &ApplicationKeyRecord) -> ConfigurationReport {
        let address = self.self_address;
        let key = self.distribute(address, app_key).await;
        let bind = self.bind(address, address, app_key, ModelId::HEALTH_CLI).await;

        ConfigurationReport {
            address,
            key,
            composition_error: None,
            binds: vec![bind],
        }
    }

    async fn configure_remote(
        &self,
        node: &NodeRecord,
        app_key: &ApplicationKeyRecord,
    ) -> ConfigurationReport {
        let address = node.address;
        let key = self.distribute(address, app_key).await;

        let composition = match self.backend.get_composition(address, 0).await {
            Ok(composition) => composition,
            Err(e) => {
                warn!(
                    address = format_args!("{:#06x}", address),
                    "Composition unavailable, no bindings: {}", e
                );
                return ConfigurationReport {
                    address,
                    key,
                    composition_error: Some(e),
                    binds: Vec::new(),
                };
            }
        };
        log_composition(address, &composition);

        let mut binds = Vec::new();
        for (element, model) in composition.bindable_models(address) {
            binds.push(self.bind(address, element, app_key, model).await);
        }

        ConfigurationReport {
            address,
            key,
            composition_error: None,
            binds,
        }
    }

    async fn distribute(
        &self,
        target: Address,
        app_key: &ApplicationKeyRecord,
    ) -> MeshResult<Status> {
        let result = self
            .backend
            .distribute_key(target, app_key.net_idx, app_key.app_idx, &app_key.key)
            .await;

        match &result {
            Ok(status) if status.is_success() => debug!(
                address = format_args!("{:#06x}", target),
                app_idx = app_key.app_idx,
                "Application key added"
            ),
            Ok(status) => warn!(
                address = format_args!("{:#06x}", target),
                app_idx = app_key.app_idx,
                %status,
                "Application key add failed"
            ),
            Err(e) => warn!(
                address = format_args!("{:#06x}", target),
                app_idx = app_key.app_idx,
                "Application key add failed: {}", e
            ),
        }

        result
    }

    async fn bind(
        &self,
        target: Address,
        element: Address,
        app_key: &ApplicationKeyRecord,
        model: ModelId,
    ) -> BindOutcome {
        let result = self
            .backend
            .bind_capability(target, element, app_key.app_idx, model)
            .await;

        match &result {
            Ok(status) if status.is_success() => debug!(
                address = format_args!("{:#06x}", element),
                %model,
                "Model bound"
            ),
            Ok(status) => warn!(
                address = format_args!("{:#06x}", element),
                %model,
                %status,
                "Model bind failed"
            ),
            Err(e) => warn!(
                address = format_args!("{:#06x}", element),
                %model,
                "Model bind failed: {}", e
            ),
        }

        BindOutcome {
            element,
            model,
            result,
        }
    }
}

fn log_composition(address: Address, composition: &Composition) {
    debug!(
        address = format_args!("{:#06x}", address),
        company_id = format_args!("{:#06x}", composition.company_id),
        product_id = format_args!("{:#06x}", composition.product_id),
        elements = composition.elements.len(),
        "Composition received"
    );
}
