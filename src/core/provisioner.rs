//! Provisioning orchestrator with state machine
//!
//! One cycle runs `SCAN -> AWAIT_BEACON -> [GATE_CONFIRM] -> ADMIT ->
//! AWAIT_COMPLETE` and always returns to `SCAN`. Every wait is bounded.

use std::{sync::Arc, time::Duration};

use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    backend::MeshBackend,
    core::{
        configurator::NodeConfigurator,
        directory::NodeDirectory,
        error::DirectoryError,
        events::EventInbox,
        handoff::HandoffReceiver,
        input::AutoAdmitFlag,
        types::{Address, AdmittedNode, Key128, ProvisionerState},
    },
    storage::DirectoryStorage,
};

/// Network key used when none is configured
pub const DEFAULT_NET_KEY: Key128 = Key128::new([
    0x12, 0x34, 0x56, 0x78, 0x90, 0xab, 0xcd, 0xef, 0x12, 0x34, 0x56, 0x78, 0x90, 0xab, 0xcd, 0xef,
]);

/// Application key used when none is configured
pub const DEFAULT_APP_KEY: Key128 = Key128::new([
    0xfe, 0xdc, 0xba, 0x09, 0x87, 0x65, 0x43, 0x21, 0xfe, 0xdc, 0xba, 0x09, 0x87, 0x65, 0x43, 0x21,
]);

/// Device key of the provisioner's own node
pub const DEFAULT_SELF_DEVICE_KEY: Key128 = Key128::new([
    0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99,
]);

/// UUID the provisioner's own node is recorded under
pub const DEFAULT_SELF_UUID: Uuid = Uuid::from_u128(0xdddd0000_0000_0000_0000_000000000000);

/// Bounded waits of one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Wait for a candidate beacon
    pub scan: Duration,
    /// Wait for the operator to confirm a candidate
    pub confirm: Duration,
    /// Wait for the admission to complete
    pub complete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            scan: Duration::from_secs(5),
            confirm: Duration::from_secs(30),
            complete: Duration::from_secs(10),
        }
    }
}

/// Static configuration of the provisioner
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub net_idx: u16,
    pub net_key: Key128,
    pub app_idx: u16,
    pub app_key: Key128,
    pub self_address: Address,
    pub self_device_key: Key128,
    pub self_uuid: Uuid,
    /// Initial auto-admit mode
    pub auto_admit: bool,
    /// Attention timer sent with every admission, in seconds
    pub attention: u8,
    pub timeouts: Timeouts,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            net_idx: 0,
            net_key: DEFAULT_NET_KEY,
            app_idx: 0,
            app_key: DEFAULT_APP_KEY,
            self_address: 0x0001,
            self_device_key: DEFAULT_SELF_DEVICE_KEY,
            self_uuid: DEFAULT_SELF_UUID,
            auto_admit: false,
            attention: 0,
            timeouts: Timeouts::default(),
        }
    }
}

/// Orchestrator-owned ends of every handoff
#[derive(Debug)]
pub struct OrchestratorContext {
    pub inbox: EventInbox,
    pub confirm: HandoffReceiver<()>,
    pub auto_admit: AutoAdmitFlag,
    pub self_address: Address,
    /// Primary address of the most recent observed admission
    pub last_admitted_address: Option<Address>,
}

impl OrchestratorContext {
    pub fn new(
        inbox: EventInbox,
        confirm: HandoffReceiver<()>,
        auto_admit: AutoAdmitFlag,
        self_address: Address,
    ) -> Self {
        Self {
            inbox,
            confirm,
            auto_admit,
            self_address,
            last_admitted_address: None,
        }
    }
}

/// How one cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No beacon within the scan window
    NoCandidate,
    /// The operator did not confirm the candidate in time
    ConfirmationTimedOut(Uuid),
    /// The mesh stack refused the admission request
    AdmissionRejected(Uuid),
    /// Admission was submitted; `address` is set if completion was observed
    Admitted {
        uuid: Uuid,
        address: Option<Address>,
    },
}

/// Provisioning orchestrator
pub struct Provisioner<B: MeshBackend, S: DirectoryStorage> {
    backend: Arc<B>,
    directory: NodeDirectory<S>,
    configurator: NodeConfigurator<B>,
    context: OrchestratorContext,
    net_idx: u16,
    attention: u8,
    timeouts: Timeouts,
    state: ProvisionerState,
}

impl<B: MeshBackend, S: DirectoryStorage> Provisioner<B, S> {
    pub fn new(
        backend: Arc<B>,
        directory: NodeDirectory<S>,
        context: OrchestratorContext,
        config: &ProvisionerConfig,
    ) -> Self {
        Self {
            configurator: NodeConfigurator::new(backend.clone(), context.self_address),
            backend,
            directory,
            context,
            net_idx: config.net_idx,
            attention: config.attention,
            timeouts: config.timeouts,
            state: ProvisionerState::Scan,
        }
    }

    pub fn state(&self) -> ProvisionerState {
        self.state
    }

    pub fn directory(&self) -> &NodeDirectory<S> {
        &self.directory
    }

    pub fn last_admitted_address(&self) -> Option<Address> {
        self.context.last_admitted_address
    }

    /// Run cycles forever
    pub async fn run(&mut self) {
        info!("Provisioner running");
        loop {
            let outcome = self.run_cycle().await;
            debug!(?outcome, "Cycle finished");
        }
    }

    /// Run one full cycle starting at SCAN
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.enter(ProvisionerState::Scan);
        self.context.inbox.beacons.clear();
        self.drain_admissions().await;
        self.configurator
            .configure_pending(&mut self.directory)
            .await;

        self.enter(ProvisionerState::AwaitBeacon);
        let Some(beacon) = self
            .context
            .inbox
            .beacons
            .recv_timeout(self.timeouts.scan)
            .await
        else {
            return CycleOutcome::NoCandidate;
        };
        let uuid = beacon.uuid;
        info!(%uuid, oob_info = beacon.oob_info, "Candidate found");

        if !self.context.auto_admit.get() {
            self.enter(ProvisionerState::GateConfirm);
            self.context.confirm.clear();
            info!(%uuid, "Waiting for operator confirmation");

            if self
                .context
                .confirm
                .recv_timeout(self.timeouts.confirm)
                .await
                .is_none()
            {
                info!(%uuid, "Confirmation timed out, candidate discarded");
                return CycleOutcome::ConfirmationTimedOut(uuid);
            }
        }

        self.enter(ProvisionerState::Admit);
        if let Err(e) = self
            .backend
            .admit_remote(&uuid, self.net_idx, self.attention)
            .await
        {
            warn!(%uuid, "Admission request failed: {}", e);
            return CycleOutcome::AdmissionRejected(uuid);
        }

        self.enter(ProvisionerState::AwaitComplete);
        let address = self.await_completion(uuid).await;

        CycleOutcome::Admitted { uuid, address }
    }

    /// Wait for the completion of `uuid`, recording every completion seen
    async fn await_completion(&mut self, uuid: Uuid) -> Option<Address> {
        let deadline = Instant::now() + self.timeouts.complete;

        loop {
            match timeout_at(deadline, self.context.inbox.admissions.recv()).await {
                Ok(Some(node)) => {
                    let address = node.address;
                    self.record(node).await;
                    if node.uuid == uuid {
                        self.context.last_admitted_address = Some(address);
                        return Some(address);
                    }
                }
                Ok(None) => {
                    warn!("Event router gone, no completions will arrive");
                    return None;
                }
                Err(_) => {
                    info!(%uuid, "Admission completion not observed in time");
                    return None;
                }
            }
        }
    }

    async fn drain_admissions(&mut self) {
        while let Ok(node) = self.context.inbox.admissions.try_recv() {
            self.record(node).await;
        }
    }

    async fn record(&mut self, node: AdmittedNode) {
        match self.directory.add_node(node.into()).await {
            Ok(()) => {}
            Err(DirectoryError::Storage(e)) => warn!(
                uuid = %node.uuid,
                address = format_args!("{:#06x}", node.address),
                "Admitted node recorded, persisting failed: {}", e
            ),
            Err(e) => warn!(
                uuid = %node.uuid,
                address = format_args!("{:#06x}", node.address),
                "Admitted node not recorded: {}", e
            ),
        }
    }

    fn enter(&mut self, state: ProvisionerState) {
        debug!(from = %self.state, to = %state, "State transition");
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{MockMeshBackend, mock_backend::MOCK_DEVICE_KEY},
        core::{
            composition::Composition,
            events::EventRouter,
            handoff::handoff,
            input::{OperatorInput, auto_admit_flag},
            types::{CandidateBeacon, MeshEvent},
        },
        storage::MemoryStorage,
    };
    use pretty_assertions::assert_eq;
    use tokio::time::sleep;

    struct Harness {
        provisioner: Provisioner<MockMeshBackend, MemoryStorage>,
        backend: Arc<MockMeshBackend>,
        storage: MemoryStorage,
        input: OperatorInput,
    }

    async fn harness(auto_admit: bool) -> Harness {
        let config = ProvisionerConfig::default();
        let backend = Arc::new(MockMeshBackend::new());
        let (router, inbox) = EventRouter::new();
        backend
            .initialize(&Composition::provisioner(), Arc::new(router))
            .await
            .unwrap();

        let storage = MemoryStorage::new();
        let mut directory = NodeDirectory::open(storage.clone()).await.unwrap();
        directory
            .create_or_attach(config.net_idx, config.net_key)
            .await
            .unwrap();
        directory
            .ensure_app_key(config.app_idx, config.app_key)
            .await
            .unwrap();

        let (switch, flag) = auto_admit_flag(auto_admit);
        let (confirm_tx, confirm_rx) = handoff();
        let input = OperatorInput::new(switch, None, confirm_tx);
        let context = OrchestratorContext::new(inbox, confirm_rx, flag, config.self_address);

        Harness {
            provisioner: Provisioner::new(backend.clone(), directory, context, &config),
            backend,
            storage,
            input,
        }
    }

    fn beacon(id: u128) -> MeshEvent {
        MeshEvent::CandidateSeen(CandidateBeacon {
            uuid: Uuid::from_u128(id),
            oob_info: 0,
            uri_hash: None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_candidate_after_scan_window() {
        let Harness {
            mut provisioner, ..
        } = harness(true).await;
        let start = Instant::now();

        assert_eq!(provisioner.run_cycle().await, CycleOutcome::NoCandidate);
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert_eq!(provisioner.state(), ProvisionerState::AwaitBeacon);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_admit_skips_confirmation() {
        let Harness {
            mut provisioner,
            backend,
            ..
        } = harness(true).await;
        backend.complete_admissions(0x0002, 1).await;

        let (outcome, ()) = tokio::join!(provisioner.run_cycle(), async {
            sleep(Duration::from_secs(1)).await;
            backend.emit(beacon(0xa)).await;
        });

        assert_eq!(
            outcome,
            CycleOutcome::Admitted {
                uuid: Uuid::from_u128(0xa),
                address: Some(0x0002),
            }
        );
        assert_eq!(backend.admissions().await, vec![Uuid::from_u128(0xa)]);
        assert_eq!(provisioner.last_admitted_address(), Some(0x0002));
        let node = provisioner.directory().node(0x0002).unwrap();
        assert_eq!(node.device_key, MOCK_DEVICE_KEY);
        assert!(!node.configured);

        // the next SCAN configures the new node
        assert_eq!(provisioner.run_cycle().await, CycleOutcome::NoCandidate);
        assert!(provisioner.directory().node(0x0002).unwrap().configured);
        assert_eq!(backend.distributions().await, vec![(0x0002, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_timeout_discards_candidate() {
        let Harness {
            mut provisioner,
            backend,
            ..
        } = harness(false).await;
        let start = Instant::now();

        let (outcome, ()) = tokio::join!(provisioner.run_cycle(), async {
            sleep(Duration::from_secs(1)).await;
            backend.emit(beacon(0xb)).await;
        });

        assert_eq!(
            outcome,
            CycleOutcome::ConfirmationTimedOut(Uuid::from_u128(0xb))
        );
        assert!(start.elapsed() >= Duration::from_secs(31));
        assert!(backend.admissions().await.is_empty());

        // without a fresh beacon the candidate is not retried
        assert_eq!(provisioner.run_cycle().await, CycleOutcome::NoCandidate);
        assert!(backend.admissions().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_operator_edge_confirms_candidate() {
        let Harness {
            mut provisioner,
            backend,
            input,
            ..
        } = harness(false).await;
        backend.complete_admissions(0x0002, 1).await;

        let (outcome, ()) = tokio::join!(provisioner.run_cycle(), async {
            sleep(Duration::from_secs(1)).await;
            backend.emit(beacon(0xc)).await;
            sleep(Duration::from_secs(10)).await;
            input.on_edge();
        });

        assert_eq!(
            outcome,
            CycleOutcome::Admitted {
                uuid: Uuid::from_u128(0xc),
                address: Some(0x0002),
            }
        );
        // the confirming edge also switched auto-admit on
        assert!(input.auto_admit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edge_before_candidate_does_not_confirm() {
        let Harness {
            mut provisioner,
            backend,
            input,
            ..
        } = harness(false).await;

        // toggle twice so auto-admit stays off, leaving a stale notification
        input.on_edge();
        input.on_edge();

        let (outcome, ()) = tokio::join!(provisioner.run_cycle(), async {
            sleep(Duration::from_secs(1)).await;
            backend.emit(beacon(0xd)).await;
        });

        assert_eq!(
            outcome,
            CycleOutcome::ConfirmationTimedOut(Uuid::from_u128(0xd))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_admission() {
        let Harness {
            mut provisioner,
            backend,
            ..
        } = harness(true).await;
        backend.set_admit_failure(true).await;

        let (outcome, ()) = tokio::join!(provisioner.run_cycle(), async {
            sleep(Duration::from_secs(1)).await;
            backend.emit(beacon(0xe)).await;
        });

        assert_eq!(
            outcome,
            CycleOutcome::AdmissionRejected(Uuid::from_u128(0xe))
        );
        assert_eq!(provisioner.state(), ProvisionerState::Admit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_completion_recorded_next_cycle() {
        let Harness {
            mut provisioner,
            backend,
            ..
        } = harness(true).await;
        let uuid = Uuid::from_u128(0xf);

        let (outcome, ()) = tokio::join!(provisioner.run_cycle(), async {
            sleep(Duration::from_secs(1)).await;
            backend.emit(beacon(0xf)).await;
            sleep(Duration::from_secs(20)).await;
            backend
                .emit(MeshEvent::AdmissionComplete(AdmittedNode {
                    net_idx: 0,
                    uuid,
                    address: 0x0005,
                    element_count: 2,
                    device_key: MOCK_DEVICE_KEY,
                }))
                .await;
        });

        assert_eq!(
            outcome,
            CycleOutcome::Admitted {
                uuid,
                address: None
            }
        );
        assert!(provisioner.directory().node(0x0005).is_none());
        assert_eq!(provisioner.last_admitted_address(), None);

        assert_eq!(provisioner.run_cycle().await, CycleOutcome::NoCandidate);
        let node = provisioner.directory().node(0x0005).unwrap();
        assert_eq!(node.element_count, 2);
        assert!(node.configured);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_beacon_wins() {
        let Harness {
            mut provisioner,
            backend,
            ..
        } = harness(true).await;

        let (outcome, ()) = tokio::join!(provisioner.run_cycle(), async {
            sleep(Duration::from_secs(1)).await;
            backend.emit(beacon(0x1)).await;
            backend.emit(beacon(0x2)).await;
        });

        assert_eq!(
            outcome,
            CycleOutcome::Admitted {
                uuid: Uuid::from_u128(0x2),
                address: None
            }
        );
        assert_eq!(backend.admissions().await, vec![Uuid::from_u128(0x2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_beacons_each_attempted() {
        let Harness {
            mut provisioner,
            backend,
            ..
        } = harness(true).await;
        backend.complete_admissions(0x0002, 1).await;

        for id in 1..=3u128 {
            let (outcome, ()) = tokio::join!(provisioner.run_cycle(), async {
                sleep(Duration::from_secs(1)).await;
                backend.emit(beacon(id)).await;
            });
            assert!(matches!(outcome, CycleOutcome::Admitted { .. }));
        }

        assert_eq!(
            backend.admissions().await,
            vec![Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)]
        );
        assert!(provisioner.directory().node(0x0004).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unpersisted_admission_stays_recorded() {
        let Harness {
            mut provisioner,
            backend,
            storage,
            ..
        } = harness(true).await;
        backend.complete_admissions(0x0002, 1).await;
        storage.set_save_failure(true).await;

        let (outcome, ()) = tokio::join!(provisioner.run_cycle(), async {
            sleep(Duration::from_secs(1)).await;
            backend.emit(beacon(0xa)).await;
        });

        assert!(matches!(
            outcome,
            CycleOutcome::Admitted {
                address: Some(0x0002),
                ..
            }
        ));
        assert!(provisioner.directory().node(0x0002).is_some());
        assert!(storage.stored().await.unwrap().nodes.is_empty());
    }

    #[test]
    fn test_default_keys() {
        assert_eq!(
            DEFAULT_NET_KEY.to_hex(),
            "1234567890abcdef1234567890abcdef"
        );
        assert_eq!(
            DEFAULT_APP_KEY.to_hex(),
            "fedcba0987654321fedcba0987654321"
        );
        assert_eq!(
            DEFAULT_SELF_DEVICE_KEY.to_hex(),
            "aabbccddeeff00112233445566778899"
        );
        assert_eq!(
            DEFAULT_SELF_UUID.to_string(),
            "dddd0000-0000-0000-0000-000000000000"
        );
    }
}
