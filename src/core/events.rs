//! Routing of mesh stack events
//!
//! The router is the only object the mesh backend calls from its callback
//! context. Each event kind writes exactly one designated endpoint and
//! never blocks.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::{
    beacon::BeaconListener,
    handoff::{HandoffReceiver, handoff},
    types::{AdmittedNode, CandidateBeacon, MeshEvent},
};

/// Orchestrator side of the event channels
#[derive(Debug)]
pub struct EventInbox {
    pub beacons: HandoffReceiver<CandidateBeacon>,
    pub admissions: mpsc::UnboundedReceiver<AdmittedNode>,
}

/// Dispatches mesh stack events to their handlers
#[derive(Debug)]
pub struct EventRouter {
    beacons: BeaconListener,
    admissions: mpsc::UnboundedSender<AdmittedNode>,
}

impl EventRouter {
    /// Create a router together with the inbox it feeds
    pub fn new() -> (Self, EventInbox) {
        let (beacon_tx, beacon_rx) = handoff();
        let (admission_tx, admission_rx) = mpsc::unbounded_channel();

        (
            Self {
                beacons: BeaconListener::new(beacon_tx),
                admissions: admission_tx,
            },
            EventInbox {
                beacons: beacon_rx,
                admissions: admission_rx,
            },
        )
    }

    pub fn dispatch(&self, event: MeshEvent) {
        match event {
            MeshEvent::CandidateSeen(beacon) => {
                debug!(uuid = %beacon.uuid, oob_info = beacon.oob_info, "Candidate beacon");
                self.beacons.on_candidate_beacon(beacon);
            }
            MeshEvent::AdmissionComplete(node) => {
                info!(
                    uuid = %node.uuid,
                    address = format_args!("{:#06x}", node.address),
                    elements = node.element_count,
                    "Node admitted"
                );
                if self.admissions.send(node).is_err() {
                    warn!(
                        address = format_args!("{:#06x}", node.address),
                        "Admission dropped, orchestrator is gone"
                    );
                }
            }
            MeshEvent::HealthStatus(report) => {
                info!(
                    address = format_args!("{:#06x}", report.address),
                    company_id = format_args!("{:#06x}", report.company_id),
                    test_id = report.test_id,
                    "Health status: {} faults",
                    report.faults.len()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{HealthReport, Key128};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_events_reach_their_endpoint() {
        let (router, mut inbox) = EventRouter::new();
        let beacon = CandidateBeacon {
            uuid: Uuid::from_u128(0xaa),
            oob_info: 0,
            uri_hash: Some(7),
        };
        let node = AdmittedNode {
            net_idx: 0,
            uuid: beacon.uuid,
            address: 0x0002,
            element_count: 2,
            device_key: Key128::new([1; 16]),
        };

        router.dispatch(MeshEvent::CandidateSeen(beacon));
        router.dispatch(MeshEvent::AdmissionComplete(node));
        router.dispatch(MeshEvent::HealthStatus(HealthReport {
            address: 0x0002,
            test_id: 0,
            company_id: 0x05f1,
            faults: vec![],
        }));

        assert_eq!(inbox.beacons.try_take(), Some(beacon));
        assert_eq!(inbox.admissions.try_recv().unwrap(), node);
        assert!(inbox.admissions.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_admissions_are_not_collapsed() {
        let (router, mut inbox) = EventRouter::new();

        for address in [0x0002, 0x0004] {
            router.dispatch(MeshEvent::AdmissionComplete(AdmittedNode {
                net_idx: 0,
                uuid: Uuid::from_u128(u128::from(address)),
                address,
                element_count: 1,
                device_key: Key128::new([0; 16]),
            }));
        }

        assert_eq!(inbox.admissions.try_recv().unwrap().address, 0x0002);
        assert_eq!(inbox.admissions.try_recv().unwrap().address, 0x0004);
    }

    #[test]
    fn test_dispatch_after_inbox_dropped() {
        let (router, inbox) = EventRouter::new();
        drop(inbox);

        router.dispatch(MeshEvent::AdmissionComplete(AdmittedNode {
            net_idx: 0,
            uuid: Uuid::nil(),
            address: 0x0002,
            element_count: 1,
            device_key: Key128::new([0; 16]),
        }));
    }
}
