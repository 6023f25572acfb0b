//! Notification message types (mesh stack to provisioner events)

use serde::{Deserialize, Serialize};

use crate::core::types::{AdmittedNode, CandidateBeacon, HealthReport, MeshEvent};

/// Mesh stack notifications
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method", content = "params")]
#[serde(rename_all = "snake_case")]
pub enum Notification {
    /// Unprovisioned device beacon received
    UnprovisionedBeacon(CandidateBeacon),

    /// Provisioning of a remote node completed
    NodeAdded(AdmittedNode),

    /// Health Current Status received by the health client
    HealthCurrentStatus(HealthReport),
}

impl From<Notification> for MeshEvent {
    fn from(notification: Notification) -> Self {
        match notification {
            Notification::UnprovisionedBeacon(beacon) => MeshEvent::CandidateSeen(beacon),
            Notification::NodeAdded(node) => MeshEvent::AdmissionComplete(node),
            Notification::HealthCurrentStatus(report) => MeshEvent::HealthStatus(report),
        }
    }
}
