//! Domain types for mesh provisioning

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use uuid::Uuid;

use crate::core::error::ConfigError;

/// Unicast element address
pub type Address = u16;

/// Lowest valid unicast address
pub const UNICAST_MIN: Address = 0x0001;

/// Highest valid unicast address
pub const UNICAST_MAX: Address = 0x7fff;

/// Returns true for addresses inside the unicast range
pub fn is_unicast(address: Address) -> bool {
    (UNICAST_MIN..=UNICAST_MAX).contains(&address)
}

/// 128-bit key (network, application or device key)
///
/// Serialized as lowercase hex. `Debug` and `Display` never reveal the
/// material, only a short SHA3-256 fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key128([u8; 16]);

impl Key128 {
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First four bytes of SHA3-256 over the key material, hex encoded
    pub fn fingerprint(&self) -> String {
        let digest = Sha3_256::digest(self.0);
        hex::encode(&digest[..4])
    }
}

impl FromStr for Key128 {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|e| ConfigError::InvalidKey(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Key128 {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Key128> for String {
    fn from(key: Key128) -> Self {
        key.to_hex()
    }
}

impl fmt::Debug for Key128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key128(fp={})", self.fingerprint())
    }
}

impl fmt::Display for Key128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fp:{}", self.fingerprint())
    }
}

/// Discovery beacon broadcast by a device that has not been admitted yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateBeacon {
    /// Device UUID advertised in the beacon
    pub uuid: Uuid,
    /// Out-of-band information bitfield
    pub oob_info: u16,
    /// Hash of the advertised URI, if any
    pub uri_hash: Option<u32>,
}

/// Admission completion reported by the mesh stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmittedNode {
    pub net_idx: u16,
    pub uuid: Uuid,
    pub address: Address,
    pub element_count: u8,
    pub device_key: Key128,
}

/// Health fault report received by the local health client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub address: Address,
    pub test_id: u8,
    pub company_id: u16,
    pub faults: Vec<u8>,
}

/// Events delivered by the mesh stack from its callback context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEvent {
    CandidateSeen(CandidateBeacon),
    AdmissionComplete(AdmittedNode),
    HealthStatus(HealthReport),
}

/// Admitted node as recorded in the node directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub uuid: Uuid,
    /// Primary element address
    pub address: Address,
    pub net_idx: u16,
    pub device_key: Key128,
    pub element_count: u8,
    /// Set once after the configuration attempt, never cleared
    pub configured: bool,
}

impl NodeRecord {
    /// Last unicast address occupied by this node's elements
    pub fn last_address(&self) -> Address {
        self.address
            .saturating_add(u16::from(self.element_count.max(1)) - 1)
    }

    /// Returns true if the element ranges of both records intersect
    pub fn overlaps(&self, other: &NodeRecord) -> bool {
        self.address <= other.last_address() && other.address <= self.last_address()
    }
}

impl From<AdmittedNode> for NodeRecord {
    fn from(node: AdmittedNode) -> Self {
        Self {
            uuid: node.uuid,
            address: node.address,
            net_idx: node.net_idx,
            device_key: node.device_key,
            element_count: node.element_count,
            configured: false,
        }
    }
}

/// The single application key of the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationKeyRecord {
    pub app_idx: u16,
    pub net_idx: u16,
    pub key: Key128,
}

/// Network key the directory was created with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub net_idx: u16,
    pub key: Key128,
}

/// Capability (model) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelId {
    Sig(u16),
    Vendor { company: u16, id: u16 },
}

impl ModelId {
    pub const CFG_SRV: ModelId = ModelId::Sig(0x0000);
    pub const CFG_CLI: ModelId = ModelId::Sig(0x0001);
    pub const HEALTH_CLI: ModelId = ModelId::Sig(0x0003);

    /// Configuration models manage keys themselves and never get app key bindings
    pub fn is_configuration(&self) -> bool {
        *self == Self::CFG_SRV || *self == Self::CFG_CLI
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelId::Sig(id) => write!(f, "{:#06x}", id),
            ModelId::Vendor { company, id } => write!(f, "{:#06x}:{:#06x}", company, id),
        }
    }
}

/// Configuration status code returned by a remote configuration server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(pub u8);

impl Status {
    pub const SUCCESS: Status = Status(0x00);

    pub fn is_success(&self) -> bool {
        self.0 == 0
    }

    fn name(&self) -> Option<&'static str> {
        let name = match self.0 {
            0x00 => "success",
            0x01 => "invalid address",
            0x02 => "invalid model",
            0x03 => "invalid appkey index",
            0x04 => "invalid netkey index",
            0x05 => "insufficient resources",
            0x06 => "key index already stored",
            0x07 => "invalid publish parameters",
            0x08 => "not a subscribe model",
            0x09 => "storage failure",
            0x0a => "feature not supported",
            0x0b => "cannot update",
            0x0c => "cannot remove",
            0x0d => "cannot bind",
            0x0e => "temporarily unable to change state",
            0x0f => "cannot set",
            0x10 => "unspecified error",
            0x11 => "invalid binding",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{:#04x} ({})", self.0, name),
            None => write!(f, "{:#04x}", self.0),
        }
    }
}

/// Outcome of admitting the provisioner itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfAdmission {
    Admitted,
    AlreadyAdmitted,
}

/// Orchestrator states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionerState {
    Scan,
    AwaitBeacon,
    GateConfirm,
    Admit,
    AwaitComplete,
}

impl fmt::Display for ProvisionerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisionerState::Scan => "scan",
            ProvisionerState::AwaitBeacon => "await_beacon",
            ProvisionerState::GateConfirm => "gate_confirm",
            ProvisionerState::Admit => "admit",
            ProvisionerState::AwaitComplete => "await_complete",
        };
        f.write_str(name)
    }
}
