//! Request message types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::types::{Address, Key128, ModelId};

/// Requests from the provisioner to the mesh stack
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method", content = "params")]
#[serde(rename_all = "snake_case")]
pub enum Request {
    /// Register the local composition
    Initialize(InitializeParams),

    /// Provision the local node
    AdmitSelf(AdmitSelfParams),

    /// Provision a beaconing device
    AdmitRemote(AdmitRemoteParams),

    /// Config AppKey Add
    AddAppKey(AddAppKeyParams),

    /// Config Model App Bind
    BindModel(BindModelParams),

    /// Config Composition Data Get
    GetComposition(GetCompositionParams),
}

impl Request {
    /// Method name as it appears on the wire
    pub fn method(&self) -> &'static str {
        match self {
            Request::Initialize(_) => "initialize",
            Request::AdmitSelf(_) => "admit_self",
            Request::AdmitRemote(_) => "admit_remote",
            Request::AddAppKey(_) => "add_app_key",
            Request::BindModel(_) => "bind_model",
            Request::GetComposition(_) => "get_composition",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InitializeParams {
    /// Hex-encoded composition data page 0
    pub composition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdmitSelfParams {
    pub net_idx: u16,
    pub net_key: Key128,
    pub address: Address,
    pub device_key: Key128,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdmitRemoteParams {
    pub uuid: Uuid,
    pub net_idx: u16,
    /// Attention timer in seconds
    pub attention: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddAppKeyParams {
    pub target: Address,
    pub net_idx: u16,
    pub app_idx: u16,
    pub app_key: Key128,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BindModelParams {
    pub target: Address,
    pub element: Address,
    pub app_idx: u16,
    pub model: u16,
    /// Company identifier for vendor models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<u16>,
}

impl BindModelParams {
    pub fn new(target: Address, element: Address, app_idx: u16, model: ModelId) -> Self {
        let (company, model) = match model {
            ModelId::Sig(id) => (None, id),
            ModelId::Vendor { company, id } => (Some(company), id),
        };

        Self {
            target,
            element,
            app_idx,
            model,
            company,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetCompositionParams {
    pub target: Address,
    pub page: u8,
}
