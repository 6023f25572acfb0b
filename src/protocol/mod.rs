//! Mesh stack bridge message definitions

pub mod jsonrpc;
pub mod notification;
pub mod request;
pub mod response;

pub use {
    jsonrpc::{
        IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
        RequestId,
    },
    notification::Notification,
    request::{
        AddAppKeyParams, AdmitRemoteParams, AdmitSelfParams, BindModelParams,
        GetCompositionParams, InitializeParams, Request,
    },
    response::{AdmitSelfResponse, CompositionResponse, ConfigStatusResponse},
};
