//! Mesh stack daemon backend (JSON-RPC 2.0 over a Unix socket)

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};
use tokio::{
    net::UnixStream,
    sync::{Mutex, oneshot, watch},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    backend::MeshBackend,
    core::{
        composition::Composition,
        error::{MeshError, MeshResult},
        events::EventRouter,
        types::{Address, Key128, ModelId, SelfAdmission, Status},
    },
    protocol::{
        AddAppKeyParams, AdmitRemoteParams, AdmitSelfParams, AdmitSelfResponse, BindModelParams,
        CompositionResponse, ConfigStatusResponse, GetCompositionParams, IncomingMessage,
        InitializeParams, JsonRpcError, JsonRpcRequest, Request, RequestId,
    },
    transport::unix_socket::{SessionReader, SessionWriter},
};

type PendingMap = HashMap<RequestId, oneshot::Sender<Result<Value, JsonRpcError>>>;

/// Pending requests plus the closed flag, updated under one lock
struct Pending {
    requests: Mutex<PendingMap>,
    closed: watch::Sender<bool>,
}

/// Backend talking to the mesh stack daemon
///
/// Requests are matched to responses by id. Notifications are translated
/// into [`crate::core::types::MeshEvent`]s and handed to the router
/// registered by `initialize`; anything arriving earlier is dropped.
pub struct RpcMeshBackend {
    writer: SessionWriter,
    next_id: AtomicI64,
    pending: Arc<Pending>,
    events: Arc<OnceLock<Arc<EventRouter>>>,
    closed: watch::Receiver<bool>,
    request_timeout: Duration,
    reader_task: JoinHandle<()>,
}

impl RpcMeshBackend {
    /// Connect to the daemon socket at `path`
    pub async fn connect(path: impl AsRef<Path>, request_timeout: Duration) -> MeshResult<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).await.map_err(|e| {
            MeshError::Unavailable(format!("Failed to connect to {}: {}", path.display(), e))
        })?;
        info!("Connected to mesh stack at {}", path.display());

        Ok(Self::from_stream(stream, request_timeout))
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: UnixStream, request_timeout: Duration) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (closed_tx, closed_rx) = watch::channel(false);

        let pending = Arc::new(Pending {
            requests: Mutex::new(HashMap::new()),
            closed: closed_tx,
        });
        let events = Arc::new(OnceLock::new());

        let reader_task = tokio::spawn(read_loop(
            SessionReader::new(read_half),
            pending.clone(),
            events.clone(),
        ));

        Self {
            writer: SessionWriter::new(write_half),
            next_id: AtomicI64::new(1),
            pending,
            events,
            closed: closed_rx,
            request_timeout,
            reader_task,
        }
    }

    /// Resolves once the daemon connection is gone
    pub async fn closed(&self) {
        let mut closed = self.closed.clone();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    async fn call<R: DeserializeOwned>(&self, request: Request) -> MeshResult<R> {
        let method = request.method();
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();

        {
            let mut requests = self.pending.requests.lock().await;
            if self.is_closed() {
                return Err(MeshError::Unavailable("connection closed".into()));
            }
            requests.insert(id.clone(), tx);
        }

        debug!(method, ?id, "Sending request");
        if let Err(e) = self
            .writer
            .send(&JsonRpcRequest::new(request, id.clone()))
            .await
        {
            self.pending.requests.lock().await.remove(&id);
            return Err(MeshError::Unavailable(format!("{}: {}", method, e)));
        }

        let value = match timeout(self.request_timeout, rx).await {
            Ok(Ok(Ok(value))) => value,
            Ok(Ok(Err(error))) if error.code == JsonRpcError::TIMEOUT => {
                return Err(MeshError::Timeout(method.into()));
            }
            Ok(Ok(Err(error))) => {
                return Err(MeshError::Rejected(format!("{}: {}", method, error)));
            }
            Ok(Err(_)) => {
                return Err(MeshError::Unavailable(format!(
                    "{}: connection closed",
                    method
                )));
            }
            Err(_) => {
                self.pending.requests.lock().await.remove(&id);
                return Err(MeshError::Timeout(method.into()));
            }
        };

        serde_json::from_value(value)
            .map_err(|e| MeshError::Protocol(format!("{}: {}", method, e)))
    }
}

impl Drop for RpcMeshBackend {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn read_loop(
    mut reader: SessionReader,
    pending: Arc<Pending>,
    events: Arc<OnceLock<Arc<EventRouter>>>,
) {
    loop {
        let line = match reader.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                warn!("Mesh stack closed the connection");
                break;
            }
            Err(e) => {
                error!("Mesh stack read error: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<IncomingMessage>(&line) {
            Ok(IncomingMessage::Response(response)) => {
                let sender = pending.requests.lock().await.remove(&response.id);
                match sender {
                    Some(sender) => {
                        let _ = sender.send(response.into_result());
                    }
                    None => debug!(id = ?response.id, "Response for unknown request"),
                }
            }
            Ok(IncomingMessage::Notification(notification)) => match events.get() {
                Some(router) => router.dispatch(notification.notification.into()),
                None => debug!("Event before initialization, dropped"),
            },
            Err(e) => warn!("Malformed message from mesh stack: {}", e),
        }
    }

    // Dropping the senders fails every outstanding call
    let mut requests = pending.requests.lock().await;
    requests.clear();
    let _ = pending.closed.send(true);
}

impl MeshBackend for RpcMeshBackend {
    async fn initialize(
        &self,
        composition: &Composition,
        events: Arc<EventRouter>,
    ) -> MeshResult<()> {
        if self.events.set(events).is_err() {
            warn!("Mesh backend already initialized, keeping first event router");
        }

        let _: Value = self
            .call(Request::Initialize(InitializeParams {
                composition: hex::encode(composition.encode_page0()),
            }))
            .await?;
        Ok(())
    }

    async fn admit_self(
        &self,
        net_idx: u16,
        net_key: &Key128,
        address: Address,
        device_key: &Key128,
    ) -> MeshResult<SelfAdmission> {
        let response: AdmitSelfResponse = self
            .call(Request::AdmitSelf(AdmitSelfParams {
                net_idx,
                net_key: *net_key,
                address,
                device_key: *device_key,
            }))
            .await?;
        Ok(response.into())
    }

    async fn admit_remote(&self, uuid: &Uuid, net_idx: u16, attention: u8) -> MeshResult<()> {
        let _: Value = self
            .call(Request::AdmitRemote(AdmitRemoteParams {
                uuid: *uuid,
                net_idx,
                attention,
            }))
            .await?;
        Ok(())
    }

    async fn distribute_key(
        &self,
        target: Address,
        net_idx: u16,
        app_idx: u16,
        key: &Key128,
    ) -> MeshResult<Status> {
        let response: ConfigStatusResponse = self
            .call(Request::AddAppKey(AddAppKeyParams {
                target,
                net_idx,
                app_idx,
                app_key: *key,
            }))
            .await?;
        Ok(response.status)
    }

    async fn bind_capability(
        &self,
        target: Address,
        element: Address,
        app_idx: u16,
        model: ModelId,
    ) -> MeshResult<Status> {
        let response: ConfigStatusResponse = self
            .call(Request::BindModel(BindModelParams::new(
                target, element, app_idx, model,
            )))
            .await?;
        Ok(response.status)
    }

    async fn get_composition(&self, target: Address, page: u8) -> MeshResult<Composition> {
        let response: CompositionResponse = self
            .call(Request::GetComposition(GetCompositionParams { target, page }))
            .await?;
        Ok(response.decode()?)
    }
}
