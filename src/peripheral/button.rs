//! Operator button driven by `SIGUSR1`
//!
//! Every delivered signal counts as one debounced edge. Signals arriving
//! faster than they are handled coalesce, like a single pending notification.

use tokio::{
    signal::unix::{Signal, SignalKind, signal},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::core::input::OperatorInput;

/// Button input backed by a Unix signal
pub struct SignalButton {
    signal: Signal,
}

impl SignalButton {
    /// Register the signal handler
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            signal: signal(SignalKind::user_defined1())?,
        })
    }

    /// Feed every edge into `input` until the signal stream ends
    pub fn spawn(mut self, input: OperatorInput) -> JoinHandle<()> {
        info!("Operator button listening on SIGUSR1");

        tokio::spawn(async move {
            while self.signal.recv().await.is_some() {
                debug!("Operator button edge");
                input.on_edge();
            }
            warn!("Operator button signal stream ended");
        })
    }
}
