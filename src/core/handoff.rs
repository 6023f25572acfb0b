//! Single-slot, latest-wins handoff between a callback context and the orchestrator
//!
//! The sender never blocks: publishing overwrites whatever value is still
//! waiting in the slot. The receiver waits with a bounded timeout only.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{sync::Notify, time::Instant};

#[derive(Debug)]
struct Shared<T> {
    slot: Mutex<Option<T>>,
    notify: Notify,
}

impl<T> Shared<T> {
    fn slot(&self) -> MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a connected sender/receiver pair
pub fn handoff<T>() -> (HandoffSender<T>, HandoffReceiver<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(None),
        notify: Notify::new(),
    });

    (
        HandoffSender {
            shared: shared.clone(),
        },
        HandoffReceiver { shared },
    )
}

/// Writing side, owned by exactly one callback context
#[derive(Debug)]
pub struct HandoffSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> HandoffSender<T> {
    /// Store `value` and raise the notification
    ///
    /// Returns the unconsumed value that was overwritten, if any.
    pub fn publish(&self, value: T) -> Option<T> {
        let replaced = self.shared.slot().replace(value);
        self.shared.notify.notify_one();
        replaced
    }
}

/// Reading side, owned by the orchestrator
#[derive(Debug)]
pub struct HandoffReceiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> HandoffReceiver<T> {
    /// Drop any pending value
    pub fn clear(&mut self) {
        self.shared.slot().take();
    }

    /// Take the pending value without waiting
    pub fn try_take(&mut self) -> Option<T> {
        self.shared.slot().take()
    }

    /// Wait up to `timeout` for a value
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let shared = self.shared.clone();

        loop {
            // Register interest before checking the slot so a publish in
            // between is not lost. A stale permit only causes one extra pass.
            let notified = shared.notify.notified();

            if let Some(value) = shared.slot().take() {
                return Some(value);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return shared.slot().take();
            }
        }
    }
}
