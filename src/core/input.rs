//! Operator input handler
//!
//! Each debounced edge flips auto-admit mode, mirrors the new mode on the
//! indicator and raises the confirmation notification.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tracing::info;

use crate::{core::handoff::HandoffSender, peripheral::Indicator};

/// Create the auto-admit flag, returning its writing and reading halves
pub fn auto_admit_flag(initial: bool) -> (AutoAdmitSwitch, AutoAdmitFlag) {
    let flag = Arc::new(AtomicBool::new(initial));
    (AutoAdmitSwitch(flag.clone()), AutoAdmitFlag(flag))
}

/// Writing half of the auto-admit flag, owned by the input handler
#[derive(Debug)]
pub struct AutoAdmitSwitch(Arc<AtomicBool>);

impl AutoAdmitSwitch {
    /// Flip the flag and return the new value
    fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::AcqRel)
    }

    fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Reading half of the auto-admit flag, owned by the orchestrator
#[derive(Debug, Clone)]
pub struct AutoAdmitFlag(Arc<AtomicBool>);

impl AutoAdmitFlag {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Handler for operator edge events
pub struct OperatorInput {
    switch: AutoAdmitSwitch,
    indicator: Option<Arc<dyn Indicator>>,
    confirm: HandoffSender<()>,
}

impl OperatorInput {
    /// Create the handler and sync the indicator with the initial mode
    pub fn new(
        switch: AutoAdmitSwitch,
        indicator: Option<Arc<dyn Indicator>>,
        confirm: HandoffSender<()>,
    ) -> Self {
        if let Some(indicator) = &indicator {
            indicator.set(switch.get());
        }

        Self {
            switch,
            indicator,
            confirm,
        }
    }

    /// Handle one debounced edge, returning the new auto-admit mode
    pub fn on_edge(&self) -> bool {
        let auto_admit = self.switch.toggle();

        if let Some(indicator) = &self.indicator {
            indicator.set(auto_admit);
        }

        info!(
            "Auto-admit mode: {}",
            if auto_admit { "ON" } else { "OFF" }
        );
        self.confirm.publish(());

        auto_admit
    }

    /// Current auto-admit mode
    pub fn auto_admit(&self) -> bool {
        self.switch.get()
    }
}
