//! Beacon listener

use tracing::debug;

use crate::core::{handoff::HandoffSender, types::CandidateBeacon};

/// Captures discovery beacons of candidate devices
///
/// Latest wins: a beacon that has not been consumed yet is overwritten by
/// the next one. Only one candidate is admitted at a time, so older
/// candidates simply have to beacon again.
#[derive(Debug)]
pub struct BeaconListener {
    slot: HandoffSender<CandidateBeacon>,
}

impl BeaconListener {
    pub fn new(slot: HandoffSender<CandidateBeacon>) -> Self {
        Self { slot }
    }

    pub fn on_candidate_beacon(&self, beacon: CandidateBeacon) {
        if let Some(previous) = self.slot.publish(beacon) {
            if previous.uuid != beacon.uuid {
                debug!(
                    discarded = %previous.uuid,
                    uuid = %beacon.uuid,
                    "Unconsumed candidate replaced by newer beacon"
                );
            }
        }
    }
}
