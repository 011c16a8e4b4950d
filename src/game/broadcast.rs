//! Event fan-out to the participants' channels

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, warn};

use crate::ws::protocol::{ServerMsg, Slot};

use super::slot::SlotState;

/// Who should receive an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    All,
    Slot(Slot),
}

/// Serialize `msg` once and queue it on every targeted open channel.
///
/// Absent or closed channels are skipped; a full queue drops the event.
/// Never waits for delivery. Returns how many channels took the event.
pub fn send(slots: &[SlotState; 2], target: Target, msg: &ServerMsg) -> usize {
    let text = match serde_json::to_string(msg) {
        Ok(text) => text,
        Err(e) => {
            error!(kind = msg.kind(), error = %e, "Failed to serialize event");
            return 0;
        }
    };

    let targets: &[Slot] = match &target {
        Target::All => &Slot::ALL,
        Target::Slot(slot) => std::slice::from_ref(slot),
    };

    let mut queued = 0;
    for &slot in targets {
        let Some(tx) = slots[slot.index()].open_channel() else {
            debug!(slot = %slot, kind = msg.kind(), "No open channel, event skipped");
            continue;
        };

        match tx.try_send(text.clone()) {
            Ok(()) => queued += 1,
            Err(TrySendError::Full(_)) => {
                warn!(slot = %slot, kind = msg.kind(), "Outbound queue full, event dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(slot = %slot, kind = msg.kind(), "Channel closed, event skipped");
            }
        }
    }

    queued
}
