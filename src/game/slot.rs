//! Participant slots and their connection status

use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifies one WebSocket connection; a reconnect gets a fresh id
pub type ConnectionId = Uuid;

/// Smallest outbound queue that holds the largest burst one transition queues
/// on a single channel (game start, or a shot and its follow-up)
pub const MIN_CHANNEL_CAPACITY: usize = 2;

/// Outbound queue feeding a connection's writer task (serialized events)
pub type ChannelTx = mpsc::Sender<String>;

/// Connection status of a slot, tracked by the session itself
#[derive(Debug, Default)]
pub enum Link {
    #[default]
    Disconnected,
    Connected { id: ConnectionId, tx: ChannelTx },
}

/// One of the two participant positions
#[derive(Debug, Default)]
pub struct SlotState {
    /// Trimmed display name; `None` while the slot is free
    pub name: Option<String>,
    pub link: Link,
}

impl SlotState {
    pub fn is_registered(&self) -> bool {
        self.name.is_some()
    }

    /// Attached and the writer is still draining the queue
    pub fn is_live(&self) -> bool {
        self.open_channel().is_some()
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        match &self.link {
            Link::Connected { id, .. } => Some(*id),
            Link::Disconnected => None,
        }
    }

    pub fn open_channel(&self) -> Option<&ChannelTx> {
        match &self.link {
            Link::Connected { tx, .. } if !tx.is_closed() => Some(tx),
            _ => None,
        }
    }

    /// Replaces any previous link; the old sender is dropped here
    pub fn connect(&mut self, id: ConnectionId, tx: ChannelTx) {
        self.link = Link::Connected { id, tx };
    }

    pub fn disconnect(&mut self) {
        self.link = Link::Disconnected;
    }

    pub fn clear(&mut self) {
        self.name = None;
        self.link = Link::Disconnected;
    }
}
