//! Broadcast hub: the connection registry and non-blocking fan-out.
//!
//! Each connection owns a bounded outbound buffer. `broadcast` serializes
//! the event once and enqueues the frame onto every buffer without ever
//! blocking; a connection whose buffer is full is evicted on the spot so
//! one slow consumer cannot stall matching or starve the others. Dropping
//! the sender closes the receiver, which ends that connection's write pump.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use clearbook_types::constants;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::Event;

/// Handle identifying one registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Connection registry plus fan-out. All mutations go through the internal
/// lock; no caller ever touches the map directly.
#[derive(Debug, Default)]
pub struct Hub {
    connections: Mutex<HashMap<ConnId, mpsc::Sender<String>>>,
    next_id: AtomicU64,
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Returns its id and the receiving end of its
    /// outbound buffer, which the write pump drains.
    pub fn register(&self) -> (ConnId, mpsc::Receiver<String>) {
        let id = ConnId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(constants::PUSH_BUFFER_CAPACITY);
        self.connections.lock().insert(id, tx);
        debug!(conn = %id, "connection registered");
        (id, rx)
    }

    /// Drop a connection. Idempotent.
    pub fn unregister(&self, id: ConnId) {
        if self.connections.lock().remove(&id).is_some() {
            debug!(conn = %id, "connection unregistered");
        }
    }

    /// Serialize once, enqueue everywhere. Full or closed buffers evict
    /// their connection.
    pub fn broadcast(&self, event: &Event) {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to serialize event; dropping broadcast");
                return;
            }
        };

        let mut connections = self.connections.lock();
        connections.retain(|id, tx| match tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(conn = %id, "outbound buffer full; evicting slow consumer");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Enqueue an event onto one connection. Returns `false` (and evicts)
    /// if the buffer is full or the connection is gone.
    pub fn send_to(&self, id: ConnId, event: &Event) -> bool {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to serialize event");
                return false;
            }
        };

        let mut connections = self.connections.lock();
        let Some(tx) = connections.get(&id) else {
            return false;
        };
        match tx.try_send(frame) {
            Ok(()) => true,
            Err(_) => {
                connections.remove(&id);
                false
            }
        }
    }

    /// Number of registered connections.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.connections.lock().len()
    }
}
