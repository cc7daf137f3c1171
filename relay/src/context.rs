use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use relay_common::{OutboundMessage, PeerRole, RelayConfig, RelayStatus, StateField, StateStore};
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::registry::{ConnId, Delivery, Frame, PeerHandle, PeerRegistry};

/// State store and peer registry. Always accessed through the single lock in
/// [`RelayContext`], so a mutation and its broadcasts are never interleaved
/// with another update.
#[derive(Debug, Default)]
pub struct Relay {
    pub(crate) state: StateStore,
    pub(crate) peers: PeerRegistry,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn disconnect(&mut self, id: ConnId) -> Option<PeerRole> {
        self.peers.remove(id)
    }

    /// Renders each field and broadcasts it to `role`, one frame per field.
    pub(crate) fn announce(&mut self, role: PeerRole, fields: &[StateField]) -> Delivery {
        let mut delivery = Delivery::default();
        for field in fields {
            if let Some(frame) = encode(&self.state.render(*field)) {
                let sent = match role {
                    PeerRole::App => self.peers.broadcast_apps(&frame),
                    PeerRole::Vehicle => self.peers.broadcast_vehicles(&frame),
                };
                delivery.merge(sent);
            }
        }
        delivery
    }

    pub(crate) fn send_snapshot(&mut self, peer: &PeerHandle) -> Delivery {
        let mut delivery = Delivery::default();
        for message in self.state.snapshot() {
            let Some(frame) = encode(&message) else {
                continue;
            };
            let sent = self.peers.send_to(peer, &frame);
            delivery.merge(sent);
            if sent.delivered == 0 {
                break;
            }
        }
        delivery
    }

    pub fn status(&self) -> RelayStatus {
        RelayStatus {
            battery: self.state.battery(),
            speed: self.state.speed(),
            temperature: self.state.temperature(),
            vehicle_position: self.state.vehicle_position(),
            app_position: self.state.app_position(),
            schedule: self.state.schedule().raw_entries(),
            app_peers: self.peers.app_count(),
            vehicle_peers: self.peers.vehicle_count(),
        }
    }
}

fn encode(message: &OutboundMessage) -> Option<Frame> {
    match message.encode() {
        Ok(text) => Some(Frame::from(text)),
        Err(err) => {
            warn!("failed to encode {message:?}: {err}");
            None
        }
    }
}

/// Application context shared by the HTTP handlers, every connection task and
/// the scheduler.
#[derive(Clone)]
pub struct RelayContext {
    relay: Arc<Mutex<Relay>>,
    config: Arc<RelayConfig>,
    next_conn_id: Arc<AtomicU64>,
}

impl RelayContext {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            relay: Arc::new(Mutex::new(Relay::new())),
            config: Arc::new(config),
            next_conn_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub async fn lock(&self) -> MutexGuard<'_, Relay> {
        self.relay.lock().await
    }

    pub fn next_conn_id(&self) -> ConnId {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn status(&self) -> RelayStatus {
        self.lock().await.status()
    }
}
