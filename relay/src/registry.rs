use std::sync::Arc;

use relay_common::PeerRole;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub type ConnId = u64;

/// Text frame shared between every recipient of one broadcast.
pub type Frame = Arc<str>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("outbound channel closed")]
    Closed,
    #[error("outbound channel full")]
    Full,
}

/// Handle to one connection's outbound queue. The connection's writer task
/// owns the receiving end. Every clone shares one eviction token, so the
/// connection task sees an eviction made through the registry's copy.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: ConnId,
    sender: mpsc::Sender<Frame>,
    evicted: CancellationToken,
}

impl PeerHandle {
    pub fn new(id: ConnId, sender: mpsc::Sender<Frame>) -> Self {
        Self {
            id,
            sender,
            evicted: CancellationToken::new(),
        }
    }

    pub fn channel(id: ConnId, capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(id, sender), receiver)
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Queues a frame without waiting on the socket.
    pub fn send(&self, frame: Frame) -> Result<(), SendError> {
        self.sender.try_send(frame).map_err(|err| match err {
            TrySendError::Closed(_) => SendError::Closed,
            TrySendError::Full(_) => SendError::Full,
        })
    }

    /// Tells the owning connection to shut down.
    pub fn evict(&self) {
        self.evicted.cancel();
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted.is_cancelled()
    }

    /// Resolves once the peer has been evicted.
    pub async fn evicted(&self) {
        self.evicted.cancelled().await
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub evicted: usize,
}

impl Delivery {
    pub fn merge(&mut self, other: Delivery) {
        self.delivered += other.delivered;
        self.evicted += other.evicted;
    }
}

/// App and vehicle peers. A connection holds at most one role.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    apps: Vec<PeerHandle>,
    vehicles: Vec<PeerHandle>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the connection already holds a role.
    pub fn add_app(&mut self, peer: PeerHandle) -> bool {
        self.add(PeerRole::App, peer)
    }

    pub fn add_vehicle(&mut self, peer: PeerHandle) -> bool {
        self.add(PeerRole::Vehicle, peer)
    }

    fn add(&mut self, role: PeerRole, peer: PeerHandle) -> bool {
        if self.role_of(peer.id).is_some() {
            return false;
        }
        self.members_mut(role).push(peer);
        true
    }

    /// Removes the connection from whichever set holds it. Idempotent.
    pub fn remove(&mut self, id: ConnId) -> Option<PeerRole> {
        for role in [PeerRole::App, PeerRole::Vehicle] {
            let members = self.members_mut(role);
            if let Some(index) = members.iter().position(|peer| peer.id == id) {
                members.remove(index);
                return Some(role);
            }
        }
        None
    }

    pub fn role_of(&self, id: ConnId) -> Option<PeerRole> {
        if self.apps.iter().any(|peer| peer.id == id) {
            Some(PeerRole::App)
        } else if self.vehicles.iter().any(|peer| peer.id == id) {
            Some(PeerRole::Vehicle)
        } else {
            None
        }
    }

    pub fn app_count(&self) -> usize {
        self.apps.len()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn broadcast_apps(&mut self, frame: &Frame) -> Delivery {
        self.broadcast(PeerRole::App, frame)
    }

    pub fn broadcast_vehicles(&mut self, frame: &Frame) -> Delivery {
        self.broadcast(PeerRole::Vehicle, frame)
    }

    /// Sends to every current member of `role`. A failed send evicts that
    /// member; the rest still receive the frame.
    fn broadcast(&mut self, role: PeerRole, frame: &Frame) -> Delivery {
        let mut delivery = Delivery::default();
        let mut failed = Vec::new();

        for peer in self.members(role) {
            match peer.send(Arc::clone(frame)) {
                Ok(()) => delivery.delivered += 1,
                Err(err) => {
                    warn!(
                        "dropping {} peer {} after failed send: {err}",
                        role.as_str(),
                        peer.id
                    );
                    peer.evict();
                    failed.push(peer.id);
                }
            }
        }

        for id in failed {
            if self.remove(id).is_some() {
                delivery.evicted += 1;
            }
        }

        debug!(
            "broadcast to {} {} peers ({} evicted)",
            delivery.delivered,
            role.as_str(),
            delivery.evicted
        );
        delivery
    }

    /// Sends to a single connection, evicting it on failure.
    pub fn send_to(&mut self, peer: &PeerHandle, frame: &Frame) -> Delivery {
        match peer.send(Arc::clone(frame)) {
            Ok(()) => Delivery {
                delivered: 1,
                evicted: 0,
            },
            Err(err) => {
                warn!("dropping peer {} after failed send: {err}", peer.id);
                peer.evict();
                Delivery {
                    delivered: 0,
                    evicted: usize::from(self.remove(peer.id).is_some()),
                }
            }
        }
    }

    fn members(&self, role: PeerRole) -> &[PeerHandle] {
        match role {
            PeerRole::App => &self.apps,
            PeerRole::Vehicle => &self.vehicles,
        }
    }

    fn members_mut(&mut self, role: PeerRole) -> &mut Vec<PeerHandle> {
        match role {
            PeerRole::App => &mut self.apps,
            PeerRole::Vehicle => &mut self.vehicles,
        }
    }
}
