pub mod context;
pub mod host;
pub mod lifecycle;
pub mod registry;
pub mod router;
pub mod scheduler;

pub use context::{Relay, RelayContext};
pub use registry::{ConnId, Delivery, PeerHandle, PeerRegistry};
