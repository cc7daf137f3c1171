pub mod codec;
pub mod config;
pub mod schedule;
pub mod state;
pub mod topics;
pub mod types;

pub use codec::{decode, DecodeError, FrameError, InboundMessage, OutboundMessage};
pub use config::{FireMode, RelayConfig, SchedulerConfig};
pub use schedule::{Schedule, ScheduleEntry};
pub use state::{StateStore, SNAPSHOT_FIELDS};
pub use topics::*;
pub use types::{BatteryState, PeerRole, Position, RelayStatus, SpeedState, StateField, TemperatureState};
