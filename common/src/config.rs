use serde::{Deserialize, Serialize};

use crate::state::SNAPSHOT_FIELDS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireMode {
    /// Fire on every tick that falls inside an entry's window.
    EveryTick,
    /// Fire at most once per entry per window occurrence.
    OncePerWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_seconds: u64,
    pub fire_mode: FireMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 10,
            fire_mode: FireMode::EveryTick,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub http_port: u16,
    pub timezone: String,
    pub max_frame_bytes: usize,
    pub outbound_buffer: usize,
    pub scheduler: SchedulerConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            http_port: 8000,
            timezone: "UTC".to_string(),
            max_frame_bytes: 4096,
            outbound_buffer: 64,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl RelayConfig {
    pub fn sanitize(&mut self) {
        // The window is two minutes wide; a slower tick could step over it.
        self.scheduler.interval_seconds = self.scheduler.interval_seconds.clamp(1, 60);
        self.max_frame_bytes = self.max_frame_bytes.clamp(256, 1 << 20);
        // A joining app must be able to queue its whole snapshot.
        self.outbound_buffer = self.outbound_buffer.clamp(SNAPSHOT_FIELDS.len(), 4096);

        if self.timezone.trim().is_empty() {
            self.timezone = "UTC".to_string();
        }
    }
}
