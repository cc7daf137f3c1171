use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerRole {
    App,
    Vehicle,
}

impl PeerRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Vehicle => "vehicle",
        }
    }
}

/// One independently broadcast piece of state. Each variant maps to exactly
/// one outbound frame tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateField {
    BatteryPercent,
    Charging,
    Speed,
    Temperature,
    TemperatureControl,
    /// Target as announced to apps (`TEMPERATURE_TARGET`).
    TemperatureTarget,
    /// Target as commanded to vehicles (`TEMPERATURE_SET`).
    TemperatureSetpoint,
    VehiclePosition,
    AppPosition,
    Schedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatteryState {
    pub percent: f64,
    pub charging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedState {
    pub kmph: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureState {
    pub celsius: f64,
    pub target: f64,
    #[serde(rename = "controlState")]
    pub control: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelayStatus {
    pub battery: BatteryState,
    pub speed: SpeedState,
    pub temperature: TemperatureState,
    #[serde(rename = "vehiclePosition")]
    pub vehicle_position: Position,
    #[serde(rename = "appPosition")]
    pub app_position: Position,
    pub schedule: Vec<String>,
    #[serde(rename = "appPeers")]
    pub app_peers: usize,
    #[serde(rename = "vehiclePeers")]
    pub vehicle_peers: usize,
}
