use std::time::Duration;

use relay_common::{OutboundMessage, Position};

const DRAIN_PER_TICK: f64 = 0.2;
const CHARGE_PER_TICK: f64 = 1.0;
const CLIMATE_STEP: f64 = 1.0;
const KM_PER_DEGREE: f64 = 111.32;

/// Speeds (km/h) the simulated car cycles through, one entry per tick.
const CRUISE_PROFILE: [f64; 8] = [30.0, 42.0, 55.0, 63.0, 58.0, 47.0, 35.0, 24.0];

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleModel {
    pub battery: f64,
    pub charging: bool,
    pub speed: f64,
    pub temperature: f64,
    pub target: f64,
    pub climate_on: bool,
    pub position: Position,
    tick: usize,
}

impl Default for VehicleModel {
    fn default() -> Self {
        Self {
            battery: 80.0,
            charging: false,
            speed: CRUISE_PROFILE[0],
            temperature: 20.0,
            target: 20.0,
            climate_on: false,
            position: Position {
                latitude: 50.069468,
                longitude: 19.91008,
            },
            tick: 0,
        }
    }
}

impl VehicleModel {
    pub fn advance(&mut self, elapsed: Duration) {
        if self.charging {
            self.battery = (self.battery + CHARGE_PER_TICK).min(100.0);
        } else {
            self.battery = (self.battery - DRAIN_PER_TICK).max(0.0);
        }

        if self.climate_on {
            let gap = self.target - self.temperature;
            self.temperature += gap.clamp(-CLIMATE_STEP, CLIMATE_STEP);
        }

        // A charging car is parked.
        if self.charging {
            self.speed = 0.0;
        } else {
            self.tick = (self.tick + 1) % CRUISE_PROFILE.len();
            self.speed = CRUISE_PROFILE[self.tick];
            self.drive(elapsed);
        }
    }

    /// Heads north-east at the current speed.
    fn drive(&mut self, elapsed: Duration) {
        let km = self.speed * elapsed.as_secs_f64() / 3600.0;
        let leg = km / std::f64::consts::SQRT_2 / KM_PER_DEGREE;
        let lon_scale = self.position.latitude.to_radians().cos().max(0.01);
        self.position.latitude += leg;
        self.position.longitude += leg / lon_scale;
    }

    /// Applies a command from the relay. Returns false for frames the car does
    /// not act on.
    pub fn apply(&mut self, message: &OutboundMessage) -> bool {
        match message {
            OutboundMessage::ChargingState { charging } => self.charging = *charging,
            OutboundMessage::TemperatureSet { temp } => self.target = *temp,
            OutboundMessage::TemperatureState { state } => self.climate_on = *state,
            _ => return false,
        }
        true
    }

    pub fn telemetry(&self) -> [OutboundMessage; 4] {
        [
            OutboundMessage::Battery {
                percent: self.battery.round(),
            },
            OutboundMessage::Speed { speed: self.speed },
            OutboundMessage::Temperature {
                temp: self.temperature,
            },
            OutboundMessage::CoordsCar {
                latitude: self.position.latitude,
                longitude: self.position.longitude,
            },
        ]
    }
}
