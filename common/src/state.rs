use crate::{
    codec::OutboundMessage,
    schedule::Schedule,
    types::{BatteryState, Position, SpeedState, StateField, TemperatureState},
};

/// Order in which a joining app peer receives the current state.
pub const SNAPSHOT_FIELDS: [StateField; 8] = [
    StateField::BatteryPercent,
    StateField::Speed,
    StateField::Temperature,
    StateField::TemperatureControl,
    StateField::TemperatureTarget,
    StateField::Charging,
    StateField::VehiclePosition,
    StateField::Schedule,
];

/// Latest known value of every tracked field.
#[derive(Debug, Clone, PartialEq)]
pub struct StateStore {
    battery: BatteryState,
    speed: SpeedState,
    temperature: TemperatureState,
    vehicle_position: Position,
    app_position: Position,
    schedule: Schedule,
}

impl Default for StateStore {
    fn default() -> Self {
        Self {
            battery: BatteryState {
                percent: 0.0,
                charging: false,
            },
            speed: SpeedState { kmph: 0.0 },
            temperature: TemperatureState {
                celsius: 20.0,
                target: 20.0,
                control: false,
            },
            vehicle_position: Position::default(),
            app_position: Position::default(),
            schedule: Schedule::default(),
        }
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn battery(&self) -> BatteryState {
        self.battery
    }

    pub fn speed(&self) -> SpeedState {
        self.speed
    }

    pub fn temperature(&self) -> TemperatureState {
        self.temperature
    }

    pub fn vehicle_position(&self) -> Position {
        self.vehicle_position
    }

    pub fn app_position(&self) -> Position {
        self.app_position
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn set_battery_percent(&mut self, percent: f64) {
        self.battery.percent = percent;
    }

    pub fn set_charging(&mut self, charging: bool) {
        self.battery.charging = charging;
    }

    pub fn set_speed(&mut self, kmph: f64) {
        self.speed.kmph = kmph;
    }

    pub fn set_temperature(&mut self, celsius: f64) {
        self.temperature.celsius = celsius;
    }

    pub fn set_temperature_target(&mut self, target: f64) {
        self.temperature.target = target;
    }

    pub fn set_temperature_control(&mut self, enabled: bool) {
        self.temperature.control = enabled;
    }

    pub fn set_vehicle_position(&mut self, position: Position) {
        self.vehicle_position = position;
    }

    pub fn set_app_position(&mut self, position: Position) {
        self.app_position = position;
    }

    pub fn replace_schedule(&mut self, schedule: Schedule) {
        self.schedule = schedule;
    }

    /// Scheduled pre-conditioning: re-announce the current target, start
    /// charging and switch climate control on.
    pub fn begin_conditioning(&mut self) {
        let target = self.temperature.target;
        self.set_temperature_target(target);
        self.set_charging(true);
        self.set_temperature_control(true);
    }

    pub fn render(&self, field: StateField) -> OutboundMessage {
        match field {
            StateField::BatteryPercent => OutboundMessage::Battery {
                percent: self.battery.percent,
            },
            StateField::Charging => OutboundMessage::ChargingState {
                charging: self.battery.charging,
            },
            StateField::Speed => OutboundMessage::Speed {
                speed: self.speed.kmph,
            },
            StateField::Temperature => OutboundMessage::Temperature {
                temp: self.temperature.celsius,
            },
            StateField::TemperatureControl => OutboundMessage::TemperatureState {
                state: self.temperature.control,
            },
            StateField::TemperatureTarget => OutboundMessage::TemperatureTarget {
                target: self.temperature.target,
            },
            StateField::TemperatureSetpoint => OutboundMessage::TemperatureSet {
                temp: self.temperature.target,
            },
            StateField::VehiclePosition => OutboundMessage::CoordsCar {
                latitude: self.vehicle_position.latitude,
                longitude: self.vehicle_position.longitude,
            },
            StateField::AppPosition => OutboundMessage::CoordsApp {
                latitude: self.app_position.latitude,
                longitude: self.app_position.longitude,
            },
            StateField::Schedule => OutboundMessage::Schedule {
                schedule: self.schedule.raw_entries(),
            },
        }
    }

    pub fn snapshot(&self) -> Vec<OutboundMessage> {
        SNAPSHOT_FIELDS
            .iter()
            .map(|field| self.render(*field))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn starts_from_documented_initial_values() {
        let store = StateStore::new();

        assert_eq!(store.battery().percent, 0.0);
        assert!(!store.battery().charging);
        assert_eq!(store.speed().kmph, 0.0);
        assert_eq!(store.temperature().celsius, 20.0);
        assert_eq!(store.temperature().target, 20.0);
        assert!(!store.temperature().control);
        assert_eq!(store.vehicle_position(), Position::default());
        assert_eq!(store.schedule().entries().len(), 7);
    }

    #[test]
    fn snapshot_follows_join_order() {
        let mut store = StateStore::new();
        store.set_battery_percent(64.0);
        store.set_speed(88.0);
        store.set_vehicle_position(Position {
            latitude: 50.069468,
            longitude: 19.91008,
        });

        let tags: Vec<String> = store
            .snapshot()
            .iter()
            .map(|message| {
                let frame: serde_json::Value =
                    serde_json::from_str(&message.encode().unwrap()).unwrap();
                frame["type"].as_str().unwrap().to_string()
            })
            .collect();

        assert_eq!(
            tags,
            vec![
                "BATTERY",
                "SPEED",
                "TEMPERATURE",
                "TEMPERATURE_STATE",
                "TEMPERATURE_TARGET",
                "CHARGING_STATE",
                "COORDS_CAR",
                "SCHEDULE",
            ]
        );
        assert_eq!(store.snapshot()[0], OutboundMessage::Battery { percent: 64.0 });
    }

    #[test]
    fn target_renders_differently_for_apps_and_vehicles() {
        let mut store = StateStore::new();
        store.set_temperature_target(22.5);

        assert_eq!(
            store.render(StateField::TemperatureTarget),
            OutboundMessage::TemperatureTarget { target: 22.5 }
        );
        assert_eq!(
            store.render(StateField::TemperatureSetpoint),
            OutboundMessage::TemperatureSet { temp: 22.5 }
        );
    }

    #[test]
    fn conditioning_keeps_target_and_enables_climate_and_charging() {
        let mut store = StateStore::new();
        store.set_temperature_target(23.0);
        store.begin_conditioning();

        assert_eq!(store.temperature().target, 23.0);
        assert!(store.temperature().control);
        assert!(store.battery().charging);
    }
}
