//! Inbound dispatch: each message type maps to a state mutation and the
//! fields re-announced to each peer group, in order.

use relay_common::{InboundMessage, PeerRole, StateField, StateStore};
use tracing::{debug, info, warn};

use crate::{
    context::Relay,
    registry::{Delivery, PeerHandle},
};

/// Fields announced after a message is applied. Vehicles are served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub vehicles: &'static [StateField],
    pub apps: &'static [StateField],
}

impl Route {
    const NONE: Route = Route {
        vehicles: &[],
        apps: &[],
    };

    const fn apps(fields: &'static [StateField]) -> Route {
        Route {
            vehicles: &[],
            apps: fields,
        }
    }

    const fn vehicles(fields: &'static [StateField]) -> Route {
        Route {
            vehicles: fields,
            apps: &[],
        }
    }
}

pub const CONDITIONING_ROUTE: Route = Route {
    vehicles: &[
        StateField::TemperatureSetpoint,
        StateField::TemperatureControl,
        StateField::Charging,
    ],
    apps: &[StateField::TemperatureControl, StateField::Charging],
};

pub fn route(message: &InboundMessage) -> Route {
    match message {
        InboundMessage::InitApp | InboundMessage::InitVehicle => Route::NONE,
        InboundMessage::Battery { .. } => Route::apps(&[StateField::BatteryPercent]),
        InboundMessage::Speed { .. } => Route::apps(&[StateField::Speed]),
        InboundMessage::Temperature { .. } => Route::apps(&[StateField::Temperature]),
        InboundMessage::TemperatureTargetQuery => Route::apps(&[StateField::TemperatureTarget]),
        InboundMessage::TemperatureSet { .. } => Route {
            vehicles: &[StateField::TemperatureSetpoint],
            apps: &[StateField::TemperatureTarget],
        },
        InboundMessage::TemperatureControl { .. } => Route {
            vehicles: &[StateField::TemperatureControl],
            apps: &[StateField::TemperatureControl],
        },
        InboundMessage::ChargingQuery => Route::apps(&[StateField::Charging]),
        InboundMessage::ChargingSet { .. } => Route::vehicles(&[StateField::Charging]),
        InboundMessage::VehiclePosition(_) => Route::apps(&[StateField::VehiclePosition]),
        InboundMessage::AppPosition(_) => Route::vehicles(&[StateField::AppPosition]),
        InboundMessage::ReplaceSchedule(_) => Route::apps(&[StateField::Schedule]),
        InboundMessage::ScheduleQuery => Route::apps(&[StateField::Schedule]),
    }
}

fn apply(state: &mut StateStore, message: InboundMessage) {
    match message {
        InboundMessage::Battery { percent } => state.set_battery_percent(percent),
        InboundMessage::Speed { kmph } => state.set_speed(kmph),
        InboundMessage::Temperature { celsius } => state.set_temperature(celsius),
        InboundMessage::TemperatureSet { target } => state.set_temperature_target(target),
        InboundMessage::TemperatureControl { enabled } => state.set_temperature_control(enabled),
        InboundMessage::ChargingSet { charging } => state.set_charging(charging),
        InboundMessage::VehiclePosition(position) => state.set_vehicle_position(position),
        InboundMessage::AppPosition(position) => state.set_app_position(position),
        InboundMessage::ReplaceSchedule(schedule) => state.replace_schedule(schedule),
        InboundMessage::InitApp
        | InboundMessage::InitVehicle
        | InboundMessage::TemperatureTargetQuery
        | InboundMessage::ChargingQuery
        | InboundMessage::ScheduleQuery => {}
    }
}

impl Relay {
    /// Applies one decoded message from `origin` and performs its broadcasts.
    pub fn dispatch(&mut self, origin: &PeerHandle, message: InboundMessage) -> Delivery {
        let tag = message.tag();
        match message {
            InboundMessage::InitApp => self.register_app(origin),
            InboundMessage::InitVehicle => {
                self.register_vehicle(origin);
                Delivery::default()
            }
            message => {
                let route = route(&message);
                apply(&mut self.state, message);
                let delivery = self.broadcast_route(route);
                debug!(
                    "{tag} from conn {} delivered {} frames",
                    origin.id(),
                    delivery.delivered
                );
                delivery
            }
        }
    }

    /// Same mutation and broadcasts whether triggered by the schedule or on
    /// request.
    pub fn begin_conditioning(&mut self) -> Delivery {
        self.state.begin_conditioning();
        self.broadcast_route(CONDITIONING_ROUTE)
    }

    fn broadcast_route(&mut self, route: Route) -> Delivery {
        let mut delivery = self.announce(PeerRole::Vehicle, route.vehicles);
        delivery.merge(self.announce(PeerRole::App, route.apps));
        delivery
    }

    fn register_app(&mut self, origin: &PeerHandle) -> Delivery {
        match self.peers.role_of(origin.id()) {
            None => {
                self.peers.add_app(origin.clone());
                info!("app connected (conn {})", origin.id());
            }
            Some(PeerRole::App) => debug!("conn {} re-requested the app snapshot", origin.id()),
            Some(PeerRole::Vehicle) => {
                warn!(
                    "conn {} is registered as a vehicle; ignoring app init",
                    origin.id()
                );
                return Delivery::default();
            }
        }
        self.send_snapshot(origin)
    }

    fn register_vehicle(&mut self, origin: &PeerHandle) {
        match self.peers.role_of(origin.id()) {
            None => {
                self.peers.add_vehicle(origin.clone());
                info!("car connected (conn {})", origin.id());
            }
            Some(PeerRole::Vehicle) => debug!("conn {} repeated its car init", origin.id()),
            Some(PeerRole::App) => warn!(
                "conn {} is registered as an app; ignoring car init",
                origin.id()
            ),
        }
    }
}
