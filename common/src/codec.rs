//! Wire codec for relay frames.
//!
//! Every frame is a JSON object `{"type": TAG, "payload": {...}}`. Inbound
//! payload values are coerced leniently: numbers may arrive as JSON numbers or
//! numeric strings, booleans as JSON booleans, numbers or `"true"`/`"false"`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    schedule::{InvalidTimestamp, Schedule},
    topics::*,
    types::Position,
};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is not a json object")]
    NotAnObject,
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("{tag}: missing payload field `{field}`")]
    MissingField {
        tag: &'static str,
        field: &'static str,
    },
    #[error("{tag}: payload field `{field}` is not a valid {expected}")]
    InvalidField {
        tag: &'static str,
        field: &'static str,
        expected: &'static str,
    },
    #[error("SCHEDULE: {0}")]
    Schedule(#[from] InvalidTimestamp),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("unknown message type {0:?}")]
    UnknownType(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    InitApp,
    InitVehicle,
    Battery { percent: f64 },
    Speed { kmph: f64 },
    Temperature { celsius: f64 },
    TemperatureTargetQuery,
    TemperatureSet { target: f64 },
    TemperatureControl { enabled: bool },
    ChargingQuery,
    ChargingSet { charging: bool },
    VehiclePosition(Position),
    AppPosition(Position),
    ReplaceSchedule(Schedule),
    ScheduleQuery,
}

impl InboundMessage {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::InitApp => TAG_INIT_REQUEST_APP,
            Self::InitVehicle => TAG_INIT_REQUEST_CAR,
            Self::Battery { .. } => TAG_BATTERY,
            Self::Speed { .. } => TAG_SPEED,
            Self::Temperature { .. } => TAG_TEMPERATURE,
            Self::TemperatureTargetQuery => TAG_TEMPERATURE_TARGET,
            Self::TemperatureSet { .. } => TAG_TEMPERATURE_SET,
            Self::TemperatureControl { .. } => TAG_TEMPERATURE_STATE,
            Self::ChargingQuery => TAG_CHARGING_STATE,
            Self::ChargingSet { .. } => TAG_CHARGING_SET,
            Self::VehiclePosition(_) => TAG_COORDS_CAR,
            Self::AppPosition(_) => TAG_COORDS_APP,
            Self::ReplaceSchedule(_) => TAG_SCHEDULE,
            Self::ScheduleQuery => TAG_SCHEDULE_GET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    Battery { percent: f64 },
    ChargingState { charging: bool },
    Speed { speed: f64 },
    Temperature { temp: f64 },
    TemperatureState { state: bool },
    TemperatureTarget { target: f64 },
    TemperatureSet { temp: f64 },
    CoordsCar { latitude: f64, longitude: f64 },
    CoordsApp { latitude: f64, longitude: f64 },
    Schedule { schedule: Vec<String> },
}

impl OutboundMessage {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub fn decode(text: &str) -> Result<InboundMessage, FrameError> {
    let frame: Value = serde_json::from_str(text).map_err(DecodeError::from)?;
    let Value::Object(frame) = frame else {
        return Err(DecodeError::NotAnObject.into());
    };
    let Some(tag) = frame.get("type").and_then(Value::as_str) else {
        return Err(DecodeError::MissingType.into());
    };

    let empty = Map::new();
    let payload = Payload {
        fields: frame
            .get("payload")
            .and_then(Value::as_object)
            .unwrap_or(&empty),
    };

    let message = match tag {
        TAG_INIT_REQUEST_APP | TAG_INIT_REQUEST_LEGACY => InboundMessage::InitApp,
        TAG_INIT_REQUEST_CAR => InboundMessage::InitVehicle,
        TAG_BATTERY => InboundMessage::Battery {
            percent: payload.number(TAG_BATTERY, "percent")?,
        },
        TAG_SPEED => InboundMessage::Speed {
            kmph: payload.number(TAG_SPEED, "speed")?,
        },
        TAG_TEMPERATURE => InboundMessage::Temperature {
            celsius: payload.number(TAG_TEMPERATURE, "temp")?,
        },
        TAG_TEMPERATURE_TARGET => InboundMessage::TemperatureTargetQuery,
        TAG_TEMPERATURE_SET => InboundMessage::TemperatureSet {
            target: payload.number(TAG_TEMPERATURE_SET, "target")?,
        },
        TAG_TEMPERATURE_STATE => InboundMessage::TemperatureControl {
            enabled: payload.flag(TAG_TEMPERATURE_STATE, "state")?,
        },
        TAG_CHARGING_STATE => InboundMessage::ChargingQuery,
        TAG_CHARGING_SET => InboundMessage::ChargingSet {
            charging: payload.flag(TAG_CHARGING_SET, "charging")?,
        },
        TAG_COORDS_CAR => InboundMessage::VehiclePosition(payload.position(TAG_COORDS_CAR)?),
        TAG_COORDS_APP => InboundMessage::AppPosition(payload.position(TAG_COORDS_APP)?),
        TAG_SCHEDULE => InboundMessage::ReplaceSchedule(payload.schedule()?),
        TAG_SCHEDULE_GET => InboundMessage::ScheduleQuery,
        other => return Err(FrameError::UnknownType(other.to_string())),
    };

    Ok(message)
}

struct Payload<'a> {
    fields: &'a Map<String, Value>,
}

impl Payload<'_> {
    fn field(&self, tag: &'static str, field: &'static str) -> Result<&Value, DecodeError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Err(DecodeError::MissingField { tag, field }),
            Some(value) => Ok(value),
        }
    }

    fn number(&self, tag: &'static str, field: &'static str) -> Result<f64, DecodeError> {
        let value = match self.field(tag, field)? {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };

        value
            .filter(|value| value.is_finite())
            .ok_or(DecodeError::InvalidField {
                tag,
                field,
                expected: "number",
            })
    }

    fn flag(&self, tag: &'static str, field: &'static str) -> Result<bool, DecodeError> {
        let value = match self.field(tag, field)? {
            Value::Bool(flag) => Some(*flag),
            Value::Number(number) => number.as_f64().map(|value| value != 0.0),
            Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        };

        value.ok_or(DecodeError::InvalidField {
            tag,
            field,
            expected: "boolean",
        })
    }

    fn position(&self, tag: &'static str) -> Result<Position, DecodeError> {
        Ok(Position {
            latitude: self.number(tag, "latitude")?,
            longitude: self.number(tag, "longitude")?,
        })
    }

    fn schedule(&self) -> Result<Schedule, DecodeError> {
        let invalid = DecodeError::InvalidField {
            tag: TAG_SCHEDULE,
            field: "schedule",
            expected: "list of timestamps",
        };
        let Value::Array(items) = self.field(TAG_SCHEDULE, "schedule")? else {
            return Err(invalid);
        };

        let raw = items
            .iter()
            .map(Value::as_str)
            .collect::<Option<Vec<_>>>()
            .ok_or(invalid)?;

        Ok(Schedule::parse(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_telemetry_with_string_numbers() {
        let message = decode(r#"{"type":"BATTERY","payload":{"percent":"0.8"}}"#).unwrap();
        assert_eq!(message, InboundMessage::Battery { percent: 0.8 });

        let message = decode(r#"{"type":"SPEED","payload":{"speed":42}}"#).unwrap();
        assert_eq!(message, InboundMessage::Speed { kmph: 42.0 });
    }

    #[test]
    fn coerces_numeric_and_textual_flags() {
        let on = decode(r#"{"type":"TEMPERATURE_STATE","payload":{"state":1}}"#).unwrap();
        let off = decode(r#"{"type":"CHARGING_SET","payload":{"charging":"False"}}"#).unwrap();

        assert_eq!(on, InboundMessage::TemperatureControl { enabled: true });
        assert_eq!(off, InboundMessage::ChargingSet { charging: false });
    }

    #[test]
    fn legacy_init_tag_is_an_app_init() {
        assert_eq!(decode(r#"{"type":"INIT_REQUEST"}"#).unwrap(), InboundMessage::InitApp);
    }

    #[test]
    fn queries_ignore_payload() {
        let message = decode(r#"{"type":"SCHEDULE_GET","payload":{"anything":true}}"#).unwrap();
        assert_eq!(message, InboundMessage::ScheduleQuery);
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(
            decode("{not json"),
            Err(FrameError::Decode(DecodeError::Json(_)))
        ));
        assert!(matches!(
            decode("[1, 2]"),
            Err(FrameError::Decode(DecodeError::NotAnObject))
        ));
        assert!(matches!(
            decode(r#"{"payload":{}}"#),
            Err(FrameError::Decode(DecodeError::MissingType))
        ));
    }

    #[test]
    fn rejects_missing_and_invalid_fields() {
        assert!(matches!(
            decode(r#"{"type":"BATTERY","payload":{}}"#),
            Err(FrameError::Decode(DecodeError::MissingField {
                field: "percent",
                ..
            }))
        ));
        assert!(matches!(
            decode(r#"{"type":"COORDS_CAR","payload":{"latitude":1.0,"longitude":"east"}}"#),
            Err(FrameError::Decode(DecodeError::InvalidField {
                field: "longitude",
                ..
            }))
        ));
        assert!(matches!(
            decode(r#"{"type":"CHARGING_SET","payload":{"charging":"maybe"}}"#),
            Err(FrameError::Decode(DecodeError::InvalidField { .. }))
        ));
    }

    #[test]
    fn rejects_bad_schedules() {
        assert!(matches!(
            decode(r#"{"type":"SCHEDULE","payload":{"schedule":"2023-04-17T08:00:00"}}"#),
            Err(FrameError::Decode(DecodeError::InvalidField { .. }))
        ));
        assert!(matches!(
            decode(r#"{"type":"SCHEDULE","payload":{"schedule":["2023-04-17T08:00:00", "soon"]}}"#),
            Err(FrameError::Decode(DecodeError::Schedule(_)))
        ));
    }

    #[test]
    fn accepts_utc_and_offset_schedules() {
        let message = decode(
            r#"{"type":"SCHEDULE","payload":{"schedule":["2023-04-17T08:00:00.000Z","2023-04-17T08:00:00+02:00"]}}"#,
        )
        .unwrap();

        let schedule = match message {
            InboundMessage::ReplaceSchedule(schedule) => schedule,
            other => panic!("expected a schedule replacement, got {other:?}"),
        };
        assert_eq!(
            schedule.raw_entries(),
            vec!["2023-04-17T08:00:00.000Z", "2023-04-17T08:00:00+02:00"]
        );
        assert!(schedule
            .entries()
            .iter()
            .all(|entry| entry.start() == chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap()));
    }

    #[test]
    fn unknown_type_is_distinct_from_decode_errors() {
        match decode(r#"{"type":"HONK","payload":{}}"#) {
            Err(FrameError::UnknownType(tag)) => assert_eq!(tag, "HONK"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn outbound_frames_use_type_and_payload() {
        let frame = OutboundMessage::CoordsApp {
            latitude: 50.06,
            longitude: 19.91,
        }
        .encode()
        .unwrap();

        assert_eq!(
            serde_json::from_str::<Value>(&frame).unwrap(),
            serde_json::json!({
                "type": "COORDS_APP",
                "payload": {"latitude": 50.06, "longitude": 19.91}
            })
        );

        let frame = OutboundMessage::TemperatureSet { temp: 22.5 }.encode().unwrap();
        assert_eq!(frame, r#"{"type":"TEMPERATURE_SET","payload":{"temp":22.5}}"#);
    }
}
