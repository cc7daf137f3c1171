pub const TAG_INIT_REQUEST_APP: &str = "INIT_REQUEST_APP";
pub const TAG_INIT_REQUEST_LEGACY: &str = "INIT_REQUEST";
pub const TAG_INIT_REQUEST_CAR: &str = "INIT_REQUEST_CAR";

pub const TAG_BATTERY: &str = "BATTERY";
pub const TAG_SPEED: &str = "SPEED";
pub const TAG_TEMPERATURE: &str = "TEMPERATURE";
pub const TAG_COORDS_CAR: &str = "COORDS_CAR";
pub const TAG_COORDS_APP: &str = "COORDS_APP";

pub const TAG_TEMPERATURE_TARGET: &str = "TEMPERATURE_TARGET";
pub const TAG_TEMPERATURE_SET: &str = "TEMPERATURE_SET";
pub const TAG_TEMPERATURE_STATE: &str = "TEMPERATURE_STATE";
pub const TAG_CHARGING_STATE: &str = "CHARGING_STATE";
pub const TAG_CHARGING_SET: &str = "CHARGING_SET";

pub const TAG_SCHEDULE: &str = "SCHEDULE";
pub const TAG_SCHEDULE_GET: &str = "SCHEDULE_GET";
