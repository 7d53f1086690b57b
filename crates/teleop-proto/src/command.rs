use serde::{Deserialize, Serialize};

/// Fixed test waypoint used by the takeoff and land keys.
pub const TEST_WAYPOINT_LAT: f64 = 47.397751;
pub const TEST_WAYPOINT_LON: f64 = 8.545607;
pub const TAKEOFF_ALT_M: f32 = 10.0;

/// Base mode sent along with every custom mode request.
pub const SET_MODE_BASE: u8 = 2;

/// Takeoff / land target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TolTarget {
    pub min_pitch: f32,
    pub yaw: f32,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f32,
}

impl TolTarget {
    pub fn takeoff_waypoint() -> Self {
        Self {
            min_pitch: 0.0,
            yaw: 0.0,
            latitude: TEST_WAYPOINT_LAT,
            longitude: TEST_WAYPOINT_LON,
            altitude: TAKEOFF_ALT_M,
        }
    }

    pub fn land_waypoint() -> Self {
        Self { altitude: 0.0, ..Self::takeoff_waypoint() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeRequest {
    pub base_mode: u8,
    pub custom_mode: String,
}

impl ModeRequest {
    pub fn custom(name: &str) -> Self {
        Self { base_mode: SET_MODE_BASE, custom_mode: name.to_string() }
    }
}

/// A one-shot vehicle command. Carries its whole payload; nothing about it
/// outlives the dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Arm,
    Disarm,
    Takeoff(TolTarget),
    Land(TolTarget),
    SetMode(ModeRequest),
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Command::Arm => "ARM",
            Command::Disarm => "DISARM",
            Command::Takeoff(_) => "TAKEOFF",
            Command::Land(_) => "LAND",
            Command::SetMode(_) => "SET MODE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    pub success: bool,
}

impl CommandReply {
    pub fn ok() -> Self { Self { success: true } }
    pub fn rejected() -> Self { Self { success: false } }
}
