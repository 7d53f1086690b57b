pub mod autodetect;
pub mod doctor;
pub mod endpoints;
pub mod mav;
pub mod px4;
pub mod state;
pub mod transport;

use serde::Deserialize;

pub use endpoints::Endpoints;
pub use mav::MavGateway;
pub use state::LinkStatus;
pub use transport::{open_transport, MavTransport};

pub const DEFAULT_CONNECT: &str = "udpin:0.0.0.0:14550";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// `udpin:`, `udpout:`, `tcpout:` (via `mavlink::connect`) or `serial:<dev>:<baud>`.
    /// Leave unset together with `autodetect = true` to scan serial ports.
    pub connect: Option<String>,

    /// Try candidate serial ports/bauds and pick the first that yields a
    /// HEARTBEAT. Only used when `connect` is unset.
    pub autodetect: bool,

    /// Autodetect candidates (paths). Example:
    /// ["/dev/ttyUSB0","/dev/ttyACM0"]
    pub candidate_devs: Option<Vec<String>>,
    pub candidate_bauds: Option<Vec<u32>>,

    /// Heartbeat wait per port/baud attempt
    pub heartbeat_timeout_ms: Option<u64>,

    /// Our MAVLink ids (operator station)
    pub sys_id: u8,
    pub comp_id: u8,

    /// Vehicle system/component. 1/1 is the autopilot on most setups.
    pub target_sys: u8,
    pub target_comp: u8,

    /// How long a command waits for its COMMAND_ACK.
    pub command_timeout_ms: u64,

    /// Operator heartbeat rate. Default 1 Hz.
    pub send_heartbeat_hz: Option<f32>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connect: Some(DEFAULT_CONNECT.to_string()),
            autodetect: false,
            candidate_devs: None,
            candidate_bauds: None,
            heartbeat_timeout_ms: None,
            sys_id: 255,
            comp_id: 190,
            target_sys: 1,
            target_comp: 1,
            command_timeout_ms: 1500,
            send_heartbeat_hz: None,
        }
    }
}
