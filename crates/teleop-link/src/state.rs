use std::time::{Duration, Instant};

use mavlink::common::{MavModeFlag, HEARTBEAT_DATA};

use crate::px4;

/// What the reader thread has learned about the vehicle.
#[derive(Debug, Clone, Default)]
pub struct LinkStatus {
    pub connected: bool,
    pub url: Option<String>,
    pub last_heartbeat: Option<Instant>,
    pub armed: bool,
    pub custom_mode: Option<u32>,
    pub acks_seen: u64,
}

impl LinkStatus {
    pub fn hb_age(&self) -> Option<Duration> {
        self.last_heartbeat.map(|t| t.elapsed())
    }

    pub fn mode_name(&self) -> Option<&'static str> {
        self.custom_mode.and_then(px4::mode_name)
    }

    /// Returns true when the armed flag or flight mode changed.
    pub fn on_heartbeat(&mut self, hb: &HEARTBEAT_DATA) -> bool {
        let armed = hb.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED);
        let changed = !self.connected || armed != self.armed || self.custom_mode != Some(hb.custom_mode);
        self.connected = true;
        self.last_heartbeat = Some(Instant::now());
        self.armed = armed;
        self.custom_mode = Some(hb.custom_mode);
        changed
    }
}
