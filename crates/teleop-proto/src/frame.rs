use serde::{Deserialize, Serialize};

/// Centre stick position, in microseconds.
pub const NEUTRAL: i32 = 1500;

/// Value written to the unused auxiliary channels.
pub const AUX_LOW: i32 = 1000;

pub const CHANNELS: usize = 8;

pub const ROLL: usize = 0;
pub const PITCH: usize = 1;
pub const THROTTLE: usize = 2;
pub const YAW: usize = 3;

/// Smallest value put on the wire. RC override reads 0 as "hand the channel
/// back to the radio".
pub const WIRE_MIN: u16 = 1;

/// Largest value put on the wire. `u16::MAX` means "ignore this channel".
pub const WIRE_MAX: u16 = u16::MAX - 1;

/// One RC override frame: roll, pitch, throttle, yaw, then four aux channels.
///
/// Values are kept exact as `i32`; only [`ChannelFrame::to_wire`] narrows
/// them. Frames are never patched in place; the controller builds a new one
/// every cycle with [`ChannelFrame::assemble`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFrame {
    pub channels: [i32; CHANNELS],
}

impl ChannelFrame {
    pub fn assemble(throttle: i32, roll: i32, pitch: i32) -> Self {
        let mut channels = [AUX_LOW; CHANNELS];
        channels[ROLL] = roll;
        channels[PITCH] = pitch;
        channels[THROTTLE] = throttle;
        channels[YAW] = NEUTRAL;
        Self { channels }
    }

    pub fn roll(&self) -> i32 { self.channels[ROLL] }
    pub fn pitch(&self) -> i32 { self.channels[PITCH] }
    pub fn throttle(&self) -> i32 { self.channels[THROTTLE] }
    pub fn yaw(&self) -> i32 { self.channels[YAW] }

    pub fn aux(&self) -> &[i32] {
        &self.channels[YAW + 1..]
    }

    /// Channel values as sent in RC_CHANNELS_OVERRIDE.
    ///
    /// Values inside `WIRE_MIN..=WIRE_MAX` pass unchanged; anything outside is
    /// pinned to the nearest bound so the two reserved values are never sent.
    pub fn to_wire(&self) -> [u16; CHANNELS] {
        self.channels.map(wire_value)
    }
}

pub fn wire_value(v: i32) -> u16 {
    v.clamp(WIRE_MIN as i32, WIRE_MAX as i32) as u16
}
