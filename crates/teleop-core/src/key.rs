use teleop_proto::frame::NEUTRAL;
use teleop_proto::{Command, ModeRequest, TolTarget};

/// Raw byte a terminal in raw mode produces for Ctrl-C.
pub const CTRL_C: char = '\x03';

pub const THROTTLE_STEP: i32 = 10;
pub const THROTTLE_DEFAULT: i32 = NEUTRAL;

pub const DEFLECT_HIGH: i32 = 1800;
pub const DEFLECT_LOW: i32 = 1200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Interrupt,
}

impl Key {
    pub fn from_char(c: char) -> Self {
        if c == CTRL_C { Key::Interrupt } else { Key::Char(c) }
    }
}

/// What one keystroke does to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Command(Command),
    ThrottleUp,
    ThrottleReset,
    ThrottleDown,
    /// Roll deflection for this cycle only.
    Roll(i32),
    /// Pitch deflection for this cycle only.
    Pitch(i32),
    Stop,
    Idle,
}

impl Action {
    pub fn for_key(key: Option<Key>) -> Self {
        let c = match key {
            None => return Action::Idle,
            Some(Key::Interrupt) => return Action::Stop,
            Some(Key::Char(c)) => c,
        };
        match c {
            '1' => Action::Command(Command::Arm),
            '2' => Action::Command(Command::Disarm),
            '3' => Action::Command(Command::Takeoff(TolTarget::takeoff_waypoint())),
            '4' => Action::Command(Command::Land(TolTarget::land_waypoint())),
            'h' => Action::Command(Command::SetMode(ModeRequest::custom("STABILIZED"))),
            '0' => Action::Command(Command::SetMode(ModeRequest::custom("OFFBOARD"))),
            'r' => Action::ThrottleUp,
            'f' => Action::ThrottleReset,
            'v' => Action::ThrottleDown,
            'j' => Action::Roll(DEFLECT_HIGH),
            'l' => Action::Roll(DEFLECT_LOW),
            'i' => Action::Pitch(DEFLECT_HIGH),
            'k' => Action::Pitch(DEFLECT_LOW),
            CTRL_C => Action::Stop,
            _ => Action::Idle,
        }
    }
}
