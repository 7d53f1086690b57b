use std::fmt;

use crate::error::TeleopError;

/// Operator control scheme, picked once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    RcOverride,
    AttitudeSetpoint,
    VelocitySetpoint,
    PositionSetpoint,
}

impl ControlMode {
    /// Only RC override has a controller behind it; the setpoint modes are
    /// refused here so startup stops before the terminal or link is touched.
    pub fn ensure_supported(self) -> Result<Self, TeleopError> {
        match self {
            ControlMode::RcOverride => Ok(self),
            other => Err(TeleopError::UnsupportedMode(other)),
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControlMode::RcOverride => "rc-override",
            ControlMode::AttitudeSetpoint => "attitude-setpoint",
            ControlMode::VelocitySetpoint => "velocity-setpoint",
            ControlMode::PositionSetpoint => "position-setpoint",
        };
        f.write_str(s)
    }
}
