use std::time::Duration;

use teleop_proto::{ChannelFrame, CommandReply, ModeRequest, TolTarget};

use crate::error::TeleopError;
use crate::key::Key;

/// Where keystrokes come from.
pub trait InputSource {
    /// Wait at most `timeout` for one key. `Ok(None)` means nothing was pressed.
    fn poll(&mut self, timeout: Duration) -> Result<Option<Key>, TeleopError>;
}

/// Vehicle side of the controller: request/response commands plus the
/// fire-and-forget override broadcast.
///
/// Command timeouts are the gateway's business; a call that cannot complete
/// comes back as [`TeleopError::TransportFault`].
pub trait CommandGateway {
    fn arm(&mut self, enable: bool) -> Result<CommandReply, TeleopError>;
    fn takeoff(&mut self, target: &TolTarget) -> Result<CommandReply, TeleopError>;
    fn land(&mut self, target: &TolTarget) -> Result<CommandReply, TeleopError>;
    fn set_mode(&mut self, mode: &ModeRequest) -> Result<CommandReply, TeleopError>;
    fn broadcast_frame(&mut self, frame: &ChannelFrame) -> Result<(), TeleopError>;
}
