use crate::mode::ControlMode;

#[derive(Debug, thiserror::Error)]
pub enum TeleopError {
    /// The request never completed: link down, send failed, no ack in time.
    #[error("transport fault on {endpoint}: {reason}")]
    TransportFault { endpoint: String, reason: String },

    /// The vehicle answered and said no.
    #[error("{0} request rejected by vehicle")]
    RemoteRejected(&'static str),

    #[error("input source: {0}")]
    Input(#[from] std::io::Error),

    #[error("control mode {0} is not implemented")]
    UnsupportedMode(ControlMode),
}

impl TeleopError {
    pub fn transport(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        TeleopError::TransportFault { endpoint: endpoint.into(), reason: reason.to_string() }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, TeleopError::TransportFault { .. })
    }
}
