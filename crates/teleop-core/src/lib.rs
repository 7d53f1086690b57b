pub mod controller;
pub mod error;
pub mod gateway;
pub mod key;
pub mod mode;

pub use controller::{ControllerConfig, ControllerState, RunSummary, TeleopController};
pub use error::TeleopError;
pub use gateway::{CommandGateway, InputSource};
pub use key::{Action, Key};
pub use mode::ControlMode;
