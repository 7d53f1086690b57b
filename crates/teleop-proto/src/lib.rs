pub mod command;
pub mod frame;

pub use command::{Command, CommandReply, ModeRequest, TolTarget};
pub use frame::ChannelFrame;
