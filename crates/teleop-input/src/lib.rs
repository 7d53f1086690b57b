pub mod term;

pub use term::{raw_mode_active, LineSafe, RawModeGuard, Terminal};
