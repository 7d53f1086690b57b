//! PX4 custom mode names.
//!
//! PX4 packs its flight mode into the 32-bit custom mode as
//! `main << 16 | sub << 24`; DO_SET_MODE takes main and sub as separate params.

pub const MAIN_MANUAL: u8 = 1;
pub const MAIN_ALTCTL: u8 = 2;
pub const MAIN_POSCTL: u8 = 3;
pub const MAIN_AUTO: u8 = 4;
pub const MAIN_ACRO: u8 = 5;
pub const MAIN_OFFBOARD: u8 = 6;
pub const MAIN_STABILIZED: u8 = 7;
pub const MAIN_RATTITUDE: u8 = 8;

pub const AUTO_READY: u8 = 1;
pub const AUTO_TAKEOFF: u8 = 2;
pub const AUTO_LOITER: u8 = 3;
pub const AUTO_MISSION: u8 = 4;
pub const AUTO_RTL: u8 = 5;
pub const AUTO_LAND: u8 = 6;

const MODES: &[(&str, u8, u8)] = &[
    ("MANUAL", MAIN_MANUAL, 0),
    ("ALTCTL", MAIN_ALTCTL, 0),
    ("POSCTL", MAIN_POSCTL, 0),
    ("ACRO", MAIN_ACRO, 0),
    ("OFFBOARD", MAIN_OFFBOARD, 0),
    ("STABILIZED", MAIN_STABILIZED, 0),
    ("RATTITUDE", MAIN_RATTITUDE, 0),
    ("AUTO.READY", MAIN_AUTO, AUTO_READY),
    ("AUTO.TAKEOFF", MAIN_AUTO, AUTO_TAKEOFF),
    ("AUTO.LOITER", MAIN_AUTO, AUTO_LOITER),
    ("AUTO.MISSION", MAIN_AUTO, AUTO_MISSION),
    ("AUTO.RTL", MAIN_AUTO, AUTO_RTL),
    ("AUTO.LAND", MAIN_AUTO, AUTO_LAND),
];

/// (main, sub) for a mode name. Case-insensitive.
pub fn mode_numbers(name: &str) -> Option<(u8, u8)> {
    let name = name.trim();
    MODES
        .iter()
        .find(|(n, _, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, main, sub)| (main, sub))
}

pub fn pack(main: u8, sub: u8) -> u32 {
    (main as u32) << 16 | (sub as u32) << 24
}

/// Name of a HEARTBEAT custom mode, if it is one we know.
pub fn mode_name(custom_mode: u32) -> Option<&'static str> {
    let main = ((custom_mode >> 16) & 0xff) as u8;
    let sub = ((custom_mode >> 24) & 0xff) as u8;
    MODES
        .iter()
        .find(|&&(_, m, s)| m == main && (s == sub || main != MAIN_AUTO))
        .map(|&(n, _, _)| n)
}
