use std::io::{Cursor, Read};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use mavlink::common::MavMessage;
use mavlink::MavlinkVersion;
use tracing::{info, warn};

use crate::transport::{is_timeout, SERIAL_READ_TIMEOUT};

/// Bytes kept for parsing; a MAVLink v2 frame is at most 280.
const SCAN_WINDOW: usize = 1024;

const MAV_STX_V2: u8 = 0xFD;

#[derive(Debug, Clone)]
pub struct PortAttempt {
    pub dev: String,
    pub baud: u32,
    pub hb_seen: bool,
    pub elapsed_ms: u64,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct AutodetectResult {
    pub chosen: Option<(String, u32)>,
    pub attempts: Vec<PortAttempt>,
}

impl AutodetectResult {
    /// Connection string for the chosen port, if any.
    pub fn url(&self) -> Option<String> {
        self.chosen.as_ref().map(|(dev, baud)| serial_url(dev, *baud))
    }
}

pub fn serial_url(dev: &str, baud: u32) -> String {
    format!("serial:{}:{}", dev, baud)
}

pub fn default_candidate_devs() -> Vec<String> {
    vec![
        "/dev/ttyUSB0".into(),
        "/dev/ttyUSB1".into(),
        "/dev/ttyACM0".into(),
        "/dev/ttyACM1".into(),
        "/dev/serial0".into(),
        "/dev/ttyAMA0".into(),
    ]
}

/// Telemetry radio and USB rates, most common first.
pub fn default_candidate_bauds() -> Vec<u32> {
    vec![57600, 115200, 921600]
}

/// Try every device/baud pair in order; stop at the first HEARTBEAT.
pub fn autodetect_link(
    candidate_devs: Vec<String>,
    candidate_bauds: Vec<u32>,
    heartbeat_timeout: Duration,
) -> AutodetectResult {
    let mut attempts = Vec::new();

    for dev in candidate_devs {
        for &baud in &candidate_bauds {
            let start = Instant::now();
            let (hb_seen, note) = match wait_heartbeat(&dev, baud, heartbeat_timeout) {
                Ok(true) => (true, "heartbeat".to_string()),
                Ok(false) => (false, "no heartbeat".to_string()),
                Err(e) => {
                    warn!("link autodetect: port check failed dev={} baud={} err={:#}", dev, baud, e);
                    (false, format!("open/connect failed: {:#}", e))
                }
            };

            attempts.push(PortAttempt {
                dev: dev.clone(),
                baud,
                hb_seen,
                elapsed_ms: start.elapsed().as_millis() as u64,
                note,
            });

            if hb_seen {
                info!("link autodetect: OK {} @ {}", dev, baud);
                return AutodetectResult { chosen: Some((dev, baud)), attempts };
            }
        }
    }

    AutodetectResult { chosen: None, attempts }
}

fn wait_heartbeat(dev: &str, baud: u32, timeout: Duration) -> Result<bool> {
    let mut port = tokio_serial::new(dev, baud)
        .timeout(SERIAL_READ_TIMEOUT.min(timeout))
        .open()
        .with_context(|| format!("open serial device {}", dev))?;
    // `port` closes when this returns, whatever the outcome.
    scan_for_heartbeat(&mut port, timeout)
}

/// Read `r` until a HEARTBEAT parses or `timeout` passes. Each read must
/// itself time out (serial ports opened with `.timeout(..)` do), so the
/// deadline holds even when the line is silent or full of noise.
fn scan_for_heartbeat<R: Read>(r: &mut R, timeout: Duration) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    let mut window = Vec::with_capacity(SCAN_WINDOW * 2);
    let mut chunk = [0u8; 256];

    while Instant::now() < deadline {
        match r.read(&mut chunk) {
            Ok(0) => std::thread::sleep(Duration::from_millis(10)),
            Ok(n) => {
                window.extend_from_slice(&chunk[..n]);
                if contains_heartbeat(&window) {
                    return Ok(true);
                }
                if window.len() > SCAN_WINDOW {
                    window.drain(..window.len() - SCAN_WINDOW);
                }
            }
            Err(e) if is_timeout(&e) => {}
            Err(e) => return Err(e).context("serial read"),
        }
    }
    Ok(false)
}

/// True if a complete HEARTBEAT frame starts anywhere in `bytes`.
///
/// Every start marker is tried on its own: a false marker in line noise
/// claims a length that can swallow the real frame behind it.
fn contains_heartbeat(bytes: &[u8]) -> bool {
    bytes.iter().enumerate().filter(|&(_, &b)| b == MAV_STX_V2).any(|(i, _)| {
        let mut cursor = Cursor::new(&bytes[i..]);
        matches!(
            mavlink::read_versioned_msg::<MavMessage, _>(&mut cursor, MavlinkVersion::V2),
            Ok((_, MavMessage::HEARTBEAT(_)))
        )
    })
}

#[cfg(test)]
mod tests {
    use mavlink::common::{MavAutopilot, MavModeFlag, MavState, MavType, HEARTBEAT_DATA};
    use mavlink::MavHeader;

    use super::*;

    #[test]
    fn chosen_port_becomes_serial_url() {
        let res = AutodetectResult { chosen: Some(("/dev/ttyACM0".into(), 115200)), attempts: Vec::new() };
        assert_eq!(res.url().as_deref(), Some("serial:/dev/ttyACM0:115200"));
        assert_eq!(AutodetectResult { chosen: None, attempts: Vec::new() }.url(), None);
    }

    #[test]
    fn missing_devices_are_reported_not_fatal() {
        let res = autodetect_link(
            vec!["/dev/does-not-exist-teleop".into()],
            vec![57600, 115200],
            Duration::from_millis(10),
        );
        assert!(res.chosen.is_none());
        assert_eq!(res.attempts.len(), 2);
        assert!(res.attempts.iter().all(|p| !p.hb_seen));
        assert!(res.attempts.iter().all(|p| p.note.contains("open serial device")));
    }

    fn encoded(msg: &MavMessage) -> Vec<u8> {
        let hdr = MavHeader { system_id: 1, component_id: 1, sequence: 7 };
        let mut buf = Vec::new();
        mavlink::write_versioned_msg(&mut buf, MavlinkVersion::V2, hdr, msg).unwrap();
        buf
    }

    fn heartbeat() -> MavMessage {
        MavMessage::HEARTBEAT(HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: MavType::MAV_TYPE_QUADROTOR,
            autopilot: MavAutopilot::MAV_AUTOPILOT_PX4,
            base_mode: MavModeFlag::empty(),
            system_status: MavState::MAV_STATE_STANDBY,
            mavlink_version: 3,
        })
    }

    /// Serial port stand-in: hands out `script` a chunk at a time, then
    /// either times out every read (a quiet line) or repeats noise forever
    /// (a line at the wrong baud rate).
    struct Line {
        script: Vec<Vec<u8>>,
        noisy: bool,
    }

    impl Read for Line {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_millis(2));
            if !self.script.is_empty() {
                let chunk = self.script.remove(0);
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                return Ok(n);
            }
            if self.noisy {
                let n = buf.len().min(64);
                buf[..n].iter_mut().enumerate().for_each(|(i, b)| *b = if i % 9 == 0 { 0xFD } else { i as u8 });
                return Ok(n);
            }
            Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out"))
        }
    }

    #[test]
    fn heartbeat_found_among_other_traffic() {
        let mut bytes = vec![0x00, 0xFD, 0x13, 0x37];
        bytes.extend(encoded(&MavMessage::COMMAND_ACK(Default::default())));
        bytes.extend(encoded(&heartbeat()));
        assert!(contains_heartbeat(&bytes));
        assert!(!contains_heartbeat(&bytes[..bytes.len() - 3]));
    }

    #[test]
    fn heartbeat_split_across_reads_is_found() {
        let hb = encoded(&heartbeat());
        let (a, b) = hb.split_at(5);
        let mut line = Line { script: vec![vec![0x55; 40], a.to_vec(), b.to_vec()], noisy: false };
        assert!(scan_for_heartbeat(&mut line, Duration::from_secs(2)).unwrap());
    }

    #[test]
    fn silent_line_gives_up_at_the_deadline() {
        let mut line = Line { script: Vec::new(), noisy: false };
        let start = Instant::now();
        assert!(!scan_for_heartbeat(&mut line, Duration::from_millis(100)).unwrap());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn noisy_line_gives_up_at_the_deadline() {
        let mut line = Line { script: Vec::new(), noisy: true };
        let start = Instant::now();
        assert!(!scan_for_heartbeat(&mut line, Duration::from_millis(100)).unwrap());
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
