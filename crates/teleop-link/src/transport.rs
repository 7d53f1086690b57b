use std::io::{self, BufReader};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use mavlink::common::MavMessage;
use mavlink::error::MessageReadError;
use mavlink::{MavConnection, MavHeader, MavlinkVersion};
use tokio_serial::SerialPort;

/// Longest a serial read blocks before the reader thread gets control back.
pub const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Byte-level MAVLink link. `recv` and `send` may be called from different
/// threads at the same time and must not wait on each other.
pub trait MavTransport: Send + Sync {
    /// `Ok(None)` when nothing arrived before the read timeout.
    fn recv(&self) -> Result<Option<(MavHeader, MavMessage)>>;
    fn send(&self, hdr: &MavHeader, msg: &MavMessage) -> Result<()>;
}

/// UDP/TCP connections from `mavlink::connect`. Those keep separate reader
/// and writer locks, so a blocked `recv` never holds up `send`.
pub struct NetTransport {
    conn: Box<dyn MavConnection<MavMessage> + Send + Sync>,
}

impl MavTransport for NetTransport {
    fn recv(&self) -> Result<Option<(MavHeader, MavMessage)>> {
        let (hdr, msg) = self.conn.recv().map_err(|e| anyhow!("mavlink recv: {}", e))?;
        Ok(Some((hdr, msg)))
    }

    fn send(&self, hdr: &MavHeader, msg: &MavMessage) -> Result<()> {
        self.conn.send(hdr, msg).context("mavlink send")?;
        Ok(())
    }
}

/// Serial port with independent read and write handles and a read timeout.
///
/// `mavlink`'s own serial connection holds one port lock across a blocking
/// read, which starves writes while the vehicle is silent.
pub struct SerialTransport {
    reader: Mutex<BufReader<Box<dyn SerialPort>>>,
    writer: Mutex<Box<dyn SerialPort>>,
}

impl SerialTransport {
    pub fn open(dev: &str, baud: u32, read_timeout: Duration) -> Result<Self> {
        let port = tokio_serial::new(dev, baud)
            .timeout(read_timeout)
            .open()
            .with_context(|| format!("open serial device {}", dev))?;
        let writer = port.try_clone().with_context(|| format!("clone serial handle {}", dev))?;
        Ok(Self { reader: Mutex::new(BufReader::new(port)), writer: Mutex::new(writer) })
    }
}

impl MavTransport for SerialTransport {
    fn recv(&self) -> Result<Option<(MavHeader, MavMessage)>> {
        let mut port = lock(&self.reader);
        match mavlink::read_versioned_msg::<MavMessage, _>(&mut *port, MavlinkVersion::V2) {
            Ok(m) => Ok(Some(m)),
            Err(MessageReadError::Io(e)) if is_timeout(&e) => Ok(None),
            Err(e) => Err(anyhow!("mavlink recv: {}", e)),
        }
    }

    fn send(&self, hdr: &MavHeader, msg: &MavMessage) -> Result<()> {
        let mut port = lock(&self.writer);
        mavlink::write_versioned_msg(&mut *port, MavlinkVersion::V2, *hdr, msg).context("mavlink send")?;
        Ok(())
    }
}

/// Open `url`: `serial:<dev>:<baud>` gets a [`SerialTransport`], anything
/// else goes to `mavlink::connect`.
pub fn open_transport(url: &str) -> Result<Arc<dyn MavTransport>> {
    if url.starts_with("serial:") {
        let (dev, baud) = parse_serial_url(url)
            .ok_or_else(|| anyhow!("bad serial url {} (want serial:<dev>:<baud>)", url))?;
        return Ok(Arc::new(SerialTransport::open(dev, baud, SERIAL_READ_TIMEOUT)?));
    }
    let conn = mavlink::connect::<MavMessage>(url).with_context(|| format!("mavlink connect {}", url))?;
    Ok(Arc::new(NetTransport { conn }))
}

pub(crate) fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// `serial:/dev/ttyUSB0:57600` -> ("/dev/ttyUSB0", 57600)
pub fn parse_serial_url(url: &str) -> Option<(&str, u32)> {
    let rest = url.strip_prefix("serial:")?;
    let (dev, baud) = rest.rsplit_once(':')?;
    Some((dev, baud.parse().ok()?))
}
