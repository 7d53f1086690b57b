use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use teleop_core::{InputSource, Key, TeleopError};
use tracing::{debug, warn};

static RAW_MODE: AtomicBool = AtomicBool::new(false);

/// True while a [`RawModeGuard`] is alive.
pub fn raw_mode_active() -> bool {
    RAW_MODE.load(Ordering::Relaxed)
}

/// Holds the terminal in raw mode until dropped.
pub struct RawModeGuard {
    _priv: (),
}

impl RawModeGuard {
    pub fn acquire() -> io::Result<Self> {
        enable_raw_mode()?;
        RAW_MODE.store(true, Ordering::Relaxed);
        debug!("terminal: raw mode on");
        Ok(Self { _priv: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let res = disable_raw_mode();
        RAW_MODE.store(false, Ordering::Relaxed);
        match res {
            Ok(()) => debug!("terminal: raw mode off"),
            Err(e) => warn!("terminal: failed to restore cooked mode: {}", e),
        }
    }
}

/// Log sink for use while the terminal may be raw.
///
/// Raw mode turns off the terminal's `\n` to `\r\n` translation, so log lines
/// would stair-step across the screen. While raw mode is on, every bare `\n`
/// is written as `\r\n`; otherwise bytes pass through untouched.
pub struct LineSafe<W> {
    inner: W,
}

impl<W: Write> LineSafe<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for LineSafe<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !raw_mode_active() {
            return self.inner.write(buf);
        }
        self.inner.write_all(&crlf(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn crlf(buf: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(buf.len() + 8);
    for (i, &b) in buf.iter().enumerate() {
        if b == b'\n' && (i == 0 || buf[i - 1] != b'\r') {
            out.push(b'\r');
        }
        out.push(b);
    }
    out
}

/// Keyboard input from the controlling terminal.
///
/// Raw mode is held for as long as this value lives, so the terminal is
/// restored on every way out of the control loop, unwinding included.
pub struct Terminal {
    _raw: RawModeGuard,
}

impl Terminal {
    pub fn open() -> io::Result<Self> {
        Ok(Self { _raw: RawModeGuard::acquire()? })
    }
}

impl InputSource for Terminal {
    fn poll(&mut self, timeout: Duration) -> Result<Option<Key>, TeleopError> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        Ok(match event::read()? {
            Event::Key(ev) => map_key(ev),
            _ => None,
        })
    }
}

fn map_key(ev: KeyEvent) -> Option<Key> {
    if ev.kind == KeyEventKind::Release {
        return None;
    }
    match ev.code {
        KeyCode::Char('c') | KeyCode::Char('C') if ev.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Key::Interrupt)
        }
        // Ctrl-r is not r.
        KeyCode::Char(_) if ev.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => None,
        KeyCode::Char(c) => Some(Key::from_char(c)),
        _ => None,
    }
}
