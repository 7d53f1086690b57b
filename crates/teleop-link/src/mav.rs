use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use mavlink::{
    common::{
        MavAutopilot, MavCmd, MavMessage, MavModeFlag, MavResult, MavState, MavType,
        COMMAND_ACK_DATA, COMMAND_LONG_DATA, HEARTBEAT_DATA, RC_CHANNELS_OVERRIDE_DATA,
    },
    MavHeader,
};
use teleop_core::{CommandGateway, TeleopError};
use teleop_proto::{ChannelFrame, CommandReply, ModeRequest, TolTarget};
use tracing::{debug, info, warn};

use crate::endpoints::Endpoints;
use crate::px4;
use crate::state::LinkStatus;
use crate::transport::{lock, open_transport, MavTransport};
use crate::LinkConfig;

/// Outbound queue depth. At most one slot is ever taken by a frame wake-up.
const OUTBOX_DEPTH: usize = 8;

enum Outgoing {
    /// The latest-frame slot was filled.
    Frame,
    Message(MavMessage),
}

/// MAVLink implementation of [`CommandGateway`].
///
/// Nothing here touches the transport. Commands and frames are handed to a
/// writer thread through a bounded queue; commands then wait for their
/// COMMAND_ACK up to `command_timeout_ms`. A frame only replaces the pending
/// one, so a stalled link costs stale frames, never a blocked control loop.
pub struct MavGateway {
    outbox: SyncSender<Outgoing>,
    pending_frame: Arc<Mutex<Option<RC_CHANNELS_OVERRIDE_DATA>>>,
    endpoints: Endpoints,
    target_sys: u8,
    target_comp: u8,
    command_timeout: Duration,
    acks: Receiver<COMMAND_ACK_DATA>,
    status: Arc<Mutex<LinkStatus>>,
    stop: Arc<AtomicBool>,
}

impl MavGateway {
    pub fn open(url: &str, cfg: &LinkConfig, endpoints: Endpoints) -> Result<Self> {
        let transport = open_transport(url)?;
        let gw = Self::with_transport(transport, url, cfg, endpoints)?;
        info!("link: {} open, namespace {}", url, gw.endpoints.namespace());
        Ok(gw)
    }

    /// Start the reader and writer threads over an already open transport.
    pub fn with_transport(
        transport: Arc<dyn MavTransport>,
        url: &str,
        cfg: &LinkConfig,
        endpoints: Endpoints,
    ) -> Result<Self> {
        let status = Arc::new(Mutex::new(LinkStatus { url: Some(url.to_string()), ..Default::default() }));
        let stop = Arc::new(AtomicBool::new(false));
        let pending_frame = Arc::new(Mutex::new(None));
        let (ack_tx, acks) = mpsc::channel();
        let (outbox, queue) = mpsc::sync_channel(OUTBOX_DEPTH);

        let hb_hz = cfg.send_heartbeat_hz.unwrap_or(1.0).max(0.2);
        let writer = Writer {
            transport: transport.clone(),
            queue,
            pending_frame: pending_frame.clone(),
            sys_id: cfg.sys_id,
            comp_id: cfg.comp_id,
            seq: 0,
            hb_interval: Duration::from_secs_f32(1.0 / hb_hz),
        };
        std::thread::Builder::new()
            .name("mav-writer".into())
            .spawn(move || writer.run())
            .context("spawn mavlink writer")?;

        let reader = Reader {
            transport,
            target_sys: cfg.target_sys,
            acks: ack_tx,
            status: status.clone(),
            stop: stop.clone(),
        };
        // Detached: a network recv can block indefinitely and must not hold
        // up shutdown.
        std::thread::Builder::new()
            .name("mav-reader".into())
            .spawn(move || reader.run())
            .context("spawn mavlink reader")?;

        Ok(Self {
            outbox,
            pending_frame,
            endpoints,
            target_sys: cfg.target_sys,
            target_comp: cfg.target_comp,
            command_timeout: Duration::from_millis(cfg.command_timeout_ms),
            acks,
            status,
            stop,
        })
    }

    pub fn status(&self) -> LinkStatus {
        lock(&self.status).clone()
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn command(&mut self, endpoint: &str, cmd: MavCmd, params: [f32; 7]) -> Result<CommandReply, TeleopError> {
        // Acks for earlier, timed-out requests must not answer this one.
        while self.acks.try_recv().is_ok() {}

        let msg = command_long(self.target_sys, self.target_comp, cmd, params);
        self.outbox.try_send(Outgoing::Message(msg)).map_err(|e| {
            let reason = match e {
                TrySendError::Full(_) => "outbound queue full, link stalled",
                TrySendError::Disconnected(_) => "link writer stopped",
            };
            TeleopError::transport(endpoint, reason)
        })?;
        info!("{}: sent {:?}", endpoint, cmd);

        await_ack(&self.acks, cmd, self.command_timeout).map_err(|reason| TeleopError::transport(endpoint, reason))
    }
}

impl CommandGateway for MavGateway {
    fn arm(&mut self, enable: bool) -> Result<CommandReply, TeleopError> {
        let endpoint = self.endpoints.arming.clone();
        let p1 = if enable { 1.0 } else { 0.0 };
        self.command(&endpoint, MavCmd::MAV_CMD_COMPONENT_ARM_DISARM, [p1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
    }

    fn takeoff(&mut self, target: &TolTarget) -> Result<CommandReply, TeleopError> {
        let endpoint = self.endpoints.takeoff.clone();
        self.command(&endpoint, MavCmd::MAV_CMD_NAV_TAKEOFF, tol_params(target))
    }

    fn land(&mut self, target: &TolTarget) -> Result<CommandReply, TeleopError> {
        let endpoint = self.endpoints.land.clone();
        self.command(&endpoint, MavCmd::MAV_CMD_NAV_LAND, tol_params(target))
    }

    fn set_mode(&mut self, mode: &ModeRequest) -> Result<CommandReply, TeleopError> {
        let endpoint = self.endpoints.set_mode.clone();
        let (main, sub) = px4::mode_numbers(&mode.custom_mode).ok_or_else(|| {
            TeleopError::transport(&endpoint, format!("unknown custom mode {:?}", mode.custom_mode))
        })?;
        let armed = self.status().armed;
        let base = set_mode_base(mode.base_mode, armed);
        self.command(
            &endpoint,
            MavCmd::MAV_CMD_DO_SET_MODE,
            [base as f32, main as f32, sub as f32, 0.0, 0.0, 0.0, 0.0],
        )
    }

    fn broadcast_frame(&mut self, frame: &ChannelFrame) -> Result<(), TeleopError> {
        let data = rc_override(frame, self.target_sys, self.target_comp);
        let had_pending = lock(&self.pending_frame).replace(data).is_some();
        if had_pending {
            // the writer has not taken the previous frame yet and will send
            // this one in its place on its next wake-up
            return Ok(());
        }
        match self.outbox.try_send(Outgoing::Frame) {
            Ok(()) | Err(TrySendError::Full(_)) => Ok(()),
            Err(TrySendError::Disconnected(_)) => {
                Err(TeleopError::transport(&self.endpoints.rc_override, "link writer stopped"))
            }
        }
    }
}

impl Drop for MavGateway {
    fn drop(&mut self) {
        // The writer exits once `outbox` is gone.
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Sole user of `MavTransport::send`.
struct Writer {
    transport: Arc<dyn MavTransport>,
    queue: Receiver<Outgoing>,
    pending_frame: Arc<Mutex<Option<RC_CHANNELS_OVERRIDE_DATA>>>,
    sys_id: u8,
    comp_id: u8,
    seq: u8,
    hb_interval: Duration,
}

impl Writer {
    fn run(mut self) {
        let mut next_hb = Instant::now();
        loop {
            if Instant::now() >= next_hb {
                self.send(&operator_heartbeat(), "heartbeat");
                next_hb = Instant::now() + self.hb_interval;
            }

            match self.queue.recv_timeout(next_hb.saturating_duration_since(Instant::now())) {
                Ok(Outgoing::Message(msg)) => self.send(&msg, "command"),
                Ok(Outgoing::Frame) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            // Checked on every wake-up: a frame stored while the queue was full
            // has no wake-up of its own.
            let frame = lock(&self.pending_frame).take();
            if let Some(frame) = frame {
                self.send(&MavMessage::RC_CHANNELS_OVERRIDE(frame), "rc override");
            }
        }
        debug!("link: writer stopped");
    }

    fn send(&mut self, msg: &MavMessage, what: &str) {
        let hdr = MavHeader { system_id: self.sys_id, component_id: self.comp_id, sequence: self.seq };
        self.seq = self.seq.wrapping_add(1);
        if let Err(e) = self.transport.send(&hdr, msg) {
            warn!("link: {} send failed: {:#}", what, e);
        }
    }
}

struct Reader {
    transport: Arc<dyn MavTransport>,
    target_sys: u8,
    acks: Sender<COMMAND_ACK_DATA>,
    status: Arc<Mutex<LinkStatus>>,
    stop: Arc<AtomicBool>,
}

impl Reader {
    fn run(self) {
        while !self.stop.load(Ordering::Relaxed) {
            match self.transport.recv() {
                Ok(Some((hdr, msg))) if hdr.system_id == self.target_sys => self.handle(msg),
                Ok(_) => {}
                Err(e) => {
                    debug!("link: recv: {:#}", e);
                    // Light sleep to avoid busy loop
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        }
        debug!("link: reader stopped");
    }

    fn handle(&self, msg: MavMessage) {
        match msg {
            MavMessage::HEARTBEAT(hb) => {
                let mut st = lock(&self.status);
                if st.on_heartbeat(&hb) {
                    info!(
                        "vehicle: armed={} mode={}",
                        st.armed,
                        st.mode_name().unwrap_or("unknown"),
                    );
                }
            }
            MavMessage::COMMAND_ACK(ack) => {
                debug!("link: ack {:?} -> {:?}", ack.command, ack.result);
                let _ = self.acks.send(ack);
                lock(&self.status).acks_seen += 1;
            }
            _ => {}
        }
    }
}

fn operator_heartbeat() -> MavMessage {
    MavMessage::HEARTBEAT(HEARTBEAT_DATA {
        custom_mode: 0,
        mavtype: MavType::MAV_TYPE_GCS,
        autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
        base_mode: MavModeFlag::empty(),
        system_status: MavState::MAV_STATE_ACTIVE,
        mavlink_version: 3,
    })
}

fn command_long(target_sys: u8, target_comp: u8, cmd: MavCmd, p: [f32; 7]) -> MavMessage {
    MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
        target_system: target_sys,
        target_component: target_comp,
        command: cmd,
        confirmation: 0,
        param1: p[0],
        param2: p[1],
        param3: p[2],
        param4: p[3],
        param5: p[4],
        param6: p[5],
        param7: p[6],
    })
}

/// NAV_TAKEOFF / NAV_LAND parameter layout.
fn tol_params(t: &TolTarget) -> [f32; 7] {
    [t.min_pitch, 0.0, 0.0, t.yaw, t.latitude as f32, t.longitude as f32, t.altitude]
}

fn set_mode_base(requested: u8, armed: bool) -> u8 {
    let mut base = requested | MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED.bits();
    if armed {
        base |= MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED.bits();
    }
    base
}

fn rc_override(frame: &ChannelFrame, target_sys: u8, target_comp: u8) -> RC_CHANNELS_OVERRIDE_DATA {
    let c = frame.to_wire();
    // chan9..18 stay 0, which means "no override" for those channels.
    RC_CHANNELS_OVERRIDE_DATA {
        target_system: target_sys,
        target_component: target_comp,
        chan1_raw: c[0],
        chan2_raw: c[1],
        chan3_raw: c[2],
        chan4_raw: c[3],
        chan5_raw: c[4],
        chan6_raw: c[5],
        chan7_raw: c[6],
        chan8_raw: c[7],
        ..Default::default()
    }
}

fn reply_for(result: MavResult) -> CommandReply {
    match result {
        MavResult::MAV_RESULT_ACCEPTED | MavResult::MAV_RESULT_IN_PROGRESS => CommandReply::ok(),
        _ => CommandReply::rejected(),
    }
}

/// Wait for the ack of `cmd`, skipping acks for other commands.
fn await_ack(acks: &Receiver<COMMAND_ACK_DATA>, cmd: MavCmd, timeout: Duration) -> Result<CommandReply, String> {
    let deadline = Instant::now() + timeout;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match acks.recv_timeout(left) {
            Ok(ack) if ack.command == cmd => {
                if ack.result != MavResult::MAV_RESULT_ACCEPTED {
                    info!("ack {:?}: {:?}", cmd, ack.result);
                }
                return Ok(reply_for(ack.result));
            }
            Ok(_) => continue,
            Err(RecvTimeoutError::Timeout) => return Err(format!("no COMMAND_ACK within {:?}", timeout)),
            Err(RecvTimeoutError::Disconnected) => return Err("link reader stopped".to_string()),
        }
    }
}
