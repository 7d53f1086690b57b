use std::time::Duration;

use teleop_proto::frame::NEUTRAL;
use teleop_proto::{ChannelFrame, Command};
use tracing::{debug, info, warn};

use crate::error::TeleopError;
use crate::gateway::{CommandGateway, InputSource};
use crate::key::{Action, THROTTLE_DEFAULT, THROTTLE_STEP};

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Upper bound on one input poll; sets the minimum frame rate.
    pub poll_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { poll_timeout: Duration::from_millis(100) }
    }
}

/// Everything that survives from one cycle to the next.
///
/// Roll and pitch are deliberately absent: they are recomputed from the
/// current key every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    /// Sticky and exact: never clamped, may leave the nominal 1000..=2000
    /// band. Narrowing to the wire type happens in `ChannelFrame::to_wire`.
    pub throttle: i32,
    pub running: bool,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self { throttle: THROTTLE_DEFAULT, running: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    pub frames_sent: u64,
    pub frames_failed: u64,
    pub commands_sent: u64,
    pub commands_failed: u64,
}

pub struct TeleopController<I, G> {
    input: I,
    gateway: G,
    cfg: ControllerConfig,
    state: ControllerState,
    summary: RunSummary,
}

impl<I: InputSource, G: CommandGateway> TeleopController<I, G> {
    pub fn new(input: I, gateway: G, cfg: ControllerConfig) -> Self {
        Self {
            input,
            gateway,
            cfg,
            state: ControllerState::default(),
            summary: RunSummary::default(),
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn into_parts(self) -> (I, G) {
        (self.input, self.gateway)
    }

    /// Run cycles until the interrupt key is seen. The frame of the
    /// interrupting cycle is still sent.
    ///
    /// Only an input failure ends the loop early.
    pub fn run(&mut self) -> Result<RunSummary, TeleopError> {
        info!("teleop: rc override loop starting (poll {:?})", self.cfg.poll_timeout);
        while self.state.running {
            self.step()?;
        }
        info!(
            "teleop: stopped after {} cycles ({} frames, {} frames failed, {} commands, {} failed)",
            self.summary.iterations,
            self.summary.frames_sent,
            self.summary.frames_failed,
            self.summary.commands_sent,
            self.summary.commands_failed,
        );
        Ok(self.summary)
    }

    /// One cycle: poll, apply the key, build and broadcast a frame.
    pub fn step(&mut self) -> Result<ChannelFrame, TeleopError> {
        let key = self.input.poll(self.cfg.poll_timeout)?;

        let mut roll = NEUTRAL;
        let mut pitch = NEUTRAL;

        match Action::for_key(key) {
            Action::Command(cmd) => self.dispatch(cmd),
            Action::ThrottleUp => self.state.throttle += THROTTLE_STEP,
            Action::ThrottleReset => self.state.throttle = THROTTLE_DEFAULT,
            Action::ThrottleDown => self.state.throttle -= THROTTLE_STEP,
            Action::Roll(v) => roll = v,
            Action::Pitch(v) => pitch = v,
            Action::Stop => self.state.running = false,
            Action::Idle => {}
        }

        let frame = ChannelFrame::assemble(self.state.throttle, roll, pitch);
        debug!("channels: {} {} {} {}", frame.roll(), frame.pitch(), frame.throttle(), frame.yaw());

        // Sent every cycle so the vehicle's RC failsafe never trips while the
        // operator is idle.
        match self.gateway.broadcast_frame(&frame) {
            Ok(()) => self.summary.frames_sent += 1,
            Err(e) => {
                self.summary.frames_failed += 1;
                warn!("frame broadcast failed: {}", e);
            }
        }

        self.summary.iterations += 1;
        Ok(frame)
    }

    fn dispatch(&mut self, cmd: Command) {
        let label = cmd.label();
        self.summary.commands_sent += 1;
        match self.execute(cmd) {
            Ok(()) => info!("{} request success", label),
            Err(e @ TeleopError::RemoteRejected(_)) => {
                self.summary.commands_failed += 1;
                info!("{}", e);
            }
            Err(e) => {
                self.summary.commands_failed += 1;
                warn!("{} request failed: {}", label, e);
            }
        }
    }

    fn execute(&mut self, cmd: Command) -> Result<(), TeleopError> {
        let reply = match &cmd {
            Command::Arm => self.gateway.arm(true)?,
            Command::Disarm => self.gateway.arm(false)?,
            Command::Takeoff(target) => self.gateway.takeoff(target)?,
            Command::Land(target) => self.gateway.land(target)?,
            Command::SetMode(mode) => {
                // Mode changes are not acknowledged; the reply is ignored.
                self.gateway.set_mode(mode)?;
                return Ok(());
            }
        };
        if !reply.success {
            return Err(TeleopError::RemoteRejected(cmd.label()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use teleop_proto::frame::AUX_LOW;
    use teleop_proto::{CommandReply, ModeRequest, TolTarget};

    use super::*;
    use crate::key::Key;

    /// Replays a fixed key script, then presses Ctrl-C forever.
    struct Script {
        keys: VecDeque<Option<Key>>,
        polls: usize,
    }

    impl Script {
        fn new(keys: &[Option<Key>]) -> Self {
            Self { keys: keys.iter().copied().collect(), polls: 0 }
        }

        fn chars(s: &str) -> Self {
            let keys: Vec<_> = s.chars().map(|c| Some(Key::Char(c))).collect();
            Self::new(&keys)
        }
    }

    impl InputSource for Script {
        fn poll(&mut self, _timeout: Duration) -> Result<Option<Key>, TeleopError> {
            self.polls += 1;
            Ok(self.keys.pop_front().unwrap_or(Some(Key::Interrupt)))
        }
    }

    #[derive(Default)]
    struct Recorder {
        commands: Vec<Command>,
        frames: Vec<ChannelFrame>,
        fail_commands: bool,
        reject_commands: bool,
        fail_broadcast: bool,
    }

    impl Recorder {
        fn reply(&mut self, cmd: Command) -> Result<CommandReply, TeleopError> {
            self.commands.push(cmd);
            if self.fail_commands {
                return Err(TeleopError::transport("/test/cmd", "service unavailable"));
            }
            if self.reject_commands {
                return Ok(CommandReply::rejected());
            }
            Ok(CommandReply::ok())
        }
    }

    impl CommandGateway for Recorder {
        fn arm(&mut self, enable: bool) -> Result<CommandReply, TeleopError> {
            self.reply(if enable { Command::Arm } else { Command::Disarm })
        }
        fn takeoff(&mut self, target: &TolTarget) -> Result<CommandReply, TeleopError> {
            self.reply(Command::Takeoff(target.clone()))
        }
        fn land(&mut self, target: &TolTarget) -> Result<CommandReply, TeleopError> {
            self.reply(Command::Land(target.clone()))
        }
        fn set_mode(&mut self, mode: &ModeRequest) -> Result<CommandReply, TeleopError> {
            self.reply(Command::SetMode(mode.clone()))
        }
        fn broadcast_frame(&mut self, frame: &ChannelFrame) -> Result<(), TeleopError> {
            self.frames.push(*frame);
            if self.fail_broadcast {
                return Err(TeleopError::transport("/test/rc/override", "socket closed"));
            }
            Ok(())
        }
    }

    fn controller(input: Script, gw: Recorder) -> TeleopController<Script, Recorder> {
        TeleopController::new(input, gw, ControllerConfig::default())
    }

    fn run_chars(s: &str) -> Vec<ChannelFrame> {
        let mut c = controller(Script::chars(s), Recorder::default());
        c.run().unwrap();
        c.into_parts().1.frames
    }

    #[test]
    fn throttle_roll_scenario() {
        let frames = run_chars("rrjf");
        // four keyed cycles plus the interrupt cycle
        assert_eq!(frames.len(), 5);
        let throttles: Vec<i32> = frames[..4].iter().map(|f| f.throttle()).collect();
        assert_eq!(throttles, vec![1510, 1520, 1520, 1500]);
        let rolls: Vec<i32> = frames[..4].iter().map(|f| f.roll()).collect();
        assert_eq!(rolls, vec![1500, 1500, 1800, 1500]);
    }

    #[test]
    fn no_key_then_arm_dispatches_once_on_second_cycle() {
        let mut c = controller(Script::new(&[None, Some(Key::Char('1'))]), Recorder::default());

        let first = c.step().unwrap();
        assert!(c.gateway().commands.is_empty());
        assert_eq!(first, ChannelFrame::assemble(1500, 1500, 1500));
        assert_eq!(c.state(), &ControllerState::default());

        let second = c.step().unwrap();
        assert_eq!(c.gateway().commands, vec![Command::Arm]);
        assert_eq!(second, first);
        assert_eq!(c.gateway().frames.len(), 2);
    }

    #[test]
    fn interrupt_first_sends_one_default_frame() {
        let mut c = controller(Script::new(&[Some(Key::Interrupt)]), Recorder::default());
        let summary = c.run().unwrap();
        assert_eq!(summary.iterations, 1);
        assert_eq!(summary.frames_sent, 1);
        assert!(!c.state().running);
        let (input, gw) = c.into_parts();
        assert_eq!(input.polls, 1);
        assert_eq!(gw.frames, vec![ChannelFrame::assemble(1500, 1500, 1500)]);
    }

    #[test]
    fn throttle_tracks_increments_since_last_reset() {
        let script = "rrvrxrfvvrjrrvkrr";
        let frames = run_chars(script);
        let mut expected: i32 = 1500;
        for (c, frame) in script.chars().zip(&frames) {
            match c {
                'r' => expected += 10,
                'v' => expected -= 10,
                'f' => expected = 1500,
                _ => {}
            }
            assert_eq!(frame.throttle(), expected, "after key {:?}", c);
        }
    }

    #[test]
    fn roll_and_pitch_are_momentary() {
        let script = "jjlikxk";
        let frames = run_chars(script);
        for (c, frame) in script.chars().zip(&frames) {
            let roll = match c { 'j' => 1800, 'l' => 1200, _ => 1500 };
            let pitch = match c { 'i' => 1800, 'k' => 1200, _ => 1500 };
            assert_eq!(frame.roll(), roll, "roll after {:?}", c);
            assert_eq!(frame.pitch(), pitch, "pitch after {:?}", c);
        }
    }

    #[test]
    fn yaw_and_aux_never_change() {
        for frame in run_chars("rrrjilk1234h0fvq") {
            assert_eq!(frame.yaw(), 1500);
            assert!(frame.aux().iter().all(|&v| v == AUX_LOW));
        }
    }

    #[test]
    fn double_reset_is_idempotent() {
        let frames = run_chars("rrrff");
        assert_eq!(frames[3].throttle(), 1500);
        assert_eq!(frames[4].throttle(), 1500);
    }

    #[test]
    fn throttle_is_not_clamped() {
        // Intentionally unclamped: the autopilot is trusted to limit the
        // override. Change this test if a ceiling is ever introduced.
        let frames = run_chars(&"r".repeat(60));
        assert_eq!(frames[59].throttle(), 2100);

        let frames = run_chars(&"v".repeat(60));
        assert_eq!(frames[59].throttle(), 900);
    }

    #[test]
    fn throttle_goes_negative_without_stopping_at_zero() {
        let frames = run_chars(&"v".repeat(152));
        assert_eq!(frames[149].throttle(), 0);
        assert_eq!(frames[151].throttle(), -20);

        // the wire never sees the RC override "release" value
        assert_eq!(frames[149].to_wire()[2], 1);
        assert_eq!(frames[151].to_wire()[2], 1);
    }

    #[test]
    fn transport_fault_does_not_stop_the_loop() {
        let gw = Recorder { fail_commands: true, ..Default::default() };
        let mut c = controller(Script::new(&[Some(Key::Char('1')), None, Some(Key::Char('r'))]), gw);

        c.step().unwrap();
        c.step().unwrap();
        let third = c.step().unwrap();

        assert_eq!(third.throttle(), 1510);
        assert_eq!(c.gateway().frames.len(), 3);
        assert_eq!(c.gateway().commands, vec![Command::Arm]);
        assert!(c.state().running);
        let s = c.summary();
        assert_eq!((s.commands_sent, s.commands_failed), (1, 1));
    }

    #[test]
    fn rejected_command_is_not_retried() {
        let gw = Recorder { reject_commands: true, ..Default::default() };
        let mut c = controller(Script::chars("34"), gw);
        let summary = c.run().unwrap();
        assert_eq!(summary.commands_sent, 2);
        assert_eq!(summary.commands_failed, 2);
        let gw = c.into_parts().1;
        assert_eq!(
            gw.commands,
            vec![
                Command::Takeoff(TolTarget::takeoff_waypoint()),
                Command::Land(TolTarget::land_waypoint()),
            ]
        );
        assert_eq!(gw.frames.len(), 3);
    }

    #[test]
    fn set_mode_reply_is_ignored() {
        let gw = Recorder { reject_commands: true, ..Default::default() };
        let mut c = controller(Script::chars("h0"), gw);
        let summary = c.run().unwrap();
        assert_eq!(summary.commands_failed, 0);
        assert_eq!(
            c.gateway().commands,
            vec![
                Command::SetMode(ModeRequest::custom("STABILIZED")),
                Command::SetMode(ModeRequest::custom("OFFBOARD")),
            ]
        );
    }

    #[test]
    fn broadcast_failure_keeps_looping() {
        let gw = Recorder { fail_broadcast: true, ..Default::default() };
        let mut c = controller(Script::chars("rr"), gw);
        let summary = c.run().unwrap();
        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.frames_sent, 0);
        assert_eq!(summary.frames_failed, 3);
    }

    #[test]
    fn input_error_ends_run() {
        struct Broken;
        impl InputSource for Broken {
            fn poll(&mut self, _timeout: Duration) -> Result<Option<Key>, TeleopError> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "tty gone").into())
            }
        }
        let mut c = TeleopController::new(Broken, Recorder::default(), ControllerConfig::default());
        assert!(matches!(c.run(), Err(TeleopError::Input(_))));
        assert!(c.gateway().frames.is_empty());
    }
}
