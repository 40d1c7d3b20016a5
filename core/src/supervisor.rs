//! The supervisor — drives the clock and owns the logger worker.
//!
//! PHASES (in order, never revisited):
//!   1. Bootstrap     — interrupt handler, channel, worker, clock restore
//!   2. Running       — sleep, tick, emit, periodic checkpoint
//!   3. ShuttingDown  — final event, final checkpoint, channel removal, wait
//!   4. Terminated
//!
//! RULES:
//!   - Checkpoint and send failures are logged and never stop the loop.
//!   - The channel is removed only after the last event is sent.
//!   - The worker is always waited for before returning.

use crate::{
    channel::{ChannelKey, EventChannel, EventSink},
    checkpoint::CheckpointStore,
    clock::SimClock,
    config::SupervisorConfig,
    error::{ClockError, ClockResult},
    event::ClockEvent,
    signal,
    types::{SimMinutes, TickCount},
};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Argument that switches the binary into logger-worker mode.
pub const LOGGER_FLAG: &str = "--logger";
pub const CHANNEL_KEY_FLAG: &str = "--channel-key";
pub const LOG_FILE_FLAG: &str = "--log-file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorPhase {
    Bootstrap,
    Running,
    ShuttingDown,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub final_minutes: SimMinutes,
    pub ticks:         TickCount,
    /// True when the run continued from a checkpoint.
    pub resumed:       bool,
}

pub struct Supervisor<S> {
    config:   SupervisorConfig,
    clock:    SimClock,
    store:    CheckpointStore,
    sink:     S,
    phase:    SupervisorPhase,
    ticks:    TickCount,
    resumed:  bool,
    was_open: bool,
}

impl<S: EventSink> Supervisor<S> {
    pub fn new(config: SupervisorConfig, sink: S) -> Self {
        let mut clock = SimClock::with_hours(config.start_minutes, config.business_hours());
        let was_open = clock.is_open_now();
        Self {
            store: CheckpointStore::new(config.state_file.clone()),
            config,
            clock,
            sink,
            phase: SupervisorPhase::Bootstrap,
            ticks: 0,
            resumed: false,
            was_open,
        }
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut SimClock {
        &mut self.clock
    }

    pub fn phase(&self) -> SupervisorPhase {
        self.phase
    }

    pub fn ticks(&self) -> TickCount {
        self.ticks
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Load the checkpoint, or fall back to the configured start time.
    /// Returns true when a checkpoint was used.
    pub fn restore_or_init(&mut self) -> bool {
        let path = self.store.path().display().to_string();
        self.resumed = match self.store.load(&mut self.clock) {
            Ok(minutes) => {
                log::info!("supervisor: resumed from '{path}' at sim_minutes={minutes}");
                true
            }
            Err(e) if e.is_not_found() => {
                log::info!(
                    "supervisor: no state file '{path}', starting from {}",
                    self.config.start_minutes
                );
                false
            }
            Err(e) => {
                log::warn!(
                    "supervisor: failed to load '{path}' ({e}), starting from {}",
                    self.config.start_minutes
                );
                false
            }
        };
        if !self.resumed {
            self.clock.init(self.config.start_minutes);
        }
        self.was_open = self.clock.is_open_now();

        let sim_minutes = self.clock.sim_minutes();
        let event = if self.resumed {
            ClockEvent::Resumed { sim_minutes }
        } else {
            ClockEvent::Started { sim_minutes }
        };
        self.emit(&event);
        self.resumed
    }

    /// One loop iteration minus the sleep. Returns the events it produced.
    pub fn step(&mut self) -> Vec<ClockEvent> {
        self.phase = SupervisorPhase::Running;
        let sim_minutes = self.clock.tick();
        self.ticks += 1;

        let mut events = Vec::new();
        if sim_minutes % 60 == 0 {
            events.push(ClockEvent::HourMilestone { sim_minutes });
        }

        let open = self.clock.is_open_now();
        if open != self.was_open {
            events.push(if open {
                ClockEvent::Opened { sim_minutes }
            } else {
                ClockEvent::Closed {
                    sim_minutes,
                    minutes_until_open: self.clock.minutes_until_open(),
                }
            });
            self.was_open = open;
        }

        if self.config.checkpoint_every > 0
            && self.ticks % self.config.checkpoint_every == 0
            && self.checkpoint() {
            events.push(ClockEvent::Checkpointed { sim_minutes });
        }

        if let Some(max) = self.config.max_ticks {
            if self.ticks >= max {
                log::info!("supervisor: reached max_ticks={max}");
                self.clock.request_shutdown();
            }
        }

        for event in &events {
            self.emit(event);
        }
        events
    }

    pub fn should_stop(&self, cancel: &AtomicBool) -> bool {
        cancel.load(Ordering::SeqCst) || self.clock.shutdown_requested()
    }

    /// Tick on the configured cadence until cancelled or asked to shut down.
    pub fn run(&mut self, cancel: &AtomicBool) {
        self.phase = SupervisorPhase::Running;
        let interval = self.config.tick_interval();
        while !self.should_stop(cancel) {
            thread::sleep(interval);
            self.step();
        }
        if cancel.load(Ordering::SeqCst) {
            log::info!("supervisor: interrupt received");
        }
    }

    /// Final event and checkpoint. The caller removes the channel afterwards.
    pub fn shut_down(&mut self) -> RunSummary {
        self.phase = SupervisorPhase::ShuttingDown;
        let sim_minutes = self.clock.sim_minutes();
        self.emit(&ClockEvent::ShuttingDown { sim_minutes });
        self.checkpoint();
        RunSummary { final_minutes: sim_minutes, ticks: self.ticks, resumed: self.resumed }
    }

    pub fn finish(&mut self) {
        self.phase = SupervisorPhase::Terminated;
        log::info!("supervisor: exiting at sim_minutes={}", self.clock.sim_minutes());
    }

    /// Save the clock; failures are logged only.
    fn checkpoint(&self) -> bool {
        match self.store.save(&self.clock) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("supervisor: {e}");
                false
            }
        }
    }

    fn emit(&self, event: &ClockEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => log::debug!("t={} {payload}", event.sim_minutes()),
            Err(e) => log::warn!("supervisor: cannot encode {}: {e}", event.event_type()),
        }
        if event.is_relayed() {
            self.sink.publish(&event.to_log_event());
        }
    }
}

/// The logger child process and the channel it drains.
#[derive(Debug)]
pub struct LoggerWorker {
    channel: EventChannel,
    child:   Child,
}

impl LoggerWorker {
    /// Start `exe` in logger mode on `channel`.
    ///
    /// The worker gets its own process group so a terminal interrupt reaches
    /// only the supervisor; the worker stops when the channel is removed.
    pub fn spawn(exe: &Path, channel: EventChannel, log_file: &Path) -> ClockResult<Self> {
        let spawned = Command::new(exe)
            .arg(LOGGER_FLAG)
            .arg(CHANNEL_KEY_FLAG)
            .arg(channel.key().to_string())
            .arg(LOG_FILE_FLAG)
            .arg(log_file)
            .process_group(0)
            .spawn();

        match spawned {
            Ok(child) => {
                log::info!("supervisor: logger worker pid {}", child.id());
                Ok(Self { channel, child })
            }
            Err(e) => {
                if let Err(rm) = channel.remove() {
                    log::warn!("supervisor: {rm}");
                }
                Err(ClockError::Spawn(e))
            }
        }
    }

    pub fn channel(&self) -> &EventChannel {
        &self.channel
    }

    /// Remove the channel, then wait for the worker to exit.
    pub fn stop(mut self) -> ClockResult<ExitStatus> {
        if let Err(e) = self.channel.remove() {
            log::warn!("supervisor: {e}");
        }
        let status = self.child.wait().map_err(ClockError::Spawn)?;
        log::info!("supervisor: logger worker exited with {status}");
        Ok(status)
    }
}

/// Run the full supervisor lifecycle with a logger child process.
pub fn launch(config: SupervisorConfig) -> ClockResult<RunSummary> {
    config.validate()?;
    let cancel = signal::install_interrupt_handler().map_err(ClockError::Signal)?;

    let exe = std::env::current_exe().map_err(ClockError::Spawn)?;
    let key = ChannelKey::derive(&exe, crate::channel::PROJECT_TAG)?;
    let channel = EventChannel::create(key)?;
    let sender = channel.sender();
    let worker = LoggerWorker::spawn(&exe, channel, &config.log_file)?;

    let mut supervisor = Supervisor::new(config, sender);
    supervisor.restore_or_init();
    supervisor.run(cancel);
    let summary = supervisor.shut_down();

    if let Err(e) = worker.stop() {
        log::warn!("supervisor: {e}");
    }
    supervisor.finish();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LogEvent;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<LogEvent>>);

    impl EventSink for Recorder {
        fn publish(&self, event: &LogEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    fn supervisor(dir: &tempfile::TempDir) -> Supervisor<Recorder> {
        let config = SupervisorConfig::default_test(dir.path().join("clock.state"));
        Supervisor::new(config, Recorder::default())
    }

    #[test]
    fn hour_milestone_on_every_sixtieth_minute() {
        let dir = tempfile::tempdir().unwrap();
        let mut sup = supervisor(&dir);
        sup.restore_or_init();
        let mut milestones = Vec::new();
        for _ in 0..180 {
            for event in sup.step() {
                if let ClockEvent::HourMilestone { sim_minutes } = event {
                    milestones.push(sim_minutes);
                }
            }
        }
        assert_eq!(milestones, vec![60, 120, 180]);
    }

    #[test]
    fn opened_and_closed_events_follow_business_hours() {
        let dir = tempfile::tempdir().unwrap();
        let mut sup = supervisor(&dir);
        sup.restore_or_init();
        let mut transitions = Vec::new();
        for _ in 0..1440 {
            for event in sup.step() {
                match event {
                    ClockEvent::Opened { .. } | ClockEvent::Closed { .. } => transitions.push(event),
                    _ => {}
                }
            }
        }
        assert_eq!(
            transitions,
            vec![
                ClockEvent::Opened { sim_minutes: 480 },
                ClockEvent::Closed { sim_minutes: 960, minutes_until_open: 960 },
            ]
        );
    }

    #[test]
    fn checkpoint_events_are_not_relayed() {
        let dir = tempfile::tempdir().unwrap();
        let mut sup = supervisor(&dir);
        sup.restore_or_init();
        let mut checkpoints = 0;
        for _ in 0..100 {
            checkpoints += sup
                .step()
                .iter()
                .filter(|e| matches!(e, ClockEvent::Checkpointed { .. }))
                .count();
        }
        assert_eq!(checkpoints, 2);
        let relayed = sup.sink().0.borrow();
        assert!(relayed.iter().all(|e| !e.text.starts_with("Checkpoint")));
    }

    #[test]
    fn max_ticks_requests_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SupervisorConfig::default_test(dir.path().join("clock.state"));
        config.max_ticks = Some(5);
        let mut sup = Supervisor::new(config, Recorder::default());
        sup.restore_or_init();

        let cancel = AtomicBool::new(false);
        sup.run(&cancel);
        assert_eq!(sup.ticks(), 5);
        assert!(sup.clock().shutdown_requested());
    }

    #[test]
    fn cancel_flag_stops_before_first_tick() {
        let dir = tempfile::tempdir().unwrap();
        let mut sup = supervisor(&dir);
        sup.restore_or_init();
        let cancel = AtomicBool::new(true);
        sup.run(&cancel);
        assert_eq!(sup.ticks(), 0);
    }
}
