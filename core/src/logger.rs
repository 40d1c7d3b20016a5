//! Logger worker — drains the event channel into the console and an
//! append-only log file.
//!
//! Lifecycle: Starting → Running → Stopped. Running ends when the channel is
//! removed, or after `MAX_CONSECUTIVE_RECV_ERRORS` hard receive failures in
//! a row. Events still queued at removal are lost.
//!
//! The worker only attaches to an existing queue. A queue that is already
//! gone at startup means the supervisor has shut down; the worker stops
//! without recreating it.

use crate::{
    channel::{ChannelKey, EventChannel, EventSource},
    error::{ChannelError, ClockResult, RecvError},
    event::LogEvent,
};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

pub const DEFAULT_LOG_FILE: &str = "serwis.log";

/// Consecutive hard receive failures tolerated before the worker gives up.
pub const MAX_CONSECUTIVE_RECV_ERRORS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    Starting,
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerReport {
    pub events_written: u64,
    /// False when the worker stopped on repeated receive errors rather
    /// than channel removal.
    pub channel_removed: bool,
}

/// `[HH:MM] [sender]: text`
pub fn format_event(event: &LogEvent) -> String {
    event.render()
}

pub struct EventLogger<S, W> {
    source:         S,
    console:        W,
    log_file:       Option<File>,
    state:          LoggerState,
    events_written: u64,
}

impl<S: EventSource, W: Write> EventLogger<S, W> {
    pub fn new(source: S, console: W, log_file: Option<File>) -> Self {
        Self {
            source,
            console,
            log_file,
            state: LoggerState::Starting,
            events_written: 0,
        }
    }

    pub fn state(&self) -> LoggerState {
        self.state
    }

    /// Receive and write events until the channel goes away.
    pub fn run(&mut self) -> LoggerReport {
        self.state = LoggerState::Running;
        let mut consecutive_errors = 0u32;

        let channel_removed = loop {
            match self.source.recv() {
                Ok(event) => {
                    consecutive_errors = 0;
                    self.write_event(&event);
                }
                Err(RecvError::Removed) => break true,
                Err(e) if e.is_transient() => continue,
                Err(e) => {
                    consecutive_errors += 1;
                    log::warn!("logger: {e} ({consecutive_errors} in a row)");
                    if consecutive_errors >= MAX_CONSECUTIVE_RECV_ERRORS {
                        log::error!("logger: giving up after {consecutive_errors} receive errors");
                        break false;
                    }
                }
            }
        };

        self.stop();
        LoggerReport { events_written: self.events_written, channel_removed }
    }

    /// Console first, then the durable log, each flushed before the next event.
    pub fn write_event(&mut self, event: &LogEvent) {
        let line = format_event(event);

        if let Err(e) = writeln!(self.console, "{line}").and_then(|_| self.console.flush()) {
            log::warn!("logger: console write failed: {e}");
        }
        if let Some(file) = self.log_file.as_mut() {
            if let Err(e) = writeln!(file, "{line}").and_then(|_| file.flush()) {
                log::warn!("logger: log file write failed: {e}");
            }
        }
        self.events_written += 1;
    }

    fn stop(&mut self) {
        if let Some(file) = self.log_file.take() {
            if let Err(e) = file.sync_all() {
                log::warn!("logger: final sync of log file failed: {e}");
            }
        }
        self.state = LoggerState::Stopped;
    }
}

/// Open `path` for appending, creating it if missing.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Worker entry point. A missing queue is a normal stop; any other failure
/// to attach is fatal. A log file that cannot be opened only disables the
/// durable copy.
pub fn run_worker(key: ChannelKey, log_path: &Path) -> ClockResult<LoggerReport> {
    let channel = match EventChannel::open(key) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("logger: channel {key} already removed, nothing to do");
            return Ok(LoggerReport { events_written: 0, channel_removed: true });
        }
        Err(e) => return Err(ChannelError::Io(e).into()),
    };

    let log_file = match open_log_file(log_path) {
        Ok(f) => Some(f),
        Err(e) => {
            log::warn!("logger: cannot open '{}': {e}; console only", log_path.display());
            None
        }
    };

    log::info!("logger: listening on channel {key}, writing '{}'", log_path.display());
    let mut logger = EventLogger::new(channel, io::stdout(), log_file);
    let report = logger.run();
    log::info!("logger: stopped after {} events", report.events_written);
    Ok(report)
}
