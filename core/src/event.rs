//! Events relayed from the supervisor to the logger worker.
//!
//! `ClockEvent` names everything the supervisor can report; `LogEvent` is
//! the fixed-shape record that actually crosses the channel.

use crate::{clock::clock_label, types::SimMinutes};
use serde::Serialize;

/// Longest sender name carried on the wire, in bytes.
pub const MAX_SENDER_LEN: usize = 31;

/// Longest event text carried on the wire, in bytes.
pub const MAX_TEXT_LEN: usize = 127;

/// Sender name used by the supervisor.
pub const SYSTEM_SENDER: &str = "SYSTEM";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub sim_minutes: SimMinutes,
    pub sender:      String,
    pub text:        String,
}

impl LogEvent {
    /// Build an event, truncating sender and text to their wire limits.
    pub fn new(sim_minutes: SimMinutes, sender: &str, text: &str) -> Self {
        Self {
            sim_minutes,
            sender: truncate_utf8(sender, MAX_SENDER_LEN).to_string(),
            text:   truncate_utf8(text, MAX_TEXT_LEN).to_string(),
        }
    }

    /// `[HH:MM] [sender]: text`
    pub fn render(&self) -> String {
        format!("[{}] [{}]: {}", clock_label(self.sim_minutes), self.sender, self.text)
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Every event the supervisor emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClockEvent {
    /// Fresh start from the default time.
    Started { sim_minutes: SimMinutes },
    /// Resumed from a checkpoint.
    Resumed { sim_minutes: SimMinutes },
    /// Top of a simulated hour.
    HourMilestone { sim_minutes: SimMinutes },
    Opened { sim_minutes: SimMinutes },
    Closed { sim_minutes: SimMinutes, minutes_until_open: SimMinutes },
    Checkpointed { sim_minutes: SimMinutes },
    ShuttingDown { sim_minutes: SimMinutes },
}

impl ClockEvent {
    pub fn sim_minutes(&self) -> SimMinutes {
        match self {
            Self::Started { sim_minutes }
            | Self::Resumed { sim_minutes }
            | Self::HourMilestone { sim_minutes }
            | Self::Opened { sim_minutes }
            | Self::Closed { sim_minutes, .. }
            | Self::Checkpointed { sim_minutes }
            | Self::ShuttingDown { sim_minutes } => *sim_minutes,
        }
    }

    /// Stable name, matches the serde tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. }       => "started",
            Self::Resumed { .. }       => "resumed",
            Self::HourMilestone { .. } => "hour_milestone",
            Self::Opened { .. }        => "opened",
            Self::Closed { .. }        => "closed",
            Self::Checkpointed { .. }  => "checkpointed",
            Self::ShuttingDown { .. }  => "shutting_down",
        }
    }

    /// Checkpoints are frequent; they go to diagnostics, not the event log.
    pub fn is_relayed(&self) -> bool {
        !matches!(self, Self::Checkpointed { .. })
    }

    pub fn text(&self) -> String {
        match self {
            Self::Started { .. } => "Started".to_string(),
            Self::Resumed { sim_minutes } => format!("Resumed from checkpoint at minute {sim_minutes}"),
            Self::HourMilestone { sim_minutes } => format!("Hour {} begins", sim_minutes / 60),
            Self::Opened { .. } => "Workshop opened".to_string(),
            Self::Closed { minutes_until_open, .. } => {
                format!("Workshop closed, reopens in {minutes_until_open} min")
            }
            Self::Checkpointed { sim_minutes } => format!("Checkpoint saved at minute {sim_minutes}"),
            Self::ShuttingDown { .. } => "Shutting down".to_string(),
        }
    }

    pub fn to_log_event(&self) -> LogEvent {
        LogEvent::new(self.sim_minutes(), SYSTEM_SENDER, &self.text())
    }
}
