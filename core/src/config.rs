use crate::{
    checkpoint::DEFAULT_STATE_FILE,
    clock::BusinessHours,
    error::{ClockError, ClockResult},
    logger::DEFAULT_LOG_FILE,
    types::{SimMinutes, TickCount, CLOSE_AT, MINUTES_PER_DAY, OPEN_AT},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;
pub const DEFAULT_CHECKPOINT_EVERY: TickCount = 50;
pub const DEFAULT_START_MINUTES: SimMinutes = 0;

/// Supervisor settings. Every field has a default, so a config file only
/// needs the keys it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SupervisorConfig {
    pub state_file:       PathBuf,
    pub log_file:         PathBuf,
    pub tick_interval_ms: u64,
    pub checkpoint_every: TickCount,
    /// Start time used when no usable checkpoint exists.
    pub start_minutes:    SimMinutes,
    /// Stop after this many ticks. Unbounded when absent.
    pub max_ticks:        Option<TickCount>,
    pub open_at:          SimMinutes,
    pub close_at:         SimMinutes,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            state_file:       DEFAULT_STATE_FILE.into(),
            log_file:         DEFAULT_LOG_FILE.into(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            start_minutes:    DEFAULT_START_MINUTES,
            max_ticks:        None,
            open_at:          OPEN_AT,
            close_at:         CLOSE_AT,
        }
    }
}

impl SupervisorConfig {
    /// Load from a JSON file. Missing keys keep their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SupervisorConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ClockResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(ClockError::Config("tick_interval_ms must be > 0".into()));
        }
        if self.checkpoint_every == 0 {
            return Err(ClockError::Config("checkpoint_every must be > 0".into()));
        }
        if self.open_at >= self.close_at || self.close_at > MINUTES_PER_DAY {
            return Err(ClockError::Config(format!(
                "business hours [{}, {}) must be a non-empty interval within one day",
                self.open_at, self.close_at
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn business_hours(&self) -> BusinessHours {
        BusinessHours { open_at: self.open_at, close_at: self.close_at }
    }

    /// Fast settings for tests: 1 ms ticks, defaults otherwise.
    pub fn default_test(state_file: impl Into<PathBuf>) -> Self {
        Self {
            state_file: state_file.into(),
            tick_interval_ms: 1,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SupervisorConfig =
            serde_json::from_str(r#"{ "tick_interval_ms": 10, "max_ticks": 200 }"#).unwrap();
        assert_eq!(config.tick_interval(), Duration::from_millis(10));
        assert_eq!(config.max_ticks, Some(200));
        assert_eq!(config.checkpoint_every, DEFAULT_CHECKPOINT_EVERY);
        assert_eq!(config.state_file, PathBuf::from("clock.state"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let zero_every = SupervisorConfig { checkpoint_every: 0, ..Default::default() };
        assert!(matches!(zero_every.validate(), Err(ClockError::Config(_))));

        let inverted = SupervisorConfig { open_at: 900, close_at: 600, ..Default::default() };
        assert!(inverted.validate().is_err());

        let past_midnight = SupervisorConfig { close_at: 1500, ..Default::default() };
        assert!(past_midnight.validate().is_err());
    }
}
