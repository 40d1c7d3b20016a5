//! Shared primitive types used across the clock, supervisor and logger.

/// Simulated time. One unit = one simulated minute since epoch 0.
pub type SimMinutes = u64;

/// Number of supervisor loop iterations since process start.
pub type TickCount = u64;

/// Minutes in one simulated day.
pub const MINUTES_PER_DAY: SimMinutes = 1440;

/// Simulated minutes added by a single tick.
pub const SIM_MINUTES_PER_TICK: SimMinutes = 1;

/// Default opening time (08:00).
pub const OPEN_AT: SimMinutes = 480;

/// Default closing time (16:00), exclusive.
pub const CLOSE_AT: SimMinutes = 960;
