//! Simulation clock — owns simulated minutes, business hours and the
//! shutdown request.

use crate::types::{SimMinutes, CLOSE_AT, MINUTES_PER_DAY, OPEN_AT, SIM_MINUTES_PER_TICK};

/// Daily opening interval `[open_at, close_at)` in minutes from 00:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    pub open_at:  SimMinutes,
    pub close_at: SimMinutes,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self { open_at: OPEN_AT, close_at: CLOSE_AT }
    }
}

impl BusinessHours {
    pub fn contains(&self, minute_of_day: SimMinutes) -> bool {
        minute_of_day >= self.open_at && minute_of_day < self.close_at
    }
}

/// Open flag for the default 08:00–16:00 interval.
pub fn compute_open(sim_minutes: SimMinutes) -> bool {
    compute_open_with(BusinessHours::default(), sim_minutes)
}

pub fn compute_open_with(hours: BusinessHours, sim_minutes: SimMinutes) -> bool {
    hours.contains(sim_minutes % MINUTES_PER_DAY)
}

/// `[HH:MM]` label for a minute count. Hours are not wrapped at 24.
pub fn clock_label(sim_minutes: SimMinutes) -> String {
    format!("{:02}:{:02}", sim_minutes / 60, sim_minutes % 60)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimClock {
    sim_minutes: SimMinutes,
    is_open:     bool,
    shutdown:    bool,
    hours:       BusinessHours,
}

impl SimClock {
    pub fn new(start_minutes: SimMinutes) -> Self {
        Self::with_hours(start_minutes, BusinessHours::default())
    }

    pub fn with_hours(start_minutes: SimMinutes, hours: BusinessHours) -> Self {
        let mut clock = Self {
            sim_minutes: 0,
            is_open: false,
            shutdown: false,
            hours,
        };
        clock.init(start_minutes);
        clock
    }

    /// Reset to `start_minutes` and clear any pending shutdown request.
    pub fn init(&mut self, start_minutes: SimMinutes) {
        self.sim_minutes = start_minutes;
        self.shutdown = false;
        self.refresh_open();
    }

    /// Jump to a persisted minute count. Same effect as `init`, kept
    /// separate so restores read as such at call sites.
    pub fn restore(&mut self, sim_minutes: SimMinutes) {
        self.init(sim_minutes);
    }

    /// Advance one tick. Returns the new minute count.
    pub fn tick(&mut self) -> SimMinutes {
        self.sim_minutes = self.sim_minutes.saturating_add(SIM_MINUTES_PER_TICK);
        self.refresh_open();
        self.sim_minutes
    }

    pub fn sim_minutes(&self) -> SimMinutes {
        self.sim_minutes
    }

    pub fn minute_of_day(&self) -> SimMinutes {
        self.sim_minutes % MINUTES_PER_DAY
    }

    pub fn hours(&self) -> BusinessHours {
        self.hours
    }

    /// Recomputes the open flag before returning it.
    pub fn is_open_now(&mut self) -> bool {
        self.refresh_open();
        self.is_open
    }

    /// Minutes until the next opening time; 0 while open.
    pub fn minutes_until_open(&self) -> SimMinutes {
        let minute_of_day = self.minute_of_day();
        if self.hours.contains(minute_of_day) {
            return 0;
        }
        if minute_of_day < self.hours.open_at {
            self.hours.open_at - minute_of_day
        } else {
            (MINUTES_PER_DAY - minute_of_day) + self.hours.open_at
        }
    }

    pub fn request_shutdown(&mut self) {
        self.shutdown = true;
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown
    }

    pub fn label(&self) -> String {
        clock_label(self.sim_minutes)
    }

    fn refresh_open(&mut self) {
        self.is_open = compute_open_with(self.hours, self.sim_minutes);
    }
}
