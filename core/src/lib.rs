//! Simulated workshop clock: checkpointed simulated time, a tick-driven
//! supervisor, and a logger worker fed over a System V message queue.

pub mod channel;
pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod logger;
pub mod signal;
pub mod supervisor;
pub mod types;
