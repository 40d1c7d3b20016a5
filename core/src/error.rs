use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClockError {
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Cannot install interrupt handler: {0}")]
    Signal(#[source] io::Error),

    #[error("Cannot spawn logger worker: {0}")]
    Spawn(#[source] io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type ClockResult<T> = Result<T, ClockError>;

/// Failures of checkpoint save/load.
///
/// `NotFound` is kept apart from the rest so a first run can be told from a
/// corrupted or unreadable state file.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("No checkpoint at '{}'", path.display())]
    NotFound { path: PathBuf },

    #[error("Checkpoint '{}' is not a minute count: {content:?}", path.display())]
    Parse { path: PathBuf, content: String },

    #[error("Checkpoint I/O on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CheckpointError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Cannot create channel for key {key:#x}: {source}")]
    Create {
        key: libc::key_t,
        #[source]
        source: io::Error,
    },

    #[error("Cannot derive channel key from '{}': {source}", path.display())]
    Key {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Channel I/O: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of a failed blocking receive.
#[derive(Error, Debug)]
pub enum RecvError {
    /// The queue was destroyed. Consumers treat this as their stop signal.
    #[error("Channel removed")]
    Removed,

    /// Woken by a signal before a message arrived; retry.
    #[error("Receive interrupted")]
    Interrupted,

    #[error("Receive failed: {0}")]
    Io(#[source] io::Error),
}

impl RecvError {
    /// True for failures the receive loop should simply retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}
