//! Inter-process event channel on top of a System V message queue.
//!
//! Both processes derive the same `ChannelKey` from a stable path and a
//! project tag, so supervisor and logger agree on the queue without any
//! handshake. Sends are fire-and-forget; the single consumer blocks in
//! `recv` until an event arrives or the queue is removed.

use crate::{
    error::{ChannelError, RecvError},
    event::{LogEvent, MAX_SENDER_LEN, MAX_TEXT_LEN},
};
use libc::{c_int, c_long, c_void, key_t};
use std::ffi::CString;
use std::fmt;
use std::io;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::str::FromStr;

/// Project tag mixed into every key derived by this crate.
pub const PROJECT_TAG: u8 = b'L';

const QUEUE_PERMS: c_int = 0o666;
const LOG_MESSAGE_TYPE: c_long = 1;

/// Anything that accepts log events. Delivery is best-effort.
pub trait EventSink {
    fn publish(&self, event: &LogEvent);
}

impl<T: EventSink + ?Sized> EventSink for &T {
    fn publish(&self, event: &LogEvent) {
        (**self).publish(event)
    }
}

/// Anything a logger can drain events from.
pub trait EventSource {
    fn recv(&mut self) -> Result<LogEvent, RecvError>;
}

/// Shared identity of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelKey(key_t);

impl ChannelKey {
    /// Derive a key from an existing path and a one-byte tag (`ftok`).
    pub fn derive(path: &Path, tag: u8) -> Result<Self, ChannelError> {
        let key_err = |source: io::Error| ChannelError::Key { path: path.to_path_buf(), source };
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| key_err(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
        let key = unsafe { libc::ftok(c_path.as_ptr(), c_int::from(tag)) };
        if key == -1 {
            return Err(key_err(io::Error::last_os_error()));
        }
        Ok(Self(key))
    }

    pub fn from_raw(raw: key_t) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> key_t {
        self.0
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChannelKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Wire layout of one queued event. Strings are NUL-padded.
#[repr(C)]
struct RawMessage {
    mtype:       c_long,
    sim_minutes: u64,
    sender:      [u8; MAX_SENDER_LEN + 1],
    text:        [u8; MAX_TEXT_LEN + 1],
}

/// Payload size as `msgsnd`/`msgrcv` count it (everything after `mtype`).
const PAYLOAD_LEN: usize = mem::size_of::<RawMessage>() - mem::size_of::<c_long>();

impl RawMessage {
    fn empty() -> Self {
        Self {
            mtype: 0,
            sim_minutes: 0,
            sender: [0; MAX_SENDER_LEN + 1],
            text: [0; MAX_TEXT_LEN + 1],
        }
    }

    fn encode(event: &LogEvent) -> Self {
        let mut raw = Self::empty();
        raw.mtype = LOG_MESSAGE_TYPE;
        raw.sim_minutes = event.sim_minutes;
        copy_padded(&mut raw.sender, event.sender.as_bytes());
        copy_padded(&mut raw.text, event.text.as_bytes());
        raw
    }

    fn decode(&self) -> LogEvent {
        LogEvent::new(self.sim_minutes, &read_padded(&self.sender), &read_padded(&self.text))
    }
}

/// Copy at most `dst.len() - 1` bytes so a terminating NUL always remains.
fn copy_padded(dst: &mut [u8], src: &[u8]) {
    let n = src.len().min(dst.len() - 1);
    dst[..n].copy_from_slice(&src[..n]);
}

fn read_padded(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Handle to an existing queue.
#[derive(Debug)]
pub struct EventChannel {
    key: ChannelKey,
    id:  c_int,
}

impl EventChannel {
    /// Open the queue for `key`, creating it if needed.
    pub fn create(key: ChannelKey) -> Result<Self, ChannelError> {
        // SAFETY: msgget takes plain integers.
        let id = unsafe { libc::msgget(key.raw(), QUEUE_PERMS | libc::IPC_CREAT) };
        if id == -1 {
            return Err(ChannelError::Create { key: key.raw(), source: io::Error::last_os_error() });
        }
        log::debug!("channel {key} ready (id {id})");
        Ok(Self { key, id })
    }

    /// Open the queue for `key` only if it already exists.
    pub fn open(key: ChannelKey) -> io::Result<Self> {
        // SAFETY: msgget takes plain integers.
        let id = unsafe { libc::msgget(key.raw(), QUEUE_PERMS) };
        if id == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { key, id })
    }

    pub fn key(&self) -> ChannelKey {
        self.key
    }

    /// Enqueue without blocking. A full or vanished queue is an error here;
    /// `send_event` turns that into a silent drop.
    pub fn try_send(&self, event: &LogEvent) -> io::Result<()> {
        let raw = RawMessage::encode(event);
        // SAFETY: raw is a live repr(C) message whose payload is PAYLOAD_LEN bytes
        // following the leading c_long, as msgsnd expects.
        let rc = unsafe {
            libc::msgsnd(self.id, &raw as *const RawMessage as *const c_void, PAYLOAD_LEN, libc::IPC_NOWAIT)
        };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Destroy the queue. Any receiver blocked on it wakes with `Removed`.
    pub fn remove(&self) -> Result<(), ChannelError> {
        // SAFETY: IPC_RMID ignores the buffer argument.
        let rc = unsafe { libc::msgctl(self.id, libc::IPC_RMID, std::ptr::null_mut()) };
        if rc == -1 {
            let err = io::Error::last_os_error();
            if is_removed(&err) {
                log::debug!("channel {} already removed", self.key);
                return Ok(());
            }
            return Err(ChannelError::Io(err));
        }
        log::debug!("channel {} removed", self.key);
        Ok(())
    }

    /// A producer-side handle that looks the queue up by key on every send.
    pub fn sender(&self) -> ChannelSender {
        ChannelSender::new(self.key)
    }
}

impl EventSource for EventChannel {
    /// Blocks until an event arrives. No timeout.
    fn recv(&mut self) -> Result<LogEvent, RecvError> {
        let mut raw = RawMessage::empty();
        // SAFETY: raw is a writable repr(C) buffer with PAYLOAD_LEN bytes after mtype.
        let rc = unsafe {
            libc::msgrcv(self.id, &mut raw as *mut RawMessage as *mut c_void, PAYLOAD_LEN, 0, 0)
        };
        if rc == -1 {
            let err = io::Error::last_os_error();
            if is_removed(&err) {
                return Err(RecvError::Removed);
            }
            if err.kind() == io::ErrorKind::Interrupted {
                return Err(RecvError::Interrupted);
            }
            return Err(RecvError::Io(err));
        }
        Ok(raw.decode())
    }
}

/// EIDRM is what a blocked receiver sees; EINVAL means the id was already
/// gone when the call started.
fn is_removed(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::EIDRM) | Some(libc::EINVAL))
}

/// Send `event` to the queue for `key`. Drops the event if the queue does
/// not exist or is full.
pub fn send_event(key: ChannelKey, event: &LogEvent) {
    let channel = match EventChannel::open(key) {
        Ok(c) => c,
        Err(e) => {
            log::debug!("channel {key} unavailable, dropping event: {e}");
            return;
        }
    };
    if let Err(e) = channel.try_send(event) {
        log::debug!("channel {key} send failed, dropping event: {e}");
    }
}

/// Fire-and-forget producer.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSender {
    key: ChannelKey,
}

impl ChannelSender {
    pub fn new(key: ChannelKey) -> Self {
        Self { key }
    }
}

impl EventSink for ChannelSender {
    fn publish(&self, event: &LogEvent) {
        send_event(self.key, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_message_keeps_terminating_nul() {
        let event = LogEvent {
            sim_minutes: 7,
            sender: "s".repeat(64),
            text: "t".repeat(200),
        };
        let raw = RawMessage::encode(&event);
        assert_eq!(raw.sender[MAX_SENDER_LEN], 0);
        assert_eq!(raw.text[MAX_TEXT_LEN], 0);

        let decoded = raw.decode();
        assert_eq!(decoded.sim_minutes, 7);
        assert_eq!(decoded.sender.len(), MAX_SENDER_LEN);
        assert_eq!(decoded.text.len(), MAX_TEXT_LEN);
    }

    #[test]
    fn key_parses_from_display() {
        let key = ChannelKey::from_raw(0x4c01_0203);
        assert_eq!(key.to_string().parse::<ChannelKey>().unwrap(), key);
        let negative = ChannelKey::from_raw(-12345);
        assert_eq!(negative.to_string().parse::<ChannelKey>().unwrap(), negative);
    }

    #[test]
    fn derive_fails_for_missing_path() {
        let err = ChannelKey::derive(Path::new("/definitely/not/here/xyz"), PROJECT_TAG);
        assert!(matches!(err, Err(ChannelError::Key { .. })));
    }
}
