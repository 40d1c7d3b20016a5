//! Interactive-interrupt handling.
//!
//! The handler only stores into an atomic flag. The supervisor reads the
//! flag at the top of each loop iteration.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_interrupt(_sig: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install the SIGINT handler and return the flag it sets.
pub fn install_interrupt_handler() -> io::Result<&'static AtomicBool> {
    // SAFETY:
    // - sigaction is zero-initialisable; we fill the fields we use
    // - on_interrupt is async-signal-safe (a single atomic store)
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = 0;
        if libc::sigemptyset(&mut action.sa_mask) != 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(&INTERRUPTED)
}
